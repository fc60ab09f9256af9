// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

//! In-process counter table with the same layout as the kernel map: one
//! `u64` slot per CPU, no lock. Lets `count_frame` run on the host.

use std::sync::atomic::{AtomicU64, Ordering};

use pktcount_rs_common::{COUNTER_KEY, CounterTable};

use crate::counter::CounterSnapshot;

pub struct PerCpuCounters {
    slots: Box<[AtomicU64]>,
}

impl PerCpuCounters {
    /// One zeroed slot per CPU.
    pub fn new(nr_cpus: usize) -> Self {
        Self {
            slots: (0..nr_cpus).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn nr_cpus(&self) -> usize {
        self.slots.len()
    }

    /// The table as the hook sees it on `cpu`. Each view reaches only its
    /// own slot.
    pub fn cpu(&self, cpu: usize) -> Option<CpuSlot<'_>> {
        self.slots.get(cpu).map(|slot| CpuSlot { slot })
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.slots
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect::<Vec<u64>>()
            .into()
    }
}

impl From<Vec<u64>> for PerCpuCounters {
    fn from(values: Vec<u64>) -> Self {
        Self {
            slots: values.into_iter().map(AtomicU64::new).collect(),
        }
    }
}

pub struct CpuSlot<'a> {
    slot: &'a AtomicU64,
}

impl CounterTable for CpuSlot<'_> {
    fn slot(&self, key: u32) -> Option<&AtomicU64> {
        (key == COUNTER_KEY).then_some(self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let table = PerCpuCounters::new(3);
        assert_eq!(table.nr_cpus(), 3);
        assert_eq!(table.snapshot().per_cpu(), &[0, 0, 0]);
    }

    #[test]
    fn out_of_range_cpu_has_no_view() {
        let table = PerCpuCounters::new(2);
        assert!(table.cpu(2).is_none());
    }

    #[test]
    fn only_key_zero_is_provisioned() {
        let table = PerCpuCounters::new(1);
        let view = table.cpu(0).unwrap();
        assert!(view.slot(COUNTER_KEY).is_some());
        assert!(view.slot(1).is_none());
    }
}
