// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

//! Userspace side of the counter table: open the per-CPU map, copy every
//! CPU's slot out, and aggregate.

use std::{
    borrow::Borrow,
    fmt::{self, Display},
    path::Path,
    time::Duration,
};

use anyhow::{Context, anyhow};
use aya::{
    Ebpf,
    maps::{Map, MapData, PerCpuArray},
};
use pktcount_rs_common::{COUNTER_KEY, PACKET_COUNT_MAP};

pub struct PacketCounter<T> {
    map: PerCpuArray<T, u64>,
}

impl PacketCounter<MapData> {
    /// Opens a table pinned by a previous (or still running) loader.
    pub fn from_pin<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let data = MapData::from_pin(path)
            .with_context(|| format!("Failed to open pinned map at {path:?}"))?;
        let map = PerCpuArray::try_from(Map::PerCpuArray(data))
            .with_context(|| format!("{path:?} is not a per-CPU array of u64"))?;
        Ok(Self { map })
    }
}

impl<'a> PacketCounter<&'a MapData> {
    pub fn from_ebpf(ebpf: &'a Ebpf) -> Result<Self, anyhow::Error> {
        let map = ebpf
            .map(PACKET_COUNT_MAP)
            .ok_or_else(|| anyhow!("{PACKET_COUNT_MAP} map not found"))?;
        Ok(Self {
            map: PerCpuArray::try_from(map)?,
        })
    }
}

impl<T: Borrow<MapData>> PacketCounter<T> {
    pub fn snapshot(&self) -> Result<CounterSnapshot, anyhow::Error> {
        let values = self
            .map
            .get(&COUNTER_KEY, 0)
            .with_context(|| format!("Failed to look up {PACKET_COUNT_MAP}[{COUNTER_KEY}]"))?;
        Ok(values.iter().copied().collect::<Vec<u64>>().into())
    }
}

/// Per-CPU slot values read at one instant. Slots are indexed by CPU id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    per_cpu: Vec<u64>,
}

impl CounterSnapshot {
    pub fn per_cpu(&self) -> &[u64] {
        &self.per_cpu
    }

    /// Logical counter value: the sum of every CPU's slot.
    pub fn total(&self) -> u64 {
        self.per_cpu.iter().fold(0u64, |acc, v| acc.wrapping_add(*v))
    }

    /// Frames counted since `prev`, per CPU. Slots only grow, so a smaller
    /// value means the slot wrapped and the wrapping difference is right.
    /// CPUs missing from `prev` count from zero.
    pub fn delta(&self, prev: &CounterSnapshot) -> CounterSnapshot {
        let per_cpu = self
            .per_cpu
            .iter()
            .enumerate()
            .map(|(cpu, now)| now.wrapping_sub(prev.per_cpu.get(cpu).copied().unwrap_or(0)))
            .collect();
        CounterSnapshot { per_cpu }
    }

    /// Frames per second across all CPUs since `prev`.
    pub fn rate(&self, prev: &CounterSnapshot, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.delta(prev).total() as f64 / secs
    }
}

impl From<Vec<u64>> for CounterSnapshot {
    fn from(per_cpu: Vec<u64>) -> Self {
        Self { per_cpu }
    }
}

impl Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (cpu, value) in self.per_cpu.iter().enumerate() {
            writeln!(f, "CPU#{cpu}:{value}")?;
        }
        write!(f, "total:{}", self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_all_slots() {
        let snap = CounterSnapshot::from(vec![10, 5, 0, 0]);
        assert_eq!(snap.total(), 15);
        assert_eq!(snap.per_cpu(), &[10, 5, 0, 0]);
    }

    #[test]
    fn delta_handles_wrapped_slot() {
        let prev = CounterSnapshot::from(vec![u64::MAX, 7]);
        let now = CounterSnapshot::from(vec![1, 9]);
        assert_eq!(now.delta(&prev).per_cpu(), &[2, 2]);
    }

    #[test]
    fn delta_against_empty_is_identity() {
        let now = CounterSnapshot::from(vec![3, 4]);
        assert_eq!(now.delta(&CounterSnapshot::default()), now);
    }

    #[test]
    fn rate_over_elapsed_time() {
        let prev = CounterSnapshot::from(vec![100, 100]);
        let now = CounterSnapshot::from(vec![150, 150]);
        assert_eq!(now.rate(&prev, Duration::from_millis(500)), 200.0);
        assert_eq!(now.rate(&prev, Duration::ZERO), 0.0);
    }

    #[test]
    fn display_lists_cpus_then_total() {
        let snap = CounterSnapshot::from(vec![10, 5]);
        assert_eq!(snap.to_string(), "CPU#0:10\nCPU#1:5\ntotal:15");
    }
}
