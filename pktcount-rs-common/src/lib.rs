// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

#![cfg_attr(not(test), no_std)]

use core::{
    fmt::{self, Display},
    sync::atomic::{AtomicU64, Ordering},
};

/// The only key provisioned in the counter table.
pub const COUNTER_KEY: u32 = 0;
pub const COUNTER_MAX_ENTRIES: u32 = 1;

pub const PACKET_COUNT_MAP: &str = "packet_count";
pub const PROGRAM_NAME: &str = "xdp_prog";
pub const DEFAULT_PIN_DIR: &str = "/sys/fs/bpf/tc/globals";

/// Return codes understood by the XDP attach point.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Aborted = 0,
    Drop = 1,
    Pass = 2,
    Tx = 3,
    Redirect = 4,
}

impl From<Verdict> for u32 {
    fn from(verdict: Verdict) -> u32 {
        verdict as u32
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Aborted => write!(f, "XDP_ABORTED"),
            Verdict::Drop => write!(f, "XDP_DROP"),
            Verdict::Pass => write!(f, "XDP_PASS"),
            Verdict::Tx => write!(f, "XDP_TX"),
            Verdict::Redirect => write!(f, "XDP_REDIRECT"),
        }
    }
}

/// A counter table as seen from the CPU currently running the hook.
///
/// `slot` returns `None` when the table is not initialized or the key is
/// not provisioned. Implementations must hand out a slot that only the
/// calling CPU writes to.
pub trait CounterTable {
    fn slot(&self, key: u32) -> Option<&AtomicU64>;
}

impl<T: CounterTable + ?Sized> CounterTable for &T {
    #[inline(always)]
    fn slot(&self, key: u32) -> Option<&AtomicU64> {
        (**self).slot(key)
    }
}

/// An absent table never yields a slot.
impl<T: CounterTable> CounterTable for Option<T> {
    #[inline(always)]
    fn slot(&self, key: u32) -> Option<&AtomicU64> {
        self.as_ref()?.slot(key)
    }
}

/// Body of the ingress hook: bump the current CPU's slot and let the frame
/// through. A lookup miss skips the increment, the verdict is always
/// [`Verdict::Pass`].
///
/// No loops and no calls besides the lookup, so the verifier sees a
/// constant instruction count.
#[inline(always)]
pub fn count_frame<T: CounterTable + ?Sized>(table: &T) -> Verdict {
    if let Some(slot) = table.slot(COUNTER_KEY) {
        // wraps on overflow
        slot.fetch_add(1, Ordering::Relaxed);
    }
    Verdict::Pass
}
