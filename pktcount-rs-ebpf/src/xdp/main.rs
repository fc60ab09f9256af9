// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only
#![no_std]
#![no_main]

use core::sync::atomic::AtomicU64;

use aya_ebpf::{
    bindings::xdp_action,
    macros::{map, xdp},
    maps::PerCpuArray,
    programs::XdpContext,
};
use pktcount_rs_common::{COUNTER_MAX_ENTRIES, CounterTable, Verdict, count_frame};

// Pinned by name, so the loader finds the existing table on restart and
// readers can open it from the BPF filesystem.
#[map(name = "packet_count")]
static PACKET_COUNT: PerCpuArray<u64> = PerCpuArray::pinned(COUNTER_MAX_ENTRIES, 0);

const _: () = assert!(Verdict::Pass as u32 == xdp_action::XDP_PASS);

struct PacketCount;

impl CounterTable for PacketCount {
    #[inline(always)]
    fn slot(&self, key: u32) -> Option<&AtomicU64> {
        let count = PACKET_COUNT.get_ptr_mut(key)?;
        // SAFETY: the lookup returns this CPU's copy of an 8-byte aligned
        // u64 that lives as long as the map.
        Some(unsafe { AtomicU64::from_ptr(count) })
    }
}

#[xdp]
pub fn xdp_prog(_ctx: XdpContext) -> u32 {
    count_frame(&PacketCount).into()
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 4] = *b"GPL\0";

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
