// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use aya::{
    Ebpf, EbpfLoader,
    programs::{Xdp, XdpFlags},
};
use log::info;
use pktcount_rs_common::{PACKET_COUNT_MAP, PROGRAM_NAME};
use pnet::datalink;

use crate::config::AttachMode;

impl From<AttachMode> for XdpFlags {
    fn from(mode: AttachMode) -> Self {
        match mode {
            AttachMode::Default => XdpFlags::default(),
            AttachMode::Skb => XdpFlags::SKB_MODE,
            AttachMode::Drv => XdpFlags::DRV_MODE,
            AttachMode::Hw => XdpFlags::HW_MODE,
        }
    }
}

/// Loads the XDP object. `packet_count` is pinned under `pin_dir`; if a pin
/// already exists there the kernel table is reused and keeps its counts.
pub fn ebpf_init<P: AsRef<Path>>(pin_dir: P) -> Result<Ebpf, anyhow::Error> {
    let pin_dir = pin_dir.as_ref();
    fs::create_dir_all(pin_dir)
        .with_context(|| format!("Failed to create pin directory at {pin_dir:?}"))?;

    info!("XDP: pin {PACKET_COUNT_MAP} under {pin_dir:?}");
    let xdp_bpf = EbpfLoader::new()
        .map_pin_path(pin_dir)
        .load(aya::include_bytes_aligned!(concat!(
            env!("OUT_DIR"),
            "/xdp_count"
        )))
        .context("Failed to load the XDP object")?;

    Ok(xdp_bpf)
}

pub fn ebpf_up(xdp: &mut Ebpf, attach_iface: &str, mode: AttachMode) -> Result<(), anyhow::Error> {
    info!("XDP: Load");
    let program: &mut Xdp = xdp
        .program_mut(PROGRAM_NAME)
        .ok_or_else(|| anyhow!("{PROGRAM_NAME} program not found"))?
        .try_into()?;
    program
        .load()
        .with_context(|| format!("the kernel rejected {PROGRAM_NAME}"))?;

    info!("XDP: Attach to {attach_iface} in {mode} mode");
    program.attach(attach_iface, mode.into()).with_context(|| {
        format!("failed to attach the XDP program to {attach_iface} in {mode} mode - try --mode skb")
    })?;

    Ok(())
}

pub fn get_ifindex(ifname: &str) -> Result<u32, anyhow::Error> {
    Ok(datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == ifname)
        .ok_or(anyhow!("Unable find {}", ifname))?
        .index)
}

pub fn pinned_map_path<P: AsRef<Path>>(pin_dir: P) -> PathBuf {
    pin_dir.as_ref().join(PACKET_COUNT_MAP)
}

/// Removes the pinned table. The kernel frees it once no loaded program
/// references it.
pub fn unpin<P: AsRef<Path>>(pin_dir: P) -> Result<PathBuf, anyhow::Error> {
    let path = pinned_map_path(pin_dir);
    fs::remove_file(&path).with_context(|| format!("Failed to unpin {path:?}"))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_path_is_map_name_under_dir() {
        assert_eq!(
            pinned_map_path("/sys/fs/bpf/tc/globals"),
            PathBuf::from("/sys/fs/bpf/tc/globals/packet_count")
        );
    }

    #[test]
    fn unpin_removes_pin_and_fails_when_gone() {
        let dir = tempfile::tempdir().unwrap();
        let pin = pinned_map_path(dir.path());
        fs::write(&pin, b"").unwrap();

        assert_eq!(unpin(dir.path()).unwrap(), pin);
        assert!(!pin.exists());
        assert!(unpin(dir.path()).is_err());
    }

    #[test]
    fn attach_modes_map_to_xdp_flags() {
        let bits = |mode| XdpFlags::from(mode).bits();
        assert_eq!(bits(AttachMode::Skb), XdpFlags::SKB_MODE.bits());
        assert_eq!(bits(AttachMode::Drv), XdpFlags::DRV_MODE.bits());
        assert_eq!(bits(AttachMode::Hw), XdpFlags::HW_MODE.bits());
        assert_eq!(bits(AttachMode::Default), 0);
    }

    #[test]
    fn unknown_interface_is_an_error() {
        assert!(get_ifindex("pktcount-no-such-if0").is_err());
    }
}
