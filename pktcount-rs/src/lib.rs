// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

pub mod config;
pub mod counter;
pub mod ebpf;
pub mod percpu;
