// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use std::{borrow::Borrow, path::PathBuf, time::Duration};

use aya::maps::MapData;
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};
use pktcount_rs::{
    config::{AttachMode, create_or_read_config, refresh_interval},
    counter::PacketCounter,
    ebpf::*,
};
use tokio::{
    signal,
    time::{Instant, interval},
};

#[derive(Parser)]
#[command(name = "pktcount-rs")]
#[command(author, version, about)]
struct Opt {
    #[clap(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Load and attach the counter, then report until Ctrl+C
    Run {
        #[clap(short, long)]
        iface: Option<String>,
        #[clap(long, value_enum)]
        mode: Option<AttachMode>,
        #[clap(long)]
        interval_ms: Option<u64>,
    },
    /// Read an already pinned counter table
    Watch {
        #[clap(short, long)]
        pinned_file: Option<PathBuf>,
        #[clap(long)]
        interval_ms: Option<u64>,
    },
    /// Remove the pinned counter table
    Unpin,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if opt.verbose {
        logger.filter_level(LevelFilter::Info);
    }
    logger.init();

    let file_config = create_or_read_config()?;

    match opt.command {
        Cmd::Run {
            iface,
            mode,
            interval_ms,
        } => {
            require_root()?;
            let attach_iface = iface.unwrap_or(file_config.attach_iface);
            let mode = mode.unwrap_or(file_config.attach_mode);
            let period = refresh_interval(interval_ms.unwrap_or(file_config.interval_ms))?;

            let ifindex = get_ifindex(&attach_iface)?;
            info!("{attach_iface} has ifindex {ifindex}");

            let mut xdp_bpf = ebpf_init(&file_config.pin_dir)?;
            ebpf_up(&mut xdp_bpf, &attach_iface, mode)?;

            println!("Initialization Complete! Counting frames on {attach_iface}...");
            report(PacketCounter::from_ebpf(&xdp_bpf)?, period).await
        }
        Cmd::Watch {
            pinned_file,
            interval_ms,
        } => {
            let pinned_file =
                pinned_file.unwrap_or_else(|| pinned_map_path(&file_config.pin_dir));
            let period = refresh_interval(interval_ms.unwrap_or(file_config.interval_ms))?;

            info!("Reading {pinned_file:?}");
            report(PacketCounter::from_pin(&pinned_file)?, period).await
        }
        Cmd::Unpin => {
            require_root()?;
            let path = unpin(&file_config.pin_dir)?;
            println!("Removed {path:?}");
            Ok(())
        }
    }
}

async fn report<T: Borrow<MapData>>(
    counter: PacketCounter<T>,
    period: Duration,
) -> Result<(), anyhow::Error> {
    let mut ticker = interval(period);
    let mut prev = counter.snapshot()?;
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = counter.snapshot()?;
                let rate = now.rate(&prev, last.elapsed());
                println!("{now}\nrate:{rate:.1} pkt/s\n");
                prev = now;
                last = Instant::now();
            },
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, Exiting...");
                return Ok(());
            },
        }
    }
}

fn require_root() -> Result<(), anyhow::Error> {
    if !unsafe { libc::getuid() == 0 || libc::geteuid() == 0 } {
        anyhow::bail!("This program must be run as root");
    }
    Ok(())
}
