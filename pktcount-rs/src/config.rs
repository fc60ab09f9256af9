// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fmt::{self, Display},
    fs::{self},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, anyhow};
use clap::ValueEnum;
use dirs::home_dir;
use pktcount_rs_common::DEFAULT_PIN_DIR;
use serde::{Deserialize, Serialize};

/// XDP attach mode, see `ebpf::ebpf_up`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AttachMode {
    Default,
    #[default]
    Skb,
    Drv,
    Hw,
}

impl Display for AttachMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachMode::Default => write!(f, "default"),
            AttachMode::Skb => write!(f, "skb"),
            AttachMode::Drv => write!(f, "drv"),
            AttachMode::Hw => write!(f, "hw"),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub attach_iface: String,
    pub pin_dir: PathBuf,
    pub attach_mode: AttachMode,
    pub interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            attach_iface: "eth0".to_string(),
            pin_dir: PathBuf::from(DEFAULT_PIN_DIR),
            attach_mode: AttachMode::default(),
            interval_ms: 1000,
        }
    }
}

pub fn create_or_read_config() -> Result<Config, anyhow::Error> {
    create_or_read_config_at(&get_config_path()?)
}

pub fn create_or_read_config_at(config_path: &Path) -> Result<Config, anyhow::Error> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {parent:?}"))?;
    }

    match fs::read_to_string(config_path) {
        Ok(content) => {
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse config file:\n \t{e}"))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = Config::default();
            let toml = toml::to_string(&config)
                .map_err(|e| anyhow!("Failed to serialize default config: {e}"))?;
            fs::write(config_path, toml)
                .with_context(|| format!("Failed to write config file at {config_path:?}"))?;
            Ok(config)
        }
        Err(e) => Err(anyhow!("Failed to read config file: {}", e)),
    }
}

/// Polling period for the reader. Zero is rejected since a zero-period
/// ticker never yields.
pub fn refresh_interval(interval_ms: u64) -> Result<Duration, anyhow::Error> {
    if interval_ms == 0 {
        anyhow::bail!("interval_ms must be greater than zero");
    }
    Ok(Duration::from_millis(interval_ms))
}

fn get_config_path() -> Result<PathBuf, anyhow::Error> {
    home_dir()
        .map(|mut path| {
            path.push(".config");
            path.push("pktcount_rs");
            path.push("config.toml");
            path
        })
        .ok_or_else(|| anyhow!("HOME dir not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_defaults_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = create_or_read_config_at(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reread = create_or_read_config_at(&path).unwrap();
        assert_eq!(reread, config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "attach_iface = \"ens3\"\nattach_mode = \"drv\"\n").unwrap();

        let config = create_or_read_config_at(&path).unwrap();
        assert_eq!(config.attach_iface, "ens3");
        assert_eq!(config.attach_mode, AttachMode::Drv);
        assert_eq!(config.pin_dir, PathBuf::from(DEFAULT_PIN_DIR));
        assert_eq!(config.interval_ms, 1000);
    }

    #[test]
    fn rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "attach_mode = \"turbo\"\n").unwrap();

        let err = create_or_read_config_at(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn zero_interval_is_an_error() {
        assert!(refresh_interval(0).is_err());
        assert_eq!(refresh_interval(250).unwrap(), Duration::from_millis(250));
    }
}
