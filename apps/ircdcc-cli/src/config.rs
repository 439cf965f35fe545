//! CLI configuration.
//!
//! Reads TOML at `~/.config/ircdcc/config.toml` (or `--config`). A missing
//! file means defaults; the `[transfer]` table maps onto the engine's
//! [`TransferConfig`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use ircdcc_transfer::TransferConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Our own nick, used in log lines.
    pub nick: String,
    /// Where received files land when `--dir` is not given.
    pub download_dir: PathBuf,
    pub transfer: TransferConfig,
}

fn default_nick() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "ircdcc".into())
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            download_dir: PathBuf::from("."),
            transfer: TransferConfig::default(),
        }
    }
}

impl CliConfig {
    /// Loads `path`, or the default location when `None`.
    ///
    /// Only an explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_file_path(), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

fn config_file_path() -> PathBuf {
    config_base_dir().join("ircdcc").join("config.toml")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg);
            }
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = CliConfig::parse(
            r#"
            nick = "carol"

            [transfer]
            buffer_size = 8192
            port_min = 40000
            port_max = 40010
            "#,
        )
        .unwrap();

        assert_eq!(config.nick, "carol");
        assert_eq!(config.download_dir, PathBuf::from("."));
        assert_eq!(config.transfer.buffer_size, 8192);
        assert_eq!(config.transfer.port_range(), Some(40000..=40010));
        assert_eq!(config.transfer.connect_timeout, 30);
        assert!(config.transfer.send_acks);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = CliConfig::parse("").unwrap();
        assert_eq!(config.transfer, TransferConfig::default());
    }

    #[test]
    fn advertise_address_parses() {
        let config = CliConfig::parse(
            r#"
            [transfer]
            advertise_address = "203.0.113.7"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.transfer.advertise_address,
            Some([203, 0, 113, 7].into())
        );
    }

    #[test]
    fn load_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "download_dir = \"/srv/dcc\"\n").unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/srv/dcc"));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transfer]\nbuffer_size = \"big\"\n").unwrap();

        let err = CliConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
