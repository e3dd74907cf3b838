//! CLI configuration.
//!
//! Reads/writes `~/.secrets/config.toml`. Every key is optional:
//!
//! ```toml
//! db_path = "/var/lib/secrets/secrets.redb"
//! viewer = "SilentFox_101"
//!
//! [feed]
//! page_size = 20
//! max_comment_len = 1000
//! ```

use std::path::{Path, PathBuf};

use secrets_feed::FeedConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Database file (default: ~/.secrets/secrets.redb).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,

    /// User id or handle to act as when `--as` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,

    #[serde(default)]
    pub feed: FeedConfig,
}

impl CliConfig {
    /// Default config file path: ~/.secrets/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk, or return default if the file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: CliConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `--db` wins over the file, which wins over the default.
    pub fn resolve_db(&self, flag: Option<&str>) -> PathBuf {
        flag.map(PathBuf::from)
            .or_else(|| self.db_path.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| dirs_path().join("secrets.redb"))
    }
}

/// ~/.secrets
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".secrets")
}
