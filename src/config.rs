//! Optional spider settings read from `~/.config/pull/config.toml`.
//!
//! Every key may be omitted. A missing or blank file means defaults, and
//! keys this version does not know about produce a warning, not an error.
//!
//! ```toml
//! timeout_secs = 10
//! max_body_bytes = 2097152
//! ```
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::feed::spider::{DEFAULT_TIMEOUT_SECS, MAX_FEED_SIZE};

/// Upper bound on the config file size (1 MiB).
const MAX_CONFIG_BYTES: u64 = 1_048_576;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },
}

/// Defaults applied to every [`Spider`](crate::feed::Spider) the CLI builds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection-phase (connect + TLS handshake) timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum accepted response body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_body_bytes: MAX_FEED_SIZE,
        }
    }
}

impl Config {
    const FIELDS: &'static [&'static str] = &["timeout_secs", "max_body_bytes"];

    /// `$HOME/.config/pull/config.toml`, or `None` without a home directory.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(PathBuf::from(home).join(".config/pull/config.toml"))
    }

    /// Loads `path`, falling back to [`Config::default`] when it does not
    /// exist or holds only whitespace.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_bounded(path)? else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        };
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Blank config file, using defaults");
            return Ok(Self::default());
        }

        let table: toml::Table = content.parse()?;
        table
            .keys()
            .filter(|key| !Self::FIELDS.contains(&key.as_str()))
            .for_each(|key| tracing::warn!(key = %key, "Ignoring unknown config key"));

        let config: Config = toml::Value::Table(table).try_into()?;
        tracing::info!(
            path = %path.display(),
            timeout_secs = config.timeout_secs,
            max_body_bytes = config.max_body_bytes,
            "Loaded configuration"
        );
        Ok(config)
    }
}

/// Reads the file, or `None` if it is absent.
fn read_bounded(path: &Path) -> Result<Option<String>, ConfigError> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if size > MAX_CONFIG_BYTES {
        return Err(ConfigError::TooLarge {
            size,
            max: MAX_CONFIG_BYTES,
        });
    }
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        // Removed between the size check and the read
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
