// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that Quotebook uses to simplify
//! the process of serialization and deserialization. Every field is optional,
//! and a missing configuration file simply means that defaults are used.
//!
//! # General Layout
//!
//! The configuration file is composed of two sections: storage and sync. The
//! storage section tells Quotebook where to persist quote data. The sync
//! section describes the remote endpoint that the sync stub polls, and how
//! often it does so.
//!
//! ```toml
//! [storage]
//! data_dir = "$XDG_DATA_HOME/quotebook"
//!
//! [sync]
//! base_url = "https://jsonplaceholder.typicode.com"
//! interval_secs = 15
//! check_interval_secs = 5
//! timeout_secs = 10
//! max_items = 3
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::{debug, instrument};

/// Top-level configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Where quote data gets persisted.
    pub storage: StorageSettings,

    /// How the sync stub talks to its remote endpoint.
    pub sync: SyncSettings,
}

impl Settings {
    /// Load settings from target path.
    ///
    /// A missing file is not an error, default settings are returned instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Io`] if the file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if the file is not valid TOML.
    /// - Return [`ConfigError::ShellExpansion`] if data directory expansion
    ///   fails.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("load configuration from {}", path.display());
        fs::read_to_string(path)?.parse()
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on data directory field.
        if let Some(data_dir) = settings.storage.data_dir.take() {
            let expanded = shellexpand::full(data_dir.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned();
            settings.storage.data_dir = Some(PathBuf::from(expanded));
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Storage settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding persisted quote data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Sync stub settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Base URL of the list-of-posts endpoint.
    pub base_url: String,

    /// Seconds between full sync cycles in watch mode.
    pub interval_secs: u64,

    /// Seconds between quick change checks in watch mode.
    pub check_interval_secs: u64,

    /// Flat request timeout in seconds.
    pub timeout_secs: u64,

    /// Number of remote posts relabeled as quotes.
    pub max_items: usize,
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_url: "https://jsonplaceholder.typicode.com".into(),
            interval_secs: 15,
            check_interval_secs: 5,
            timeout_secs: 10,
            max_items: 3,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
