//! Launcher settings.

use std::path::PathBuf;

use crate::error::SkyError;

/// Env var naming the sky binary.
pub const ENV_SKY_BIN: &str = "CARGOPLANE_SKY_BIN";
/// Env var with the per-command timeout in seconds (0 = none).
pub const ENV_SKY_TIMEOUT_SECS: &str = "CARGOPLANE_SKY_TIMEOUT_SECS";

const DEFAULT_BINARY: &str = "sky";

/// How the launcher invokes the sky CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkyConfig {
    /// Program name or path.
    pub binary: String,

    /// Per-command timeout in seconds. 0 disables the timeout.
    pub timeout_secs: u64,

    /// Directory for generated task files; the system temp dir when unset.
    pub workdir: Option<PathBuf>,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout_secs: 0,
            workdir: None,
        }
    }
}

impl SkyConfig {
    /// Defaults overridden by `CARGOPLANE_SKY_BIN` / `CARGOPLANE_SKY_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, SkyError> {
        let mut config = Self::default();
        if let Ok(binary) = std::env::var(ENV_SKY_BIN) {
            if !binary.trim().is_empty() {
                config.binary = binary;
            }
        }
        if let Ok(raw) = std::env::var(ENV_SKY_TIMEOUT_SECS) {
            config.timeout_secs = raw.trim().parse().map_err(|_| {
                SkyError::InvalidConfig(format!("{ENV_SKY_TIMEOUT_SECS}={raw:?} is not a number"))
            })?;
        }
        Ok(config)
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }
}
