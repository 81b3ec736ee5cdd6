//! Error types for sky-launcher

use cargoplane_core::LauncherError;
use thiserror::Error;

/// Errors raised while driving the sky CLI
#[derive(Error, Debug)]
pub enum SkyError {
    /// Binary missing from PATH
    #[error("sky CLI not found: {0}")]
    SkyNotFound(String),

    /// Non-zero exit from the CLI
    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Command ran past the configured timeout
    #[error("`{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    /// Bad launcher settings
    #[error("invalid sky launcher config: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Task file serialization
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<SkyError> for LauncherError {
    fn from(err: SkyError) -> Self {
        LauncherError::Backend {
            backend: crate::BACKEND.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_backend_error() {
        let err: LauncherError = SkyError::CommandFailed {
            command: "sky launch".into(),
            exit_code: 1,
            stderr: "quota exceeded".into(),
        }
        .into();
        match err {
            LauncherError::Backend { backend, message } => {
                assert_eq!(backend, "sky");
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
