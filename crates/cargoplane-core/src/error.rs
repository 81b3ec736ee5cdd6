//! Error taxonomy for CargoPlane.
//!
//! Validation failures are raised before anything reaches a launcher.
//! Launcher failures are carried through unchanged in
//! [`CargoPlaneError::Submission`].

use crate::launcher::LauncherError;
use crate::mounts::MountKind;

/// Malformed job input, detected before any external call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("entrypoint cannot contain whitespace: {entrypoint:?}")]
    EntrypointWhitespace { entrypoint: String },

    #[error("image must not be empty")]
    EmptyImage,

    #[error("image cannot contain whitespace: {image:?}")]
    ImageWhitespace { image: String },

    #[error("malformed {kind} entry {path:?}: {reason}")]
    MalformedMount {
        kind: MountKind,
        path: String,
        reason: String,
    },

    #[error("duplicate {kind} entry: {path:?}")]
    DuplicateMount { kind: MountKind, path: String },

    #[error("conflicting flag {flag:?}: {reason}")]
    ConflictingFlag { flag: String, reason: String },

    #[error("invalid job name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
}

/// Top-level error for CargoPlane operations.
#[derive(Debug, thiserror::Error)]
pub enum CargoPlaneError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("submission error: {0}")]
    Submission(#[from] LauncherError),

    #[error("invalid job configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CargoPlaneError {
    /// True when the error was raised before any launcher call.
    pub fn is_validation(&self) -> bool {
        matches!(self, CargoPlaneError::Validation(_))
    }
}

/// Result type for CargoPlane operations.
pub type Result<T> = std::result::Result<T, CargoPlaneError>;
