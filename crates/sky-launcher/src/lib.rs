//! Sky Launcher - CargoPlane jobs on the sky CLI
//!
//! Provides a [`SkyLauncher`] that:
//! - Writes tasks as sky task YAML
//! - Submits spot jobs through `sky jobs launch`
//! - Starts on-demand clusters through `sky launch`, optionally with `--down`

pub mod config;
pub mod error;
pub mod launcher;
pub mod runner;
pub mod task_yaml;

/// Backend name reported in handles and errors.
pub const BACKEND: &str = "sky";

pub use config::{SkyConfig, ENV_SKY_BIN, ENV_SKY_TIMEOUT_SECS};
pub use error::SkyError;
pub use launcher::SkyLauncher;
pub use runner::{run_command, CommandOutput};
pub use task_yaml::render_task_yaml;
