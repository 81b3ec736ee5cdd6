//! CargoPlane Core Library
//!
//! Renders a `docker run` command line from a [`JobSpec`] and submits it,
//! along with setup, mounts and resources, to a [`ClusterLauncher`].
//!
//! Provides:
//! - `JobSpec` with its builder, validation and warnings
//! - The `docker run` command builder (`render`)
//! - Typed mount and resource descriptors for the launcher boundary
//! - The `ClusterLauncher` trait, `submit` and `JobSubmitter`
//! - `RecordingLauncher` for tests and dry runs

pub mod command;
pub mod config;
pub mod error;
pub mod fakes;
pub mod launcher;
pub mod mounts;
pub mod obs;
pub mod ordered;
pub mod resources;
pub mod spec;
pub mod submitter;
pub mod telemetry;

pub use command::{render, Args, Cleanup, RenderedCommand};
pub use config::{load_job_spec, parse_job_spec, JobFileFormat};
pub use error::{CargoPlaneError, Result, ValidationError};
pub use launcher::{
    ClusterLauncher, LaunchHandle, LaunchPath, LauncherError, LauncherResult, TaskDescriptor,
};
pub use mounts::{
    ContainerMount, FileMount, MountKind, StorageDescriptor, StorageMode, StorageMount, StoreKind,
};
pub use ordered::OrderedMap;
pub use resources::{AcceleratorRequest, Quantity, ResourceRequest};
pub use spec::{JobSpec, JobSpecBuilder, SpecWarning};
pub use submitter::{submit, JobSubmitter};
pub use telemetry::{init_tracing, LogFormat};

/// CargoPlane version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
