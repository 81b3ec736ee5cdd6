//! Cluster launcher boundary.
//!
//! Provisioning, spot bidding, remote execution and teardown all belong to
//! an external launcher. This module defines the shapes CargoPlane hands
//! across that boundary and the [`ClusterLauncher`] trait that a backend
//! implements. An in-memory implementation lives in [`crate::fakes`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mounts::{FileMount, StorageDescriptor, StorageMount};
use crate::resources::ResourceRequest;

/// Failures surfaced by a launcher while defining or dispatching a task.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("task definition failed: {0}")]
    TaskDefinition(String),

    #[error("invalid resource request: {0}")]
    InvalidResources(String),

    #[error("invalid storage for {mount}: {reason}")]
    InvalidStorage { mount: String, reason: String },

    #[error("attaching to task failed: {0}")]
    Attachment(String),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("{backend} backend error: {message}")]
    Backend { backend: String, message: String },
}

/// Result type for launcher operations.
pub type LauncherResult<T> = std::result::Result<T, LauncherError>;

/// What to run, where, with which mounts and resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,

    pub run: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_mounts: Vec<FileMount>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_mounts: Vec<StorageMount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequest>,
}

impl TaskDescriptor {
    pub fn new(setup: Option<&str>, run: impl Into<String>) -> Self {
        Self {
            name: None,
            setup: setup.map(str::to_string),
            run: run.into(),
            file_mounts: Vec::new(),
            storage_mounts: Vec::new(),
            resources: None,
        }
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = name.map(str::to_string);
        self
    }
}

/// Which launcher entry point a task was dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "path")]
pub enum LaunchPath {
    /// Spot / preemptible capacity; teardown is the launcher's business.
    CostOptimized,
    /// On-demand capacity with caller-controlled teardown.
    Standard { auto_teardown: bool },
}

impl std::fmt::Display for LaunchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchPath::CostOptimized => write!(f, "cost_optimized"),
            LaunchPath::Standard { auto_teardown } => {
                write!(f, "standard(auto_teardown={auto_teardown})")
            }
        }
    }
}

/// Whatever the launcher hands back for a dispatched task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchHandle {
    /// Launcher-assigned identifier (job id, cluster name, ...).
    pub launch_id: String,
    /// Name of the launcher that produced this handle.
    pub backend: String,
    pub path: LaunchPath,
    pub submitted_at: DateTime<Utc>,
    /// Free-form launcher output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LaunchHandle {
    pub fn new(launch_id: impl Into<String>, backend: impl Into<String>, path: LaunchPath) -> Self {
        Self {
            launch_id: launch_id.into(),
            backend: backend.into(),
            path,
            submitted_at: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// External collaborator that provisions instances and runs tasks on them.
///
/// Every call may block for as long as the backend needs; no timeout is
/// imposed by the caller. Attachment and translation methods have default
/// implementations that work on the plain descriptor types, so a backend
/// usually only implements task definition and the two launch entry points.
#[async_trait]
pub trait ClusterLauncher: Send + Sync {
    /// Short backend name used in handles and logs.
    fn name(&self) -> &str;

    /// Create a task descriptor for a setup script and run command.
    async fn define_task(
        &self,
        setup: Option<&str>,
        run: &str,
        name: Option<&str>,
    ) -> LauncherResult<TaskDescriptor>;

    async fn attach_file_mounts(
        &self,
        task: &mut TaskDescriptor,
        mounts: Vec<FileMount>,
    ) -> LauncherResult<()> {
        task.file_mounts.extend(mounts);
        Ok(())
    }

    async fn attach_storage_mounts(
        &self,
        task: &mut TaskDescriptor,
        mounts: Vec<StorageMount>,
    ) -> LauncherResult<()> {
        task.storage_mounts.extend(mounts);
        Ok(())
    }

    async fn attach_resources(
        &self,
        task: &mut TaskDescriptor,
        request: ResourceRequest,
    ) -> LauncherResult<()> {
        task.resources = Some(request);
        Ok(())
    }

    /// Build a resource request from the launcher's generic resource schema.
    fn resources_from_config(&self, config: &serde_json::Value) -> LauncherResult<ResourceRequest> {
        ResourceRequest::from_config(config).map_err(LauncherError::InvalidResources)
    }

    /// Build a storage descriptor from a generic storage config.
    fn storage_from_config(
        &self,
        mount: &str,
        config: &serde_json::Value,
    ) -> LauncherResult<StorageDescriptor> {
        StorageDescriptor::from_config(config).map_err(|reason| LauncherError::InvalidStorage {
            mount: mount.to_string(),
            reason,
        })
    }

    /// Spot / preemptible entry point. Teardown policy is internal.
    async fn launch_cost_optimized(&self, task: TaskDescriptor) -> LauncherResult<LaunchHandle>;

    /// On-demand entry point.
    async fn launch_standard(
        &self,
        task: TaskDescriptor,
        auto_teardown: bool,
    ) -> LauncherResult<LaunchHandle>;
}
