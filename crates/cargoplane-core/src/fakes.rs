//! In-memory launcher for tests and dry runs.
//!
//! [`RecordingLauncher`] satisfies the [`ClusterLauncher`] contract without
//! provisioning anything. It records every call in order and can be told to
//! fail at a chosen stage.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::launcher::{
    ClusterLauncher, LaunchHandle, LaunchPath, LauncherError, LauncherResult, TaskDescriptor,
};
use crate::mounts::{FileMount, StorageMount};
use crate::resources::ResourceRequest;

const BACKEND: &str = "memory";

/// One recorded launcher call.
#[derive(Debug, Clone, PartialEq)]
pub enum LauncherCall {
    DefineTask {
        setup: Option<String>,
        run: String,
        name: Option<String>,
    },
    AttachFileMounts(Vec<FileMount>),
    AttachStorageMounts(Vec<StorageMount>),
    AttachResources(ResourceRequest),
    LaunchCostOptimized(TaskDescriptor),
    LaunchStandard {
        task: TaskDescriptor,
        auto_teardown: bool,
    },
}

/// Stage at which a [`RecordingLauncher`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    DefineTask,
    AttachFileMounts,
    AttachStorageMounts,
    AttachResources,
    Launch,
}

/// Launcher that records calls instead of provisioning.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    calls: Mutex<Vec<LauncherCall>>,
    fail_at: Option<FailurePoint>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher that records calls up to `point` and fails there.
    pub fn failing_at(point: FailurePoint) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_at: Some(point),
        }
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<LauncherCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The task handed to the most recent launch entry point.
    pub fn launched_task(&self) -> Option<TaskDescriptor> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|call| match call {
                LauncherCall::LaunchCostOptimized(task) => Some(task.clone()),
                LauncherCall::LaunchStandard { task, .. } => Some(task.clone()),
                _ => None,
            })
    }

    pub fn cost_optimized_launches(&self) -> usize {
        self.count(|c| matches!(c, LauncherCall::LaunchCostOptimized(_)))
    }

    pub fn standard_launches(&self) -> usize {
        self.count(|c| matches!(c, LauncherCall::LaunchStandard { .. }))
    }

    fn count(&self, pred: impl Fn(&LauncherCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: LauncherCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, point: FailurePoint) -> LauncherResult<()> {
        if self.fail_at != Some(point) {
            return Ok(());
        }
        let message = format!("injected failure at {point:?}");
        Err(match point {
            FailurePoint::DefineTask => LauncherError::TaskDefinition(message),
            FailurePoint::Launch => LauncherError::Launch(message),
            _ => LauncherError::Attachment(message),
        })
    }
}

#[async_trait]
impl ClusterLauncher for RecordingLauncher {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn define_task(
        &self,
        setup: Option<&str>,
        run: &str,
        name: Option<&str>,
    ) -> LauncherResult<TaskDescriptor> {
        self.record(LauncherCall::DefineTask {
            setup: setup.map(str::to_string),
            run: run.to_string(),
            name: name.map(str::to_string),
        });
        self.check(FailurePoint::DefineTask)?;
        Ok(TaskDescriptor::new(setup, run).with_name(name))
    }

    async fn attach_file_mounts(
        &self,
        task: &mut TaskDescriptor,
        mounts: Vec<FileMount>,
    ) -> LauncherResult<()> {
        self.record(LauncherCall::AttachFileMounts(mounts.clone()));
        self.check(FailurePoint::AttachFileMounts)?;
        task.file_mounts.extend(mounts);
        Ok(())
    }

    async fn attach_storage_mounts(
        &self,
        task: &mut TaskDescriptor,
        mounts: Vec<StorageMount>,
    ) -> LauncherResult<()> {
        self.record(LauncherCall::AttachStorageMounts(mounts.clone()));
        self.check(FailurePoint::AttachStorageMounts)?;
        task.storage_mounts.extend(mounts);
        Ok(())
    }

    async fn attach_resources(
        &self,
        task: &mut TaskDescriptor,
        request: ResourceRequest,
    ) -> LauncherResult<()> {
        self.record(LauncherCall::AttachResources(request.clone()));
        self.check(FailurePoint::AttachResources)?;
        task.resources = Some(request);
        Ok(())
    }

    async fn launch_cost_optimized(&self, task: TaskDescriptor) -> LauncherResult<LaunchHandle> {
        let launch_id = format!("{BACKEND}-{}", uuid::Uuid::new_v4());
        self.record(LauncherCall::LaunchCostOptimized(task));
        self.check(FailurePoint::Launch)?;
        Ok(LaunchHandle::new(launch_id, BACKEND, LaunchPath::CostOptimized))
    }

    async fn launch_standard(
        &self,
        task: TaskDescriptor,
        auto_teardown: bool,
    ) -> LauncherResult<LaunchHandle> {
        let launch_id = format!("{BACKEND}-{}", uuid::Uuid::new_v4());
        self.record(LauncherCall::LaunchStandard {
            task,
            auto_teardown,
        });
        self.check(FailurePoint::Launch)?;
        Ok(LaunchHandle::new(
            launch_id,
            BACKEND,
            LaunchPath::Standard { auto_teardown },
        ))
    }
}
