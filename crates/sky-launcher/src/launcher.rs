//! `ClusterLauncher` implementation that shells out to the sky CLI.
//!
//! Each launch writes the task as a YAML file and runs either
//! `sky jobs launch` (managed spot job) or `sky launch` (on-demand cluster).

use std::io::Write;

use async_trait::async_trait;
use cargoplane_core::{
    ClusterLauncher, LaunchHandle, LaunchPath, LauncherError, LauncherResult, TaskDescriptor,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::SkyConfig;
use crate::error::SkyError;
use crate::runner::run_command;
use crate::task_yaml::render_task_yaml;
use crate::BACKEND;

const NAME_PREFIX: &str = "cargoplane";

/// Launcher backed by the sky CLI.
#[derive(Debug, Clone, Default)]
pub struct SkyLauncher {
    config: SkyConfig,
}

impl SkyLauncher {
    pub fn new(config: SkyConfig) -> Self {
        Self { config }
    }

    /// Launcher configured from `CARGOPLANE_SKY_*` env vars.
    pub fn from_env() -> Result<Self, SkyError> {
        Ok(Self::new(SkyConfig::from_env()?))
    }

    pub fn config(&self) -> &SkyConfig {
        &self.config
    }

    fn write_task_file(&self, task: &TaskDescriptor, spot: bool) -> Result<NamedTempFile, SkyError> {
        let yaml = render_task_yaml(task, spot)?;
        let mut builder = tempfile::Builder::new();
        builder.prefix("cargoplane-task-").suffix(".yaml");
        let mut file = match &self.config.workdir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(yaml.as_bytes())?;
        file.flush()?;
        debug!(path = %file.path().display(), "wrote sky task file");
        Ok(file)
    }

    async fn launch(
        &self,
        task: &TaskDescriptor,
        path: LaunchPath,
    ) -> Result<LaunchHandle, SkyError> {
        let name = launch_name(task);
        let spot = matches!(path, LaunchPath::CostOptimized);
        let file = self.write_task_file(task, spot)?;
        let task_path = file.path().to_string_lossy().to_string();

        let args = launch_args(&name, path, &task_path);
        info!(name = %name, path = %path, "launching via sky");
        let output = run_command(&self.config.binary, &args, self.config.timeout_secs).await?;
        debug!(duration_ms = output.duration_ms, "sky command finished");

        let mut handle = LaunchHandle::new(name, BACKEND, path);
        let stdout = output.stdout.trim();
        if !stdout.is_empty() {
            handle = handle.with_detail(stdout);
        }
        Ok(handle)
    }
}

/// The job or cluster name, generated when the task has none.
fn launch_name(task: &TaskDescriptor) -> String {
    match task.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("{NAME_PREFIX}-{}", &id[..8])
        }
    }
}

/// CLI arguments for a launch through `path`.
fn launch_args(name: &str, path: LaunchPath, task_file: &str) -> Vec<String> {
    let mut args: Vec<String> = match path {
        LaunchPath::CostOptimized => vec!["jobs".into(), "launch".into(), "--yes".into()],
        LaunchPath::Standard { .. } => vec!["launch".into(), "--yes".into()],
    };
    match path {
        LaunchPath::CostOptimized => {
            args.push("--name".into());
            args.push(name.to_string());
        }
        LaunchPath::Standard { auto_teardown } => {
            args.push("--cluster".into());
            args.push(name.to_string());
            if auto_teardown {
                args.push("--down".into());
            }
        }
    }
    args.push(task_file.to_string());
    args
}

#[async_trait]
impl ClusterLauncher for SkyLauncher {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn define_task(
        &self,
        setup: Option<&str>,
        run: &str,
        name: Option<&str>,
    ) -> LauncherResult<TaskDescriptor> {
        if run.trim().is_empty() {
            return Err(LauncherError::TaskDefinition("run command is empty".into()));
        }
        let setup = setup.filter(|s| !s.trim().is_empty());
        Ok(TaskDescriptor::new(setup, run).with_name(name))
    }

    async fn launch_cost_optimized(&self, task: TaskDescriptor) -> LauncherResult<LaunchHandle> {
        Ok(self.launch(&task, LaunchPath::CostOptimized).await?)
    }

    async fn launch_standard(
        &self,
        task: TaskDescriptor,
        auto_teardown: bool,
    ) -> LauncherResult<LaunchHandle> {
        Ok(self
            .launch(&task, LaunchPath::Standard { auto_teardown })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_job_args() {
        let args = launch_args("train", LaunchPath::CostOptimized, "/tmp/t.yaml");
        assert_eq!(
            args,
            vec!["jobs", "launch", "--yes", "--name", "train", "/tmp/t.yaml"]
        );
    }

    #[test]
    fn test_cluster_args_with_teardown() {
        let args = launch_args(
            "train",
            LaunchPath::Standard {
                auto_teardown: true,
            },
            "/tmp/t.yaml",
        );
        assert_eq!(
            args,
            vec!["launch", "--yes", "--cluster", "train", "--down", "/tmp/t.yaml"]
        );
    }

    #[test]
    fn test_cluster_args_keep_running() {
        let args = launch_args(
            "train",
            LaunchPath::Standard {
                auto_teardown: false,
            },
            "/tmp/t.yaml",
        );
        assert!(!args.contains(&"--down".to_string()));
    }

    #[test]
    fn test_generated_name() {
        let name = launch_name(&TaskDescriptor::new(None, "docker run x"));
        assert!(name.starts_with("cargoplane-"));
        assert_eq!(name.len(), "cargoplane-".len() + 8);

        let named = TaskDescriptor::new(None, "docker run x").with_name(Some("job"));
        assert_eq!(launch_name(&named), "job");
    }

    #[tokio::test]
    async fn test_define_task_rejects_empty_run() {
        let launcher = SkyLauncher::default();
        let err = launcher.define_task(None, "  ", None).await.unwrap_err();
        assert!(matches!(err, LauncherError::TaskDefinition(_)));
    }

    #[tokio::test]
    async fn test_define_task_drops_blank_setup() {
        let launcher = SkyLauncher::default();
        let task = launcher
            .define_task(Some(""), "docker run x", Some("job"))
            .await
            .unwrap();
        assert!(task.setup.is_none());
        assert_eq!(task.name.as_deref(), Some("job"));
    }
}
