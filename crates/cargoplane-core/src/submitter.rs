//! Job submission.
//!
//! Turns a [`JobSpec`] into a [`TaskDescriptor`](crate::launcher::TaskDescriptor)
//! and dispatches it through a [`ClusterLauncher`]. The call path is a single
//! awaited sequence:
//! validate, render, define the task, attach mounts and resources, launch.
//! There are no retries. A launcher error is returned as-is, and any
//! remote state created before the failure is left for the caller.

use std::sync::Arc;

use tracing::{debug, Instrument};

use crate::error::{CargoPlaneError, Result};
use crate::launcher::{ClusterLauncher, LaunchHandle, LaunchPath, LauncherError};
use crate::mounts::{FileMount, StorageMount};
use crate::obs;
use crate::spec::JobSpec;

const UNNAMED_JOB: &str = "unnamed";

/// Submit `spec` through `launcher` and return the launcher's handle unchanged.
pub async fn submit<L>(launcher: &L, spec: &JobSpec) -> Result<LaunchHandle>
where
    L: ClusterLauncher + ?Sized,
{
    let warnings = spec.validate()?;
    let command = spec.render_unchecked()?;

    let span = obs::job_span(
        spec.name.as_deref().unwrap_or(UNNAMED_JOB),
        &command.short_digest(),
    );

    async move {
        for warning in &warnings {
            obs::emit_spec_warning(warning);
        }
        obs::emit_job_rendered(&spec.image, command.as_str());

        dispatch(launcher, spec, command.as_str())
            .await
            .map_err(CargoPlaneError::from)
    }
    .instrument(span)
    .await
}

async fn dispatch<L>(
    launcher: &L,
    spec: &JobSpec,
    run: &str,
) -> std::result::Result<LaunchHandle, LauncherError>
where
    L: ClusterLauncher + ?Sized,
{
    let backend = launcher.name().to_string();
    let failed = |stage: &'static str| {
        let backend = backend.clone();
        move |err: LauncherError| {
            obs::emit_submission_failed(&backend, stage, &err);
            err
        }
    };

    let mut task = launcher
        .define_task(spec.setup.as_deref(), run, spec.name.as_deref())
        .await
        .map_err(failed("define_task"))?;

    if !spec.file_mounts.is_empty() {
        let mounts: Vec<FileMount> = spec
            .file_mounts
            .iter()
            .map(|(remote, source)| FileMount {
                remote: remote.to_string(),
                source: source.clone(),
            })
            .collect();
        debug!(count = mounts.len(), "attaching file mounts");
        launcher
            .attach_file_mounts(&mut task, mounts)
            .await
            .map_err(failed("attach_file_mounts"))?;
    }

    if !spec.storage_mounts.is_empty() {
        let mounts = spec
            .storage_mounts
            .iter()
            .map(|(path, config)| {
                launcher
                    .storage_from_config(path, config)
                    .map(|storage| StorageMount {
                        mount_path: path.to_string(),
                        storage,
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(failed("storage_from_config"))?;
        debug!(count = mounts.len(), "attaching storage mounts");
        launcher
            .attach_storage_mounts(&mut task, mounts)
            .await
            .map_err(failed("attach_storage_mounts"))?;
    }

    if let Some(config) = &spec.resources {
        let request = launcher
            .resources_from_config(config)
            .map_err(failed("resources_from_config"))?;
        launcher
            .attach_resources(&mut task, request)
            .await
            .map_err(failed("attach_resources"))?;
    }

    let handle = if spec.use_spot {
        obs::emit_job_dispatched(&backend, LaunchPath::CostOptimized);
        launcher
            .launch_cost_optimized(task)
            .await
            .map_err(failed("launch_cost_optimized"))?
    } else {
        let auto_teardown = spec.auto_teardown();
        obs::emit_job_dispatched(&backend, LaunchPath::Standard { auto_teardown });
        launcher
            .launch_standard(task, auto_teardown)
            .await
            .map_err(failed("launch_standard"))?
    };

    obs::emit_job_submitted(&handle);
    Ok(handle)
}

/// Holds a shared launcher and submits jobs through it.
///
/// Submissions share no state beyond the launcher itself, so one submitter
/// can serve concurrent callers.
pub struct JobSubmitter<L: ?Sized> {
    launcher: Arc<L>,
}

impl<L: ?Sized> Clone for JobSubmitter<L> {
    fn clone(&self) -> Self {
        Self {
            launcher: Arc::clone(&self.launcher),
        }
    }
}

impl<L> JobSubmitter<L>
where
    L: ClusterLauncher + ?Sized,
{
    pub fn new(launcher: Arc<L>) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &Arc<L> {
        &self.launcher
    }

    pub async fn submit(&self, spec: &JobSpec) -> Result<LaunchHandle> {
        submit(self.launcher.as_ref(), spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{LauncherCall, RecordingLauncher};
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Collects the `event` field of every log line.
    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<String>>>);

    impl EventLog {
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct EventField(Option<String>);

    impl Visit for EventField {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "event" {
                self.0 = Some(value.to_string());
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "event" {
                self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for EventLog {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut field = EventField(None);
            event.record(&mut field);
            if let Some(name) = field.0 {
                self.0.lock().unwrap().push(name);
            }
        }
    }

    async fn submit_logged(spec: &JobSpec) -> Vec<String> {
        let log = EventLog::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        submit(&RecordingLauncher::new(), spec).await.unwrap();
        log.events()
    }

    #[tokio::test]
    async fn test_submit_logs_auto_teardown_warning_on_spot() {
        let spec = JobSpec::builder("img").auto_teardown(false).build().unwrap();
        let events = submit_logged(&spec).await;

        let warning = events.iter().position(|e| e == "job.spec_warning");
        let dispatched = events.iter().position(|e| e == "job.dispatched");
        assert!(warning.is_some(), "events: {events:?}");
        assert!(warning < dispatched);
        assert_eq!(events.last().map(String::as_str), Some("job.submitted"));
    }

    #[tokio::test]
    async fn test_submit_logs_no_warning_without_conflict() {
        for spec in [
            JobSpec::builder("img").build().unwrap(),
            JobSpec::builder("img")
                .use_spot(false)
                .auto_teardown(false)
                .build()
                .unwrap(),
        ] {
            let events = submit_logged(&spec).await;
            assert!(!events.iter().any(|e| e == "job.spec_warning"));
            assert!(events.iter().any(|e| e == "job.submitted"));
        }
    }

    #[tokio::test]
    async fn test_spot_path_ignores_auto_teardown() {
        let launcher = RecordingLauncher::new();
        let spec = JobSpec::builder("img").auto_teardown(false).build().unwrap();

        let handle = submit(&launcher, &spec).await.unwrap();
        assert_eq!(handle.path, LaunchPath::CostOptimized);
        assert_eq!(launcher.cost_optimized_launches(), 1);
        assert_eq!(launcher.standard_launches(), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_calls() {
        let launcher = RecordingLauncher::new();
        let mut spec = JobSpec::new("img");
        spec.entrypoint = Some("python main.py".into());

        let err = submit(&launcher, &spec).await.unwrap_err();
        assert!(matches!(err, CargoPlaneError::Validation(_)));
        assert!(launcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submitter_shares_launcher() {
        let launcher = Arc::new(RecordingLauncher::new());
        let submitter = JobSubmitter::new(Arc::clone(&launcher));
        let other = submitter.clone();

        submitter.submit(&JobSpec::new("a")).await.unwrap();
        other.submit(&JobSpec::new("b")).await.unwrap();

        let defined = launcher
            .calls()
            .into_iter()
            .filter(|c| matches!(c, LauncherCall::DefineTask { .. }))
            .count();
        assert_eq!(defined, 2);
    }
}
