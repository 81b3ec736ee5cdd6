//! Structured observability hooks for the job submission lifecycle.
//!
//! Every emitter logs an `event` field so log pipelines can filter on
//! lifecycle stage regardless of message text.

use tracing::{info, warn};

use crate::launcher::{LaunchHandle, LaunchPath};
use crate::spec::SpecWarning;

/// Span tagged with the job name and command digest.
///
/// Use with `tracing::Instrument` around async submission code.
pub fn job_span(job_name: &str, command_digest: &str) -> tracing::Span {
    tracing::info_span!("cargoplane.job", job = %job_name, digest = %command_digest)
}

/// RAII guard that enters [`job_span`] for synchronous code.
///
/// # Example
///
/// ```ignore
/// let _span = JobSpan::enter("train", &command.short_digest());
/// // tracing calls here carry job = "train"
/// ```
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    pub fn enter(job_name: &str, command_digest: &str) -> Self {
        Self {
            _span: job_span(job_name, command_digest).entered(),
        }
    }
}

/// Emit event: command rendered.
pub fn emit_job_rendered(image: &str, command: &str) {
    info!(event = "job.rendered", image = %image, command = %command);
}

/// Emit event: a validation warning that does not block submission.
pub fn emit_spec_warning(warning: &SpecWarning) {
    warn!(event = "job.spec_warning", warning = %warning);
}

/// Emit event: task handed to a launch entry point.
pub fn emit_job_dispatched(backend: &str, path: LaunchPath) {
    info!(event = "job.dispatched", backend = %backend, path = %path);
}

/// Emit event: launcher accepted the task.
pub fn emit_job_submitted(handle: &LaunchHandle) {
    info!(
        event = "job.submitted",
        backend = %handle.backend,
        launch_id = %handle.launch_id,
        path = %handle.path,
    );
}

/// Emit event: launcher call failed (warning level).
pub fn emit_submission_failed(backend: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "job.submission_failed", backend = %backend, stage = %stage, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_span_enter_and_drop() {
        let _span = JobSpan::enter("job", "abc123");
    }

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        emit_job_rendered("img", "docker run img");
        emit_spec_warning(&SpecWarning::AutoTeardownIgnored);
        emit_job_dispatched("memory", LaunchPath::CostOptimized);
        let handle = LaunchHandle::new("1", "memory", LaunchPath::CostOptimized);
        emit_job_submitted(&handle);
        emit_submission_failed("memory", "launch", &"boom");
    }
}
