//! Job file loading.
//!
//! Job files are JSON or YAML documents with the fields of [`JobSpec`].
//! Unknown fields are rejected and the loaded spec is validated before it
//! is returned.

use std::path::Path;

use tracing::debug;

use crate::error::{CargoPlaneError, Result};
use crate::spec::JobSpec;

/// Serialization format of a job file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFileFormat {
    Json,
    Yaml,
}

impl JobFileFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(JobFileFormat::Json),
            Some("yaml") | Some("yml") => Ok(JobFileFormat::Yaml),
            other => Err(CargoPlaneError::Config(format!(
                "unsupported job file extension {:?} for {}; expected .json, .yaml or .yml",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }
}

/// Parse a job document without validating it.
pub fn parse_job_spec(contents: &str, format: JobFileFormat) -> Result<JobSpec> {
    let spec = match format {
        JobFileFormat::Json => serde_json::from_str(contents)?,
        JobFileFormat::Yaml => serde_yaml::from_str(contents)?,
    };
    Ok(spec)
}

/// Load and validate a job file.
pub fn load_job_spec(path: &Path) -> Result<JobSpec> {
    let format = JobFileFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)?;
    let spec = parse_job_spec(&contents, format)?;
    spec.validate()?;
    debug!(path = %path.display(), image = %spec.image, "loaded job file");
    Ok(spec)
}
