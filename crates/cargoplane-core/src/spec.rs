//! Job specification.
//!
//! A [`JobSpec`] describes one container run: what to execute, how to
//! prepare the instance, and where to run it. It is built once per
//! submission, validated, rendered, submitted and dropped.

use serde::{Deserialize, Serialize};

use crate::command::{self, Args, Cleanup, RenderedCommand};
use crate::error::ValidationError;
use crate::mounts;
use crate::ordered::OrderedMap;

/// Longest job name accepted by cloud launchers for cluster names.
pub const MAX_NAME_LEN: usize = 63;

fn default_use_spot() -> bool {
    true
}

/// Non-fatal findings surfaced during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "warning")]
pub enum SpecWarning {
    /// `auto_teardown: false` was requested on the spot path, where the
    /// launcher owns teardown and the flag has no effect.
    AutoTeardownIgnored,
}

impl std::fmt::Display for SpecWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecWarning::AutoTeardownIgnored => write!(
                f,
                "auto_teardown=false has no effect with use_spot=true; the spot launcher manages teardown"
            ),
        }
    }
}

/// Everything needed to run one container job on a launched instance.
///
/// Fields are read-only outside the crate. Build a spec with
/// [`JobSpec::builder`] or load one from a job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    /// Task / cluster name handed to the launcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,

    /// Container image to run. Registry auth belongs in `setup`.
    pub(crate) image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) entrypoint: Option<String>,

    #[serde(default, skip_serializing_if = "Args::is_empty")]
    pub(crate) args: Args,

    /// Raw flags inserted right after `docker run`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) docker_flags: Vec<String>,

    /// Instance path -> container path.
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub(crate) container_mounts: OrderedMap<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) cleanup: Option<Cleanup>,

    /// Runs on the instance before the container starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) setup: Option<String>,

    /// Launcher resource schema (cloud, accelerators, cpus, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) resources: Option<serde_json::Value>,

    /// Instance path -> local path or cloud URI.
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub(crate) file_mounts: OrderedMap<String>,

    /// Instance path -> storage config.
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub(crate) storage_mounts: OrderedMap<serde_json::Value>,

    #[serde(default = "default_use_spot")]
    pub(crate) use_spot: bool,

    /// `None` means "not specified" and behaves as `true`.
    #[serde(default, alias = "down", skip_serializing_if = "Option::is_none")]
    pub(crate) auto_teardown: Option<bool>,
}

impl JobSpec {
    /// A spec that only names an image; every other field is at its default.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: None,
            image: image.into(),
            entrypoint: None,
            args: Args::default(),
            docker_flags: Vec::new(),
            container_mounts: OrderedMap::new(),
            cleanup: None,
            setup: None,
            resources: None,
            file_mounts: OrderedMap::new(),
            storage_mounts: OrderedMap::new(),
            use_spot: true,
            auto_teardown: None,
        }
    }

    pub fn builder(image: impl Into<String>) -> JobSpecBuilder {
        JobSpecBuilder {
            spec: JobSpec::new(image),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn docker_flags(&self) -> &[String] {
        &self.docker_flags
    }

    pub fn container_mounts(&self) -> &OrderedMap<String> {
        &self.container_mounts
    }

    pub fn cleanup(&self) -> Option<&Cleanup> {
        self.cleanup.as_ref()
    }

    pub fn setup(&self) -> Option<&str> {
        self.setup.as_deref()
    }

    pub fn resources(&self) -> Option<&serde_json::Value> {
        self.resources.as_ref()
    }

    pub fn file_mounts(&self) -> &OrderedMap<String> {
        &self.file_mounts
    }

    pub fn storage_mounts(&self) -> &OrderedMap<serde_json::Value> {
        &self.storage_mounts
    }

    pub fn use_spot(&self) -> bool {
        self.use_spot
    }

    /// Effective teardown flag for the standard launch path.
    pub fn auto_teardown(&self) -> bool {
        self.auto_teardown.unwrap_or(true)
    }

    /// The teardown flag as written; `None` when it was left unset.
    pub fn requested_auto_teardown(&self) -> Option<bool> {
        self.auto_teardown
    }

    /// Validate every field. Returns the warnings on success.
    pub fn validate(&self) -> Result<Vec<SpecWarning>, ValidationError> {
        validate_image(&self.image)?;
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(entrypoint) = self.entrypoint.as_deref() {
            command::check_entrypoint(entrypoint)?;
        }
        self.check_flag_conflicts()?;
        mounts::validate_container_mounts(&self.container_mounts)?;
        mounts::validate_file_mounts(&self.file_mounts)?;
        mounts::validate_storage_mounts(&self.storage_mounts)?;
        mounts::validate_disjoint_targets(&self.file_mounts, &self.storage_mounts)?;
        self.check_spot_conflict()?;
        Ok(self.warnings())
    }

    pub fn warnings(&self) -> Vec<SpecWarning> {
        let mut warnings = Vec::new();
        if self.use_spot && self.auto_teardown == Some(false) {
            warnings.push(SpecWarning::AutoTeardownIgnored);
        }
        warnings
    }

    /// Validate, then render the container command line.
    pub fn render(&self) -> Result<RenderedCommand, ValidationError> {
        self.validate()?;
        self.render_unchecked()
    }

    pub(crate) fn render_unchecked(&self) -> Result<RenderedCommand, ValidationError> {
        command::render(
            &self.image,
            self.entrypoint.as_deref(),
            &self.args,
            &self.docker_flags,
            &self.container_mounts,
            self.cleanup.as_ref(),
        )
    }

    fn check_flag_conflicts(&self) -> Result<(), ValidationError> {
        let has_entrypoint = self.entrypoint.as_deref().is_some_and(|e| !e.is_empty());
        if !has_entrypoint {
            return Ok(());
        }
        match self
            .docker_flags
            .iter()
            .find(|flag| flag.trim_start().starts_with("--entrypoint"))
        {
            Some(flag) => Err(ValidationError::ConflictingFlag {
                flag: flag.clone(),
                reason: "entrypoint is already set; use one or the other".into(),
            }),
            None => Ok(()),
        }
    }

    fn check_spot_conflict(&self) -> Result<(), ValidationError> {
        let requested = self
            .resources
            .as_ref()
            .and_then(|r| r.get("use_spot"))
            .and_then(serde_json::Value::as_bool);
        match requested {
            Some(resource_spot) if resource_spot != self.use_spot => {
                Err(ValidationError::ConflictingFlag {
                    flag: "resources.use_spot".into(),
                    reason: format!(
                        "resources.use_spot={resource_spot} disagrees with use_spot={}",
                        self.use_spot
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}

fn validate_image(image: &str) -> Result<(), ValidationError> {
    if image.trim().is_empty() {
        return Err(ValidationError::EmptyImage);
    }
    if image.chars().any(char::is_whitespace) {
        return Err(ValidationError::ImageWhitespace {
            image: image.to_string(),
        });
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name cannot exceed 63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(
            "name can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }
    Ok(())
}

/// Fluent construction of a validated [`JobSpec`].
#[derive(Debug, Clone)]
pub struct JobSpecBuilder {
    spec: JobSpec,
}

impl JobSpecBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.spec.name = Some(name.into());
        self
    }

    pub fn entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.spec.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        match &mut self.spec.args {
            Args::List(items) => items.push(arg.into()),
            Args::Line(line) => {
                let mut items = vec![std::mem::take(line)];
                items.push(arg.into());
                self.spec.args = Args::List(items);
            }
        }
        self
    }

    pub fn args(mut self, args: impl Into<Args>) -> Self {
        self.spec.args = args.into();
        self
    }

    pub fn docker_flag(mut self, flag: impl Into<String>) -> Self {
        self.spec.docker_flags.push(flag.into());
        self
    }

    pub fn container_mount(mut self, host: impl Into<String>, container: impl Into<String>) -> Self {
        self.spec.container_mounts.insert(host, container.into());
        self
    }

    pub fn cleanup(mut self, cleanup: impl Into<Cleanup>) -> Self {
        self.spec.cleanup = Some(cleanup.into());
        self
    }

    pub fn setup(mut self, setup: impl Into<String>) -> Self {
        self.spec.setup = Some(setup.into());
        self
    }

    pub fn resources(mut self, resources: serde_json::Value) -> Self {
        self.spec.resources = Some(resources);
        self
    }

    pub fn file_mount(mut self, remote: impl Into<String>, source: impl Into<String>) -> Self {
        self.spec.file_mounts.insert(remote, source.into());
        self
    }

    pub fn storage_mount(mut self, path: impl Into<String>, config: serde_json::Value) -> Self {
        self.spec.storage_mounts.insert(path, config);
        self
    }

    pub fn use_spot(mut self, use_spot: bool) -> Self {
        self.spec.use_spot = use_spot;
        self
    }

    pub fn auto_teardown(mut self, auto_teardown: bool) -> Self {
        self.spec.auto_teardown = Some(auto_teardown);
        self
    }

    /// Validate and return the spec.
    pub fn build(self) -> Result<JobSpec, ValidationError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let spec = JobSpec::new("nginx");
        assert!(spec.use_spot);
        assert!(spec.auto_teardown());
        assert!(spec.validate().unwrap().is_empty());
    }

    #[test]
    fn test_builder_renders_example() {
        let spec = JobSpec::builder("worker")
            .entrypoint("run.sh")
            .arg("--fast")
            .cleanup("rm -rf /tmp/x")
            .build()
            .unwrap();
        assert_eq!(
            spec.render().unwrap().as_str(),
            "docker run --entrypoint run.sh worker --fast && rm -rf /tmp/x"
        );
    }

    #[test]
    fn test_empty_and_spaced_image_rejected() {
        assert_eq!(
            JobSpec::builder("  ").build().unwrap_err(),
            ValidationError::EmptyImage
        );
        assert!(matches!(
            JobSpec::builder("ubuntu latest").build().unwrap_err(),
            ValidationError::ImageWhitespace { .. }
        ));
    }

    #[test]
    fn test_name_validation() {
        assert!(JobSpec::builder("img").name("train-v2_a").build().is_ok());
        assert!(matches!(
            JobSpec::builder("img").name("bad name").build().unwrap_err(),
            ValidationError::InvalidName { .. }
        ));
        assert!(JobSpec::builder("img").name("x".repeat(64)).build().is_err());
    }

    #[test]
    fn test_entrypoint_flag_conflict() {
        let err = JobSpec::builder("img")
            .entrypoint("app")
            .docker_flag("--entrypoint=other")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::ConflictingFlag { .. }));

        // Without an entrypoint field the raw flag is passed through.
        assert!(JobSpec::builder("img")
            .docker_flag("--entrypoint=other")
            .build()
            .is_ok());
    }

    #[test]
    fn test_file_and_storage_mount_on_same_path_rejected() {
        let err = JobSpec::builder("img")
            .file_mount("/data", "./local")
            .storage_mount("/data", json!({"source": "s3://b"}))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateMount {
                kind: crate::mounts::MountKind::Storage,
                path: "/data".into()
            }
        );
    }

    #[test]
    fn test_container_mount_with_bind_options() {
        let spec = JobSpec::builder("img")
            .container_mount("/data", "/data:ro")
            .build()
            .unwrap();
        assert_eq!(spec.render().unwrap().as_str(), "docker run -v /data:/data:ro img");
    }

    #[test]
    fn test_resources_spot_conflict() {
        let err = JobSpec::builder("img")
            .resources(json!({"use_spot": false}))
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::ConflictingFlag { flag, .. } if flag == "resources.use_spot"));

        assert!(JobSpec::builder("img")
            .use_spot(false)
            .resources(json!({"use_spot": false}))
            .build()
            .is_ok());
    }

    #[test]
    fn test_auto_teardown_warning_only_on_spot() {
        let spec = JobSpec::builder("img").auto_teardown(false).build().unwrap();
        assert_eq!(spec.warnings(), vec![SpecWarning::AutoTeardownIgnored]);

        let spec = JobSpec::builder("img")
            .use_spot(false)
            .auto_teardown(false)
            .build()
            .unwrap();
        assert!(spec.warnings().is_empty());

        let spec = JobSpec::builder("img").auto_teardown(true).build().unwrap();
        assert!(spec.warnings().is_empty());
    }

    #[test]
    fn test_deserialize_with_aliases_and_defaults() {
        let spec: JobSpec = serde_json::from_value(json!({
            "image": "worker",
            "args": "--epochs 3",
            "cleanup": ["sync", "echo done"],
            "down": false,
        }))
        .unwrap();
        assert!(spec.use_spot);
        assert_eq!(spec.auto_teardown, Some(false));
        assert_eq!(spec.args, Args::Line("--epochs 3".into()));
        assert_eq!(
            spec.render_unchecked().unwrap().as_str(),
            "docker run worker --epochs 3 && sync && echo done"
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = serde_json::from_value::<JobSpec>(json!({"image": "x", "gpus": 1})).unwrap_err();
        assert!(err.to_string().contains("gpus"));
    }

    #[test]
    fn test_arg_after_line_becomes_list() {
        let spec = JobSpec::builder("img").args("-x 1").arg("-y").build().unwrap();
        assert_eq!(spec.render().unwrap().as_str(), "docker run img -x 1 -y");
    }
}
