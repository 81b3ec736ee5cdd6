//! Mount descriptors and mount-mapping validation.
//!
//! Three kinds of mounts travel with a job:
//! - container mounts bind a path on the instance into the container (`-v`)
//! - file mounts stage a local path or cloud URI onto the instance
//! - storage mounts attach a durable bucket to a path on the instance

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ordered::OrderedMap;

/// Which mapping a mount entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountKind {
    Container,
    File,
    Storage,
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountKind::Container => write!(f, "container_mounts"),
            MountKind::File => write!(f, "file_mounts"),
            MountKind::Storage => write!(f, "storage_mounts"),
        }
    }
}

/// A host-to-container bind, rendered as `-v host:container`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMount {
    pub host: String,
    pub container: String,
}

impl ContainerMount {
    pub fn new(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }

    /// The `docker run` flag for this bind.
    pub fn to_flag(&self) -> String {
        format!("-v {}:{}", self.host, self.container)
    }
}

impl FromStr for ContainerMount {
    type Err = ValidationError;

    /// Parse the `HOST:CONTAINER` form used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, container) = s.split_once(':').ok_or_else(|| ValidationError::MalformedMount {
            kind: MountKind::Container,
            path: s.to_string(),
            reason: "expected HOST:CONTAINER".into(),
        })?;
        check_bind_side(host, "host")?;
        check_container_side(host, container)?;
        Ok(ContainerMount::new(host, container))
    }
}

/// A local path or cloud URI staged onto the instance at `remote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMount {
    pub remote: String,
    pub source: String,
}

/// Object store backing a storage mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    S3,
    Gcs,
    Azure,
    R2,
    Ibm,
}

impl StoreKind {
    /// Infer the store from a bucket URI scheme.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (scheme, _) = uri.split_once("://")?;
        match scheme {
            "s3" => Some(StoreKind::S3),
            "gs" => Some(StoreKind::Gcs),
            "https" if uri.contains(".blob.core.windows.net") => Some(StoreKind::Azure),
            "r2" => Some(StoreKind::R2),
            "cos" => Some(StoreKind::Ibm),
            _ => None,
        }
    }
}

/// How a bucket is exposed on the instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageMode {
    #[default]
    #[serde(alias = "mount")]
    Mount,
    #[serde(alias = "copy")]
    Copy,
}

fn default_persistent() -> bool {
    true
}

/// Backing-store reference for a storage mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreKind>,

    #[serde(default)]
    pub mode: StorageMode,

    #[serde(default = "default_persistent")]
    pub persistent: bool,
}

impl StorageDescriptor {
    /// Storage backed by an existing bucket URI.
    pub fn from_source(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            name: None,
            store: StoreKind::from_uri(&source),
            source: Some(source),
            mode: StorageMode::Mount,
            persistent: true,
        }
    }

    /// Build a descriptor from a generic storage config mapping.
    ///
    /// Accepts the launcher's storage keys (`name`, `source`, `store`,
    /// `mode`, `persistent`); anything else is rejected.
    pub fn from_config(config: &serde_json::Value) -> Result<Self, String> {
        let mut descriptor: StorageDescriptor =
            serde_json::from_value(config.clone()).map_err(|e| e.to_string())?;

        if descriptor.name.is_none() && descriptor.source.is_none() {
            return Err("storage needs at least one of `name` or `source`".into());
        }
        if descriptor.store.is_none() {
            descriptor.store = descriptor.source.as_deref().and_then(StoreKind::from_uri);
        }
        Ok(descriptor)
    }
}

/// A storage descriptor attached at a path on the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMount {
    pub mount_path: String,
    pub storage: StorageDescriptor,
}

fn malformed(kind: MountKind, path: &str, reason: &str) -> ValidationError {
    ValidationError::MalformedMount {
        kind,
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn check_bind_side(value: &str, side: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(malformed(
            MountKind::Container,
            value,
            &format!("{side} path must not be empty"),
        ));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(malformed(
            MountKind::Container,
            value,
            &format!("{side} path cannot contain whitespace"),
        ));
    }
    if value.contains(':') {
        return Err(malformed(
            MountKind::Container,
            value,
            &format!("{side} path cannot contain ':'"),
        ));
    }
    Ok(())
}

/// Check the container side of a bind, `PATH[:OPTIONS]`, and return `PATH`.
///
/// Options are docker's comma-separated bind options (`ro`, `rw,z`, ...).
fn check_container_side<'a>(host: &str, container: &'a str) -> Result<&'a str, ValidationError> {
    let (path, options) = match container.split_once(':') {
        Some((path, options)) => (path, Some(options)),
        None => (container, None),
    };
    check_bind_side(path, "container")?;
    if !path.starts_with('/') {
        return Err(malformed(
            MountKind::Container,
            host,
            "container path must be absolute",
        ));
    }
    if let Some(options) = options {
        let valid = !options.is_empty()
            && options
                .split(',')
                .all(|opt| !opt.is_empty() && opt.chars().all(|c| c.is_ascii_alphanumeric()));
        if !valid {
            return Err(malformed(
                MountKind::Container,
                container,
                "bind options must be comma-separated words, e.g. ro or rw,z",
            ));
        }
    }
    Ok(path)
}

/// Validate the container bind mapping.
///
/// Host sides must be single tokens without `:`. Container sides are an
/// absolute path with optional bind options (`/data:ro`). Neither the host
/// nor the container path may repeat.
pub fn validate_container_mounts(mounts: &OrderedMap<String>) -> Result<(), ValidationError> {
    let mut hosts = HashSet::new();
    let mut targets = HashSet::new();

    for (host, container) in mounts.iter() {
        check_bind_side(host, "host")?;
        let target = check_container_side(host, container)?;
        if !hosts.insert(host) {
            return Err(ValidationError::DuplicateMount {
                kind: MountKind::Container,
                path: host.to_string(),
            });
        }
        if !targets.insert(target) {
            return Err(ValidationError::DuplicateMount {
                kind: MountKind::Container,
                path: target.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate the instance-side targets of file or storage mounts.
pub fn validate_mount_targets<'a>(
    kind: MountKind,
    targets: impl IntoIterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for target in targets {
        if target.is_empty() {
            return Err(malformed(kind, target, "mount path must not be empty"));
        }
        if target.chars().any(char::is_whitespace) {
            return Err(malformed(kind, target, "mount path cannot contain whitespace"));
        }
        if !(target.starts_with('/') || target.starts_with("~/")) {
            return Err(malformed(
                kind,
                target,
                "mount path must be absolute or start with ~/",
            ));
        }
        if !seen.insert(target) {
            return Err(ValidationError::DuplicateMount {
                kind,
                path: target.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate the file mount mapping: targets plus non-empty sources.
pub fn validate_file_mounts(mounts: &OrderedMap<String>) -> Result<(), ValidationError> {
    validate_mount_targets(MountKind::File, mounts.keys())?;
    for (remote, source) in mounts.iter() {
        if source.trim().is_empty() {
            return Err(malformed(MountKind::File, remote, "source must not be empty"));
        }
    }
    Ok(())
}

/// Validate the storage mount mapping: targets plus mapping-shaped configs.
///
/// The content of each config is checked by the launcher when it is
/// translated into a [`StorageDescriptor`].
pub fn validate_storage_mounts(
    mounts: &OrderedMap<serde_json::Value>,
) -> Result<(), ValidationError> {
    validate_mount_targets(MountKind::Storage, mounts.keys())?;
    for (path, config) in mounts.iter() {
        if !config.is_object() {
            return Err(malformed(
                MountKind::Storage,
                path,
                "storage config must be a mapping",
            ));
        }
    }
    Ok(())
}

/// Reject instance paths claimed by both a file mount and a storage mount.
///
/// Both kinds land in one mapping on the launcher side, so a shared target
/// cannot be expressed.
pub fn validate_disjoint_targets(
    file_mounts: &OrderedMap<String>,
    storage_mounts: &OrderedMap<serde_json::Value>,
) -> Result<(), ValidationError> {
    match storage_mounts
        .keys()
        .find(|path| file_mounts.get(path).is_some())
    {
        Some(path) => Err(ValidationError::DuplicateMount {
            kind: MountKind::Storage,
            path: path.to_string(),
        }),
        None => Ok(()),
    }
}
