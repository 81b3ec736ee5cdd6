//! Typed resource requests.
//!
//! Job files carry resources as a generic mapping in the launcher's YAML
//! schema. [`ResourceRequest::from_config`] turns that mapping into a typed
//! request at the submission boundary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A quantity that keeps launcher syntax such as `"4+"` or `"16GB"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Int(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Int(n) => write!(f, "{n}"),
            Quantity::Float(n) => write!(f, "{n}"),
            Quantity::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One accelerator type and how many of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorRequest {
    pub name: String,
    pub count: u32,
}

impl AcceleratorRequest {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }

    /// Parse `NAME` or `NAME:COUNT`. The count defaults to 1.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (name, count) = match s.split_once(':') {
            Some((name, count)) => {
                let count: u32 = count
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid accelerator count in {s:?}"))?;
                (name.trim(), count)
            }
            None => (s.trim(), 1),
        };
        if name.is_empty() {
            return Err(format!("accelerator name missing in {s:?}"));
        }
        if count == 0 {
            return Err(format!("accelerator count must be positive in {s:?}"));
        }
        Ok(Self::new(name, count))
    }
}

impl fmt::Display for AcceleratorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.count)
    }
}

impl Serialize for AcceleratorRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AcceleratorForm {
    Short(String),
    Table(BTreeMap<String, u32>),
}

impl<'de> Deserialize<'de> for AcceleratorRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        match AcceleratorForm::deserialize(deserializer)? {
            AcceleratorForm::Short(s) => AcceleratorRequest::parse(&s).map_err(D::Error::custom),
            AcceleratorForm::Table(table) => {
                let mut entries = table.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((name, count)), None) => {
                        AcceleratorRequest::parse(&format!("{name}:{count}"))
                            .map_err(D::Error::custom)
                    }
                    _ => Err(D::Error::custom(
                        "accelerators mapping must name exactly one type",
                    )),
                }
            }
        }
    }
}

/// Compute resources requested for a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerators: Option<AcceleratorRequest>,

    /// Boot disk size in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_spot: Option<bool>,
}

impl ResourceRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate a generic resource mapping into a typed request.
    pub fn from_config(config: &serde_json::Value) -> Result<Self, String> {
        if !config.is_object() {
            return Err("resources must be a mapping".into());
        }
        serde_json::from_value(config.clone()).map_err(|e| e.to_string())
    }

    pub fn with_accelerators(mut self, accelerators: AcceleratorRequest) -> Self {
        self.accelerators = Some(accelerators);
        self
    }

    pub fn with_cpus(mut self, cpus: Quantity) -> Self {
        self.cpus = Some(cpus);
        self
    }

    pub fn with_cloud(mut self, cloud: impl Into<String>) -> Self {
        self.cloud = Some(cloud.into());
        self
    }

    pub fn with_use_spot(mut self, use_spot: bool) -> Self {
        self.use_spot = Some(use_spot);
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
