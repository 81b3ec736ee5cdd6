//! Task file rendering in the sky YAML schema.
//!
//! File mounts and storage mounts share the `file_mounts` section: a plain
//! string value is a copy source, a mapping is a storage definition.

use cargoplane_core::{OrderedMap, ResourceRequest, StorageDescriptor, TaskDescriptor};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MountValue<'a> {
    Source(&'a str),
    Storage(&'a StorageDescriptor),
}

#[derive(Debug, Serialize)]
struct SkyTask<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    setup: Option<&'a str>,

    run: &'a str,

    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    file_mounts: OrderedMap<MountValue<'a>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<ResourceRequest>,
}

/// Serialize `task` as a sky task YAML document.
///
/// With `spot` set, `resources.use_spot` is forced on so the managed-job
/// controller requests preemptible capacity.
pub fn render_task_yaml(task: &TaskDescriptor, spot: bool) -> Result<String, serde_yaml::Error> {
    let mut file_mounts = OrderedMap::new();
    for mount in &task.file_mounts {
        file_mounts.insert(mount.remote.as_str(), MountValue::Source(&mount.source));
    }
    for mount in &task.storage_mounts {
        file_mounts.insert(mount.mount_path.as_str(), MountValue::Storage(&mount.storage));
    }

    let mut resources = task.resources.clone();
    if spot {
        resources = Some(resources.unwrap_or_default().with_use_spot(true));
    }

    serde_yaml::to_string(&SkyTask {
        name: task.name.as_deref(),
        setup: task.setup.as_deref(),
        run: &task.run,
        file_mounts,
        resources,
    })
}
