//! Task description types sent to the manager on launch.

use std::collections::BTreeMap;

use skiff_id::{AgentId, TaskId};
use serde::{Deserialize, Serialize};

use crate::Resource;

/// Refusal filter attached to every offer response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    /// Seconds the manager should wait before re-offering unused resources.
    pub refuse_seconds: f64,
}

impl Filters {
    /// Filter asking the manager to hold resources back for `secs` seconds.
    pub fn refuse_for(secs: f64) -> Self {
        Self {
            refuse_seconds: secs,
        }
    }
}

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerType {
    Docker,
}

/// Docker network mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Network {
    Host,
    Bridge,
    None,
}

/// Docker image settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerInfo {
    pub image: String,
    pub network: Network,
    pub force_pull_image: bool,
}

/// Volume access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeMode {
    Rw,
    Ro,
}

/// A volume mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub container_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,

    pub mode: VolumeMode,
}

impl Volume {
    /// Parse a docker-style mount: `host:container[:ro|rw]` or `container`.
    ///
    /// Returns `None` if the mount string is empty or the mode is not `ro`/`rw`.
    pub fn parse(spec: &str) -> Option<Self> {
        let parts: Vec<&str> = spec.trim().split(':').collect();
        let (host_path, container_path, mode) = match parts.as_slice() {
            [container] => (None, *container, VolumeMode::Rw),
            [host, container] => (Some(*host), *container, VolumeMode::Rw),
            [host, container, mode] => {
                let mode = match mode.to_ascii_lowercase().as_str() {
                    "rw" => VolumeMode::Rw,
                    "ro" => VolumeMode::Ro,
                    _ => return None,
                };
                (Some(*host), *container, mode)
            }
            _ => return None,
        };

        if container_path.is_empty() || host_path.is_some_and(str::is_empty) {
            return None;
        }

        Some(Self {
            container_path: container_path.to_string(),
            host_path: host_path.map(str::to_string),
            mode,
        })
    }
}

/// Container description for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    #[serde(rename = "type")]
    pub kind: ContainerType,

    pub docker: DockerInfo,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// Command description, passed through to the manager unmodified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Command line; run through `/bin/sh -c` when `shell` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,

    #[serde(default)]
    pub shell: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
}

impl CommandInfo {
    /// A shell command.
    pub fn shell(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            shell: true,
            ..Default::default()
        }
    }

    /// Run the image entrypoint with the given arguments.
    pub fn entrypoint_args(arguments: Vec<String>) -> Self {
        Self {
            arguments,
            ..Default::default()
        }
    }
}

/// A runnable task in the manager's submission format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub resources: Vec<Resource>,
    pub container: ContainerInfo,
    pub command: CommandInfo,
}

impl TaskInfo {
    /// Look up a scalar resource by name.
    pub fn scalar_resource(&self, name: &str) -> Option<f64> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.value.scalar())
    }
}
