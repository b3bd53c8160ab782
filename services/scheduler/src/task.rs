//! Task description construction.

use skiff_events::{
    ContainerInfo, ContainerType, DockerInfo, Network, Resource, TaskInfo,
};
use skiff_id::{AgentId, TaskId};

use crate::config::WorkloadSpec;

/// Resource name for CPU shares.
pub const CPUS: &str = "cpus";

/// Resource name for memory, in MB.
pub const MEM: &str = "mem";

/// Build the launch description for one task of `spec` on `agent_id`.
///
/// Resources are requested exactly as configured; no headroom or rounding.
pub fn build_task(spec: &WorkloadSpec, agent_id: &AgentId, task_id: &TaskId) -> TaskInfo {
    let container = ContainerInfo {
        kind: ContainerType::Docker,
        docker: DockerInfo {
            image: spec.image.clone(),
            network: Network::Bridge,
            force_pull_image: spec.force_pull_image,
        },
        volumes: spec.volumes.clone(),
    };

    TaskInfo {
        name: format!("task {task_id}"),
        task_id: task_id.clone(),
        agent_id: agent_id.clone(),
        resources: vec![
            Resource::scalar(CPUS, spec.cpus),
            Resource::scalar(MEM, spec.memory),
        ],
        container,
        command: spec.command.clone(),
    }
}

#[cfg(test)]
mod tests {
    use skiff_constraints::ConstraintSet;
    use skiff_events::{CommandInfo, Volume, VolumeMode};

    use super::*;

    fn spec() -> WorkloadSpec {
        WorkloadSpec {
            image: "registry.local/etl:7".to_string(),
            desired_instances: 1,
            cpus: 0.25,
            memory: 96.5,
            force_pull_image: true,
            command: CommandInfo::shell("etl --date=today"),
            volumes: vec![
                Volume {
                    container_path: "/in".to_string(),
                    host_path: Some("/srv/in".to_string()),
                    mode: VolumeMode::Ro,
                },
                Volume {
                    container_path: "/out".to_string(),
                    host_path: Some("/srv/out".to_string()),
                    mode: VolumeMode::Rw,
                },
            ],
            constraints: ConstraintSet::allow_all(),
        }
    }

    #[test]
    fn test_build_task() {
        let spec = spec();
        let task = build_task(&spec, &AgentId::from("agent-9"), &TaskId::from("etl-1"));

        assert_eq!(task.name, "task etl-1");
        assert_eq!(task.task_id.as_str(), "etl-1");
        assert_eq!(task.agent_id.as_str(), "agent-9");
        assert_eq!(task.scalar_resource(CPUS), Some(0.25));
        assert_eq!(task.scalar_resource(MEM), Some(96.5));
        assert_eq!(task.container.kind, ContainerType::Docker);
        assert_eq!(task.container.docker.network, Network::Bridge);
        assert!(task.container.docker.force_pull_image);
        assert_eq!(task.container.volumes, spec.volumes);
        assert_eq!(task.command, spec.command);
    }

    #[test]
    fn test_build_task_without_volumes() {
        let mut spec = spec();
        spec.volumes.clear();
        spec.force_pull_image = false;

        let task = build_task(&spec, &AgentId::from("a"), &TaskId::from("t"));
        assert!(task.container.volumes.is_empty());
        assert!(!task.container.docker.force_pull_image);

        let json = serde_json::to_value(&task).unwrap();
        assert!(json["container"].get("volumes").is_none());
    }
}
