//! Workload and service configuration.
//!
//! The workload is described by the same string settings the job runner
//! hands to the scheduler (`docker_image`, `docker_cpus`, ...). They are
//! parsed once into a typed [`WorkloadSpec`]; the first invalid field fails
//! construction with a [`ConfigError`].

use std::collections::BTreeMap;

use skiff_constraints::ConstraintSet;
use skiff_events::{CommandInfo, Volume};

use crate::error::ConfigError;

/// Setting keys understood by [`WorkloadSpec::from_settings`].
pub mod keys {
    pub const IMAGE: &str = "docker_image";
    pub const CPUS: &str = "docker_cpus";
    pub const MEMORY: &str = "docker_memory";
    pub const FORCE_PULL: &str = "docker_force_pull";
    pub const CONSTRAINTS: &str = "mesos_constraints";
    pub const INSTANCES: &str = "instances";
}

/// The single workload this scheduler keeps running.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    /// Docker image reference.
    pub image: String,

    /// Target number of tasks.
    pub desired_instances: u32,

    /// CPU shares requested per task.
    pub cpus: f64,

    /// Memory (MB) requested per task.
    pub memory: f64,

    /// Re-pull the image even if cached on the agent.
    pub force_pull_image: bool,

    /// Command passed through to every task.
    pub command: CommandInfo,

    /// Volume mounts, in order.
    pub volumes: Vec<Volume>,

    /// Parsed placement constraints.
    pub constraints: ConstraintSet,
}

impl WorkloadSpec {
    /// Build a workload from string settings plus a caller-supplied command
    /// and volume list.
    pub fn from_settings(
        settings: &BTreeMap<String, String>,
        command: CommandInfo,
        volumes: Vec<Volume>,
    ) -> Result<Self, ConfigError> {
        let image = required(settings, keys::IMAGE)?.to_string();
        let cpus = positive_f64(settings, keys::CPUS)?;
        let memory = positive_f64(settings, keys::MEMORY)?;

        let force_pull_image = match optional(settings, keys::FORCE_PULL) {
            Some(raw) => parse_bool(keys::FORCE_PULL, raw)?,
            None => false,
        };

        let desired_instances = match optional(settings, keys::INSTANCES) {
            Some(raw) => positive_u32(keys::INSTANCES, raw)?,
            None => 1,
        };

        let constraints =
            ConstraintSet::parse(optional(settings, keys::CONSTRAINTS).unwrap_or_default())?;

        Ok(Self {
            image,
            desired_instances,
            cpus,
            memory,
            force_pull_image,
            command,
            volumes,
            constraints,
        })
    }
}

/// Service configuration for the scheduler binary.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// The workload to schedule.
    pub workload: WorkloadSpec,

    /// Prefix for generated task IDs.
    pub task_prefix: String,

    /// Capacity of the scheduler actor's mailbox.
    pub mailbox_size: usize,
}

impl SchedulerConfig {
    /// Load configuration from `SKIFF_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_keys = [
            ("SKIFF_DOCKER_IMAGE", keys::IMAGE),
            ("SKIFF_DOCKER_CPUS", keys::CPUS),
            ("SKIFF_DOCKER_MEMORY", keys::MEMORY),
            ("SKIFF_DOCKER_FORCE_PULL", keys::FORCE_PULL),
            ("SKIFF_CONSTRAINTS", keys::CONSTRAINTS),
            ("SKIFF_INSTANCES", keys::INSTANCES),
        ];

        let settings: BTreeMap<String, String> = env_keys
            .iter()
            .filter_map(|(var, key)| lookup(var).map(|v| (key.to_string(), v)))
            .collect();

        let command = match lookup("SKIFF_COMMAND").filter(|c| !c.trim().is_empty()) {
            Some(shell) => CommandInfo::shell(shell),
            None => CommandInfo::entrypoint_args(
                lookup("SKIFF_ARGS")
                    .map(|a| a.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
            ),
        };

        let volumes = parse_volumes(&lookup("SKIFF_VOLUMES").unwrap_or_default())?;

        let workload = WorkloadSpec::from_settings(&settings, command, volumes)?;

        let task_prefix = lookup("SKIFF_TASK_PREFIX")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "task".to_string());

        let mailbox_size = match lookup("SKIFF_MAILBOX_SIZE").filter(|s| !s.trim().is_empty()) {
            Some(raw) => positive_u32("SKIFF_MAILBOX_SIZE", raw.trim())? as usize,
            None => 256,
        };

        Ok(Self {
            workload,
            task_prefix,
            mailbox_size,
        })
    }
}

/// Parse a comma-separated list of docker-style mounts.
pub fn parse_volumes(raw: &str) -> Result<Vec<Volume>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Volume::parse(s).ok_or_else(|| ConfigError::InvalidVolume(s.to_string())))
        .collect()
}

fn optional<'a>(settings: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(
    settings: &'a BTreeMap<String, String>,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    optional(settings, key).ok_or(ConfigError::Missing { key })
}

fn positive_f64(settings: &BTreeMap<String, String>, key: &'static str) -> Result<f64, ConfigError> {
    let raw = required(settings, key)?;
    let value: f64 = raw.parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })?;

    if !value.is_finite() {
        return Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        });
    }
    if value <= 0.0 {
        return Err(ConfigError::NotPositive {
            key,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

fn positive_u32(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    let value: i64 = raw.parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })?;
    if value <= 0 {
        return Err(ConfigError::NotPositive {
            key,
            value: raw.to_string(),
        });
    }
    u32::try_from(value).map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            (keys::IMAGE, "registry.local/batch/report:2.1"),
            (keys::CPUS, "0.5"),
            (keys::MEMORY, "256"),
        ]
    }

    fn with(overrides: &[(&'static str, &'static str)]) -> BTreeMap<String, String> {
        let mut pairs = base();
        pairs.retain(|(k, _)| !overrides.iter().any(|(o, _)| o == k));
        pairs.extend_from_slice(overrides);
        settings(&pairs)
    }

    #[test]
    fn test_minimal_settings() {
        let spec = WorkloadSpec::from_settings(&settings(&base()), CommandInfo::default(), vec![])
            .unwrap();

        assert_eq!(spec.image, "registry.local/batch/report:2.1");
        assert_eq!(spec.cpus, 0.5);
        assert_eq!(spec.memory, 256.0);
        assert_eq!(spec.desired_instances, 1);
        assert!(!spec.force_pull_image);
        assert!(spec.constraints.is_empty());
    }

    #[test]
    fn test_full_settings() {
        let spec = WorkloadSpec::from_settings(
            &with(&[
                (keys::FORCE_PULL, "TRUE"),
                (keys::INSTANCES, "3"),
                (keys::CONSTRAINTS, "hostname:LIKE:batch-.*"),
            ]),
            CommandInfo::shell("./run.sh"),
            vec![],
        )
        .unwrap();

        assert!(spec.force_pull_image);
        assert_eq!(spec.desired_instances, 3);
        assert_eq!(spec.constraints.len(), 1);
        assert_eq!(spec.command.value.as_deref(), Some("./run.sh"));
    }

    #[rstest]
    #[case(keys::CPUS, "", ConfigError::Missing { key: keys::CPUS })]
    #[case(keys::MEMORY, "lots", ConfigError::InvalidNumber { key: keys::MEMORY, value: "lots".into() })]
    #[case(keys::CPUS, "0", ConfigError::NotPositive { key: keys::CPUS, value: "0".into() })]
    #[case(keys::MEMORY, "-64", ConfigError::NotPositive { key: keys::MEMORY, value: "-64".into() })]
    #[case(keys::CPUS, "NaN", ConfigError::InvalidNumber { key: keys::CPUS, value: "NaN".into() })]
    #[case(keys::INSTANCES, "0", ConfigError::NotPositive { key: keys::INSTANCES, value: "0".into() })]
    #[case(keys::INSTANCES, "1.5", ConfigError::InvalidNumber { key: keys::INSTANCES, value: "1.5".into() })]
    #[case(keys::FORCE_PULL, "maybe", ConfigError::InvalidBool { key: keys::FORCE_PULL, value: "maybe".into() })]
    fn test_invalid_settings(
        #[case] key: &'static str,
        #[case] value: &'static str,
        #[case] expected: ConfigError,
    ) {
        let err = WorkloadSpec::from_settings(&with(&[(key, value)]), CommandInfo::default(), vec![])
            .unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn test_missing_image() {
        let mut s = settings(&base());
        s.remove(keys::IMAGE);
        let err = WorkloadSpec::from_settings(&s, CommandInfo::default(), vec![]).unwrap_err();
        assert_eq!(err, ConfigError::Missing { key: keys::IMAGE });
    }

    #[test]
    fn test_bad_constraints_fail_construction() {
        let err = WorkloadSpec::from_settings(
            &with(&[(keys::CONSTRAINTS, "rack:NEAR:r1")]),
            CommandInfo::default(),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Constraints(_)));
    }

    #[test]
    fn test_parse_volumes() {
        let volumes = parse_volumes("/srv/in:/in:ro, /srv/out:/out ,").unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[1].container_path, "/out");

        assert_eq!(
            parse_volumes("/a:/b:zz"),
            Err(ConfigError::InvalidVolume("/a:/b:zz".to_string()))
        );
        assert!(parse_volumes("").unwrap().is_empty());
    }

    #[test]
    fn test_from_lookup() {
        let env = settings(&[
            ("SKIFF_DOCKER_IMAGE", "alpine:3.20"),
            ("SKIFF_DOCKER_CPUS", "1"),
            ("SKIFF_DOCKER_MEMORY", "128"),
            ("SKIFF_INSTANCES", "2"),
            ("SKIFF_ARGS", "--once --verbose"),
            ("SKIFF_VOLUMES", "/tmp:/scratch"),
            ("SKIFF_TASK_PREFIX", "nightly"),
        ]);

        let config = SchedulerConfig::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.workload.image, "alpine:3.20");
        assert_eq!(config.workload.desired_instances, 2);
        assert_eq!(config.workload.command.arguments, vec!["--once", "--verbose"]);
        assert!(!config.workload.command.shell);
        assert_eq!(config.workload.volumes.len(), 1);
        assert_eq!(config.task_prefix, "nightly");
        assert_eq!(config.mailbox_size, 256);
    }

    #[test]
    fn test_from_lookup_prefers_shell_command() {
        let env = settings(&[
            ("SKIFF_DOCKER_IMAGE", "alpine:3.20"),
            ("SKIFF_DOCKER_CPUS", "1"),
            ("SKIFF_DOCKER_MEMORY", "128"),
            ("SKIFF_COMMAND", "echo done"),
            ("SKIFF_ARGS", "ignored"),
        ]);

        let config = SchedulerConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert!(config.workload.command.shell);
        assert!(config.workload.command.arguments.is_empty());
    }

    #[test]
    fn test_from_lookup_missing_cpus() {
        let env = settings(&[
            ("SKIFF_DOCKER_IMAGE", "alpine:3.20"),
            ("SKIFF_DOCKER_MEMORY", "128"),
        ]);
        let err = SchedulerConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert_eq!(err, ConfigError::Missing { key: keys::CPUS });
    }

    #[rstest]
    #[case("64", Ok(64))]
    #[case(" 8 ", Ok(8))]
    #[case("", Ok(256))]
    #[case("abc", Err(ConfigError::InvalidNumber { key: "SKIFF_MAILBOX_SIZE", value: "abc".into() }))]
    #[case("0", Err(ConfigError::NotPositive { key: "SKIFF_MAILBOX_SIZE", value: "0".into() }))]
    fn test_from_lookup_mailbox_size(
        #[case] raw: &'static str,
        #[case] expected: Result<usize, ConfigError>,
    ) {
        let env = settings(&[
            ("SKIFF_DOCKER_IMAGE", "alpine:3.20"),
            ("SKIFF_DOCKER_CPUS", "1"),
            ("SKIFF_DOCKER_MEMORY", "128"),
            ("SKIFF_MAILBOX_SIZE", raw),
        ]);

        let result = SchedulerConfig::from_lookup(|k| env.get(k).cloned()).map(|c| c.mailbox_size);
        assert_eq!(result, expected);
    }
}
