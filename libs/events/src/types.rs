//! Offer, status and event definitions.

use std::collections::BTreeMap;

use skiff_id::{AgentId, ExecutorId, FrameworkId, OfferId, TaskId};
use serde::{Deserialize, Deserializer, Serialize};

use crate::OfferError;

// =============================================================================
// Resources and Attributes
// =============================================================================

/// A resource or attribute value as reported by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Value {
    Scalar { value: f64 },
    Ranges { ranges: Vec<ValueRange> },
    Set { items: Vec<String> },
    Text { value: String },
}

/// An inclusive integer range, e.g. a port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub begin: u64,
    pub end: u64,
}

impl Value {
    /// Render the value as text for constraint matching.
    ///
    /// Scalars use their shortest decimal form, sets and ranges are
    /// comma-joined.
    pub fn as_text(&self) -> String {
        match self {
            Value::Scalar { value } => value.to_string(),
            Value::Ranges { ranges } => ranges
                .iter()
                .map(|r| format!("{}-{}", r.begin, r.end))
                .collect::<Vec<_>>()
                .join(","),
            Value::Set { items } => items.join(","),
            Value::Text { value } => value.clone(),
        }
    }

    /// Returns the scalar value, if this is a scalar.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar { value } => Some(*value),
            _ => None,
        }
    }
}

/// A named resource quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(flatten)]
    pub value: Value,
}

impl Resource {
    /// Create a scalar resource (e.g. `cpus`, `mem`).
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: Value::Scalar { value },
        }
    }
}

// =============================================================================
// Offers
// =============================================================================

/// A proposal of available resources on one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,

    pub agent_id: AgentId,

    #[serde(default)]
    pub hostname: String,

    /// Placement attributes, keyed by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    #[serde(default)]
    pub resources: Vec<Resource>,

    /// Set when the wire form could not be decoded; such an offer is only
    /// ever declined.
    #[serde(skip)]
    pub decode_error: Option<String>,
}

impl Offer {
    /// Create an offer with no attributes or resources.
    pub fn new(id: impl Into<OfferId>, agent_id: impl Into<AgentId>, hostname: &str) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            hostname: hostname.to_string(),
            attributes: BTreeMap::new(),
            resources: Vec::new(),
            decode_error: None,
        }
    }

    /// Decode one offer from its JSON form. Never fails.
    ///
    /// An offer that does not decode keeps whatever `id`, `agent_id` and
    /// `hostname` strings it carries and records the decode error, so it can
    /// still be answered.
    pub fn from_value(value: serde_json::Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let (id, agent_id, hostname) = (text("id"), text("agent_id"), text("hostname"));

        match serde_json::from_value::<Offer>(value) {
            Ok(offer) => offer,
            Err(e) => {
                let mut offer = Offer::new(id, agent_id, &hostname);
                offer.decode_error = Some(e.to_string());
                offer
            }
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Builder-style text attribute setter.
    pub fn with_text_attribute(self, name: &str, value: &str) -> Self {
        self.with_attribute(
            name,
            Value::Text {
                value: value.to_string(),
            },
        )
    }

    /// Check that the offer can be answered with a task.
    pub fn validate(&self) -> Result<(), OfferError> {
        if self.id.is_blank() {
            return Err(OfferError::MissingOfferId);
        }
        if let Some(message) = &self.decode_error {
            return Err(OfferError::Undecodable {
                offer_id: self.id.to_string(),
                message: message.clone(),
            });
        }
        if self.agent_id.is_blank() {
            return Err(OfferError::MissingAgentId {
                offer_id: self.id.to_string(),
            });
        }
        Ok(())
    }

    /// Look up a field for constraint matching.
    ///
    /// `hostname` resolves to the offer hostname; anything else to an attribute.
    pub fn field(&self, name: &str) -> Option<String> {
        if name == "hostname" {
            return Some(self.hostname.clone());
        }
        self.attributes.get(name).map(Value::as_text)
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Identity and address of the cluster manager leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterInfo {
    pub id: String,

    #[serde(default)]
    pub hostname: Option<String>,

    pub ip: String,

    pub port: u16,
}

impl MasterInfo {
    /// `ip:port` form used in logs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

// =============================================================================
// Task Status
// =============================================================================

/// Task state as reported by the manager.
///
/// Wire form is the manager's `TASK_*` tag; the prefix is optional and case
/// is ignored on input. Unrecognized tags are preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Killing,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
    Other(String),
}

impl TaskState {
    /// Returns the manager-native tag.
    pub fn as_tag(&self) -> &str {
        match self {
            TaskState::Staging => "TASK_STAGING",
            TaskState::Starting => "TASK_STARTING",
            TaskState::Running => "TASK_RUNNING",
            TaskState::Killing => "TASK_KILLING",
            TaskState::Finished => "TASK_FINISHED",
            TaskState::Failed => "TASK_FAILED",
            TaskState::Killed => "TASK_KILLED",
            TaskState::Lost => "TASK_LOST",
            TaskState::Error => "TASK_ERROR",
            TaskState::Other(tag) => tag,
        }
    }

    /// Parse a manager tag. Never fails.
    pub fn from_tag(tag: &str) -> Self {
        let upper = tag.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("TASK_").unwrap_or(&upper);
        match bare {
            "STAGING" => TaskState::Staging,
            "STARTING" => TaskState::Starting,
            "RUNNING" => TaskState::Running,
            "KILLING" => TaskState::Killing,
            "FINISHED" => TaskState::Finished,
            "FAILED" => TaskState::Failed,
            "KILLED" => TaskState::Killed,
            "LOST" => TaskState::Lost,
            "ERROR" => TaskState::Error,
            _ => TaskState::Other(tag.to_string()),
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl From<&str> for TaskState {
    fn from(tag: &str) -> Self {
        Self::from_tag(tag)
    }
}

impl Serialize for TaskState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for TaskState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

/// A task status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,

    pub state: TaskState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskStatus {
    /// Create a status update with no agent or message.
    pub fn new(task_id: impl Into<TaskId>, state: TaskState) -> Self {
        Self {
            task_id: task_id.into(),
            state,
            agent_id: None,
            message: None,
        }
    }
}

// =============================================================================
// Scheduler Events
// =============================================================================

/// Every notification the manager can deliver to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Registered {
        framework_id: FrameworkId,
        master: MasterInfo,
    },
    Reregistered {
        master: MasterInfo,
    },
    Offers {
        #[serde(deserialize_with = "offers_lenient")]
        offers: Vec<Offer>,
    },
    OfferRescinded {
        offer_id: OfferId,
    },
    StatusUpdate {
        status: TaskStatus,
    },
    FrameworkMessage {
        executor_id: ExecutorId,
        agent_id: AgentId,
        #[serde(default)]
        data: Vec<u8>,
    },
    Disconnected,
    AgentLost {
        agent_id: AgentId,
    },
    ExecutorLost {
        executor_id: ExecutorId,
        agent_id: AgentId,
        status: i32,
    },
    Error {
        message: String,
    },
}

impl SchedulerEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerEvent::Registered { .. } => "registered",
            SchedulerEvent::Reregistered { .. } => "reregistered",
            SchedulerEvent::Offers { .. } => "offers",
            SchedulerEvent::OfferRescinded { .. } => "offer_rescinded",
            SchedulerEvent::StatusUpdate { .. } => "status_update",
            SchedulerEvent::FrameworkMessage { .. } => "framework_message",
            SchedulerEvent::Disconnected => "disconnected",
            SchedulerEvent::AgentLost { .. } => "agent_lost",
            SchedulerEvent::ExecutorLost { .. } => "executor_lost",
            SchedulerEvent::Error { .. } => "error",
        }
    }
}

/// One bad offer must not take the rest of its batch down with it.
fn offers_lenient<'de, D>(deserializer: D) -> Result<Vec<Offer>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(Offer::from_value).collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_tags() {
        assert_eq!(TaskState::from_tag("TASK_RUNNING"), TaskState::Running);
        assert_eq!(TaskState::from_tag("finished"), TaskState::Finished);
        assert_eq!(TaskState::from_tag(" task_lost "), TaskState::Lost);
        assert_eq!(
            TaskState::from_tag("TASK_GONE_BY_OPERATOR"),
            TaskState::Other("TASK_GONE_BY_OPERATOR".to_string())
        );
        assert_eq!(TaskState::Killed.to_string(), "TASK_KILLED");
    }

    #[test]
    fn test_task_state_json() {
        let status: TaskStatus =
            serde_json::from_str(r#"{"task_id":"t-1","state":"TASK_FAILED"}"#).unwrap();
        assert_eq!(status.state, TaskState::Failed);
        assert_eq!(status.task_id.as_str(), "t-1");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "TASK_FAILED");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_offer_validate() {
        assert!(Offer::new("o1", "a1", "node-1").validate().is_ok());
        assert_eq!(
            Offer::new("", "a1", "node-1").validate(),
            Err(OfferError::MissingOfferId)
        );
        assert!(matches!(
            Offer::new("o1", " ", "node-1").validate(),
            Err(OfferError::MissingAgentId { .. })
        ));
    }

    #[test]
    fn test_offer_field_lookup() {
        let offer = Offer::new("o1", "a1", "node-1.dc1")
            .with_text_attribute("rack", "r7")
            .with_attribute("cores", Value::Scalar { value: 8.0 })
            .with_attribute(
                "zones",
                Value::Set {
                    items: vec!["a".to_string(), "b".to_string()],
                },
            );

        assert_eq!(offer.field("hostname").as_deref(), Some("node-1.dc1"));
        assert_eq!(offer.field("rack").as_deref(), Some("r7"));
        assert_eq!(offer.field("cores").as_deref(), Some("8"));
        assert_eq!(offer.field("zones").as_deref(), Some("a,b"));
        assert_eq!(offer.field("missing"), None);
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"{
            "type": "offers",
            "offers": [{
                "id": "o1",
                "agent_id": "a1",
                "hostname": "node-1",
                "attributes": {"rack": {"type": "text", "value": "r1"}},
                "resources": [{"name": "cpus", "type": "scalar", "value": 4.0}]
            }]
        }"#;
        let event: SchedulerEvent = serde_json::from_str(json).unwrap();
        let SchedulerEvent::Offers { offers } = event else {
            panic!("expected offers event");
        };
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].resources[0].value.scalar(), Some(4.0));
        assert_eq!(offers[0].field("rack").as_deref(), Some("r1"));
    }

    #[test]
    fn test_offers_batch_keeps_undecodable_offers() {
        let json = r#"{
            "type": "offers",
            "offers": [
                {"id": "o1", "agent_id": "a1"},
                {"id": "o2"},
                {"id": 3, "agent_id": "a3"},
                {"id": "o4", "agent_id": "a4", "attributes": {"rack": 7}}
            ]
        }"#;
        let event: SchedulerEvent = serde_json::from_str(json).unwrap();
        let SchedulerEvent::Offers { offers } = event else {
            panic!("expected offers event");
        };

        assert_eq!(offers.len(), 4);
        assert!(offers[0].validate().is_ok());
        assert!(matches!(
            offers[1].validate(),
            Err(OfferError::Undecodable { ref offer_id, .. }) if offer_id == "o2"
        ));
        assert_eq!(offers[2].validate(), Err(OfferError::MissingOfferId));
        assert_eq!(offers[3].agent_id.as_str(), "a4");
        assert!(matches!(
            offers[3].validate(),
            Err(OfferError::Undecodable { .. })
        ));
    }

    #[test]
    fn test_unit_event_json() {
        let event: SchedulerEvent = serde_json::from_str(r#"{"type":"disconnected"}"#).unwrap();
        assert_eq!(event, SchedulerEvent::Disconnected);
        assert_eq!(event.kind(), "disconnected");
    }
}
