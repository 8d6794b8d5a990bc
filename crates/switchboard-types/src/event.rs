//! Event types for the Switchboard observability pipeline.
//!
//! An [`Event`] is an immutable, timestamped record of a lifecycle occurrence
//! (flow, agent, tool, or team boundary). Events are built once with the
//! consuming builder methods and are never mutated after they are shared.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind of lifecycle occurrence an event records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    FlowStarted,
    FlowCompleted,
    FlowError,
    AgentStarted,
    AgentCompleted,
    AgentError,
    ToolExecuted,
    ToolArgs,
    ToolResult,
    ToolError,
    TeamSupervisorCalled,
    TeamAgentCalled,
    /// Application-defined event, serialized as `custom:<name>`.
    Custom(String),
}

impl EventKind {
    /// Whether this kind records a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            EventKind::FlowError | EventKind::AgentError | EventKind::ToolError
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::FlowStarted => write!(f, "flow_started"),
            EventKind::FlowCompleted => write!(f, "flow_completed"),
            EventKind::FlowError => write!(f, "flow_error"),
            EventKind::AgentStarted => write!(f, "agent_started"),
            EventKind::AgentCompleted => write!(f, "agent_completed"),
            EventKind::AgentError => write!(f, "agent_error"),
            EventKind::ToolExecuted => write!(f, "tool_executed"),
            EventKind::ToolArgs => write!(f, "tool_args"),
            EventKind::ToolResult => write!(f, "tool_result"),
            EventKind::ToolError => write!(f, "tool_error"),
            EventKind::TeamSupervisorCalled => write!(f, "team_supervisor_called"),
            EventKind::TeamAgentCalled => write!(f, "team_agent_called"),
            EventKind::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("custom:") {
            if name.is_empty() {
                return Err("custom event kind requires a name".to_string());
            }
            return Ok(EventKind::Custom(name.to_string()));
        }

        match s.to_lowercase().as_str() {
            "flow_started" => Ok(EventKind::FlowStarted),
            "flow_completed" => Ok(EventKind::FlowCompleted),
            "flow_error" => Ok(EventKind::FlowError),
            "agent_started" => Ok(EventKind::AgentStarted),
            "agent_completed" => Ok(EventKind::AgentCompleted),
            "agent_error" => Ok(EventKind::AgentError),
            "tool_executed" => Ok(EventKind::ToolExecuted),
            "tool_args" => Ok(EventKind::ToolArgs),
            "tool_result" => Ok(EventKind::ToolResult),
            "tool_error" => Ok(EventKind::ToolError),
            "team_supervisor_called" => Ok(EventKind::TeamSupervisorCalled),
            "team_agent_called" => Ok(EventKind::TeamAgentCalled),
            other => Err(format!("invalid event kind: '{other}'")),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An immutable, correlated lifecycle record.
///
/// Correlation fields (`flow_id`, `team_name`, `agent_name`) tie the event to
/// its origin. The payload is a free-form JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_id: Uuid,
    timestamp: DateTime<Utc>,
    kind: EventKind,
    flow_id: Option<Uuid>,
    team_name: Option<String>,
    agent_name: Option<String>,
    #[serde(default)]
    payload: Map<String, Value>,
}

impl Event {
    /// Create a new event of the given kind, stamped now with a fresh v7 id.
    pub fn new(kind: EventKind) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            kind,
            flow_id: None,
            team_name: None,
            agent_name: None,
            payload: Map::new(),
        }
    }

    /// Rebuild an event from stored parts (used by persistence adapters).
    pub fn from_parts(
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        kind: EventKind,
        flow_id: Option<Uuid>,
        team_name: Option<String>,
        agent_name: Option<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            event_id,
            timestamp,
            kind,
            flow_id,
            team_name,
            agent_name,
            payload,
        }
    }

    pub fn with_flow(mut self, flow_id: Option<Uuid>) -> Self {
        self.flow_id = flow_id;
        self
    }

    pub fn with_team(mut self, team_name: impl Into<String>) -> Self {
        self.team_name = Some(team_name.into());
        self
    }

    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    /// Insert a single payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Merge a JSON object into the payload. Non-object values are stored
    /// under the `value` key.
    pub fn with_payload(mut self, payload: Value) -> Self {
        match payload {
            Value::Object(map) => self.payload.extend(map),
            Value::Null => {}
            other => {
                self.payload.insert("value".to_string(), other);
            }
        }
        self
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn flow_id(&self) -> Option<Uuid> {
        self.flow_id
    }

    pub fn team_name(&self) -> Option<&str> {
        self.team_name.as_deref()
    }

    pub fn agent_name(&self) -> Option<&str> {
        self.agent_name.as_deref()
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Read a string payload field.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Read an unsigned integer payload field.
    pub fn payload_u64(&self, key: &str) -> Option<u64> {
        self.payload.get(key).and_then(Value::as_u64)
    }
}

/// Filter for querying logged or persisted events.
///
/// All set fields must match. `limit` keeps the most recent N matches while
/// preserving emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub event_type: Option<EventKind>,
    pub flow_id: Option<Uuid>,
    pub agent_name: Option<String>,
    pub team_name: Option<String>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, kind: EventKind) -> Self {
        self.event_type = Some(kind);
        self
    }

    pub fn flow(mut self, flow_id: Uuid) -> Self {
        self.flow_id = Some(flow_id);
        self
    }

    pub fn agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    pub fn team(mut self, team_name: impl Into<String>) -> Self {
        self.team_name = Some(team_name.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether the event satisfies every set criterion (ignores `limit`).
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = &self.event_type {
            if event.kind() != kind {
                return false;
            }
        }
        if let Some(flow_id) = self.flow_id {
            if event.flow_id() != Some(flow_id) {
                return false;
            }
        }
        if let Some(agent) = &self.agent_name {
            if event.agent_name() != Some(agent.as_str()) {
                return false;
            }
        }
        if let Some(team) = &self.team_name {
            if event.team_name() != Some(team.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Output format for event export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// A single pretty-printed JSON array.
    Json,
    /// One JSON object per line.
    JsonLines,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" | "json_lines" | "ndjson" => Ok(ExportFormat::JsonLines),
            other => Err(format!("invalid export format: '{other}'")),
        }
    }
}
