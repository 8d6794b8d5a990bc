//! Metrics and summary shapes derived from the event stream.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-flow counters maintained by the bus-fed metrics subscriber.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowCounters {
    pub events: u64,
    pub started: bool,
    pub completed: bool,
    pub failed: bool,
    pub duration_ms: u64,
}

/// Per-agent counters and cumulative durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCounters {
    pub runs: u64,
    pub completions: u64,
    pub errors: u64,
    pub total_duration_ms: u64,
    pub tool_calls: u64,
}

/// Per-tool counters and cumulative durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCounters {
    pub calls: u64,
    pub successes: u64,
    pub errors: u64,
    pub total_duration_ms: u64,
}

/// Snapshot of the aggregate kept by the metrics subscriber.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsAggregate {
    pub events_seen: u64,
    pub flows: BTreeMap<Uuid, FlowCounters>,
    pub agents: BTreeMap<String, AgentCounters>,
    pub tools: BTreeMap<String, ToolCounters>,
}

/// Per-agent figures inside a [`FlowSummary`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub events: u64,
    pub completions: u64,
    pub errors: u64,
    pub total_duration_ms: u64,
}

/// Per-tool figures inside a [`FlowSummary`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    pub calls: u64,
    pub errors: u64,
    pub total_duration_ms: u64,
}

/// Summary of one flow, derived by scanning the in-memory event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub flow_id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub total_events: usize,
    pub agents: BTreeMap<String, AgentStats>,
    pub tools: BTreeMap<String, ToolStats>,
    pub errors: Vec<String>,
}

/// Global counts across everything the logger has seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggerMetrics {
    pub total_events: usize,
    pub unique_flows: usize,
    pub unique_agents: usize,
    pub unique_teams: usize,
    pub unique_tools: usize,
    pub error_count: usize,
    pub events_by_kind: BTreeMap<String, usize>,
}
