//! Bus-fed metrics aggregation.
//!
//! `MetricsSubscriber` is registered on every `EventLogger` bus and is the
//! only writer of the aggregate. Everyone else reads `snapshot()`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use uuid::Uuid;

use switchboard_types::error::SubscriberError;
use switchboard_types::event::{Event, EventKind};
use switchboard_types::metrics::{AgentCounters, FlowCounters, MetricsAggregate, ToolCounters};

use super::subscriber::Subscriber;

/// Payload key carrying the tool name on tool events.
pub const TOOL_KEY: &str = "tool";
/// Payload key carrying a duration in milliseconds.
pub const DURATION_KEY: &str = "duration_ms";

#[derive(Default)]
struct Counters {
    events_seen: AtomicU64,
    flows: DashMap<Uuid, FlowCounters>,
    agents: DashMap<String, AgentCounters>,
    tools: DashMap<String, ToolCounters>,
}

/// Maintains per-flow, per-agent, and per-tool counters.
///
/// Cloning shares the same counters, so the logger keeps a clone for reads
/// while the bus owns the registered instance.
#[derive(Clone, Default)]
pub struct MetricsSubscriber {
    counters: Arc<Counters>,
}

impl MetricsSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to the counters.
    pub fn record(&self, event: &Event) {
        let c = &self.counters;
        c.events_seen.fetch_add(1, Ordering::Relaxed);

        let duration = event.payload_u64(DURATION_KEY).unwrap_or(0);

        if let Some(flow_id) = event.flow_id() {
            let mut flow = c.flows.entry(flow_id).or_default();
            flow.events += 1;
            match event.kind() {
                EventKind::FlowStarted => flow.started = true,
                EventKind::FlowCompleted => {
                    flow.completed = true;
                    flow.duration_ms = duration;
                }
                EventKind::FlowError => {
                    flow.failed = true;
                    flow.duration_ms = duration;
                }
                _ => {}
            }
        }

        if let Some(agent) = event.agent_name() {
            let mut counters = c.agents.entry(agent.to_string()).or_default();
            match event.kind() {
                EventKind::AgentStarted => counters.runs += 1,
                EventKind::AgentCompleted => {
                    counters.completions += 1;
                    counters.total_duration_ms += duration;
                }
                EventKind::AgentError => {
                    counters.errors += 1;
                    counters.total_duration_ms += duration;
                }
                EventKind::ToolExecuted => counters.tool_calls += 1,
                _ => {}
            }
        }

        if let Some(tool) = event.payload_str(TOOL_KEY) {
            let mut counters = match event.kind() {
                EventKind::ToolExecuted | EventKind::ToolResult | EventKind::ToolError => {
                    c.tools.entry(tool.to_string()).or_default()
                }
                _ => return,
            };
            match event.kind() {
                EventKind::ToolExecuted => counters.calls += 1,
                EventKind::ToolResult => {
                    counters.successes += 1;
                    counters.total_duration_ms += duration;
                }
                EventKind::ToolError => {
                    counters.errors += 1;
                    counters.total_duration_ms += duration;
                }
                _ => {}
            }
        }
    }

    /// Point-in-time copy of the aggregate.
    pub fn snapshot(&self) -> MetricsAggregate {
        let c = &self.counters;
        MetricsAggregate {
            events_seen: c.events_seen.load(Ordering::Relaxed),
            flows: c
                .flows
                .iter()
                .map(|e| (*e.key(), e.value().clone()))
                .collect::<BTreeMap<_, _>>(),
            agents: c
                .agents
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            tools: c
                .tools
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        }
    }

    /// Reset every counter.
    pub fn reset(&self) {
        let c = &self.counters;
        c.events_seen.store(0, Ordering::Relaxed);
        c.flows.clear();
        c.agents.clear();
        c.tools.clear();
    }
}

impl Subscriber for MetricsSubscriber {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn handle_event(&self, event: &Event) -> Result<(), SubscriberError> {
        self.record(event);
        Ok(())
    }

    fn supports_sync(&self) -> bool {
        true
    }

    fn handle_event_sync(&self, event: &Event) -> Result<(), SubscriberError> {
        self.record(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_flow_agent_and_tool_events() {
        let metrics = MetricsSubscriber::new();
        let flow_id = Uuid::now_v7();

        let events = [
            Event::new(EventKind::FlowStarted),
            Event::new(EventKind::AgentStarted).with_agent("alpha"),
            Event::new(EventKind::ToolExecuted)
                .with_agent("alpha")
                .with_field(TOOL_KEY, "search"),
            Event::new(EventKind::ToolResult)
                .with_agent("alpha")
                .with_field(TOOL_KEY, "search")
                .with_field(DURATION_KEY, 15),
            Event::new(EventKind::ToolError)
                .with_agent("alpha")
                .with_field(TOOL_KEY, "search")
                .with_field(DURATION_KEY, 5),
            Event::new(EventKind::AgentCompleted)
                .with_agent("alpha")
                .with_field(DURATION_KEY, 40),
            Event::new(EventKind::FlowCompleted).with_field(DURATION_KEY, 50),
        ];
        for event in events {
            metrics.record(&event.with_flow(Some(flow_id)));
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_seen, 7);

        let flow = &snapshot.flows[&flow_id];
        assert_eq!(flow.events, 7);
        assert!(flow.started && flow.completed && !flow.failed);
        assert_eq!(flow.duration_ms, 50);

        let alpha = &snapshot.agents["alpha"];
        assert_eq!(alpha.runs, 1);
        assert_eq!(alpha.completions, 1);
        assert_eq!(alpha.tool_calls, 1);
        assert_eq!(alpha.total_duration_ms, 40);

        let search = &snapshot.tools["search"];
        assert_eq!(search.calls, 1);
        assert_eq!(search.successes, 1);
        assert_eq!(search.errors, 1);
        assert_eq!(search.total_duration_ms, 20);
    }

    #[test]
    fn events_without_correlation_only_bump_total() {
        let metrics = MetricsSubscriber::new();
        metrics.record(&Event::new(EventKind::Custom("note".into())));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_seen, 1);
        assert!(snapshot.flows.is_empty());
        assert!(snapshot.agents.is_empty());
        assert!(snapshot.tools.is_empty());
    }

    #[test]
    fn clones_share_counters_and_reset_clears() {
        let metrics = MetricsSubscriber::new();
        let reader = metrics.clone();
        metrics.record(&Event::new(EventKind::AgentStarted).with_agent("beta"));
        assert_eq!(reader.snapshot().agents["beta"].runs, 1);

        reader.reset();
        assert_eq!(metrics.snapshot(), MetricsAggregate::default());
    }
}
