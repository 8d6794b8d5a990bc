//! EventLogger: the single object components hold to report events.
//!
//! Wraps one `EventBus`, keeps an append-only in-memory log, optionally
//! persists through a `BoxEventStore`, and answers queries (filters, flow
//! summaries, global metrics, export).
//!
//! The in-memory log has one writer (the logging call path) and many
//! readers; readers scan a snapshot and may observe a prefix of later state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use switchboard_types::config::BusConfig;
use switchboard_types::error::RepositoryError;
use switchboard_types::event::{Event, EventFilter, EventKind, ExportFormat};
use switchboard_types::metrics::{AgentStats, FlowSummary, LoggerMetrics, MetricsAggregate, ToolStats};

use super::bus::EventBus;
use super::metrics::{DURATION_KEY, MetricsSubscriber, TOOL_KEY};
use super::store::BoxEventStore;
use super::subscriber::{Subscriber, SubscriberId};

/// Errors from logger operations that touch the filesystem.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("export io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no event store attached")]
    NoStore,

    #[error("event store error: {0}")]
    Store(#[from] RepositoryError),
}

struct LoggerInner {
    bus: EventBus,
    events: RwLock<Vec<Event>>,
    metrics: MetricsSubscriber,
    store: Option<Arc<BoxEventStore>>,
}

/// Correlating event logger. Cheap to clone.
#[derive(Clone)]
pub struct EventLogger {
    inner: Arc<LoggerInner>,
}

impl EventLogger {
    /// Build a logger around an existing bus and register the metrics
    /// subscriber on it.
    pub fn new(bus: EventBus) -> Self {
        Self::build(bus, None)
    }

    /// Build a logger with its own bus.
    pub fn with_config(config: &BusConfig) -> Self {
        Self::new(EventBus::new(config))
    }

    /// Build a logger that also writes every event to `store`.
    pub fn with_store(bus: EventBus, store: BoxEventStore) -> Self {
        Self::build(bus, Some(Arc::new(store)))
    }

    fn build(bus: EventBus, store: Option<Arc<BoxEventStore>>) -> Self {
        let metrics = MetricsSubscriber::new();
        bus.add_subscriber(metrics.clone());
        Self {
            inner: Arc::new(LoggerInner {
                bus,
                events: RwLock::new(Vec::new()),
                metrics,
                store,
            }),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Register an additional subscriber on the underlying bus.
    pub fn add_subscriber<S: Subscriber>(&self, subscriber: S) -> SubscriberId {
        self.inner.bus.add_subscriber(subscriber)
    }

    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        self.inner.bus.remove_subscriber(id)
    }

    pub fn has_store(&self) -> bool {
        self.inner.store.is_some()
    }

    /// Record an event, forward it through the queued bus path, and persist
    /// it when a store is attached. Persistence failures are only logged.
    pub async fn log_event(&self, event: Event) {
        self.append(&event);

        if let Some(store) = &self.inner.store {
            if let Err(e) = store.save(&event).await {
                warn!(event_id = %event.event_id(), error = %e, "Failed to persist event");
            }
        }

        self.inner.bus.emit_event(event).await;
    }

    /// Record an event and forward it through the immediate bus path.
    ///
    /// Persistence is scheduled on the current runtime, if any, as one
    /// detached save per event. Those saves can complete out of emission
    /// order and are lost if the runtime shuts down before they run; use
    /// [`log_event`](Self::log_event) when the store must see every event
    /// before the call returns.
    pub fn log_event_sync(&self, event: Event) {
        self.append(&event);

        if let Some(store) = &self.inner.store {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let store = Arc::clone(store);
                    let pending = event.clone();
                    handle.spawn(async move {
                        if let Err(e) = store.save(&pending).await {
                            warn!(event_id = %pending.event_id(), error = %e, "Failed to persist event");
                        }
                    });
                }
                Err(_) => {
                    warn!(event_id = %event.event_id(), "No async runtime available, event not persisted");
                }
            }
        }

        self.inner.bus.emit_event_sync(event);
    }

    fn append(&self, event: &Event) {
        debug!(
            event_id = %event.event_id(),
            kind = %event.kind(),
            flow_id = ?event.flow_id(),
            agent = ?event.agent_name(),
            team = ?event.team_name(),
            "Event logged"
        );
        self.inner
            .events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn snapshot(&self) -> Vec<Event> {
        self.inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events matching the filter, in emission order. With `limit`, only the
    /// most recent N matches are kept.
    pub fn get_events(&self, filter: &EventFilter) -> Vec<Event> {
        let events = self
            .inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut matched: Vec<Event> = events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            if matched.len() > limit {
                matched.drain(..matched.len() - limit);
            }
        }
        matched
    }

    /// Number of events in the in-memory log.
    pub fn len(&self) -> usize {
        self.inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summarize one flow by scanning the in-memory log.
    ///
    /// Returns `None` when no event carries `flow_id`.
    pub fn get_flow_summary(&self, flow_id: Uuid) -> Option<FlowSummary> {
        let events = self.get_events(&EventFilter::new().flow(flow_id));
        let first = events.first()?;
        let last = events.last()?;

        let mut agents: BTreeMap<String, AgentStats> = BTreeMap::new();
        let mut tools: BTreeMap<String, ToolStats> = BTreeMap::new();
        let mut errors = Vec::new();
        let mut reported_duration = None;

        for event in &events {
            let duration = event.payload_u64(DURATION_KEY).unwrap_or(0);

            if let Some(agent) = event.agent_name() {
                let stats = agents.entry(agent.to_string()).or_default();
                stats.events += 1;
                match event.kind() {
                    EventKind::AgentCompleted => {
                        stats.completions += 1;
                        stats.total_duration_ms += duration;
                    }
                    EventKind::AgentError => {
                        stats.errors += 1;
                        stats.total_duration_ms += duration;
                    }
                    _ => {}
                }
            }

            if let Some(tool) = event.payload_str(TOOL_KEY) {
                match event.kind() {
                    EventKind::ToolExecuted => {
                        tools.entry(tool.to_string()).or_default().calls += 1;
                    }
                    EventKind::ToolResult => {
                        tools.entry(tool.to_string()).or_default().total_duration_ms += duration;
                    }
                    EventKind::ToolError => {
                        let stats = tools.entry(tool.to_string()).or_default();
                        stats.errors += 1;
                        stats.total_duration_ms += duration;
                    }
                    _ => {}
                }
            }

            if event.kind().is_error() {
                let message = event
                    .payload_str("message")
                    .or_else(|| event.payload_str("error"))
                    .unwrap_or("unknown error");
                errors.push(format!("{}: {message}", event.kind()));
            }

            if matches!(event.kind(), EventKind::FlowCompleted | EventKind::FlowError) {
                reported_duration = event.payload_u64(DURATION_KEY).or(reported_duration);
            }
        }

        let started_at = first.timestamp();
        let ended_at = last.timestamp();
        let elapsed = (ended_at - started_at).num_milliseconds().max(0) as u64;

        Some(FlowSummary {
            flow_id,
            started_at: Some(started_at),
            ended_at: Some(ended_at),
            duration_ms: Some(reported_duration.unwrap_or(elapsed)),
            total_events: events.len(),
            agents,
            tools,
            errors,
        })
    }

    /// Global counts and uniques across the in-memory log.
    pub fn get_metrics(&self) -> LoggerMetrics {
        let events = self
            .inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut flows = BTreeSet::new();
        let mut agents = BTreeSet::new();
        let mut teams = BTreeSet::new();
        let mut tools = BTreeSet::new();
        let mut events_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut error_count = 0;

        for event in events.iter() {
            if let Some(flow_id) = event.flow_id() {
                flows.insert(flow_id);
            }
            if let Some(agent) = event.agent_name() {
                agents.insert(agent);
            }
            if let Some(team) = event.team_name() {
                teams.insert(team);
            }
            if let Some(tool) = event.payload_str(TOOL_KEY) {
                tools.insert(tool);
            }
            if event.kind().is_error() {
                error_count += 1;
            }
            *events_by_kind.entry(event.kind().to_string()).or_default() += 1;
        }

        LoggerMetrics {
            total_events: events.len(),
            unique_flows: flows.len(),
            unique_agents: agents.len(),
            unique_teams: teams.len(),
            unique_tools: tools.len(),
            error_count,
            events_by_kind,
        }
    }

    /// Snapshot of the bus-fed aggregate.
    ///
    /// Reflects only events the bus has delivered; call `flush` first for an
    /// up-to-date view of the queued path.
    pub fn metrics_aggregate(&self) -> MetricsAggregate {
        self.inner.metrics.snapshot()
    }

    /// Write the in-memory log to `path`. Returns the number of events written.
    pub async fn export_events(
        &self,
        path: impl AsRef<Path>,
        format: ExportFormat,
    ) -> Result<usize, LoggerError> {
        let events = self.snapshot();
        let path = path.as_ref();

        let body = match format {
            ExportFormat::Json => serde_json::to_vec_pretty(&events)?,
            ExportFormat::JsonLines => {
                let mut buf = Vec::new();
                for event in &events {
                    serde_json::to_writer(&mut buf, event)?;
                    buf.push(b'\n');
                }
                buf
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(&body).await?;
        file.flush().await?;

        debug!(path = %path.display(), count = events.len(), ?format, "Events exported");
        Ok(events.len())
    }

    /// Query the attached store directly (survives `clear` and restarts).
    pub async fn load_persisted(&self, filter: &EventFilter) -> Result<Vec<Event>, LoggerError> {
        let store = self.inner.store.as_ref().ok_or(LoggerError::NoStore)?;
        Ok(store.load(filter).await?)
    }

    /// Drop the in-memory log and reset the bus-fed aggregate.
    pub fn clear(&self) {
        self.inner
            .events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner.metrics.reset();
    }

    /// Wait for queued events to reach every subscriber.
    pub async fn flush(&self) {
        self.inner.bus.flush().await;
    }

    pub fn shutdown(&self) {
        self.inner.bus.shutdown();
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("events", &self.len())
            .field("has_store", &self.has_store())
            .field("bus", &self.inner.bus)
            .finish()
    }
}
