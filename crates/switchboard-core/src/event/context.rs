//! Binding between an emitting component and its logger.
//!
//! An `EventContext` is a plain value: the logger plus the correlation ids
//! stamped on every event built from it. A `FlowRouter` holds a base context
//! with no flow and derives a child per run with [`EventContext::for_flow`];
//! teams narrow it further with [`EventContext::for_team`]. Children are
//! passed down explicitly, so concurrent runs never see each other's ids.

use uuid::Uuid;

use switchboard_types::event::{Event, EventKind};

use super::logger::EventLogger;

/// Logger handle plus the flow and team ids for emitted events.
#[derive(Clone, Debug)]
pub struct EventContext {
    logger: EventLogger,
    flow_id: Option<Uuid>,
    team_name: Option<String>,
}

impl EventContext {
    pub fn new(logger: EventLogger) -> Self {
        Self {
            logger,
            flow_id: None,
            team_name: None,
        }
    }

    /// Child context whose events belong to `flow_id`.
    pub fn for_flow(&self, flow_id: Uuid) -> Self {
        Self {
            logger: self.logger.clone(),
            flow_id: Some(flow_id),
            team_name: self.team_name.clone(),
        }
    }

    /// Child context whose events are attributed to `team_name`.
    pub fn for_team(&self, team_name: impl Into<String>) -> Self {
        Self {
            logger: self.logger.clone(),
            flow_id: self.flow_id,
            team_name: Some(team_name.into()),
        }
    }

    pub fn logger(&self) -> &EventLogger {
        &self.logger
    }

    pub fn flow_id(&self) -> Option<Uuid> {
        self.flow_id
    }

    pub fn team_name(&self) -> Option<&str> {
        self.team_name.as_deref()
    }

    /// New event of `kind` already tagged with this context's ids.
    pub fn event(&self, kind: EventKind) -> Event {
        let event = Event::new(kind).with_flow(self.flow_id);
        match &self.team_name {
            Some(team) => event.with_team(team.as_str()),
            None => event,
        }
    }

    pub async fn emit(&self, event: Event) {
        self.logger.log_event(event).await;
    }
}
