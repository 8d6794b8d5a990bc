//! FlowRouter: top-level composition of teams and standalone agents.
//!
//! Each run gets a fresh `flow_id` and a child of the router's base
//! `EventContext` carrying it. That child is passed to every team, worker,
//! and agent the run dispatches to, so concurrent runs on one router keep
//! their events apart. The supervisor is consulted once per step; its reply is matched
//! against entity names in registration order.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use switchboard_observe::genai_attrs::OP_ROUTE_FLOW;
use switchboard_types::config::FlowConfig;
use switchboard_types::event::EventKind;
use switchboard_types::llm::{LlmError, Message, MessageRole};
use switchboard_types::state::FlowExecutionState;

use crate::agent::AgentNode;
use crate::event::metrics::DURATION_KEY;
use crate::event::{EventContext, EventLogger};
use crate::team::{Candidate, RoutingDecision, Supervisor, TeamCoordinator};

use super::graph::{DispatchGraph, EntityKind, GraphError};

/// Name used on supervisor replies appended to the flow.
const SUPERVISOR_NAME: &str = "supervisor";

/// Errors that abort a flow or its configuration.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),

    #[error("entity name must not be empty")]
    EmptyName,

    #[error("invalid dispatch graph: {0}")]
    Graph(#[from] GraphError),

    #[error("flow supervisor failed: {0}")]
    Supervisor(#[source] LlmError),
}

impl FlowError {
    /// Short machine-readable error kind, used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::DuplicateEntity(_) => "duplicate_entity",
            FlowError::EmptyName => "empty_name",
            FlowError::Graph(_) => "graph",
            FlowError::Supervisor(_) => "supervisor",
        }
    }
}

/// Why a flow run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The supervisor emitted the terminal token.
    Finished,
    /// The supervisor named no registered entity.
    NoRoute,
    /// The step ceiling was reached.
    StepLimit,
    /// A team or agent failed.
    EntityFailed,
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Finished => "finished",
            StopReason::NoRoute => "no_route",
            StopReason::StepLimit => "step_limit",
            StopReason::EntityFailed => "entity_failed",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of one flow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResult {
    pub flow_id: Uuid,
    pub messages: Vec<Message>,
    /// True when the supervisor ended the run (`Finished` or `NoRoute`).
    pub completed: bool,
    pub stop_reason: StopReason,
    pub error: Option<String>,
    /// Entities dispatched to, in order.
    pub route: Vec<String>,
    /// Supervisor consultations made.
    pub steps: u32,
}

impl FlowResult {
    /// Content of the last assistant message.
    pub fn final_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }
}

enum Entity {
    Team(TeamCoordinator),
    Agent(AgentNode),
}

impl Entity {
    fn name(&self) -> &str {
        match self {
            Entity::Team(team) => team.name(),
            Entity::Agent(agent) => agent.name(),
        }
    }

    fn kind(&self) -> EntityKind {
        match self {
            Entity::Team(_) => EntityKind::Team,
            Entity::Agent(_) => EntityKind::Agent,
        }
    }

    fn candidate(&self) -> Candidate {
        let capabilities = match self {
            Entity::Team(team) => team
                .worker_names()
                .into_iter()
                .map(|w| format!("worker {w}"))
                .collect(),
            Entity::Agent(agent) => agent.capabilities().to_vec(),
        };
        Candidate::new(self.name(), capabilities)
    }
}

enum Dispatch {
    Done,
    Cancelled,
    Failed(String),
}

/// Routes a task across registered teams and agents.
pub struct FlowRouter {
    name: String,
    supervisor: Supervisor,
    entities: Vec<Entity>,
    ctx: EventContext,
    step_ceiling: u32,
}

impl FlowRouter {
    pub fn new(name: impl Into<String>, supervisor: Supervisor, logger: EventLogger) -> Self {
        Self {
            name: name.into(),
            supervisor,
            entities: Vec::new(),
            ctx: EventContext::new(logger),
            step_ceiling: FlowConfig::default().step_ceiling,
        }
    }

    pub fn with_config(mut self, config: &FlowConfig) -> Self {
        self.step_ceiling = config.step_ceiling;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &EventContext {
        &self.ctx
    }

    pub fn logger(&self) -> &EventLogger {
        self.ctx.logger()
    }

    /// Registered entity names in registration order.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(Entity::name).collect()
    }

    /// Register a team. It is bound to the router's base context for
    /// standalone use; flow runs pass their own child context.
    pub fn add_team(&mut self, team: TeamCoordinator) -> Result<(), FlowError> {
        self.check_name(team.name())?;
        team.bind(self.ctx.clone());
        debug!(router = %self.name, team = team.name(), "Team registered");
        self.entities.push(Entity::Team(team));
        Ok(())
    }

    /// Register a standalone agent, bound like [`add_team`](Self::add_team).
    pub fn add_agent(&mut self, agent: AgentNode) -> Result<(), FlowError> {
        self.check_name(agent.name())?;
        agent.bind(self.ctx.clone());
        debug!(router = %self.name, agent = agent.name(), "Agent registered");
        self.entities.push(Entity::Agent(agent));
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), FlowError> {
        if name.trim().is_empty() {
            return Err(FlowError::EmptyName);
        }
        if self
            .entities
            .iter()
            .any(|e| e.name().eq_ignore_ascii_case(name))
        {
            return Err(FlowError::DuplicateEntity(name.to_string()));
        }
        Ok(())
    }

    /// Build and validate the supervisor/entity graph.
    pub fn build_graph(&self) -> Result<DispatchGraph, FlowError> {
        Ok(DispatchGraph::build(
            self.entities.iter().map(|e| (e.name(), e.kind())),
        )?)
    }

    /// Run `message` through the flow. `step_ceiling` overrides the configured
    /// ceiling when given.
    pub async fn run(&self, message: &str, step_ceiling: Option<u32>) -> Result<FlowResult, FlowError> {
        self.run_with_cancellation(message, step_ceiling, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), stopping promptly once `cancel` fires.
    ///
    /// Entity failures, cancellation, and the step ceiling end the run with
    /// `Ok`; only graph and supervisor failures return `Err`.
    pub async fn run_with_cancellation(
        &self,
        message: &str,
        step_ceiling: Option<u32>,
        cancel: CancellationToken,
    ) -> Result<FlowResult, FlowError> {
        let flow_id = Uuid::now_v7();
        let ceiling = step_ceiling.unwrap_or(self.step_ceiling);
        let start = Instant::now();
        let ctx = self.ctx.for_flow(flow_id);

        info!(router = %self.name, %flow_id, ceiling, "Flow started");
        ctx.emit(
            ctx.event(EventKind::FlowStarted)
                .with_field("router", self.name.as_str())
                .with_field("entities", self.entity_names())
                .with_field("step_ceiling", ceiling),
        )
        .await;

        let graph = match self.build_graph() {
            Ok(graph) => graph,
            Err(e) => return Err(self.fail(&ctx, e, start).await),
        };
        let names = graph.entity_names();
        let candidates: Vec<Candidate> = self.entities.iter().map(Entity::candidate).collect();
        let role = format!("flow {}", self.name);

        let mut state = FlowExecutionState::with_user_message(flow_id, message);
        let mut route = Vec::new();
        let mut steps = 0u32;

        let (stop_reason, error) = loop {
            if cancel.is_cancelled() {
                break (StopReason::Cancelled, Some(format!("Flow {flow_id} cancelled")));
            }
            if steps >= ceiling {
                warn!(router = %self.name, %flow_id, ceiling, "Step ceiling reached");
                break (StopReason::StepLimit, None);
            }
            steps += 1;

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                reply = self.supervisor.decide(
                    &role,
                    OP_ROUTE_FLOW,
                    &candidates,
                    state.messages().to_vec(),
                ) => Some(reply),
            };
            let raw = match reply {
                None => continue,
                Some(Ok(raw)) => raw,
                Some(Err(e)) => return Err(self.fail(&ctx, FlowError::Supervisor(e), start).await),
            };

            match RoutingDecision::parse(&raw, &names) {
                RoutingDecision::Finish => break (StopReason::Finished, None),
                RoutingDecision::Converse { message, .. } => {
                    if !message.trim().is_empty() {
                        state.push(Message::assistant(message).named(SUPERVISOR_NAME));
                    }
                    break (StopReason::NoRoute, None);
                }
                RoutingDecision::RouteTo { target, .. } => {
                    debug!(router = %self.name, %flow_id, step = steps, target = %target, "Routing");
                    route.push(target.clone());
                    match self.dispatch(&ctx, &target, message, &mut state, &cancel).await {
                        Dispatch::Done | Dispatch::Cancelled => {}
                        Dispatch::Failed(error) => break (StopReason::EntityFailed, Some(error)),
                    }
                }
            }
        };

        let completed = matches!(stop_reason, StopReason::Finished | StopReason::NoRoute);
        if completed {
            state.mark_complete();
        }
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Some(error) = &error {
            warn!(router = %self.name, %flow_id, %stop_reason, error = %error, "Flow stopped with error");
            ctx.emit(
                ctx.event(EventKind::FlowError)
                    .with_field("error_kind", stop_reason.to_string())
                    .with_field("message", error.as_str())
                    .with_field(DURATION_KEY, duration_ms),
            )
            .await;
        }

        let messages = state.into_messages();
        ctx.emit(
            ctx.event(EventKind::FlowCompleted)
                .with_field(DURATION_KEY, duration_ms)
                .with_field("message_count", messages.len())
                .with_field("stop_reason", stop_reason.to_string())
                .with_field("steps", steps)
                .with_field("route", route.clone()),
        )
        .await;

        info!(router = %self.name, %flow_id, %stop_reason, steps, duration_ms, "Flow finished");

        Ok(FlowResult {
            flow_id,
            messages,
            completed,
            stop_reason,
            error,
            route,
            steps,
        })
    }

    async fn dispatch(
        &self,
        ctx: &EventContext,
        target: &str,
        message: &str,
        state: &mut FlowExecutionState,
        cancel: &CancellationToken,
    ) -> Dispatch {
        let Some(entity) = self.entities.iter().find(|e| e.name() == target) else {
            return Dispatch::Failed(format!("No entity named {target}"));
        };

        match entity {
            Entity::Team(team) => {
                let task = team_task(message, state);
                let team_state = team.run_in(&task, ctx, cancel.clone()).await;
                if cancel.is_cancelled() {
                    return Dispatch::Cancelled;
                }
                if let Some(error) = &team_state.error_message {
                    return Dispatch::Failed(format!("Team {} failed: {error}", team.name()));
                }
                state.push(
                    Message::assistant(team_state.summary(team.name()).render()).named(team.name()),
                );
                Dispatch::Done
            }
            Entity::Agent(agent) => {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    outcome = agent.execute_in(state, ctx) => Some(outcome),
                };
                match outcome {
                    None => Dispatch::Cancelled,
                    Some(Ok(())) => Dispatch::Done,
                    Some(Err(e)) => Dispatch::Failed(format!("Agent {} failed: {e}", agent.name())),
                }
            }
        }
    }

    async fn fail(&self, ctx: &EventContext, error: FlowError, start: Instant) -> FlowError {
        warn!(router = %self.name, flow_id = ?ctx.flow_id(), error = %error, "Flow failed");
        ctx.emit(
            ctx.event(EventKind::FlowError)
                .with_field("error_kind", error.kind())
                .with_field("message", error.to_string())
                .with_field(DURATION_KEY, start.elapsed().as_millis() as u64),
        )
        .await;
        error
    }
}

impl std::fmt::Debug for FlowRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRouter")
            .field("name", &self.name)
            .field("entities", &self.entity_names())
            .field("step_ceiling", &self.step_ceiling)
            .finish()
    }
}

/// Task handed to a team: the request plus what earlier entities answered.
fn team_task(message: &str, state: &FlowExecutionState) -> String {
    let mut task = message.to_string();
    let prior: Vec<&Message> = state
        .messages()
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .collect();
    if !prior.is_empty() {
        task.push_str("\n\nContext so far:");
        for m in prior {
            let who = m.name.as_deref().unwrap_or("assistant");
            task.push_str(&format!("\n- {who}: {}", m.content));
        }
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::WorkerHandle;
    use crate::llm::BoxLlmProvider;
    use crate::test_support::{ScriptedProvider, Step};
    use std::sync::Arc;
    use switchboard_types::config::BusConfig;
    use switchboard_types::error::WorkerError;
    use switchboard_types::event::EventFilter;

    fn provider(p: ScriptedProvider) -> Arc<BoxLlmProvider> {
        Arc::new(BoxLlmProvider::new(p))
    }

    fn agent(name: &str, script: ScriptedProvider) -> AgentNode {
        AgentNode::new(name, provider(script), "agent-model")
    }

    fn router(script: ScriptedProvider) -> FlowRouter {
        FlowRouter::new(
            "main",
            Supervisor::new(provider(script), "sup-model"),
            EventLogger::with_config(&BusConfig::default()),
        )
    }

    fn kinds(router: &FlowRouter, flow_id: Uuid) -> Vec<String> {
        router
            .logger()
            .get_events(&EventFilter::new().flow(flow_id))
            .iter()
            .map(|e| e.kind().to_string())
            .collect()
    }

    #[tokio::test]
    async fn routes_to_agent_then_finishes() {
        let mut router = router(ScriptedProvider::new(["beta please", "FINISH"]));
        router.add_agent(agent("alpha", ScriptedProvider::new(["a"]))).unwrap();
        router
            .add_agent(agent("beta", ScriptedProvider::new(["beta answer"])))
            .unwrap();

        let result = router.run("hi", None).await.unwrap();

        assert!(result.completed);
        assert_eq!(result.stop_reason, StopReason::Finished);
        assert_eq!(result.route, vec!["beta".to_string()]);
        assert_eq!(result.steps, 2);
        assert!(result.error.is_none());
        assert_eq!(result.final_answer(), Some("beta answer"));
        assert_eq!(result.messages[1].name.as_deref(), Some("beta"));
        assert_eq!(
            kinds(&router, result.flow_id),
            vec!["flow_started", "agent_started", "agent_completed", "flow_completed"]
        );

        let completed = router
            .logger()
            .get_events(&EventFilter::new().event_type(EventKind::FlowCompleted));
        assert_eq!(completed[0].payload_str("stop_reason"), Some("finished"));
        assert_eq!(completed[0].payload_u64("message_count"), Some(2));
    }

    #[tokio::test]
    async fn terminal_token_in_any_casing_ends_the_run() {
        for reply in ["FINISH", "finish.", "We're done: Finish", "FINISHED", "alpha finished"] {
            let mut router = router(ScriptedProvider::new([reply]));
            router.add_agent(agent("alpha", ScriptedProvider::new(["a"]))).unwrap();

            let result = router.run("task", None).await.unwrap();
            assert_eq!(result.stop_reason, StopReason::Finished, "{reply}");
            assert!(result.route.is_empty());
            assert_eq!(result.steps, 1);
        }
    }

    #[tokio::test]
    async fn unmatched_reply_stops_with_no_route() {
        let mut router = router(ScriptedProvider::new(["I can answer that myself: 42"]));
        router.add_agent(agent("alpha", ScriptedProvider::new(["a"]))).unwrap();

        let result = router.run("question", None).await.unwrap();

        assert_eq!(result.stop_reason, StopReason::NoRoute);
        assert!(result.completed);
        assert_eq!(result.final_answer(), Some("I can answer that myself: 42"));
        assert_eq!(result.messages.last().unwrap().name.as_deref(), Some("supervisor"));
    }

    #[tokio::test]
    async fn first_registered_match_wins() {
        let writer = ScriptedProvider::new(["drafted"]);
        let mut router = router(ScriptedProvider::new(["Research then Writer", "FINISH"]));
        router.add_agent(agent("writer", writer.clone())).unwrap();
        router
            .add_agent(agent("research", ScriptedProvider::new(["r"])))
            .unwrap();

        let result = router.run("essay", None).await.unwrap();
        assert_eq!(result.route, vec!["writer".to_string()]);
        assert_eq!(writer.call_count(), 1);
    }

    #[tokio::test]
    async fn team_dispatch_shares_the_flow_id() {
        let mut team = TeamCoordinator::new(
            "research",
            Supervisor::new(provider(ScriptedProvider::new(["alpha", "FINISH"])), "team-sup"),
        );
        team.add_worker(WorkerHandle::from_fn("alpha", |task| {
            Ok(format!("looked into {}", task.lines().next().unwrap_or_default()))
        }))
        .unwrap();

        let mut router = router(ScriptedProvider::new(["research", "FINISH"]));
        router.add_team(team).unwrap();

        let result = router.run("rust async", None).await.unwrap();

        assert_eq!(result.stop_reason, StopReason::Finished);
        let answer = result.final_answer().unwrap();
        assert!(answer.contains("Team research completed the task"));
        assert!(answer.contains("- alpha: looked into rust async"));
        assert_eq!(
            kinds(&router, result.flow_id),
            vec![
                "flow_started",
                "team_supervisor_called",
                "team_agent_called",
                "team_supervisor_called",
                "flow_completed"
            ]
        );
    }

    #[tokio::test]
    async fn entity_failure_is_recovered_into_the_result() {
        let mut router = router(ScriptedProvider::repeating("alpha"));
        router
            .add_agent(agent(
                "alpha",
                ScriptedProvider::from_steps(vec![Step::Fail("rate limited".to_string())]),
            ))
            .unwrap();

        let result = router.run("task", None).await.unwrap();

        assert_eq!(result.stop_reason, StopReason::EntityFailed);
        assert!(!result.completed);
        assert_eq!(result.steps, 1);
        let error = result.error.unwrap();
        assert!(error.starts_with("Agent alpha failed"), "{error}");
        assert_eq!(result.messages.len(), 1);
        assert_eq!(
            kinds(&router, result.flow_id),
            vec![
                "flow_started",
                "agent_started",
                "agent_error",
                "flow_error",
                "flow_completed"
            ]
        );
    }

    #[tokio::test]
    async fn failing_team_worker_stops_the_flow() {
        let mut team = TeamCoordinator::new(
            "ops",
            Supervisor::new(provider(ScriptedProvider::repeating("beta")), "team-sup"),
        );
        team.add_worker(WorkerHandle::from_fn("beta", |_| Err(WorkerError::failed("boom"))))
            .unwrap();
        let mut router = router(ScriptedProvider::repeating("ops"));
        router.add_team(team).unwrap();

        let result = router.run("deploy", None).await.unwrap();

        assert_eq!(result.stop_reason, StopReason::EntityFailed);
        assert_eq!(
            result.error.as_deref(),
            Some("Team ops failed: Worker beta failed: boom")
        );
    }

    #[tokio::test]
    async fn step_ceiling_bounds_the_run() {
        let supervisor = ScriptedProvider::repeating("alpha again");
        let mut router = router(supervisor.clone());
        router
            .add_agent(agent("alpha", ScriptedProvider::repeating("ok")))
            .unwrap();

        let result = router.run("loop", Some(3)).await.unwrap();

        assert_eq!(result.stop_reason, StopReason::StepLimit);
        assert!(!result.completed);
        assert_eq!(result.steps, 3);
        assert_eq!(result.route.len(), 3);
        assert_eq!(supervisor.call_count(), 3);
    }

    #[tokio::test]
    async fn configured_ceiling_applies_without_override() {
        let mut router = router(ScriptedProvider::repeating("alpha"))
            .with_config(&FlowConfig { step_ceiling: 2 });
        router
            .add_agent(agent("alpha", ScriptedProvider::repeating("ok")))
            .unwrap();

        let result = router.run("loop", None).await.unwrap();
        assert_eq!(result.steps, 2);
        assert_eq!(result.stop_reason, StopReason::StepLimit);
    }

    #[tokio::test]
    async fn supervisor_failure_returns_error_after_reporting() {
        let mut router = router(ScriptedProvider::new(Vec::<String>::new()));
        router.add_agent(agent("alpha", ScriptedProvider::new(["a"]))).unwrap();

        let err = router.run("task", None).await.unwrap_err();
        assert!(matches!(err, FlowError::Supervisor(_)));

        let errors = router
            .logger()
            .get_events(&EventFilter::new().event_type(EventKind::FlowError));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].payload_str("error_kind"), Some("supervisor"));
        assert!(
            router
                .logger()
                .get_events(&EventFilter::new().event_type(EventKind::FlowCompleted))
                .is_empty()
        );
    }

    #[tokio::test]
    async fn empty_router_fails_graph_validation() {
        let router = router(ScriptedProvider::repeating("x"));
        let err = router.run("task", None).await.unwrap_err();
        assert!(matches!(err, FlowError::Graph(GraphError::Empty)));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_across_kinds() {
        let mut router = router(ScriptedProvider::repeating("x"));
        router.add_agent(agent("alpha", ScriptedProvider::new(["a"]))).unwrap();

        let team = TeamCoordinator::new(
            "Alpha",
            Supervisor::new(provider(ScriptedProvider::repeating("x")), "m"),
        );
        assert!(matches!(
            router.add_team(team),
            Err(FlowError::DuplicateEntity(name)) if name == "Alpha"
        ));
        assert!(matches!(
            router.add_agent(agent("", ScriptedProvider::new(["a"]))),
            Err(FlowError::EmptyName)
        ));
        assert_eq!(router.entity_names(), vec!["alpha"]);
        assert_eq!(router.build_graph().unwrap().node_count(), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let supervisor = ScriptedProvider::repeating("alpha");
        let mut router = router(supervisor.clone());
        router.add_agent(agent("alpha", ScriptedProvider::repeating("ok"))).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = router
            .run_with_cancellation("task", None, cancel)
            .await
            .unwrap();

        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert_eq!(result.steps, 0);
        assert_eq!(supervisor.call_count(), 0);
        assert!(result.error.unwrap().ends_with("cancelled"));
    }

    struct Rendezvous {
        barrier: Arc<tokio::sync::Barrier>,
    }

    impl crate::agent::Worker for Rendezvous {
        fn name(&self) -> &str {
            "alpha"
        }

        async fn run(&self, task: &str) -> Result<String, WorkerError> {
            self.barrier.wait().await;
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(format!("done: {}", task.lines().next().unwrap_or_default()))
        }
    }

    #[tokio::test]
    async fn concurrent_runs_keep_their_flow_id() {
        let mut team = TeamCoordinator::new(
            "research",
            Supervisor::new(
                provider(ScriptedProvider::new(["alpha", "alpha", "FINISH", "FINISH"])),
                "team-sup",
            ),
        );
        team.add_worker(WorkerHandle::from_worker(Rendezvous {
            barrier: Arc::new(tokio::sync::Barrier::new(2)),
        }))
        .unwrap();
        let mut router = router(ScriptedProvider::new([
            "research", "research", "FINISH", "FINISH",
        ]));
        router.add_team(team).unwrap();

        let (one, two) = tokio::join!(router.run("one", None), router.run("two", None));
        let (one, two) = (one.unwrap(), two.unwrap());

        assert_ne!(one.flow_id, two.flow_id);
        let expected = vec![
            "flow_started",
            "team_supervisor_called",
            "team_agent_called",
            "team_supervisor_called",
            "flow_completed",
        ];
        assert_eq!(kinds(&router, one.flow_id), expected);
        assert_eq!(kinds(&router, two.flow_id), expected);
        assert!(one.final_answer().unwrap().contains("done: one"));
        assert!(two.final_answer().unwrap().contains("done: two"));
        assert_eq!(router.logger().len(), 10);
    }

    #[tokio::test]
    async fn each_run_gets_a_fresh_flow_id() {
        let mut router = router(ScriptedProvider::repeating("FINISH"));
        router.add_agent(agent("alpha", ScriptedProvider::new(["a"]))).unwrap();

        let first = router.run("one", None).await.unwrap();
        let second = router.run("two", None).await.unwrap();

        assert_ne!(first.flow_id, second.flow_id);
        assert_eq!(kinds(&router, first.flow_id).len(), 2);
        assert_eq!(kinds(&router, second.flow_id).len(), 2);
        assert_eq!(router.context().flow_id(), None);

        let summary = router.logger().get_flow_summary(first.flow_id).unwrap();
        assert_eq!(summary.total_events, 2);
    }
}
