//! TeamCoordinator: bounded supervisor/worker decision loop.
//!
//! ```text
//! Greeting -> Routing -> { Conversing | Delegating | Finishing }
//!                ^                         |
//!                +-------------------------+
//! ```
//!
//! `Greeting` runs once. `Routing` forces `Finishing` once `execution_count`
//! reaches `max_iterations`, whatever the supervisor would have said.
//! Conversing and Finishing are terminal; Delegating returns to Routing
//! unless the worker failed.
//!
//! Events go through the context handed to [`TeamCoordinator::run_in`], or
//! the bound one for standalone runs, narrowed to this team's name.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_observe::genai_attrs::OP_ROUTE_TEAM;
use switchboard_types::config::TeamConfig;
use switchboard_types::event::EventKind;
use switchboard_types::llm::{LlmError, Message};
use switchboard_types::state::TeamState;

use crate::agent::WorkerHandle;
use crate::event::EventContext;

use super::decision::RoutingDecision;
use super::supervisor::{Candidate, Supervisor};

/// Registration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TeamError {
    #[error("team {team} already has a worker named {worker}")]
    DuplicateWorker { team: String, worker: String },

    #[error("worker name must not be empty")]
    EmptyWorkerName,
}

/// Current phase of the coordination loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamPhase {
    Greeting,
    Routing,
    Conversing { message: String, needs_input: bool },
    Delegating { worker: String, reason: String },
    Finishing,
}

impl fmt::Display for TeamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamPhase::Greeting => write!(f, "greeting"),
            TeamPhase::Routing => write!(f, "routing"),
            TeamPhase::Conversing { .. } => write!(f, "conversing"),
            TeamPhase::Delegating { .. } => write!(f, "delegating"),
            TeamPhase::Finishing => write!(f, "finishing"),
        }
    }
}

/// A named team: one supervisor and its workers.
pub struct TeamCoordinator {
    name: String,
    supervisor: Supervisor,
    workers: Vec<WorkerHandle>,
    max_iterations: u32,
    context: RwLock<Option<EventContext>>,
}

impl TeamCoordinator {
    pub fn new(name: impl Into<String>, supervisor: Supervisor) -> Self {
        Self {
            name: name.into(),
            supervisor,
            workers: Vec::new(),
            max_iterations: TeamConfig::default().max_iterations,
            context: RwLock::new(None),
        }
    }

    pub fn with_config(mut self, config: &TeamConfig) -> Self {
        self.max_iterations = config.max_iterations;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Register a worker. Names are unique within the team (case-insensitive).
    pub fn add_worker(&mut self, worker: WorkerHandle) -> Result<(), TeamError> {
        if worker.name().trim().is_empty() {
            return Err(TeamError::EmptyWorkerName);
        }
        if self
            .workers
            .iter()
            .any(|w| w.name().eq_ignore_ascii_case(worker.name()))
        {
            return Err(TeamError::DuplicateWorker {
                team: self.name.clone(),
                worker: worker.name().to_string(),
            });
        }
        debug!(team = %self.name, worker = worker.name(), "Worker registered");
        self.workers.push(worker);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn worker_names(&self) -> Vec<&str> {
        self.workers.iter().map(WorkerHandle::name).collect()
    }

    /// Bind the base context used by [`run`](Self::run) and
    /// [`run_with_cancellation`](Self::run_with_cancellation).
    pub fn bind(&self, ctx: EventContext) {
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = Some(ctx);
    }

    pub fn context(&self) -> Option<EventContext> {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Coordinate `task` to a terminal state.
    pub async fn run(&self, task: &str) -> TeamState {
        self.run_with_cancellation(task, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), stopping promptly once `cancel` fires.
    pub async fn run_with_cancellation(&self, task: &str, cancel: CancellationToken) -> TeamState {
        let ctx = self.context();
        self.coordinate(task, ctx.as_ref(), cancel).await
    }

    /// Run as part of a flow: events and worker emissions go through `ctx`.
    pub async fn run_in(
        &self,
        task: &str,
        ctx: &EventContext,
        cancel: CancellationToken,
    ) -> TeamState {
        self.coordinate(task, Some(ctx), cancel).await
    }

    async fn coordinate(
        &self,
        task: &str,
        ctx: Option<&EventContext>,
        cancel: CancellationToken,
    ) -> TeamState {
        let ctx = ctx.map(|ctx| ctx.for_team(&self.name));
        let mut state = TeamState::new(task);
        let mut phase = TeamPhase::Greeting;

        info!(team = %self.name, workers = self.workers.len(), "Team run started");

        loop {
            if cancel.is_cancelled() {
                self.cancelled(&mut state);
                break;
            }

            debug!(team = %self.name, %phase, iteration = state.execution_count, "Team phase");

            phase = match phase {
                TeamPhase::Greeting => {
                    state.messages.push(
                        Message::assistant(format!(
                            "Team {} received the task and is planning the work.",
                            self.name
                        ))
                        .named(&self.name),
                    );
                    TeamPhase::Routing
                }

                TeamPhase::Routing => {
                    if state.execution_count >= self.max_iterations {
                        warn!(
                            team = %self.name,
                            max_iterations = self.max_iterations,
                            "Iteration ceiling reached, finishing"
                        );
                        TeamPhase::Finishing
                    } else {
                        state.execution_count += 1;
                        let reply = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            reply = self.consult(&state) => Some(reply),
                        };
                        let Some(reply) = reply else {
                            self.cancelled(&mut state);
                            break;
                        };
                        match reply {
                            Ok(raw) => {
                                let decision = RoutingDecision::parse(&raw, &self.worker_names());
                                self.emit_supervisor_called(ctx.as_ref(), &state, &decision)
                                    .await;
                                match decision {
                                    RoutingDecision::Finish => TeamPhase::Finishing,
                                    RoutingDecision::RouteTo { target, reason } => {
                                        TeamPhase::Delegating {
                                            worker: target,
                                            reason,
                                        }
                                    }
                                    RoutingDecision::Converse {
                                        message,
                                        needs_input,
                                    } => TeamPhase::Conversing {
                                        message,
                                        needs_input,
                                    },
                                }
                            }
                            Err(e) => {
                                warn!(team = %self.name, error = %e, "Supervisor call failed");
                                let message = format!("Supervisor for team {} failed: {e}", self.name);
                                state
                                    .messages
                                    .push(Message::assistant(&message).named(&self.name));
                                state.error_message = Some(message);
                                break;
                            }
                        }
                    }
                }

                TeamPhase::Conversing {
                    message,
                    needs_input,
                } => {
                    state
                        .messages
                        .push(Message::assistant(message).named(&self.name));
                    state.requires_human_input = needs_input;
                    state.is_complete = true;
                    break;
                }

                TeamPhase::Delegating { worker, reason } => {
                    let Some(handle) = self.workers.iter().find(|w| w.name() == worker) else {
                        // Decisions only name registered workers.
                        let message = format!("No worker named {worker} in team {}", self.name);
                        state
                            .messages
                            .push(Message::assistant(&message).named(&self.name));
                        state.error_message = Some(message);
                        break;
                    };

                    state.next_worker = Some(worker.clone());
                    state.messages.push(
                        Message::assistant(format!("Delegating to {worker}: {reason}"))
                            .named(&self.name),
                    );

                    let worker_task = build_worker_task(&state, &reason);
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        outcome = handle.invoke(&worker_task, ctx.as_ref()) => Some(outcome),
                    };
                    state.next_worker = None;
                    let Some(outcome) = outcome else {
                        self.cancelled(&mut state);
                        break;
                    };

                    match outcome {
                        Ok(result) => {
                            self.emit_agent_called(ctx.as_ref(), &worker, true, &result)
                                .await;
                            state
                                .messages
                                .push(Message::assistant(&result).named(&worker));
                            state.record_result(&worker, result);
                            TeamPhase::Routing
                        }
                        Err(e) => {
                            let message = format!("Worker {worker} failed: {e}");
                            warn!(team = %self.name, worker = %worker, error = %e, "Worker failed");
                            self.emit_agent_called(ctx.as_ref(), &worker, false, &message)
                                .await;
                            state
                                .messages
                                .push(Message::assistant(&message).named(&self.name));
                            state.error_message = Some(message);
                            break;
                        }
                    }
                }

                TeamPhase::Finishing => {
                    state.is_complete = true;
                    let summary = state.summary(&self.name).render();
                    state
                        .messages
                        .push(Message::assistant(summary).named(&self.name));
                    break;
                }
            };
        }

        info!(
            team = %self.name,
            iterations = state.execution_count,
            complete = state.is_complete,
            error = ?state.error_message,
            "Team run finished"
        );
        state
    }

    async fn consult(&self, state: &TeamState) -> Result<String, LlmError> {
        let candidates: Vec<Candidate> = self
            .workers
            .iter()
            .map(|w| Candidate::new(w.name(), w.capabilities().to_vec()))
            .collect();
        let role = format!("team {}", self.name);
        self.supervisor
            .decide(&role, OP_ROUTE_TEAM, &candidates, state.messages.clone())
            .await
    }

    fn cancelled(&self, state: &mut TeamState) {
        debug!(team = %self.name, "Team run cancelled");
        state.error_message = Some(format!("Team {} cancelled", self.name));
    }

    async fn emit_supervisor_called(
        &self,
        ctx: Option<&EventContext>,
        state: &TeamState,
        decision: &RoutingDecision,
    ) {
        let Some(ctx) = ctx else { return };
        let mut event = ctx
            .event(EventKind::TeamSupervisorCalled)
            .with_field("iteration", state.execution_count)
            .with_field("decision", decision.label());
        if let Some(target) = decision.target() {
            event = event.with_field("target", target);
        }
        ctx.emit(event).await;
    }

    async fn emit_agent_called(
        &self,
        ctx: Option<&EventContext>,
        worker: &str,
        success: bool,
        output: &str,
    ) {
        let Some(ctx) = ctx else { return };
        ctx.emit(
            ctx.event(EventKind::TeamAgentCalled)
                .with_agent(worker)
                .with_field("success", success)
                .with_field("result_chars", output.chars().count()),
        )
        .await;
    }
}

impl fmt::Debug for TeamCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeamCoordinator")
            .field("name", &self.name)
            .field("workers", &self.worker_names())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

/// Task handed to a worker: the original task plus everything done so far.
fn build_worker_task(state: &TeamState, reason: &str) -> String {
    let mut task = state.current_task.clone();
    if !state.completed_workers.is_empty() {
        task.push_str("\n\nResults so far:");
        for worker in &state.completed_workers {
            if let Some(result) = state.worker_results.get(worker) {
                task.push_str(&format!("\n- {worker}: {result}"));
            }
        }
    }
    let reason = reason.trim();
    if !reason.is_empty() {
        task.push_str(&format!("\n\nSupervisor note: {reason}"));
    }
    task
}
