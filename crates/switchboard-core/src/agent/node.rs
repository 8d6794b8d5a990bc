//! AgentNode: leaf executor for one unit of work.
//!
//! Given the ordered message state, an agent calls its LLM, runs any tool
//! calls through `InstrumentedTool`, feeds the results back, and finally
//! appends its answer. Lifecycle events go through the caller's
//! `EventContext` or, failing that, the bound one stamped with the state's
//! flow id; an unbound node runs with tracing only.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use thiserror::Error;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use switchboard_observe::genai_attrs::OP_INVOKE_AGENT;
use switchboard_types::config::AgentConfig;
use switchboard_types::error::{ToolError, WorkerError};
use switchboard_types::event::EventKind;
use switchboard_types::llm::{CompletionRequest, LlmError, Message};
use switchboard_types::state::FlowExecutionState;

use crate::event::EventContext;
use crate::event::metrics::DURATION_KEY;
use crate::llm::BoxLlmProvider;

use super::tool::{InstrumentedTool, Tool, render_output};
use super::worker::Worker;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Errors raised while an agent executes.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("tool {tool} failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool round limit of {0} exceeded")]
    ToolRoundsExceeded(u32),
}

impl AgentError {
    /// Short machine-readable error kind, used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Llm(_) => "llm",
            AgentError::Tool { .. } => "tool",
            AgentError::UnknownTool(_) => "unknown_tool",
            AgentError::ToolRoundsExceeded(_) => "tool_rounds_exceeded",
        }
    }
}

/// An LLM-plus-tools executor.
pub struct AgentNode {
    name: String,
    provider: Arc<BoxLlmProvider>,
    model: String,
    system_prompt: Option<String>,
    max_tokens: u32,
    temperature: Option<f64>,
    tools: Vec<InstrumentedTool>,
    capabilities: Vec<String>,
    config: AgentConfig,
    context: RwLock<Option<EventContext>>,
}

impl AgentNode {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<BoxLlmProvider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            model: model.into(),
            system_prompt: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            tools: Vec::new(),
            capabilities: Vec::new(),
            config: AgentConfig::default(),
            context: RwLock::new(None),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Routing hints shown to supervisors.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(mut self, config: &AgentConfig) -> Self {
        self.config = config.clone();
        for tool in &mut self.tools {
            tool.set_preview_chars(config.tool_preview_chars);
        }
        self
    }

    /// Register a tool, wrapping it in `InstrumentedTool`.
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(InstrumentedTool::new(
            tool,
            self.name.clone(),
            self.config.tool_preview_chars,
        ));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Bind the base context used when no per-run context is passed.
    pub fn bind(&self, ctx: EventContext) {
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = Some(ctx);
    }

    pub fn context(&self) -> Option<EventContext> {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run the agent against `state`.
    ///
    /// On success the answer is appended as an assistant message named after
    /// the agent. On failure `state` is left unchanged, `AgentError` is
    /// emitted, and the error is returned.
    pub async fn execute(&self, state: &mut FlowExecutionState) -> Result<(), AgentError> {
        let ctx = self.context().map(|ctx| ctx.for_flow(state.flow_id()));
        self.execute_with(state, ctx).await
    }

    /// Like [`execute`](Self::execute), emitting through `ctx`.
    pub async fn execute_in(
        &self,
        state: &mut FlowExecutionState,
        ctx: &EventContext,
    ) -> Result<(), AgentError> {
        self.execute_with(state, Some(ctx.clone())).await
    }

    async fn execute_with(
        &self,
        state: &mut FlowExecutionState,
        ctx: Option<EventContext>,
    ) -> Result<(), AgentError> {
        let start = Instant::now();

        if let Some(ctx) = &ctx {
            ctx.emit(
                ctx.event(EventKind::AgentStarted)
                    .with_agent(&self.name)
                    .with_field("tools", self.tool_names())
                    .with_field("message_count", state.messages().len()),
            )
            .await;
        }

        let outcome = self.run_loop(state.messages().to_vec(), ctx.as_ref()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok((content, tool_uses)) => {
                debug!(agent = %self.name, duration_ms, tool_uses, "Agent completed");
                state.push(Message::assistant(content).named(&self.name));
                if let Some(ctx) = &ctx {
                    ctx.emit(
                        ctx.event(EventKind::AgentCompleted)
                            .with_agent(&self.name)
                            .with_field(DURATION_KEY, duration_ms)
                            .with_field("tool_uses", tool_uses),
                    )
                    .await;
                }
                Ok(())
            }
            Err(e) => {
                debug!(agent = %self.name, error = %e, "Agent failed");
                if let Some(ctx) = &ctx {
                    ctx.emit(
                        ctx.event(EventKind::AgentError)
                            .with_agent(&self.name)
                            .with_field("error_kind", e.kind())
                            .with_field("message", e.to_string())
                            .with_field(DURATION_KEY, duration_ms),
                    )
                    .await;
                }
                Err(e)
            }
        }
    }

    /// LLM/tool loop. Returns the final text and the number of tool calls.
    async fn run_loop(
        &self,
        mut messages: Vec<Message>,
        ctx: Option<&EventContext>,
    ) -> Result<(String, u32), AgentError> {
        let mut tool_uses = 0u32;
        let mut rounds = 0u32;

        loop {
            let request = self.build_request(messages.clone());

            let span = info_span!(
                "gen_ai.complete",
                gen_ai.system = self.provider.name(),
                gen_ai.operation.name = OP_INVOKE_AGENT,
                gen_ai.agent.name = %self.name,
                gen_ai.request.model = %request.model,
                gen_ai.request.max_tokens = request.max_tokens,
                gen_ai.request.temperature = ?request.temperature,
            );
            let response = self.provider.complete(&request).instrument(span).await?;

            debug!(
                agent = %self.name,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                stop_reason = %response.stop_reason,
                tool_calls = response.tool_calls.len(),
                "LLM response received"
            );

            if response.tool_calls.is_empty() {
                return Ok((response.content, tool_uses));
            }

            if rounds >= self.config.max_tool_rounds {
                return Err(AgentError::ToolRoundsExceeded(self.config.max_tool_rounds));
            }
            rounds += 1;

            messages.push(Message::assistant(response.content).named(&self.name));

            for call in &response.tool_calls {
                let tool = self
                    .tools
                    .iter()
                    .find(|t| t.name() == call.name)
                    .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;

                tool_uses += 1;
                let output = tool.call(ctx, call).await.map_err(|source| AgentError::Tool {
                    tool: call.name.clone(),
                    source,
                })?;
                messages.push(Message::tool(&call.id, render_output(&output)).named(&call.name));
            }
        }
    }

    fn build_request(&self, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            system: self.system_prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop_sequences: None,
            tools: self.tools.iter().map(InstrumentedTool::definition).collect(),
        }
    }
}

impl std::fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentNode")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// Agents can serve as team workers: the task becomes a fresh user message
/// and the agent's answer is the worker result.
impl Worker for AgentNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn run(&self, task: &str) -> Result<String, WorkerError> {
        let mut state = FlowExecutionState::with_user_message(Uuid::now_v7(), task);
        self.execute(&mut state)
            .await
            .map_err(|e| WorkerError::failed(e.to_string()))?;
        Ok(worker_answer(&state))
    }

    async fn run_in(&self, task: &str, ctx: &EventContext) -> Result<String, WorkerError> {
        let flow_id = ctx.flow_id().unwrap_or_else(Uuid::now_v7);
        let mut state = FlowExecutionState::with_user_message(flow_id, task);
        self.execute_in(&mut state, ctx)
            .await
            .map_err(|e| WorkerError::failed(e.to_string()))?;
        Ok(worker_answer(&state))
    }
}

fn worker_answer(state: &FlowExecutionState) -> String {
    state
        .last_assistant_content()
        .unwrap_or_default()
        .to_string()
}
