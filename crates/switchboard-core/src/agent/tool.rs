//! Tools callable by an `AgentNode`, and the instrumentation decorator.
//!
//! `InstrumentedTool` wraps a tool once, at registration, and reports each
//! call through the agent's event context:
//! `ToolExecuted` -> `ToolArgs` -> `ToolResult` | `ToolError`.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde_json::{Map, Value, json};
use tracing::debug;

use switchboard_types::error::ToolError;
use switchboard_types::event::EventKind;
use switchboard_types::llm::{ToolCall, ToolDefinition};

use crate::event::EventContext;
use crate::event::metrics::{DURATION_KEY, TOOL_KEY};

/// Argument keys that carry framework plumbing, never user input.
const PLUMBING_KEYS: &[&str] = &["callbacks", "run_manager", "config"];

/// A callable capability exposed to the LLM.
pub trait Tool: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn call(&self, args: Value) -> impl Future<Output = Result<Value, ToolError>> + Send;
}

/// Object-safe version of [`Tool`] with a boxed future.
pub trait ToolDyn: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    fn call_boxed(&self, args: Value)
    -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>>;
}

impl<T: Tool> ToolDyn for T {
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn description(&self) -> &str {
        Tool::description(self)
    }

    fn parameters(&self) -> Value {
        Tool::parameters(self)
    }

    fn call_boxed(
        &self,
        args: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(self.call(args))
    }
}

/// Decorator that reports every call of the wrapped tool.
pub struct InstrumentedTool {
    inner: Box<dyn ToolDyn>,
    agent_name: String,
    preview_chars: usize,
}

impl InstrumentedTool {
    pub fn new<T: Tool>(tool: T, agent_name: impl Into<String>, preview_chars: usize) -> Self {
        Self {
            inner: Box::new(tool),
            agent_name: agent_name.into(),
            preview_chars,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn set_preview_chars(&mut self, preview_chars: usize) {
        self.preview_chars = preview_chars;
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.inner.name().to_string(),
            description: self.inner.description().to_string(),
            input_schema: self.inner.parameters(),
        }
    }

    /// Run one tool call. Without a context the call runs silently.
    pub async fn call(
        &self,
        ctx: Option<&EventContext>,
        call: &ToolCall,
    ) -> Result<Value, ToolError> {
        let tool = self.inner.name();

        if let Some(ctx) = ctx {
            ctx.emit(
                ctx.event(EventKind::ToolExecuted)
                    .with_agent(&self.agent_name)
                    .with_field(TOOL_KEY, tool)
                    .with_field("call_id", call.id.as_str()),
            )
            .await;
            ctx.emit(
                ctx.event(EventKind::ToolArgs)
                    .with_agent(&self.agent_name)
                    .with_field(TOOL_KEY, tool)
                    .with_field("args", sanitize_args(&call.input)),
            )
            .await;
        }

        let start = Instant::now();
        let result = self.inner.call_boxed(call.input.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            agent = %self.agent_name,
            tool,
            duration_ms,
            success = result.is_ok(),
            "Tool call finished"
        );

        if let Some(ctx) = ctx {
            let event = match &result {
                Ok(output) => ctx
                    .event(EventKind::ToolResult)
                    .with_field("preview", truncate_preview(&render_output(output), self.preview_chars))
                    .with_field("success", true),
                Err(e) => ctx
                    .event(EventKind::ToolError)
                    .with_field("error_kind", e.kind())
                    .with_field("message", e.to_string()),
            };
            ctx.emit(
                event
                    .with_agent(&self.agent_name)
                    .with_field(TOOL_KEY, tool)
                    .with_field(DURATION_KEY, duration_ms),
            )
            .await;
        }

        result
    }
}

/// Drop plumbing keys (leading `_`, `callbacks`, `run_manager`, `config`)
/// from an argument object. Non-object arguments pass through unchanged.
pub fn sanitize_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !k.starts_with('_') && !PLUMBING_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
        ),
        other => other.clone(),
    }
}

/// Text form of a tool output: strings verbatim, everything else as JSON.
pub fn render_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keep at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
