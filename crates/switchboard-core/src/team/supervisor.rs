//! LLM-backed supervisor shared by teams and the flow router.
//!
//! The supervisor only produces text; callers turn it into a
//! `RoutingDecision` with the candidate list they own.

use std::sync::Arc;

use tracing::{Instrument, debug, info_span};

use switchboard_types::llm::{CompletionRequest, LlmError, Message};

use crate::llm::BoxLlmProvider;

use super::decision::TERMINAL_TOKEN;

const DEFAULT_MAX_TOKENS: u32 = 1024;

/// A routing candidate as presented to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub capabilities: Vec<String>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }
}

/// Asks an LLM which candidate should act next.
#[derive(Clone)]
pub struct Supervisor {
    provider: Arc<BoxLlmProvider>,
    model: String,
    instructions: Option<String>,
    temperature: Option<f64>,
}

impl Supervisor {
    pub fn new(provider: Arc<BoxLlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            instructions: None,
            temperature: Some(0.0),
        }
    }

    /// Extra instructions appended to the routing prompt.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// System prompt listing the candidates and the reply format.
    pub fn routing_prompt(&self, role: &str, candidates: &[Candidate]) -> String {
        let mut prompt = format!(
            "You are the supervisor of {role}. Decide who acts next.\n\nAvailable:\n"
        );
        for candidate in candidates {
            if candidate.capabilities.is_empty() {
                prompt.push_str(&format!("- {}\n", candidate.name));
            } else {
                prompt.push_str(&format!(
                    "- {} ({})\n",
                    candidate.name,
                    candidate.capabilities.join(", ")
                ));
            }
        }
        prompt.push_str(&format!(
            "\nReply with JSON: {{\"action\": \"delegate\" | \"converse\" | \"finish\", \
             \"worker\": \"<name>\", \"message\": \"<reason or reply>\", \"needs_input\": false}}.\n\
             Alternatively reply with the name of who should act next, or {TERMINAL_TOKEN} when \
             the task is complete."
        ));
        if let Some(extra) = &self.instructions {
            prompt.push_str("\n\n");
            prompt.push_str(extra);
        }
        prompt
    }

    /// Ask for the next move. Returns the raw supervisor text.
    pub async fn decide(
        &self,
        role: &str,
        operation: &'static str,
        candidates: &[Candidate],
        messages: Vec<Message>,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            system: Some(self.routing_prompt(role, candidates)),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: self.temperature,
            stop_sequences: None,
            tools: vec![],
        };

        let span = info_span!(
            "gen_ai.route",
            gen_ai.system = self.provider.name(),
            gen_ai.operation.name = operation,
            gen_ai.agent.name = %role,
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
        );

        let response = self.provider.complete(&request).instrument(span).await?;
        debug!(role, decision = %response.content, "Supervisor replied");
        Ok(response.content)
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}
