//! Execution state threaded through flows and team coordination loops.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::llm::{Message, MessageRole};

/// State of one end-to-end flow run.
///
/// The message log is append-only; the only other mutation is flipping the
/// completion flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowExecutionState {
    flow_id: Uuid,
    messages: Vec<Message>,
    completed: bool,
}

impl FlowExecutionState {
    pub fn new(flow_id: Uuid) -> Self {
        Self {
            flow_id,
            messages: Vec::new(),
            completed: false,
        }
    }

    /// Start a state seeded with a single user message.
    pub fn with_user_message(flow_id: Uuid, content: impl Into<String>) -> Self {
        let mut state = Self::new(flow_id);
        state.push(Message::user(content));
        state
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn mark_complete(&mut self) {
        self.completed = true;
    }

    /// Content of the most recent assistant message, if any.
    pub fn last_assistant_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// State of a team coordination loop.
///
/// `execution_count` only ever increases; the coordinator stops once it
/// reaches its configured ceiling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamState {
    pub current_task: String,
    pub messages: Vec<Message>,
    pub next_worker: Option<String>,
    pub completed_workers: Vec<String>,
    pub worker_results: BTreeMap<String, String>,
    pub global_context: BTreeMap<String, Value>,
    pub is_complete: bool,
    pub requires_human_input: bool,
    pub error_message: Option<String>,
    pub execution_count: u32,
}

impl TeamState {
    pub fn new(task: impl Into<String>) -> Self {
        let task = task.into();
        Self {
            messages: vec![Message::user(task.clone())],
            current_task: task,
            ..Default::default()
        }
    }

    /// Terminal once complete or failed.
    pub fn is_terminal(&self) -> bool {
        self.is_complete || self.error_message.is_some()
    }

    /// Record a worker's result; the completed list keeps first-completion
    /// order without duplicates.
    pub fn record_result(&mut self, worker: &str, result: impl Into<String>) {
        self.worker_results.insert(worker.to_string(), result.into());
        if !self.completed_workers.iter().any(|w| w == worker) {
            self.completed_workers.push(worker.to_string());
        }
    }

    /// Build the summary handed back to the caller.
    pub fn summary(&self, team_name: &str) -> TeamSummary {
        let results = self
            .completed_workers
            .iter()
            .filter_map(|w| self.worker_results.get(w).map(|r| (w.clone(), r.clone())))
            .collect();

        TeamSummary {
            team_name: team_name.to_string(),
            task: self.current_task.clone(),
            completed: self.is_complete,
            error: self.error_message.clone(),
            iterations: self.execution_count,
            results,
            final_message: self
                .messages
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::Assistant)
                .map(|m| m.content.clone()),
        }
    }
}

/// Summary of a terminal team run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub team_name: String,
    pub task: String,
    pub completed: bool,
    pub error: Option<String>,
    pub iterations: u32,
    /// Worker results in completion order.
    pub results: Vec<(String, String)>,
    pub final_message: Option<String>,
}

impl TeamSummary {
    /// Render the summary as plain text for the parent conversation.
    pub fn render(&self) -> String {
        let mut out = format!("Team {} ", self.team_name);
        match (&self.error, self.completed) {
            (Some(error), _) => out.push_str(&format!("stopped with an error: {error}")),
            (None, true) => out.push_str(&format!(
                "completed the task in {} iteration(s).",
                self.iterations
            )),
            (None, false) => out.push_str(&format!(
                "stopped after {} iteration(s) without completing.",
                self.iterations
            )),
        }
        for (worker, result) in &self.results {
            out.push_str(&format!("\n- {worker}: {result}"));
        }
        if self.results.is_empty() {
            if let Some(message) = &self.final_message {
                out.push_str(&format!("\n{message}"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_state_appends_in_order() {
        let mut state = FlowExecutionState::with_user_message(Uuid::now_v7(), "task");
        state.push(Message::assistant("first"));
        state.push(Message::assistant("second"));

        assert_eq!(state.messages().len(), 3);
        assert_eq!(state.last_assistant_content(), Some("second"));
        assert!(!state.is_complete());
        state.mark_complete();
        assert!(state.is_complete());
    }

    #[test]
    fn team_state_starts_with_task_message() {
        let state = TeamState::new("write a report");
        assert_eq!(state.current_task, "write a report");
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, MessageRole::User);
        assert!(!state.is_terminal());
    }

    #[test]
    fn record_result_keeps_order_without_duplicates() {
        let mut state = TeamState::new("t");
        state.record_result("beta", "one");
        state.record_result("alpha", "two");
        state.record_result("beta", "three");

        assert_eq!(state.completed_workers, vec!["beta", "alpha"]);
        assert_eq!(state.worker_results["beta"], "three");
    }

    #[test]
    fn summary_reports_error() {
        let mut state = TeamState::new("t");
        state.execution_count = 2;
        state.error_message = Some("Worker beta failed: boom".to_string());

        let summary = state.summary("ops");
        assert!(!summary.completed);
        assert_eq!(summary.iterations, 2);
        assert!(summary.render().contains("Worker beta failed: boom"));
    }

    #[test]
    fn summary_lists_results_in_completion_order() {
        let mut state = TeamState::new("t");
        state.record_result("gamma", "g");
        state.record_result("alpha", "a");
        state.is_complete = true;

        let rendered = state.summary("ops").render();
        let g = rendered.find("gamma").unwrap();
        let a = rendered.find("alpha").unwrap();
        assert!(g < a);
        assert!(rendered.contains("completed the task"));
    }
}
