//! Test doubles shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Notify, watch};

use switchboard_types::error::{RepositoryError, SubscriberError};
use switchboard_types::event::{Event, EventFilter};
use switchboard_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, ToolCall, Usage,
};

use crate::event::{EventStore, Subscriber};
use crate::llm::LlmProvider;

// ---------------------------------------------------------------------------
// Scripted LLM provider
// ---------------------------------------------------------------------------

/// One scripted LLM turn.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Tools(Vec<ToolCall>),
    Fail(String),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    repeat: Option<Step>,
    requests: Vec<CompletionRequest>,
}

/// `LlmProvider` that replays scripted turns and records every request.
///
/// Once the script runs out it repeats the `repeating` step, or fails.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_steps(texts.into_iter().map(|t| Step::Text(t.into())).collect())
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                steps: steps.into(),
                ..Default::default()
            })),
        }
    }

    /// Provider that answers every request with `text`.
    pub fn repeating(text: impl Into<String>) -> Self {
        let provider = Self::from_steps(vec![]);
        provider.script.lock().unwrap().repeat = Some(Step::Text(text.into()));
        provider
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }

    fn next_step(&self, request: &CompletionRequest) -> Step {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());
        script
            .steps
            .pop_front()
            .or_else(|| script.repeat.clone())
            .unwrap_or_else(|| Step::Fail("script exhausted".to_string()))
    }

    fn respond(step: Step, model: &str) -> Result<CompletionResponse, LlmError> {
        let (content, tool_calls, stop_reason) = match step {
            Step::Text(text) => (text, vec![], StopReason::EndTurn),
            Step::Tools(calls) => (String::new(), calls, StopReason::ToolUse),
            Step::Fail(message) => return Err(LlmError::Provider { message }),
        };
        let output_tokens = content.split_whitespace().count() as u32;
        Ok(CompletionResponse {
            id: "resp-scripted".to_string(),
            content,
            model: model.to_string(),
            stop_reason,
            usage: Usage {
                input_tokens: 1,
                output_tokens,
            },
            tool_calls,
        })
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        let step = self.next_step(request);
        let model = request.model.clone();
        async move { Self::respond(step, &model) }
    }
}

pub fn tool_call(id: &str, name: &str, input: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// Records every event it receives.
#[derive(Clone)]
pub struct RecordingSubscriber {
    name: String,
    sync: bool,
    events: Arc<Mutex<Vec<Event>>>,
    notify: Arc<Notify>,
}

impl RecordingSubscriber {
    pub fn async_only(name: &str) -> Self {
        Self::build(name, false)
    }

    pub fn sync_capable(name: &str) -> Self {
        Self::build(name, true)
    }

    fn build(name: &str, sync: bool) -> Self {
        Self {
            name: name.to_string(),
            sync,
            events: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    fn push(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
        self.notify.notify_waiters();
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.kind().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Wait until at least `count` events arrived. Returns `false` on timeout.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

impl Subscriber for RecordingSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_event(&self, event: &Event) -> Result<(), SubscriberError> {
        self.push(event);
        Ok(())
    }

    fn supports_sync(&self) -> bool {
        self.sync
    }

    fn handle_event_sync(&self, event: &Event) -> Result<(), SubscriberError> {
        self.push(event);
        Ok(())
    }
}

/// Subscriber that always errors or always panics, on both paths.
pub struct FailingSubscriber {
    panic: bool,
}

impl FailingSubscriber {
    pub fn erroring() -> Self {
        Self { panic: false }
    }

    pub fn panicking() -> Self {
        Self { panic: true }
    }

    fn fail(&self) -> Result<(), SubscriberError> {
        if self.panic {
            panic!("subscriber exploded");
        }
        Err(SubscriberError::Failed {
            subscriber: "failing".to_string(),
            message: "always fails".to_string(),
        })
    }
}

impl Subscriber for FailingSubscriber {
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle_event(&self, _event: &Event) -> Result<(), SubscriberError> {
        self.fail()
    }

    fn supports_sync(&self) -> bool {
        true
    }

    fn handle_event_sync(&self, _event: &Event) -> Result<(), SubscriberError> {
        self.fail()
    }
}

/// Async-only subscriber that holds every delivery until released.
#[derive(Clone)]
pub struct GateSubscriber {
    entered: Arc<Notify>,
    open_tx: Arc<watch::Sender<bool>>,
    open_rx: watch::Receiver<bool>,
}

impl GateSubscriber {
    pub fn new() -> Self {
        let (open_tx, open_rx) = watch::channel(false);
        Self {
            entered: Arc::new(Notify::new()),
            open_tx: Arc::new(open_tx),
            open_rx,
        }
    }

    /// Resolves once a delivery is parked on the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        let _ = self.open_tx.send(true);
    }
}

impl Subscriber for GateSubscriber {
    fn name(&self) -> &str {
        "gate"
    }

    async fn handle_event(&self, _event: &Event) -> Result<(), SubscriberError> {
        self.entered.notify_one();
        let mut open = self.open_rx.clone();
        let _ = open.wait_for(|open| *open).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event store
// ---------------------------------------------------------------------------

/// In-memory `EventStore` with switchable write failures.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<Mutex<Vec<Event>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl EventStore for InMemoryEventStore {
    async fn save(&self, event: &Event) -> Result<(), RepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("write rejected".to_string()));
        }
        let mut events = self.events.lock().unwrap();
        match events.iter_mut().find(|e| e.event_id() == event.event_id()) {
            Some(existing) => *existing = event.clone(),
            None => events.push(event.clone()),
        }
        Ok(())
    }

    async fn load(&self, filter: &EventFilter) -> Result<Vec<Event>, RepositoryError> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.len() as u64)
    }
}
