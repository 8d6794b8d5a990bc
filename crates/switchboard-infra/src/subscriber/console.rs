//! Console sink: one styled line per event on stderr.

use console::{Term, style};

use switchboard_core::event::Subscriber;
use switchboard_types::error::SubscriberError;
use switchboard_types::event::Event;

/// Prints events as they happen. Usable on both bus paths.
pub struct ConsoleSubscriber {
    term: Term,
    show_payload: bool,
}

impl ConsoleSubscriber {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            show_payload: false,
        }
    }

    /// Append the JSON payload to every line.
    pub fn with_payload(mut self) -> Self {
        self.show_payload = true;
        self
    }

    /// Render one event as a single line.
    pub fn format_line(&self, event: &Event) -> String {
        let kind = event.kind().to_string();
        let kind = if event.kind().is_error() {
            style(kind).red().bold()
        } else {
            style(kind).cyan()
        };

        let mut line = format!(
            "{} {}",
            style(event.timestamp().format("%H:%M:%S%.3f")).dim(),
            kind
        );
        if let Some(flow_id) = event.flow_id() {
            let short = flow_id.simple().to_string();
            line.push_str(&format!(" flow={}", style(&short[short.len() - 8..]).dim()));
        }
        if let Some(team) = event.team_name() {
            line.push_str(&format!(" team={}", style(team).magenta()));
        }
        if let Some(agent) = event.agent_name() {
            line.push_str(&format!(" agent={}", style(agent).green()));
        }
        if let Some(message) = event.payload_str("message") {
            line.push_str(&format!(" {}", style(message).yellow()));
        }
        if self.show_payload && !event.payload().is_empty() {
            let payload = serde_json::Value::Object(event.payload().clone()).to_string();
            line.push_str(&format!(" {}", style(payload).dim()));
        }
        line
    }

    fn print(&self, event: &Event) -> Result<(), SubscriberError> {
        self.term.write_line(&self.format_line(event))?;
        Ok(())
    }
}

impl Default for ConsoleSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for ConsoleSubscriber {
    fn name(&self) -> &str {
        "console"
    }

    async fn handle_event(&self, event: &Event) -> Result<(), SubscriberError> {
        self.print(event)
    }

    fn supports_sync(&self) -> bool {
        true
    }

    fn handle_event_sync(&self, event: &Event) -> Result<(), SubscriberError> {
        self.print(event)
    }
}
