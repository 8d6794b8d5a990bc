//! Supervisor output parsing.
//!
//! Raw supervisor text becomes a [`RoutingDecision`] in this order:
//! 1. a JSON object `{"action": ..., "worker": ..., "message": ...}`
//! 2. the terminal token `FINISH` anywhere in the text, any casing
//! 3. the first candidate (registration order) whose name is a
//!    case-insensitive substring of the text
//! 4. otherwise `Converse` with the raw text

use serde::Deserialize;

/// Token a supervisor uses to end coordination.
pub const TERMINAL_TOKEN: &str = "FINISH";

/// Validated supervisor decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Stop and summarize.
    Finish,
    /// Hand the turn to `target`.
    RouteTo { target: String, reason: String },
    /// Answer directly without delegating.
    Converse { message: String, needs_input: bool },
}

impl RoutingDecision {
    /// Short label used in event payloads.
    pub fn label(&self) -> &'static str {
        match self {
            RoutingDecision::Finish => "finish",
            RoutingDecision::RouteTo { .. } => "route",
            RoutingDecision::Converse { .. } => "converse",
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            RoutingDecision::RouteTo { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Parse supervisor output against the registered candidate names.
    pub fn parse<S: AsRef<str>>(raw: &str, candidates: &[S]) -> Self {
        let text = raw.trim();

        if let Some(structured) = parse_structured(text, candidates) {
            return structured;
        }

        if contains_terminal_token(text) {
            return RoutingDecision::Finish;
        }

        match match_candidate(text, candidates) {
            Some(target) => RoutingDecision::RouteTo {
                target,
                reason: text.to_string(),
            },
            None => RoutingDecision::Converse {
                message: text.to_string(),
                needs_input: false,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    action: String,
    #[serde(default, alias = "target", alias = "next")]
    worker: Option<String>,
    #[serde(default, alias = "reason", alias = "response")]
    message: Option<String>,
    #[serde(default)]
    needs_input: bool,
}

fn parse_structured<S: AsRef<str>>(text: &str, candidates: &[S]) -> Option<RoutingDecision> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let raw: RawDecision = serde_json::from_str(&text[start..=end]).ok()?;
    let message = raw.message.unwrap_or_default();

    let decision = match raw.action.trim().to_lowercase().as_str() {
        "finish" | "done" | "complete" | "end" => RoutingDecision::Finish,
        "delegate" | "route" | "route_to" => {
            let exact = raw.worker.as_deref().and_then(|w| {
                candidates
                    .iter()
                    .map(AsRef::as_ref)
                    .find(|c| c.eq_ignore_ascii_case(w.trim()))
                    .map(str::to_string)
            });
            match exact.or_else(|| match_candidate(&message, candidates)) {
                Some(target) => RoutingDecision::RouteTo {
                    target,
                    reason: message,
                },
                None => RoutingDecision::Converse {
                    message: if message.is_empty() {
                        text.to_string()
                    } else {
                        message
                    },
                    needs_input: raw.needs_input,
                },
            }
        }
        "converse" | "respond" | "answer" | "ask" => RoutingDecision::Converse {
            message,
            needs_input: raw.needs_input,
        },
        _ => return None,
    };
    Some(decision)
}

/// Whether `text` contains the terminal token in any casing.
pub fn contains_terminal_token(text: &str) -> bool {
    text.to_uppercase().contains(TERMINAL_TOKEN)
}

/// First candidate, in the given order, whose name appears in `text`
/// (case-insensitive substring).
pub fn match_candidate<S: AsRef<str>>(text: &str, candidates: &[S]) -> Option<String> {
    let haystack = text.to_lowercase();
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|c| !c.is_empty() && haystack.contains(&c.to_lowercase()))
        .map(str::to_string)
}
