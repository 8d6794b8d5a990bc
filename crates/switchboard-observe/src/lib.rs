//! Observability plumbing for Switchboard.
//!
//! - [`tracing_setup`]: global `tracing` subscriber with optional
//!   OpenTelemetry export
//! - [`genai_attrs`]: GenAI semantic-convention attribute names and the
//!   operation values recorded on LLM spans

pub mod genai_attrs;
pub mod tracing_setup;
