//! Routing engine and event pipeline for Switchboard.
//!
//! This crate holds the business logic: the event bus and logger, the agent
//! and worker abstractions, team coordination, and the flow router. It also
//! defines the ports (`LlmProvider`, `EventStore`, `Subscriber`, `Tool`) that
//! `switchboard-infra` and callers implement. It never touches a database or
//! the network directly.

pub mod agent;
pub mod event;
pub mod flow;
pub mod llm;
pub mod team;

#[cfg(test)]
mod test_support;
