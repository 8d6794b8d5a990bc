//! Shared domain types for Switchboard.
//!
//! This crate contains the types used across the Switchboard workspace:
//! events and filters, LLM request/response shapes, flow and team state,
//! metrics snapshots, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod metrics;
pub mod state;
