//! LLM provider abstractions.
//!
//! - `LlmProvider`: RPITIT trait implemented by concrete backends
//! - `BoxLlmProvider`: object-safe wrapper used by agents and supervisors

pub mod box_provider;
pub mod provider;

pub use box_provider::BoxLlmProvider;
pub use provider::LlmProvider;
