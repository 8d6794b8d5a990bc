//! Concrete event sinks.

pub mod console;
pub mod jsonl;

pub use console::ConsoleSubscriber;
pub use jsonl::JsonLinesSubscriber;
