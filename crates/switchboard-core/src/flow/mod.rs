//! Top-level routing across teams and standalone agents.

pub mod graph;
pub mod router;

pub use graph::{DispatchGraph, EntityKind, GraphError, GraphNode};
pub use router::{FlowError, FlowResult, FlowRouter, StopReason};
