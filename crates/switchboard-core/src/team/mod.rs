//! Supervisor-directed teams of workers.

pub mod coordinator;
pub mod decision;
pub mod supervisor;

pub use coordinator::{TeamCoordinator, TeamError, TeamPhase};
pub use decision::{RoutingDecision, TERMINAL_TOKEN};
pub use supervisor::{Candidate, Supervisor};
