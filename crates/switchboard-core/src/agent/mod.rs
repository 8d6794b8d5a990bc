//! Leaf executors: agents, their tools, and the team worker shapes.

pub mod node;
pub mod tool;
pub mod worker;

pub use node::{AgentError, AgentNode};
pub use tool::{InstrumentedTool, Tool};
pub use worker::{Execution, ExecuteWorker, Worker, WorkerHandle};
