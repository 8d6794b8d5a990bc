//! Team workers.
//!
//! A worker can come in one of three shapes: an async `run`, an `execute`
//! that may finish immediately or return a future, or a plain callable. The
//! shape is resolved once, when the `WorkerHandle` is built, so dispatch
//! never has to probe capabilities again. The team passes its per-run
//! `EventContext` on every invocation; only [`Worker`] implementations see it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use switchboard_types::error::WorkerError;

use crate::event::EventContext;

use super::node::AgentNode;

pub type WorkerFuture = Pin<Box<dyn Future<Output = Result<String, WorkerError>> + Send + 'static>>;

/// Worker with a uniformly async `run`.
pub trait Worker: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Routing hints shown to the supervisor.
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    fn run(&self, task: &str) -> impl Future<Output = Result<String, WorkerError>> + Send;

    /// Run inside a team whose events go through `ctx`.
    fn run_in(
        &self,
        task: &str,
        ctx: &EventContext,
    ) -> impl Future<Output = Result<String, WorkerError>> + Send {
        let _ = ctx;
        self.run(task)
    }
}

/// Object-safe version of [`Worker`] with a boxed future.
pub trait WorkerDyn: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> Vec<String>;
    fn run_boxed<'a>(
        &'a self,
        task: &'a str,
        ctx: Option<&'a EventContext>,
    ) -> Pin<Box<dyn Future<Output = Result<String, WorkerError>> + Send + 'a>>;
}

impl<T: Worker> WorkerDyn for T {
    fn name(&self) -> &str {
        Worker::name(self)
    }

    fn capabilities(&self) -> Vec<String> {
        Worker::capabilities(self)
    }

    fn run_boxed<'a>(
        &'a self,
        task: &'a str,
        ctx: Option<&'a EventContext>,
    ) -> Pin<Box<dyn Future<Output = Result<String, WorkerError>> + Send + 'a>> {
        match ctx {
            Some(ctx) => Box::pin(self.run_in(task, ctx)),
            None => Box::pin(self.run(task)),
        }
    }
}

/// Result of an [`ExecuteWorker`] call.
pub enum Execution {
    /// The work finished synchronously.
    Ready(Result<String, WorkerError>),
    /// The work continues asynchronously.
    Pending(WorkerFuture),
}

impl Execution {
    pub fn ready(result: impl Into<String>) -> Self {
        Execution::Ready(Ok(result.into()))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<String, WorkerError>> + Send + 'static,
    {
        Execution::Pending(Box::pin(future))
    }
}

/// Worker whose `execute` may complete synchronously or asynchronously.
pub trait ExecuteWorker: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    fn execute(&self, task: &str) -> Execution;
}

type WorkerFn = dyn Fn(&str) -> Result<String, WorkerError> + Send + Sync;

enum Dispatch {
    Run(Arc<dyn WorkerDyn>),
    Execute(Arc<dyn ExecuteWorker>),
    Call(Arc<WorkerFn>),
}

/// A registered worker with its dispatch shape resolved.
#[derive(Clone)]
pub struct WorkerHandle {
    name: String,
    capabilities: Vec<String>,
    dispatch: Dispatch,
}

impl Clone for Dispatch {
    fn clone(&self) -> Self {
        match self {
            Dispatch::Run(w) => Dispatch::Run(Arc::clone(w)),
            Dispatch::Execute(w) => Dispatch::Execute(Arc::clone(w)),
            Dispatch::Call(f) => Dispatch::Call(Arc::clone(f)),
        }
    }
}

impl WorkerHandle {
    pub fn from_worker<W: Worker>(worker: W) -> Self {
        Self {
            name: Worker::name(&worker).to_string(),
            capabilities: Worker::capabilities(&worker),
            dispatch: Dispatch::Run(Arc::new(worker)),
        }
    }

    pub fn from_execute<E: ExecuteWorker>(worker: E) -> Self {
        Self {
            name: worker.name().to_string(),
            capabilities: worker.capabilities(),
            dispatch: Dispatch::Execute(Arc::new(worker)),
        }
    }

    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<String, WorkerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
            dispatch: Dispatch::Call(Arc::new(f)),
        }
    }

    /// Use an agent as a worker. Its events carry the team's flow and name.
    pub fn from_agent(agent: AgentNode) -> Self {
        Self::from_worker(agent)
    }

    /// Replace the routing hints.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Run the worker on `task`, emitting through `ctx` when given.
    pub async fn invoke(
        &self,
        task: &str,
        ctx: Option<&EventContext>,
    ) -> Result<String, WorkerError> {
        match &self.dispatch {
            Dispatch::Run(worker) => worker.run_boxed(task, ctx).await,
            Dispatch::Execute(worker) => match worker.execute(task) {
                Execution::Ready(result) => result,
                Execution::Pending(future) => future.await,
            },
            Dispatch::Call(f) => (**f)(task),
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self.dispatch {
            Dispatch::Run(_) => "run",
            Dispatch::Execute(_) => "execute",
            Dispatch::Call(_) => "callable",
        };
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("shape", &shape)
            .finish()
    }
}
