//! Event observability pipeline.
//!
//! `EventBus` dispatches `Event`s to `Subscriber`s; `EventLogger` wraps a bus
//! with an in-memory log, optional persistence, and query APIs;
//! `EventContext` is what agents, teams, and routers hold to emit.

pub mod bus;
pub mod context;
pub mod logger;
pub mod metrics;
pub mod store;
pub mod subscriber;

pub use bus::EventBus;
pub use context::EventContext;
pub use logger::{EventLogger, LoggerError};
pub use metrics::MetricsSubscriber;
pub use store::{BoxEventStore, EventStore, StoreSubscriber};
pub use subscriber::{SharedSubscriber, Subscriber, SubscriberId};
