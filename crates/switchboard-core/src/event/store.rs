//! Event persistence port.
//!
//! `EventStore` is implemented in switchboard-infra (SQLite). Core code only
//! sees the trait and the boxed wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use switchboard_types::error::{RepositoryError, SubscriberError};
use switchboard_types::event::{Event, EventFilter};

use super::subscriber::Subscriber;

/// Persistent event storage.
///
/// Each write is self-contained: a failed `save` never affects other events.
pub trait EventStore: Send + Sync {
    /// Insert the event, replacing any stored row with the same id.
    fn save(&self, event: &Event) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Load events matching the filter, oldest first.
    fn load(
        &self,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<Vec<Event>, RepositoryError>> + Send;

    /// Total number of stored events.
    fn count(&self) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Object-safe version of [`EventStore`] with boxed futures.
pub trait EventStoreDyn: Send + Sync {
    fn save_boxed<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>>;

    fn load_boxed<'a>(
        &'a self,
        filter: &'a EventFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Event>, RepositoryError>> + Send + 'a>>;

    fn count_boxed(&self) -> Pin<Box<dyn Future<Output = Result<u64, RepositoryError>> + Send + '_>>;
}

impl<T: EventStore> EventStoreDyn for T {
    fn save_boxed<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(self.save(event))
    }

    fn load_boxed<'a>(
        &'a self,
        filter: &'a EventFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Event>, RepositoryError>> + Send + 'a>> {
        Box::pin(self.load(filter))
    }

    fn count_boxed(&self) -> Pin<Box<dyn Future<Output = Result<u64, RepositoryError>> + Send + '_>> {
        Box::pin(self.count())
    }
}

/// Type-erased event store.
pub struct BoxEventStore {
    inner: Box<dyn EventStoreDyn>,
}

impl BoxEventStore {
    pub fn new<T: EventStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn save(&self, event: &Event) -> Result<(), RepositoryError> {
        self.inner.save_boxed(event).await
    }

    pub async fn load(&self, filter: &EventFilter) -> Result<Vec<Event>, RepositoryError> {
        self.inner.load_boxed(filter).await
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        self.inner.count_boxed().await
    }
}

/// Database writer subscriber: persists every event it receives.
///
/// For attaching a store to a bus that is not owned by an `EventLogger`.
/// A logger built with a store already writes through it directly.
#[derive(Clone)]
pub struct StoreSubscriber {
    store: Arc<BoxEventStore>,
}

impl StoreSubscriber {
    pub fn new(store: Arc<BoxEventStore>) -> Self {
        Self { store }
    }
}

impl Subscriber for StoreSubscriber {
    fn name(&self) -> &str {
        "store"
    }

    async fn handle_event(&self, event: &Event) -> Result<(), SubscriberError> {
        self.store
            .save(event)
            .await
            .map_err(|e| SubscriberError::Failed {
                subscriber: "store".to_string(),
                message: e.to_string(),
            })
    }
}
