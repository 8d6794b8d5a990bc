//! Subscriber capability for the event bus.
//!
//! Follows the same blanket-impl pattern as `BoxLlmProvider`:
//! 1. `Subscriber` is the RPITIT trait sinks implement
//! 2. `SubscriberDyn` is its object-safe twin with boxed futures
//! 3. a blanket impl bridges every `Subscriber` to `SubscriberDyn`
//!
//! Delivery helpers in this module isolate each subscriber: an `Err` or a
//! panic is logged and swallowed so the next subscriber still runs.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::warn;
use uuid::Uuid;

use switchboard_types::error::SubscriberError;
use switchboard_types::event::Event;

/// A pluggable event sink.
///
/// Every subscriber handles events asynchronously. Sinks that can also handle
/// an event without awaiting (console printers, in-memory counters) return
/// `true` from `supports_sync` and implement `handle_event_sync`; the bus then
/// uses that handler on its immediate path.
pub trait Subscriber: Send + Sync + 'static {
    /// Name used in logs when the subscriber fails.
    fn name(&self) -> &str;

    /// Handle an event delivered through the queued path.
    fn handle_event(
        &self,
        event: &Event,
    ) -> impl Future<Output = Result<(), SubscriberError>> + Send;

    /// Whether `handle_event_sync` is implemented.
    fn supports_sync(&self) -> bool {
        false
    }

    /// Handle an event on the immediate path.
    fn handle_event_sync(&self, event: &Event) -> Result<(), SubscriberError> {
        let _ = event;
        Ok(())
    }
}

/// Object-safe version of [`Subscriber`] with a boxed future.
pub trait SubscriberDyn: Send + Sync {
    fn name(&self) -> &str;

    fn handle_event_boxed<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), SubscriberError>> + Send + 'a>>;

    fn supports_sync(&self) -> bool;

    fn handle_event_sync(&self, event: &Event) -> Result<(), SubscriberError>;
}

impl<T: Subscriber> SubscriberDyn for T {
    fn name(&self) -> &str {
        Subscriber::name(self)
    }

    fn handle_event_boxed<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), SubscriberError>> + Send + 'a>> {
        Box::pin(self.handle_event(event))
    }

    fn supports_sync(&self) -> bool {
        Subscriber::supports_sync(self)
    }

    fn handle_event_sync(&self, event: &Event) -> Result<(), SubscriberError> {
        Subscriber::handle_event_sync(self, event)
    }
}

/// Shared, type-erased subscriber as stored by the bus.
pub type SharedSubscriber = Arc<dyn SubscriberDyn>;

/// Handle returned by `EventBus::add_subscriber`, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub(crate) fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

/// Deliver one event through the asynchronous handler, containing failures.
pub(crate) async fn deliver(subscriber: &dyn SubscriberDyn, event: &Event) {
    let outcome = AssertUnwindSafe(subscriber.handle_event_boxed(event))
        .catch_unwind()
        .await;
    report(subscriber.name(), event, outcome);
}

/// Deliver one event through the synchronous handler, containing failures.
pub(crate) fn deliver_sync(subscriber: &dyn SubscriberDyn, event: &Event) {
    let outcome =
        std::panic::catch_unwind(AssertUnwindSafe(|| subscriber.handle_event_sync(event)));
    report(subscriber.name(), event, outcome);
}

fn report(
    name: &str,
    event: &Event,
    outcome: Result<Result<(), SubscriberError>, Box<dyn std::any::Any + Send>>,
) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            warn!(
                subscriber = name,
                event_id = %event.event_id(),
                kind = %event.kind(),
                error = %error,
                "Subscriber failed to handle event"
            );
        }
        Err(_) => {
            warn!(
                subscriber = name,
                event_id = %event.event_id(),
                kind = %event.kind(),
                "Subscriber panicked while handling event"
            );
        }
    }
}
