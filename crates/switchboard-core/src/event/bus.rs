//! Event bus delivering `Event`s to registered subscribers.
//!
//! Two delivery paths exist:
//!
//! - **Queued** (`emit_event`): events go onto a bounded `mpsc` queue drained
//!   by a single consumer task that awaits each subscriber in turn. Events on
//!   this path are delivered in strict enqueue order.
//! - **Immediate** (`emit_event_sync`): sync-capable subscribers are called
//!   before the method returns; async-only subscribers get the event from a
//!   spawned task.
//!
//! The two paths do not share an ordering domain. An async-only subscriber may
//! see an immediate-path event before or after queued events that were emitted
//! earlier. Callers that need a single order should only use `emit_event`.
//! Persistence behind `EventLogger::log_event_sync` has the same caveat: each
//! event gets its own detached save, so rows may be written out of order and
//! are lost if the runtime stops first.
//!
//! When the queue is full, [`OverflowPolicy::Block`] makes `emit_event` wait
//! and [`OverflowPolicy::DropNewest`] drops the incoming event and counts it.
//! `shutdown` stops the consumer; anything still queued is never delivered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use switchboard_types::config::{BusConfig, OverflowPolicy};
use switchboard_types::event::Event;

use super::subscriber::{SharedSubscriber, Subscriber, SubscriberId, deliver, deliver_sync};

type Registry = Arc<RwLock<Vec<(SubscriberId, SharedSubscriber)>>>;

enum Envelope {
    Event(Event),
    Flush(oneshot::Sender<()>),
}

/// In-process pub/sub dispatcher.
///
/// Cloning the bus shares the queue, the subscriber list, and the consumer.
/// The consumer task exits when the bus is shut down or every clone is dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::Sender<Envelope>,
    subscribers: Registry,
    overflow: OverflowPolicy,
    dropped: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl EventBus {
    /// Create a bus and spawn its consumer task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &BusConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let subscribers: Registry = Arc::new(RwLock::new(Vec::new()));
        let shutdown = CancellationToken::new();

        tokio::spawn(run_consumer(
            receiver,
            Arc::clone(&subscribers),
            shutdown.clone(),
        ));

        Self {
            sender,
            subscribers,
            overflow: config.overflow,
            dropped: Arc::new(AtomicU64::new(0)),
            shutdown,
        }
    }

    /// Register a subscriber. Dispatches already in flight may not see it.
    pub fn add_subscriber<S: Subscriber>(&self, subscriber: S) -> SubscriberId {
        self.add_shared(Arc::new(subscriber))
    }

    /// Register an already shared subscriber.
    pub fn add_shared(&self, subscriber: SharedSubscriber) -> SubscriberId {
        let id = SubscriberId::new();
        debug!(subscriber = subscriber.name(), "Subscriber added to event bus");
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns `true` if it was registered.
    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Queue an event for ordered delivery by the consumer task.
    pub async fn emit_event(&self, event: Event) {
        if self.shutdown.is_cancelled() {
            debug!(event_id = %event.event_id(), "Event bus is shut down, event dropped");
            return;
        }

        match self.overflow {
            OverflowPolicy::Block => {
                if self.sender.send(Envelope::Event(event)).await.is_err() {
                    debug!("Event bus consumer stopped, event dropped");
                }
            }
            OverflowPolicy::DropNewest => match self.sender.try_send(Envelope::Event(event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(Envelope::Event(event))) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        event_id = %event.event_id(),
                        kind = %event.kind(),
                        dropped,
                        "Event queue full, event dropped"
                    );
                }
                Err(_) => {
                    debug!("Event bus consumer stopped, event dropped");
                }
            },
        }
    }

    /// Deliver an event immediately to sync-capable subscribers and schedule
    /// it for async-only subscribers.
    ///
    /// Usable from non-async call sites. Without a Tokio runtime the
    /// async-only deliveries are dropped with a warning.
    pub fn emit_event_sync(&self, event: Event) {
        if self.shutdown.is_cancelled() {
            debug!(event_id = %event.event_id(), "Event bus is shut down, event dropped");
            return;
        }

        let mut deferred = Vec::new();
        for subscriber in self.snapshot() {
            if subscriber.supports_sync() {
                deliver_sync(subscriber.as_ref(), &event);
            } else {
                deferred.push(subscriber);
            }
        }

        if deferred.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for subscriber in deferred {
                        deliver(subscriber.as_ref(), &event).await;
                    }
                });
            }
            Err(_) => {
                warn!(
                    event_id = %event.event_id(),
                    skipped = deferred.len(),
                    "No async runtime available, async-only subscribers skipped"
                );
            }
        }
    }

    /// Wait until every event queued before this call has been delivered.
    ///
    /// Returns immediately if the consumer has stopped.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(Envelope::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Stop the consumer task. Queued events are not delivered.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of events dropped under `OverflowPolicy::DropNewest`.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of envelopes currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    fn snapshot(&self) -> Vec<SharedSubscriber> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("queued", &self.queued())
            .field("overflow", &self.overflow)
            .field("dropped", &self.dropped_events())
            .finish()
    }
}

async fn run_consumer(
    mut receiver: mpsc::Receiver<Envelope>,
    subscribers: Registry,
    shutdown: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = receiver.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };

        match envelope {
            Envelope::Event(event) => {
                let targets: Vec<SharedSubscriber> = subscribers
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .map(|(_, s)| Arc::clone(s))
                    .collect();

                let delivery = async {
                    for subscriber in &targets {
                        deliver(subscriber.as_ref(), &event).await;
                    }
                };

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = delivery => {}
                }
            }
            Envelope::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!(
        undelivered = receiver.len(),
        "Event bus consumer stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingSubscriber, GateSubscriber, RecordingSubscriber};
    use std::time::Duration;
    use switchboard_types::event::EventKind;

    fn bus_with_capacity(capacity: usize, overflow: OverflowPolicy) -> EventBus {
        EventBus::new(&BusConfig {
            queue_capacity: capacity,
            overflow,
        })
    }

    fn custom(name: &str) -> Event {
        Event::new(EventKind::Custom(name.to_string()))
    }

    #[tokio::test]
    async fn queued_events_arrive_in_order() {
        let bus = EventBus::new(&BusConfig::default());
        let recorder = RecordingSubscriber::async_only("recorder");
        bus.add_subscriber(recorder.clone());

        for i in 0..20 {
            bus.emit_event(custom(&format!("e{i}"))).await;
        }
        bus.flush().await;

        let names: Vec<String> = recorder.kinds();
        let expected: Vec<String> = (0..20).map(|i| format!("custom:e{i}")).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_block_others() {
        let bus = EventBus::new(&BusConfig::default());
        bus.add_subscriber(FailingSubscriber::erroring());
        let recorder = RecordingSubscriber::async_only("recorder");
        bus.add_subscriber(recorder.clone());

        bus.emit_event(custom("one")).await;
        bus.flush().await;

        assert_eq!(recorder.len(), 1);
    }

    #[tokio::test]
    async fn panicking_subscriber_is_contained() {
        let bus = EventBus::new(&BusConfig::default());
        bus.add_subscriber(FailingSubscriber::panicking());
        let recorder = RecordingSubscriber::sync_capable("recorder");
        bus.add_subscriber(recorder.clone());

        bus.emit_event(custom("queued")).await;
        bus.emit_event_sync(custom("immediate"));
        bus.flush().await;

        assert_eq!(recorder.len(), 2);
        assert!(!bus.is_shut_down());
    }

    #[tokio::test]
    async fn sync_path_delivers_before_returning() {
        let bus = EventBus::new(&BusConfig::default());
        let recorder = RecordingSubscriber::sync_capable("sync");
        bus.add_subscriber(recorder.clone());

        bus.emit_event_sync(custom("now"));

        // No await between emit and assertion.
        assert_eq!(recorder.kinds(), vec!["custom:now".to_string()]);
    }

    #[tokio::test]
    async fn sync_path_schedules_async_only_subscribers() {
        let bus = EventBus::new(&BusConfig::default());
        let recorder = RecordingSubscriber::async_only("async");
        bus.add_subscriber(recorder.clone());

        bus.emit_event_sync(custom("later"));
        assert!(recorder.wait_for(1, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn sync_and_queued_paths_do_not_share_an_order() {
        // The queued event is held up by a gated subscriber, so the
        // immediate-path event reaches the sync-capable recorder first even
        // though it was emitted second.
        let bus = EventBus::new(&BusConfig::default());
        let gate = GateSubscriber::new();
        bus.add_subscriber(gate.clone());
        let recorder = RecordingSubscriber::sync_capable("recorder");
        bus.add_subscriber(recorder.clone());

        bus.emit_event(custom("queued")).await;
        gate.wait_entered().await;
        bus.emit_event_sync(custom("immediate"));
        gate.release();
        bus.flush().await;

        assert_eq!(
            recorder.kinds(),
            vec!["custom:immediate".to_string(), "custom:queued".to_string()]
        );
    }

    #[tokio::test]
    async fn drop_newest_counts_overflow() {
        let bus = bus_with_capacity(1, OverflowPolicy::DropNewest);
        let gate = GateSubscriber::new();
        bus.add_subscriber(gate.clone());

        bus.emit_event(custom("taken")).await;
        gate.wait_entered().await;
        bus.emit_event(custom("queued")).await;
        bus.emit_event(custom("dropped")).await;

        assert_eq!(bus.dropped_events(), 1);
        assert_eq!(bus.queued(), 1);
        gate.release();
    }

    #[tokio::test]
    async fn removed_subscriber_stops_receiving() {
        let bus = EventBus::new(&BusConfig::default());
        let recorder = RecordingSubscriber::async_only("recorder");
        let id = bus.add_subscriber(recorder.clone());

        bus.emit_event(custom("before")).await;
        bus.flush().await;
        assert!(bus.remove_subscriber(id));
        assert!(!bus.remove_subscriber(id));
        bus.emit_event(custom("after")).await;
        bus.flush().await;

        assert_eq!(recorder.len(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_delivery() {
        let bus = EventBus::new(&BusConfig::default());
        let recorder = RecordingSubscriber::sync_capable("recorder");
        bus.add_subscriber(recorder.clone());

        bus.shutdown();
        bus.emit_event(custom("queued")).await;
        bus.emit_event_sync(custom("immediate"));
        bus.flush().await;

        assert!(bus.is_shut_down());
        assert_eq!(recorder.len(), 0);
    }

    #[tokio::test]
    async fn debug_impl() {
        let bus = EventBus::new(&BusConfig::default());
        let debug = format!("{bus:?}");
        assert!(debug.contains("EventBus"));
        assert!(debug.contains("subscriber_count"));
    }
}
