//! Typed in-process event bus.
//!
//! Reducers describe publications as effects; the effect closes over an
//! `Arc<dyn EventBus<E>>` taken from the environment and calls
//! [`EventBus::publish`] when it runs. Observers (catalog listings, capacity
//! badges, other sessions for the same event) hold an [`EventStream`].
//!
//! ```text
//!  Reducer ──effect──▶ EventBus<E> ──▶ subscriber A
//!                                  └─▶ subscriber B
//! ```
//!
//! # Delivery
//!
//! - Every subscriber sees every event published after it subscribed, in order.
//! - A subscriber that falls more than `capacity` events behind receives a single
//!   [`EventBusError::Lagged`] item and then resumes with the oldest retained event.
//! - Publishing with no subscribers is not an error; the event is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use seatflow_core::event_bus::{BroadcastEventBus, EventBus};
//!
//! let bus = BroadcastEventBus::<u32>::new(16);
//! let mut stream = bus.subscribe();
//! bus.publish(7)?;
//! assert_eq!(stream.next().await, Some(Ok(7)));
//! ```

use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// The subscriber fell behind and missed events
    #[error("Subscriber lagged, {skipped} events skipped")]
    Lagged {
        /// Number of events that were overwritten before being received
        skipped: u64,
    },

    /// The bus was dropped
    #[error("Event bus closed")]
    Closed,
}

/// Stream of events from a subscription.
pub type EventStream<E> = Pin<Box<dyn Stream<Item = Result<E, EventBusError>> + Send>>;

/// Trait for typed event bus implementations.
///
/// # Dyn Compatibility
///
/// The trait is object-safe so environments can hold `Arc<dyn EventBus<E>>`
/// and effect futures can capture a clone of it.
pub trait EventBus<E>: Send + Sync {
    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers the event was delivered to.
    ///
    /// # Errors
    ///
    /// Implementations backed by a transport may fail; the in-process
    /// [`BroadcastEventBus`] never does.
    fn publish(&self, event: E) -> Result<usize, EventBusError>;

    /// Subscribe to every event published from now on.
    fn subscribe(&self) -> EventStream<E>;
}

/// [`EventBus`] backed by a `tokio::sync::broadcast` channel.
#[derive(Debug)]
pub struct BroadcastEventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E> BroadcastEventBus<E>
where
    E: Clone + Send + 'static,
{
    /// Creates a bus that retains up to `capacity` events per lagging subscriber.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E> Clone for BroadcastEventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E> EventBus<E> for BroadcastEventBus<E>
where
    E: Clone + Send + 'static,
{
    fn publish(&self, event: E) -> Result<usize, EventBusError> {
        match self.sender.send(event) {
            Ok(delivered) => Ok(delivered),
            Err(_) => {
                tracing::trace!("Event published with no subscribers");
                Ok(0)
            },
        }
    }

    fn subscribe(&self) -> EventStream<E> {
        let receiver = self.sender.subscribe();
        Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
            match receiver.recv().await {
                Ok(event) => Some((Ok(event), receiver)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged");
                    Some((Err(EventBusError::Lagged { skipped }), receiver))
                },
                Err(broadcast::error::RecvError::Closed) => None,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Arc;

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let bus = BroadcastEventBus::<u32>::new(4);
        assert_eq!(bus.publish(1), Ok(0));
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_events_in_order() {
        let bus: Arc<dyn EventBus<u32>> = Arc::new(BroadcastEventBus::new(8));
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish(1), Ok(2));
        assert_eq!(bus.publish(2), Ok(2));

        assert_eq!(first.next().await, Some(Ok(1)));
        assert_eq!(first.next().await, Some(Ok(2)));
        assert_eq!(second.next().await, Some(Ok(1)));
        assert_eq!(second.next().await, Some(Ok(2)));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_told_how_many_it_missed() {
        let bus = BroadcastEventBus::<u32>::new(2);
        let mut stream = bus.subscribe();

        for n in 0..5 {
            let _ = bus.publish(n);
        }

        assert_eq!(
            stream.next().await,
            Some(Err(EventBusError::Lagged { skipped: 3 }))
        );
        assert_eq!(stream.next().await, Some(Ok(3)));
        assert_eq!(stream.next().await, Some(Ok(4)));
    }

    #[tokio::test]
    async fn test_stream_ends_when_bus_dropped() {
        let bus = BroadcastEventBus::<u32>::new(2);
        let mut stream = bus.subscribe();
        drop(bus);
        assert_eq!(stream.next().await, None);
    }
}
