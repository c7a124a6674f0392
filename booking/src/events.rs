//! Events published on the booking event bus.

use crate::types::{BookingId, EventId};
use seatflow_core::event_bus::{BroadcastEventBus, EventBus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Something other parts of the application may want to react to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BookingEvent {
    /// Units left for an event changed
    #[serde(rename_all = "camelCase")]
    CapacityChanged {
        /// Event
        event_id: EventId,
        /// Units still for sale
        remaining: u32,
    },
    /// A session booked tickets
    #[serde(rename_all = "camelCase")]
    BookingConfirmed {
        /// Event
        event_id: EventId,
        /// Booking id from the service
        booking_id: BookingId,
        /// Tickets booked
        tickets: u32,
    },
}

impl BookingEvent {
    /// Event the notification is about
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::CapacityChanged { event_id, .. } | Self::BookingConfirmed { event_id, .. } => {
                *event_id
            },
        }
    }
}

/// Shared handle to a booking event bus
pub type SharedEventBus = Arc<dyn EventBus<BookingEvent>>;

/// An in-process bus retaining `capacity` events per lagging subscriber
#[must_use]
pub fn in_process_bus(capacity: usize) -> SharedEventBus {
    Arc::new(BroadcastEventBus::new(capacity))
}
