//! Booking service contract and an in-process implementation.
//!
//! The service is the authority on what is sold. Sessions read an advisory
//! snapshot from it and submit requests to it; it arbitrates concurrent
//! requests for the same seats and answers with a typed outcome.

use crate::availability::{BookedSnapshot, CapacityMode};
use crate::descriptor::EventDescriptor;
use crate::error::ServiceError;
use crate::pricing::{price_of, total_for_quantity};
use crate::types::{BookingId, CustomerId, EventId, Money, SeatCode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

// ============================================================================
// Request / Outcome
// ============================================================================

/// What a booking asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Allocation {
    /// Specific seats, in code order
    Seats(Vec<SeatCode>),
    /// A number of general-admission tickets
    Quantity(u32),
}

impl Allocation {
    /// Number of tickets
    #[must_use]
    pub fn tickets(&self) -> u32 {
        match self {
            Self::Seats(codes) => u32::try_from(codes.len()).unwrap_or(u32::MAX),
            Self::Quantity(quantity) => *quantity,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    event_id: EventId,
    customer_id: CustomerId,
    selected_seats: Option<Vec<SeatCode>>,
    tickets_quantity: Option<u32>,
}

/// A booking request
///
/// Serializes to `{eventId, customerId, selectedSeats, ticketsQuantity}` with
/// exactly one of the last two set and the other `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireRequest", try_from = "WireRequest")]
pub struct BookingRequest {
    event_id: EventId,
    customer_id: CustomerId,
    allocation: Allocation,
}

impl BookingRequest {
    /// Creates a request
    #[must_use]
    pub const fn new(event_id: EventId, customer_id: CustomerId, allocation: Allocation) -> Self {
        Self {
            event_id,
            customer_id,
            allocation,
        }
    }

    /// Event being booked
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Customer booking
    #[must_use]
    pub const fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// Seats or quantity requested
    #[must_use]
    pub const fn allocation(&self) -> &Allocation {
        &self.allocation
    }
}

impl From<BookingRequest> for WireRequest {
    fn from(request: BookingRequest) -> Self {
        let (selected_seats, tickets_quantity) = match request.allocation {
            Allocation::Seats(codes) => (Some(codes), None),
            Allocation::Quantity(quantity) => (None, Some(quantity)),
        };
        Self {
            event_id: request.event_id,
            customer_id: request.customer_id,
            selected_seats,
            tickets_quantity,
        }
    }
}

impl TryFrom<WireRequest> for BookingRequest {
    type Error = String;

    fn try_from(wire: WireRequest) -> Result<Self, Self::Error> {
        let allocation = match (wire.selected_seats, wire.tickets_quantity) {
            (Some(codes), None) => Allocation::Seats(codes),
            (None, Some(quantity)) => Allocation::Quantity(quantity),
            _ => {
                return Err(
                    "exactly one of selectedSeats and ticketsQuantity must be set".to_string(),
                );
            },
        };
        Ok(Self::new(wire.event_id, wire.customer_id, allocation))
    }
}

/// A booking the service accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    /// Assigned booking id
    pub booking_id: BookingId,
    /// Event booked
    pub event_id: EventId,
    /// What was booked
    pub allocation: Allocation,
    /// Ticket total charged
    pub total: Money,
    /// Units left after this booking, when the service reports it
    pub remaining: Option<u32>,
}

/// How a submission ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    /// Booked
    Confirmed(BookingConfirmation),
    /// Some of the requested capacity was taken by someone else
    Conflict {
        /// Message from the service
        reason: String,
    },
    /// Anything else; the same request may be retried
    Failed {
        /// What went wrong
        reason: String,
    },
}

impl From<Result<BookingConfirmation, ServiceError>> for BookingOutcome {
    fn from(result: Result<BookingConfirmation, ServiceError>) -> Self {
        match result {
            Ok(confirmation) => Self::Confirmed(confirmation),
            Err(ServiceError::Conflict(reason)) => Self::Conflict { reason },
            Err(error @ (ServiceError::Rejected(_) | ServiceError::Unavailable(_))) => {
                Self::Failed {
                    reason: error.to_string(),
                }
            },
        }
    }
}

// ============================================================================
// Service trait
// ============================================================================

/// The external booking service
#[async_trait]
pub trait BookingService: Send + Sync {
    /// What is already sold for an event; safe to retry
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unavailable`] for transient failures,
    /// [`ServiceError::Rejected`] for unknown events.
    async fn booked_snapshot(&self, event_id: EventId) -> Result<BookedSnapshot, ServiceError>;

    /// Books the request atomically or not at all; never retried by callers
    ///
    /// # Errors
    ///
    /// [`ServiceError::Conflict`] when any requested unit is already sold,
    /// otherwise [`ServiceError::Rejected`] or [`ServiceError::Unavailable`].
    async fn submit(&self, request: BookingRequest) -> Result<BookingConfirmation, ServiceError>;
}

// ============================================================================
// In-memory service
// ============================================================================

#[derive(Debug)]
enum Ledger {
    Seated {
        mode: CapacityMode,
        booked: BTreeSet<SeatCode>,
    },
    General {
        total: u32,
        booked: u32,
    },
}

#[derive(Debug)]
struct EventRecord {
    base_price: Money,
    ledger: Ledger,
}

impl EventRecord {
    fn snapshot(&self) -> BookedSnapshot {
        match &self.ledger {
            Ledger::Seated { booked, .. } => BookedSnapshot::Seats(booked.clone()),
            Ledger::General { booked, .. } => BookedSnapshot::Count(*booked),
        }
    }

    fn remaining(&self) -> u32 {
        match &self.ledger {
            Ledger::Seated { mode, booked } => {
                crate::availability::resolve_availability(
                    mode,
                    &BookedSnapshot::Seats(booked.clone()),
                )
                .remaining
            },
            Ledger::General { total, booked } => total.saturating_sub(*booked),
        }
    }
}

/// Booking service that keeps sales in memory
///
/// Every submission is arbitrated under one lock, so of two requests for the
/// same seat exactly one is confirmed. Failures can be injected for the next
/// `n` calls, and a latency can be added to submissions.
#[derive(Debug, Default)]
pub struct InMemoryBookingService {
    events: Mutex<HashMap<EventId, EventRecord>>,
    failing_snapshots: AtomicU32,
    failing_submissions: AtomicU32,
    submit_latency: Mutex<Option<Duration>>,
    submissions: AtomicU32,
}

impl InMemoryBookingService {
    /// Empty service
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrapped for sharing through an environment
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Starts selling an event; registering it again keeps its sales
    pub async fn register_event(&self, event: &EventDescriptor) {
        let mut events = self.events.lock().await;
        if events.contains_key(&event.id) {
            return;
        }
        let mode = CapacityMode::resolve(event).mode;
        let ledger = match mode {
            CapacityMode::GeneralAdmission { total } => Ledger::General { total, booked: 0 },
            seated @ CapacityMode::Seated { .. } => Ledger::Seated {
                mode: seated,
                booked: BTreeSet::new(),
            },
        };
        events.insert(
            event.id,
            EventRecord {
                base_price: event.base_price,
                ledger,
            },
        );
        tracing::debug!(event_id = %event.id, "Event registered");
    }

    /// Fails the next `count` snapshot reads with [`ServiceError::Unavailable`]
    pub fn fail_next_snapshots(&self, count: u32) {
        self.failing_snapshots.store(count, Ordering::SeqCst);
    }

    /// Fails the next `count` submissions with [`ServiceError::Unavailable`]
    pub fn fail_next_submissions(&self, count: u32) {
        self.failing_submissions.store(count, Ordering::SeqCst);
    }

    /// Delays every submission by `latency`
    pub async fn set_submit_latency(&self, latency: Option<Duration>) {
        *self.submit_latency.lock().await = latency;
    }

    /// Submissions received, including failed ones
    #[must_use]
    pub fn submission_count(&self) -> u32 {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Units still for sale
    pub async fn remaining(&self, event_id: EventId) -> Option<u32> {
        self.events
            .lock()
            .await
            .get(&event_id)
            .map(EventRecord::remaining)
    }

    fn take_injected(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BookingService for InMemoryBookingService {
    async fn booked_snapshot(&self, event_id: EventId) -> Result<BookedSnapshot, ServiceError> {
        if Self::take_injected(&self.failing_snapshots) {
            return Err(ServiceError::Unavailable("snapshot temporarily unavailable".to_string()));
        }
        self.events
            .lock()
            .await
            .get(&event_id)
            .map(EventRecord::snapshot)
            .ok_or_else(|| ServiceError::Rejected(format!("unknown event {event_id}")))
    }

    async fn submit(&self, request: BookingRequest) -> Result<BookingConfirmation, ServiceError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);

        let latency = *self.submit_latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if Self::take_injected(&self.failing_submissions) {
            return Err(ServiceError::Unavailable("booking service temporarily unavailable".to_string()));
        }

        let mut events = self.events.lock().await;
        let record = events
            .get_mut(&request.event_id)
            .ok_or_else(|| ServiceError::Rejected(format!("unknown event {}", request.event_id)))?;
        let base_price = record.base_price;

        let total = match (&mut record.ledger, &request.allocation) {
            (Ledger::Seated { mode, booked }, Allocation::Seats(codes)) => {
                let CapacityMode::Seated { layout, blocked } = &*mode else {
                    return Err(ServiceError::Rejected("event is not seated".to_string()));
                };
                if codes.is_empty() {
                    return Err(ServiceError::Rejected("no seats requested".to_string()));
                }
                let unique: BTreeSet<&SeatCode> = codes.iter().collect();
                if unique.len() != codes.len() {
                    return Err(ServiceError::Rejected("duplicate seats requested".to_string()));
                }

                let mut total = Money::ZERO;
                let mut taken = Vec::new();
                for code in codes {
                    let Some(seat) = layout.seat(code) else {
                        return Err(ServiceError::Rejected(format!("unknown seat {code}")));
                    };
                    if blocked.contains(code) || booked.contains(code) {
                        taken.push(code.as_str());
                    }
                    total = total.saturating_add(price_of(base_price, &seat));
                }
                if !taken.is_empty() {
                    tracing::info!(event_id = %request.event_id, seats = ?taken, "Seat conflict");
                    return Err(ServiceError::Conflict(format!(
                        "Seat(s) {} already booked",
                        taken.join(", ")
                    )));
                }
                booked.extend(codes.iter().cloned());
                total
            },
            (Ledger::General { total, booked }, Allocation::Quantity(quantity)) => {
                if *quantity == 0 {
                    return Err(ServiceError::Rejected("quantity must be at least 1".to_string()));
                }
                let remaining = total.saturating_sub(*booked);
                if *quantity > remaining {
                    return Err(ServiceError::Conflict(format!(
                        "Only {remaining} ticket(s) left"
                    )));
                }
                *booked = booked.saturating_add(*quantity);
                total_for_quantity(base_price, *quantity)
            },
            _ => {
                return Err(ServiceError::Rejected(
                    "allocation does not match the event's seating".to_string(),
                ));
            },
        };

        let confirmation = BookingConfirmation {
            booking_id: BookingId::new(),
            event_id: request.event_id,
            allocation: request.allocation,
            total,
            remaining: Some(record.remaining()),
        };
        tracing::info!(
            event_id = %confirmation.event_id,
            booking_id = %confirmation.booking_id,
            customer_id = %request.customer_id,
            "Booking confirmed"
        );
        Ok(confirmation)
    }
}
