//! Booking wizard reducer.
//!
//! Commands from the customer drive the [`WizardState`]; availability and
//! submission results come back as feedback actions. Rejected commands leave
//! the state unchanged apart from `last_error`.
//!
//! ```text
//!  Advance (into Selection) ──▶ fetch snapshot ──▶ SnapshotLoaded / SnapshotFailed
//!  Submit ──▶ service.submit ──▶ SubmissionResolved
//!                                  ├─ Confirmed ──▶ summary, publish events
//!                                  ├─ Conflict  ──▶ back to Selection, fetch snapshot
//!                                  └─ Failed    ──▶ stay on Review
//! ```

use crate::availability::BookedSnapshot;
use crate::config::BookingConfig;
use crate::error::{BookingError, ServiceError, StepError, SubmissionError};
use crate::events::{BookingEvent, SharedEventBus};
use crate::service::{BookingOutcome, BookingService};
use crate::types::SeatCode;
use crate::wizard::{Step, SubmissionStatus, WizardState};
use chrono::{NaiveDate, NaiveTime};
use seatflow_core::environment::Clock;
use seatflow_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use seatflow_runtime::retry::retry_with_predicate;
use std::sync::Arc;

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Everything a booking session reacts to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardAction {
    // Commands
    /// Choose a venue
    SelectVenue {
        /// Venue name
        venue: String,
    },
    /// Choose a date
    SelectDate {
        /// Date
        date: NaiveDate,
    },
    /// Choose a time
    SelectTime {
        /// Time
        time: NaiveTime,
    },
    /// Move to the next step
    Advance,
    /// Move to the previous step
    Retreat,
    /// Revisit a completed step
    JumpTo {
        /// Target step
        step: Step,
    },
    /// Select or deselect a seat
    ToggleSeat {
        /// Seat code
        code: SeatCode,
    },
    /// Set the general-admission quantity
    SetQuantity {
        /// Ticket count
        quantity: u32,
    },
    /// Drop the whole selection
    ClearSelection,
    /// Fetch availability again
    RefreshSnapshot,
    /// Send the booking request
    Submit,
    /// Leave from the venue step
    Cancel,
    /// Navigate away
    Abandon,

    // Events
    /// A snapshot fetch succeeded
    SnapshotLoaded {
        /// Fetch generation
        generation: u64,
        /// What is sold
        snapshot: BookedSnapshot,
    },
    /// A snapshot fetch failed after retries
    SnapshotFailed {
        /// Fetch generation
        generation: u64,
        /// Last error
        error: ServiceError,
    },
    /// The booking service answered a submission
    SubmissionResolved {
        /// Outcome
        outcome: BookingOutcome,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for booking sessions
#[derive(Clone)]
pub struct WizardEnvironment {
    /// Booking service
    pub service: Arc<dyn BookingService>,
    /// Where capacity and booking events go
    pub events: SharedEventBus,
    /// Clock for confirmation timestamps
    pub clock: Arc<dyn Clock>,
    /// Timeouts, retries and fee
    pub config: BookingConfig,
}

impl WizardEnvironment {
    /// Creates a new `WizardEnvironment`
    #[must_use]
    pub fn new(
        service: Arc<dyn BookingService>,
        events: SharedEventBus,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        Self {
            service,
            events,
            clock,
            config,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for booking sessions
#[derive(Clone, Debug, Default)]
pub struct WizardReducer;

impl WizardReducer {
    /// Creates a new `WizardReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn reject(
        state: &mut WizardState,
        error: impl Into<BookingError>,
    ) -> SmallVec<[Effect<WizardAction>; 4]> {
        let error = error.into();
        tracing::debug!(%error, step = ?state.step(), "Command rejected");
        metrics::counter!("booking.commands.rejected").increment(1);
        state.last_error = Some(error);
        SmallVec::new()
    }

    /// Runs a navigation and fetches availability when it lands on Selection
    fn navigate(
        state: &mut WizardState,
        env: &WizardEnvironment,
        nav: impl FnOnce(&mut WizardState) -> Result<Step, StepError>,
    ) -> SmallVec<[Effect<WizardAction>; 4]> {
        let from = state.step();
        match nav(state) {
            Ok(to) => {
                state.last_error = None;
                tracing::debug!(?from, ?to, "Wizard moved");
                if to == Step::Selection && from != Step::Selection {
                    smallvec![Self::fetch_snapshot(state, env)]
                } else {
                    SmallVec::new()
                }
            },
            Err(error) => Self::reject(state, error),
        }
    }

    /// Starts a new snapshot fetch; idempotent reads are retried on transient errors
    fn fetch_snapshot(state: &mut WizardState, env: &WizardEnvironment) -> Effect<WizardAction> {
        let generation = state.begin_snapshot_fetch();
        let event_id = state.event().id;
        let service = Arc::clone(&env.service);
        let policy = env.config.snapshot_retry();
        let timeout = env.config.snapshot_timeout();

        tracing::debug!(%event_id, generation, "Fetching availability");

        Effect::future(async move {
            let result = retry_with_predicate(
                &policy,
                || {
                    let service = Arc::clone(&service);
                    async move {
                        tokio::time::timeout(timeout, service.booked_snapshot(event_id))
                            .await
                            .unwrap_or_else(|_| {
                                Err(ServiceError::Unavailable(
                                    "availability request timed out".to_string(),
                                ))
                            })
                    }
                },
                ServiceError::is_transient,
            )
            .await;

            Some(match result {
                Ok(snapshot) => WizardAction::SnapshotLoaded {
                    generation,
                    snapshot,
                },
                Err(error) => WizardAction::SnapshotFailed { generation, error },
            })
        })
    }

    fn publish(env: &WizardEnvironment, events: Vec<BookingEvent>) -> Effect<WizardAction> {
        let bus = Arc::clone(&env.events);
        Effect::future(async move {
            for event in events {
                match bus.publish(event) {
                    Ok(delivered) => tracing::trace!(delivered, "Booking event published"),
                    Err(error) => tracing::warn!(%error, "Failed to publish booking event"),
                }
            }
            None
        })
    }

    fn submit(state: &mut WizardState, env: &WizardEnvironment) -> SmallVec<[Effect<WizardAction>; 4]> {
        let request = match state.begin_submission() {
            Ok(request) => request,
            Err(error) => return Self::reject(state, error),
        };
        state.last_error = None;
        state.conflict_notice = None;

        tracing::info!(
            event_id = %request.event_id(),
            tickets = request.allocation().tickets(),
            "Submitting booking"
        );

        let service = Arc::clone(&env.service);
        let timeout = env.config.submit_timeout();
        smallvec![Effect::future(async move {
            let outcome = match tokio::time::timeout(timeout, service.submit(request)).await {
                Ok(result) => BookingOutcome::from(result),
                Err(_) => BookingOutcome::Failed {
                    reason: "The booking service did not answer in time".to_string(),
                },
            };
            Some(WizardAction::SubmissionResolved { outcome })
        })]
    }

    fn resolve(
        state: &mut WizardState,
        outcome: BookingOutcome,
        env: &WizardEnvironment,
    ) -> SmallVec<[Effect<WizardAction>; 4]> {
        let awaiting = state.is_open() && *state.submission() == SubmissionStatus::InFlight;

        match outcome {
            BookingOutcome::Confirmed(confirmation) => {
                metrics::counter!("booking.submissions", "outcome" => "confirmed").increment(1);
                let remaining = confirmation.remaining.unwrap_or_else(|| {
                    state
                        .selection()
                        .remaining()
                        .saturating_sub(confirmation.allocation.tickets())
                });

                if awaiting {
                    let summary = state.confirm(&confirmation, env.config.fee(), env.clock.now());
                    tracing::info!(
                        booking_id = %summary.booking_id,
                        tickets = summary.tickets,
                        grand_total = %summary.breakdown.grand_total,
                        "Booking confirmed"
                    );
                } else {
                    tracing::warn!(
                        booking_id = %confirmation.booking_id,
                        "Confirmation arrived for a session that is no longer waiting"
                    );
                }

                smallvec![Self::publish(
                    env,
                    vec![
                        BookingEvent::CapacityChanged {
                            event_id: confirmation.event_id,
                            remaining,
                        },
                        BookingEvent::BookingConfirmed {
                            event_id: confirmation.event_id,
                            booking_id: confirmation.booking_id,
                            tickets: confirmation.allocation.tickets(),
                        },
                    ],
                )]
            },
            BookingOutcome::Conflict { reason } => {
                metrics::counter!("booking.submissions", "outcome" => "conflict").increment(1);
                if !awaiting {
                    return SmallVec::new();
                }
                tracing::info!(%reason, "Booking conflict, refreshing availability");
                state.conflict(reason);
                smallvec![Self::fetch_snapshot(state, env)]
            },
            BookingOutcome::Failed { reason } => {
                metrics::counter!("booking.submissions", "outcome" => "failed").increment(1);
                if !awaiting {
                    return SmallVec::new();
                }
                tracing::warn!(%reason, "Booking failed");
                state.failed();
                state.last_error = Some(SubmissionError::Failed(reason).into());
                SmallVec::new()
            },
        }
    }
}

impl Reducer for WizardReducer {
    type State = WizardState;
    type Action = WizardAction;
    type Environment = WizardEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Choices ==========
            WizardAction::SelectVenue { venue } => match state.select_venue(&venue) {
                Ok(()) => {
                    state.last_error = None;
                    SmallVec::new()
                },
                Err(error) => Self::reject(state, error),
            },
            WizardAction::SelectDate { date } => match state.select_date(date) {
                Ok(()) => {
                    state.last_error = None;
                    SmallVec::new()
                },
                Err(error) => Self::reject(state, error),
            },
            WizardAction::SelectTime { time } => match state.select_time(time) {
                Ok(()) => {
                    state.last_error = None;
                    SmallVec::new()
                },
                Err(error) => Self::reject(state, error),
            },

            // ========== Navigation ==========
            WizardAction::Advance => Self::navigate(state, env, WizardState::advance),
            WizardAction::Retreat => Self::navigate(state, env, WizardState::retreat),
            WizardAction::JumpTo { step } => {
                Self::navigate(state, env, |state| state.jump_to(step))
            },
            WizardAction::Cancel => match state.cancel() {
                Ok(()) => SmallVec::new(),
                Err(error) => Self::reject(state, error),
            },
            WizardAction::Abandon => match state.abandon() {
                Ok(()) => SmallVec::new(),
                Err(error) => Self::reject(state, error),
            },

            // ========== Selection ==========
            WizardAction::ToggleSeat { code } => {
                let result = state
                    .selection_mut()
                    .map_err(BookingError::from)
                    .and_then(|selection| selection.toggle_seat(&code).map_err(BookingError::from));
                match result {
                    Ok(toggle) => {
                        tracing::trace!(seat = %code, ?toggle, "Seat toggled");
                        state.last_error = None;
                        SmallVec::new()
                    },
                    Err(error) => Self::reject(state, error),
                }
            },
            WizardAction::SetQuantity { quantity } => {
                let result = state
                    .selection_mut()
                    .map_err(BookingError::from)
                    .and_then(|selection| selection.set_quantity(quantity).map_err(BookingError::from));
                match result {
                    Ok(()) => {
                        state.last_error = None;
                        SmallVec::new()
                    },
                    Err(error) => Self::reject(state, error),
                }
            },
            WizardAction::ClearSelection => match state.selection_mut() {
                Ok(selection) => {
                    selection.clear();
                    state.last_error = None;
                    SmallVec::new()
                },
                Err(error) => Self::reject(state, error),
            },

            // ========== Availability ==========
            WizardAction::RefreshSnapshot => {
                if !state.is_open() {
                    return Self::reject(state, StepError::SessionClosed);
                }
                if !matches!(state.step(), Step::Selection | Step::Review) {
                    let current = state.step();
                    return Self::reject(state, StepError::WrongStep { current });
                }
                smallvec![Self::fetch_snapshot(state, env)]
            },
            WizardAction::SnapshotLoaded {
                generation,
                snapshot,
            } => {
                let before = state
                    .selection()
                    .is_loaded()
                    .then(|| state.selection().remaining());
                let Some(applied) = state.apply_snapshot(generation, &snapshot) else {
                    return SmallVec::new();
                };
                let remaining = state.selection().remaining();
                tracing::debug!(
                    generation,
                    remaining,
                    purged = applied.purged.len(),
                    "Availability loaded"
                );
                if matches!(state.last_error, Some(BookingError::Availability(_))) {
                    state.last_error = None;
                }

                if before == Some(remaining) {
                    SmallVec::new()
                } else {
                    smallvec![Self::publish(
                        env,
                        vec![BookingEvent::CapacityChanged {
                            event_id: state.event().id,
                            remaining,
                        }],
                    )]
                }
            },
            WizardAction::SnapshotFailed { generation, error } => {
                if state.snapshot_failed(generation, error.clone()) {
                    tracing::warn!(%error, generation, "Availability could not be loaded");
                    state.last_error = Some(BookingError::Availability(error));
                }
                SmallVec::new()
            },

            // ========== Submission ==========
            WizardAction::Submit => Self::submit(state, env),
            WizardAction::SubmissionResolved { outcome } => Self::resolve(state, outcome, env),
        }
    }
}
