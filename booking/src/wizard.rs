//! Booking wizard state machine.
//!
//! A session walks `Venue → Schedule → Selection → Review`. Forward moves are
//! gated by the current step's predicate; backward moves are free. Steps enter
//! `completed` only when their predicate passed, and never leave it, so
//! [`WizardState::jump_to`] can revisit them but never skip ahead.
//!
//! Everything here is synchronous state manipulation. Fetching availability
//! and submitting bookings is described by the reducer as effects.

use crate::availability::{BookedSnapshot, CapacityMode, validate_selection};
use crate::descriptor::EventDescriptor;
use crate::error::{BookingError, LayoutParseError, ServiceError, StepError, SubmissionError};
use crate::pricing::{BookingFee, LegendEntry, PriceBreakdown, legend};
use crate::selection::{SelectionState, SnapshotApplied};
use crate::service::{Allocation, BookingConfirmation, BookingRequest};
use crate::types::{BookingId, CustomerId, EventId, SeatCode};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Extra days offered after the first date of a multi-day run
const MAX_EXTRA_DAYS: u64 = 3;
const SECONDS_PER_DAY: i64 = 86_400;

// ============================================================================
// Steps
// ============================================================================

/// Wizard step, in flow order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    /// Pick where
    Venue,
    /// Pick when
    Schedule,
    /// Pick seats or a quantity
    Selection,
    /// Check and submit
    Review,
}

impl Step {
    /// All steps in order
    pub const ALL: [Self; 4] = [Self::Venue, Self::Schedule, Self::Selection, Self::Review];

    /// The following step, if any
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Venue => Some(Self::Schedule),
            Self::Schedule => Some(Self::Selection),
            Self::Selection => Some(Self::Review),
            Self::Review => None,
        }
    }

    /// The preceding step, if any
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        match self {
            Self::Venue => None,
            Self::Schedule => Some(Self::Venue),
            Self::Selection => Some(Self::Schedule),
            Self::Review => Some(Self::Selection),
        }
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Venue => "Select Venue",
            Self::Schedule => "Choose Date & Time",
            Self::Selection => "Select Seats",
            Self::Review => "Review & Book",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Session context
// ============================================================================

/// Role of the signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Buys tickets
    Customer,
    /// Runs events
    Organizer,
    /// Operates the platform
    Admin,
    /// Not signed in
    Guest,
}

/// Who is booking, handed to the session when it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Signed-in customer, if any
    pub customer_id: Option<CustomerId>,
    /// Role of the user
    pub role: Role,
}

impl SessionContext {
    /// A signed-in customer
    #[must_use]
    pub const fn customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            role: Role::Customer,
        }
    }

    /// An anonymous visitor
    #[must_use]
    pub const fn guest() -> Self {
        Self {
            customer_id: None,
            role: Role::Guest,
        }
    }

    /// A signed-in user with another role
    #[must_use]
    pub const fn with_role(customer_id: CustomerId, role: Role) -> Self {
        Self {
            customer_id: Some(customer_id),
            role,
        }
    }

    /// The customer id, if this user may book
    ///
    /// # Errors
    ///
    /// [`SubmissionError::NotLoggedIn`] without an identity,
    /// [`SubmissionError::NotCustomer`] for any role but `Customer`.
    pub const fn can_book(&self) -> Result<CustomerId, SubmissionError> {
        let Some(customer_id) = self.customer_id else {
            return Err(SubmissionError::NotLoggedIn);
        };
        match self.role {
            Role::Customer => Ok(customer_id),
            Role::Organizer | Role::Admin | Role::Guest => Err(SubmissionError::NotCustomer),
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Dates and times an event can be booked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// Bookable dates
    pub dates: Vec<NaiveDate>,
    /// Bookable start times
    pub times: Vec<NaiveTime>,
}

impl ScheduleOptions {
    /// Options for a run from `starts_at` to `ends_at`
    ///
    /// The start date, plus one date per started day of the run up to three
    /// more. The only time is the start time.
    #[must_use]
    pub fn from_run(starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> Self {
        let first = starts_at.date_naive();
        let run_seconds = ends_at.map_or(0, |end| (end - starts_at).num_seconds());
        let extra_days = if run_seconds > 0 {
            let days = (run_seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
            u64::try_from(days).unwrap_or(u64::MAX).min(MAX_EXTRA_DAYS)
        } else {
            0
        };

        let dates = std::iter::once(first)
            .chain((1..=extra_days).filter_map(|i| first.checked_add_days(Days::new(i))))
            .collect();

        Self {
            dates,
            times: vec![starts_at.time()],
        }
    }
}

/// Venues offered: the declared list, or the event location
fn venue_options(event: &EventDescriptor) -> Vec<String> {
    if !event.venues.is_empty() {
        return event.venues.clone();
    }
    let location = event.location.trim();
    if location.is_empty() {
        Vec::new()
    } else {
        vec![location.to_string()]
    }
}

/// The single option, if there is exactly one
fn only<T: Clone>(options: &[T]) -> Option<T> {
    match options {
        [single] => Some(single.clone()),
        _ => None,
    }
}

/// Checks a choice against the offered options
fn choose<T>(options: &[T], value: T) -> Result<T, StepError>
where
    T: PartialEq + fmt::Display,
{
    if let [single] = options {
        return if *single == value {
            Ok(value)
        } else {
            Err(StepError::OptionLocked)
        };
    }
    if options.contains(&value) {
        Ok(value)
    } else {
        Err(StepError::UnknownOption(value.to_string()))
    }
}

// ============================================================================
// Session status
// ============================================================================

/// Progress of the availability snapshot for the Selection step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// Not fetched yet
    NotRequested,
    /// A fetch is outstanding
    Loading,
    /// The latest fetch succeeded
    Ready,
    /// The latest fetch failed
    Failed(ServiceError),
}

/// Read-only record of a confirmed booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSummary {
    /// Booking id from the service
    pub booking_id: BookingId,
    /// Event booked
    pub event_id: EventId,
    /// Event name
    pub event_name: String,
    /// Chosen venue
    pub venue: Option<String>,
    /// Chosen date
    pub date: Option<NaiveDate>,
    /// Chosen time
    pub time: Option<NaiveTime>,
    /// Number of tickets
    pub tickets: u32,
    /// Seat codes (empty for general admission)
    pub seats: Vec<SeatCode>,
    /// Subtotal, fee and grand total
    pub breakdown: PriceBreakdown,
    /// When the confirmation was recorded
    pub confirmed_at: DateTime<Utc>,
}

/// Submission progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Nothing outstanding
    Idle,
    /// A request is outstanding
    InFlight,
    /// The session produced a booking
    Confirmed(Box<BookingSummary>),
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEnd {
    /// Cancelled from the venue step
    Cancelled,
    /// Navigated away
    Abandoned,
    /// Booked
    Booked,
}

// ============================================================================
// Wizard state
// ============================================================================

/// One customer's booking session for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardState {
    event: EventDescriptor,
    context: SessionContext,
    step: Step,
    completed: BTreeSet<Step>,
    venues: Vec<String>,
    schedule: ScheduleOptions,
    venue: Option<String>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    selection: SelectionState,
    layout_diagnostic: Option<LayoutParseError>,
    snapshot_generation: u64,
    snapshot: SnapshotStatus,
    submission: SubmissionStatus,
    ended: Option<SessionEnd>,
    /// Last rejected command
    pub last_error: Option<BookingError>,
    /// Message from the last booking conflict
    pub conflict_notice: Option<String>,
}

impl WizardState {
    /// Opens a booking session
    ///
    /// Single-option axes are filled in and locked up front.
    ///
    /// # Errors
    ///
    /// Only signed-in customers may book; see [`SessionContext::can_book`].
    pub fn start(event: EventDescriptor, context: SessionContext) -> Result<Self, SubmissionError> {
        context.can_book()?;

        let resolved = CapacityMode::resolve(&event);
        let venues = venue_options(&event);
        let schedule = ScheduleOptions::from_run(event.starts_at, event.ends_at);
        let selection = SelectionState::new(resolved.mode, event.base_price);

        tracing::debug!(
            event_id = %event.id,
            seated = selection.mode().is_seated(),
            venues = venues.len(),
            dates = schedule.dates.len(),
            "Booking session started"
        );

        Ok(Self {
            venue: only(&venues),
            date: only(&schedule.dates),
            time: only(&schedule.times),
            event,
            context,
            step: Step::Venue,
            completed: BTreeSet::new(),
            venues,
            schedule,
            selection,
            layout_diagnostic: resolved.diagnostic,
            snapshot_generation: 0,
            snapshot: SnapshotStatus::NotRequested,
            submission: SubmissionStatus::Idle,
            ended: None,
            last_error: None,
            conflict_notice: None,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The event
    #[must_use]
    pub const fn event(&self) -> &EventDescriptor {
        &self.event
    }

    /// Who is booking
    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Current step
    #[must_use]
    pub const fn step(&self) -> Step {
        self.step
    }

    /// Steps whose predicate has passed
    #[must_use]
    pub const fn completed(&self) -> &BTreeSet<Step> {
        &self.completed
    }

    /// Whether `step` may be jumped to
    #[must_use]
    pub fn can_jump_to(&self, step: Step) -> bool {
        step == self.step || self.completed.contains(&step)
    }

    /// Offered venues
    #[must_use]
    pub fn venue_options(&self) -> &[String] {
        &self.venues
    }

    /// Offered dates and times
    #[must_use]
    pub const fn schedule_options(&self) -> &ScheduleOptions {
        &self.schedule
    }

    /// Chosen venue
    #[must_use]
    pub fn venue(&self) -> Option<&str> {
        self.venue.as_deref()
    }

    /// Chosen date
    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Chosen time
    #[must_use]
    pub const fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    /// The selection
    #[must_use]
    pub const fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Why a seat-requiring event is sold as general admission
    #[must_use]
    pub const fn layout_diagnostic(&self) -> Option<&LayoutParseError> {
        self.layout_diagnostic.as_ref()
    }

    /// Category legend for seated events
    #[must_use]
    pub fn legend(&self) -> Vec<LegendEntry> {
        match self.selection.mode() {
            CapacityMode::Seated { layout, .. } => legend(layout, self.event.base_price),
            CapacityMode::GeneralAdmission { .. } => Vec::new(),
        }
    }

    /// Price breakdown of the current selection
    #[must_use]
    pub fn breakdown(&self, fee: BookingFee) -> PriceBreakdown {
        PriceBreakdown::new(self.selection.total(), fee)
    }

    /// Snapshot progress
    #[must_use]
    pub const fn snapshot_status(&self) -> &SnapshotStatus {
        &self.snapshot
    }

    /// Generation of the most recent snapshot fetch
    #[must_use]
    pub const fn snapshot_generation(&self) -> u64 {
        self.snapshot_generation
    }

    /// Submission progress
    #[must_use]
    pub const fn submission(&self) -> &SubmissionStatus {
        &self.submission
    }

    /// The booking, once confirmed
    #[must_use]
    pub fn summary(&self) -> Option<&BookingSummary> {
        match &self.submission {
            SubmissionStatus::Confirmed(summary) => Some(summary),
            SubmissionStatus::Idle | SubmissionStatus::InFlight => None,
        }
    }

    /// How the session ended, if it has
    #[must_use]
    pub const fn ended(&self) -> Option<SessionEnd> {
        self.ended
    }

    /// Whether commands are still accepted
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.ended.is_none()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    const fn ensure_open(&self) -> Result<(), StepError> {
        if self.ended.is_some() {
            Err(StepError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_step(&self, step: Step) -> Result<(), StepError> {
        if self.step == step {
            Ok(())
        } else {
            Err(StepError::WrongStep { current: self.step })
        }
    }

    /// Checks the current step's predicate
    ///
    /// # Errors
    ///
    /// The specific reason the step is not complete.
    pub fn validate_step(&self) -> Result<(), StepError> {
        match self.step {
            Step::Venue => {
                if self.venues.len() > 1 && self.venue.is_none() {
                    return Err(StepError::VenueRequired);
                }
            },
            Step::Schedule => {
                if self.date.is_none() {
                    return Err(StepError::DateRequired);
                }
                if self.time.is_none() {
                    return Err(StepError::TimeRequired);
                }
            },
            Step::Selection => {
                if self.snapshot != SnapshotStatus::Ready {
                    return Err(StepError::AvailabilityPending);
                }
                if self.selection.remaining() == 0 {
                    return Err(StepError::SoldOut);
                }
                if self.selection.is_empty() {
                    return Err(StepError::SelectionEmpty);
                }
            },
            Step::Review => return Err(StepError::AtLastStep),
        }
        Ok(())
    }

    /// Moves forward when the current step is complete
    ///
    /// # Errors
    ///
    /// [`StepError::SessionClosed`] or the failed predicate; the state is unchanged.
    pub fn advance(&mut self) -> Result<Step, StepError> {
        self.ensure_open()?;
        self.validate_step()?;
        let next = self.step.next().ok_or(StepError::AtLastStep)?;
        self.completed.insert(self.step);
        self.step = next;
        Ok(next)
    }

    /// Moves back one step, staying on `Venue` at the start
    ///
    /// # Errors
    ///
    /// [`StepError::SessionClosed`].
    pub fn retreat(&mut self) -> Result<Step, StepError> {
        self.ensure_open()?;
        if let Some(prev) = self.step.prev() {
            self.step = prev;
        }
        Ok(self.step)
    }

    /// Moves to a completed step or stays on the current one
    ///
    /// # Errors
    ///
    /// [`StepError::NotReachable`] for steps not yet completed.
    pub fn jump_to(&mut self, step: Step) -> Result<Step, StepError> {
        self.ensure_open()?;
        if !self.can_jump_to(step) {
            return Err(StepError::NotReachable(step));
        }
        self.step = step;
        Ok(step)
    }

    /// Leaves the flow from the venue step
    ///
    /// # Errors
    ///
    /// [`StepError::CancelNotAllowed`] past the first step.
    pub fn cancel(&mut self) -> Result<(), StepError> {
        self.ensure_open()?;
        if self.step != Step::Venue {
            return Err(StepError::CancelNotAllowed);
        }
        self.close(SessionEnd::Cancelled);
        Ok(())
    }

    /// Discards the session from any step
    ///
    /// # Errors
    ///
    /// [`StepError::SessionClosed`] when already ended.
    pub fn abandon(&mut self) -> Result<(), StepError> {
        self.ensure_open()?;
        self.close(SessionEnd::Abandoned);
        Ok(())
    }

    fn close(&mut self, end: SessionEnd) {
        self.selection.clear();
        self.ended = Some(end);
        tracing::debug!(event_id = %self.event.id, ?end, "Booking session closed");
    }

    // ------------------------------------------------------------------
    // Choices
    // ------------------------------------------------------------------

    /// Chooses a venue on the venue step
    ///
    /// # Errors
    ///
    /// Wrong step, an unknown venue, or changing a single fixed venue.
    pub fn select_venue(&mut self, venue: &str) -> Result<(), StepError> {
        self.ensure_open()?;
        self.ensure_step(Step::Venue)?;
        self.venue = Some(choose(&self.venues, venue.to_string())?);
        Ok(())
    }

    /// Chooses a date on the schedule step
    ///
    /// # Errors
    ///
    /// Wrong step, a date not on offer, or changing a single fixed date.
    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), StepError> {
        self.ensure_open()?;
        self.ensure_step(Step::Schedule)?;
        self.date = Some(choose(&self.schedule.dates, date)?);
        Ok(())
    }

    /// Chooses a time on the schedule step
    ///
    /// # Errors
    ///
    /// Wrong step, a time not on offer, or changing a single fixed time.
    pub fn select_time(&mut self, time: NaiveTime) -> Result<(), StepError> {
        self.ensure_open()?;
        self.ensure_step(Step::Schedule)?;
        self.time = Some(choose(&self.schedule.times, time)?);
        Ok(())
    }

    /// Mutable selection, on the selection step only
    ///
    /// # Errors
    ///
    /// Closed session or wrong step.
    pub fn selection_mut(&mut self) -> Result<&mut SelectionState, StepError> {
        self.ensure_open()?;
        self.ensure_step(Step::Selection)?;
        Ok(&mut self.selection)
    }

    // ------------------------------------------------------------------
    // Availability
    // ------------------------------------------------------------------

    /// Starts a new snapshot fetch and returns its generation
    pub fn begin_snapshot_fetch(&mut self) -> u64 {
        self.snapshot_generation = self.snapshot_generation.wrapping_add(1);
        self.snapshot = SnapshotStatus::Loading;
        self.snapshot_generation
    }

    /// Applies a snapshot unless a newer fetch has started
    ///
    /// A snapshot that shrinks the selection while on review sends the
    /// session back to seat selection with a notice.
    pub fn apply_snapshot(
        &mut self,
        generation: u64,
        snapshot: &BookedSnapshot,
    ) -> Option<SnapshotApplied> {
        if generation != self.snapshot_generation || !self.is_open() {
            tracing::debug!(
                generation,
                current = self.snapshot_generation,
                "Dropping superseded snapshot"
            );
            return None;
        }
        self.snapshot = SnapshotStatus::Ready;
        let applied = self.selection.apply_snapshot(snapshot);
        if applied.changed() && self.step == Step::Review {
            let notice = Self::shrink_notice(&applied);
            tracing::info!(%notice, "Reviewed selection changed, returning to seat selection");
            self.step = Step::Selection;
            self.conflict_notice = Some(notice);
        }
        Some(applied)
    }

    fn shrink_notice(applied: &SnapshotApplied) -> String {
        match applied.quantity_reduced_to {
            Some(quantity) => format!("Only {quantity} ticket(s) left"),
            None => {
                let codes: Vec<String> = applied.purged.iter().map(ToString::to_string).collect();
                format!("Seat(s) {} no longer available", codes.join(", "))
            },
        }
    }

    /// Records a failed fetch unless a newer fetch has started
    pub fn snapshot_failed(&mut self, generation: u64, error: ServiceError) -> bool {
        if generation != self.snapshot_generation || !self.is_open() {
            return false;
        }
        self.snapshot = SnapshotStatus::Failed(error);
        true
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Validates the session for submission and marks a request in flight
    ///
    /// # Errors
    ///
    /// Anything that stops the request from being sent; nothing is sent then.
    pub fn begin_submission(&mut self) -> Result<BookingRequest, BookingError> {
        match (&self.submission, self.ended) {
            (SubmissionStatus::Confirmed(_), _) => return Err(SubmissionError::AlreadyConfirmed.into()),
            (_, Some(_)) => return Err(StepError::SessionClosed.into()),
            (SubmissionStatus::InFlight, None) => return Err(SubmissionError::InFlight.into()),
            (SubmissionStatus::Idle, None) => {},
        }
        if self.step != Step::Review {
            return Err(SubmissionError::NotOnReview.into());
        }
        let customer_id = self.context.can_book()?;
        let allocation = self
            .selection
            .allocation()
            .ok_or(StepError::SelectionEmpty)?;
        validate_selection(allocation.tickets(), self.selection.remaining())?;

        self.submission = SubmissionStatus::InFlight;
        Ok(BookingRequest::new(self.event.id, customer_id, allocation))
    }

    /// Records a confirmed booking and closes the session
    pub fn confirm(
        &mut self,
        confirmation: &BookingConfirmation,
        fee: BookingFee,
        now: DateTime<Utc>,
    ) -> BookingSummary {
        let seats = match &confirmation.allocation {
            Allocation::Seats(codes) => codes.clone(),
            Allocation::Quantity(_) => Vec::new(),
        };
        let summary = BookingSummary {
            booking_id: confirmation.booking_id,
            event_id: self.event.id,
            event_name: self.event.name.clone(),
            venue: self.venue.clone(),
            date: self.date,
            time: self.time,
            tickets: confirmation.allocation.tickets(),
            seats,
            breakdown: PriceBreakdown::new(confirmation.total, fee),
            confirmed_at: now,
        };
        self.completed.insert(Step::Review);
        self.conflict_notice = None;
        self.close(SessionEnd::Booked);
        self.submission = SubmissionStatus::Confirmed(Box::new(summary.clone()));
        summary
    }

    /// Returns to the selection step after the service refused some seats
    pub fn conflict(&mut self, reason: String) {
        self.submission = SubmissionStatus::Idle;
        self.step = Step::Selection;
        self.conflict_notice = Some(reason);
    }

    /// Stays on review after a transient failure
    pub fn failed(&mut self) {
        self.submission = SubmissionStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Money;
    use proptest::prelude::*;

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    fn event() -> EventDescriptor {
        EventDescriptor::new("Quartet", Money::from_major(100), at("2025-06-01T19:00:00Z"))
            .with_layout(r#"{"rows": ["A", "B", "C"], "columns": 10}"#)
            .with_location("Main Hall")
    }

    fn session(event: EventDescriptor) -> WizardState {
        WizardState::start(event, SessionContext::customer(CustomerId::new())).unwrap()
    }

    fn to_selection(state: &mut WizardState) {
        state.advance().unwrap();
        state.advance().unwrap();
        let generation = state.begin_snapshot_fetch();
        state.apply_snapshot(generation, &BookedSnapshot::Seats(BTreeSet::new()));
    }

    #[test]
    fn test_only_customers_start_sessions() {
        assert_eq!(
            WizardState::start(event(), SessionContext::guest()).unwrap_err(),
            SubmissionError::NotLoggedIn
        );
        assert_eq!(
            WizardState::start(event(), SessionContext::with_role(CustomerId::new(), Role::Organizer))
                .unwrap_err(),
            SubmissionError::NotCustomer
        );
    }

    #[test]
    fn test_single_options_are_prefilled() {
        let state = session(event());
        assert_eq!(state.venue(), Some("Main Hall"));
        assert_eq!(state.date(), NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(state.time(), NaiveTime::from_hms_opt(19, 0, 0));
    }

    #[test]
    fn test_multi_day_run_offers_up_to_three_more_days() {
        let options = ScheduleOptions::from_run(
            at("2025-06-01T19:00:00Z"),
            Some(at("2025-06-02T20:00:00Z")),
        );
        assert_eq!(options.dates.len(), 3);

        let long = ScheduleOptions::from_run(
            at("2025-06-01T19:00:00Z"),
            Some(at("2025-06-20T19:00:00Z")),
        );
        assert_eq!(long.dates.len(), 4);
        assert_eq!(long.dates[3], NaiveDate::from_ymd_opt(2025, 6, 4).unwrap());
        assert_eq!(long.times, vec![NaiveTime::from_hms_opt(19, 0, 0).unwrap()]);

        let backwards = ScheduleOptions::from_run(
            at("2025-06-01T19:00:00Z"),
            Some(at("2025-05-01T19:00:00Z")),
        );
        assert_eq!(backwards.dates.len(), 1);
    }

    #[test]
    fn test_multiple_venues_require_a_choice() {
        let mut state = session(event().with_venues(["North", "South"]));
        assert_eq!(state.venue(), None);
        assert_eq!(state.advance(), Err(StepError::VenueRequired));
        assert_eq!(
            state.select_venue("East"),
            Err(StepError::UnknownOption("East".to_string()))
        );
        state.select_venue("South").unwrap();
        assert_eq!(state.advance(), Ok(Step::Schedule));
    }

    #[test]
    fn test_locked_options_cannot_change() {
        let mut state = session(event());
        assert_eq!(state.select_venue("Elsewhere"), Err(StepError::OptionLocked));
        assert_eq!(state.select_venue("Main Hall"), Ok(()));
        assert_eq!(
            state.select_date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            Err(StepError::WrongStep {
                current: Step::Venue
            })
        );
    }

    #[test]
    fn test_selection_blocked_until_snapshot_loads() {
        let mut state = session(event());
        state.advance().unwrap();
        state.advance().unwrap();
        assert_eq!(state.advance(), Err(StepError::AvailabilityPending));

        let stale = state.begin_snapshot_fetch();
        let current = state.begin_snapshot_fetch();
        assert_eq!(state.apply_snapshot(stale, &BookedSnapshot::Seats(BTreeSet::new())), None);
        assert_eq!(state.snapshot_status(), &SnapshotStatus::Loading);

        assert!(state.apply_snapshot(current, &BookedSnapshot::Seats(BTreeSet::new())).is_some());
        assert_eq!(state.advance(), Err(StepError::SelectionEmpty));
    }

    #[test]
    fn test_jump_back_and_not_ahead() {
        let mut state = session(event());
        assert_eq!(state.jump_to(Step::Selection), Err(StepError::NotReachable(Step::Selection)));
        to_selection(&mut state);
        assert_eq!(state.jump_to(Step::Venue), Ok(Step::Venue));
        assert_eq!(state.jump_to(Step::Selection), Err(StepError::NotReachable(Step::Selection)));
        assert_eq!(state.jump_to(Step::Schedule), Ok(Step::Schedule));
    }

    #[test]
    fn test_retreat_stops_at_venue_and_cancel_only_there() {
        let mut state = session(event());
        state.advance().unwrap();
        assert_eq!(state.cancel(), Err(StepError::CancelNotAllowed));
        assert_eq!(state.retreat(), Ok(Step::Venue));
        assert_eq!(state.retreat(), Ok(Step::Venue));
        assert_eq!(state.cancel(), Ok(()));
        assert_eq!(state.ended(), Some(SessionEnd::Cancelled));
        assert_eq!(state.advance(), Err(StepError::SessionClosed));
    }

    #[test]
    fn test_submission_guards() {
        let mut state = session(event());
        to_selection(&mut state);
        assert_eq!(
            state.begin_submission().unwrap_err(),
            BookingError::Submission(SubmissionError::NotOnReview)
        );
        state
            .selection_mut()
            .unwrap()
            .toggle_seat(&SeatCode::from("A1"))
            .unwrap();
        state.advance().unwrap();

        let request = state.begin_submission().unwrap();
        assert_eq!(request.allocation().tickets(), 1);
        assert_eq!(
            state.begin_submission().unwrap_err(),
            BookingError::Submission(SubmissionError::InFlight)
        );
    }

    #[test]
    fn test_abandon_closes_from_any_step() {
        let mut state = session(event());
        to_selection(&mut state);
        state
            .selection_mut()
            .unwrap()
            .toggle_seat(&SeatCode::from("B2"))
            .unwrap();
        assert_eq!(state.abandon(), Ok(()));
        assert!(state.selection().is_empty());
        assert_eq!(state.retreat(), Err(StepError::SessionClosed));
        assert_eq!(state.abandon(), Err(StepError::SessionClosed));
    }

    #[derive(Debug, Clone)]
    enum Nav {
        Advance,
        Retreat,
        Jump(usize),
        Toggle(u32),
    }

    fn nav() -> impl Strategy<Value = Nav> {
        prop_oneof![
            Just(Nav::Advance),
            Just(Nav::Retreat),
            (0usize..4).prop_map(Nav::Jump),
            (1u32..4).prop_map(Nav::Toggle),
        ]
    }

    proptest! {
        #[test]
        fn prop_completed_steps_only_grow(ops in proptest::collection::vec(nav(), 0..40)) {
            let mut state = session(event().with_venues(["North", "South"]));
            state.select_venue("North").unwrap();
            let generation = state.begin_snapshot_fetch();
            state.apply_snapshot(generation, &BookedSnapshot::Seats(BTreeSet::new()));

            for op in ops {
                let before = state.completed().clone();
                let was_reachable: Vec<bool> = Step::ALL.iter().map(|s| state.can_jump_to(*s)).collect();
                match op {
                    Nav::Advance => { let _ = state.advance(); },
                    Nav::Retreat => { let _ = state.retreat(); },
                    Nav::Jump(i) => {
                        let result = state.jump_to(Step::ALL[i]);
                        prop_assert_eq!(result.is_ok(), was_reachable[i]);
                    },
                    Nav::Toggle(column) => {
                        if let Ok(selection) = state.selection_mut() {
                            let _ = selection.toggle_seat(&SeatCode::new("A", column));
                        }
                    },
                }
                prop_assert!(before.is_subset(state.completed()));
                prop_assert!(state.step() == Step::Venue || state.completed().contains(&state.step().prev().unwrap()));
            }
        }
    }
}
