//! Error types for the booking engine.
//!
//! Each concern has its own enum; [`BookingError`] unifies them for the wizard
//! state, which records the most recent rejection.

use crate::types::SeatCode;
use crate::wizard::Step;
use thiserror::Error;

/// Why a seat layout could not be constructed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutParseError {
    /// The layout text is not valid layout JSON
    #[error("Invalid layout JSON: {0}")]
    InvalidJson(String),

    /// The layout declares no rows
    #[error("Layout has no rows")]
    NoRows,

    /// The layout declares zero columns
    #[error("Layout has zero columns")]
    ZeroColumns,

    /// A row label is empty or whitespace
    #[error("Row {index} has an empty label")]
    EmptyRowLabel {
        /// Position of the row in the layout
        index: usize,
    },

    /// A row label appears twice
    #[error("Duplicate row label '{0}'")]
    DuplicateRow(String),

    /// A category multiplier is not a positive finite number
    #[error("Category '{label}' has invalid multiplier {multiplier}")]
    InvalidMultiplier {
        /// Category label as declared
        label: String,
        /// The rejected value, as written
        multiplier: String,
    },

    /// Two different seats would share a code (rows "A" and "A1" both yield "A11")
    #[error("Seat code {code} is produced by more than one seat")]
    AmbiguousSeatCode {
        /// The colliding code
        code: SeatCode,
    },
}

/// Why a selection change was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The change would exceed the remaining capacity
    #[error("Selection of {requested} exceeds remaining capacity {remaining}")]
    ExceedsCapacity {
        /// Size the selection would have had
        requested: u32,
        /// Remaining capacity at the time of the change
        remaining: u32,
    },

    /// The seat is blocked or already booked
    #[error("Seat {0} is not available")]
    SeatUnavailable(SeatCode),

    /// The seat is not part of the layout
    #[error("Seat {0} does not exist in this layout")]
    UnknownSeat(SeatCode),

    /// Quantity must be at least one
    #[error("Ticket quantity must be at least 1")]
    ZeroQuantity,

    /// Seat toggles on a general-admission event
    #[error("This event has no seat map; choose a ticket quantity")]
    NotSeated,

    /// Quantity on a seated event
    #[error("This event is seated; pick seats instead of a quantity")]
    NotGeneralAdmission,
}

/// Why a wizard navigation or choice was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// More than one venue and none chosen
    #[error("Please select a venue")]
    VenueRequired,

    /// Date missing
    #[error("Please select a date")]
    DateRequired,

    /// Time missing
    #[error("Please select a time")]
    TimeRequired,

    /// Nothing selected
    #[error("Please select at least one seat or ticket")]
    SelectionEmpty,

    /// Remaining capacity is zero
    #[error("This event is sold out")]
    SoldOut,

    /// Availability has not been loaded yet
    #[error("Availability is still loading")]
    AvailabilityPending,

    /// Target step has not been reached
    #[error("The '{0}' step has not been completed yet")]
    NotReachable(Step),

    /// The option is not offered by this event
    #[error("'{0}' is not one of the offered options")]
    UnknownOption(String),

    /// The axis has a single option which is fixed
    #[error("This event offers a single option here")]
    OptionLocked,

    /// Cancel is only offered from the first step
    #[error("Cancel is only available on the venue step; go back instead")]
    CancelNotAllowed,

    /// Already on the last step
    #[error("Already on the review step; submit the booking")]
    AtLastStep,

    /// The command only applies on a specific step
    #[error("Not available on the '{current}' step")]
    WrongStep {
        /// Step the wizard is on
        current: Step,
    },

    /// The session was cancelled, abandoned or completed
    #[error("This booking session has ended")]
    SessionClosed,
}

/// Why a submission did not go out or did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// Submission requested outside the review step
    #[error("Submit is only available on the review step")]
    NotOnReview,

    /// A submission is already outstanding
    #[error("A booking request is already in flight")]
    InFlight,

    /// The session already produced a confirmed booking
    #[error("This session has already been booked")]
    AlreadyConfirmed,

    /// Only customers can book
    #[error("Only customers can book tickets")]
    NotCustomer,

    /// No customer identity in the session
    #[error("Please log in to book tickets")]
    NotLoggedIn,

    /// Transient failure reported by the service or a timeout
    #[error("Booking failed: {0}")]
    Failed(String),
}

/// Error reported by the external booking service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The requested seats or quantity are no longer available
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The service refused the request for another reason
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The service could not be reached or timed out
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Whether retrying the same idempotent call may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Any rejection the booking engine can surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Layout problem
    #[error(transparent)]
    Layout(#[from] LayoutParseError),

    /// Selection problem
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Navigation problem
    #[error(transparent)]
    Step(#[from] StepError),

    /// Submission problem
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Availability could not be loaded
    #[error("Could not load availability: {0}")]
    Availability(ServiceError),
}
