//! # Seatflow Booking
//!
//! Seat and ticket reservation for scheduled events, built on the Seatflow
//! reducer framework.
//!
//! A customer walks a four-step wizard for one event:
//!
//! ```text
//!  Venue ──▶ Schedule ──▶ Selection ──▶ Review ──▶ Submit
//!                            ▲                       │
//!                            └──── Conflict ◀────────┘
//! ```
//!
//! - **Layout** ([`layout`]): validated seat grid with priced categories
//! - **Availability** ([`availability`]): remaining capacity from what is sold
//! - **Pricing** ([`pricing`]): integer prices from base price and multiplier
//! - **Selection** ([`selection`]): seats or quantity, never above remaining capacity
//! - **Wizard** ([`wizard`]): gated step machine and session lifecycle
//! - **Reducer** ([`reducer`]): snapshot fetches and the submission protocol as effects
//!
//! The booking service ([`service::BookingService`]) is the authority on
//! what is sold. Local availability is advisory; a conflicting submission
//! sends the session back to Selection with the lost seats removed.
//!
//! # Example
//!
//! ```rust,ignore
//! use seatflow_booking::prelude::*;
//! use seatflow_runtime::Store;
//!
//! let session = WizardState::start(event, SessionContext::customer(customer_id))?;
//! let store = Store::new(session, WizardReducer::new(), environment);
//!
//! store.send(WizardAction::Advance).await?;
//! store.send(WizardAction::Advance).await?;
//! store.send(WizardAction::ToggleSeat { code: "A1".into() }).await?;
//! ```

pub mod availability;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod layout;
pub mod pricing;
pub mod reducer;
pub mod selection;
pub mod service;
pub mod types;
pub mod wizard;

pub use config::BookingConfig;
pub use error::BookingError;

/// Commonly used types
pub mod prelude {
    pub use crate::availability::{BookedSnapshot, CapacityMode};
    pub use crate::config::BookingConfig;
    pub use crate::descriptor::EventDescriptor;
    pub use crate::error::{
        BookingError, LayoutParseError, SelectionError, ServiceError, StepError, SubmissionError,
    };
    pub use crate::events::{BookingEvent, SharedEventBus, in_process_bus};
    pub use crate::layout::SeatLayout;
    pub use crate::pricing::{BookingFee, PriceBreakdown};
    pub use crate::reducer::{WizardAction, WizardEnvironment, WizardReducer};
    pub use crate::selection::{SeatStatus, SelectionState};
    pub use crate::service::{
        Allocation, BookingOutcome, BookingRequest, BookingService, InMemoryBookingService,
    };
    pub use crate::types::{BookingId, CustomerId, EventId, Money, SeatCode};
    pub use crate::wizard::{Role, SessionContext, Step, WizardState};
}
