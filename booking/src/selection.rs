//! Selection state.
//!
//! The customer's in-progress choice: a set of seats for seated events or a
//! ticket quantity for general admission. Every mutation is validated against
//! the remaining capacity before it is applied, so `units() <= remaining()`
//! holds after every successful call. Rejected changes leave the state as it was.

use crate::availability::{
    Availability, BookedSnapshot, CapacityMode, Unavailability, resolve_availability,
    validate_selection,
};
use crate::error::SelectionError;
use crate::pricing::{price_of, total_for_quantity};
use crate::service::Allocation;
use crate::types::{Money, SeatCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A seat in the selection, with its price and category as of selection time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSeat {
    /// Seat code
    pub code: SeatCode,
    /// Category name
    pub category: String,
    /// Seat price
    pub price: Money,
}

/// Display status of a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatStatus {
    /// Free to select
    Available,
    /// Withheld by the organizer
    Blocked,
    /// In this customer's selection
    SelectedLocally,
    /// Sold to someone else
    BookedRemotely,
}

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatToggle {
    /// The seat was added
    Selected,
    /// The seat was removed
    Deselected,
}

/// Changes made while applying a fresh snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotApplied {
    /// Selected seats that turned out to be unavailable and were dropped
    pub purged: Vec<SeatCode>,
    /// New quantity when the old one no longer fit
    pub quantity_reduced_to: Option<u32>,
}

impl SnapshotApplied {
    /// Whether the selection changed
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.purged.is_empty() || self.quantity_reduced_to.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Picked {
    Seats(BTreeMap<SeatCode, SelectedSeat>),
    Quantity(u32),
}

/// The customer's selection for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    mode: CapacityMode,
    base_price: Money,
    availability: Availability,
    loaded: bool,
    picked: Picked,
}

impl SelectionState {
    /// Empty selection; availability counts only organizer-blocked seats
    /// until a snapshot is applied
    #[must_use]
    pub fn new(mode: CapacityMode, base_price: Money) -> Self {
        let (snapshot, picked) = if mode.is_seated() {
            (BookedSnapshot::Seats(std::collections::BTreeSet::new()), Picked::Seats(BTreeMap::new()))
        } else {
            (BookedSnapshot::empty_count(), Picked::Quantity(0))
        };
        let availability = resolve_availability(&mode, &snapshot);
        Self {
            mode,
            base_price,
            availability,
            loaded: false,
            picked,
        }
    }

    /// The capacity mode
    #[must_use]
    pub const fn mode(&self) -> &CapacityMode {
        &self.mode
    }

    /// Base price used for derived prices
    #[must_use]
    pub const fn base_price(&self) -> Money {
        self.base_price
    }

    /// Current availability
    #[must_use]
    pub const fn availability(&self) -> &Availability {
        &self.availability
    }

    /// Units still for sale
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.availability.remaining
    }

    /// Whether an authoritative snapshot has been applied
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Selected seats or tickets
    #[must_use]
    pub fn units(&self) -> u32 {
        match &self.picked {
            Picked::Seats(seats) => u32::try_from(seats.len()).unwrap_or(u32::MAX),
            Picked::Quantity(quantity) => *quantity,
        }
    }

    /// Whether nothing is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units() == 0
    }

    /// Ticket quantity (general admission); `None` for seated events
    #[must_use]
    pub const fn quantity(&self) -> Option<u32> {
        match &self.picked {
            Picked::Quantity(quantity) => Some(*quantity),
            Picked::Seats(_) => None,
        }
    }

    /// Selected seats in code order (empty for general admission)
    pub fn selected_seats(&self) -> impl Iterator<Item = &SelectedSeat> {
        let seats = match &self.picked {
            Picked::Seats(seats) => Some(seats.values()),
            Picked::Quantity(_) => None,
        };
        seats.into_iter().flatten()
    }

    /// Selected seat codes in code order
    #[must_use]
    pub fn seat_codes(&self) -> Vec<SeatCode> {
        self.selected_seats().map(|seat| seat.code.clone()).collect()
    }

    /// Sum of seat prices, or `base × quantity`
    #[must_use]
    pub fn total(&self) -> Money {
        match &self.picked {
            Picked::Seats(seats) => seats.values().map(|seat| seat.price).sum(),
            Picked::Quantity(quantity) => total_for_quantity(self.base_price, *quantity),
        }
    }

    /// What would be requested from the booking service
    #[must_use]
    pub fn allocation(&self) -> Option<Allocation> {
        if self.is_empty() {
            return None;
        }
        Some(match &self.picked {
            Picked::Seats(_) => Allocation::Seats(self.seat_codes()),
            Picked::Quantity(quantity) => Allocation::Quantity(*quantity),
        })
    }

    /// Display status of a seat; `None` when the code is not in the layout
    /// or the event is not seated
    #[must_use]
    pub fn seat_status(&self, code: &SeatCode) -> Option<SeatStatus> {
        let CapacityMode::Seated { layout, .. } = &self.mode else {
            return None;
        };
        if !layout.contains(code) {
            return None;
        }
        if let Picked::Seats(seats) = &self.picked {
            if seats.contains_key(code) {
                return Some(SeatStatus::SelectedLocally);
            }
        }
        Some(match self.availability.unavailable.get(code) {
            Some(Unavailability::Blocked) => SeatStatus::Blocked,
            Some(Unavailability::BookedRemotely) => SeatStatus::BookedRemotely,
            None => SeatStatus::Available,
        })
    }

    /// Adds a seat if absent, removes it if present
    ///
    /// # Errors
    ///
    /// - [`SelectionError::NotSeated`] for general-admission events
    /// - [`SelectionError::UnknownSeat`] when the code is not in the layout
    /// - [`SelectionError::SeatUnavailable`] for blocked or booked seats
    /// - [`SelectionError::ExceedsCapacity`] when one more seat would not fit
    pub fn toggle_seat(&mut self, code: &SeatCode) -> Result<SeatToggle, SelectionError> {
        let CapacityMode::Seated { layout, .. } = &self.mode else {
            return Err(SelectionError::NotSeated);
        };
        let Picked::Seats(seats) = &mut self.picked else {
            return Err(SelectionError::NotSeated);
        };

        if seats.remove(code).is_some() {
            return Ok(SeatToggle::Deselected);
        }

        let Some(seat) = layout.seat(code) else {
            return Err(SelectionError::UnknownSeat(code.clone()));
        };
        if self.availability.unavailable.contains_key(code) {
            return Err(SelectionError::SeatUnavailable(code.clone()));
        }
        let proposed = u32::try_from(seats.len()).unwrap_or(u32::MAX).saturating_add(1);
        validate_selection(proposed, self.availability.remaining)?;

        seats.insert(
            code.clone(),
            SelectedSeat {
                code: code.clone(),
                category: seat.category.name.clone(),
                price: price_of(self.base_price, &seat),
            },
        );
        Ok(SeatToggle::Selected)
    }

    /// Sets the ticket quantity
    ///
    /// Values outside `1..=remaining` are rejected, never clamped.
    ///
    /// # Errors
    ///
    /// - [`SelectionError::NotGeneralAdmission`] for seated events
    /// - [`SelectionError::ZeroQuantity`] for zero
    /// - [`SelectionError::ExceedsCapacity`] above the remaining capacity
    pub fn set_quantity(&mut self, quantity: u32) -> Result<(), SelectionError> {
        let Picked::Quantity(current) = &mut self.picked else {
            return Err(SelectionError::NotGeneralAdmission);
        };
        if quantity == 0 {
            return Err(SelectionError::ZeroQuantity);
        }
        validate_selection(quantity, self.availability.remaining)?;
        *current = quantity;
        Ok(())
    }

    /// Empties the selection
    pub fn clear(&mut self) {
        match &mut self.picked {
            Picked::Seats(seats) => seats.clear(),
            Picked::Quantity(quantity) => *quantity = 0,
        }
    }

    /// Applies an authoritative booked snapshot
    ///
    /// Seats that became unavailable are dropped. A quantity above the new
    /// remaining capacity is lowered to it. The first snapshot that shows
    /// capacity on a general-admission event defaults the quantity to one.
    pub fn apply_snapshot(&mut self, snapshot: &BookedSnapshot) -> SnapshotApplied {
        self.availability = resolve_availability(&self.mode, snapshot);
        let first_load = !self.loaded;
        self.loaded = true;

        let remaining = self.availability.remaining;
        let mut applied = SnapshotApplied::default();

        match &mut self.picked {
            Picked::Seats(seats) => {
                let unavailable = &self.availability.unavailable;
                seats.retain(|code, _| {
                    let keep = !unavailable.contains_key(code);
                    if !keep {
                        applied.purged.push(code.clone());
                    }
                    keep
                });
                // A bare count on a seated event carries no seat codes, so
                // trim from the back of the row order to restore the invariant.
                while u32::try_from(seats.len()).unwrap_or(u32::MAX) > remaining {
                    let Some((code, _)) = seats.pop_last() else {
                        break;
                    };
                    applied.purged.push(code);
                }
            },
            Picked::Quantity(quantity) => {
                if *quantity > remaining {
                    *quantity = remaining;
                    applied.quantity_reduced_to = Some(remaining);
                } else if first_load && *quantity == 0 && remaining > 0 {
                    *quantity = 1;
                }
            },
        }

        if applied.changed() {
            tracing::info!(
                purged = ?applied.purged,
                quantity = ?applied.quantity_reduced_to,
                remaining,
                "Selection adjusted to fresh availability"
            );
        }
        applied
    }
}
