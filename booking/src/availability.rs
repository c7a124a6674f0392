//! Availability resolver.
//!
//! Turns an event's capacity mode and the booking service's booked snapshot
//! into remaining capacity and the set of seats that cannot be selected.
//! Remaining capacity is floored at zero; zero is the sold-out state, not an error.

use crate::descriptor::EventDescriptor;
use crate::error::{LayoutParseError, SelectionError};
use crate::layout::SeatLayout;
use crate::types::SeatCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// How an event sells its capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityMode {
    /// Customers pick individual seats from a layout
    Seated {
        /// The validated layout
        layout: Arc<SeatLayout>,
        /// Organizer-withheld seats that exist in the layout
        blocked: BTreeSet<SeatCode>,
    },
    /// Customers pick a ticket quantity
    GeneralAdmission {
        /// Declared capacity
        total: u32,
    },
}

/// Result of deciding an event's capacity mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCapacity {
    /// The mode the session will use
    pub mode: CapacityMode,
    /// Why a seat-requiring event fell back to general admission
    pub diagnostic: Option<LayoutParseError>,
}

impl CapacityMode {
    /// Decides the mode for an event
    ///
    /// Seated only when the event requires seats *and* carries a non-empty
    /// layout that parses. A layout that fails to parse falls back to general
    /// admission with the declared capacity and reports why.
    #[must_use]
    pub fn resolve(event: &EventDescriptor) -> ResolvedCapacity {
        let general = Self::GeneralAdmission {
            total: event.total_capacity,
        };
        if !event.requires_seat {
            return ResolvedCapacity {
                mode: general,
                diagnostic: None,
            };
        }
        let Some(text) = event.layout_text() else {
            return ResolvedCapacity {
                mode: general,
                diagnostic: None,
            };
        };

        match SeatLayout::parse(text) {
            Ok(layout) => {
                let mut blocked = BTreeSet::new();
                for code in &event.blocked_seats {
                    if layout.contains(code) {
                        blocked.insert(code.clone());
                    } else {
                        tracing::warn!(event_id = %event.id, seat = %code, "Blocked seat is not in the layout");
                    }
                }
                ResolvedCapacity {
                    mode: Self::Seated {
                        layout: Arc::new(layout),
                        blocked,
                    },
                    diagnostic: None,
                }
            },
            Err(error) => {
                tracing::warn!(
                    event_id = %event.id,
                    %error,
                    total_capacity = event.total_capacity,
                    "Seat layout unusable, falling back to general admission"
                );
                ResolvedCapacity {
                    mode: general,
                    diagnostic: Some(error),
                }
            },
        }
    }

    /// Whether customers pick seats
    #[must_use]
    pub const fn is_seated(&self) -> bool {
        matches!(self, Self::Seated { .. })
    }

    /// Sellable units before anything is booked or blocked
    #[must_use]
    pub fn capacity(&self) -> u32 {
        match self {
            Self::Seated { layout, .. } => layout.total_seats(),
            Self::GeneralAdmission { total } => *total,
        }
    }
}

/// What the booking service reports as already sold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookedSnapshot {
    /// Booked seat codes (seated events)
    Seats(BTreeSet<SeatCode>),
    /// Booked ticket count (general admission)
    Count(u32),
}

impl BookedSnapshot {
    /// Nothing booked yet
    #[must_use]
    pub const fn empty_count() -> Self {
        Self::Count(0)
    }

    /// Number of units booked
    #[must_use]
    pub fn booked_count(&self) -> u32 {
        match self {
            Self::Seats(codes) => u32::try_from(codes.len()).unwrap_or(u32::MAX),
            Self::Count(count) => *count,
        }
    }
}

/// Why a seat cannot be selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unavailability {
    /// Withheld by the organizer
    Blocked,
    /// Sold to another customer
    BookedRemotely,
}

/// Remaining capacity plus the seats that cannot be selected
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Availability {
    /// Units still for sale
    pub remaining: u32,
    /// Seats that cannot be selected, with the reason (empty for general admission)
    pub unavailable: BTreeMap<SeatCode, Unavailability>,
}

/// Computes remaining capacity for a mode and snapshot
///
/// Seated: `rows × columns − |blocked ∪ booked|`, counting only codes that
/// exist in the layout. A bare booked count on a seated event is subtracted
/// on top of the blocked seats. General admission: `total − booked`.
/// Both floor at zero.
#[must_use]
pub fn resolve_availability(mode: &CapacityMode, snapshot: &BookedSnapshot) -> Availability {
    match mode {
        CapacityMode::Seated { layout, blocked } => {
            let mut unavailable: BTreeMap<SeatCode, Unavailability> = blocked
                .iter()
                .map(|code| (code.clone(), Unavailability::Blocked))
                .collect();

            let mut extra_booked = 0u32;
            match snapshot {
                BookedSnapshot::Seats(codes) => {
                    for code in codes {
                        if layout.contains(code) {
                            unavailable
                                .entry(code.clone())
                                .or_insert(Unavailability::BookedRemotely);
                        } else {
                            tracing::debug!(seat = %code, "Booked seat is not in the layout, ignoring");
                        }
                    }
                },
                BookedSnapshot::Count(count) => extra_booked = *count,
            }

            let taken = u32::try_from(unavailable.len())
                .unwrap_or(u32::MAX)
                .saturating_add(extra_booked);
            Availability {
                remaining: layout.total_seats().saturating_sub(taken),
                unavailable,
            }
        },
        CapacityMode::GeneralAdmission { total } => Availability {
            remaining: total.saturating_sub(snapshot.booked_count()),
            unavailable: BTreeMap::new(),
        },
    }
}

/// Checks that a selection of `proposed` units fits in `remaining`
///
/// # Errors
///
/// Returns [`SelectionError::ExceedsCapacity`] when it does not.
pub const fn validate_selection(proposed: u32, remaining: u32) -> Result<(), SelectionError> {
    if proposed > remaining {
        Err(SelectionError::ExceedsCapacity {
            requested: proposed,
            remaining,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Money;
    use chrono::Utc;

    fn seated(layout: &str) -> EventDescriptor {
        EventDescriptor::new("Play", Money::from_major(100), Utc::now())
            .with_layout(layout)
            .with_capacity(40)
    }

    fn codes(list: &[&str]) -> BTreeSet<SeatCode> {
        list.iter().map(|c| SeatCode::from(*c)).collect()
    }

    #[test]
    fn test_seated_requires_flag_and_layout() {
        let event = seated(r#"{"rows": ["A", "B", "C"], "columns": 10}"#);
        let resolved = CapacityMode::resolve(&event);
        assert!(resolved.mode.is_seated());
        assert_eq!(resolved.mode.capacity(), 30);
        assert_eq!(resolved.diagnostic, None);

        let mut no_flag = event.clone();
        no_flag.requires_seat = false;
        assert_eq!(
            CapacityMode::resolve(&no_flag).mode,
            CapacityMode::GeneralAdmission { total: 40 }
        );

        let empty = seated("\"\"");
        let resolved = CapacityMode::resolve(&empty);
        assert_eq!(resolved.mode, CapacityMode::GeneralAdmission { total: 40 });
        assert_eq!(resolved.diagnostic, None);
    }

    #[test]
    fn test_malformed_layout_falls_back_with_diagnostic() {
        let resolved = CapacityMode::resolve(&seated(r#"{"rows": [], "columns": 3}"#));
        assert_eq!(resolved.mode, CapacityMode::GeneralAdmission { total: 40 });
        assert_eq!(resolved.diagnostic, Some(LayoutParseError::NoRows));
    }

    #[test]
    fn test_seated_remaining_subtracts_booked_codes() {
        let mode = CapacityMode::resolve(&seated(r#"{"rows": ["A", "B", "C"], "columns": 10}"#)).mode;
        let availability = resolve_availability(&mode, &BookedSnapshot::Seats(codes(&["A1", "A2", "B5"])));
        assert_eq!(availability.remaining, 27);
        assert_eq!(
            availability.unavailable.get(&SeatCode::from("B5")),
            Some(&Unavailability::BookedRemotely)
        );
    }

    #[test]
    fn test_blocked_and_booked_merge_without_double_counting() {
        let event = seated(r#"{"rows": ["A"], "columns": 4}"#).with_blocked_seats(["A1", "A2", "Z9"]);
        let mode = CapacityMode::resolve(&event).mode;

        let availability = resolve_availability(&mode, &BookedSnapshot::Seats(codes(&["A2", "A3", "Q1"])));
        assert_eq!(availability.remaining, 1);
        assert_eq!(
            availability.unavailable.get(&SeatCode::from("A2")),
            Some(&Unavailability::Blocked)
        );
        assert_eq!(availability.unavailable.len(), 3);
    }

    #[test]
    fn test_general_admission_floors_at_zero() {
        let mode = CapacityMode::GeneralAdmission { total: 5 };
        assert_eq!(resolve_availability(&mode, &BookedSnapshot::Count(2)).remaining, 3);
        assert_eq!(resolve_availability(&mode, &BookedSnapshot::Count(9)).remaining, 0);
        assert_eq!(
            resolve_availability(&mode, &BookedSnapshot::empty_count()).remaining,
            5
        );
    }

    #[test]
    fn test_validate_selection() {
        assert_eq!(validate_selection(3, 3), Ok(()));
        assert_eq!(
            validate_selection(4, 3),
            Err(SelectionError::ExceedsCapacity {
                requested: 4,
                remaining: 3
            })
        );
    }
}
