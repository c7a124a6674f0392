//! Read-only event description consumed from the catalog.

use crate::types::{EventId, Money, SeatCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the booking engine needs to know about an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    /// Event identity
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Price of a Basic seat or a general-admission ticket
    pub base_price: Money,
    /// Organizer wants assigned seating
    #[serde(default)]
    pub requires_seat: bool,
    /// Layout JSON; the catalog sends `null`, `""` or `"\"\""` when there is none
    #[serde(default)]
    pub seat_layout: Option<String>,
    /// Seats the organizer withheld from sale
    #[serde(default)]
    pub blocked_seats: Vec<SeatCode>,
    /// Capacity for general admission
    #[serde(default)]
    pub total_capacity: u32,
    /// Event location, used as the venue when no venue list is given
    #[serde(default)]
    pub location: String,
    /// Venues the event runs at
    #[serde(default)]
    pub venues: Vec<String>,
    /// First performance
    pub starts_at: DateTime<Utc>,
    /// End of the run, for multi-day events
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl EventDescriptor {
    /// A general-admission event with no capacity yet; chain the `with_*` setters
    #[must_use]
    pub fn new(name: impl Into<String>, base_price: Money, starts_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            name: name.into(),
            base_price,
            requires_seat: false,
            seat_layout: None,
            blocked_seats: Vec::new(),
            total_capacity: 0,
            location: String::new(),
            venues: Vec::new(),
            starts_at,
            ends_at: None,
        }
    }

    /// Sets the identity
    #[must_use]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    /// Assigned seating with the given layout JSON
    #[must_use]
    pub fn with_layout(mut self, layout_json: impl Into<String>) -> Self {
        self.requires_seat = true;
        self.seat_layout = Some(layout_json.into());
        self
    }

    /// Organizer-blocked seats
    #[must_use]
    pub fn with_blocked_seats<I, S>(mut self, seats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SeatCode>,
    {
        self.blocked_seats = seats.into_iter().map(Into::into).collect();
        self
    }

    /// General-admission capacity
    #[must_use]
    pub fn with_capacity(mut self, total: u32) -> Self {
        self.total_capacity = total;
        self
    }

    /// Event location
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Venue list
    #[must_use]
    pub fn with_venues<I, S>(mut self, venues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.venues = venues.into_iter().map(Into::into).collect();
        self
    }

    /// End of a multi-day run
    #[must_use]
    pub fn with_end(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    /// The layout text, if it carries anything
    #[must_use]
    pub fn layout_text(&self) -> Option<&str> {
        let text = self.seat_layout.as_deref()?.trim();
        if text.is_empty() || text == "\"\"" || text == "null" {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T19:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_layout_text_treats_blank_forms_as_absent() {
        let event = EventDescriptor::new("Gig", Money::ZERO, start());
        assert_eq!(event.layout_text(), None);
        assert_eq!(event.clone().with_layout("").layout_text(), None);
        assert_eq!(event.clone().with_layout("\"\"").layout_text(), None);
        assert_eq!(
            event.with_layout(r#" {"rows":["A"],"columns":1} "#).layout_text(),
            Some(r#"{"rows":["A"],"columns":1}"#)
        );
    }

    #[test]
    fn test_deserializes_catalog_json() {
        let json = r#"{
            "id": "6f1b7b8e-7d0c-4b51-9a43-2f1d3c9d0a11",
            "name": "Symphony",
            "basePrice": 50000,
            "requiresSeat": true,
            "seatLayout": "{\"rows\":[\"A\"],\"columns\":4}",
            "blockedSeats": ["A2"],
            "location": "Town Hall",
            "startsAt": "2025-03-01T19:30:00Z"
        }"#;
        let event: EventDescriptor = serde_json::from_str(json).unwrap();
        assert!(event.requires_seat);
        assert_eq!(event.base_price, Money::from_major(500));
        assert_eq!(event.blocked_seats, vec![SeatCode::from("A2")]);
        assert!(event.venues.is_empty());
        assert_eq!(event.ends_at, None);
    }
}
