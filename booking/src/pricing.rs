//! Pricing engine.
//!
//! Prices are pure functions of the base price and the seat's category
//! multiplier, computed in integer minor units and rounded half up. Nothing here
//! caches a price, so recomputing always gives the same answer.

use crate::layout::{Category, Seat, SeatLayout};
use crate::types::{Money, Multiplier, PriceTag};
use serde::{Deserialize, Serialize};

/// Fee added on top of the ticket subtotal, in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFee {
    bps: u32,
}

impl BookingFee {
    /// 9.5%
    pub const DEFAULT_BPS: u32 = 950;

    /// Creates a fee of `bps` basis points
    #[must_use]
    pub const fn from_bps(bps: u32) -> Self {
        Self { bps }
    }

    /// No fee
    #[must_use]
    pub const fn none() -> Self {
        Self { bps: 0 }
    }

    /// Fee rate in basis points
    #[must_use]
    pub const fn bps(&self) -> u32 {
        self.bps
    }

    /// Fee for a subtotal, rounded half up
    #[must_use]
    pub fn apply(&self, subtotal: Money) -> Money {
        subtotal.scale_bps(self.bps)
    }
}

impl Default for BookingFee {
    fn default() -> Self {
        Self::from_bps(Self::DEFAULT_BPS)
    }
}

/// Base price scaled by a category multiplier
#[must_use]
pub fn price_for(base_price: Money, multiplier: Multiplier) -> Money {
    base_price.scale_bps(multiplier.bps())
}

/// Price of one seat
#[must_use]
pub fn price_of(base_price: Money, seat: &Seat) -> Money {
    price_for(base_price, seat.category.multiplier)
}

/// Total for a general-admission quantity
#[must_use]
pub fn total_for_quantity(base_price: Money, quantity: u32) -> Money {
    base_price.saturating_mul(quantity)
}

/// Subtotal, fee and grand total for a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Ticket prices summed
    pub subtotal: Money,
    /// Booking fee on the subtotal
    pub booking_fee: Money,
    /// `subtotal + booking_fee`
    pub grand_total: Money,
}

impl PriceBreakdown {
    /// Breaks a subtotal down with a fee
    #[must_use]
    pub fn new(subtotal: Money, fee: BookingFee) -> Self {
        let booking_fee = fee.apply(subtotal);
        Self {
            subtotal,
            booking_fee,
            grand_total: subtotal.saturating_add(booking_fee),
        }
    }

    /// The subtotal as shown to the customer
    #[must_use]
    pub fn subtotal_tag(&self) -> PriceTag {
        PriceTag::from(self.subtotal)
    }
}

/// One line of a seat-map legend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    /// Category
    pub category: Category,
    /// Price of a seat in that category
    pub price: PriceTag,
}

/// Legend for the declared categories, in declaration order
#[must_use]
pub fn legend(layout: &SeatLayout, base_price: Money) -> Vec<LegendEntry> {
    layout
        .categories()
        .iter()
        .map(|category| LegendEntry {
            category: category.clone(),
            price: PriceTag::from(price_for(base_price, category.multiplier)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SeatCode;
    use proptest::prelude::*;

    fn gold_layout() -> SeatLayout {
        SeatLayout::parse(
            r#"{"rows": ["A", "B"], "columns": 10,
                "categories": [{"label": "Gold", "rows": ["A"], "multiplier": 1.5}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_gold_row_costs_one_and_a_half() {
        let layout = gold_layout();
        let base = Money::from_major(100);

        let a1 = layout.seat(&SeatCode::from("A1")).unwrap();
        let b1 = layout.seat(&SeatCode::from("B1")).unwrap();

        assert_eq!(price_of(base, &a1), Money::from_major(150));
        assert_eq!(price_of(base, &b1), Money::from_major(100));
    }

    #[test]
    fn test_rounding_to_minor_unit() {
        let third = Multiplier::from_factor(1.3333).unwrap();
        // 99 * 1.3333 = 131.9967 -> 132
        assert_eq!(price_for(Money::from_minor(99), third), Money::from_minor(132));
    }

    #[test]
    fn test_free_event_prices_are_free() {
        let layout = gold_layout();
        let entries = legend(&layout, Money::ZERO);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].price, PriceTag::Free);
        assert_eq!(total_for_quantity(Money::ZERO, 4), Money::ZERO);
    }

    #[test]
    fn test_breakdown_applies_fee() {
        let breakdown = PriceBreakdown::new(Money::from_major(200), BookingFee::default());
        assert_eq!(breakdown.booking_fee, Money::from_major(19));
        assert_eq!(breakdown.grand_total, Money::from_major(219));

        let none = PriceBreakdown::new(Money::from_major(200), BookingFee::none());
        assert_eq!(none.grand_total, Money::from_major(200));
    }

    #[test]
    fn test_legend_lists_declared_categories() {
        let entries = legend(&gold_layout(), Money::from_major(100));
        assert_eq!(entries[0].category.name, "Gold");
        assert_eq!(entries[0].price, PriceTag::Amount(Money::from_major(150)));
    }

    proptest! {
        #[test]
        fn prop_price_is_deterministic(base in 0u64..10_000_000, bps in 1u32..100_000) {
            let multiplier = Multiplier::from_bps(bps).unwrap();
            prop_assert_eq!(
                price_for(Money::from_minor(base), multiplier),
                price_for(Money::from_minor(base), multiplier)
            );
        }

        #[test]
        fn prop_price_within_half_minor_unit(base in 0u64..10_000_000, bps in 1u32..100_000) {
            let multiplier = Multiplier::from_bps(bps).unwrap();
            let price = price_for(Money::from_minor(base), multiplier).minor();
            let exact = u128::from(base) * u128::from(bps);
            // |price * 10000 - exact| <= 5000
            let scaled = u128::from(price) * 10_000;
            prop_assert!(scaled.abs_diff(exact) <= 5_000);
        }
    }
}
