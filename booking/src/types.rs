//! Domain value types for seat booking.
//!
//! Identifiers, money, seat codes and category multipliers. Everything here is a
//! small `Copy`/`Clone` value with no behavior beyond construction and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a bookable event
    EventId
);

uuid_id!(
    /// Unique identifier for a customer
    CustomerId
);

uuid_id!(
    /// Identifier the booking service assigns to a confirmed booking
    BookingId
);

// ============================================================================
// Money Value Object (minor units to avoid floating point errors)
// ============================================================================

/// An amount in the currency's minor unit (paise, cents)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates a `Money` value from whole major units, saturating on overflow
    #[must_use]
    pub const fn from_major(major: u64) -> Self {
        Self(major.saturating_mul(100))
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts, saturating on overflow
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Multiplies by a quantity, saturating on overflow
    #[must_use]
    pub const fn saturating_mul(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Scales by a rate in basis points, rounding half up to the minor unit
    #[must_use]
    pub fn scale_bps(self, bps: u32) -> Self {
        let scaled = (u128::from(self.0) * u128::from(bps) + 5_000) / 10_000;
        Self(u64::try_from(scaled).unwrap_or(u64::MAX))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// A price as presented to the customer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceTag {
    /// No charge
    Free,
    /// A positive amount
    Amount(Money),
}

impl From<Money> for PriceTag {
    fn from(money: Money) -> Self {
        if money.is_zero() {
            Self::Free
        } else {
            Self::Amount(money)
        }
    }
}

impl fmt::Display for PriceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Amount(money) => write!(f, "{money}"),
        }
    }
}

// ============================================================================
// Seats
// ============================================================================

/// Seat code: row label followed by the 1-based column (`"A5"`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatCode(String);

impl SeatCode {
    /// Builds the code for `row` and 1-based `column`
    #[must_use]
    pub fn new(row: &str, column: u32) -> Self {
        Self(format!("{row}{column}"))
    }

    /// The code as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SeatCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for SeatCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for SeatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Price multiplier for a seat category, in basis points (`1.5` is `15_000`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Multiplier(u32);

impl Multiplier {
    /// The neutral multiplier (1.0)
    pub const ONE: Self = Self(10_000);

    /// Creates a multiplier from basis points; zero is rejected
    #[must_use]
    pub const fn from_bps(bps: u32) -> Option<Self> {
        if bps == 0 { None } else { Some(Self(bps)) }
    }

    /// Converts a decimal factor, rounding to the nearest basis point
    ///
    /// Returns `None` for non-finite, non-positive, or out-of-range factors.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_factor(factor: f64) -> Option<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return None;
        }
        let bps = (factor * 10_000.0).round();
        if bps < 1.0 || bps > f64::from(u32::MAX) {
            return None;
        }
        Self::from_bps(bps as u32)
    }

    /// Basis points
    #[must_use]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 10_000;
        let frac = self.0 % 10_000;
        if frac == 0 {
            write!(f, "×{whole}")
        } else {
            let digits = format!("{frac:04}");
            write!(f, "×{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}
