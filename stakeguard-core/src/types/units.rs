//! Coin units
//!
//! The base unit has six decimal places: 1 coin = 1,000,000 base units and
//! 1 cent = 10,000 base units. Coin-age arithmetic is expressed in these
//! units, so the constants are consensus values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base units in one coin
pub const COIN: u64 = 1_000_000;

/// Base units in one cent
pub const CENT: u64 = 10_000;

/// Seconds in one coin-day
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// An amount in base units
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount
    pub const ZERO: Self = Self(0);

    /// Create an amount from base units
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Create an amount from whole coins, saturating on overflow
    pub const fn from_coins(coins: u64) -> Self {
        Self(coins.saturating_mul(COIN))
    }

    /// Amount in base units
    pub const fn as_units(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / COIN, self.0 % COIN)
    }
}
