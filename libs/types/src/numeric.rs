//! Fixed-point price representation
//!
//! Prices are carried as `i64` raw units with 8 decimal places. Conversion
//! from decimal input floors to the 8th place; USD display rounds to 6.
//! Uses rust_decimal so no float ever touches the raw value.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::PriceError;

/// Number of decimal places in a raw price.
pub const PRICE_DECIMALS: u32 = 8;

/// Raw units per whole USD.
pub const PRICE_SCALE: i64 = 100_000_000;

/// Decimal places in the human-readable USD rendering.
pub const USD_DISPLAY_DECIMALS: u32 = 6;

/// A price in fixed-point raw units (1 USD = 10^8 units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedPrice(i64);

impl FixedPrice {
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    /// Convert a decimal USD price, flooring to 8 decimal places.
    pub fn from_decimal(usd: Decimal) -> Result<Self, PriceError> {
        if usd.is_sign_negative() && !usd.is_zero() {
            return Err(PriceError::Negative(usd.to_string()));
        }
        let raw = usd
            .checked_mul(Decimal::from(PRICE_SCALE))
            .map(|scaled| scaled.floor())
            .and_then(|scaled| scaled.to_i64())
            .ok_or_else(|| PriceError::OutOfRange(usd.to_string()))?;
        Ok(Self(raw))
    }

    /// Exact decimal USD value.
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.0, PRICE_DECIMALS)
    }

    /// USD rendering with 6 decimals, e.g. `"42.123457"`.
    pub fn usd_string(&self) -> String {
        let rounded = self
            .as_decimal()
            .round_dp_with_strategy(USD_DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.6}", rounded)
    }
}

impl fmt::Display for FixedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
