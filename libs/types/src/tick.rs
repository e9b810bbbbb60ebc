//! Normalized price ticks
//!
//! A `PriceTick` is the unit passed from the upstream feed into the
//! aggregation core and out to live-feed consumers unchanged.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::PriceError;
use crate::numeric::FixedPrice;

/// One observed price, immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Fixed-point price, 8 decimal places.
    pub price_raw: i64,
    /// Same price as a float, for display consumers.
    pub price_usd: f64,
    /// Unix seconds at which the tick was observed.
    pub timestamp: i64,
}

impl PriceTick {
    /// Normalize a decimal mid price observed at `timestamp`.
    pub fn from_mid(mid: Decimal, timestamp: i64) -> Result<Self, PriceError> {
        let price = FixedPrice::from_decimal(mid)?;
        let price_usd = mid
            .to_f64()
            .ok_or_else(|| PriceError::Invalid(mid.to_string()))?;
        Ok(Self {
            price_raw: price.raw(),
            price_usd,
            timestamp,
        })
    }

    pub fn price(&self) -> FixedPrice {
        FixedPrice::from_raw(self.price_raw)
    }
}
