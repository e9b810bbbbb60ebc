//! Error types shared across the oracle
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Price conversion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    #[error("Negative price: {0}")]
    Negative(String),

    #[error("Price out of fixed-point range: {0}")]
    OutOfRange(String),

    #[error("Invalid price: {0}")]
    Invalid(String),
}

/// Configuration errors, rejected once at startup (never per tick)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid interval width: {seconds}s (must be > 0 and fit in milliseconds)")]
    InvalidIntervalWidth { seconds: i64 },

    #[error("Invalid sample period: {millis}ms (must be > 0)")]
    InvalidSamplePeriod { millis: u64 },

    #[error("Invalid retention horizon: {seconds}s (must be >= 0)")]
    InvalidRetentionHorizon { seconds: i64 },

    #[error("Invalid retention sweep period: {seconds}s (must be > 0)")]
    InvalidSweepPeriod { seconds: u64 },

    #[error("Invalid upstream URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid asset symbol: {0:?}")]
    InvalidSymbol(String),
}
