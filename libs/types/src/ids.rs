//! Grid interval identifiers
//!
//! Time is partitioned into contiguous, non-overlapping half-open intervals
//! `[start, start + width)`. An interval is identified by its grid-aligned
//! start second, so the id is a pure function of the timestamp.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ConfigError;

/// Width of one grid interval in whole seconds.
///
/// Always strictly positive; a zero or negative width is a configuration
/// error and can only be rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IntervalWidth(i64);

impl IntervalWidth {
    /// Largest width whose millisecond form still fits in an `i64`.
    pub const MAX_SECS: i64 = i64::MAX / 1000;

    /// Validate and wrap a width in seconds.
    pub fn from_secs(seconds: i64) -> Result<Self, ConfigError> {
        if seconds <= 0 || seconds > Self::MAX_SECS {
            return Err(ConfigError::InvalidIntervalWidth { seconds });
        }
        Ok(Self(seconds))
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0 * 1000
    }
}

impl fmt::Display for IntervalWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Identifier of a grid interval: its aligned start time in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalId(i64);

impl IntervalId {
    /// The interval containing `timestamp`: `floor(timestamp / width) * width`.
    ///
    /// Uses floor division so pre-epoch timestamps land in the interval
    /// below them rather than being truncated toward zero.
    pub fn containing(timestamp: i64, width: IntervalWidth) -> Self {
        let w = width.as_secs();
        Self(timestamp.div_euclid(w) * w)
    }

    /// Wrap a raw start second (e.g. parsed from a query path).
    ///
    /// No alignment check: an unaligned id simply never matches a bucket.
    pub const fn from_start(start: i64) -> Self {
        Self(start)
    }

    /// Inclusive start second.
    pub fn start(&self) -> i64 {
        self.0
    }

    /// Exclusive end second.
    pub fn end(&self, width: IntervalWidth) -> i64 {
        self.0 + width.as_secs()
    }

    /// The interval immediately before this one.
    pub fn previous(&self, width: IntervalWidth) -> Self {
        Self(self.0 - width.as_secs())
    }

    /// Whether `timestamp` falls inside `[start, end)`.
    pub fn contains(&self, timestamp: i64, width: IntervalWidth) -> bool {
        timestamp >= self.0 && timestamp < self.end(width)
    }
}

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
