//! Outbound event definitions for the TWAP oracle
//!
//! `Settlement` is the domain event emitted once per settled interval.
//! `FeedMessage` is the tagged wire envelope sent to WebSocket consumers;
//! price ticks are forwarded untagged as the raw `PriceTick` object.

use oracle_types::ids::IntervalId;
use oracle_types::numeric::FixedPrice;
use serde::{Deserialize, Serialize};

use crate::bucketer::Bucket;

/// A finalized interval, published at most once per interval id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub interval_id: IntervalId,
    pub twap: FixedPrice,
    /// Unix seconds at which the settlement was emitted.
    pub emitted_at: i64,
}

impl Settlement {
    pub fn to_message(&self) -> FeedMessage {
        FeedMessage::Settlement {
            timeperiod_id: self.interval_id.to_string(),
            price: self.twap.to_string(),
            price_usd: self.twap.usd_string(),
            timestamp: self.emitted_at,
        }
    }
}

/// Tagged messages written to feed subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Greeting sent once when a client connects.
    Connected { message: String, timestamp: i64 },

    /// A settled interval. Numbers are rendered as strings so consumers
    /// never round-trip the fixed-point value through a float.
    Settlement {
        timeperiod_id: String,
        price: String,
        price_usd: String,
        timestamp: i64,
    },
}

impl FeedMessage {
    pub fn connected(message: impl Into<String>, timestamp: i64) -> Self {
        FeedMessage::Connected {
            message: message.into(),
            timestamp,
        }
    }

    /// Get the message type as a string label for logging.
    pub fn type_label(&self) -> &'static str {
        match self {
            FeedMessage::Connected { .. } => "connected",
            FeedMessage::Settlement { .. } => "settlement",
        }
    }
}

/// Result of a TWAP query for one interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapReport {
    pub timeperiod_id: IntervalId,
    pub twap: i64,
    pub twap_usd: String,
    /// Whether `twap` is the settled value or a live computation.
    pub finalized: bool,
    /// Current bucket contents; absent once retention has evicted them.
    pub history: Option<Bucket>,
}
