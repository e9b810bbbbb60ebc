//! TWAP Settlement Oracle
//!
//! Consumes an upstream mid-price stream and produces:
//! - A sampled live price feed
//! - Per-interval snapshot buckets on a fixed wall-clock grid
//! - One time-weighted average price per closed interval, settled once
//! - A settlement feed and a query API over live and settled values
//!
//! # Architecture
//!
//! ```text
//!   upstream allMids (WS)
//!          │
//!   ┌──────▼───────┐
//!   │FeedSupervisor│  ← reconnects, normalizes to PriceTick
//!   └──────┬───────┘
//!          │ watch: CurrentPrice
//!   ┌──────▼───────┐        broadcast
//!   │ PriceSampler │ ─────────────────────▶ /ws/prices
//!   └──────┬───────┘
//!          │ record_snapshot
//!   ┌──────▼───────┐   ┌──────────────┐
//!   │   Bucketer   │◀──│  Retention   │
//!   └──────┬───────┘   └──────────────┘
//!          │ compute (once)
//!   ┌──────▼───────┐   ┌──────────────┐     broadcast
//!   │ Finalization │◀──│  Scheduler   │ ─────────────▶ /ws/settlements
//!   └──────┬───────┘   └──────────────┘
//!          │
//!   GET /api/twap/:interval_id
//! ```

pub mod app;
pub mod bucketer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod feed;
pub mod finalization;
pub mod handlers;
pub mod metrics;
pub mod retention;
pub mod router;
pub mod sampler;
pub mod scheduler;
pub mod state;
pub mod twap;
pub mod websocket;

// Library version
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
