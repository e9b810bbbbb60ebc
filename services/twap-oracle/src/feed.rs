//! Upstream price feed supervisor
//!
//! Owns the WebSocket connection to the upstream `allMids` stream and turns
//! each mid for the configured coin into a `PriceTick`. The rest of the
//! service only ever sees two `watch` receivers: the latest tick and the
//! connection state.
//!
//! ```text
//! Disconnected ──▶ Connecting ──▶ Connected
//!      ▲               │              │ close / error
//!      │               ▼              ▼
//!      └──────────  Backoff ◀─────────┘
//!                      │ attempts exhausted
//!                      ▼
//!                   GaveUp
//! ```
//!
//! A successful connect resets the attempt counter; consecutive failures
//! beyond `ReconnectPolicy::max_attempts` stop the supervisor.
//!
//! `CurrentPrice` is only `Some` while `Connected`. Any other state clears
//! it, so intervals without upstream data stay empty instead of being
//! filled with the last price seen.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use oracle_types::errors::PriceError;
use oracle_types::tick::PriceTick;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::clock::Clock;
use crate::metrics::ServiceMetrics;

/// Upstream channel carrying mid prices for every listed asset.
pub const ALL_MIDS_CHANNEL: &str = "allMids";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed {channel} payload: missing {field}")]
    MissingField { channel: String, field: &'static str },

    #[error("Unparsable mid for {coin}: {value}")]
    InvalidMid { coin: String, value: String },

    #[error("Price normalization failed: {0}")]
    Price(#[from] PriceError),

    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// Fixed-delay, bounded reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failures tolerated; `0` means never retry.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` once exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            None
        } else {
            Some(self.delay)
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: Url,
    /// Upper-case asset symbol, e.g. `HYPE`.
    pub coin: String,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

/// Connectivity as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    Backoff { attempt: u32, delay_ms: u64 },
    GaveUp,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Read side handed to the rest of the service.
#[derive(Clone)]
pub struct FeedHandle {
    pub price: watch::Receiver<Option<PriceTick>>,
    pub state: watch::Receiver<ConnectionState>,
}

impl FeedHandle {
    pub fn current_price(&self) -> Option<PriceTick> {
        *self.price.borrow()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

/// The subscribe request sent right after connecting.
pub fn subscribe_message() -> String {
    json!({
        "method": "subscribe",
        "subscription": { "type": ALL_MIDS_CHANNEL }
    })
    .to_string()
}

/// Extract `coin`'s mid from an upstream message.
///
/// Returns `Ok(None)` for messages on other channels or `allMids` updates
/// that do not list the coin; `Err` only for payloads that cannot be read.
pub fn parse_mid(text: &str, coin: &str) -> Result<Option<Decimal>, FeedError> {
    let v: Value = serde_json::from_str(text)?;
    let channel = v.get("channel").and_then(Value::as_str).unwrap_or("");
    if channel != ALL_MIDS_CHANNEL {
        return Ok(None);
    }

    let mids = v
        .get("data")
        .and_then(|d| d.get("mids"))
        .and_then(Value::as_object)
        .ok_or_else(|| FeedError::MissingField {
            channel: channel.to_string(),
            field: "data.mids",
        })?;

    let raw = match mids.get(coin) {
        Some(raw) => raw,
        None => return Ok(None),
    };

    let parsed = match raw {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };

    parsed.map(Some).ok_or_else(|| FeedError::InvalidMid {
        coin: coin.to_string(),
        value: raw.to_string(),
    })
}

pub struct FeedSupervisor {
    config: FeedConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<ServiceMetrics>,
    price_tx: watch::Sender<Option<PriceTick>>,
    state_tx: watch::Sender<ConnectionState>,
}

impl FeedSupervisor {
    pub fn new(
        config: FeedConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<ServiceMetrics>,
    ) -> (Self, FeedHandle) {
        let (price_tx, price) = watch::channel(None);
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let supervisor = Self {
            config,
            clock,
            metrics,
            price_tx,
            state_tx,
        };
        (supervisor, FeedHandle { price, state })
    }

    /// Connect, stream, and reconnect until shutdown or the policy gives up.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            url = %self.config.url,
            coin = %self.config.coin,
            max_attempts = self.config.reconnect.max_attempts,
            "Feed supervisor started"
        );

        let mut failures: u32 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting {
                attempt: failures + 1,
            });

            let outcome = tokio::select! {
                outcome = self.run_session(&mut failures) => outcome,
                _ = shutdown.changed() => break,
            };

            match outcome {
                Ok(()) => warn!("Upstream connection closed"),
                Err(e) => warn!(error = %e, "Upstream session failed"),
            }

            failures += 1;
            let Some(delay) = self.config.reconnect.next_delay(failures) else {
                error!(
                    attempts = failures - 1,
                    "Max reconnection attempts reached, giving up"
                );
                self.set_state(ConnectionState::GaveUp);
                return;
            };

            self.metrics.record_reconnect();
            info!(
                attempt = failures,
                max_attempts = self.config.reconnect.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to upstream"
            );
            self.set_state(ConnectionState::Backoff {
                attempt: failures,
                delay_ms: delay.as_millis() as u64,
            });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Feed supervisor stopped");
    }

    /// One connection lifetime. Resets `failures` once the subscription is sent.
    async fn run_session(&self, failures: &mut u32) -> Result<(), FeedError> {
        let timeout = self.config.connect_timeout;
        let (ws, _resp) =
            tokio::time::timeout(timeout, tokio_tungstenite::connect_async(self.config.url.as_str()))
                .await
                .map_err(|_| FeedError::ConnectTimeout(timeout))??;

        let (mut write, mut read) = ws.split();
        write.send(Message::Text(subscribe_message())).await?;

        *failures = 0;
        self.set_state(ConnectionState::Connected);
        info!(url = %self.config.url, "Connected to upstream, subscribed to {}", ALL_MIDS_CHANNEL);

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => self.handle_text(&text),
                Message::Ping(payload) => write.send(Message::Pong(payload)).await?,
                Message::Close(frame) => {
                    debug!(?frame, "Upstream sent close frame");
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Normalize one upstream text frame into `CurrentPrice`.
    ///
    /// Malformed input is logged and dropped; it never ends the session.
    pub fn handle_text(&self, text: &str) {
        match self.normalize(text) {
            Ok(Some(tick)) => {
                self.metrics.record_tick();
                debug!(price_raw = tick.price_raw, price_usd = tick.price_usd, "Price update");
                self.price_tx.send_replace(Some(tick));
            }
            Ok(None) => {}
            Err(e) => {
                self.metrics.record_malformed();
                warn!(error = %e, "Dropping malformed upstream message");
            }
        }
    }

    fn normalize(&self, text: &str) -> Result<Option<PriceTick>, FeedError> {
        let Some(mid) = parse_mid(text, &self.config.coin)? else {
            return Ok(None);
        };
        Ok(Some(PriceTick::from_mid(mid, self.clock.now_seconds())?))
    }

    /// Publish `state`. Leaving `Connected` also clears `CurrentPrice`.
    fn set_state(&self, state: ConnectionState) {
        if !state.is_connected() {
            let cleared = self.price_tx.send_if_modified(|price| price.take().is_some());
            if cleared {
                info!(?state, "Upstream lost, withdrawing current price");
            }
        }
        self.state_tx.send_replace(state);
    }
}
