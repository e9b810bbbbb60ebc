//! WebSocket client bookkeeping for the outbound feeds
//!
//! Two feeds are served:
//! - `/ws/prices`: every sampled `PriceTick`
//! - `/ws/settlements`: every `Settlement`, once per interval
//!
//! Flow: connect → welcome → (prices only) current price → stream.
//!
//! Delivery itself goes through `tokio::sync::broadcast`; the registry only
//! tracks who is connected and how each client is keeping up.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Feeds a client can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Prices,
    Settlements,
}

impl Channel {
    /// Greeting sent as the first frame on this feed.
    pub fn welcome(&self) -> &'static str {
        match self {
            Channel::Prices => "Connected to price feed",
            Channel::Settlements => "Connected to settlement feed",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Prices => write!(f, "prices"),
            Channel::Settlements => write!(f, "settlements"),
        }
    }
}

/// Unique client identifier.
pub type ClientId = u64;

/// Per-client delivery state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    pub client_id: ClientId,
    pub channel: Channel,
    /// Unix seconds.
    pub connected_at: i64,
    pub messages_sent: u64,
    /// Messages skipped because the client fell behind the broadcast buffer.
    pub messages_lagged: u64,
}

impl ClientState {
    pub fn new(client_id: ClientId, channel: Channel, connected_at: i64) -> Self {
        Self {
            client_id,
            channel,
            connected_at,
            messages_sent: 0,
            messages_lagged: 0,
        }
    }
}

/// Configuration for the WebSocket feeds.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Broadcast buffer per feed; a client further behind than this lags.
    pub broadcast_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 256,
        }
    }
}

/// Client registry: tracks all connected feed clients.
///
/// Uses BTreeMap for stable iteration order.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: BTreeMap<ClientId, ClientState>,
    next_id: ClientId,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Register a new client on `channel` and return its ID.
    pub fn register(&mut self, channel: Channel, timestamp: i64) -> ClientId {
        let id = self.next_id;
        self.next_id += 1;
        self.clients
            .insert(id, ClientState::new(id, channel, timestamp));
        id
    }

    /// Remove a client (disconnect).
    pub fn disconnect(&mut self, client_id: ClientId) -> Option<ClientState> {
        self.clients.remove(&client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&ClientState> {
        self.clients.get(&client_id)
    }

    pub fn record_sent(&mut self, client_id: ClientId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.messages_sent += 1;
        }
    }

    pub fn record_lagged(&mut self, client_id: ClientId, skipped: u64) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.messages_lagged += skipped;
        }
    }

    /// Number of clients connected to `channel`.
    pub fn client_count(&self, channel: Channel) -> usize {
        self.clients
            .values()
            .filter(|state| state.channel == channel)
            .count()
    }

    pub fn total_clients(&self) -> usize {
        self.clients.len()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
