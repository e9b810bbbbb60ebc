use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::events::FeedMessage;
use crate::state::AppState;
use crate::websocket::Channel;

pub async fn ws_prices(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let rx = state.ticks_tx.subscribe();
        let current = state.feed.current_price();
        stream_feed(socket, state, Channel::Prices, current, rx, |tick| {
            serde_json::to_string(tick)
        })
        .await
    })
}

pub async fn ws_settlements(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let rx = state.settlements_tx.subscribe();
        stream_feed(socket, state, Channel::Settlements, None, rx, |settlement| {
            serde_json::to_string(&settlement.to_message())
        })
        .await
    })
}

/// Welcome, optional initial item, then forward the broadcast until either
/// side goes away. `rx` is subscribed before the welcome so nothing
/// published in between is missed.
async fn stream_feed<T, F>(
    socket: WebSocket,
    state: AppState,
    channel: Channel,
    initial: Option<T>,
    mut rx: broadcast::Receiver<T>,
    render: F,
) where
    T: Clone,
    F: Fn(&T) -> Result<String, serde_json::Error>,
{
    let client_id = state.registry().register(channel, state.clock.now_seconds());
    info!(client_id, %channel, "Feed client connected");

    let (mut sender, mut receiver) = socket.split();

    let welcome = FeedMessage::connected(channel.welcome(), state.clock.now_seconds());
    let mut first = Vec::with_capacity(2);
    match serde_json::to_string(&welcome) {
        Ok(text) => first.push(text),
        Err(e) => warn!(error = %e, "Failed to render welcome"),
    }
    if let Some(item) = initial.as_ref() {
        match render(item) {
            Ok(text) => first.push(text),
            Err(e) => warn!(error = %e, "Failed to render initial item"),
        }
    }

    let mut open = true;
    for text in first {
        if sender.send(Message::Text(text)).await.is_err() {
            open = false;
            break;
        }
        state.registry().record_sent(client_id);
    }

    while open {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(item) => {
                    let text = match render(&item) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, %channel, "Failed to render feed message");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                    state.registry().record_sent(client_id);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(client_id, %channel, skipped, "Feed client lagging, messages skipped");
                    state.metrics.record_lagged(skipped);
                    state.registry().record_lagged(client_id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(other)) => debug!(client_id, ?other, "Ignoring inbound frame"),
            },
        }
    }

    if let Some(client) = state.registry().disconnect(client_id) {
        info!(
            client_id,
            %channel,
            messages_sent = client.messages_sent,
            messages_lagged = client.messages_lagged,
            "Feed client disconnected"
        );
    }
}
