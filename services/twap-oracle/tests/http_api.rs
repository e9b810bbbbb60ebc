//! HTTP and WebSocket surface tests
//!
//! REST handlers are exercised in-process through the router; the feeds are
//! exercised over a real socket with a tungstenite client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use oracle_types::ids::{IntervalId, IntervalWidth};
use oracle_types::numeric::FixedPrice;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;
use twap_oracle::clock::ManualClock;
use twap_oracle::engine::TwapEngine;
use twap_oracle::events::Settlement;
use twap_oracle::feed::{FeedConfig, FeedSupervisor, ReconnectPolicy};
use twap_oracle::metrics::ServiceMetrics;
use twap_oracle::router::create_router;
use twap_oracle::state::AppState;
use twap_oracle::websocket::WsConfig;
use url::Url;

const T0: i64 = 1_708_123_455;

fn setup() -> (AppState, FeedSupervisor) {
    let clock = Arc::new(ManualClock::at_seconds(T0 + 1));
    let metrics = Arc::new(ServiceMetrics::new());
    let engine = Arc::new(TwapEngine::new(IntervalWidth::from_secs(5).unwrap()));
    let config = FeedConfig {
        url: Url::parse("ws://127.0.0.1:9/ws").unwrap(),
        coin: "HYPE".to_string(),
        connect_timeout: Duration::from_millis(100),
        reconnect: ReconnectPolicy::default(),
    };
    let (supervisor, feed) = FeedSupervisor::new(config, clock.clone(), Arc::clone(&metrics));
    let state = AppState::new(engine, metrics, clock, feed, &WsConfig::default());
    (state, supervisor)
}

async fn get_json(state: &AppState, uri: &str) -> (StatusCode, Value) {
    let response = create_router(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn serve(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_health_reports_state() {
    let (state, supervisor) = setup();
    supervisor.handle_text(r#"{"channel":"allMids","data":{"mids":{"HYPE":"37.5"}}}"#);

    let (status, body) = get_json(&state, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "twap-oracle");
    assert_eq!(body["connected_to_upstream"], false);
    assert_eq!(body["connection_state"]["state"], "disconnected");
    assert_eq!(body["price_clients"], 0);
    assert_eq!(body["current_price"]["price_raw"], 3_750_000_000i64);
    assert_eq!(body["metrics"]["ticks_received"], 1);
}

#[tokio::test]
async fn test_price_unavailable_then_available() {
    let (state, supervisor) = setup();

    let (status, body) = get_json(&state, "/api/price").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["message"], "No price data available yet");

    supervisor.handle_text(r#"{"channel":"allMids","data":{"mids":{"HYPE":"37.502100"}}}"#);
    let (status, body) = get_json(&state, "/api/price").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price_raw"], 3_750_210_000i64);
    assert_eq!(body["timestamp"], T0 + 1);
}

#[tokio::test]
async fn test_twap_query_live_settled_and_missing() {
    let (state, _supervisor) = setup();
    let id = IntervalId::from_start(T0);
    state.engine.record_snapshot(id, 100, T0);
    state.engine.record_snapshot(id, 200, T0 + 2);
    state.engine.record_snapshot(id, 300, T0 + 4);

    let (status, body) = get_json(&state, &format!("/api/twap/{}", T0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timeperiod_id"], T0);
    assert_eq!(body["twap"], 180);
    assert_eq!(body["twap_usd"], "0.000002");
    assert_eq!(body["finalized"], false);
    assert_eq!(body["history"]["start_time"], T0);
    assert_eq!(body["history"]["end_time"], T0 + 5);
    assert_eq!(body["history"]["snapshots"][1]["price"], 200);

    state.engine.finalize(id);
    let (_, body) = get_json(&state, &format!("/api/twap/{}", T0)).await;
    assert_eq!(body["finalized"], true);

    let (status, body) = get_json(&state, "/api/twap/1000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
    assert_eq!(body["message"], "No data for this timeperiod");

    let (status, body) = get_json(&state, "/api/twap/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_settlement_feed_over_websocket() {
    let (state, _supervisor) = setup();
    let addr = serve(state.clone()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/settlements", addr))
        .await
        .unwrap();

    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "connected");
    assert_eq!(welcome["message"], "Connected to settlement feed");

    state
        .settlements_tx
        .send(Settlement {
            interval_id: IntervalId::from_start(T0),
            twap: FixedPrice::from_raw(3_750_210_000),
            emitted_at: T0 + 5,
        })
        .unwrap();

    let msg = next_json(&mut ws).await;
    assert_eq!(msg["type"], "settlement");
    assert_eq!(msg["timeperiod_id"], T0.to_string());
    assert_eq!(msg["price"], "3750210000");
    assert_eq!(msg["price_usd"], "37.502100");

    let (_, health) = get_json(&state, "/").await;
    assert_eq!(health["settlement_clients"], 1);
}

#[tokio::test]
async fn test_price_feed_sends_current_price_first() {
    let (state, supervisor) = setup();
    supervisor.handle_text(r#"{"channel":"allMids","data":{"mids":{"HYPE":"12.5"}}}"#);
    let addr = serve(state.clone()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/prices", addr))
        .await
        .unwrap();

    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "connected");
    assert_eq!(welcome["message"], "Connected to price feed");

    let current = next_json(&mut ws).await;
    assert_eq!(current["price_raw"], 1_250_000_000i64);

    let tick = state.feed.current_price().unwrap();
    state.ticks_tx.send(tick).unwrap();
    let forwarded = next_json(&mut ws).await;
    assert_eq!(forwarded["price_raw"], 1_250_000_000i64);
    assert!(forwarded.get("type").is_none());
}
