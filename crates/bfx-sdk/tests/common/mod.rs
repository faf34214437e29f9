//! Common test utilities and fixtures for integration tests
//!
//! Frames follow the shapes the exchange sends on `wss://api-pub.bitfinex.com/ws/2`.

#![allow(dead_code)]

use bfx_sdk::prelude::*;
use bfx_ws::{EventReceiver, MockDialer, MockServer, MockServers};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// How long a test waits for any single expected event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Info frame sent on every new connection
pub const INFO_MESSAGE: &str =
    r#"{"event":"info","version":2,"serverId":"5b73a436-19fe-4a40-a4a8-1b1e3c4f5a6b","platform":{"status":1}}"#;

/// Info frame asking clients to reconnect
pub const RECONNECT_MESSAGE: &str =
    r#"{"event":"info","code":20051,"msg":"Stopping. Please try to reconnect"}"#;

/// Trading ticker `[BID, BID_SIZE, ASK, ASK_SIZE, DAILY_CHANGE, DAILY_CHANGE_RELATIVE, LAST_PRICE, VOLUME, HIGH, LOW]`
pub const TICKER_PAYLOAD: &str = "[100,1,101,1,1,0.01,101,1000,110,90]";

/// Book snapshot `[PRICE, COUNT, AMOUNT]`; positive amounts are bids
pub const BOOK_SNAPSHOT: &str = "[[100,1,5],[99,2,3],[101,1,-4]]";

/// Removes the 100 bid
pub const BOOK_DELETE_100: &str = "[100,0,5]";

/// CRC-32 of `99:3:101:-4`
pub const BOOK_CHECKSUM: i64 = 519746591;

/// Route client logs to the test harness; `RUST_LOG=bfx_ws=debug` shows frames
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builder wired to a mock exchange with deterministic IDs and fast retries
pub fn mock_builder() -> (BfxClientBuilder, MockDialer, MockServers) {
    init_tracing();
    let (dialer, servers) = MockDialer::new();
    let builder = BfxClient::builder()
        .with_dialer(Arc::new(dialer.clone()))
        .with_nonce_generator(Arc::new(SequenceNonceGenerator::starting_at(1)))
        .with_reconnect_config(
            ReconnectConfig::new()
                .with_initial_delay(Duration::from_millis(10))
                .with_jitter(0.0)
                .with_max_attempts(3),
        );
    (builder, dialer, servers)
}

pub fn test_credentials() -> Credentials {
    Credentials::new("test-key", "test-secret").unwrap()
}

/// Wait for the next connection the client dials
pub async fn next_server(servers: &mut MockServers) -> MockServer {
    let server = servers
        .next_within(EVENT_TIMEOUT)
        .await
        .expect("client did not dial");
    server.send(INFO_MESSAGE);
    server
}

/// Read the next subscribe request and acknowledge it on `chan_id`
///
/// Returns the request as sent.
pub async fn ack_subscribe(server: &mut MockServer, chan_id: u64) -> Value {
    let request = server
        .expect_event("subscribe")
        .await
        .expect("no subscribe request");
    let mut ack = json!({
        "event": "subscribed",
        "channel": request["channel"],
        "chanId": chan_id,
        "subId": request["subId"],
    });
    for field in ["symbol", "key", "prec", "freq", "len"] {
        if let Some(value) = request.get(field) {
            ack[field] = value.clone();
        }
    }
    server.send_json(ack);
    request
}

/// Read the `auth` request and accept it
pub async fn accept_auth(server: &mut MockServer) -> Value {
    let request = server.expect_event("auth").await.expect("no auth request");
    server.send_json(json!({
        "event": "auth",
        "status": "OK",
        "chanId": 0,
        "userId": 1234,
        "caps": {"orders": {"read": 1, "write": 1}},
    }));
    request
}

/// Receive events until one matches, failing the test after [`EVENT_TIMEOUT`]
pub async fn wait_for<F>(events: &mut EventReceiver, mut matches: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream ended");
        if matches(&event) {
            return event;
        }
    }
}

pub fn is_subscribed(event: &Event) -> bool {
    matches!(
        event,
        Event::Subscription {
            event: SubscriptionEvent::Subscribed { .. },
            ..
        }
    )
}

pub fn is_disconnected(event: &Event) -> bool {
    matches!(
        event,
        Event::Connection {
            event: ConnectionEvent::Disconnected { .. },
            ..
        }
    )
}

pub fn is_restored(event: &Event) -> bool {
    matches!(
        event,
        Event::Connection {
            event: ConnectionEvent::SubscriptionsRestored { .. },
            ..
        }
    )
}

pub fn is_market(event: &Event) -> bool {
    matches!(event, Event::Market(_))
}

/// Poll until `check` holds, failing the test after [`EVENT_TIMEOUT`]
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}
