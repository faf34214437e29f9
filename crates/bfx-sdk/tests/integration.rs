//! Integration tests for the Bitfinex SDK
//!
//! Drives the full client (multiplexer, sessions, dispatcher, books) against
//! an in-memory exchange.

mod common;

use bfx_sdk::prelude::*;
use common::*;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

// =============================================================================
// Market data
// =============================================================================

#[tokio::test]
async fn test_ticker_example() {
    let (builder, _dialer, mut servers) = mock_builder();
    let mut client = builder.with_ticker(["tSYM"]).connect().await.unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    let request = ack_subscribe(&mut server, 5).await;
    assert_eq!(request["channel"], "ticker");
    assert_eq!(request["symbol"], "tSYM");

    server.send(format!("[5,{TICKER_PAYLOAD}]"));
    let Event::Market(update) = wait_for(&mut events, is_market).await else {
        unreachable!()
    };
    assert_eq!(update.channel_id, 5);
    assert_eq!(update.target, "tSYM");
    let MarketEvent::Ticker(Ticker::Trading(ticker)) = update.event else {
        panic!("expected trading ticker, got {:?}", update.event);
    };
    assert_eq!(ticker.bid, dec!(100));
    assert_eq!(ticker.bid_size, dec!(1));
    assert_eq!(ticker.ask, dec!(101));
    assert_eq!(ticker.ask_size, dec!(1));
    assert_eq!(ticker.last_price, dec!(101));
    assert_eq!(ticker.volume, dec!(1000));
    assert_eq!(ticker.high, dec!(110));
    assert_eq!(ticker.low, dec!(90));

    client.shutdown().await;
}

#[tokio::test]
async fn test_book_example_and_checksum() {
    let (builder, _dialer, mut servers) = mock_builder();
    let mut client = builder
        .with_book("tBTCUSD", Precision::P0)
        .connect()
        .await
        .unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    let request = ack_subscribe(&mut server, 7).await;
    assert_eq!(request["prec"], "P0");
    assert_eq!(request["len"], "25");

    server.send(format!("[7,{BOOK_SNAPSHOT}]"));
    server.send(format!("[7,{BOOK_DELETE_100}]"));
    server.send(format!("[7,\"cs\",{BOOK_CHECKSUM}]"));

    wait_for(&mut events, |event| {
        matches!(
            event,
            Event::Market(MarketUpdate {
                event: MarketEvent::ChecksumVerified { .. },
                ..
            })
        )
    })
    .await;

    let book = client.order_book("tBTCUSD", Precision::P0).unwrap();
    assert_eq!(book.bids.len(), 1);
    assert_eq!(book.asks.len(), 1);
    assert!(book.is_synced());
    assert_eq!(client.best_bid("tBTCUSD"), Some(dec!(99)));
    assert_eq!(client.best_ask("tBTCUSD"), Some(dec!(101)));
    assert_eq!(client.spread("tBTCUSD"), Some(dec!(2)));
    assert_eq!(client.mid_price("tBTCUSD"), Some(dec!(100)));

    client.shutdown().await;
}

#[tokio::test]
async fn test_checksum_mismatch_is_reported_once() {
    let (builder, _dialer, mut servers) = mock_builder();
    let mut client = builder
        .with_book("tBTCUSD", Precision::P0)
        .connect()
        .await
        .unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 7).await;
    server.send(format!("[7,{BOOK_SNAPSHOT}]"));
    server.send("[7,\"cs\",1]");
    server.send("[7,\"cs\",1]");
    server.send("[7,\"hb\"]");

    wait_for(&mut events, |event| {
        matches!(
            event,
            Event::Market(MarketUpdate {
                event: MarketEvent::ChecksumMismatch { expected: 1, .. },
                ..
            })
        )
    })
    .await;
    // The second bad checksum produces nothing, so the heartbeat comes next
    let next = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(next, Event::Heartbeat { channel_id: 7, .. }));
    assert!(!client.is_synced("tBTCUSD"));

    client.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frames_do_not_stop_dispatch() {
    let (builder, _dialer, mut servers) = mock_builder();
    let mut client = builder.with_trades(["tBTCUSD"]).connect().await.unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 9).await;

    server.send("{not json");
    server.send("[9]");
    server.send("[9,\"te\",[1,2]]");
    server.send("[4242,[1,2,3]]");
    server.send("[9,\"te\",[401597395,1574694478808,0.005,7245.3]]");

    let Event::Market(update) = wait_for(&mut events, is_market).await else {
        unreachable!()
    };
    let MarketEvent::Trade { kind, trade } = update.event else {
        panic!("expected trade, got {:?}", update.event);
    };
    assert_eq!(kind, TradeKind::Executed);
    assert_eq!(trade.id, 401597395);
    assert_eq!(trade.amount, dec!(0.005));
    assert_eq!(trade.price, dec!(7245.3));

    client.shutdown().await;
}

#[tokio::test]
async fn test_rejected_subscription_releases_slot() {
    let (builder, _dialer, mut servers) = mock_builder();
    let mut client = builder.connect().await.unwrap();
    let mut events = client.events().unwrap();

    let id = client.subscribe_ticker("tNOPE").await.unwrap();
    let mut server = next_server(&mut servers).await;
    let request = server.expect_event("subscribe").await.unwrap();
    server.send_json(serde_json::json!({
        "event": "error",
        "msg": "symbol: invalid",
        "code": 10300,
        "subId": request["subId"],
        "channel": "ticker",
        "symbol": "tNOPE",
    }));

    let event = wait_for(&mut events, |event| {
        matches!(event, Event::Subscription { event: SubscriptionEvent::Rejected { .. }, .. })
    })
    .await;
    let Event::Subscription {
        event: SubscriptionEvent::Rejected { subscription, code, .. },
        ..
    } = event
    else {
        unreachable!()
    };
    assert_eq!(subscription, id);
    assert_eq!(code, 10300);
    assert!(client.subscription(&id).is_none());
    assert_eq!(client.slot_counts().await[0].1, 0);

    client.shutdown().await;
}

// =============================================================================
// Connection sharding
// =============================================================================

#[tokio::test]
async fn test_capacity_sharding_opens_one_connection_per_ceiling() {
    let (builder, dialer, mut servers) = mock_builder();
    let client = builder
        .with_capacity_per_connection(3)
        .connect()
        .await
        .unwrap();

    for (i, symbol) in ["tA", "tB", "tC", "tD", "tE", "tF", "tG"].iter().enumerate() {
        client.subscribe_ticker(*symbol).await.unwrap();
        assert_eq!(client.connection_count().await, i / 3 + 1);
    }

    let counts: Vec<usize> = client.slot_counts().await.into_iter().map(|(_, n)| n).collect();
    assert_eq!(counts, vec![3, 3, 1]);
    assert_eq!(dialer.dial_count(), 3);

    let mut seen = 0;
    while let Some(mut server) = servers.next_within(Duration::from_millis(200)).await {
        while let Ok(Some(_)) =
            tokio::time::timeout(Duration::from_millis(50), server.expect_event("subscribe")).await
        {
            seen += 1;
        }
    }
    assert_eq!(seen, 7);

    client.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_unsubscribe_returns_counts_to_zero() {
    let (builder, _dialer, mut servers) = mock_builder();
    let mut client = builder
        .with_capacity_per_connection(2)
        .connect()
        .await
        .unwrap();
    let mut events = client.events().unwrap();

    let first = client.subscribe_ticker("tBTCUSD").await.unwrap();
    let second = client.subscribe_trades("tBTCUSD").await.unwrap();
    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 10).await;
    ack_subscribe(&mut server, 11).await;
    wait_for(&mut events, is_subscribed).await;
    wait_for(&mut events, is_subscribed).await;

    assert_eq!(client.slot_counts().await[0].1, 2);
    // A full slot forces a second connection
    let third = client.subscribe_candles("trade:1m:tBTCUSD").await.unwrap();
    assert_eq!(client.connection_count().await, 2);
    assert!(client.subscription(&third).is_some());

    client.unsubscribe(&first).await.unwrap();
    client.unsubscribe(&second).await.unwrap();
    let mut chans = HashSet::new();
    for _ in 0..2 {
        let request = server.expect_event("unsubscribe").await.unwrap();
        let chan = request["chanId"].as_u64().unwrap();
        chans.insert(chan);
        server.send_json(serde_json::json!({"event": "unsubscribed", "status": "OK", "chanId": chan}));
    }
    assert_eq!(chans, HashSet::from([10, 11]));

    eventually(|| client.subscription(&first).is_none() && client.subscription(&second).is_none()).await;
    let counts = client.slot_counts().await;
    assert_eq!(counts[0].1, 0);
    assert_eq!(counts[1].1, 1);

    client.shutdown().await;
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test]
async fn test_replay_after_forced_disconnect_with_auth() {
    let (builder, _dialer, mut servers) = mock_builder();
    let connect = tokio::spawn(
        builder
            .with_credentials(test_credentials())
            .with_ticker(["tBTCUSD"])
            .with_book("tETHUSD", Precision::P0)
            .connect(),
    );

    let mut server = next_server(&mut servers).await;
    let conf = server.expect_event("conf").await.unwrap();
    assert_eq!(conf["flags"], 131072);
    let auth = accept_auth(&mut server).await;
    assert_eq!(auth["apiKey"], "test-key");
    let old_ticker = ack_subscribe(&mut server, 1).await;
    let old_book = ack_subscribe(&mut server, 2).await;

    let mut client = connect.await.unwrap().unwrap();
    let mut events = client.events().unwrap();
    assert!(client.is_authenticated());
    wait_for(&mut events, is_subscribed).await;
    wait_for(&mut events, is_subscribed).await;

    server.fail("connection reset by peer");
    let Event::Connection {
        event: ConnectionEvent::Disconnected { reason, will_reconnect },
        ..
    } = wait_for(&mut events, is_disconnected).await
    else {
        unreachable!()
    };
    assert!(matches!(reason, DisconnectReason::NetworkError(_)));
    assert!(will_reconnect);

    let mut server = next_server(&mut servers).await;
    server.expect_event("conf").await.unwrap();
    let auth = accept_auth(&mut server).await;
    assert_ne!(auth["authNonce"], Value::Null);
    let new_ticker = ack_subscribe(&mut server, 21).await;
    let new_book = ack_subscribe(&mut server, 22).await;

    // Same requests, fresh subscription IDs
    assert_eq!(new_ticker["symbol"], old_ticker["symbol"]);
    assert_eq!(new_book["prec"], old_book["prec"]);
    assert_ne!(new_ticker["subId"], old_ticker["subId"]);
    assert_ne!(new_book["subId"], old_book["subId"]);

    let Event::Connection {
        event: ConnectionEvent::SubscriptionsRestored { count },
        ..
    } = wait_for(&mut events, is_restored).await
    else {
        unreachable!()
    };
    assert_eq!(count, 2);
    wait_for(&mut events, is_subscribed).await;
    wait_for(&mut events, is_subscribed).await;

    eventually(|| client.is_authenticated()).await;
    let subs = client.subscriptions();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|sub| sub.is_active()));
    let channels: HashSet<_> = subs.iter().filter_map(|sub| sub.channel_id).collect();
    assert_eq!(channels, HashSet::from([21, 22]));
    assert_eq!(client.connection_count().await, 1);

    client.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_timeout_forces_reconnect() {
    let (builder, _dialer, mut servers) = mock_builder();
    let mut client = builder
        .with_heartbeat_timeout(Duration::from_millis(200))
        .with_ticker(["tBTCUSD"])
        .connect()
        .await
        .unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 5).await;

    // Stay silent past the heartbeat timeout
    let Event::Connection {
        event: ConnectionEvent::Disconnected { reason, will_reconnect },
        ..
    } = wait_for(&mut events, is_disconnected).await
    else {
        unreachable!()
    };
    assert_eq!(reason, DisconnectReason::HeartbeatTimeout);
    assert!(will_reconnect);
    server.wait_closed().await;

    let mut server = next_server(&mut servers).await;
    let request = ack_subscribe(&mut server, 6).await;
    assert_eq!(request["symbol"], "tBTCUSD");
    wait_for(&mut events, is_restored).await;

    client.shutdown().await;
}

#[tokio::test]
async fn test_keepalive_pongs_hold_off_heartbeat_timeout() {
    let (builder, _dialer, mut servers) = mock_builder();
    let mut client = builder
        .with_heartbeat_timeout(Duration::from_millis(200))
        .with_ticker(["tBTCUSD"])
        .connect()
        .await
        .unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 5).await;

    // Pongs alone, well past the timeout
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.pong();
    }
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(10), events.recv()).await {
        assert!(!is_disconnected(&event), "unexpected {event:?}");
    }

    let Event::Connection {
        event: ConnectionEvent::Disconnected { reason, .. },
        ..
    } = wait_for(&mut events, is_disconnected).await
    else {
        unreachable!()
    };
    assert_eq!(reason, DisconnectReason::HeartbeatTimeout);

    client.shutdown().await;
}

#[tokio::test]
async fn test_info_reconnect_code_triggers_reconnect() {
    let (builder, dialer, mut servers) = mock_builder();
    let mut client = builder.with_trades(["tBTCUSD"]).connect().await.unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 3).await;
    server.send(RECONNECT_MESSAGE);

    let Event::Connection {
        event: ConnectionEvent::Disconnected { reason, will_reconnect },
        ..
    } = wait_for(&mut events, is_disconnected).await
    else {
        unreachable!()
    };
    assert_eq!(reason, DisconnectReason::ReconnectRequested);
    assert!(will_reconnect);

    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 4).await;
    wait_for(&mut events, is_restored).await;
    assert_eq!(dialer.dial_count(), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn test_no_reconnect_when_disabled() {
    let (builder, dialer, mut servers) = mock_builder();
    let mut client = builder
        .without_reconnect()
        .with_ticker(["tBTCUSD"])
        .connect()
        .await
        .unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 5).await;
    server.close();

    let Event::Connection {
        event: ConnectionEvent::Disconnected { reason, will_reconnect },
        ..
    } = wait_for(&mut events, is_disconnected).await
    else {
        unreachable!()
    };
    assert_eq!(reason, DisconnectReason::ServerClosed);
    assert!(!will_reconnect);

    eventually(|| client.subscriptions().is_empty()).await;
    assert_eq!(client.connection_count().await, 0);
    assert!(servers.next_within(Duration::from_millis(100)).await.is_none());
    assert_eq!(dialer.dial_count(), 1);

    // A later subscribe gets a fresh connection
    client.subscribe_ticker("tETHUSD").await.unwrap();
    assert_eq!(client.connection_count().await, 1);
    assert_eq!(dialer.dial_count(), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    let (builder, dialer, mut servers) = mock_builder();
    let mut client = builder.with_ticker(["tBTCUSD"]).connect().await.unwrap();
    let mut events = client.events().unwrap();

    let mut server = next_server(&mut servers).await;
    ack_subscribe(&mut server, 5).await;
    dialer.fail_next(10);
    server.close();

    let event = wait_for(&mut events, |event| {
        matches!(event, Event::Connection { event: ConnectionEvent::ReconnectFailed { .. }, .. })
    })
    .await;
    let Event::Connection {
        event: ConnectionEvent::ReconnectFailed { attempts, .. },
        ..
    } = event
    else {
        unreachable!()
    };
    assert_eq!(attempts, 3);
    assert_eq!(dialer.dial_count(), 4);
    eventually(|| client.subscriptions().is_empty()).await;

    client.shutdown().await;
}

// =============================================================================
// Trading
// =============================================================================

#[tokio::test]
async fn test_order_requests_on_authenticated_connection() {
    let (builder, _dialer, mut servers) = mock_builder();
    let connect = tokio::spawn(builder.with_credentials(test_credentials()).connect());

    let mut server = next_server(&mut servers).await;
    accept_auth(&mut server).await;
    let client = connect.await.unwrap().unwrap();

    client
        .submit_order(NewOrder::limit(
            42,
            OrderType::ExchangeLimit,
            "tBTCUSD",
            dec!(0.01),
            dec!(30000),
        ))
        .await
        .unwrap();
    client.cancel_order(OrderCancel::by_id(7)).await.unwrap();

    let order = server.recv_json().await.unwrap();
    assert_eq!(order[0], 0);
    assert_eq!(order[1], "on");
    assert!(order[2].is_null());
    assert_eq!(order[3]["cid"], 42);
    assert_eq!(order[3]["amount"], "0.01");

    let cancel = server.recv_json().await.unwrap();
    assert_eq!(cancel[1], "oc");
    assert_eq!(cancel[3]["id"], 7);

    client.shutdown().await;
}

#[tokio::test]
async fn test_rejected_auth_fails_connect() {
    let (builder, _dialer, mut servers) = mock_builder();
    let connect = tokio::spawn(builder.with_credentials(test_credentials()).connect());

    let mut server = next_server(&mut servers).await;
    server.expect_event("auth").await.unwrap();
    server.send(r#"{"event":"auth","status":"FAILED","chanId":0,"code":10100,"msg":"apikey: invalid"}"#);

    let err = connect.await.unwrap().unwrap_err();
    assert!(matches!(err, BfxError::AuthenticationFailed { .. }));
    server.wait_closed().await;
}

#[tokio::test]
async fn test_shutdown_closes_every_connection() {
    let (builder, _dialer, mut servers) = mock_builder();
    let client = builder
        .with_capacity_per_connection(1)
        .with_ticker(["tBTCUSD", "tETHUSD"])
        .connect()
        .await
        .unwrap();

    let mut first = next_server(&mut servers).await;
    let mut second = next_server(&mut servers).await;
    client.shutdown().await;

    first.wait_closed().await;
    second.wait_closed().await;
    assert!(client.is_closed());
    assert!(matches!(
        client.subscribe_ticker("tLTCUSD").await,
        Err(BfxError::Closed)
    ));
}
