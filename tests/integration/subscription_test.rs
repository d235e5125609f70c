/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/

use crate::mock_server::{Action, MockFeedServer};
use coinbase_feed::{
    ErrorMessage, FeedResult, FeedSubscription, Match, SignatureBlock, SubscriptionConfig,
    SubscriptionState,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const MATCH_FRAME: &str =
    r#"{"type":"match","product_id":"BTC-USD","price":"100.0","size":"1.0"}"#;

#[derive(Debug)]
enum Event {
    Received,
    Open,
    Done,
    Match(Match),
    Change,
    Error(ErrorMessage),
}

fn record(subscription: &FeedSubscription) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();

    let sender = tx.clone();
    subscription.on_received(move |_| {
        let _ = sender.send(Event::Received);
    });
    let sender = tx.clone();
    subscription.on_open(move |_| {
        let _ = sender.send(Event::Open);
    });
    let sender = tx.clone();
    subscription.on_done(move |_| {
        let _ = sender.send(Event::Done);
    });
    let sender = tx.clone();
    subscription.on_match(move |m| {
        let _ = sender.send(Event::Match(m.clone()));
    });
    let sender = tx.clone();
    subscription.on_change(move |_| {
        let _ = sender.send(Event::Change);
    });
    subscription.on_error(move |e| {
        let _ = tx.send(Event::Error(e.clone()));
    });

    rx
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Event channel closed")
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Event>) {
    sleep(Duration::from_millis(200)).await;
    if let Ok(event) = rx.try_recv() {
        panic!("Unexpected event: {:?}", event);
    }
}

async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("Condition not met in time");
}

async fn stop(subscription: &FeedSubscription) {
    subscription.unsubscribe();
    timeout(Duration::from_secs(5), subscription.wait())
        .await
        .expect("Subscription did not stop");
}

fn public_config(server: &MockFeedServer) -> SubscriptionConfig {
    SubscriptionConfig::new("BTC-USD")
        .unwrap()
        .with_endpoint(&server.url())
        .unwrap()
}

#[tokio::test]
async fn test_match_scenario() {
    let server = MockFeedServer::start(|_| vec![Action::Send(MATCH_FRAME.to_string())]).await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();

    match next_event(&mut events).await {
        Event::Match(m) => {
            assert_eq!(m.product_id, "BTC-USD");
            assert_eq!(m.price, Decimal::new(1000, 1));
            assert_eq!(m.size, Decimal::new(10, 1));
        }
        other => panic!("Expected Match, got {:?}", other),
    }
    assert_quiet(&mut events).await;

    assert_eq!(server.connection_count(), 1);
    assert_eq!(
        server.subscribe_requests(),
        vec![json!({"type": "subscribe", "product_id": "BTC-USD"})]
    );
    assert_eq!(server.request_paths(), vec!["/".to_string()]);
    assert_eq!(subscription.state(), SubscriptionState::ReceivingLoop);

    stop(&subscription).await;
}

#[tokio::test]
async fn test_each_category_fires_its_own_event() {
    let server = MockFeedServer::start(|_| {
        vec![
            Action::Send(r#"{"type":"received","product_id":"BTC-USD","side":"buy"}"#.to_string()),
            Action::Send(r#"{"type":"open","product_id":"BTC-USD","price":"10"}"#.to_string()),
            Action::Send(r#"{"type":"done","product_id":"BTC-USD","reason":"filled"}"#.to_string()),
            Action::Send(MATCH_FRAME.to_string()),
            Action::Send(r#"{"type":"change","product_id":"BTC-USD","new_size":"1"}"#.to_string()),
            Action::Send(r#"{"type":"error","message":"Failed to subscribe"}"#.to_string()),
        ]
    })
    .await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();

    assert!(matches!(next_event(&mut events).await, Event::Received));
    assert!(matches!(next_event(&mut events).await, Event::Open));
    assert!(matches!(next_event(&mut events).await, Event::Done));
    assert!(matches!(next_event(&mut events).await, Event::Match(_)));
    assert!(matches!(next_event(&mut events).await, Event::Change));
    match next_event(&mut events).await {
        Event::Error(e) => assert_eq!(e.message, "Failed to subscribe"),
        other => panic!("Expected Error, got {:?}", other),
    }
    assert_quiet(&mut events).await;

    stop(&subscription).await;
}

#[tokio::test]
async fn test_heartbeat_dispatches_nothing() {
    let server = MockFeedServer::start(|_| {
        vec![
            Action::Send(r#"{"type":"heartbeat","sequence":90,"last_trade_id":20}"#.to_string()),
            Action::Send(r#"{"type":"heartbeat","sequence":91,"last_trade_id":20}"#.to_string()),
            Action::Send(r#"{"type":"heartbeat","sequence":"92"}"#.to_string()),
            Action::Send(r#"{"type":"heartbeat","time":"2014-11-07 08:19:28"}"#.to_string()),
            Action::Send(MATCH_FRAME.to_string()),
        ]
    })
    .await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();

    assert!(matches!(next_event(&mut events).await, Event::Match(_)));
    assert_eq!(subscription.heartbeat_count(), 4);
    assert_quiet(&mut events).await;

    stop(&subscription).await;
}

#[tokio::test]
async fn test_empty_frame_is_skipped() {
    let server = MockFeedServer::start(|_| {
        vec![
            Action::Send(String::new()),
            Action::Send(MATCH_FRAME.to_string()),
        ]
    })
    .await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();

    assert!(matches!(next_event(&mut events).await, Event::Match(_)));
    assert_quiet(&mut events).await;
    assert_eq!(server.connection_count(), 1);

    stop(&subscription).await;
}

#[tokio::test]
async fn test_malformed_message_keeps_connection() {
    let server = MockFeedServer::start(|_| {
        vec![
            Action::Send(r#"{"type":"match","price":"#.to_string()),
            Action::Send(MATCH_FRAME.to_string()),
        ]
    })
    .await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();

    match next_event(&mut events).await {
        Event::Error(e) => {
            assert!(e.message.starts_with("Parse error"));
            assert_eq!(e.payload.as_deref(), Some(r#"{"type":"match","price":"#));
        }
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(matches!(next_event(&mut events).await, Event::Match(_)));
    assert_quiet(&mut events).await;
    assert_eq!(server.connection_count(), 1);

    stop(&subscription).await;
}

#[tokio::test]
async fn test_missing_and_unknown_type_report_one_error_each() {
    let server = MockFeedServer::start(|_| {
        vec![
            Action::Send(r#"{"product_id":"BTC-USD"}"#.to_string()),
            Action::Send(r#"{"type":"ticker","product_id":"BTC-USD"}"#.to_string()),
            Action::Send(MATCH_FRAME.to_string()),
        ]
    })
    .await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();

    match next_event(&mut events).await {
        Event::Error(e) => assert!(e.message.starts_with("Protocol error")),
        other => panic!("Expected Error, got {:?}", other),
    }
    match next_event(&mut events).await {
        Event::Error(e) => assert!(e.message.contains("ticker")),
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(matches!(next_event(&mut events).await, Event::Match(_)));
    assert_quiet(&mut events).await;
    assert_eq!(server.connection_count(), 1);

    stop(&subscription).await;
}

#[tokio::test]
async fn test_reconnects_after_transport_failure() {
    let server = MockFeedServer::start(|index| match index {
        0 => vec![Action::Drop],
        _ => vec![Action::Send(MATCH_FRAME.to_string())],
    })
    .await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();

    match next_event(&mut events).await {
        Event::Error(e) => assert!(e.message.starts_with("Transport error")),
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(matches!(next_event(&mut events).await, Event::Match(_)));

    assert_eq!(server.connection_count(), 2);
    let requests = server.subscribe_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);

    stop(&subscription).await;
}

#[tokio::test]
async fn test_reconnects_after_remote_close() {
    let server = MockFeedServer::start(|index| match index {
        0 => vec![Action::Close],
        _ => vec![Action::Send(MATCH_FRAME.to_string())],
    })
    .await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();

    assert!(matches!(next_event(&mut events).await, Event::Error(_)));
    assert!(matches!(next_event(&mut events).await, Event::Match(_)));
    assert_eq!(server.connection_count(), 2);

    stop(&subscription).await;
}

#[tokio::test]
async fn test_authenticated_request_is_signed_per_attempt() {
    let server = MockFeedServer::start(|index| match index {
        0 => vec![Action::Drop],
        _ => vec![],
    })
    .await;

    let clock = AtomicU64::new(1_700_000_000);
    let signer = move |path: &str, method: &str, body: &str| -> FeedResult<SignatureBlock> {
        let timestamp = clock.fetch_add(1, Ordering::SeqCst);
        Ok(SignatureBlock {
            signature: format!("{}{}{}{}", timestamp, method, path, body),
            api_key: "test-key".to_string(),
            passphrase: "test-pass".to_string(),
            timestamp: timestamp.to_string(),
        })
    };
    let config = public_config(&server).with_signer(signer);
    let subscription = FeedSubscription::new(config);
    let _events = record(&subscription);

    subscription.subscribe();
    eventually(|| server.subscribe_requests().len() >= 2).await;

    let requests = server.subscribe_requests();
    for request in &requests[..2] {
        assert_eq!(request["type"], "subscribe");
        assert_eq!(request["product_id"], "BTC-USD");
        assert_eq!(request["key"], "test-key");
        assert_eq!(request["passphrase"], "test-pass");
    }
    assert_eq!(requests[0]["timestamp"], "1700000000");
    assert_eq!(requests[1]["timestamp"], "1700000001");
    assert_eq!(requests[0]["signature"], "1700000000GET/users/self");
    assert_ne!(requests[0]["signature"], requests[1]["signature"]);

    let paths = server.request_paths();
    assert!(paths.len() >= 2);
    assert!(paths.iter().all(|p| p == "/users/self"));

    stop(&subscription).await;
}

#[tokio::test]
async fn test_unsubscribe_stops_receiving_and_reconnecting() {
    let server = MockFeedServer::start(|_| vec![Action::Send(MATCH_FRAME.to_string())]).await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut events = record(&subscription);

    subscription.subscribe();
    assert!(matches!(next_event(&mut events).await, Event::Match(_)));

    stop(&subscription).await;
    subscription.unsubscribe();

    assert_eq!(subscription.state(), SubscriptionState::Cancelled);
    assert_quiet(&mut events).await;
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_connect_failures_are_reported_and_retried() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = SubscriptionConfig::new("BTC-USD")
        .unwrap()
        .with_endpoint(&format!("ws://{}", addr))
        .unwrap()
        .with_reconnect_delay(Duration::from_millis(10));
    let subscription = FeedSubscription::new(config);
    let mut events = record(&subscription);

    subscription.subscribe();

    for _ in 0..2 {
        match next_event(&mut events).await {
            Event::Error(e) => assert!(e.message.starts_with("Connect error")),
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    stop(&subscription).await;
    while events.try_recv().is_ok() {}
    assert_quiet(&mut events).await;
    assert_eq!(subscription.state(), SubscriptionState::Cancelled);
}

#[tokio::test]
async fn test_state_changes_are_observable() {
    let server = MockFeedServer::start(|_| vec![]).await;
    let subscription = FeedSubscription::new(public_config(&server));
    let mut changes = subscription.state_changes();
    assert_eq!(*changes.borrow(), SubscriptionState::Idle);

    subscription.subscribe();
    timeout(
        Duration::from_secs(5),
        changes.wait_for(|state| *state == SubscriptionState::ReceivingLoop),
    )
    .await
    .expect("Timed out waiting for receive loop")
    .expect("State channel closed");

    subscription.unsubscribe();
    timeout(
        Duration::from_secs(5),
        changes.wait_for(|state| *state == SubscriptionState::Cancelled),
    )
    .await
    .expect("Timed out waiting for cancellation")
    .expect("State channel closed");

    subscription.wait().await;
}
