//! # Location Feed End-to-End Tests
//!
//! Runs the real `ConnectionManager` over tokio-tungstenite against a local
//! scripted WebSocket server.

use std::time::Duration;

use lib_livemap::ingestors::FeedSubscription;
use lib_livemap::{ConnectionManager, ConnectionState, FeedConfig, FeedError, MapView, TrackerConfig, VehicleStatus};
use project_tests::{location_json, ScriptedFeedServer, Session};

fn feed_config(base_address: String) -> FeedConfig {
    FeedConfig {
        base_address,
        retry_delay: Duration::from_millis(10),
    }
}

async fn collect(subscription: &mut FeedSubscription, count: usize) -> Vec<(String, f64)> {
    let mut seen = Vec::new();
    while seen.len() < count {
        let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("timed out waiting for the feed")
            .expect("feed ended");
        let location = event.as_ref().as_ref().expect("decode error");
        seen.push((location.id.clone(), location.position.lat));
    }
    seen
}

#[tokio::test]
async fn test_subscribers_recover_after_refused_connections_and_close() {
    let server = ScriptedFeedServer::start(vec![
        Session::Refuse,
        Session::Refuse,
        Session::Refuse,
        Session::SendAndClose(vec![
            location_json("bus1", 1.0, 1.0, None),
            location_json("bus2", 2.0, 2.0, None),
        ]),
        Session::SendAndHold(vec![location_json("bus1", 3.0, 3.0, Some("S1"))]),
    ])
    .await
    .unwrap();

    let manager = ConnectionManager::new(feed_config(server.base_address()));
    let mut first = manager.connect().unwrap();
    let mut second = manager.connect().unwrap();

    let expected = vec![
        ("bus1".to_string(), 1.0),
        ("bus2".to_string(), 2.0),
        ("bus1".to_string(), 3.0),
    ];
    assert_eq!(collect(&mut first, 3).await, expected);
    assert_eq!(collect(&mut second, 3).await, expected);

    // No duplicates trail behind.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(first.try_recv().is_none());
    assert!(second.try_recv().is_none());

    assert_eq!(manager.retry_count(), 4);
    assert_eq!(*manager.state().borrow(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_malformed_message_does_not_reconnect() {
    let server = ScriptedFeedServer::start(vec![Session::SendAndHold(vec![
        "{\"id\":\"bus1\"}".to_string(),
        location_json("bus1", 49.8, 9.9, None),
    ])])
    .await
    .unwrap();

    let manager = ConnectionManager::new(feed_config(server.base_address()));
    let mut subscription = manager.connect().unwrap();

    let broken = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(broken.is_err());
    assert_eq!(collect(&mut subscription, 1).await, vec![("bus1".to_string(), 49.8)]);
    assert_eq!(manager.retry_count(), 0);
}

#[tokio::test]
async fn test_binary_frame_with_invalid_utf8_is_a_decode_error() {
    let server = ScriptedFeedServer::start(vec![Session::SendBinaryAndHold(vec![
        b"{\"id\":\"bus\xFF1\",\"loc\":[1,2]}".to_vec(),
        location_json("bus2", 49.7, 9.8, None).into_bytes(),
    ])])
    .await
    .unwrap();

    let manager = ConnectionManager::new(feed_config(server.base_address()));
    let mut subscription = manager.connect().unwrap();

    let broken = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(broken.as_ref(), Err(FeedError::Decode { .. })));
    assert_eq!(collect(&mut subscription, 1).await, vec![("bus2".to_string(), 49.7)]);
    assert_eq!(manager.retry_count(), 0);
}

#[tokio::test]
async fn test_map_view_tracks_vehicles_from_the_socket() {
    let server = ScriptedFeedServer::start(vec![Session::SendAndHold(vec![
        location_json("bus1", 49.8, 9.9, None),
        location_json("bus1", 49.8, 9.9, Some("S1")),
        location_json("bus7", 49.7, 9.8, None),
    ])])
    .await
    .unwrap();

    let manager = ConnectionManager::new(feed_config(server.base_address()));
    let catalog = std::sync::Arc::new(
        lib_livemap::HttpCatalog::new(&lib_livemap::CatalogConfig::default()).unwrap(),
    );
    let map = MapView::new(catalog, TrackerConfig::default());
    map.connect(&manager).unwrap();

    let mut markers = map.markers();
    let settled = tokio::time::timeout(
        Duration::from_secs(5),
        markers.wait_until(|markers| {
            markers.len() == 2
                && markers
                    .get("bus1")
                    .is_some_and(|marker| marker.status == VehicleStatus::Waiting)
        }),
    )
    .await
    .unwrap();
    assert!(settled);

    let bus1 = markers.borrow()["bus1"].position();
    assert_eq!((bus1.lat, bus1.lon), (49.8, 9.9));

    map.shutdown();
    manager.shutdown();
}
