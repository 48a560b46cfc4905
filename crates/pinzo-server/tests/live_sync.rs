//! End-to-end tests: live views against a real server over WebSocket.

mod common;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use pinzo_client::proto::{error_codes, RecordDraft, RecordId};
use pinzo_client::{ClientConfig, ConnectionState, LiveView, SessionView, ViewUpdate, WsFeed};
use pinzo_server::create_router;

async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(common::state());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_config(addr: SocketAddr, sub: &str) -> ClientConfig {
    ClientConfig::new(format!("ws://{}/ws/changes", addr)).with_credential(common::token(sub))
}

async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

async fn live(addr: SocketAddr, sub: &str) -> LiveView {
    let view = LiveView::connect(client_config(addr, sub));
    within(view.wait_for(|s| s.state == ConnectionState::Live))
        .await
        .unwrap();
    view
}

#[tokio::test]
async fn test_two_sessions_converge() {
    let addr = spawn_server().await;

    let first = live(addr, "alice").await;
    let second = live(addr, "alice").await;
    let other = live(addr, "bob").await;

    first
        .create(RecordDraft::new("Rust", "https://rust-lang.org"))
        .unwrap();

    let seen = within(second.wait_for(|s| s.records.len() == 1))
        .await
        .unwrap();
    let id = seen.records[0].id;
    assert_eq!(seen.records[0].title, "Rust");
    within(first.wait_for(|s| s.records.len() == 1))
        .await
        .unwrap();

    second.delete(id).unwrap();
    within(first.wait_for(|s| s.records.is_empty()))
        .await
        .unwrap();
    within(second.wait_for(|s| s.records.is_empty()))
        .await
        .unwrap();

    assert!(other.snapshot().records.is_empty());
}

#[tokio::test]
async fn test_snapshot_includes_existing_records() {
    let addr = spawn_server().await;

    let writer = live(addr, "alice").await;
    writer
        .create(RecordDraft::new("older", "https://example.com/1"))
        .unwrap();
    writer
        .create(RecordDraft::new("newer", "https://example.com/2"))
        .unwrap();
    within(writer.wait_for(|s| s.records.len() == 2))
        .await
        .unwrap();

    let late = live(addr, "alice").await;
    let titles: Vec<_> = late
        .snapshot()
        .records
        .iter()
        .map(|r| r.title.clone())
        .collect();
    assert_eq!(titles, vec!["newer", "older"]);
}

#[tokio::test]
async fn test_feed_requires_credential() {
    let addr = spawn_server().await;

    let anonymous = ClientConfig::new(format!("ws://{}/ws/changes", addr));
    assert!(WsFeed::connect(&anonymous).await.is_err());

    let forged = anonymous.with_credential("forged");
    assert!(WsFeed::connect(&forged).await.is_err());
}

#[tokio::test]
async fn test_unknown_delete_is_rejected() {
    let addr = spawn_server().await;

    let feed = WsFeed::connect(&client_config(addr, "alice")).await.unwrap();
    let mut view = within(SessionView::open(feed)).await.unwrap();
    assert_eq!(view.owner().as_str(), "alice");

    let request_id = view.delete(RecordId::new()).await.unwrap();
    let update = within(view.next_update()).await.unwrap();
    match update {
        ViewUpdate::Rejected {
            request_id: rejected,
            code,
            rolled_back,
            ..
        } => {
            assert_eq!(rejected, request_id);
            assert_eq!(code, error_codes::NOT_FOUND);
            assert!(!rolled_back);
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    view.close().await.unwrap();
}
