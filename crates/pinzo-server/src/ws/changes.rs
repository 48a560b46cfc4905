use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::StreamExt;

use pinzo_proto::{ClientMessage, OwnerId, ServerMessage};

use crate::auth::Identity;
use crate::error::rejection_code;
use crate::state::AppState;

/// WebSocket upgrade handler for the change feed
pub async fn ws_changes(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    identity: Identity,
) -> Response {
    ws.on_upgrade(move |socket| handle_changes(socket, state, identity.owner_id))
}

/// Drive one change feed connection.
///
/// The relay subscription is taken before the snapshot is read, so no change
/// committed in between can be missed. Overlap is harmless because clients
/// merge idempotently.
async fn handle_changes(mut socket: WebSocket, state: AppState, owner: OwnerId) {
    let mut subscription = state.relay.subscribe(&owner);
    tracing::info!(subscription_id = subscription.id(), owner = %owner, "change feed opened");

    let records = match state.store.list_by_owner(&owner).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(owner = %owner, error = %e, "snapshot failed");
            send(
                &mut socket,
                &ServerMessage::Error {
                    message: format!("snapshot failed: {}", e),
                },
            )
            .await;
            return;
        }
    };

    let snapshot = ServerMessage::Snapshot {
        owner_id: owner.clone(),
        records,
    };
    if !send(&mut socket, &snapshot).await {
        return;
    }

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else {
                    // Dropped by the relay for lagging; closing makes the client resync.
                    tracing::warn!(owner = %owner, "subscription ended, closing change feed");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                if !send(&mut socket, &ServerMessage::Change { event }).await {
                    break;
                }
            }
            msg = socket.recv() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                };

                let reply = handle_client_frame(&state, &owner, &text).await;
                if !send(&mut socket, &reply).await {
                    break;
                }
            }
        }
    }

    tracing::info!(subscription_id = subscription.id(), owner = %owner, "change feed closed");
    subscription.close();
}

/// Answer one client frame on behalf of `owner`.
///
/// Failures are reported only to the requesting connection. Successful
/// mutations reach every connection of the owner through the relay.
pub async fn handle_client_frame(state: &AppState, owner: &OwnerId, text: &str) -> ServerMessage {
    let request = match ClientMessage::from_json(text) {
        Ok(request) => request,
        Err(e) => {
            return ServerMessage::Error {
                message: format!("invalid frame: {}", e),
            }
        }
    };

    let (request_id, result) = match request {
        ClientMessage::Ping => return ServerMessage::Pong,
        ClientMessage::Create { request_id, draft } => {
            (request_id, state.store.insert(owner, draft).await.map(Some))
        }
        ClientMessage::Update {
            request_id,
            id,
            patch,
        } => (
            request_id,
            state.store.update_by_id(owner, id, patch).await.map(Some),
        ),
        ClientMessage::Delete { request_id, id } => (
            request_id,
            state.store.delete_by_id(owner, id).await.map(|_| None),
        ),
    };

    match result {
        Ok(record) => ServerMessage::Ack { request_id, record },
        Err(e) => {
            tracing::debug!(request_id, owner = %owner, error = %e, "mutation rejected");
            ServerMessage::Rejected {
                request_id,
                code: rejection_code(&e),
                message: e.to_string(),
            }
        }
    }
}

/// Send a frame. Returns false once the socket is unusable.
async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let text = match message.to_json() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode frame");
            return true;
        }
    };
    socket.send(Message::Text(text)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pinzo_proto::{error_codes, ChangeKind, RecordId};

    use crate::auth::JwtAuthenticator;
    use crate::config::ServerConfig;

    fn state() -> AppState {
        let auth = Arc::new(JwtAuthenticator::with_secret_str("secret"));
        AppState::new(ServerConfig::default(), auth).0
    }

    #[tokio::test]
    async fn test_ping() {
        let state = state();
        let owner = OwnerId::new("user-1");
        let reply = handle_client_frame(&state, &owner, r#"{"type":"PING"}"#).await;
        assert_eq!(reply, ServerMessage::Pong);
    }

    #[tokio::test]
    async fn test_create_acks_and_publishes() {
        let state = state();
        let owner = OwnerId::new("user-1");
        let mut sub = state.relay.subscribe(&owner);

        let reply = handle_client_frame(
            &state,
            &owner,
            r#"{"type":"CREATE","request_id":7,"title":"Rust","url":"https://rust-lang.org"}"#,
        )
        .await;

        let record = match reply {
            ServerMessage::Ack {
                request_id: 7,
                record: Some(record),
            } => record,
            other => panic!("unexpected reply: {:?}", other),
        };
        assert_eq!(record.owner_id, owner);

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind(), ChangeKind::Insert);
        assert_eq!(event.record_id(), record.id);
    }

    #[tokio::test]
    async fn test_failures_rejected() {
        let state = state();
        let owner = OwnerId::new("user-1");

        let frame = ClientMessage::Delete {
            request_id: 3,
            id: RecordId::new(),
        }
        .to_json()
        .unwrap();
        match handle_client_frame(&state, &owner, &frame).await {
            ServerMessage::Rejected {
                request_id, code, ..
            } => {
                assert_eq!(request_id, 3);
                assert_eq!(code, error_codes::NOT_FOUND);
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        let reply = handle_client_frame(
            &state,
            &owner,
            r#"{"type":"CREATE","request_id":4,"title":"  ","url":"https://x"}"#,
        )
        .await;
        assert!(matches!(
            reply,
            ServerMessage::Rejected {
                request_id: 4,
                code: error_codes::INVALID_REQUEST,
                ..
            }
        ));

        let reply = handle_client_frame(&state, &owner, "not json").await;
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn test_foreign_records_are_not_found() {
        let state = state();
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");

        let record = state
            .store
            .insert(&alice, pinzo_proto::RecordDraft::new("A", "https://a"))
            .await
            .unwrap();

        let frame = ClientMessage::Delete {
            request_id: 1,
            id: record.id,
        }
        .to_json()
        .unwrap();
        assert!(matches!(
            handle_client_frame(&state, &bob, &frame).await,
            ServerMessage::Rejected {
                code: error_codes::NOT_FOUND,
                ..
            }
        ));
        assert!(state.store.get(&alice, record.id).await.is_ok());
    }
}
