//! Scenario tests for the message router, driven through in-memory
//! connection handles instead of real sockets.

use async_trait::async_trait;
use colabri_relay::error::StoreError;
use colabri_relay::models::{GuestAccess, PermissionCheck, PermissionLevel, ServerMessage};
use colabri_relay::services::{InMemoryPermissions, InMemorySessions, PermissionOracle};
use colabri_relay::websocket::{MessageRouter, RouterConfig};
use colabri_relay::ws::{ConnectionHandle, ConnectionId, ConnectionRegistry, RoomDirectory};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

struct Client {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Client {
    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerMessage::kind).collect()
    }
}

struct Harness {
    router: MessageRouter,
    sessions: Arc<InMemorySessions>,
}

fn oracle() -> InMemoryPermissions {
    InMemoryPermissions::new()
        .with_grant("doc1", "alice@x.com", PermissionLevel::Owner)
        .with_grant("doc1", "bob@x.com", PermissionLevel::Editor)
        .with_grant("doc1", "vera@x.com", PermissionLevel::Viewer)
        .with_grant("doc2", "alice@x.com", PermissionLevel::Editor)
        .with_grant("doc2", "carol@x.com", PermissionLevel::Owner)
        .with_share_token("doc1", "share-1")
}

fn harness_with(
    permissions: Arc<dyn PermissionOracle>,
    sessions: Arc<InMemorySessions>,
    config: RouterConfig,
) -> Harness {
    let router = MessageRouter::new(
        Arc::new(ConnectionRegistry::new()),
        Arc::new(RoomDirectory::new()),
        permissions,
        sessions.clone(),
        config,
    );
    Harness { router, sessions }
}

fn harness() -> Harness {
    harness_with(Arc::new(oracle()), Arc::new(InMemorySessions::new()), RouterConfig::default())
}

impl Harness {
    fn connect(&self) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.router.connect(ConnectionHandle::new(id, tx));
        let mut client = Client { id, rx };
        assert_eq!(client.kinds(), vec!["connected"]);
        client
    }

    async fn send(&self, client: &Client, msg: Value) {
        self.router.handle_text(client.id, &msg.to_string()).await;
    }

    async fn authenticate(&self, client: &mut Client, user_id: &str, user_email: &str) {
        self.send(
            client,
            json!({"type": "authenticate", "userId": user_id, "userEmail": user_email}),
        )
        .await;
        assert_eq!(client.kinds(), vec!["authenticated"]);
    }

    async fn join(&self, client: &mut Client, document_id: &str) -> Uuid {
        self.send(client, json!({"type": "join-document", "documentId": document_id}))
            .await;
        match client.drain().as_slice() {
            [ServerMessage::UserJoined { session_id, .. }, ServerMessage::SessionCreated { data, .. }] => {
                assert_eq!(*session_id, data.session_id);
                *session_id
            }
            other => panic!("unexpected join replies {:?}", other),
        }
    }

    async fn client(&self, user_id: &str, user_email: &str, document_id: Option<&str>) -> Client {
        let mut client = self.connect();
        self.authenticate(&mut client, user_id, user_email).await;
        if let Some(document_id) = document_id {
            self.join(&mut client, document_id).await;
        }
        client
    }
}

fn error_text(msgs: &[ServerMessage]) -> Vec<String> {
    msgs.iter()
        .filter_map(|m| match m {
            ServerMessage::Error { error, .. } => Some(error.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_unauthenticated_messages_are_rejected() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut anon = h.connect();

    let messages = [
        json!({"type": "join-document", "documentId": "doc1"}),
        json!({"type": "leave-document"}),
        json!({"type": "document-change", "documentId": "doc1", "data": {"operation": {"type": "insert"}}}),
        json!({"type": "cursor-update", "documentId": "doc1", "data": {"position": 1}}),
        json!({"type": "user-presence", "documentId": "doc1", "data": {"status": "idle"}}),
        json!({"type": "ping"}),
        json!({"type": "join-document"}),
    ];

    for msg in messages {
        h.send(&anon, msg).await;
        let replies = anon.drain();
        assert_eq!(error_text(&replies), vec!["Authentication required".to_string()]);
        assert_eq!(replies.len(), 1);
    }

    assert!(alice.drain().is_empty());
    assert_eq!(h.router.rooms().members("doc1").len(), 1);
    assert_eq!(h.sessions.len(), 1);
}

#[tokio::test]
async fn test_failed_authentication_keeps_connection_unauthenticated() {
    let h = harness();
    let mut client = h.connect();

    h.send(&client, json!({"type": "authenticate", "userId": "u9", "userEmail": "mallory@x.com"}))
        .await;
    assert_eq!(error_text(&client.drain()), vec!["Invalid user".to_string()]);

    h.send(&client, json!({"type": "authenticate", "userEmail": "alice@x.com"})).await;
    assert_eq!(
        error_text(&client.drain()),
        vec!["Missing required authentication fields: userId and userEmail".to_string()]
    );

    h.send(&client, json!({"type": "join-document", "documentId": "doc1"})).await;
    assert_eq!(error_text(&client.drain()), vec!["Authentication required".to_string()]);
    assert!(!h.router.registry().is_authenticated(client.id));

    // still open, a correct attempt succeeds
    h.authenticate(&mut client, "u1", "alice@x.com").await;
    assert!(h.router.registry().is_authenticated(client.id));
}

#[tokio::test]
async fn test_authenticated_reply_echoes_identity() {
    let h = harness();
    let mut client = h.connect();
    h.send(
        &client,
        json!({"type": "authenticate", "userId": "u1", "userEmail": "alice@x.com", "userName": "Alice", "userImage": "a.png"}),
    )
    .await;

    match client.drain().as_slice() {
        [ServerMessage::Authenticated { user, share_token, .. }] => {
            assert_eq!(user.user_id, "u1");
            assert_eq!(user.user_email, "alice@x.com");
            assert_eq!(user.user_name.as_deref(), Some("Alice"));
            assert_eq!(user.user_image.as_deref(), Some("a.png"));
            assert!(share_token.is_none());
        }
        other => panic!("unexpected replies {:?}", other),
    }
}

#[tokio::test]
async fn test_join_sequence_and_peer_notification() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", None).await;

    h.send(&alice, json!({"type": "join-document", "documentId": "doc1", "userId": "u1", "userEmail": "alice@x.com"}))
        .await;
    assert_eq!(alice.kinds(), vec!["user-joined", "session-created"]);

    let mut bob = h.client("u2", "bob@x.com", None).await;
    let bob_session = h.join(&mut bob, "doc1").await;

    match alice.drain().as_slice() {
        [ServerMessage::UserJoined { user, session_id, .. }] => {
            assert_eq!(user.user_id, "u2");
            assert_eq!(user.user_email, "bob@x.com");
            assert_eq!(*session_id, bob_session);
        }
        other => panic!("alice expected one user-joined, got {:?}", other),
    }
    assert!(bob.drain().is_empty());

    let session = h.sessions.get(bob_session).unwrap();
    assert_eq!(session.document_id, "doc1");
    assert_eq!(session.user_email, "bob@x.com");
    assert_eq!(h.router.registry().get(bob.id).unwrap().session_id, Some(bob_session));
}

#[tokio::test]
async fn test_join_requires_viewer_access() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", None).await;
    h.send(&alice, json!({"type": "join-document", "documentId": "doc-unknown"})).await;
    assert_eq!(
        error_text(&alice.drain()),
        vec!["Access denied: viewer permission required".to_string()]
    );
    assert!(!h.router.rooms().contains("doc-unknown"));
    assert!(h.sessions.is_empty());
}

#[tokio::test]
async fn test_document_change_is_relayed_without_echo() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut bob = h.client("u2", "bob@x.com", Some("doc1")).await;
    alice.drain();

    let data = json!({"operation": {"type": "insert", "position": 0, "content": "hi"}});
    h.send(&alice, json!({"type": "document-change", "documentId": "doc1", "data": data})).await;

    match bob.drain().as_slice() {
        [ServerMessage::DocumentChange { user_id, user_email, data: relayed, is_ack, .. }] => {
            assert_eq!(user_id, "u1");
            assert_eq!(user_email, "alice@x.com");
            assert_eq!(relayed, &data);
            assert!(is_ack.is_none());
        }
        other => panic!("bob expected one document-change, got {:?}", other),
    }
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn test_sync_request_is_rebroadcast_like_any_change() {
    let h = harness();
    let alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut bob = h.client("u2", "bob@x.com", Some("doc1")).await;

    let data = json!({"operation": {"type": "sync-request", "anything": [1, {"x": null}]}});
    h.send(&alice, json!({"type": "document-change", "documentId": "doc1", "data": data})).await;
    assert_eq!(bob.kinds(), vec!["document-change"]);
}

#[tokio::test]
async fn test_viewer_cannot_change_document() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut vera = h.client("u4", "vera@x.com", Some("doc1")).await;
    alice.drain();

    h.send(
        &vera,
        json!({"type": "document-change", "documentId": "doc1", "data": {"operation": {"type": "delete"}}}),
    )
    .await;

    assert_eq!(
        error_text(&vera.drain()),
        vec!["Access denied: editor permission required".to_string()]
    );
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn test_cursor_and_presence_exclude_sender() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut vera = h.client("u4", "vera@x.com", Some("doc1")).await;
    alice.drain();

    let cursor = json!({"position": 7, "selection": [7, 9]});
    h.send(&vera, json!({"type": "cursor-update", "documentId": "doc1", "data": cursor})).await;
    match alice.drain().as_slice() {
        [ServerMessage::CursorUpdate { user, data, .. }] => {
            assert_eq!(user.user_id, "u4");
            assert_eq!(data, &cursor);
        }
        other => panic!("alice expected one cursor-update, got {:?}", other),
    }
    assert!(vera.drain().is_empty());

    let session_id = h.router.registry().get(vera.id).unwrap().session_id.unwrap();
    assert_eq!(h.sessions.get(session_id).unwrap().cursor_position, Some(cursor));

    // document id falls back to the joined document
    h.send(&vera, json!({"type": "user-presence", "data": {"status": "typing"}})).await;
    match alice.drain().as_slice() {
        [ServerMessage::UserPresence { user, data, .. }] => {
            assert_eq!(user.user_email, "vera@x.com");
            assert_eq!(data, &json!({"status": "typing"}));
        }
        other => panic!("alice expected one user-presence, got {:?}", other),
    }
    assert!(vera.drain().is_empty());
}

#[tokio::test]
async fn test_cursor_without_document_is_malformed() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", None).await;
    h.send(&alice, json!({"type": "cursor-update", "data": {"position": 1}})).await;
    let errors = error_text(&alice.drain());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Invalid message format"));
}

#[tokio::test]
async fn test_leave_twice_broadcasts_once() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut bob = h.client("u2", "bob@x.com", Some("doc1")).await;
    alice.drain();

    h.send(&bob, json!({"type": "leave-document"})).await;
    h.send(&bob, json!({"type": "leave-document"})).await;
    h.router.disconnect(bob.id).await;

    assert_eq!(alice.kinds(), vec!["user-left"]);
    assert!(bob.drain().is_empty());
    assert_eq!(h.sessions.len(), 1);
    assert_eq!(h.router.rooms().members("doc1").len(), 1);
}

#[tokio::test]
async fn test_disconnect_notifies_room_and_cleans_up() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let bob = h.client("u2", "bob@x.com", Some("doc1")).await;
    alice.drain();

    h.router.disconnect(bob.id).await;
    h.router.disconnect(bob.id).await;

    match alice.drain().as_slice() {
        [ServerMessage::UserLeft { user, .. }] => {
            assert_eq!(user.user_id, "u2");
            assert_eq!(user.user_email, "bob@x.com");
        }
        other => panic!("alice expected one user-left, got {:?}", other),
    }
    assert!(!h.router.rooms().members("doc1").contains(&bob.id));
    assert!(!h.router.registry().is_authenticated(bob.id));
    assert_eq!(h.sessions.len(), 1);
    assert_eq!(h.router.registry().stats().connections, 1);
}

#[tokio::test]
async fn test_room_removed_after_everyone_leaves() {
    let h = harness();
    let mut clients = Vec::new();
    for i in 0..4 {
        let email = if i % 2 == 0 { "alice@x.com" } else { "bob@x.com" };
        clients.push(h.client(&format!("u{}", i), email, Some("doc1")).await);
    }
    assert_eq!(h.router.rooms().members("doc1").len(), 4);

    h.send(&clients[2], json!({"type": "leave-document"})).await;
    h.router.disconnect(clients[0].id).await;
    h.router.disconnect(clients[3].id).await;
    h.send(&clients[1], json!({"type": "leave-document"})).await;

    assert!(!h.router.rooms().contains("doc1"));
    assert_eq!(h.router.rooms().room_count(), 0);
    assert!(h.sessions.is_empty());
}

#[tokio::test]
async fn test_guest_authentication_and_limits() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut guest = h.connect();

    h.send(
        &guest,
        json!({"type": "authenticate", "userId": "g1", "userEmail": "guest_1@example.com", "documentId": "doc1"}),
    )
    .await;
    assert_eq!(
        error_text(&guest.drain()),
        vec!["Guest access denied: invalid or expired share token".to_string()]
    );
    assert!(!h.router.registry().is_authenticated(guest.id));

    h.send(
        &guest,
        json!({"type": "authenticate", "userId": "g1", "userEmail": "guest_1@example.com", "documentId": "doc1", "shareToken": "share-1"}),
    )
    .await;
    match guest.drain().as_slice() {
        [ServerMessage::Authenticated { share_token, .. }] => {
            assert_eq!(share_token.as_deref(), Some("share-1"));
        }
        other => panic!("unexpected replies {:?}", other),
    }
    assert!(h.router.registry().get(guest.id).unwrap().is_guest());

    // capped at viewer and confined to the shared document
    h.join(&mut guest, "doc1").await;
    alice.drain();
    h.send(&guest, json!({"type": "document-change", "documentId": "doc1", "data": {}})).await;
    assert_eq!(
        error_text(&guest.drain()),
        vec!["Access denied: editor permission required".to_string()]
    );
    assert!(alice.drain().is_empty());

    h.send(&guest, json!({"type": "join-document", "documentId": "doc2"})).await;
    assert_eq!(
        error_text(&guest.drain()),
        vec!["Access denied: viewer permission required".to_string()]
    );
    assert!(h.router.rooms().members("doc1").contains(&guest.id));
}

#[tokio::test]
async fn test_ack_policy_echoes_change_to_sender() {
    let config = RouterConfig {
        ack_document_changes: true,
        ..RouterConfig::default()
    };
    let h = harness_with(Arc::new(oracle()), Arc::new(InMemorySessions::new()), config);
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut bob = h.client("u2", "bob@x.com", Some("doc1")).await;
    alice.drain();

    h.send(&bob, json!({"type": "document-change", "documentId": "doc1", "data": {"v": 1}})).await;

    match bob.drain().as_slice() {
        [ServerMessage::DocumentChange { is_ack, .. }] => assert_eq!(*is_ack, Some(true)),
        other => panic!("bob expected an ack, got {:?}", other),
    }
    match alice.drain().as_slice() {
        [ServerMessage::DocumentChange { is_ack, .. }] => assert!(is_ack.is_none()),
        other => panic!("alice expected one change, got {:?}", other),
    }
}

#[tokio::test]
async fn test_switching_documents_leaves_previous_room() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut bob = h.client("u2", "bob@x.com", Some("doc1")).await;
    alice.drain();
    let first_session = h.router.registry().get(alice.id).unwrap().session_id.unwrap();

    let second_session = h.join(&mut alice, "doc2").await;

    assert_eq!(bob.kinds(), vec!["user-left"]);
    assert!(h.sessions.get(first_session).is_none());
    assert!(h.sessions.get(second_session).is_some());
    assert!(!h.router.rooms().members("doc1").contains(&alice.id));
    assert!(h.router.rooms().members("doc2").contains(&alice.id));
}

#[tokio::test]
async fn test_reauthentication_while_joined() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut watcher = h.client("u2", "bob@x.com", Some("doc1")).await;
    alice.drain();

    h.authenticate(&mut watcher, "u5", "vera@x.com").await;
    h.router.disconnect(watcher.id).await;

    match alice.drain().as_slice() {
        [ServerMessage::UserLeft { user, .. }] => assert_eq!(user.user_email, "vera@x.com"),
        other => panic!("alice expected one user-left, got {:?}", other),
    }
    assert_eq!(h.router.rooms().members("doc1").len(), 1);
    assert_eq!(h.sessions.len(), 1);
}

#[tokio::test]
async fn test_session_store_failure_becomes_error() {
    let h = harness_with(Arc::new(oracle()), Arc::new(InMemorySessions::failing()), RouterConfig::default());
    let mut alice = h.client("u1", "alice@x.com", None).await;

    h.send(&alice, json!({"type": "join-document", "documentId": "doc1"})).await;
    let errors = error_text(&alice.drain());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Internal server error"));
    assert!(!h.router.rooms().contains("doc1"));

    // the failed join left no membership behind
    h.send(&alice, json!({"type": "user-presence", "documentId": "doc1", "data": {}})).await;
    assert_eq!(error_text(&alice.drain()), vec!["Not a member of document doc1".to_string()]);
    h.router.disconnect(alice.id).await;
}

#[tokio::test]
async fn test_failed_switch_keeps_current_room() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut bob = h.client("u2", "bob@x.com", Some("doc1")).await;
    alice.drain();
    let session_id = h.router.registry().get(alice.id).unwrap().session_id.unwrap();

    h.sessions.set_failing(true);
    h.send(&alice, json!({"type": "join-document", "documentId": "doc2"})).await;
    let errors = error_text(&alice.drain());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Internal server error"));

    assert!(bob.drain().is_empty());
    let record = h.router.registry().get(alice.id).unwrap();
    assert_eq!(record.current_document_id.as_deref(), Some("doc1"));
    assert_eq!(record.session_id, Some(session_id));
    assert!(h.router.rooms().members("doc1").contains(&alice.id));
    assert!(!h.router.rooms().contains("doc2"));

    h.sessions.set_failing(false);
    assert!(h.sessions.get(session_id).is_some());
}

#[tokio::test]
async fn test_session_bookkeeping_failures_stay_silent() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut bob = h.client("u2", "bob@x.com", Some("doc1")).await;
    let mut vera = h.client("u4", "vera@x.com", Some("doc1")).await;
    alice.drain();
    bob.drain();

    h.sessions.set_failing(true);

    h.send(&vera, json!({"type": "cursor-update", "data": {"position": 2}})).await;
    assert_eq!(alice.kinds(), vec!["cursor-update"]);
    assert_eq!(bob.kinds(), vec!["cursor-update"]);
    assert!(vera.drain().is_empty());

    h.send(&bob, json!({"type": "leave-document"})).await;
    assert_eq!(alice.kinds(), vec!["user-left"]);
    assert_eq!(vera.kinds(), vec!["user-left"]);
    assert!(bob.drain().is_empty());

    h.router.disconnect(vera.id).await;
    assert_eq!(alice.kinds(), vec!["user-left"]);
    assert_eq!(h.router.rooms().members("doc1").len(), 1);

    // nothing could be removed
    assert_eq!(h.sessions.len(), 3);
}

#[tokio::test]
async fn test_events_cannot_target_another_room() {
    let h = harness();
    let mut carol = h.client("u5", "carol@x.com", Some("doc2")).await;
    let mut guest = h.connect();
    h.send(
        &guest,
        json!({"type": "authenticate", "userId": "g1", "userEmail": "guest_1@example.com", "documentId": "doc1", "shareToken": "share-1"}),
    )
    .await;
    assert_eq!(guest.kinds(), vec!["authenticated"]);
    h.join(&mut guest, "doc1").await;

    h.send(&guest, json!({"type": "cursor-update", "documentId": "doc2", "data": {"spoof": true}})).await;
    h.send(&guest, json!({"type": "user-presence", "documentId": "doc2", "data": {"spoof": true}})).await;
    assert_eq!(
        error_text(&guest.drain()),
        vec!["Not a member of document doc2".to_string(); 2]
    );

    // a registered user outside the room is refused the same way
    let mut vera = h.client("u4", "vera@x.com", Some("doc1")).await;
    h.send(&vera, json!({"type": "user-presence", "documentId": "doc2", "data": {}})).await;
    assert_eq!(error_text(&vera.drain()), vec!["Not a member of document doc2".to_string()]);

    assert!(carol.drain().is_empty());
}

#[tokio::test]
async fn test_rejoining_same_document_only_confirms() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", Some("doc1")).await;
    let mut bob = h.client("u2", "bob@x.com", Some("doc1")).await;
    alice.drain();
    let session_id = h.router.registry().get(alice.id).unwrap().session_id.unwrap();

    assert_eq!(h.join(&mut alice, "doc1").await, session_id);
    assert!(bob.drain().is_empty());
    assert_eq!(h.sessions.len(), 2);
    assert_eq!(h.router.rooms().members("doc1").len(), 2);
}

#[tokio::test]
async fn test_malformed_frames() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", None).await;

    h.router.handle_text(alice.id, "{not json").await;
    h.send(&alice, json!({"type": "teleport"})).await;
    h.send(&alice, json!({"type": "document-change", "documentId": "doc1"})).await;

    let errors = error_text(&alice.drain());
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| e.starts_with("Invalid message format")));
}

#[tokio::test]
async fn test_ping_pong() {
    let h = harness();
    let mut alice = h.client("u1", "alice@x.com", None).await;
    h.send(&alice, json!({"type": "ping"})).await;
    assert_eq!(alice.kinds(), vec!["pong"]);
}

struct PanickingOracle;

#[async_trait]
impl PermissionOracle for PanickingOracle {
    async fn check_document_permission(
        &self,
        _document_id: &str,
        _user_email: &str,
        _required: PermissionLevel,
    ) -> Result<PermissionCheck, StoreError> {
        panic!("permission backend exploded");
    }

    async fn validate_user(&self, _user_email: &str) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn validate_guest_access(&self, _document_id: &str, _share_token: &str) -> Result<GuestAccess, StoreError> {
        Ok(GuestAccess::denied())
    }
}

#[tokio::test]
async fn test_handler_panic_is_reported_not_fatal() {
    let h = harness_with(Arc::new(PanickingOracle), Arc::new(InMemorySessions::new()), RouterConfig::default());
    let mut alice = h.client("u1", "alice@x.com", None).await;

    h.send(&alice, json!({"type": "join-document", "documentId": "doc1"})).await;
    let errors = error_text(&alice.drain());
    assert_eq!(errors, vec!["Internal server error: permission backend exploded".to_string()]);

    h.send(&alice, json!({"type": "ping"})).await;
    assert_eq!(alice.kinds(), vec!["pong"]);
    assert!(h.sessions.is_empty());
}
