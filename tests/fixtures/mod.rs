//! Shared fixtures for integration tests

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use game_lobby::config::AppConfig;
use game_lobby::service::AppState;
use game_lobby::types::{ClientEvent, ConnectionId, RoomId, ServerEvent};

/// One simulated real-time client: a registered connection plus a
/// session token issued by the in-memory store.
pub struct TestClient {
    pub connection_id: ConnectionId,
    pub token: String,
    pub rx: UnboundedReceiver<ServerEvent>,
}

impl TestClient {
    /// Next pending event; panics when the queue is empty.
    pub fn recv(&mut self) -> ServerEvent {
        self.rx.try_recv().expect("expected a pending event")
    }

    /// Assert nothing is queued for this client.
    pub fn assert_silent(&mut self) {
        assert!(self.rx.try_recv().is_err(), "expected no pending event");
    }

    /// Discard everything queued so far.
    pub fn drain(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}

/// Fully wired system with the default catalogue (roulette).
pub fn create_test_system() -> Arc<AppState> {
    AppState::build(AppConfig::default()).expect("failed to build app state")
}

/// Register a connection and issue a token for `account`.
pub fn connect(state: &AppState, account: &str, display: &str) -> TestClient {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let connection_id = state.router.connect(tx).expect("failed to register connection");
    let token = state
        .sessions
        .issue_token(account, display)
        .expect("failed to issue token");
    TestClient {
        connection_id,
        token,
        rx,
    }
}

/// Send one authenticated event through the router.
pub async fn send(state: &AppState, client: &TestClient, event: ClientEvent) {
    state
        .router
        .handle_event(client.connection_id, &client.token, event)
        .await
        .expect("router infrastructure failure");
}

/// Extract the room id from a room_created event.
pub fn created_room_id(event: ServerEvent) -> RoomId {
    match event {
        ServerEvent::RoomCreated { room } => room.id,
        other => panic!("expected room_created, got {:?}", other),
    }
}
