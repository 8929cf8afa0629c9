//! Inbound event dispatch
//!
//! One entry point per inbound message: resolve the token, bind the
//! connection, and route the intent to the room manager. Outbound
//! notifications (sender-only confirmations and room-wide fan-outs) are
//! emitted by the manager inside its critical sections; the router only
//! adds the sender-only `error` event for recoverable failures, so
//! nothing inbound can crash it.

use std::sync::Arc;

use serde_json::json;

use crate::error::Result;
use crate::room::RoomManager;
use crate::router::connections::{ConnectionRegistry, EventSender};
use crate::session::SessionOracle;
use crate::types::{ClientEvent, ConnectionId, ServerEvent, SessionIdentity};

pub struct EventRouter {
    manager: Arc<RoomManager>,
    sessions: Arc<dyn SessionOracle>,
    connections: Arc<ConnectionRegistry>,
}

impl EventRouter {
    pub fn new(
        manager: Arc<RoomManager>,
        sessions: Arc<dyn SessionOracle>,
        connections: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            manager,
            sessions,
            connections,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Attach a new transport connection and hand back its id.
    pub fn connect(&self, sender: EventSender) -> Result<ConnectionId> {
        self.connections.register(sender)
    }

    /// Handle one inbound message. Authentication or dispatch failures
    /// are reported to the sender only; the Err path is reserved for
    /// infrastructure faults (poisoned locks, dead oracle).
    pub async fn handle_event(
        &self,
        connection_id: ConnectionId,
        token: &str,
        event: ClientEvent,
    ) -> Result<()> {
        let identity = match self.sessions.resolve(token).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!("Rejected event on connection {}: {}", connection_id, err);
                return self.send_error(connection_id, &err);
            }
        };
        self.connections.bind_account(connection_id, &identity.account)?;

        if let Err(err) = self.dispatch(&identity, event).await {
            tracing::warn!(
                "Event from '{}' on connection {} failed: {}",
                identity.account,
                connection_id,
                err
            );
            return self.send_error(connection_id, &err);
        }
        Ok(())
    }

    /// Transport drop: implicit leave plus connection cleanup. Remaining
    /// members get the updated roster from the manager.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<()> {
        let Some(account) = self.connections.unregister(connection_id)? else {
            return Ok(());
        };
        tracing::info!("Connection {} ('{}') dropped", connection_id, account);
        self.manager.leave_room(&account).await?;
        Ok(())
    }

    async fn dispatch(&self, identity: &SessionIdentity, event: ClientEvent) -> Result<()> {
        let account = &identity.account;
        match event {
            ClientEvent::CreateRoom => {
                self.manager
                    .create_room(account, &identity.display_name)
                    .await?;
            }
            ClientEvent::JoinRoom {
                room_id,
                display_id,
            } => {
                self.manager.join_room(account, room_id, &display_id).await?;
            }
            ClientEvent::LeaveRoom => {
                self.manager.leave_room(account).await?;
            }
            ClientEvent::SelectGame { game_id } => {
                self.manager.select_game(account, &game_id)?;
            }
            ClientEvent::StartGame => {
                self.manager.start_game(account)?;
            }
            ClientEvent::GameEvent {
                event_name,
                event_data,
            } => {
                let payload = json!({
                    "event_name": event_name,
                    "event_data": event_data,
                });
                self.manager.dispatch_event(account, &payload)?;
            }
            ClientEvent::GameState => {
                self.manager.game_state(account)?;
            }
        }
        Ok(())
    }

    fn send_error(&self, connection_id: ConnectionId, err: &anyhow::Error) -> Result<()> {
        self.connections.send_to_connection(
            connection_id,
            ServerEvent::Error {
                message: err.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameRegistry, RouletteGame};
    use crate::session::MemorySessionStore;
    use crate::types::RoomId;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct TestClient {
        connection_id: ConnectionId,
        token: String,
        rx: UnboundedReceiver<ServerEvent>,
    }

    impl TestClient {
        fn recv(&mut self) -> ServerEvent {
            self.rx.try_recv().expect("expected a pending event")
        }

        fn assert_silent(&mut self) {
            assert!(self.rx.try_recv().is_err(), "expected no pending event");
        }
    }

    fn create_test_router() -> (EventRouter, Arc<MemorySessionStore>) {
        let registry = GameRegistry::new();
        registry.register(RouletteGame::catalogue_entry()).unwrap();
        let sessions = Arc::new(MemorySessionStore::new());
        let connections = Arc::new(ConnectionRegistry::new());
        let manager = Arc::new(RoomManager::new(
            Arc::new(registry),
            sessions.clone(),
            connections.clone(),
        ));
        let router = EventRouter::new(manager, sessions.clone(), connections);
        (router, sessions)
    }

    fn connect_client(
        router: &EventRouter,
        sessions: &MemorySessionStore,
        account: &str,
        display: &str,
    ) -> TestClient {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let connection_id = router.connect(tx).unwrap();
        let token = sessions.issue_token(account, display).unwrap();
        TestClient {
            connection_id,
            token,
            rx,
        }
    }

    async fn send(router: &EventRouter, client: &TestClient, event: ClientEvent) {
        router
            .handle_event(client.connection_id, &client.token, event)
            .await
            .unwrap();
    }

    fn created_room_id(event: ServerEvent) -> RoomId {
        match event {
            ServerEvent::RoomCreated { room } => room.id,
            other => panic!("expected room_created, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_token_gets_error_and_nothing_else() {
        let (router, _) = create_test_router();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let connection_id = router.connect(tx).unwrap();

        router
            .handle_event(connection_id, "no-such-token", ClientEvent::CreateRoom)
            .await
            .unwrap();
        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::Error { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_create_is_sender_only() {
        let (router, sessions) = create_test_router();
        let mut alice = connect_client(&router, &sessions, "alice", "Ali");
        let mut other = connect_client(&router, &sessions, "bob", "Bobby");

        send(&router, &alice, ClientEvent::CreateRoom).await;
        // Binding only happens on an authenticated event; ping bob once
        // so his connection is bound before asserting silence.
        send(&router, &other, ClientEvent::LeaveRoom).await;
        other.recv();

        assert!(matches!(alice.recv(), ServerEvent::RoomCreated { .. }));
        alice.assert_silent();
        other.assert_silent();
    }

    #[tokio::test]
    async fn test_join_broadcasts_roster_to_all_members() {
        let (router, sessions) = create_test_router();
        let mut alice = connect_client(&router, &sessions, "alice", "Ali");
        let mut bob = connect_client(&router, &sessions, "bob", "Bobby");

        send(&router, &alice, ClientEvent::CreateRoom).await;
        let room_id = created_room_id(alice.recv());

        send(
            &router,
            &bob,
            ClientEvent::JoinRoom {
                room_id,
                display_id: "Bobby".to_string(),
            },
        )
        .await;

        for client in [&mut alice, &mut bob] {
            match client.recv() {
                ServerEvent::RoomRoster { room } => {
                    assert_eq!(room.players, vec!["alice", "bob"]);
                }
                other => panic!("expected room_roster, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_join_missing_room_errors_sender_only() {
        let (router, sessions) = create_test_router();
        let mut alice = connect_client(&router, &sessions, "alice", "Ali");

        send(
            &router,
            &alice,
            ClientEvent::JoinRoom {
                room_id: crate::utils::generate_room_id(),
                display_id: "Ali".to_string(),
            },
        )
        .await;
        match alice.recv() {
            ServerEvent::Error { message } => assert!(message.contains("Room not found")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_select_and_start_notify_whole_room() {
        let (router, sessions) = create_test_router();
        let mut alice = connect_client(&router, &sessions, "alice", "Ali");
        let mut bob = connect_client(&router, &sessions, "bob", "Bobby");

        send(&router, &alice, ClientEvent::CreateRoom).await;
        let room_id = created_room_id(alice.recv());
        send(
            &router,
            &bob,
            ClientEvent::JoinRoom {
                room_id,
                display_id: "Bobby".to_string(),
            },
        )
        .await;
        alice.recv();
        bob.recv();

        send(
            &router,
            &alice,
            ClientEvent::SelectGame {
                game_id: "roulette".to_string(),
            },
        )
        .await;
        for client in [&mut alice, &mut bob] {
            match client.recv() {
                ServerEvent::GameSelected { game_id, .. } => assert_eq!(game_id, "roulette"),
                other => panic!("expected game_selected, got {:?}", other),
            }
        }

        send(&router, &alice, ClientEvent::StartGame).await;
        for client in [&mut alice, &mut bob] {
            match client.recv() {
                ServerEvent::GameStarted { room, state } => {
                    assert!(room.started);
                    assert_eq!(state["players"].as_array().unwrap().len(), 2);
                }
                other => panic!("expected game_started, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_broadcast_flag_controls_game_event_scope() {
        let (router, sessions) = create_test_router();
        let mut alice = connect_client(&router, &sessions, "alice", "Ali");
        let mut bob = connect_client(&router, &sessions, "bob", "Bobby");

        send(&router, &alice, ClientEvent::CreateRoom).await;
        let room_id = created_room_id(alice.recv());
        send(
            &router,
            &bob,
            ClientEvent::JoinRoom {
                room_id,
                display_id: "Bobby".to_string(),
            },
        )
        .await;
        send(
            &router,
            &alice,
            ClientEvent::SelectGame {
                game_id: "roulette".to_string(),
            },
        )
        .await;
        send(&router, &alice, ClientEvent::StartGame).await;
        while alice.rx.try_recv().is_ok() {}
        while bob.rx.try_recv().is_ok() {}

        // test_input echoes with broadcast=true: both members see it.
        send(
            &router,
            &bob,
            ClientEvent::GameEvent {
                event_name: "test_input".to_string(),
                event_data: json!({"input": "hi"}),
            },
        )
        .await;
        for client in [&mut alice, &mut bob] {
            match client.recv() {
                ServerEvent::GameEvent { sender, payload, .. } => {
                    assert_eq!(sender, "bob");
                    assert_eq!(payload["ok"], true);
                    assert_eq!(payload["echo"], "hi");
                }
                other => panic!("expected game_event, got {:?}", other),
            }
        }

        // Unknown event names fail sender-only.
        send(
            &router,
            &bob,
            ClientEvent::GameEvent {
                event_name: "no_such_event".to_string(),
                event_data: json!({}),
            },
        )
        .await;
        match bob.recv() {
            ServerEvent::GameEvent { payload, .. } => assert_eq!(payload["ok"], false),
            other => panic!("expected game_event, got {:?}", other),
        }
        alice.assert_silent();
    }

    #[tokio::test]
    async fn test_game_state_is_sender_only() {
        let (router, sessions) = create_test_router();
        let mut alice = connect_client(&router, &sessions, "alice", "Ali");
        let mut bob = connect_client(&router, &sessions, "bob", "Bobby");

        send(&router, &alice, ClientEvent::CreateRoom).await;
        let room_id = created_room_id(alice.recv());
        send(
            &router,
            &bob,
            ClientEvent::JoinRoom {
                room_id,
                display_id: "Bobby".to_string(),
            },
        )
        .await;
        send(
            &router,
            &alice,
            ClientEvent::SelectGame {
                game_id: "roulette".to_string(),
            },
        )
        .await;
        send(&router, &alice, ClientEvent::StartGame).await;
        while alice.rx.try_recv().is_ok() {}
        while bob.rx.try_recv().is_ok() {}

        send(&router, &bob, ClientEvent::GameState).await;
        match bob.recv() {
            ServerEvent::GameState { state, .. } => {
                assert_eq!(state["type"], "roulette");
            }
            other => panic!("expected game_state, got {:?}", other),
        }
        alice.assert_silent();
    }

    #[tokio::test]
    async fn test_disconnect_triggers_implicit_leave() {
        let (router, sessions) = create_test_router();
        let mut alice = connect_client(&router, &sessions, "alice", "Ali");
        let mut bob = connect_client(&router, &sessions, "bob", "Bobby");

        send(&router, &alice, ClientEvent::CreateRoom).await;
        let room_id = created_room_id(alice.recv());
        send(
            &router,
            &bob,
            ClientEvent::JoinRoom {
                room_id,
                display_id: "Bobby".to_string(),
            },
        )
        .await;
        alice.recv();
        bob.recv();

        router.disconnect(alice.connection_id).await.unwrap();
        match bob.recv() {
            ServerEvent::RoomRoster { room } => {
                assert_eq!(room.players, vec!["bob"]);
                assert_eq!(room.host, "bob");
            }
            other => panic!("expected room_roster, got {:?}", other),
        }

        // Last member dropping deletes the room.
        router.disconnect(bob.connection_id).await.unwrap();
        assert_eq!(sessions.room_pointer("bob").unwrap(), None);
    }
}
