//! Room manager: owns the room table and membership transitions
//!
//! The table itself is guarded by a short-lived RwLock; each room sits
//! behind its own Mutex so operations on different rooms never block on
//! each other. The membership index is its own short-lived section:
//! joins reserve the entry before touching the room and roll the
//! reservation back on failure, so no global lock is held across a room
//! mutation. Outbound notifications are enqueued through the event sink
//! while the emitting operation still holds its room's critical section,
//! which pins per-connection delivery order to commit order. No lock is
//! ever held across an await point; the external identity pointer is
//! updated after every membership change once all guards are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde_json::Value;

use crate::error::{LobbyError, Result};
use crate::game::{GameRegistry, GameResponse};
use crate::room::room::Room;
use crate::router::connections::EventSink;
use crate::session::SessionOracle;
use crate::types::{AccountId, RoomId, RoomSummary, ServerEvent};
use crate::utils::generate_room_id;

/// Result of a leave operation.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    /// The room the account left.
    pub room_id: RoomId,
    /// Remaining roster; `None` when the room emptied and was deleted.
    pub remaining: Option<RoomSummary>,
}

pub struct RoomManager {
    /// Active rooms. Insertions and deletions take the table lock; all
    /// per-room work happens under the room's own mutex.
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<Room>>>>,
    /// Maps each account to the room it is currently in. An account is
    /// in at most one room at a time (key invariant). Joins insert the
    /// entry as a reservation before the room mutation and remove it
    /// again if the mutation fails.
    memberships: RwLock<HashMap<AccountId, RoomId>>,
    registry: Arc<GameRegistry>,
    sessions: Arc<dyn SessionOracle>,
    notifier: Arc<dyn EventSink>,
}

impl RoomManager {
    pub fn new(
        registry: Arc<GameRegistry>,
        sessions: Arc<dyn SessionOracle>,
        notifier: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            memberships: RwLock::new(HashMap::new()),
            registry,
            sessions,
            notifier,
        }
    }

    fn lock_room<'a>(&self, room: &'a Arc<Mutex<Room>>) -> Result<MutexGuard<'a, Room>> {
        room.lock()
            .map_err(|_| LobbyError::internal("Room lock poisoned").into())
    }

    fn room_handle(&self, room_id: RoomId) -> Result<Arc<Mutex<Room>>> {
        let rooms = self
            .rooms
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire room table lock"))?;
        rooms
            .get(&room_id)
            .cloned()
            .ok_or_else(|| {
                LobbyError::RoomNotFound {
                    room_id: room_id.to_string(),
                }
                .into()
            })
    }

    /// The room an account currently belongs to, by this manager's books.
    pub fn current_room(&self, account: &str) -> Result<Option<RoomId>> {
        let memberships = self
            .memberships
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire membership lock"))?;
        Ok(memberships.get(account).copied())
    }

    fn member_room(&self, account: &AccountId) -> Result<(RoomId, Arc<Mutex<Room>>)> {
        let room_id = self.current_room(account)?.ok_or_else(|| {
            LobbyError::RoomNotFound {
                room_id: format!("(account '{}' is not in a room)", account),
            }
        })?;
        Ok((room_id, self.room_handle(room_id)?))
    }

    /// Claim the membership entry for an account. Held as a reservation
    /// while the room mutation runs; released on failure.
    fn reserve_membership(&self, account: &AccountId, room_id: RoomId) -> Result<()> {
        let mut memberships = self
            .memberships
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire membership lock"))?;
        if memberships.contains_key(account) {
            return Err(LobbyError::AlreadyInRoom {
                account: account.clone(),
            }
            .into());
        }
        memberships.insert(account.clone(), room_id);
        Ok(())
    }

    /// Undo a reservation, but only if it still points at `room_id`.
    fn release_membership(&self, account: &str, room_id: RoomId) -> Result<()> {
        let mut memberships = self
            .memberships
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire membership lock"))?;
        if memberships.get(account) == Some(&room_id) {
            memberships.remove(account);
        }
        Ok(())
    }

    /// Create a new OPEN room with `account` as sole member and host.
    pub async fn create_room(&self, account: &AccountId, display_id: &str) -> Result<RoomSummary> {
        let room_id = generate_room_id();
        self.reserve_membership(account, room_id)?;

        let room = Room::new(
            room_id,
            Arc::clone(&self.registry),
            account.clone(),
            display_id.to_string(),
        );
        let summary = room.summary();
        {
            // Emitting under the table lock means no join can observe
            // the room before its creator's confirmation is queued.
            let mut rooms = self
                .rooms
                .write()
                .map_err(|_| LobbyError::internal("Failed to acquire room table lock"))?;
            rooms.insert(room_id, Arc::new(Mutex::new(room)));
            self.notifier.notify_account(
                account,
                ServerEvent::RoomCreated {
                    room: summary.clone(),
                },
            )?;
        }

        self.sessions.set_room_pointer(account, Some(room_id)).await?;
        tracing::info!("Room {} created by '{}'", room_id, account);
        Ok(summary)
    }

    /// Add an account to an existing room; room mutation and identity
    /// pointer stay consistent from the caller's perspective.
    pub async fn join_room(
        &self,
        account: &AccountId,
        room_id: RoomId,
        display_id: &str,
    ) -> Result<RoomSummary> {
        let handle = self.room_handle(room_id)?;
        self.reserve_membership(account, room_id)?;

        let summary = {
            let mut room = self.lock_room(&handle)?;
            if let Err(err) = room.add_player(account, display_id) {
                drop(room);
                self.release_membership(account, room_id)?;
                return Err(err);
            }
            let summary = room.summary();
            self.notifier.notify_room(
                &summary.players,
                &ServerEvent::RoomRoster {
                    room: summary.clone(),
                },
            )?;
            summary
        };

        self.sessions.set_room_pointer(account, Some(room_id)).await?;
        Ok(summary)
    }

    /// Remove an account from its room, deleting the room when it
    /// empties. A no-op (Ok(None)) when the account is in no room; the
    /// identity pointer is always cleared.
    pub async fn leave_room(&self, account: &AccountId) -> Result<Option<LeaveOutcome>> {
        let outcome = self.detach_member(account)?;
        self.sessions.set_room_pointer(account, None).await?;
        Ok(outcome)
    }

    /// Synchronous part of leaving: membership removal, room mutation
    /// and empty-room deletion. Keeps every guard inside this call so
    /// the async wrapper never carries one across an await.
    fn detach_member(&self, account: &AccountId) -> Result<Option<LeaveOutcome>> {
        let room_id = {
            let mut memberships = self
                .memberships
                .write()
                .map_err(|_| LobbyError::internal("Failed to acquire membership lock"))?;
            match memberships.remove(account) {
                Some(room_id) => room_id,
                None => {
                    drop(memberships);
                    self.notifier
                        .notify_account(account, ServerEvent::RoomLeft { room_id: None })?;
                    return Ok(None);
                }
            }
        };

        let handle = {
            let rooms = self
                .rooms
                .read()
                .map_err(|_| LobbyError::internal("Failed to acquire room table lock"))?;
            rooms.get(&room_id).cloned()
        };
        let Some(handle) = handle else {
            // Membership pointed at a room already gone; the pointer is
            // cleared by the caller.
            self.notifier.notify_account(
                account,
                ServerEvent::RoomLeft {
                    room_id: Some(room_id),
                },
            )?;
            return Ok(Some(LeaveOutcome {
                room_id,
                remaining: None,
            }));
        };

        let (emptied, remaining) = {
            let mut room = self.lock_room(&handle)?;
            let emptied = room.remove_player(account)?;
            self.notifier.notify_account(
                account,
                ServerEvent::RoomLeft {
                    room_id: Some(room_id),
                },
            )?;
            let remaining = if emptied {
                None
            } else {
                let summary = room.summary();
                self.notifier.notify_room(
                    &summary.players,
                    &ServerEvent::RoomRoster {
                        room: summary.clone(),
                    },
                )?;
                Some(summary)
            };
            (emptied, remaining)
        };

        if emptied {
            self.delete_if_empty(room_id)?;
        }
        Ok(Some(LeaveOutcome { room_id, remaining }))
    }

    /// Remove a room from the table if it is still empty. Re-checks
    /// under the table write lock and marks the room closed so a join
    /// racing the deletion observes RoomNotFound.
    fn delete_if_empty(&self, room_id: RoomId) -> Result<()> {
        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire room table lock"))?;
        if let Some(handle) = rooms.get(&room_id) {
            let mut room = self.lock_room(handle)?;
            if room.is_empty() {
                room.close();
                drop(room);
                rooms.remove(&room_id);
                tracing::info!("Room {} deleted (empty)", room_id);
            }
        }
        Ok(())
    }

    /// Host-only game selection for the account's current room.
    pub fn select_game(&self, account: &AccountId, game_id: &str) -> Result<RoomSummary> {
        let (_, handle) = self.member_room(account)?;
        let mut room = self.lock_room(&handle)?;
        room.select_game(account, game_id)?;
        let summary = room.summary();
        self.notifier.notify_room(
            &summary.players,
            &ServerEvent::GameSelected {
                room_id: summary.id,
                game_id: game_id.to_string(),
            },
        )?;
        Ok(summary)
    }

    /// Host-only game start. Returns the roster and the initial plugin
    /// snapshot; the room-wide notification is emitted before the room
    /// lock is released.
    pub fn start_game(&self, account: &AccountId) -> Result<(RoomSummary, Value)> {
        let (_, handle) = self.member_room(account)?;
        let mut room = self.lock_room(&handle)?;
        let state = room.start_game(account)?;
        let summary = room.summary();
        self.notifier.notify_room(
            &summary.players,
            &ServerEvent::GameStarted {
                room: summary.clone(),
                state: state.clone(),
            },
        )?;
        Ok((summary, state))
    }

    /// Forward a gameplay event to the account's running game. The
    /// result is emitted under the room lock, room-wide when the plugin
    /// raises the broadcast flag and sender-only otherwise.
    pub fn dispatch_event(
        &self,
        account: &AccountId,
        payload: &Value,
    ) -> Result<(RoomSummary, GameResponse)> {
        let (_, handle) = self.member_room(account)?;
        let mut room = self.lock_room(&handle)?;
        let response = room.dispatch_event(account, payload)?;
        let summary = room.summary();
        let event = ServerEvent::GameEvent {
            room_id: summary.id,
            sender: account.clone(),
            payload: response.to_payload(),
        };
        if response.ok && response.broadcast {
            self.notifier.notify_room(&summary.players, &event)?;
        } else {
            self.notifier.notify_account(account, event)?;
        }
        Ok((summary, response))
    }

    /// Snapshot of the running game in the account's room, delivered to
    /// the requester.
    pub fn game_state(&self, account: &AccountId) -> Result<(RoomId, Value)> {
        let (room_id, handle) = self.member_room(account)?;
        let room = self.lock_room(&handle)?;
        let state = room.game_state()?;
        self.notifier.notify_account(
            account,
            ServerEvent::GameState {
                room_id,
                state: state.clone(),
            },
        )?;
        Ok((room_id, state))
    }

    /// Point-in-time snapshot of every room's public summary. Mutations
    /// after the call do not retroactively change produced entries.
    pub fn list_rooms(&self) -> Result<Vec<RoomSummary>> {
        let handles: Vec<Arc<Mutex<Room>>> = {
            let rooms = self
                .rooms
                .read()
                .map_err(|_| LobbyError::internal("Failed to acquire room table lock"))?;
            rooms.values().cloned().collect()
        };

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let room = self.lock_room(&handle)?;
            if !room.is_empty() {
                summaries.push(room.summary());
            }
        }
        Ok(summaries)
    }

    /// Number of active rooms.
    pub fn room_count(&self) -> Result<usize> {
        let rooms = self
            .rooms
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire room table lock"))?;
        Ok(rooms.len())
    }
}
