//! Room entity: membership and game-session state machine
//!
//! A room moves OPEN -> RUNNING and never back; a finished session tears
//! the room down rather than restarting in place. The room owns exactly
//! one plugin instance once started and is the containment boundary for
//! plugin faults.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{LobbyError, Result};
use crate::game::{GamePlugin, GameRegistry, GameResponse};
use crate::types::{AccountId, GameId, RoomId, RoomPlayer, RoomSummary};

pub struct Room {
    id: RoomId,
    host_account: AccountId,
    /// Insertion order is join order; the front is always the earliest
    /// joined remaining player.
    players: Vec<RoomPlayer>,
    selected_game: Option<GameId>,
    game_started: bool,
    game: Option<Box<dyn GamePlugin>>,
    next_join_order: u32,
    /// Set when the manager removes the room; joins racing the removal
    /// observe RoomNotFound instead of resurrecting the entry.
    closed: bool,
    registry: Arc<GameRegistry>,
}

impl Room {
    /// Create a room with its first player as host.
    pub fn new(
        id: RoomId,
        registry: Arc<GameRegistry>,
        account: AccountId,
        display_id: String,
    ) -> Self {
        let first = RoomPlayer {
            account: account.clone(),
            display_id,
            join_order: 1,
        };
        Self {
            id,
            host_account: account,
            players: vec![first],
            selected_game: None,
            game_started: false,
            game: None,
            next_join_order: 2,
            closed: false,
            registry,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn host(&self) -> &AccountId {
        &self.host_account
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.game_started
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            host: self.host_account.clone(),
            players: self.players.iter().map(|p| p.account.clone()).collect(),
            selected_game: self.selected_game.clone(),
            started: self.game_started,
        }
    }

    /// Add a player. Capacity is only enforceable once a game is
    /// selected; before that the room layer is unbounded.
    pub fn add_player(&mut self, account: &AccountId, display_id: &str) -> Result<()> {
        if self.closed {
            return Err(LobbyError::RoomNotFound {
                room_id: self.id.to_string(),
            }
            .into());
        }
        if self.game_started {
            return Err(LobbyError::AlreadyStarted {
                room_id: self.id.to_string(),
            }
            .into());
        }
        if self.players.iter().any(|p| &p.account == account) {
            return Err(LobbyError::AlreadyInRoom {
                account: account.clone(),
            }
            .into());
        }
        if let Some(game_id) = &self.selected_game {
            let info = self.registry.get_info(game_id)?;
            if self.players.len() >= info.max_players {
                return Err(LobbyError::RoomFull {
                    room_id: self.id.to_string(),
                }
                .into());
            }
        }

        self.players.push(RoomPlayer {
            account: account.clone(),
            display_id: display_id.to_string(),
            join_order: self.next_join_order,
        });
        self.next_join_order += 1;

        tracing::info!(
            "Player '{}' joined room {} ({} players)",
            account,
            self.id,
            self.players.len()
        );
        Ok(())
    }

    /// Remove a player. Returns `true` when the room is now empty and
    /// must be deleted by the owning manager.
    pub fn remove_player(&mut self, account: &AccountId) -> Result<bool> {
        let position = self
            .players
            .iter()
            .position(|p| &p.account == account)
            .ok_or_else(|| LobbyError::internal(format!("account {} not in room", account)))?;
        self.players.remove(position);

        if self.game_started {
            if let Some(game) = &mut self.game {
                game.leave(account);
            }
        }

        if self.players.is_empty() {
            tracing::info!("Room {} is empty after '{}' left", self.id, account);
            return Ok(true);
        }

        if &self.host_account == account {
            // Earliest-joined remaining player becomes host; the vec
            // preserves join order so that is the front.
            self.host_account = self.players[0].account.clone();
            tracing::info!(
                "Host '{}' left room {}, promoted '{}'",
                account,
                self.id,
                self.host_account
            );
        } else {
            tracing::info!(
                "Player '{}' left room {} ({} players)",
                account,
                self.id,
                self.players.len()
            );
        }
        Ok(false)
    }

    /// Host-only: pick the game to play. Rejected once running, and when
    /// the current membership already exceeds the game's maximum.
    pub fn select_game(&mut self, account: &AccountId, game_id: &str) -> Result<()> {
        if self.game_started {
            return Err(LobbyError::AlreadyStarted {
                room_id: self.id.to_string(),
            }
            .into());
        }
        if &self.host_account != account {
            return Err(LobbyError::NotHost {
                account: account.clone(),
            }
            .into());
        }
        let info = self.registry.get_info(game_id)?;
        if self.players.len() > info.max_players {
            return Err(LobbyError::RoomFull {
                room_id: self.id.to_string(),
            }
            .into());
        }

        self.selected_game = Some(info.id.clone());
        tracing::info!("Room {} selected game '{}'", self.id, info.id);
        Ok(())
    }

    /// Host-only: instantiate the selected game, replay membership into
    /// it in join order and start it. Returns the initial snapshot.
    pub fn start_game(&mut self, account: &AccountId) -> Result<Value> {
        if self.game_started {
            return Err(LobbyError::AlreadyStarted {
                room_id: self.id.to_string(),
            }
            .into());
        }
        if &self.host_account != account {
            return Err(LobbyError::NotHost {
                account: account.clone(),
            }
            .into());
        }
        let game_id = self.selected_game.clone().ok_or_else(|| {
            LobbyError::StartConditionsNotMet {
                reason: "no game selected".to_string(),
            }
        })?;

        let info = self.registry.get_info(&game_id)?;
        let count = self.players.len();
        if count < info.min_players || count > info.max_players {
            return Err(LobbyError::StartConditionsNotMet {
                reason: format!(
                    "game '{}' needs {}-{} players, room has {}",
                    game_id, info.min_players, info.max_players, count
                ),
            }
            .into());
        }

        let mut game = self.registry.instantiate(&game_id, self.id)?;
        for player in &self.players {
            game.join(&player.account, &player.display_id);
        }
        if !game.start() {
            // Instance is discarded; the room stays OPEN.
            return Err(LobbyError::StartConditionsNotMet {
                reason: format!("game '{}' declined to start", game_id),
            }
            .into());
        }

        let state = game.state();
        self.game = Some(game);
        self.game_started = true;
        tracing::info!(
            "Room {} started game '{}' with {} players",
            self.id,
            game_id,
            count
        );
        Ok(state)
    }

    /// Forward a gameplay event to the plugin. A plugin panic is caught
    /// here and converted to a failed response so one bad event cannot
    /// corrupt the room or take down other rooms.
    pub fn dispatch_event(&mut self, account: &AccountId, payload: &Value) -> Result<GameResponse> {
        if !self.game_started {
            return Err(LobbyError::GameNotRunning {
                room_id: self.id.to_string(),
            }
            .into());
        }
        let game = self.game.as_mut().ok_or_else(|| {
            LobbyError::internal(format!("room {} started without a game instance", self.id))
        })?;

        let room_id = self.id;
        match catch_unwind(AssertUnwindSafe(|| game.handle_event(account, payload))) {
            Ok(response) => Ok(response),
            Err(_) => {
                tracing::error!(
                    "Game plugin panicked handling event from '{}' in room {}",
                    account,
                    room_id
                );
                Ok(GameResponse::fail("game error while handling event"))
            }
        }
    }

    /// Snapshot of the running game's state.
    pub fn game_state(&self) -> Result<Value> {
        if !self.game_started {
            return Err(LobbyError::GameNotRunning {
                room_id: self.id.to_string(),
            }
            .into());
        }
        let game = self.game.as_ref().ok_or_else(|| {
            LobbyError::internal(format!("room {} started without a game instance", self.id))
        })?;
        Ok(game.state())
    }
}
