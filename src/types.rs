//! Common types used throughout the lobby service

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for user accounts
pub type AccountId = String;

/// Unique identifier for rooms
pub type RoomId = Uuid;

/// Unique identifier for registered games (registry key, e.g. "roulette")
pub type GameId = String;

/// Unique identifier for transport connections
pub type ConnectionId = Uuid;

/// A member of a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPlayer {
    pub account: AccountId,
    /// In-game display name chosen at join time
    pub display_id: String,
    /// Sequential join order starting at 1; used for host promotion
    pub join_order: u32,
}

/// Point-in-time public view of a room, for discovery queries and
/// roster notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub host: AccountId,
    pub players: Vec<AccountId>,
    pub selected_game: Option<GameId>,
    pub started: bool,
}

/// Public catalogue metadata for a registered game (factory excluded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    pub id: GameId,
    pub name: String,
    pub description: String,
    pub min_players: usize,
    pub max_players: usize,
}

/// Identity resolved from a session token by the session oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub account: AccountId,
    /// Display name registered with the account
    pub display_name: String,
}

/// Inbound real-time events accepted by the router
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    CreateRoom,
    JoinRoom { room_id: RoomId, display_id: String },
    LeaveRoom,
    SelectGame { game_id: GameId },
    StartGame,
    GameEvent { event_name: String, event_data: Value },
    /// Snapshot fetch for late joiners / state refresh
    GameState,
}

/// Outbound events emitted by the router
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sender only: the room the caller just created
    RoomCreated { room: RoomSummary },
    /// Room-wide: membership changed (join or leave)
    RoomRoster { room: RoomSummary },
    /// Sender only: confirmation that the caller left (or was in no room)
    RoomLeft { room_id: Option<RoomId> },
    /// Room-wide: the host picked a game
    GameSelected { room_id: RoomId, game_id: GameId },
    /// Room-wide: the game started; carries the initial plugin snapshot
    GameStarted { room: RoomSummary, state: Value },
    /// Game result; scope decided by the plugin's broadcast flag
    GameEvent {
        room_id: RoomId,
        sender: AccountId,
        payload: Value,
    },
    /// Sender only: plugin state snapshot
    GameState { room_id: RoomId, state: Value },
    /// Sender only: recovered failure, human-readable
    Error { message: String },
}
