//! Error types for the lobby service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific lobby scenarios
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Unauthorized: session token missing or expired")]
    Unauthorized,

    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: String },

    #[error("Account already in a room: {account}")]
    AlreadyInRoom { account: String },

    #[error("Room is full: {room_id}")]
    RoomFull { room_id: String },

    #[error("Game already started in room: {room_id}")]
    AlreadyStarted { room_id: String },

    #[error("Account is not the room host: {account}")]
    NotHost { account: String },

    #[error("Unknown game id: {game_id}")]
    UnknownGameId { game_id: String },

    #[error("Duplicate game id: {game_id}")]
    DuplicateGameId { game_id: String },

    #[error("Start conditions not met: {reason}")]
    StartConditionsNotMet { reason: String },

    #[error("No game running in room: {room_id}")]
    GameNotRunning { room_id: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl LobbyError {
    /// Shorthand for lock-poisoning and other invariant failures.
    pub fn internal(message: impl Into<String>) -> Self {
        LobbyError::Internal {
            message: message.into(),
        }
    }
}
