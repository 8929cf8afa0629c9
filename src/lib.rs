//! Game Lobby - room and game-session lifecycle engine
//!
//! This crate provides multiplayer room management with pluggable game
//! logic, real-time event routing with broadcast scoping, and read-only
//! discovery endpoints for the room list and game catalogue.

pub mod config;
pub mod error;
pub mod game;
pub mod room;
pub mod router;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LobbyError, Result};
pub use types::*;

// Re-export key components
pub use game::{GamePlugin, GameRegistry, GameResponse};
pub use room::RoomManager;
pub use router::EventRouter;
pub use session::{MemorySessionStore, SessionOracle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
