//! Game plugin system for the lobby service
//!
//! This module defines the plugin contract every game implements, the
//! registry that catalogues installable games, and the reference plugin.

pub mod plugin;
pub mod registry;
pub mod roulette;

// Re-export commonly used types
pub use plugin::{GamePlugin, GameResponse};
pub use registry::{GameEntry, GameFactory, GameRegistry};
pub use roulette::RouletteGame;
