//! Game registry: the catalogue of installable game plugins
//!
//! Entries are registered once at process start (an explicit call per
//! known plugin, no discovery scanning) and are immutable afterwards.
//! The registry hands out public metadata for discovery queries and
//! fresh plugin instances for rooms that start a game.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{LobbyError, Result};
use crate::game::plugin::GamePlugin;
use crate::types::{GameId, GameInfo, RoomId};

/// Constructs a new plugin instance bound to a room.
pub type GameFactory = Box<dyn Fn(RoomId) -> Box<dyn GamePlugin> + Send + Sync>;

/// One catalogue entry: public metadata plus the instantiation factory.
pub struct GameEntry {
    pub info: GameInfo,
    pub factory: GameFactory,
}

impl GameEntry {
    pub fn new(info: GameInfo, factory: GameFactory) -> Self {
        Self { info, factory }
    }
}

/// Catalogue of installable games, keyed by game id.
///
/// Registration order is preserved for `list_available`. All access goes
/// through this interface; routing code never touches the table directly.
pub struct GameRegistry {
    /// Entries in registration order
    entries: RwLock<Vec<GameEntry>>,
    /// Index from game id into `entries`
    index: RwLock<HashMap<GameId, usize>>,
}

impl GameRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Add a catalogue entry. Fails if the id is already registered.
    pub fn register(&self, entry: GameEntry) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire registry lock"))?;
        let mut index = self
            .index
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire registry index lock"))?;

        if index.contains_key(&entry.info.id) {
            return Err(LobbyError::DuplicateGameId {
                game_id: entry.info.id.clone(),
            }
            .into());
        }

        tracing::info!(
            "Registered game '{}' ({}, {}-{} players)",
            entry.info.id,
            entry.info.name,
            entry.info.min_players,
            entry.info.max_players
        );

        index.insert(entry.info.id.clone(), entries.len());
        entries.push(entry);
        Ok(())
    }

    /// Public metadata of every registered game, in registration order.
    pub fn list_available(&self) -> Result<Vec<GameInfo>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire registry lock"))?;
        Ok(entries.iter().map(|entry| entry.info.clone()).collect())
    }

    /// Metadata for a single game id.
    pub fn get_info(&self, game_id: &str) -> Result<GameInfo> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire registry lock"))?;
        let index = self
            .index
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire registry index lock"))?;

        let position = index.get(game_id).ok_or_else(|| LobbyError::UnknownGameId {
            game_id: game_id.to_string(),
        })?;
        Ok(entries[*position].info.clone())
    }

    /// Build a fresh plugin instance bound to `room_id`, with no players.
    pub fn instantiate(&self, game_id: &str, room_id: RoomId) -> Result<Box<dyn GamePlugin>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire registry lock"))?;
        let index = self
            .index
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire registry index lock"))?;

        let position = index.get(game_id).ok_or_else(|| LobbyError::UnknownGameId {
            game_id: game_id.to_string(),
        })?;
        Ok((entries[*position].factory)(room_id))
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::roulette::RouletteGame;
    use crate::utils::generate_room_id;

    fn roulette_entry() -> GameEntry {
        RouletteGame::catalogue_entry()
    }

    #[test]
    fn test_register_and_list_preserves_order() {
        let registry = GameRegistry::new();
        registry.register(roulette_entry()).unwrap();
        registry
            .register(GameEntry::new(
                GameInfo {
                    id: "second".to_string(),
                    name: "Second".to_string(),
                    description: "another game".to_string(),
                    min_players: 2,
                    max_players: 6,
                },
                Box::new(|room_id| Box::new(RouletteGame::new(room_id))),
            ))
            .unwrap();

        let games = registry.list_available().unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].id, "roulette");
        assert_eq!(games[1].id, "second");
        // Listing is repeatable
        assert_eq!(registry.list_available().unwrap(), games);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = GameRegistry::new();
        registry.register(roulette_entry()).unwrap();

        let err = registry.register(roulette_entry()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LobbyError>(),
            Some(LobbyError::DuplicateGameId { .. })
        ));
    }

    #[test]
    fn test_instantiate_unknown_id_fails() {
        let registry = GameRegistry::new();
        let err = registry
            .instantiate("chess", generate_room_id())
            .err()
            .expect("instantiating an unregistered id must fail");
        assert!(matches!(
            err.downcast_ref::<LobbyError>(),
            Some(LobbyError::UnknownGameId { .. })
        ));
    }

    #[test]
    fn test_instantiate_returns_fresh_instance() {
        let registry = GameRegistry::new();
        registry.register(roulette_entry()).unwrap();

        let mut game = registry
            .instantiate("roulette", generate_room_id())
            .unwrap();
        // No players yet: start declines
        assert!(!game.start());
        assert_eq!(game.join("alice", "Ali"), Some(1));
    }
}
