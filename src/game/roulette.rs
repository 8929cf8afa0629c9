//! Roulette: the reference plugin
//!
//! A minimal test game used to exercise the plugin contract end to end.
//! Its single gameplay event echoes the sender's input back to the whole
//! room.

use serde_json::{json, Value};

use crate::game::plugin::{GamePlugin, GameResponse};
use crate::game::registry::GameEntry;
use crate::types::{AccountId, GameInfo, RoomId};

struct RoulettePlayer {
    account: AccountId,
    display_id: String,
    order: u32,
}

pub struct RouletteGame {
    room_id: RoomId,
    players: Vec<RoulettePlayer>,
    host: Option<AccountId>,
    started: bool,
}

impl RouletteGame {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            players: Vec::new(),
            host: None,
            started: false,
        }
    }

    /// Catalogue entry registered at process start.
    pub fn catalogue_entry() -> GameEntry {
        GameEntry::new(
            GameInfo {
                id: "roulette".to_string(),
                name: "Roulette".to_string(),
                description: "A simple test game".to_string(),
                min_players: 1,
                max_players: 4,
            },
            Box::new(|room_id| Box::new(RouletteGame::new(room_id))),
        )
    }

    fn find_player(&self, account: &str) -> Option<usize> {
        self.players.iter().position(|p| p.account == account)
    }
}

impl GamePlugin for RouletteGame {
    fn join(&mut self, account: &str, display_id: &str) -> Option<u32> {
        if self.find_player(account).is_some() {
            return None;
        }
        if self.host.is_none() {
            self.host = Some(account.to_string());
        }
        let order = self.players.len() as u32 + 1;
        self.players.push(RoulettePlayer {
            account: account.to_string(),
            display_id: display_id.to_string(),
            order,
        });
        Some(order)
    }

    fn leave(&mut self, account: &str) {
        if let Some(position) = self.find_player(account) {
            self.players.remove(position);
            if self.host.as_deref() == Some(account) {
                // First remaining player inherits the internal host role.
                self.host = self.players.first().map(|p| p.account.clone());
            }
        }
    }

    fn start(&mut self) -> bool {
        if self.players.is_empty() {
            return false;
        }
        self.started = true;
        true
    }

    fn handle_event(&mut self, account: &AccountId, payload: &Value) -> GameResponse {
        let event_name = payload
            .get("event_name")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if event_name == "test_input" {
            let data = payload.get("event_data").cloned().unwrap_or(Value::Null);
            let input = data.get("input").and_then(Value::as_str).unwrap_or("");
            return GameResponse::ok(
                format!("received message from {}: {}", account, input),
                true,
                json!({
                    "echo": input,
                    "timestamp": crate::utils::current_timestamp().to_rfc3339(),
                }),
            );
        }

        GameResponse::fail("unknown event type")
    }

    fn state(&self) -> Value {
        let players: Vec<Value> = self
            .players
            .iter()
            .map(|p| {
                json!({
                    "account": p.account,
                    "display_id": p.display_id,
                    "order": p.order,
                })
            })
            .collect();

        json!({
            "type": "roulette",
            "room_id": self.room_id,
            "players": players,
            "started": self.started,
            "host": self.host,
        })
    }
}
