//! The GamePlugin contract implemented by every installable game
//!
//! Rooms and the registry depend only on this trait, never on a concrete
//! game type. All operations are synchronous and must not suspend; a
//! plugin signals its own failures through `GameResponse::fail`, never by
//! panicking (panics are contained at the room boundary regardless).

use serde_json::{json, Value};

use crate::types::AccountId;

/// Result of a single gameplay event.
///
/// `broadcast` decides the outbound scope: `true` fans the result out to
/// every room member, `false` returns it to the sender only. `data`
/// carries game-specific response fields merged into the wire payload.
#[derive(Debug, Clone)]
pub struct GameResponse {
    pub ok: bool,
    pub message: String,
    pub broadcast: bool,
    pub data: Value,
}

impl GameResponse {
    /// Successful result with game-specific payload fields.
    pub fn ok(message: impl Into<String>, broadcast: bool, data: Value) -> Self {
        Self {
            ok: true,
            message: message.into(),
            broadcast,
            data,
        }
    }

    /// Failed result, always sender-only.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            broadcast: false,
            data: Value::Null,
        }
    }

    /// Flatten into the wire payload: `{ok, msg, ...data}`.
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "ok": self.ok,
            "msg": self.message,
        });
        if let (Some(map), Some(extra)) = (payload.as_object_mut(), self.data.as_object()) {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }
        payload
    }
}

/// Polymorphic interface for one game's rules.
///
/// Instances are created by the registry factory, owned exclusively by
/// one room, and destroyed with it. Player bookkeeping mirrors the
/// owning room: the room replays `join` for every member in join order
/// when the game starts.
pub trait GamePlugin: Send {
    /// Add a player. Returns the assigned sequential order (from 1), or
    /// `None` if the account already joined (a no-op, not an error).
    /// The first joiner becomes the plugin's internal host.
    fn join(&mut self, account: &str, display_id: &str) -> Option<u32>;

    /// Remove a player. If the removed account was the internal host and
    /// players remain, the plugin reassigns its host to some remaining
    /// player (stable within a run).
    fn leave(&mut self, account: &str);

    /// Transition to running. Returns `false` when the plugin's own
    /// minimum player threshold is unmet.
    fn start(&mut self) -> bool;

    /// Sole gameplay entry point once running. Unknown event names must
    /// yield `ok=false` without panicking.
    fn handle_event(&mut self, account: &AccountId, payload: &Value) -> GameResponse;

    /// Serializable snapshot of all game-relevant state, used for late
    /// joiners and state-refresh requests.
    fn state(&self) -> Value;
}
