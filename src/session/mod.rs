//! Session identity integration
//!
//! The lobby core never reasons about token issuance or expiry; it
//! consumes a session oracle that resolves transport tokens to account
//! identities and keeps the per-account room pointer consistent with
//! room membership.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{LobbyError, Result};
use crate::types::{AccountId, RoomId, SessionIdentity};

/// Trait for resolving session tokens and tracking room pointers
#[async_trait]
pub trait SessionOracle: Send + Sync {
    /// Resolve a token to an identity. Absent or expired tokens fail
    /// with `Unauthorized`.
    async fn resolve(&self, token: &str) -> Result<SessionIdentity>;

    /// Record which room an account currently belongs to (`None` clears it).
    async fn set_room_pointer(&self, account: &AccountId, room_id: Option<RoomId>) -> Result<()>;
}

/// In-memory session store: active tokens and room pointers held in
/// process memory. Used by the binary and by tests.
pub struct MemorySessionStore {
    tokens: RwLock<HashMap<String, SessionIdentity>>,
    room_pointers: RwLock<HashMap<AccountId, RoomId>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            room_pointers: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a fresh token for an account (login path).
    pub fn issue_token(&self, account: impl Into<AccountId>, display_name: impl Into<String>) -> Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire token lock"))?;
        tokens.insert(
            token.clone(),
            SessionIdentity {
                account: account.into(),
                display_name: display_name.into(),
            },
        );
        Ok(token)
    }

    /// Invalidate a token (logout or expiry sweep).
    pub fn revoke_token(&self, token: &str) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire token lock"))?;
        tokens.remove(token);
        Ok(())
    }

    /// The room an account's identity currently points at.
    pub fn room_pointer(&self, account: &str) -> Result<Option<RoomId>> {
        let pointers = self
            .room_pointers
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire room pointer lock"))?;
        Ok(pointers.get(account).copied())
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionOracle for MemorySessionStore {
    async fn resolve(&self, token: &str) -> Result<SessionIdentity> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire token lock"))?;
        tokens
            .get(token)
            .cloned()
            .ok_or_else(|| LobbyError::Unauthorized.into())
    }

    async fn set_room_pointer(&self, account: &AccountId, room_id: Option<RoomId>) -> Result<()> {
        let mut pointers = self
            .room_pointers
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire room pointer lock"))?;
        match room_id {
            Some(id) => {
                pointers.insert(account.clone(), id);
            }
            None => {
                pointers.remove(account);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_room_id;

    #[tokio::test]
    async fn test_resolve_known_and_unknown_tokens() {
        let store = MemorySessionStore::new();
        let token = store.issue_token("alice", "Ali").unwrap();

        let identity = store.resolve(&token).await.unwrap();
        assert_eq!(identity.account, "alice");
        assert_eq!(identity.display_name, "Ali");

        let err = store.resolve("bogus").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LobbyError>(),
            Some(LobbyError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_is_unauthorized() {
        let store = MemorySessionStore::new();
        let token = store.issue_token("alice", "Ali").unwrap();
        store.revoke_token(&token).unwrap();
        assert!(store.resolve(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_room_pointer_set_and_clear() {
        let store = MemorySessionStore::new();
        let account = "alice".to_string();
        let room_id = generate_room_id();

        store
            .set_room_pointer(&account, Some(room_id))
            .await
            .unwrap();
        assert_eq!(store.room_pointer("alice").unwrap(), Some(room_id));

        store.set_room_pointer(&account, None).await.unwrap();
        assert_eq!(store.room_pointer("alice").unwrap(), None);
    }
}
