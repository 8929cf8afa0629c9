//! Connection registry: transport handles and account bindings
//!
//! Each connection owns an unbounded channel carrying its outbound
//! events, so per-connection delivery order follows emission order. The
//! registry never blocks on a receiver; a send to a dropped receiver is
//! treated as an already-gone connection.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::error::{LobbyError, Result};
use crate::types::{AccountId, ConnectionId, ServerEvent};
use crate::utils::generate_connection_id;

/// Outbound handle for one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Outbound delivery seam the room layer emits through.
///
/// Implementations must only enqueue, never block: callers invoke these
/// while still holding a room's critical section, which is what pins
/// per-connection delivery order to commit order.
pub trait EventSink: Send + Sync {
    /// Deliver to the connection currently bound to one account.
    fn notify_account(&self, account: &str, event: ServerEvent) -> Result<()>;

    /// Fan out to every listed account with a live connection.
    fn notify_room(&self, accounts: &[AccountId], event: &ServerEvent) -> Result<()>;
}

#[derive(Default)]
struct ConnectionTable {
    senders: HashMap<ConnectionId, EventSender>,
    accounts: HashMap<ConnectionId, AccountId>,
    by_account: HashMap<AccountId, ConnectionId>,
}

pub struct ConnectionRegistry {
    table: RwLock<ConnectionTable>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(ConnectionTable::default()),
        }
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, ConnectionTable>> {
        self.table
            .write()
            .map_err(|_| LobbyError::internal("Failed to acquire connection table lock").into())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, ConnectionTable>> {
        self.table
            .read()
            .map_err(|_| LobbyError::internal("Failed to acquire connection table lock").into())
    }

    /// Register a fresh connection and hand back its id.
    pub fn register(&self, sender: EventSender) -> Result<ConnectionId> {
        let connection_id = generate_connection_id();
        self.write()?.senders.insert(connection_id, sender);
        tracing::debug!("Connection {} registered", connection_id);
        Ok(connection_id)
    }

    /// Bind a connection to the account it authenticated as. A newer
    /// connection for the same account takes over the binding.
    pub fn bind_account(&self, connection_id: ConnectionId, account: &AccountId) -> Result<()> {
        let mut table = self.write()?;
        if !table.senders.contains_key(&connection_id) {
            return Err(LobbyError::internal(format!(
                "unknown connection {}",
                connection_id
            ))
            .into());
        }
        if let Some(previous) = table.by_account.insert(account.clone(), connection_id) {
            if previous != connection_id {
                table.accounts.remove(&previous);
            }
        }
        table.accounts.insert(connection_id, account.clone());
        Ok(())
    }

    /// Drop a connection. Returns the account it was bound to, if the
    /// binding was still current.
    pub fn unregister(&self, connection_id: ConnectionId) -> Result<Option<AccountId>> {
        let mut table = self.write()?;
        table.senders.remove(&connection_id);
        let account = table.accounts.remove(&connection_id);
        if let Some(account) = &account {
            // Only clear the reverse mapping if a newer connection has
            // not already taken it over.
            if table.by_account.get(account) == Some(&connection_id) {
                table.by_account.remove(account);
            } else {
                return Ok(None);
            }
        }
        tracing::debug!("Connection {} unregistered", connection_id);
        Ok(account)
    }

    /// Deliver an event to one connection. Dropped receivers are not an
    /// error; the disconnect path cleans those up.
    pub fn send_to_connection(&self, connection_id: ConnectionId, event: ServerEvent) -> Result<()> {
        let table = self.read()?;
        if let Some(sender) = table.senders.get(&connection_id) {
            if sender.send(event).is_err() {
                tracing::debug!("Connection {} receiver already gone", connection_id);
            }
        }
        Ok(())
    }

    /// Deliver an event to the connection bound to an account, if any.
    pub fn send_to_account(&self, account: &str, event: ServerEvent) -> Result<()> {
        let table = self.read()?;
        if let Some(connection_id) = table.by_account.get(account) {
            if let Some(sender) = table.senders.get(connection_id) {
                if sender.send(event).is_err() {
                    tracing::debug!("Connection {} receiver already gone", connection_id);
                }
            }
        }
        Ok(())
    }

    /// Fan an event out to every listed account with a live connection.
    pub fn broadcast(&self, accounts: &[AccountId], event: &ServerEvent) -> Result<()> {
        let table = self.read()?;
        for account in accounts {
            if let Some(connection_id) = table.by_account.get(account) {
                if let Some(sender) = table.senders.get(connection_id) {
                    if sender.send(event.clone()).is_err() {
                        tracing::debug!("Connection {} receiver already gone", connection_id);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ConnectionRegistry {
    fn notify_account(&self, account: &str, event: ServerEvent) -> Result<()> {
        self.send_to_account(account, event)
    }

    fn notify_room(&self, accounts: &[AccountId], event: &ServerEvent) -> Result<()> {
        self.broadcast(accounts, event)
    }
}
