use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use super::events::ServerEvent;

/// Sender half of a connection's outbound queue.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// Process-unique identifier of one realtime connection.
///
/// Never reused, so a reconnect always gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opaque handle to one live connection.
///
/// Two handles are equal iff they refer to the same connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: Outbound,
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event for the connection's writer. `false` if the
    /// connection is already gone.
    pub fn push(&self, event: ServerEvent) -> bool {
        self.outbound.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Registry of live connections keyed by user id.
///
/// One handle per user id; the latest registration wins. All
/// read-modify-write sequences happen under a single lock, and lookups
/// hand out clones so no caller ever pushes while holding it.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    users: Mutex<HashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle for a new connection. Does not register it.
    pub fn open(&self, outbound: Outbound) -> ConnectionHandle {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        ConnectionHandle { id, outbound }
    }

    /// Map `user_id` to `handle`, replacing any previous mapping.
    ///
    /// Blank ids are ignored; returns whether a mapping was written.
    pub fn register(&self, handle: &ConnectionHandle, user_id: &str) -> bool {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return false;
        }

        let previous = self
            .users
            .lock()
            .insert(user_id.to_string(), handle.clone());

        if let Some(previous) = previous.filter(|p| p != handle) {
            debug!(
                user_id = %user_id,
                old = %previous.id(),
                new = %handle.id(),
                "Registration replaced an older connection"
            );
        }
        true
    }

    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.users.lock().get(user_id).cloned()
    }

    /// Look up two user ids independently under one lock acquisition.
    pub fn lookup_pair(
        &self,
        first: &str,
        second: &str,
    ) -> (Option<ConnectionHandle>, Option<ConnectionHandle>) {
        let users = self.users.lock();
        (users.get(first).cloned(), users.get(second).cloned())
    }

    /// Remove every entry pointing at connection `id`, returning the user
    /// ids that were unmapped.
    pub fn remove_connection(&self, id: ConnectionId) -> Vec<String> {
        let mut removed = Vec::new();
        self.users.lock().retain(|user_id, handle| {
            if handle.id() == id {
                removed.push(user_id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Registered user ids, sorted.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.users.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
