use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, trace};

use crate::models::ServerMessage;
use super::connctx::{ConnectionId, ConnectionRegistry};

/// Document rooms: `document_id -> connection ids`.
///
/// A room exists only while it has members.
#[derive(Default)]
pub struct RoomDirectory {
    rooms: Mutex<HashMap<String, HashSet<ConnectionId>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashSet<ConnectionId>>> {
        self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn join(&self, document_id: &str, connection_id: ConnectionId) {
        let mut rooms = self.lock();
        let members = rooms.entry(document_id.to_string()).or_insert_with(|| {
            info!("Room {} created", document_id);
            HashSet::new()
        });
        members.insert(connection_id);
        debug!("Connection {} joined room {} ({} members)", connection_id, document_id, members.len());
    }

    /// Returns true if the connection was a member.
    pub fn leave(&self, document_id: &str, connection_id: ConnectionId) -> bool {
        let mut rooms = self.lock();
        let Some(members) = rooms.get_mut(document_id) else {
            return false;
        };
        let removed = members.remove(&connection_id);
        if members.is_empty() {
            rooms.remove(document_id);
            info!("Room {} removed (empty)", document_id);
        }
        removed
    }

    /// Snapshot of the current members; empty if the room does not exist.
    pub fn members(&self, document_id: &str) -> HashSet<ConnectionId> {
        self.lock().get(document_id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.lock().contains_key(document_id)
    }

    pub fn room_count(&self) -> usize {
        self.lock().len()
    }

    pub fn member_count(&self) -> usize {
        self.lock().values().map(HashSet::len).sum()
    }

    /// Send `message` to every open member except `exclude`.
    ///
    /// Members whose transport is already closed are skipped and left in
    /// place; disconnect cleanup removes them.
    pub fn broadcast(
        &self,
        document_id: &str,
        message: &ServerMessage,
        exclude: Option<ConnectionId>,
        registry: &ConnectionRegistry,
    ) -> usize {
        let mut delivered = 0;
        for member in self.members(document_id) {
            if Some(member) == exclude {
                continue;
            }
            let Some(handle) = registry.handle(member) else {
                trace!("Skipping unknown member {} of {}", member, document_id);
                continue;
            };
            if handle.is_open() && handle.send(message.clone()) {
                delivered += 1;
            }
        }
        trace!("Broadcast {} to {} members of {}", message.kind(), delivered, document_id);
        delivered
    }
}
