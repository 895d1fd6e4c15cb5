//! Live room membership and fan-out.
//!
//! The registry is the only shared mutable state in the relay. Membership
//! changes take the write lock; fan-out iterates under the read lock and
//! records failed connections, which are then removed in a separate
//! write-locked pass so a broadcast never re-enters the lock it holds.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::entities::{ChatMessage, RoomEvent};
use crate::transport::{ConnectionHandle, ConnectionSink, OutboundFrame};
use crate::types::{ConnectionId, RoomId};

#[derive(Default)]
struct RoomTable {
    rooms: HashMap<RoomId, HashMap<ConnectionId, Arc<dyn ConnectionSink>>>,
    memberships: HashMap<ConnectionId, RoomId>,
}

impl RoomTable {
    /// Remove `conn` from `room_id`, dropping the room once it is empty.
    fn remove(&mut self, room_id: &str, conn: ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };

        let removed = members.remove(&conn).is_some();
        if members.is_empty() {
            self.rooms.remove(room_id);
        }
        if removed && self.memberships.get(&conn).map(String::as_str) == Some(room_id) {
            self.memberships.remove(&conn);
        }
        removed
    }
}

/// Result of one fan-out pass.
struct Delivery {
    delivered: usize,
    failed: Vec<ConnectionId>,
}

/// Thread-safe mapping from room id to the connections currently in it.
///
/// Cloning is cheap; all clones share the same table.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<RoomTable>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room, creating the room if needed.
    ///
    /// Joining the room a connection is already in is a no-op. Joining a
    /// different room moves the connection there.
    pub async fn join(&self, room_id: &str, connection: &ConnectionHandle) {
        let mut table = self.inner.write().await;

        if let Some(previous) = table.memberships.get(&connection.id).cloned() {
            if previous == room_id {
                return;
            }
            table.remove(&previous, connection.id);
            debug!(
                connection_id = %connection.id,
                from = %previous,
                to = %room_id,
                "connection moved between rooms"
            );
        }

        table
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection.id, Arc::clone(&connection.sink));
        table
            .memberships
            .insert(connection.id, room_id.to_string());

        let members = table.rooms.get(room_id).map_or(0, HashMap::len);
        info!(room_id, connection_id = %connection.id, members, "connection joined room");
    }

    /// Remove a connection from a room. Absent pairs are ignored.
    pub async fn leave(&self, room_id: &str, connection: ConnectionId) -> bool {
        let removed = self.inner.write().await.remove(room_id, connection);
        if removed {
            info!(room_id, connection_id = %connection, "connection left room");
        }
        removed
    }

    /// Send a chat message to every connection in the room.
    ///
    /// Connections whose send fails are removed from the registry. Returns
    /// the number of connections the message was handed to.
    pub async fn broadcast(&self, room_id: &str, message: &ChatMessage) -> usize {
        let Some(payload) = serialize(room_id, message) else {
            return 0;
        };

        let Delivery { delivered, failed } = self.fan_out(room_id, payload).await;

        if !failed.is_empty() {
            let mut table = self.inner.write().await;
            for conn in &failed {
                if table.remove(room_id, *conn) {
                    warn!(
                        room_id,
                        connection_id = %conn,
                        message_id = %message.id,
                        "pruned dead connection after failed send"
                    );
                }
            }
        }

        delivered
    }

    /// Send an event to every connection in the room.
    ///
    /// Delivery failures are logged and never change membership.
    pub async fn broadcast_event(&self, room_id: &str, event: &RoomEvent) -> usize {
        let Some(payload) = serialize(room_id, event) else {
            return 0;
        };

        let Delivery { delivered, failed } = self.fan_out(room_id, payload).await;
        for conn in failed {
            debug!(
                room_id,
                connection_id = %conn,
                event = event.event_type_name(),
                "event delivery failed"
            );
        }
        delivered
    }

    /// Rooms that currently have at least one member.
    pub async fn rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<_> = self.inner.read().await.rooms.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Connections currently registered in a room.
    pub async fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        let table = self.inner.read().await;
        let mut members: Vec<_> = table
            .rooms
            .get(room_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub async fn contains(&self, room_id: &str, connection: ConnectionId) -> bool {
        self.inner
            .read()
            .await
            .rooms
            .get(room_id)
            .is_some_and(|members| members.contains_key(&connection))
    }

    async fn fan_out(&self, room_id: &str, payload: Arc<str>) -> Delivery {
        let table = self.inner.read().await;
        let mut delivery = Delivery {
            delivered: 0,
            failed: Vec::new(),
        };

        let Some(members) = table.rooms.get(room_id) else {
            return delivery;
        };

        for (conn, sink) in members {
            match sink.send(OutboundFrame::Text(Arc::clone(&payload))) {
                Ok(()) => delivery.delivered += 1,
                Err(err) => {
                    debug!(room_id, connection_id = %conn, error = %err, "send failed");
                    delivery.failed.push(*conn);
                }
            }
        }

        delivery
    }
}

fn serialize<T: Serialize>(room_id: &str, payload: &T) -> Option<Arc<str>> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(Arc::from(json)),
        Err(err) => {
            error!(room_id, error = %err, "failed to serialize room payload");
            None
        }
    }
}
