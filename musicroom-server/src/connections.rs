use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    thread::{self, JoinHandle},
};

use log::info;
use musicroom_collab::{CollabEvent, EventReceiver};
use musicroom_core::{Id, RoomId, UserId};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use utoipa::ToSchema;

use crate::serialized::{Message, Playback, QueuedTrack, RoomMember, ToSerialized};

pub struct Connection;
pub type ConnectionId = Id<Connection>;

/// Events sent to the clients connected to a room
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// The queue was modified
    #[serde(rename_all = "camelCase")]
    QueueUpdated {
        room_id: i32,
        entries: Vec<QueuedTrack>,
    },
    /// The player changed state, track or position
    #[serde(rename_all = "camelCase")]
    PlaybackUpdated { room_id: i32, playback: Playback },
    #[serde(rename_all = "camelCase")]
    MemberJoined { room_id: i32, member: RoomMember },
    /// User left or was kicked
    #[serde(rename_all = "camelCase")]
    MemberLeft { room_id: i32, user_id: i32 },
    #[serde(rename_all = "camelCase")]
    MemberRoleUpdated {
        room_id: i32,
        user_id: i32,
        role: String,
    },
    /// User was barred from the room, preceded by [ServerEvent::MemberLeft] if they were in it
    #[serde(rename_all = "camelCase")]
    MemberBanned {
        room_id: i32,
        user_id: i32,
        banned_by: i32,
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MemberUnbanned { room_id: i32, user_id: i32 },
    #[serde(rename_all = "camelCase")]
    ChatMessage { room_id: i32, message: Message },
    /// The room was deleted, the connection closes after this event
    #[serde(rename_all = "camelCase")]
    RoomDeleted { room_id: i32 },
    /// A message sent by this client could not be handled
    Error { code: String, message: String },
}

impl From<CollabEvent> for ServerEvent {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::QueueUpdated { room_id, entries } => Self::QueueUpdated {
                room_id,
                entries: entries.to_serialized(),
            },
            CollabEvent::PlaybackUpdated { room_id, status } => Self::PlaybackUpdated {
                room_id,
                playback: status.to_serialized(),
            },
            CollabEvent::MemberJoined { room_id, member } => Self::MemberJoined {
                room_id,
                member: member.to_serialized(),
            },
            CollabEvent::MemberLeft { room_id, user_id } => Self::MemberLeft { room_id, user_id },
            CollabEvent::MemberRoleUpdated {
                room_id,
                user_id,
                role,
            } => Self::MemberRoleUpdated {
                room_id,
                user_id,
                role: role.to_string(),
            },
            CollabEvent::MemberBanned { room_id, ban } => Self::MemberBanned {
                room_id,
                user_id: ban.user_id,
                banned_by: ban.banned_by,
                reason: ban.reason,
            },
            CollabEvent::MemberUnbanned { room_id, user_id } => {
                Self::MemberUnbanned { room_id, user_id }
            }
            CollabEvent::ChatMessage { room_id, message } => Self::ChatMessage {
                room_id,
                message: message.to_serialized(),
            },
            CollabEvent::RoomDeleted { room_id } => Self::RoomDeleted { room_id },
        }
    }
}

/// The live connections of every room.
/// Connections are added by connecting, and removed when their handle drops,
/// their user leaves the room, or the room is deleted.
pub struct ConnectionRegistry {
    me: Weak<Self>,
    rooms: Mutex<HashMap<RoomId, HashMap<ConnectionId, Subscriber>>>,
}

struct Subscriber {
    user_id: UserId,
    sender: UnboundedSender<ServerEvent>,
}

/// The receiving end of a connection. Dropping it disconnects.
pub struct ConnectionHandle {
    id: ConnectionId,
    room_id: RoomId,
    receiver: UnboundedReceiver<ServerEvent>,
    /// Required to remove connection when dropped
    registry: Weak<ConnectionRegistry>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            rooms: Default::default(),
        })
    }

    pub fn connect(&self, room_id: RoomId, user_id: UserId) -> ConnectionHandle {
        let id = ConnectionId::new();
        let (sender, receiver) = unbounded_channel();

        self.rooms
            .lock()
            .entry(room_id)
            .or_default()
            .insert(id, Subscriber { user_id, sender });

        ConnectionHandle {
            id,
            room_id,
            receiver,
            registry: self.me.clone(),
        }
    }

    /// Sends an event to every connection of a room, returning how many received it
    pub fn broadcast(&self, room_id: RoomId, event: ServerEvent) -> usize {
        let mut rooms = self.rooms.lock();

        let Some(connections) = rooms.get_mut(&room_id) else {
            return 0;
        };

        connections.retain(|_, subscriber| subscriber.sender.send(event.clone()).is_ok());
        let delivered = connections.len();

        if connections.is_empty() {
            rooms.remove(&room_id);
        }

        delivered
    }

    /// Closes every connection of a room. Their handles receive no further events.
    pub fn close_room(&self, room_id: RoomId) {
        self.rooms.lock().remove(&room_id);
    }

    /// Closes the connections `user_id` has to a room, returning how many there were
    pub fn disconnect_user(&self, room_id: RoomId, user_id: UserId) -> usize {
        let mut rooms = self.rooms.lock();

        let Some(connections) = rooms.get_mut(&room_id) else {
            return 0;
        };

        let before = connections.len();
        connections.retain(|_, subscriber| subscriber.user_id != user_id);
        let closed = before - connections.len();

        if connections.is_empty() {
            rooms.remove(&room_id);
        }

        closed
    }

    pub fn connection_count(&self, room_id: RoomId) -> usize {
        self.rooms
            .lock()
            .get(&room_id)
            .map(|connections| connections.len())
            .unwrap_or(0)
    }

    /// Forwards collab events to the rooms they concern, until the collab system is dropped
    pub fn forward(&self, events: EventReceiver) -> JoinHandle<()> {
        let registry = self.me.clone();

        thread::spawn(move || {
            for event in events.iter() {
                let Some(registry) = registry.upgrade() else {
                    break;
                };

                let room_id = event.room_id();
                let departed = match &event {
                    CollabEvent::MemberLeft { user_id, .. } => Some(*user_id),
                    CollabEvent::MemberBanned { ban, .. } => Some(ban.user_id),
                    _ => None,
                };
                let deleted = matches!(event, CollabEvent::RoomDeleted { .. });

                registry.broadcast(room_id, event.into());

                if let Some(user_id) = departed {
                    let closed = registry.disconnect_user(room_id, user_id);

                    if closed > 0 {
                        info!(
                            "Closed {} connection(s) of user {} to room {}",
                            closed, user_id, room_id
                        );
                    }
                }

                if deleted {
                    registry.close_room(room_id);
                }
            }

            info!("Stopped forwarding room events");
        })
    }

    fn disconnect(&self, room_id: RoomId, id: ConnectionId) {
        let mut rooms = self.rooms.lock();

        if let Some(connections) = rooms.get_mut(&room_id) {
            connections.remove(&id);

            if connections.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next event, returning None once the room closed
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.receiver.recv().await
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.disconnect(self.room_id, self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use musicroom_collab::event_channel;

    use super::*;

    fn deleted(room_id: RoomId) -> ServerEvent {
        ServerEvent::RoomDeleted { room_id }
    }

    #[tokio::test]
    async fn broadcasts_reach_only_the_room() {
        let registry = ConnectionRegistry::new();
        let mut first = registry.connect(1, 1);
        let mut second = registry.connect(1, 1);
        let mut elsewhere = registry.connect(2, 1);

        assert_eq!(registry.broadcast(1, deleted(1)), 2);

        assert!(matches!(first.recv().await, Some(ServerEvent::RoomDeleted { room_id: 1 })));
        assert!(matches!(second.recv().await, Some(ServerEvent::RoomDeleted { room_id: 1 })));
        assert!(elsewhere.receiver.try_recv().is_err());
    }

    #[test]
    fn dropping_a_handle_disconnects() {
        let registry = ConnectionRegistry::new();
        let first = registry.connect(1, 1);
        let second = registry.connect(1, 1);

        assert_ne!(first.id(), second.id());
        assert_eq!(registry.connection_count(1), 2);

        drop(first);
        assert_eq!(registry.connection_count(1), 1);

        drop(second);
        assert_eq!(registry.connection_count(1), 0);
    }

    #[test]
    fn broadcast_to_an_empty_room_is_a_noop() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.broadcast(7, deleted(7)), 0);
    }

    #[tokio::test]
    async fn closing_a_room_ends_its_connections() {
        let registry = ConnectionRegistry::new();
        let mut handle = registry.connect(3, 1);

        registry.close_room(3);

        assert!(handle.recv().await.is_none());
        assert_eq!(registry.connection_count(3), 0);
    }

    #[tokio::test]
    async fn forwards_collab_events() {
        let registry = ConnectionRegistry::new();
        let mut handle = registry.connect(5, 1);
        let (sender, receiver) = event_channel();

        let forwarder = registry.forward(receiver);
        sender
            .send(CollabEvent::MemberLeft {
                room_id: 5,
                user_id: 9,
            })
            .unwrap();
        drop(sender);

        assert!(matches!(
            handle.recv().await,
            Some(ServerEvent::MemberLeft {
                room_id: 5,
                user_id: 9
            })
        ));
        forwarder.join().unwrap();
    }

    #[tokio::test]
    async fn departed_users_are_disconnected() {
        let registry = ConnectionRegistry::new();
        let mut kicked = registry.connect(1, 3);
        let mut staying = registry.connect(1, 1);
        let (sender, receiver) = event_channel();

        let forwarder = registry.forward(receiver);
        sender
            .send(CollabEvent::MemberLeft {
                room_id: 1,
                user_id: 3,
            })
            .unwrap();
        sender
            .send(CollabEvent::MemberUnbanned {
                room_id: 1,
                user_id: 8,
            })
            .unwrap();
        drop(sender);
        forwarder.join().unwrap();

        assert!(matches!(
            kicked.recv().await,
            Some(ServerEvent::MemberLeft { user_id: 3, .. })
        ));
        assert!(kicked.recv().await.is_none());

        assert!(matches!(
            staying.recv().await,
            Some(ServerEvent::MemberLeft { user_id: 3, .. })
        ));
        assert!(matches!(
            staying.recv().await,
            Some(ServerEvent::MemberUnbanned { user_id: 8, .. })
        ));
        assert_eq!(registry.connection_count(1), 1);
    }

    #[test]
    fn disconnecting_a_user_keeps_other_rooms() {
        let registry = ConnectionRegistry::new();
        let _first = registry.connect(1, 3);
        let _second = registry.connect(1, 3);
        let _elsewhere = registry.connect(2, 3);

        assert_eq!(registry.disconnect_user(1, 3), 2);
        assert_eq!(registry.connection_count(1), 0);
        assert_eq!(registry.connection_count(2), 1);
    }
}
