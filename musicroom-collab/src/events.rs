use crossbeam::channel::{unbounded, Receiver, Sender};
use musicroom_core::{RoomId, UserId};

use crate::{BanData, MemberRole, MessageData, PlaybackStatus, QueuedTrackData, RoomMemberData};

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// Creates an unbounded channel for collab events
pub fn event_channel() -> (EventSender, EventReceiver) {
    unbounded()
}

/// Events emitted after a room changed
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// The queue of a room was modified
    QueueUpdated {
        room_id: RoomId,
        /// Every entry left in the queue, by ascending order
        entries: Vec<QueuedTrackData>,
    },
    /// The player of a room changed state, track or position
    PlaybackUpdated {
        room_id: RoomId,
        status: PlaybackStatus,
    },
    /// User became a member of a room
    MemberJoined {
        room_id: RoomId,
        member: RoomMemberData,
    },
    /// User left a room or was kicked from it
    MemberLeft { room_id: RoomId, user_id: UserId },
    MemberRoleUpdated {
        room_id: RoomId,
        user_id: UserId,
        role: MemberRole,
    },
    /// User was barred from the room. A [CollabEvent::MemberLeft] precedes it if they were a member.
    MemberBanned { room_id: RoomId, ban: BanData },
    MemberUnbanned { room_id: RoomId, user_id: UserId },
    /// A chat message was sent to a room
    ChatMessage {
        room_id: RoomId,
        message: MessageData,
    },
    /// The room no longer exists
    RoomDeleted { room_id: RoomId },
}

impl CollabEvent {
    /// The room this event concerns
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::QueueUpdated { room_id, .. }
            | Self::PlaybackUpdated { room_id, .. }
            | Self::MemberJoined { room_id, .. }
            | Self::MemberLeft { room_id, .. }
            | Self::MemberRoleUpdated { room_id, .. }
            | Self::MemberBanned { room_id, .. }
            | Self::MemberUnbanned { room_id, .. }
            | Self::ChatMessage { room_id, .. }
            | Self::RoomDeleted { room_id } => *room_id,
        }
    }
}
