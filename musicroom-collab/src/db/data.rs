use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use musicroom_core::{EntryId, Order, Playback, QueueEntry, RoomId, TrackId, UserId};

pub use musicroom_core::PrimaryKey;

/// A musicroom room
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: RoomId,
    /// Unique, human readable name of the room
    pub name: String,
    pub owner_id: UserId,
    pub max_members: i32,
    pub is_private: bool,
    /// Argon2 hash, only set for private rooms
    pub password_hash: Option<String>,
    pub playback: Playback,
    pub created_at: DateTime<Utc>,
}

/// Track metadata cached from an external catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackData {
    pub id: TrackId,
    /// The identifier of the track in the external catalog
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
    pub duration_ms: u32,
}

/// A track waiting in a room's queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntryData {
    pub id: EntryId,
    pub room_id: RoomId,
    pub track_id: TrackId,
    pub order_in_queue: Order,
    pub added_by: UserId,
    pub added_at: DateTime<Utc>,
}

/// A queue entry joined with the track it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrackData {
    pub entry: QueueEntryData,
    pub track: TrackData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRole {
    Owner,
    Moderator,
    Member,
}

/// A member of a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMemberData {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// A user barred from joining a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanData {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub banned_by: UserId,
    pub reason: Option<String>,
    pub banned_at: DateTime<Utc>,
}

/// A chat message sent in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageData {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl QueueEntryData {
    /// The view of this entry the playback state machine works with
    pub fn entry(&self) -> QueueEntry {
        QueueEntry {
            id: self.id,
            track_id: self.track_id,
            order: self.order_in_queue,
        }
    }
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Moderator => "moderator",
            Self::Member => "member",
        }
    }

    /// Owners and moderators may manage the queue and control playback
    pub fn can_control(&self) -> bool {
        matches!(self, Self::Owner | Self::Moderator)
    }
}

impl Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "moderator" => Ok(Self::Moderator),
            "member" => Ok(Self::Member),
            other => Err(format!("unknown member role: {}", other)),
        }
    }
}
