use async_trait::async_trait;
use musicroom_core::{Order, RoomId, TrackId, Transition, UserId};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// The database could not be reached
    #[error("The database is unavailable")]
    Unavailable,
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Persists rooms. Playback fields are only written through [Database::commit_playback].
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData>;
    async fn room_by_name(&self, name: &str) -> Result<RoomData>;
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    /// Creates a room and registers its owner as a member with the owner role
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn update_room(&self, updated_room: UpdatedRoom) -> Result<RoomData>;
    /// Deletes a room along with its queue, members, bans and messages
    async fn delete_room(&self, room_id: RoomId) -> Result<()>;
}

/// The ordered collection of queued tracks per room.
/// Entries leave the queue only through [Database::commit_playback].
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Entries of a room by ascending order
    async fn list_ordered(&self, room_id: RoomId) -> Result<Vec<QueueEntryData>>;
    /// Same as [QueueStore::list_ordered], joined with track metadata
    async fn list_with_tracks(&self, room_id: RoomId) -> Result<Vec<QueuedTrackData>>;
    async fn insert(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData>;
    /// The highest order in a room's queue, or 0 when it is empty
    async fn max_order(&self, room_id: RoomId) -> Result<Order>;
}

/// Track metadata cached from an external catalog
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn track_by_id(&self, track_id: TrackId) -> Result<TrackData>;
    async fn list_tracks(&self) -> Result<Vec<TrackData>>;
    /// Inserts the track, or refreshes its metadata if the external id is already known
    async fn upsert_track(&self, new_track: NewTrack) -> Result<TrackData>;
}

#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn members(&self, room_id: RoomId) -> Result<Vec<RoomMemberData>>;
    async fn member(&self, room_id: RoomId, user_id: UserId) -> Result<RoomMemberData>;
    async fn count_members(&self, room_id: RoomId) -> Result<i64>;
    async fn add_member(&self, new_member: NewRoomMember) -> Result<RoomMemberData>;
    async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> Result<()>;
    async fn update_member_role(
        &self,
        room_id: RoomId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<RoomMemberData>;
}

/// Users barred from joining a room
#[async_trait]
pub trait BanStore: Send + Sync {
    async fn bans(&self, room_id: RoomId) -> Result<Vec<BanData>>;
    async fn ban(&self, room_id: RoomId, user_id: UserId) -> Result<BanData>;
    /// Bans a user, removing their membership of the room in the same unit
    async fn add_ban(&self, new_ban: NewBan) -> Result<BanData>;
    async fn remove_ban(&self, room_id: RoomId, user_id: UserId) -> Result<()>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData>;
    /// The latest `limit` messages of a room, oldest first
    async fn recent_messages(&self, room_id: RoomId, limit: u32) -> Result<Vec<MessageData>>;
}

/// Represents a type that can store all musicroom data
#[async_trait]
pub trait Database:
    RoomRepository + QueueStore + TrackCatalog + MemberStore + BanStore + ChatStore
{
    /// Applies a playback transition to a room as a single unit:
    /// the consumed entry is removed and the playback fields are updated together, or not at all.
    async fn commit_playback(&self, room_id: RoomId, transition: &Transition) -> Result<()>;
}

#[derive(Debug)]
pub struct NewRoom {
    pub name: String,
    /// The owner of the new room
    pub owner_id: UserId,
    pub max_members: i32,
    pub is_private: bool,
    pub password_hash: Option<String>,
}

#[derive(Debug, Default)]
pub struct UpdatedRoom {
    pub id: RoomId,
    pub name: Option<String>,
    pub max_members: Option<i32>,
}

#[derive(Debug)]
pub struct NewQueueEntry {
    pub room_id: RoomId,
    pub track_id: TrackId,
    pub order_in_queue: Order,
    pub added_by: UserId,
}

#[derive(Debug, Clone)]
pub struct NewTrack {
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
    pub duration_ms: u32,
}

#[derive(Debug)]
pub struct NewRoomMember {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub role: MemberRole,
}

#[derive(Debug)]
pub struct NewBan {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub banned_by: UserId,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: String,
}
