mod chat;
mod members;
mod playback;
mod queue;

use std::sync::Arc;

use dashmap::DashMap;
use log::{error, info};
use musicroom_core::{PlaybackError, RoomId, UserId};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CollabContext, CollabEvent, Database, DatabaseError, MemberRole, NewRoom, RoomData,
    RoomMemberData, RoomPasswords, UpdatedRoom,
};

pub use chat::*;
pub use playback::*;

pub type Result<T> = std::result::Result<T, RoomError>;

/// Orchestrates the playback state machine and room membership against the database
pub struct RoomService {
    context: CollabContext,
    passwords: RoomPasswords,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room does not exist")]
    RoomNotFound,
    #[error("A room named {0} already exists")]
    RoomAlreadyExists(String),
    #[error("Track does not exist")]
    TrackNotFound,
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("User is not a member of this room")]
    NotAMember,
    #[error("User is already a member of this room")]
    AlreadyMember,
    #[error("User is banned from this room")]
    UserBanned,
    #[error("User is already banned from this room")]
    AlreadyBanned,
    #[error("User is not banned from this room")]
    NotBanned,
    #[error("Room is full")]
    RoomFull,
    #[error("Invalid room password")]
    InvalidRoomPassword,
    #[error("Private rooms require a password")]
    PrivateRoomRequiresPassword,
    #[error("Public rooms cannot have a password")]
    PublicRoomCannotHavePassword,
    #[error("Permission denied: {0}")]
    PermissionDenied(&'static str),
    #[error("Member already has the {0} role")]
    RoleConflict(MemberRole),
    #[error("Invalid action: {0}")]
    InvalidAction(&'static str),
    #[error("HashError: {0}")]
    HashError(String),
    /// Something else went wrong with the database
    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for RoomError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { resource, .. } => match resource {
                "room" => Self::RoomNotFound,
                "track" => Self::TrackNotFound,
                "queue entry" => Self::Playback(PlaybackError::EntryNotFound),
                "room member" => Self::NotAMember,
                "room ban" => Self::NotBanned,
                _ => Self::Database(err),
            },
            DatabaseError::Conflict {
                resource: "room",
                value,
                ..
            } => Self::RoomAlreadyExists(value),
            DatabaseError::Conflict {
                resource: "room member",
                ..
            } => Self::AlreadyMember,
            DatabaseError::Conflict {
                resource: "room ban",
                ..
            } => Self::AlreadyBanned,
            err => Self::Database(err),
        }
    }
}

/// Converts database results into room results, logging infrastructure failures
trait DatabaseFailure<T> {
    fn context(self, operation: &'static str, room_id: RoomId) -> Result<T>;
    /// Same as [DatabaseFailure::context], for operations outside of a single room
    fn logged(self, operation: &'static str) -> Result<T>;
}

impl<T> DatabaseFailure<T> for std::result::Result<T, DatabaseError> {
    fn context(self, operation: &'static str, room_id: RoomId) -> Result<T> {
        self.map_err(|err| {
            let err = RoomError::from(err);

            if let RoomError::Database(db_err) = &err {
                error!("{} failed for room {}: {}", operation, room_id, db_err);
            }

            err
        })
    }

    fn logged(self, operation: &'static str) -> Result<T> {
        self.map_err(|err| {
            let err = RoomError::from(err);

            if let RoomError::Database(db_err) = &err {
                error!("{} failed: {}", operation, db_err);
            }

            err
        })
    }
}

type LockMap = Arc<DashMap<RoomId, Arc<Mutex<()>>>>;

/// One async mutex per room, so that every mutation of a room happens in sequence.
/// A room's mutex only exists while someone holds or awaits it.
#[derive(Clone, Default)]
pub struct RoomLocks {
    locks: LockMap,
}

/// Exclusive access to a room, released on drop
pub struct RoomGuard {
    room_id: RoomId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl RoomLocks {
    pub async fn lock(&self, room_id: RoomId) -> RoomGuard {
        let lock = self.locks.entry(room_id).or_default().clone();

        RoomGuard {
            room_id,
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    /// The number of rooms that currently have a mutex
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // The map holds the last reference once nobody is waiting for the room
        self.locks
            .remove_if(&self.room_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Debug, Clone)]
pub struct NewRoomRequest {
    pub name: String,
    /// Falls back to the configured default when omitted
    pub max_members: Option<i32>,
    pub is_private: bool,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RoomChanges {
    pub name: Option<String>,
    pub max_members: Option<i32>,
}

impl RoomService {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            passwords: Default::default(),
        }
    }

    fn db(&self) -> &dyn Database {
        self.context.database.as_ref()
    }

    /// Creates a new room owned by `owner`
    pub async fn create_room(&self, owner: UserId, request: NewRoomRequest) -> Result<RoomData> {
        let password_hash = match (request.is_private, request.password) {
            (true, Some(password)) => Some(self.passwords.hash(&password)?),
            (true, None) => return Err(RoomError::PrivateRoomRequiresPassword),
            (false, Some(_)) => return Err(RoomError::PublicRoomCannotHavePassword),
            (false, None) => None,
        };

        let room = self
            .db()
            .create_room(NewRoom {
                name: request.name,
                owner_id: owner,
                max_members: request
                    .max_members
                    .unwrap_or(self.context.config.default_max_members),
                is_private: request.is_private,
                password_hash,
            })
            .await
            .logged("create_room")?;

        info!("Created room {} ({}) for user {}", room.id, room.name, owner);
        Ok(room)
    }

    pub async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData> {
        self.db()
            .room_by_id(room_id)
            .await
            .context("room_by_id", room_id)
    }

    pub async fn room_by_name(&self, name: &str) -> Result<RoomData> {
        self.db()
            .room_by_name(name)
            .await
            .logged("room_by_name")
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        self.db().list_rooms().await.logged("list_rooms")
    }

    /// Renames a room or changes its member limit. Only the owner may do this.
    pub async fn update_room(
        &self,
        actor: UserId,
        room_id: RoomId,
        changes: RoomChanges,
    ) -> Result<RoomData> {
        let _guard = self.context.locks.lock(room_id).await;
        let room = self.room_by_id(room_id).await?;

        if room.owner_id != actor {
            return Err(RoomError::PermissionDenied("only the owner can edit the room"));
        }

        if let Some(max_members) = changes.max_members {
            let count = self
                .db()
                .count_members(room_id)
                .await
                .context("update_room", room_id)?;

            if i64::from(max_members) < count {
                return Err(RoomError::InvalidAction(
                    "max members cannot be below the current member count",
                ));
            }
        }

        self.db()
            .update_room(UpdatedRoom {
                id: room_id,
                name: changes.name,
                max_members: changes.max_members,
            })
            .await
            .context("update_room", room_id)
    }

    /// Deletes a room along with its queue, members and messages. Only the owner may do this.
    pub async fn delete_room(&self, actor: UserId, room_id: RoomId) -> Result<()> {
        let _guard = self.context.locks.lock(room_id).await;
        let room = self.room_by_id(room_id).await?;

        if room.owner_id != actor {
            return Err(RoomError::PermissionDenied("only the owner can delete the room"));
        }

        self.db()
            .delete_room(room_id)
            .await
            .context("delete_room", room_id)?;

        info!("Deleted room {} ({})", room.id, room.name);
        self.context.emit(CollabEvent::RoomDeleted { room_id });

        Ok(())
    }

    /// Returns the membership of `user_id`, failing if the room doesn't exist or they aren't in it
    async fn require_member(
        &self,
        operation: &'static str,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<RoomMemberData> {
        self.db()
            .room_by_id(room_id)
            .await
            .context(operation, room_id)?;

        self.db()
            .member(room_id, user_id)
            .await
            .context(operation, room_id)
    }

    /// Like [RoomService::require_member], additionally requiring the owner or moderator role
    async fn require_controller(
        &self,
        operation: &'static str,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<RoomMemberData> {
        let member = self.require_member(operation, room_id, user_id).await?;

        if !member.role.can_control() {
            return Err(RoomError::PermissionDenied(
                "only owners and moderators can manage the queue and playback",
            ));
        }

        Ok(member)
    }
}
