use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use musicroom_core::{EntryId, Order, Playback, RoomId, TrackId, Transition, UserId};
use parking_lot::Mutex;

use crate::{
    BanData, BanStore, ChatStore, Database, DatabaseError, MemberRole, MemberStore, MessageData,
    NewBan, NewMessage, NewQueueEntry, NewRoom, NewRoomMember, NewTrack, PrimaryKey,
    QueueEntryData, QueueStore, QueuedTrackData, RoomData, RoomMemberData, RoomRepository,
    TrackCatalog, TrackData, UpdatedRoom,
};

use super::Result;

/// A database kept entirely in memory. Nothing survives a restart.
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
    available: AtomicBool,
}

#[derive(Default)]
struct Tables {
    last_id: PrimaryKey,
    rooms: BTreeMap<RoomId, RoomData>,
    tracks: BTreeMap<TrackId, TrackData>,
    entries: BTreeMap<EntryId, QueueEntryData>,
    members: BTreeMap<PrimaryKey, RoomMemberData>,
    bans: BTreeMap<PrimaryKey, BanData>,
    messages: BTreeMap<PrimaryKey, MessageData>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            tables: Default::default(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates an outage. While unavailable, every call fails with [DatabaseError::Unavailable].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst)
    }

    fn tables(&self) -> Result<parking_lot::MutexGuard<'_, Tables>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable);
        }

        Ok(self.tables.lock())
    }

    /// Drops a track from the catalog while leaving queue entries and rooms pointing at it
    #[cfg(test)]
    pub(crate) fn forget_track(&self, track_id: TrackId) {
        self.tables.lock().tracks.remove(&track_id);
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Tables {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn room(&self, room_id: RoomId) -> Result<&RoomData> {
        self.rooms.get(&room_id).ok_or(DatabaseError::NotFound {
            resource: "room",
            identifier: "id",
        })
    }

    fn room_mut(&mut self, room_id: RoomId) -> Result<&mut RoomData> {
        self.rooms.get_mut(&room_id).ok_or(DatabaseError::NotFound {
            resource: "room",
            identifier: "id",
        })
    }

    fn room_by_name(&self, name: &str) -> Option<&RoomData> {
        self.rooms.values().find(|r| r.name == name)
    }

    fn member(&self, room_id: RoomId, user_id: UserId) -> Option<&RoomMemberData> {
        self.members
            .values()
            .find(|m| m.room_id == room_id && m.user_id == user_id)
    }

    fn ban(&self, room_id: RoomId, user_id: UserId) -> Option<&BanData> {
        self.bans
            .values()
            .find(|b| b.room_id == room_id && b.user_id == user_id)
    }

    fn ordered_entries(&self, room_id: RoomId) -> Vec<QueueEntryData> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.room_id == room_id)
            .cloned()
            .collect();

        entries.sort_by_key(|e| e.order_in_queue);
        entries
    }

    /// Removes an entry, clearing any room reference to it like the foreign key would
    fn remove_entry(&mut self, entry_id: EntryId) {
        if self.entries.remove(&entry_id).is_some() {
            for room in self.rooms.values_mut() {
                if room.playback.current_entry_id() == Some(entry_id) {
                    room.playback = Playback::EMPTY;
                }
            }
        }
    }

    fn name_conflict(name: &str) -> DatabaseError {
        DatabaseError::Conflict {
            resource: "room",
            field: "name",
            value: name.to_string(),
        }
    }
}

#[async_trait]
impl RoomRepository for MemoryDatabase {
    async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData> {
        self.tables()?.room(room_id).cloned()
    }

    async fn room_by_name(&self, name: &str) -> Result<RoomData> {
        self.tables()?
            .room_by_name(name)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "name",
            })
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        Ok(self.tables()?.rooms.values().cloned().collect())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let mut tables = self.tables()?;

        if tables.room_by_name(&new_room.name).is_some() {
            return Err(Tables::name_conflict(&new_room.name));
        }

        let now = Utc::now();
        let room = RoomData {
            id: tables.next_id(),
            name: new_room.name,
            owner_id: new_room.owner_id,
            max_members: new_room.max_members,
            is_private: new_room.is_private,
            password_hash: new_room.password_hash,
            playback: Playback::EMPTY,
            created_at: now,
        };

        let owner = RoomMemberData {
            id: tables.next_id(),
            room_id: room.id,
            user_id: room.owner_id,
            role: MemberRole::Owner,
            joined_at: now,
        };

        tables.members.insert(owner.id, owner);
        tables.rooms.insert(room.id, room.clone());

        Ok(room)
    }

    async fn update_room(&self, updated_room: UpdatedRoom) -> Result<RoomData> {
        let mut tables = self.tables()?;
        tables.room(updated_room.id)?;

        if let Some(name) = &updated_room.name {
            let taken = tables
                .room_by_name(name)
                .is_some_and(|r| r.id != updated_room.id);

            if taken {
                return Err(Tables::name_conflict(name));
            }
        }

        let room = tables.room_mut(updated_room.id)?;

        if let Some(name) = updated_room.name {
            room.name = name;
        }

        if let Some(max_members) = updated_room.max_members {
            room.max_members = max_members;
        }

        Ok(room.clone())
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<()> {
        let mut tables = self.tables()?;
        tables.room(room_id)?;

        tables.rooms.remove(&room_id);
        tables.entries.retain(|_, e| e.room_id != room_id);
        tables.members.retain(|_, m| m.room_id != room_id);
        tables.bans.retain(|_, b| b.room_id != room_id);
        tables.messages.retain(|_, m| m.room_id != room_id);

        Ok(())
    }
}

#[async_trait]
impl QueueStore for MemoryDatabase {
    async fn list_ordered(&self, room_id: RoomId) -> Result<Vec<QueueEntryData>> {
        Ok(self.tables()?.ordered_entries(room_id))
    }

    async fn list_with_tracks(&self, room_id: RoomId) -> Result<Vec<QueuedTrackData>> {
        let tables = self.tables()?;

        tables
            .ordered_entries(room_id)
            .into_iter()
            .map(|entry| {
                let track = tables
                    .tracks
                    .get(&entry.track_id)
                    .cloned()
                    .ok_or(DatabaseError::NotFound {
                        resource: "track",
                        identifier: "id",
                    })?;

                Ok(QueuedTrackData { entry, track })
            })
            .collect()
    }

    async fn insert(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData> {
        let mut tables = self.tables()?;
        tables.room(new_entry.room_id)?;

        let order_taken = tables.entries.values().any(|e| {
            e.room_id == new_entry.room_id && e.order_in_queue == new_entry.order_in_queue
        });

        if order_taken {
            return Err(DatabaseError::Conflict {
                resource: "queue entry",
                field: "room:order",
                value: format!("{}:{}", new_entry.room_id, new_entry.order_in_queue),
            });
        }

        let entry = QueueEntryData {
            id: tables.next_id(),
            room_id: new_entry.room_id,
            track_id: new_entry.track_id,
            order_in_queue: new_entry.order_in_queue,
            added_by: new_entry.added_by,
            added_at: Utc::now(),
        };

        tables.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn max_order(&self, room_id: RoomId) -> Result<Order> {
        Ok(self
            .tables()?
            .entries
            .values()
            .filter(|e| e.room_id == room_id)
            .map(|e| e.order_in_queue)
            .max()
            .unwrap_or(0))
    }
}

#[async_trait]
impl TrackCatalog for MemoryDatabase {
    async fn track_by_id(&self, track_id: TrackId) -> Result<TrackData> {
        self.tables()?
            .tracks
            .get(&track_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "track",
                identifier: "id",
            })
    }

    async fn list_tracks(&self) -> Result<Vec<TrackData>> {
        Ok(self.tables()?.tracks.values().cloned().collect())
    }

    async fn upsert_track(&self, new_track: NewTrack) -> Result<TrackData> {
        let mut tables = self.tables()?;

        let existing = tables
            .tracks
            .values()
            .find(|t| t.external_id == new_track.external_id)
            .map(|t| t.id);

        let id = match existing {
            Some(id) => id,
            None => tables.next_id(),
        };

        let track = TrackData {
            id,
            external_id: new_track.external_id,
            title: new_track.title,
            artist: new_track.artist,
            album: new_track.album,
            artwork_url: new_track.artwork_url,
            duration_ms: new_track.duration_ms,
        };

        tables.tracks.insert(id, track.clone());
        Ok(track)
    }
}

#[async_trait]
impl MemberStore for MemoryDatabase {
    async fn members(&self, room_id: RoomId) -> Result<Vec<RoomMemberData>> {
        Ok(self
            .tables()?
            .members
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn member(&self, room_id: RoomId, user_id: UserId) -> Result<RoomMemberData> {
        self.tables()?
            .member(room_id, user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room member",
                identifier: "room_id:user_id",
            })
    }

    async fn count_members(&self, room_id: RoomId) -> Result<i64> {
        let tables = self.tables()?;
        let count = tables.members.values().filter(|m| m.room_id == room_id).count();

        Ok(count as i64)
    }

    async fn add_member(&self, new_member: NewRoomMember) -> Result<RoomMemberData> {
        let mut tables = self.tables()?;
        tables.room(new_member.room_id)?;

        if tables.member(new_member.room_id, new_member.user_id).is_some() {
            return Err(DatabaseError::Conflict {
                resource: "room member",
                field: "user:room",
                value: format!("{}:{}", new_member.user_id, new_member.room_id),
            });
        }

        let member = RoomMemberData {
            id: tables.next_id(),
            room_id: new_member.room_id,
            user_id: new_member.user_id,
            role: new_member.role,
            joined_at: Utc::now(),
        };

        tables.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        let mut tables = self.tables()?;

        let id = tables
            .member(room_id, user_id)
            .map(|m| m.id)
            .ok_or(DatabaseError::NotFound {
                resource: "room member",
                identifier: "room_id:user_id",
            })?;

        tables.members.remove(&id);
        Ok(())
    }

    async fn update_member_role(
        &self,
        room_id: RoomId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<RoomMemberData> {
        let mut tables = self.tables()?;

        let member = tables
            .members
            .values_mut()
            .find(|m| m.room_id == room_id && m.user_id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "room member",
                identifier: "room_id:user_id",
            })?;

        member.role = role;
        Ok(member.clone())
    }
}

#[async_trait]
impl BanStore for MemoryDatabase {
    async fn bans(&self, room_id: RoomId) -> Result<Vec<BanData>> {
        Ok(self
            .tables()?
            .bans
            .values()
            .filter(|b| b.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn ban(&self, room_id: RoomId, user_id: UserId) -> Result<BanData> {
        self.tables()?
            .ban(room_id, user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room ban",
                identifier: "room_id:user_id",
            })
    }

    async fn add_ban(&self, new_ban: NewBan) -> Result<BanData> {
        let mut tables = self.tables()?;
        tables.room(new_ban.room_id)?;

        if tables.ban(new_ban.room_id, new_ban.user_id).is_some() {
            return Err(DatabaseError::Conflict {
                resource: "room ban",
                field: "user:room",
                value: format!("{}:{}", new_ban.user_id, new_ban.room_id),
            });
        }

        tables
            .members
            .retain(|_, m| !(m.room_id == new_ban.room_id && m.user_id == new_ban.user_id));

        let ban = BanData {
            id: tables.next_id(),
            room_id: new_ban.room_id,
            user_id: new_ban.user_id,
            banned_by: new_ban.banned_by,
            reason: new_ban.reason,
            banned_at: Utc::now(),
        };

        tables.bans.insert(ban.id, ban.clone());
        Ok(ban)
    }

    async fn remove_ban(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        let mut tables = self.tables()?;

        let id = tables
            .ban(room_id, user_id)
            .map(|b| b.id)
            .ok_or(DatabaseError::NotFound {
                resource: "room ban",
                identifier: "room_id:user_id",
            })?;

        tables.bans.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryDatabase {
    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        let mut tables = self.tables()?;
        tables.room(new_message.room_id)?;

        let message = MessageData {
            id: tables.next_id(),
            room_id: new_message.room_id,
            user_id: new_message.user_id,
            content: new_message.content,
            sent_at: Utc::now(),
        };

        tables.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn recent_messages(&self, room_id: RoomId, limit: u32) -> Result<Vec<MessageData>> {
        let tables = self.tables()?;

        // Ids are handed out in insertion order, so they double as send order
        let mut latest: Vec<_> = tables
            .messages
            .values()
            .rev()
            .filter(|m| m.room_id == room_id)
            .take(limit as usize)
            .cloned()
            .collect();

        latest.reverse();
        Ok(latest)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn commit_playback(&self, room_id: RoomId, transition: &Transition) -> Result<()> {
        let mut tables = self.tables()?;
        tables.room(room_id)?;

        if let Some(entry_id) = transition.removes {
            let belongs_to_room = tables
                .entries
                .get(&entry_id)
                .is_some_and(|e| e.room_id == room_id);

            if belongs_to_room {
                tables.remove_entry(entry_id);
            }
        }

        tables.room_mut(room_id)?.playback = transition.playback;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn room_with_track(db: &MemoryDatabase) -> (RoomId, TrackId) {
        let room = db
            .create_room(NewRoom {
                name: "lounge".to_string(),
                owner_id: 1,
                max_members: 10,
                is_private: false,
                password_hash: None,
            })
            .await
            .unwrap();

        let track = db
            .upsert_track(NewTrack {
                external_id: "ext:1".to_string(),
                title: "Song".to_string(),
                artist: "Artist".to_string(),
                album: None,
                artwork_url: None,
                duration_ms: 180_000,
            })
            .await
            .unwrap();

        (room.id, track.id)
    }

    #[tokio::test]
    async fn removal_leaves_gaps_in_order() {
        let db = MemoryDatabase::new();
        let (room_id, track_id) = room_with_track(&db).await;

        let mut ids = vec![];
        for order in 1..=3 {
            let entry = db
                .insert(NewQueueEntry {
                    room_id,
                    track_id,
                    order_in_queue: order,
                    added_by: 1,
                })
                .await
                .unwrap();

            ids.push(entry.id);
        }

        let removal = Transition {
            playback: Playback::EMPTY,
            removes: Some(ids[1]),
            advance: None,
        };

        db.commit_playback(room_id, &removal).await.unwrap();
        // Removing it again changes nothing
        db.commit_playback(room_id, &removal).await.unwrap();

        let orders: Vec<_> = db
            .list_ordered(room_id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.order_in_queue)
            .collect();

        assert_eq!(orders, vec![1, 3]);
        assert_eq!(db.max_order(room_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn duplicate_order_is_a_conflict() {
        let db = MemoryDatabase::new();
        let (room_id, track_id) = room_with_track(&db).await;

        let new_entry = || NewQueueEntry {
            room_id,
            track_id,
            order_in_queue: 1,
            added_by: 1,
        };

        db.insert(new_entry()).await.unwrap();
        let result = db.insert(new_entry()).await;

        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn deleting_a_room_cascades() {
        let db = MemoryDatabase::new();
        let (room_id, track_id) = room_with_track(&db).await;

        db.insert(NewQueueEntry {
            room_id,
            track_id,
            order_in_queue: 1,
            added_by: 1,
        })
        .await
        .unwrap();

        db.add_ban(NewBan {
            room_id,
            user_id: 5,
            banned_by: 1,
            reason: None,
        })
        .await
        .unwrap();

        db.delete_room(room_id).await.unwrap();

        assert!(db.list_ordered(room_id).await.unwrap().is_empty());
        assert!(db.members(room_id).await.unwrap().is_empty());
        assert!(db.bans(room_id).await.unwrap().is_empty());
        // Tracks are referenced, never owned
        assert!(db.track_by_id(track_id).await.is_ok());
    }

    #[tokio::test]
    async fn banning_removes_membership() {
        let db = MemoryDatabase::new();
        let (room_id, _) = room_with_track(&db).await;

        db.add_member(NewRoomMember {
            room_id,
            user_id: 2,
            role: MemberRole::Member,
        })
        .await
        .unwrap();

        let new_ban = || NewBan {
            room_id,
            user_id: 2,
            banned_by: 1,
            reason: Some("spam".to_string()),
        };

        db.add_ban(new_ban()).await.unwrap();

        assert!(matches!(
            db.member(room_id, 2).await,
            Err(DatabaseError::NotFound { .. })
        ));
        assert!(matches!(
            db.add_ban(new_ban()).await,
            Err(DatabaseError::Conflict { .. })
        ));

        db.remove_ban(room_id, 2).await.unwrap();
        assert!(db.bans(room_id).await.unwrap().is_empty());
        assert!(matches!(
            db.remove_ban(room_id, 2).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_refreshes_existing_tracks() {
        let db = MemoryDatabase::new();
        let (_, track_id) = room_with_track(&db).await;

        let refreshed = db
            .upsert_track(NewTrack {
                external_id: "ext:1".to_string(),
                title: "Song (Remastered)".to_string(),
                artist: "Artist".to_string(),
                album: Some("Album".to_string()),
                artwork_url: None,
                duration_ms: 181_000,
            })
            .await
            .unwrap();

        assert_eq!(refreshed.id, track_id);
        assert_eq!(db.list_tracks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_database_fails_every_call() {
        let db = MemoryDatabase::new();
        db.set_available(false);

        assert!(matches!(
            db.list_rooms().await,
            Err(DatabaseError::Unavailable)
        ));
    }
}
