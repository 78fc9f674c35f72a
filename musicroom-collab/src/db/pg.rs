use async_trait::async_trait;
use chrono::{DateTime, Utc};
use musicroom_core::{CurrentTrack, Order, Playback, RoomId, TrackId, Transition, UserId};
use sqlx::{
    postgres::{PgExecutor, PgPoolOptions},
    query, query_as, query_scalar, Error as SqlxError, FromRow, PgPool,
};

use crate::{
    BanData, BanStore, ChatStore, Database, DatabaseError, DatabaseResult, IntoDatabaseError,
    MemberRole, MemberStore, MessageData, NewBan, NewMessage, NewQueueEntry, NewRoom,
    NewRoomMember, NewTrack, PrimaryKey, QueueEntryData, QueueStore, QueuedTrackData, RoomData,
    RoomMemberData, RoomRepository, TrackCatalog, TrackData, UpdatedRoom,
};

use super::Result;

/// A postgres database implementation for musicroom
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connects to the database and applies pending migrations
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }
}

#[derive(FromRow)]
struct RoomRow {
    id: i32,
    name: String,
    owner_id: i32,
    max_members: i32,
    is_private: bool,
    password_hash: Option<String>,
    current_entry_id: Option<i32>,
    current_track_id: Option<i32>,
    current_track_position_ms: Option<i32>,
    is_playing: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct TrackRow {
    id: i32,
    external_id: String,
    title: String,
    artist: String,
    album: Option<String>,
    artwork_url: Option<String>,
    duration_ms: i32,
}

#[derive(FromRow)]
struct QueueEntryRow {
    id: i32,
    room_id: i32,
    track_id: i32,
    order_in_queue: i32,
    added_by: i32,
    added_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct QueuedTrackRow {
    #[sqlx(flatten)]
    entry: QueueEntryRow,
    external_id: String,
    title: String,
    artist: String,
    album: Option<String>,
    artwork_url: Option<String>,
    duration_ms: i32,
}

#[derive(FromRow)]
struct MemberRow {
    id: i32,
    room_id: i32,
    user_id: i32,
    role: String,
    joined_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct BanRow {
    id: i32,
    room_id: i32,
    user_id: i32,
    banned_by: i32,
    reason: Option<String>,
    banned_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct MessageRow {
    id: i32,
    room_id: i32,
    user_id: i32,
    content: String,
    sent_at: DateTime<Utc>,
}

fn ms_from_db(value: i32) -> u32 {
    value.max(0) as u32
}

fn ms_to_db(value: u32) -> i32 {
    value.min(i32::MAX as u32) as i32
}

impl From<RoomRow> for RoomData {
    fn from(row: RoomRow) -> Self {
        let current = row
            .current_entry_id
            .zip(row.current_track_id)
            .map(|(entry_id, track_id)| CurrentTrack { entry_id, track_id });

        Self {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            max_members: row.max_members,
            is_private: row.is_private,
            password_hash: row.password_hash,
            playback: Playback {
                current,
                is_playing: current.is_some() && row.is_playing,
                position_ms: current
                    .and(row.current_track_position_ms)
                    .map(ms_from_db),
            },
            created_at: row.created_at,
        }
    }
}

impl From<TrackRow> for TrackData {
    fn from(row: TrackRow) -> Self {
        Self {
            id: row.id,
            external_id: row.external_id,
            title: row.title,
            artist: row.artist,
            album: row.album,
            artwork_url: row.artwork_url,
            duration_ms: ms_from_db(row.duration_ms),
        }
    }
}

impl From<QueueEntryRow> for QueueEntryData {
    fn from(row: QueueEntryRow) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            track_id: row.track_id,
            order_in_queue: row.order_in_queue,
            added_by: row.added_by,
            added_at: row.added_at,
        }
    }
}

impl From<QueuedTrackRow> for QueuedTrackData {
    fn from(row: QueuedTrackRow) -> Self {
        let track = TrackData {
            id: row.entry.track_id,
            external_id: row.external_id,
            title: row.title,
            artist: row.artist,
            album: row.album,
            artwork_url: row.artwork_url,
            duration_ms: ms_from_db(row.duration_ms),
        };

        Self {
            entry: row.entry.into(),
            track,
        }
    }
}

impl TryFrom<MemberRow> for RoomMemberData {
    type Error = DatabaseError;

    fn try_from(row: MemberRow) -> Result<Self> {
        let role = row
            .role
            .parse::<MemberRole>()
            .map_err(|e| DatabaseError::Internal(e.into()))?;

        Ok(Self {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            role,
            joined_at: row.joined_at,
        })
    }
}

impl From<BanRow> for BanData {
    fn from(row: BanRow) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            banned_by: row.banned_by,
            reason: row.reason,
            banned_at: row.banned_at,
        }
    }
}

impl From<MessageRow> for MessageData {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            content: row.content,
            sent_at: row.sent_at,
        }
    }
}

async fn write_playback<'e, E>(executor: E, room_id: RoomId, playback: &Playback) -> Result<()>
where
    E: PgExecutor<'e>,
{
    query(
        "UPDATE rooms SET
            current_entry_id = $1,
            current_track_id = $2,
            current_track_position_ms = $3,
            is_playing = $4
        WHERE id = $5",
    )
    .bind(playback.current_entry_id())
    .bind(playback.current_track_id())
    .bind(playback.position_ms.map(ms_to_db))
    .bind(playback.is_playing)
    .bind(room_id)
    .execute(executor)
    .await
    .map(|_| ())
    .map_err(|e| e.any())
}

#[async_trait]
impl RoomRepository for PgDatabase {
    async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData> {
        query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn room_by_name(&self, name: &str) -> Result<RoomData> {
        query_as::<_, RoomRow>("SELECT * FROM rooms WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("room", "name"))
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        query_as::<_, RoomRow>("SELECT * FROM rooms ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Into::into).collect())
            .map_err(|e| e.any())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.room_by_name(&new_room.name)
            .await
            .conflict_or_ok("room", "name", &new_room.name)?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let room: RoomData = query_as::<_, RoomRow>(
            "
            INSERT INTO rooms (name, owner_id, max_members, is_private, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(&new_room.name)
        .bind(new_room.owner_id)
        .bind(new_room.max_members)
        .bind(new_room.is_private)
        .bind(&new_room.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.conflict_or_any("room", "name", &new_room.name))?
        .into();

        // Add owner as a member to the room
        query("INSERT INTO room_members (room_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(room.id)
            .bind(new_room.owner_id)
            .bind(MemberRole::Owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        Ok(room)
    }

    async fn update_room(&self, updated_room: UpdatedRoom) -> Result<RoomData> {
        let room = self.room_by_id(updated_room.id).await?;

        if let Some(name) = updated_room.name.as_deref().filter(|n| *n != room.name) {
            self.room_by_name(name)
                .await
                .conflict_or_ok("room", "name", name)?;
        }

        let name = updated_room.name.unwrap_or(room.name);

        query_as::<_, RoomRow>(
            "UPDATE rooms SET
                name = $1,
                max_members = $2
            WHERE id = $3
            RETURNING *",
        )
        .bind(&name)
        .bind(updated_room.max_members.unwrap_or(room.max_members))
        .bind(updated_room.id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.conflict_or_any("room", "name", &name))
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<()> {
        // Ensure room exists
        let _ = self.room_by_id(room_id).await?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        // Break the room -> entry reference before the entries are cascaded away
        query("UPDATE rooms SET current_entry_id = NULL WHERE id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }
}

#[async_trait]
impl QueueStore for PgDatabase {
    async fn list_ordered(&self, room_id: RoomId) -> Result<Vec<QueueEntryData>> {
        query_as::<_, QueueEntryRow>(
            "SELECT * FROM queue_entries WHERE room_id = $1 ORDER BY order_in_queue",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Into::into).collect())
        .map_err(|e| e.any())
    }

    async fn list_with_tracks(&self, room_id: RoomId) -> Result<Vec<QueuedTrackData>> {
        query_as::<_, QueuedTrackRow>(
            "
            SELECT
                entries.*,
                tracks.external_id,
                tracks.title,
                tracks.artist,
                tracks.album,
                tracks.artwork_url,
                tracks.duration_ms
            FROM queue_entries AS entries
                INNER JOIN tracks ON entries.track_id = tracks.id
            WHERE entries.room_id = $1
            ORDER BY entries.order_in_queue",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Into::into).collect())
        .map_err(|e| e.any())
    }

    async fn insert(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData> {
        let value = format!("{}:{}", new_entry.room_id, new_entry.order_in_queue);

        query_as::<_, QueueEntryRow>(
            "
            INSERT INTO queue_entries (room_id, track_id, order_in_queue, added_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(new_entry.room_id)
        .bind(new_entry.track_id)
        .bind(new_entry.order_in_queue)
        .bind(new_entry.added_by)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.conflict_or_any("queue entry", "room:order", &value))
    }

    async fn max_order(&self, room_id: RoomId) -> Result<Order> {
        query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(order_in_queue), 0) FROM queue_entries WHERE room_id = $1",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }
}

#[async_trait]
impl TrackCatalog for PgDatabase {
    async fn track_by_id(&self, track_id: TrackId) -> Result<TrackData> {
        query_as::<_, TrackRow>("SELECT * FROM tracks WHERE id = $1")
            .bind(track_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("track", "id"))
    }

    async fn list_tracks(&self) -> Result<Vec<TrackData>> {
        query_as::<_, TrackRow>("SELECT * FROM tracks ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Into::into).collect())
            .map_err(|e| e.any())
    }

    async fn upsert_track(&self, new_track: NewTrack) -> Result<TrackData> {
        query_as::<_, TrackRow>(
            "
            INSERT INTO tracks (external_id, title, artist, album, artwork_url, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (external_id) DO UPDATE SET
                title = EXCLUDED.title,
                artist = EXCLUDED.artist,
                album = EXCLUDED.album,
                artwork_url = EXCLUDED.artwork_url,
                duration_ms = EXCLUDED.duration_ms
            RETURNING *",
        )
        .bind(&new_track.external_id)
        .bind(&new_track.title)
        .bind(&new_track.artist)
        .bind(&new_track.album)
        .bind(&new_track.artwork_url)
        .bind(ms_to_db(new_track.duration_ms))
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }
}

#[async_trait]
impl MemberStore for PgDatabase {
    async fn members(&self, room_id: RoomId) -> Result<Vec<RoomMemberData>> {
        query_as::<_, MemberRow>("SELECT * FROM room_members WHERE room_id = $1 ORDER BY id")
            .bind(room_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?
            .into_iter()
            .map(RoomMemberData::try_from)
            .collect()
    }

    async fn member(&self, room_id: RoomId, user_id: UserId) -> Result<RoomMemberData> {
        query_as::<_, MemberRow>("SELECT * FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room member", "room_id:user_id"))?
            .try_into()
    }

    async fn count_members(&self, room_id: RoomId) -> Result<i64> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM room_members WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn add_member(&self, new_member: NewRoomMember) -> Result<RoomMemberData> {
        let value = format!("{}:{}", new_member.user_id, new_member.room_id);

        // Ensure the user isn't a member of this room already
        self.member(new_member.room_id, new_member.user_id)
            .await
            .conflict_or_ok("room member", "user:room", &value)?;

        query_as::<_, MemberRow>(
            "
            INSERT INTO room_members (room_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING *",
        )
        .bind(new_member.room_id)
        .bind(new_member.user_id)
        .bind(new_member.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or_any("room member", "user:room", &value))?
        .try_into()
    }

    async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        let affected = query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?
            .rows_affected();

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room member",
                identifier: "room_id:user_id",
            });
        }

        Ok(())
    }

    async fn update_member_role(
        &self,
        room_id: RoomId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<RoomMemberData> {
        query_as::<_, MemberRow>(
            "UPDATE room_members SET role = $1 WHERE room_id = $2 AND user_id = $3 RETURNING *",
        )
        .bind(role.as_str())
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("room member", "room_id:user_id"))?
        .try_into()
    }
}

#[async_trait]
impl BanStore for PgDatabase {
    async fn bans(&self, room_id: RoomId) -> Result<Vec<BanData>> {
        query_as::<_, BanRow>("SELECT * FROM room_bans WHERE room_id = $1 ORDER BY id")
            .bind(room_id)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Into::into).collect())
            .map_err(|e| e.any())
    }

    async fn ban(&self, room_id: RoomId, user_id: UserId) -> Result<BanData> {
        query_as::<_, BanRow>("SELECT * FROM room_bans WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("room ban", "room_id:user_id"))
    }

    async fn add_ban(&self, new_ban: NewBan) -> Result<BanData> {
        let value = format!("{}:{}", new_ban.user_id, new_ban.room_id);
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(new_ban.room_id)
            .bind(new_ban.user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let ban: BanData = query_as::<_, BanRow>(
            "
            INSERT INTO room_bans (room_id, user_id, banned_by, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(new_ban.room_id)
        .bind(new_ban.user_id)
        .bind(new_ban.banned_by)
        .bind(&new_ban.reason)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.conflict_or_any("room ban", "user:room", &value))?
        .into();

        tx.commit().await.map_err(|e| e.any())?;
        Ok(ban)
    }

    async fn remove_ban(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        let affected = query("DELETE FROM room_bans WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?
            .rows_affected();

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room ban",
                identifier: "room_id:user_id",
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ChatStore for PgDatabase {
    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        query_as::<_, MessageRow>(
            "INSERT INTO messages (room_id, user_id, content) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(new_message.room_id)
        .bind(new_message.user_id)
        .bind(&new_message.content)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn recent_messages(&self, room_id: RoomId, limit: u32) -> Result<Vec<MessageData>> {
        query_as::<_, MessageRow>(
            "
            SELECT * FROM (
                SELECT * FROM messages
                WHERE room_id = $1
                ORDER BY sent_at DESC, id DESC
                LIMIT $2
            ) AS latest
            ORDER BY sent_at, id",
        )
        .bind(room_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Into::into).collect())
        .map_err(|e| e.any())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn commit_playback(&self, room_id: RoomId, transition: &Transition) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        // Hold the room row for the rest of the transaction
        query_scalar::<_, PrimaryKey>("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(room_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| e.not_found_or("room", "id"))?;

        if let Some(entry_id) = transition.removes {
            query("DELETE FROM queue_entries WHERE id = $1 AND room_id = $2")
                .bind(entry_id)
                .bind(room_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        write_playback(&mut *tx, room_id, &transition.playback).await?;

        tx.commit().await.map_err(|e| e.any())
    }
}

trait ConflictOrAny {
    /// Maps unique constraint violations to a conflict error
    fn conflict_or_any(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
}

impl ConflictOrAny for SqlxError {
    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        match &self {
            SqlxError::Database(e) if e.is_unique_violation() => DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            _ => self.any(),
        }
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        match self {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                DatabaseError::Unavailable
            }
            e => DatabaseError::Internal(Box::new(e)),
        }
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
