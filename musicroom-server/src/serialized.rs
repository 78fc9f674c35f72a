//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use chrono::{DateTime, Utc};
use musicroom_collab::{
    BanData, MessageData, PlaybackStatus as CollabPlaybackStatus, QueuedTrackData, RoomData,
    RoomMemberData, TrackData,
};
use musicroom_core::{Advance, PlaybackState};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: i32,
    name: String,
    owner_id: i32,
    max_members: i32,
    is_private: bool,
    is_playing: bool,
    current_track_id: Option<i32>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    id: i32,
    user_id: i32,
    /// One of `owner`, `moderator` or `member`
    role: String,
    joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ban {
    user_id: i32,
    banned_by: i32,
    reason: Option<String>,
    banned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    id: i32,
    external_id: String,
    title: String,
    artist: String,
    album: Option<String>,
    artwork_url: Option<String>,
    duration_ms: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTrack {
    entry_id: i32,
    order: i32,
    added_by: i32,
    added_at: DateTime<Utc>,
    track: Track,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Playback {
    room_id: i32,
    /// One of `empty`, `playing` or `paused`
    state: String,
    is_playing: bool,
    entry_id: Option<i32>,
    track: Option<Track>,
    position_ms: Option<u32>,
    /// Set when the current entry was consumed: `next` if another entry is now current,
    /// `queue-empty` if there was nothing left to play
    advance: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: i32,
    room_id: i32,
    user_id: i32,
    content: String,
    sent_at: DateTime<Utc>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            name: self.name.clone(),
            owner_id: self.owner_id,
            max_members: self.max_members,
            is_private: self.is_private,
            is_playing: self.playback.is_playing,
            current_track_id: self.playback.current_track_id(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<RoomMember> for RoomMemberData {
    fn to_serialized(&self) -> RoomMember {
        RoomMember {
            id: self.id,
            user_id: self.user_id,
            role: self.role.to_string(),
            joined_at: self.joined_at,
        }
    }
}

impl ToSerialized<Ban> for BanData {
    fn to_serialized(&self) -> Ban {
        Ban {
            user_id: self.user_id,
            banned_by: self.banned_by,
            reason: self.reason.clone(),
            banned_at: self.banned_at,
        }
    }
}

impl ToSerialized<Track> for TrackData {
    fn to_serialized(&self) -> Track {
        Track {
            id: self.id,
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            artwork_url: self.artwork_url.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

impl ToSerialized<QueuedTrack> for QueuedTrackData {
    fn to_serialized(&self) -> QueuedTrack {
        QueuedTrack {
            entry_id: self.entry.id,
            order: self.entry.order_in_queue,
            added_by: self.entry.added_by,
            added_at: self.entry.added_at,
            track: self.track.to_serialized(),
        }
    }
}

impl ToSerialized<Playback> for CollabPlaybackStatus {
    fn to_serialized(&self) -> Playback {
        let state = match self.state {
            PlaybackState::Empty => "empty",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };

        let advance = self.advance.map(|advance| match advance {
            Advance::Next { .. } => "next".to_string(),
            Advance::QueueEmpty => "queue-empty".to_string(),
        });

        Playback {
            room_id: self.room_id,
            state: state.to_string(),
            is_playing: self.playback.is_playing,
            entry_id: self.playback.current_entry_id(),
            track: self.track.as_ref().map(|t| t.to_serialized()),
            position_ms: self.playback.position_ms,
            advance,
        }
    }
}

impl ToSerialized<Message> for MessageData {
    fn to_serialized(&self) -> Message {
        Message {
            id: self.id,
            room_id: self.room_id,
            user_id: self.user_id,
            content: self.content.clone(),
            sent_at: self.sent_at,
        }
    }
}
