use log::info;
use musicroom_core::{
    playback, Advance, OrderedQueue, Playback, PlaybackError, PlaybackState, RoomId, Transition,
    UserId,
};

use crate::{CollabEvent, TrackData};

use super::{DatabaseFailure, Result, RoomService};

/// A room's player as reported back to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub room_id: RoomId,
    pub state: PlaybackState,
    pub playback: Playback,
    /// Metadata of the current track, if any
    pub track: Option<TrackData>,
    /// Set when the operation moved past the current entry
    pub advance: Option<Advance>,
}

impl RoomService {
    pub async fn playback_state(&self, user_id: UserId, room_id: RoomId) -> Result<PlaybackStatus> {
        self.require_member("playback_state", room_id, user_id)
            .await?;

        let room = self.room_by_id(room_id).await?;
        self.status("playback_state", room_id, room.playback, None)
            .await
    }

    /// Starts playing the head of the queue, or resumes the paused current track.
    pub async fn start(&self, actor: UserId, room_id: RoomId) -> Result<PlaybackStatus> {
        self.transition("start", actor, room_id, playback::start)
            .await
    }

    /// Pauses the current track, recording the position the client reached if given.
    pub async fn pause(
        &self,
        actor: UserId,
        room_id: RoomId,
        position_ms: Option<u32>,
    ) -> Result<PlaybackStatus> {
        self.transition("pause", actor, room_id, |current, _| {
            playback::pause(current, position_ms)
        })
        .await
    }

    /// Consumes the current entry and plays the next one, if there is any.
    pub async fn skip(&self, actor: UserId, room_id: RoomId) -> Result<PlaybackStatus> {
        self.transition("skip", actor, room_id, playback::skip)
            .await
    }

    pub async fn seek(
        &self,
        actor: UserId,
        room_id: RoomId,
        position_ms: u32,
    ) -> Result<PlaybackStatus> {
        let _guard = self.context.locks.lock(room_id).await;
        self.require_controller("seek", room_id, actor).await?;

        let room = self.room_by_id(room_id).await?;
        let track_id = room
            .playback
            .current_track_id()
            .ok_or(PlaybackError::NoActiveTrack)?;

        let track = self
            .db()
            .track_by_id(track_id)
            .await
            .context("seek", room_id)?;

        let transition = playback::seek(&room.playback, position_ms, track.duration_ms)?;
        self.commit("seek", room_id, &room.playback, transition)
            .await
    }

    /// Runs a state machine operation against the room's current playback and queue,
    /// holding the room lock until the outcome is stored.
    pub(super) async fn transition<F>(
        &self,
        operation: &'static str,
        actor: UserId,
        room_id: RoomId,
        operate: F,
    ) -> Result<PlaybackStatus>
    where
        F: FnOnce(&Playback, &OrderedQueue) -> std::result::Result<Transition, PlaybackError>,
    {
        let _guard = self.context.locks.lock(room_id).await;
        self.require_controller(operation, room_id, actor).await?;

        let room = self.room_by_id(room_id).await?;
        let queue: OrderedQueue = self
            .db()
            .list_ordered(room_id)
            .await
            .context(operation, room_id)?
            .iter()
            .map(|e| e.entry())
            .collect();

        let transition = operate(&room.playback, &queue)?;
        self.commit(operation, room_id, &room.playback, transition)
            .await
    }

    async fn commit(
        &self,
        operation: &'static str,
        room_id: RoomId,
        before: &Playback,
        transition: Transition,
    ) -> Result<PlaybackStatus> {
        // Resolved before writing so a failed lookup cannot follow a stored transition
        let status = self
            .status(operation, room_id, transition.playback, transition.advance)
            .await?;

        if !transition.is_noop(before) {
            self.db()
                .commit_playback(room_id, &transition)
                .await
                .context(operation, room_id)?;

            info!(
                "Applied {} to room {}, playback is now {:?}",
                operation,
                room_id,
                transition.playback.state()
            );
        }

        if transition.removes.is_some() {
            self.emit_queue(operation, room_id).await;
        }

        if transition.playback != *before {
            self.context.emit(CollabEvent::PlaybackUpdated {
                room_id,
                status: status.clone(),
            });
        }

        Ok(status)
    }

    async fn status(
        &self,
        operation: &'static str,
        room_id: RoomId,
        playback: Playback,
        advance: Option<Advance>,
    ) -> Result<PlaybackStatus> {
        let track = match playback.current_track_id() {
            Some(track_id) => Some(
                self.db()
                    .track_by_id(track_id)
                    .await
                    .context(operation, room_id)?,
            ),
            None => None,
        };

        Ok(PlaybackStatus {
            room_id,
            state: playback.state(),
            playback,
            track,
            advance,
        })
    }
}

#[cfg(test)]
mod tests {
    use musicroom_core::{Advance, PlaybackError, PlaybackState, TrackId};

    use crate::{rooms::testing::*, CollabEvent, DatabaseError, RoomError};

    async fn queue_tracks(fixture: &Fixture, titles: &[&str]) -> Vec<TrackId> {
        let mut tracks = vec![];

        for title in titles {
            let track = fixture.track(title).await;
            fixture
                .collab
                .rooms
                .enqueue(OWNER, fixture.room_id, track)
                .await
                .unwrap();

            tracks.push(track);
        }

        tracks
    }

    #[tokio::test]
    async fn start_on_an_empty_queue_changes_nothing() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;

        assert!(matches!(
            rooms.start(OWNER, fixture.room_id).await,
            Err(RoomError::Playback(PlaybackError::EmptyQueue))
        ));

        let status = rooms.playback_state(OWNER, fixture.room_id).await.unwrap();
        assert_eq!(status.state, PlaybackState::Empty);
        assert!(fixture.drain_events().is_empty());
    }

    #[tokio::test]
    async fn start_on_a_missing_room_is_not_found() {
        let fixture = Fixture::new().await;

        assert!(matches!(
            fixture.collab.rooms.start(OWNER, 9999).await,
            Err(RoomError::RoomNotFound)
        ));
    }

    #[tokio::test]
    async fn pause_without_a_current_track_fails() {
        let fixture = Fixture::new().await;
        queue_tracks(&fixture, &["a"]).await;

        assert!(matches!(
            fixture.collab.rooms.pause(OWNER, fixture.room_id, None).await,
            Err(RoomError::Playback(PlaybackError::NoActiveTrack))
        ));
    }

    #[tokio::test]
    async fn pause_and_resume_keep_the_position() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let tracks = queue_tracks(&fixture, &["a", "b"]).await;

        rooms.start(OWNER, fixture.room_id).await.unwrap();

        let paused = rooms
            .pause(MODERATOR, fixture.room_id, Some(30_000))
            .await
            .unwrap();
        assert_eq!(paused.state, PlaybackState::Paused);
        assert_eq!(paused.playback.position_ms, Some(30_000));

        let resumed = rooms.start(OWNER, fixture.room_id).await.unwrap();
        assert_eq!(resumed.state, PlaybackState::Playing);
        assert_eq!(resumed.playback.current_track_id(), Some(tracks[0]));
        assert_eq!(resumed.playback.position_ms, Some(30_000));
    }

    #[tokio::test]
    async fn skipping_the_whole_queue_ends_empty() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let tracks = queue_tracks(&fixture, &["a", "b", "c", "d"]).await;

        rooms.start(OWNER, fixture.room_id).await.unwrap();

        for _ in 0..tracks.len() {
            rooms.skip(OWNER, fixture.room_id).await.unwrap();
        }

        let status = rooms.playback_state(OWNER, fixture.room_id).await.unwrap();
        assert_eq!(status.state, PlaybackState::Empty);
        assert_eq!(status.playback.current_track_id(), None);
        assert!(status.track.is_none());
        assert!(rooms.queue(OWNER, fixture.room_id).await.unwrap().is_empty());

        assert!(matches!(
            rooms.skip(OWNER, fixture.room_id).await,
            Err(RoomError::Playback(PlaybackError::NoActiveTrack))
        ));
    }

    #[tokio::test]
    async fn dequeue_of_the_current_entry_matches_skip() {
        let skipped = Fixture::new().await;
        let dequeued = Fixture::new().await;

        for fixture in [&skipped, &dequeued] {
            queue_tracks(fixture, &["a", "b", "c"]).await;
            fixture.collab.rooms.start(OWNER, fixture.room_id).await.unwrap();
        }

        let a = skipped
            .collab
            .rooms
            .skip(OWNER, skipped.room_id)
            .await
            .unwrap();

        let current = dequeued
            .collab
            .rooms
            .playback_state(OWNER, dequeued.room_id)
            .await
            .unwrap()
            .playback
            .current_entry_id()
            .unwrap();

        let b = dequeued
            .collab
            .rooms
            .dequeue(OWNER, dequeued.room_id, current)
            .await
            .unwrap();

        assert_eq!(a, b);

        let mut queues = vec![];
        for fixture in [&skipped, &dequeued] {
            let queue = fixture.collab.rooms.queue(OWNER, fixture.room_id).await;
            let entries: Vec<_> = queue.unwrap().iter().map(|q| q.entry.entry()).collect();
            queues.push(entries);
        }

        assert_eq!(queues[0], queues[1]);
    }

    #[tokio::test]
    async fn enqueue_start_skip_scenario() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let room_id = fixture.room_id;

        let track_a = fixture.track("a").await;
        let track_b = fixture.track("b").await;

        rooms.enqueue(OWNER, room_id, track_a).await.unwrap();
        let started = rooms.start(OWNER, room_id).await.unwrap();
        assert_eq!(started.playback.current_track_id(), Some(track_a));
        assert_eq!(started.state, PlaybackState::Playing);

        let entry_b = rooms.enqueue(OWNER, room_id, track_b).await.unwrap();
        let skipped = rooms.skip(OWNER, room_id).await.unwrap();
        assert_eq!(skipped.playback.current_track_id(), Some(track_b));
        assert_eq!(skipped.state, PlaybackState::Playing);
        assert!(matches!(skipped.advance, Some(Advance::Next { .. })));

        let queue = rooms.queue(OWNER, room_id).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].entry.id, entry_b.entry.id);

        let emptied = rooms.skip(OWNER, room_id).await.unwrap();
        assert_eq!(emptied.playback.current_track_id(), None);
        assert_eq!(emptied.state, PlaybackState::Empty);
        assert_eq!(emptied.advance, Some(Advance::QueueEmpty));
    }

    #[tokio::test]
    async fn seek_is_bounded_by_the_track() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        queue_tracks(&fixture, &["a"]).await;

        assert!(matches!(
            rooms.seek(OWNER, fixture.room_id, 1_000).await,
            Err(RoomError::Playback(PlaybackError::NoActiveTrack))
        ));

        rooms.start(OWNER, fixture.room_id).await.unwrap();

        assert!(matches!(
            rooms.seek(OWNER, fixture.room_id, 180_001).await,
            Err(RoomError::Playback(PlaybackError::PositionOutOfRange { .. }))
        ));

        let status = rooms.seek(OWNER, fixture.room_id, 90_000).await.unwrap();
        assert_eq!(status.playback.position_ms, Some(90_000));
        assert_eq!(status.state, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn events_follow_successful_transitions_only() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        queue_tracks(&fixture, &["a"]).await;
        fixture.drain_events();

        rooms.start(OWNER, fixture.room_id).await.unwrap();
        assert!(matches!(
            fixture.drain_events().as_slice(),
            [CollabEvent::PlaybackUpdated { status, .. }] if status.state == PlaybackState::Playing
        ));

        // Starting again while playing changes nothing
        rooms.start(OWNER, fixture.room_id).await.unwrap();
        assert!(fixture.drain_events().is_empty());

        rooms.skip(OWNER, fixture.room_id).await.unwrap();
        let events = fixture.drain_events();
        assert!(matches!(
            events.as_slice(),
            [CollabEvent::QueueUpdated { entries, .. }, CollabEvent::PlaybackUpdated { .. }]
                if entries.is_empty()
        ));

        assert!(rooms.skip(OWNER, fixture.room_id).await.is_err());
        assert!(fixture.drain_events().is_empty());
    }

    #[tokio::test]
    async fn listeners_cannot_control_playback() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        queue_tracks(&fixture, &["a"]).await;

        assert!(matches!(
            rooms.start(LISTENER, fixture.room_id).await,
            Err(RoomError::PermissionDenied(_))
        ));
        assert!(matches!(
            rooms.start(STRANGER, fixture.room_id).await,
            Err(RoomError::NotAMember)
        ));

        let status = rooms.playback_state(LISTENER, fixture.room_id).await.unwrap();
        assert_eq!(status.state, PlaybackState::Empty);
    }

    #[tokio::test]
    async fn store_outages_leave_the_room_untouched() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        queue_tracks(&fixture, &["a"]).await;

        fixture.database.set_available(false);
        assert!(matches!(
            rooms.start(OWNER, fixture.room_id).await,
            Err(RoomError::Database(DatabaseError::Unavailable))
        ));

        fixture.database.set_available(true);
        let status = rooms.playback_state(OWNER, fixture.room_id).await.unwrap();
        assert_eq!(status.state, PlaybackState::Empty);
    }

    #[tokio::test]
    async fn unknown_tracks_abort_before_storing() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let tracks = queue_tracks(&fixture, &["a"]).await;
        fixture.drain_events();

        fixture.database.forget_track(tracks[0]);
        assert!(matches!(
            rooms.start(OWNER, fixture.room_id).await,
            Err(RoomError::TrackNotFound)
        ));

        let room = rooms.room_by_id(fixture.room_id).await.unwrap();
        assert_eq!(room.playback, musicroom_core::Playback::EMPTY);
        assert!(fixture.drain_events().is_empty());
    }
}
