//! The room playback state machine.
//!
//! Every operation is a pure function from the room's current [Playback] and
//! [OrderedQueue] to a [Transition]. Applying the transition to storage is left to
//! the caller, which must do so atomically and must serialize calls per room.

use thiserror::Error;

use crate::{EntryId, OrderedQueue, QueueEntry, TrackId};

/// The observable state of a room's player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No current track
    Empty,
    Playing,
    Paused,
}

/// The queue entry currently loaded in a room's player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentTrack {
    pub entry_id: EntryId,
    pub track_id: TrackId,
}

/// The playback fields stored on a room
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Playback {
    pub current: Option<CurrentTrack>,
    pub is_playing: bool,
    /// Position within the current track, in milliseconds.
    pub position_ms: Option<u32>,
}

/// What became of the player after the current entry was consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The next entry in the queue is now playing
    Next { current: CurrentTrack },
    /// There was nothing left to play
    QueueEmpty,
}

/// The outcome of a state machine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The playback fields the room should have afterwards
    pub playback: Playback,
    /// A queue entry that must be removed from the queue
    pub removes: Option<EntryId>,
    /// Set when the operation moved past the current entry
    pub advance: Option<Advance>,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("The queue is empty")]
    EmptyQueue,
    #[error("No track is currently active")]
    NoActiveTrack,
    #[error("The queue entry does not exist in this room")]
    EntryNotFound,
    #[error("Position {position_ms}ms is beyond the track length of {duration_ms}ms")]
    PositionOutOfRange { position_ms: u32, duration_ms: u32 },
}

pub type Result<T> = std::result::Result<T, PlaybackError>;

impl Playback {
    pub const EMPTY: Self = Self {
        current: None,
        is_playing: false,
        position_ms: None,
    };

    pub fn state(&self) -> PlaybackState {
        match (self.current, self.is_playing) {
            (None, _) => PlaybackState::Empty,
            (Some(_), true) => PlaybackState::Playing,
            (Some(_), false) => PlaybackState::Paused,
        }
    }

    pub fn current_track_id(&self) -> Option<TrackId> {
        self.current.map(|c| c.track_id)
    }

    pub fn current_entry_id(&self) -> Option<EntryId> {
        self.current.map(|c| c.entry_id)
    }

    fn playing_from_start(entry: &QueueEntry) -> Self {
        Self {
            current: Some(entry.into()),
            is_playing: true,
            position_ms: Some(0),
        }
    }
}

impl From<&QueueEntry> for CurrentTrack {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            entry_id: entry.id,
            track_id: entry.track_id,
        }
    }
}

impl Transition {
    fn to(playback: Playback) -> Self {
        Self {
            playback,
            removes: None,
            advance: None,
        }
    }

    /// Returns true if applying this transition would not change anything.
    pub fn is_noop(&self, before: &Playback) -> bool {
        self.removes.is_none() && self.playback == *before
    }
}

/// Starts or resumes playback.
///
/// A paused current track is resumed where it was. Without a current track, the
/// head of the queue becomes current and plays from the start.
pub fn start(playback: &Playback, queue: &OrderedQueue) -> Result<Transition> {
    let head = queue.head().ok_or(PlaybackError::EmptyQueue)?;

    let resumable = playback
        .current
        .filter(|current| queue.contains(current.entry_id));

    let next = match resumable {
        Some(current) => Playback {
            current: Some(current),
            is_playing: true,
            position_ms: playback.position_ms.or(Some(0)),
        },
        None => Playback::playing_from_start(head),
    };

    Ok(Transition::to(next))
}

/// Pauses the current track, optionally recording the position the client reported.
pub fn pause(playback: &Playback, position_ms: Option<u32>) -> Result<Transition> {
    let current = playback.current.ok_or(PlaybackError::NoActiveTrack)?;

    Ok(Transition::to(Playback {
        current: Some(current),
        is_playing: false,
        position_ms: position_ms.or(playback.position_ms),
    }))
}

/// Consumes the current entry and moves on to the next one, if any.
pub fn skip(playback: &Playback, queue: &OrderedQueue) -> Result<Transition> {
    let current = playback.current.ok_or(PlaybackError::NoActiveTrack)?;

    Ok(advance_past(current.entry_id, queue))
}

/// Removes a specific entry. Removing the current entry behaves like [skip].
pub fn dequeue(playback: &Playback, queue: &OrderedQueue, entry_id: EntryId) -> Result<Transition> {
    if !queue.contains(entry_id) {
        return Err(PlaybackError::EntryNotFound);
    }

    if playback.current_entry_id() == Some(entry_id) {
        return Ok(advance_past(entry_id, queue));
    }

    Ok(Transition {
        playback: *playback,
        removes: Some(entry_id),
        advance: None,
    })
}

/// Moves the play position of the current track.
pub fn seek(playback: &Playback, position_ms: u32, duration_ms: u32) -> Result<Transition> {
    if playback.current.is_none() {
        return Err(PlaybackError::NoActiveTrack);
    }

    if position_ms > duration_ms {
        return Err(PlaybackError::PositionOutOfRange {
            position_ms,
            duration_ms,
        });
    }

    Ok(Transition::to(Playback {
        position_ms: Some(position_ms),
        ..*playback
    }))
}

fn advance_past(entry_id: EntryId, queue: &OrderedQueue) -> Transition {
    match queue.head_without(entry_id) {
        Some(next) => {
            let playback = Playback::playing_from_start(next);

            Transition {
                playback,
                removes: Some(entry_id),
                advance: Some(Advance::Next {
                    current: next.into(),
                }),
            }
        }
        None => Transition {
            playback: Playback::EMPTY,
            removes: Some(entry_id),
            advance: Some(Advance::QueueEmpty),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{next_order, QueueEntry};

    /// A tiny in-memory room to drive the state machine like a store would
    #[derive(Default)]
    struct Room {
        playback: Playback,
        entries: Vec<QueueEntry>,
        next_id: EntryId,
    }

    impl Room {
        fn queue(&self) -> OrderedQueue {
            OrderedQueue::new(self.entries.clone())
        }

        fn enqueue(&mut self, track_id: TrackId) -> EntryId {
            self.next_id += 1;
            let order = next_order(self.queue().max_order());

            self.entries.push(QueueEntry {
                id: self.next_id,
                track_id,
                order,
            });

            self.next_id
        }

        fn apply(&mut self, transition: Result<Transition>) -> Result<Transition> {
            let transition = transition?;

            if let Some(id) = transition.removes {
                self.entries.retain(|e| e.id != id);
            }

            self.playback = transition.playback;
            Ok(transition)
        }

        fn start(&mut self) -> Result<Transition> {
            let t = start(&self.playback, &self.queue());
            self.apply(t)
        }

        fn skip(&mut self) -> Result<Transition> {
            let t = skip(&self.playback, &self.queue());
            self.apply(t)
        }

        fn dequeue(&mut self, entry_id: EntryId) -> Result<Transition> {
            let t = dequeue(&self.playback, &self.queue(), entry_id);
            self.apply(t)
        }
    }

    #[test]
    fn start_on_empty_queue_fails_and_changes_nothing() {
        let mut room = Room::default();

        assert_eq!(room.start(), Err(PlaybackError::EmptyQueue));
        assert_eq!(room.playback, Playback::EMPTY);
        assert_eq!(room.playback.state(), PlaybackState::Empty);
    }

    #[test]
    fn start_plays_the_head() {
        let mut room = Room::default();
        let first = room.enqueue(100);
        room.enqueue(200);

        room.start().unwrap();

        assert_eq!(room.playback.state(), PlaybackState::Playing);
        assert_eq!(room.playback.current_entry_id(), Some(first));
        assert_eq!(room.playback.current_track_id(), Some(100));
        assert_eq!(room.playback.position_ms, Some(0));
        // The current entry stays queued until it is advanced past
        assert_eq!(room.entries.len(), 2);
    }

    #[test]
    fn start_while_playing_is_a_noop() {
        let mut room = Room::default();
        room.enqueue(100);
        room.start().unwrap();

        let before = room.playback;
        let transition = start(&room.playback, &room.queue()).unwrap();

        assert!(transition.is_noop(&before));
    }

    #[test]
    fn start_resumes_a_paused_track_at_its_position() {
        let mut room = Room::default();
        room.enqueue(100);
        room.start().unwrap();

        let t = pause(&room.playback, Some(42_000));
        room.apply(t).unwrap();
        assert_eq!(room.playback.state(), PlaybackState::Paused);

        room.start().unwrap();
        assert_eq!(room.playback.state(), PlaybackState::Playing);
        assert_eq!(room.playback.position_ms, Some(42_000));
    }

    #[test]
    fn pause_without_current_track_fails() {
        assert_eq!(
            pause(&Playback::EMPTY, None),
            Err(PlaybackError::NoActiveTrack)
        );
    }

    #[test]
    fn pause_keeps_current_track() {
        let mut room = Room::default();
        let entry = room.enqueue(100);
        room.start().unwrap();

        let t = pause(&room.playback, None);
        room.apply(t).unwrap();

        assert_eq!(room.playback.current_entry_id(), Some(entry));
        assert!(!room.playback.is_playing);
    }

    #[test]
    fn skip_without_current_track_fails() {
        let mut room = Room::default();
        room.enqueue(100);

        assert_eq!(room.skip(), Err(PlaybackError::NoActiveTrack));
        assert_eq!(room.entries.len(), 1);
    }

    #[test]
    fn skipping_every_entry_ends_empty() {
        let mut room = Room::default();
        for track in 1..=5 {
            room.enqueue(track);
        }

        room.start().unwrap();

        for n in 1..=5 {
            let transition = room.skip().unwrap();

            if n < 5 {
                assert!(matches!(transition.advance, Some(Advance::Next { .. })));
                assert_eq!(room.playback.state(), PlaybackState::Playing);
            } else {
                assert_eq!(transition.advance, Some(Advance::QueueEmpty));
            }
        }

        assert_eq!(room.playback.state(), PlaybackState::Empty);
        assert_eq!(room.playback.current_track_id(), None);
        assert!(!room.playback.is_playing);
        assert!(room.entries.is_empty());
    }

    #[test]
    fn skip_from_paused_plays_the_next_entry() {
        let mut room = Room::default();
        room.enqueue(1);
        room.enqueue(2);
        room.start().unwrap();

        let t = pause(&room.playback, Some(1000));
        room.apply(t).unwrap();
        room.skip().unwrap();

        assert_eq!(room.playback.state(), PlaybackState::Playing);
        assert_eq!(room.playback.current_track_id(), Some(2));
        assert_eq!(room.playback.position_ms, Some(0));
    }

    #[test]
    fn dequeue_of_current_entry_matches_skip() {
        let mut skipped = Room::default();
        let mut dequeued = Room::default();

        for room in [&mut skipped, &mut dequeued] {
            room.enqueue(1);
            room.enqueue(2);
            room.enqueue(3);
            room.start().unwrap();
        }

        let current = dequeued.playback.current_entry_id().unwrap();
        let a = skipped.skip().unwrap();
        let b = dequeued.dequeue(current).unwrap();

        assert_eq!(a, b);
        assert_eq!(skipped.playback, dequeued.playback);
        assert_eq!(skipped.entries, dequeued.entries);
    }

    #[test]
    fn dequeue_of_other_entry_keeps_playback() {
        let mut room = Room::default();
        room.enqueue(1);
        let second = room.enqueue(2);
        room.start().unwrap();

        let before = room.playback;
        let transition = room.dequeue(second).unwrap();

        assert_eq!(transition.removes, Some(second));
        assert_eq!(transition.advance, None);
        assert_eq!(room.playback, before);
    }

    #[test]
    fn dequeue_unknown_entry_fails() {
        let mut room = Room::default();
        room.enqueue(1);

        assert_eq!(room.dequeue(999), Err(PlaybackError::EntryNotFound));
        assert_eq!(room.entries.len(), 1);
    }

    #[test]
    fn seek_is_bounded_by_track_length() {
        let mut room = Room::default();
        room.enqueue(1);
        room.start().unwrap();

        assert_eq!(
            seek(&room.playback, 5_000, 4_000),
            Err(PlaybackError::PositionOutOfRange {
                position_ms: 5_000,
                duration_ms: 4_000
            })
        );

        let t = seek(&room.playback, 3_000, 4_000).unwrap();
        assert_eq!(t.playback.position_ms, Some(3_000));
        assert_eq!(seek(&Playback::EMPTY, 0, 0), Err(PlaybackError::NoActiveTrack));
    }

    #[test]
    fn enqueue_then_skip_scenario() {
        let mut room = Room::default();

        room.enqueue(0xA);
        room.start().unwrap();
        assert_eq!(room.playback.current_track_id(), Some(0xA));
        assert_eq!(room.playback.state(), PlaybackState::Playing);

        let b = room.enqueue(0xB);
        room.skip().unwrap();
        assert_eq!(room.playback.current_track_id(), Some(0xB));
        assert_eq!(room.playback.state(), PlaybackState::Playing);
        assert_eq!(room.entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![b]);

        room.skip().unwrap();
        assert_eq!(room.playback.current_track_id(), None);
        assert_eq!(room.playback.state(), PlaybackState::Empty);
    }
}
