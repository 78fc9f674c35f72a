use log::info;
use musicroom_core::{next_order, playback, EntryId, RoomId, TrackId, UserId};

use crate::{CollabEvent, NewQueueEntry, QueuedTrackData};

use super::{DatabaseFailure, PlaybackStatus, Result, RoomService};

impl RoomService {
    /// The queue of a room by ascending order, joined with track metadata
    pub async fn queue(&self, user_id: UserId, room_id: RoomId) -> Result<Vec<QueuedTrackData>> {
        self.require_member("queue", room_id, user_id).await?;

        self.db()
            .list_with_tracks(room_id)
            .await
            .context("queue", room_id)
    }

    /// Appends a track to the end of the queue. Playback is left untouched.
    pub async fn enqueue(
        &self,
        actor: UserId,
        room_id: RoomId,
        track_id: TrackId,
    ) -> Result<QueuedTrackData> {
        let _guard = self.context.locks.lock(room_id).await;
        self.require_controller("enqueue", room_id, actor).await?;

        let track = self
            .db()
            .track_by_id(track_id)
            .await
            .context("enqueue", room_id)?;

        let max_order = self
            .db()
            .max_order(room_id)
            .await
            .context("enqueue", room_id)?;

        let entry = self
            .db()
            .insert(NewQueueEntry {
                room_id,
                track_id,
                order_in_queue: next_order(max_order),
                added_by: actor,
            })
            .await
            .context("enqueue", room_id)?;

        info!(
            "Queued track {} as entry {} in room {}",
            track_id, entry.id, room_id
        );
        self.emit_queue("enqueue", room_id).await;

        Ok(QueuedTrackData { entry, track })
    }

    /// Removes an entry from the queue. Removing the current entry advances like a skip.
    pub async fn dequeue(
        &self,
        actor: UserId,
        room_id: RoomId,
        entry_id: EntryId,
    ) -> Result<PlaybackStatus> {
        self.transition("dequeue", actor, room_id, |current, queue| {
            playback::dequeue(current, queue, entry_id)
        })
        .await
    }

    /// Broadcasts the queue as it is now. Failing to read it only costs the event.
    pub(super) async fn emit_queue(&self, operation: &'static str, room_id: RoomId) {
        if let Ok(entries) = self
            .db()
            .list_with_tracks(room_id)
            .await
            .context(operation, room_id)
        {
            self.context
                .emit(CollabEvent::QueueUpdated { room_id, entries });
        }
    }
}
