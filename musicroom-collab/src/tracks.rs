use log::info;
use musicroom_core::TrackId;

use crate::{CollabContext, DatabaseError, NewTrack, TrackData};

/// The catalog of tracks rooms can queue
pub struct TrackService {
    context: CollabContext,
}

impl TrackService {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Registers a track from the external catalog, refreshing its metadata if it is already known
    pub async fn register_track(&self, new_track: NewTrack) -> Result<TrackData, DatabaseError> {
        let track = self.context.database.upsert_track(new_track).await?;
        info!("Registered track {} ({})", track.id, track.external_id);

        Ok(track)
    }

    pub async fn track_by_id(&self, track_id: TrackId) -> Result<TrackData, DatabaseError> {
        self.context.database.track_by_id(track_id).await
    }

    pub async fn list_tracks(&self) -> Result<Vec<TrackData>, DatabaseError> {
        self.context.database.list_tracks().await
    }
}
