use axum::{
    extract::{Path, State},
    routing::get,
    Json,
};
use musicroom_collab::NewTrack;

use crate::{
    actor::Actor,
    context::ServerContext,
    errors::{ErrorBody, ServerResult},
    schemas::{NewTrackSchema, ValidatedJson},
    serialized::{ToSerialized, Track},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/tracks",
    tag = "tracks",
    responses(
        (status = 200, body = Vec<Track>)
    )
)]
async fn list_tracks(
    _actor: Actor,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Track>>> {
    let tracks = context.collab.tracks.list_tracks().await?;

    Ok(Json(tracks.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/tracks",
    tag = "tracks",
    request_body = NewTrackSchema,
    responses(
        (status = 200, body = Track, description = "Track was registered, or its metadata refreshed if the external id is known")
    )
)]
async fn register_track(
    _actor: Actor,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewTrackSchema>,
) -> ServerResult<Json<Track>> {
    let track = context
        .collab
        .tracks
        .register_track(NewTrack {
            external_id: body.external_id,
            title: body.title,
            artist: body.artist,
            album: body.album,
            artwork_url: body.artwork_url,
            duration_ms: body.duration_ms,
        })
        .await?;

    Ok(Json(track.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/tracks/{id}",
    tag = "tracks",
    responses(
        (status = 200, body = Track),
        (status = 404, body = ErrorBody)
    )
)]
async fn track(
    _actor: Actor,
    State(context): State<ServerContext>,
    Path(track_id): Path<i32>,
) -> ServerResult<Json<Track>> {
    let track = context.collab.tracks.track_by_id(track_id).await?;

    Ok(Json(track.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tracks).post(register_track))
        .route("/:id", get(track))
}
