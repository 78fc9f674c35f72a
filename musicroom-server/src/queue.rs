use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};

use crate::{
    actor::Actor,
    context::ServerContext,
    errors::{ErrorBody, ServerResult},
    schemas::{EnqueueSchema, RoomActionSchema, ValidatedJson},
    serialized::{Playback, QueuedTrack, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/queue",
    tag = "queue",
    responses(
        (status = 200, body = Vec<QueuedTrack>, description = "Queued tracks in playing order"),
        (status = 403, body = ErrorBody, description = "User is not a member of the room")
    )
)]
async fn queue(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Vec<QueuedTrack>>> {
    let queue = context.collab.rooms.queue(user_id, room_id).await?;

    Ok(Json(queue.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/queue",
    tag = "queue",
    request_body = EnqueueSchema,
    responses(
        (status = 200, body = QueuedTrack, description = "Track was added to the end of the queue"),
        (status = 404, body = ErrorBody, description = "The room or track does not exist")
    )
)]
async fn enqueue(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<EnqueueSchema>,
) -> ServerResult<Json<QueuedTrack>> {
    let queued = context
        .collab
        .rooms
        .enqueue(user_id, room_id, body.track_id)
        .await?;

    Ok(Json(queued.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/queue/{entry_id}",
    tag = "queue",
    responses(
        (status = 200, body = Playback, description = "Entry was removed. Removing the current entry advances the queue"),
        (status = 404, body = ErrorBody, description = "The entry is not in this room's queue")
    )
)]
async fn dequeue(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path((room_id, entry_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Playback>> {
    let status = context
        .collab
        .rooms
        .dequeue(user_id, room_id, entry_id)
        .await?;

    Ok(Json(status.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/playback",
    tag = "queue",
    responses(
        (status = 200, body = Playback)
    )
)]
async fn playback(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Playback>> {
    let status = context
        .collab
        .rooms
        .playback_state(user_id, room_id)
        .await?;

    Ok(Json(status.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/actions",
    tag = "queue",
    request_body = RoomActionSchema,
    responses(
        (status = 200, body = Playback, description = "Action was performed"),
        (status = 422, body = ErrorBody, description = "The queue is empty, or nothing is playing")
    )
)]
async fn perform_room_action(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    Json(body): Json<RoomActionSchema>,
) -> ServerResult<Json<Playback>> {
    let rooms = &context.collab.rooms;

    let status = match body {
        RoomActionSchema::Play => rooms.start(user_id, room_id).await?,
        RoomActionSchema::Pause { position_ms } => {
            rooms.pause(user_id, room_id, position_ms).await?
        }
        RoomActionSchema::Skip => rooms.skip(user_id, room_id).await?,
        RoomActionSchema::Seek { position_ms } => {
            rooms.seek(user_id, room_id, position_ms).await?
        }
    };

    Ok(Json(status.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/:id/queue", get(queue).post(enqueue))
        .route("/:id/queue/:entry_id", delete(dequeue))
        .route("/:id/playback", get(playback))
        .route("/:id/actions", post(perform_room_action))
}
