use axum::{
    extract::{Path, State},
    routing::get,
    Json,
};
use musicroom_collab::{NewRoomRequest, RoomChanges};

use crate::{
    actor::Actor,
    context::ServerContext,
    errors::{ErrorBody, ServerResult},
    gateway, members, messages, queue,
    schemas::{NewRoomSchema, UpdateRoomSchema, ValidatedJson},
    serialized::{Room, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
async fn list_rooms(_actor: Actor, State(context): State<ServerContext>) -> ServerResult<Json<Vec<Room>>> {
    let rooms = context.collab.rooms.list_rooms().await?;

    Ok(Json(rooms.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    responses(
        (status = 200, body = Room),
        (status = 409, body = ErrorBody, description = "A room with this name already exists")
    )
)]
async fn create_room(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .create_room(
            user_id,
            NewRoomRequest {
                name: body.name,
                max_members: body.max_members,
                is_private: body.is_private,
                password: body.password,
            },
        )
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/by-name/{name}",
    tag = "rooms",
    responses(
        (status = 200, body = Room),
        (status = 404, body = ErrorBody)
    )
)]
async fn room_by_name(
    _actor: Actor,
    State(context): State<ServerContext>,
    Path(name): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.room_by_name(&name).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    responses(
        (status = 200, body = Room),
        (status = 404, body = ErrorBody)
    )
)]
async fn room(
    _actor: Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.room_by_id(room_id).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    request_body = UpdateRoomSchema,
    responses(
        (status = 200, body = Room),
        (status = 403, body = ErrorBody, description = "Only the owner can edit the room")
    )
)]
async fn update_room(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .update_room(
            user_id,
            room_id,
            RoomChanges {
                name: body.name,
                max_members: body.max_members,
            },
        )
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    responses(
        (status = 200, description = "Room was deleted along with its queue, members and messages"),
        (status = 403, body = ErrorBody, description = "Only the owner can delete the room")
    )
)]
async fn delete_room(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<()> {
    context.collab.rooms.delete_room(user_id, room_id).await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/by-name/:name", get(room_by_name))
        .route("/:id", get(room).patch(update_room).delete(delete_room))
        .merge(members::router())
        .merge(queue::router())
        .merge(messages::router())
        .merge(gateway::router())
}
