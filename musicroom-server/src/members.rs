use axum::{
    extract::{Path, State},
    routing::{delete, get, put},
    Json,
};

use crate::{
    actor::Actor,
    context::ServerContext,
    errors::{ErrorBody, ServerResult},
    schemas::{BanSchema, JoinRoomSchema, UpdateRoleSchema, ValidatedJson},
    serialized::{Ban, RoomMember, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/members",
    tag = "members",
    responses(
        (status = 200, body = Vec<RoomMember>)
    )
)]
async fn members(
    _actor: Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Vec<RoomMember>>> {
    let members = context.collab.rooms.members(room_id).await?;

    Ok(Json(members.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/members",
    tag = "members",
    request_body = JoinRoomSchema,
    responses(
        (status = 200, body = RoomMember, description = "User joined the room"),
        (status = 403, body = ErrorBody, description = "The room password is wrong"),
        (status = 409, body = ErrorBody, description = "User is already a member, or the room is full")
    )
)]
async fn join_room(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<JoinRoomSchema>,
) -> ServerResult<Json<RoomMember>> {
    let member = context
        .collab
        .rooms
        .join_room(user_id, room_id, body.password.as_deref())
        .await?;

    Ok(Json(member.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/members/me",
    tag = "members",
    responses(
        (status = 200, description = "User left the room"),
        (status = 400, body = ErrorBody, description = "The owner cannot leave their room")
    )
)]
async fn leave_room(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<()> {
    context.collab.rooms.leave_room(user_id, room_id).await?;

    Ok(())
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/members/{user_id}",
    tag = "members",
    responses(
        (status = 200, description = "Member was kicked"),
        (status = 403, body = ErrorBody)
    )
)]
async fn kick_member(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path((room_id, target)): Path<(i32, i32)>,
) -> ServerResult<()> {
    context
        .collab
        .rooms
        .kick_member(user_id, room_id, target)
        .await?;

    Ok(())
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/members/{user_id}/role",
    tag = "members",
    request_body = UpdateRoleSchema,
    responses(
        (status = 200, body = RoomMember),
        (status = 409, body = ErrorBody, description = "Member already has this role")
    )
)]
async fn update_member_role(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path((room_id, target)): Path<(i32, i32)>,
    ValidatedJson(body): ValidatedJson<UpdateRoleSchema>,
) -> ServerResult<Json<RoomMember>> {
    let member = context
        .collab
        .rooms
        .update_member_role(user_id, room_id, target, body.role.into())
        .await?;

    Ok(Json(member.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/bans",
    tag = "members",
    responses(
        (status = 200, body = Vec<Ban>),
        (status = 403, body = ErrorBody, description = "Only owners and moderators see the bans")
    )
)]
async fn bans(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Vec<Ban>>> {
    let bans = context.collab.rooms.bans(user_id, room_id).await?;

    Ok(Json(bans.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/bans/{user_id}",
    tag = "members",
    request_body = BanSchema,
    responses(
        (status = 200, body = Ban, description = "User was removed from the room and cannot rejoin"),
        (status = 403, body = ErrorBody),
        (status = 409, body = ErrorBody, description = "User is already banned")
    )
)]
async fn ban_member(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path((room_id, target)): Path<(i32, i32)>,
    ValidatedJson(body): ValidatedJson<BanSchema>,
) -> ServerResult<Json<Ban>> {
    let ban = context
        .collab
        .rooms
        .ban_member(user_id, room_id, target, body.reason)
        .await?;

    Ok(Json(ban.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/bans/{user_id}",
    tag = "members",
    responses(
        (status = 200, description = "User may join the room again"),
        (status = 404, body = ErrorBody, description = "User is not banned")
    )
)]
async fn unban_member(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path((room_id, target)): Path<(i32, i32)>,
) -> ServerResult<()> {
    context
        .collab
        .rooms
        .unban_member(user_id, room_id, target)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/:id/members", get(members).post(join_room))
        .route("/:id/members/me", delete(leave_room))
        .route("/:id/members/:user_id", delete(kick_member))
        .route("/:id/members/:user_id/role", put(update_member_role))
        .route("/:id/bans", get(bans))
        .route("/:id/bans/:user_id", put(ban_member).delete(unban_member))
}
