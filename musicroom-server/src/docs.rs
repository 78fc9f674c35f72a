use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    connections::ServerEvent,
    errors::ErrorBody,
    gateway, members, messages, queue, rooms,
    schemas::{
        BanSchema, EnqueueSchema, JoinRoomSchema, NewMessageSchema, NewRoomSchema, NewTrackSchema,
        RoleSchema, RoomActionSchema, UpdateRoleSchema, UpdateRoomSchema,
    },
    serialized::{Ban, Message, Playback, QueuedTrack, Room, RoomMember, Track},
    tracks,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        rooms::list_rooms,
        rooms::create_room,
        rooms::room_by_name,
        rooms::room,
        rooms::update_room,
        rooms::delete_room,
        members::members,
        members::join_room,
        members::leave_room,
        members::kick_member,
        members::update_member_role,
        members::bans,
        members::ban_member,
        members::unban_member,
        queue::queue,
        queue::enqueue,
        queue::dequeue,
        queue::playback,
        queue::perform_room_action,
        messages::messages,
        messages::send_message,
        tracks::list_tracks,
        tracks::register_track,
        tracks::track,
        gateway::gateway,
    ),
    components(schemas(
        Room,
        RoomMember,
        Ban,
        Track,
        QueuedTrack,
        Playback,
        Message,
        ErrorBody,
        ServerEvent,
        NewRoomSchema,
        UpdateRoomSchema,
        JoinRoomSchema,
        BanSchema,
        RoleSchema,
        UpdateRoleSchema,
        EnqueueSchema,
        RoomActionSchema,
        NewMessageSchema,
        NewTrackSchema,
    )),
    modifiers(&Identity),
    security(("UserId" = [])),
    info(
        description = "musicroom-server exposes endpoints to share rooms, queue tracks and control playback together"
    )
)]
pub struct ApiDoc;

struct Identity;

impl Modify for Identity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = ApiKey::Header(ApiKeyValue::with_description(
                "X-User-Id",
                "The id of the authenticated user, set by the identity provider",
            ));

            components.add_security_scheme("UserId", SecurityScheme::ApiKey(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
