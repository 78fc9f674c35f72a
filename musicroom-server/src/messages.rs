use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json,
};

use crate::{
    actor::Actor,
    context::ServerContext,
    errors::{ErrorBody, ServerResult},
    schemas::{MessagesQuery, NewMessageSchema, ValidatedJson},
    serialized::{Message, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/messages",
    tag = "messages",
    params(MessagesQuery),
    responses(
        (status = 200, body = Vec<Message>, description = "The latest messages, oldest first"),
        (status = 403, body = ErrorBody, description = "User is not a member of the room")
    )
)]
async fn messages(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    Query(query): Query<MessagesQuery>,
) -> ServerResult<Json<Vec<Message>>> {
    let messages = context
        .collab
        .rooms
        .messages(user_id, room_id, query.limit)
        .await?;

    Ok(Json(messages.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/messages",
    tag = "messages",
    request_body = NewMessageSchema,
    responses(
        (status = 200, body = Message)
    )
)]
async fn send_message(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<NewMessageSchema>,
) -> ServerResult<Json<Message>> {
    let message = context
        .collab
        .rooms
        .send_message(user_id, room_id, &body.content)
        .await?;

    Ok(Json(message.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/:id/messages", get(messages).post(send_message))
}
