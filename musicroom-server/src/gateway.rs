use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
};
use futures_util::{Sink, SinkExt, StreamExt};
use log::{info, warn};
use musicroom_core::{RoomId, UserId};
use serde::Deserialize;

use crate::{
    actor::Actor,
    connections::{ConnectionHandle, ServerEvent},
    context::ServerContext,
    errors::{ErrorBody, ServerError, ServerResult},
    Router,
};

/// Messages a client may send over the gateway
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
enum GatewayMessage {
    Chat { content: String },
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/gateway",
    tag = "events",
    responses(
        (
            status = 101,
            description = "Upgrades to a WebSocket streaming the events of the room as JSON",
            body = ServerEvent
        ),
        (status = 403, body = ErrorBody, description = "User is not a member of the room")
    )
)]
async fn gateway(
    Actor(user_id): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ws: WebSocketUpgrade,
) -> ServerResult<Response> {
    context.collab.rooms.member(user_id, room_id).await?;

    let handle = context.connections.connect(room_id, user_id);
    info!("User {} connected to room {} ({})", user_id, room_id, handle.id());

    Ok(ws.on_upgrade(move |socket| run_gateway(socket, handle, context, user_id, room_id)))
}

async fn run_gateway(
    socket: WebSocket,
    mut handle: ConnectionHandle,
    context: ServerContext,
    user_id: UserId,
    room_id: RoomId,
) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = handle.recv() => {
                let Some(event) = event else {
                    break;
                };

                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_message(&context, user_id, room_id, &text).await {
                        if send_event(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    info!("User {} disconnected from room {} ({})", user_id, room_id, handle.id());
}

async fn send_event<S>(sender: &mut S, event: &ServerEvent) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not serialize event: {}", e);
            return Ok(());
        }
    };

    sender.send(Message::Text(text)).await.map_err(|_| ())
}

/// Handles a client message, returning an error event to reply with if it failed
async fn handle_message(
    context: &ServerContext,
    user_id: UserId,
    room_id: RoomId,
    text: &str,
) -> Option<ServerEvent> {
    let message: GatewayMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(_) => {
            return Some(ServerEvent::Error {
                code: "invalid-message".to_string(),
                message: "Message could not be parsed".to_string(),
            })
        }
    };

    let result = match message {
        GatewayMessage::Chat { content } => context
            .collab
            .rooms
            .send_message(user_id, room_id, &content)
            .await,
    };

    result.err().map(|e| {
        let error = ServerError::from(e);

        ServerEvent::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    })
}

pub fn router() -> Router {
    Router::new().route("/:id/gateway", get(gateway))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_messages_are_tagged() {
        let message: GatewayMessage =
            serde_json::from_str(r#"{"type":"chat","content":"hello"}"#).unwrap();

        assert!(matches!(message, GatewayMessage::Chat { content } if content == "hello"));
        assert!(serde_json::from_str::<GatewayMessage>(r#"{"type":"shout"}"#).is_err());
    }
}
