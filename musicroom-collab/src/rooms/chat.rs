use musicroom_core::{RoomId, UserId};

use crate::{CollabEvent, MessageData, NewMessage};

use super::{DatabaseFailure, Result, RoomError, RoomService};

pub const MAX_MESSAGE_LENGTH: usize = 1000;
pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;
pub const MAX_MESSAGE_LIMIT: u32 = 200;

impl RoomService {
    /// Sends a chat message to a room on behalf of one of its members
    pub async fn send_message(
        &self,
        user_id: UserId,
        room_id: RoomId,
        content: &str,
    ) -> Result<MessageData> {
        let content = content.trim();

        if content.is_empty() {
            return Err(RoomError::InvalidAction("messages cannot be empty"));
        }

        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(RoomError::InvalidAction("message is too long"));
        }

        self.require_member("send_message", room_id, user_id)
            .await?;

        let message = self
            .db()
            .create_message(NewMessage {
                room_id,
                user_id,
                content: content.to_string(),
            })
            .await
            .context("send_message", room_id)?;

        self.context.emit(CollabEvent::ChatMessage {
            room_id,
            message: message.clone(),
        });

        Ok(message)
    }

    /// The latest messages of a room, oldest first
    pub async fn messages(
        &self,
        user_id: UserId,
        room_id: RoomId,
        limit: Option<u32>,
    ) -> Result<Vec<MessageData>> {
        self.require_member("messages", room_id, user_id).await?;

        let limit = limit
            .unwrap_or(DEFAULT_MESSAGE_LIMIT)
            .clamp(1, MAX_MESSAGE_LIMIT);

        self.db()
            .recent_messages(room_id, limit)
            .await
            .context("messages", room_id)
    }
}
