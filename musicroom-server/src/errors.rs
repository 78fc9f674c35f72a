use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use musicroom_collab::{DatabaseError, RoomError};
use musicroom_core::PlaybackError;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors returned from endpoints.
/// Every variant but [ServerError::Internal] is an expected outcome the client can act on.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{message}")]
    NotFound { code: &'static str, message: String },
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("{message}")]
    Forbidden { code: &'static str, message: String },
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    /// The request is well-formed, but the room is in the wrong state for it
    #[error("{message}")]
    Unprocessable { code: &'static str, message: String },
    #[error("Internal server error")]
    Internal,
}

/// The body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// A stable, kebab-case identifier of the error
    code: String,
    message: String,
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::Forbidden { code, .. }
            | Self::BadRequest { code, .. }
            | Self::Unprocessable { code, .. } => code,
            Self::Internal => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };

        (self.as_status_code(), Json(body)).into_response()
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        let message = value.to_string();

        match value {
            RoomError::RoomNotFound => Self::NotFound {
                code: "room-not-found",
                message,
            },
            RoomError::TrackNotFound => Self::NotFound {
                code: "track-not-found",
                message,
            },
            RoomError::Playback(PlaybackError::EntryNotFound) => Self::NotFound {
                code: "entry-not-found",
                message,
            },
            RoomError::Playback(PlaybackError::EmptyQueue) => Self::Unprocessable {
                code: "empty-queue",
                message,
            },
            RoomError::Playback(PlaybackError::NoActiveTrack) => Self::Unprocessable {
                code: "no-active-track",
                message,
            },
            RoomError::Playback(PlaybackError::PositionOutOfRange { .. }) => Self::BadRequest {
                code: "position-out-of-range",
                message,
            },
            RoomError::NotBanned => Self::NotFound {
                code: "not-banned",
                message,
            },
            RoomError::AlreadyBanned => Self::Conflict {
                code: "already-banned",
                message,
            },
            RoomError::UserBanned => Self::Forbidden {
                code: "user-banned",
                message,
            },
            RoomError::RoomAlreadyExists(_) => Self::Conflict {
                code: "room-already-exists",
                message,
            },
            RoomError::AlreadyMember => Self::Conflict {
                code: "already-member",
                message,
            },
            RoomError::RoleConflict(_) => Self::Conflict {
                code: "role-conflict",
                message,
            },
            RoomError::RoomFull => Self::Conflict {
                code: "room-full",
                message,
            },
            RoomError::NotAMember => Self::Forbidden {
                code: "not-a-member",
                message,
            },
            RoomError::PermissionDenied(_) => Self::Forbidden {
                code: "permission-denied",
                message,
            },
            RoomError::InvalidRoomPassword => Self::Forbidden {
                code: "invalid-room-password",
                message,
            },
            RoomError::PrivateRoomRequiresPassword => Self::BadRequest {
                code: "private-room-requires-password",
                message,
            },
            RoomError::PublicRoomCannotHavePassword => Self::BadRequest {
                code: "public-room-cannot-have-password",
                message,
            },
            RoomError::InvalidAction(_) => Self::BadRequest {
                code: "invalid-action",
                message,
            },
            RoomError::HashError(_) | RoomError::Database(_) => {
                error!("Request failed: {}", message);
                Self::Internal
            }
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        let message = value.to_string();

        match value {
            DatabaseError::NotFound { .. } => Self::NotFound {
                code: "not-found",
                message,
            },
            DatabaseError::Conflict { .. } => Self::Conflict {
                code: "conflict",
                message,
            },
            _ => {
                error!("Request failed: {}", message);
                Self::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_errors_are_client_errors() {
        let cases = [
            (PlaybackError::EmptyQueue, StatusCode::UNPROCESSABLE_ENTITY),
            (PlaybackError::NoActiveTrack, StatusCode::UNPROCESSABLE_ENTITY),
            (PlaybackError::EntryNotFound, StatusCode::NOT_FOUND),
        ];

        for (error, status) in cases {
            let error = ServerError::from(RoomError::Playback(error));
            assert_eq!(error.as_status_code(), status);
        }
    }

    #[test]
    fn infrastructure_failures_hide_their_details() {
        let error = ServerError::from(RoomError::Database(DatabaseError::Unavailable));

        assert_eq!(error.as_status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "Internal server error");
    }

    #[test]
    fn ban_errors_have_stable_codes() {
        let cases = [
            (RoomError::UserBanned, StatusCode::FORBIDDEN, "user-banned"),
            (RoomError::AlreadyBanned, StatusCode::CONFLICT, "already-banned"),
            (RoomError::NotBanned, StatusCode::NOT_FOUND, "not-banned"),
        ];

        for (error, status, code) in cases {
            let error = ServerError::from(error);
            assert_eq!(error.as_status_code(), status);
            assert_eq!(error.code(), code);
        }
    }
}
