use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use musicroom_collab::MemberRole;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRoomSchema {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(range(min = 1, max = 1000))]
    pub max_members: Option<i32>,
    #[serde(default)]
    pub is_private: bool,
    /// Required for private rooms, rejected for public ones
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRoomSchema {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub max_members: Option<i32>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinRoomSchema {
    #[validate(length(max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, ToSchema, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleSchema {
    Owner,
    Moderator,
    Member,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRoleSchema {
    pub role: RoleSchema,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BanSchema {
    /// Shown to moderators listing the bans
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnqueueSchema {
    #[validate(range(min = 1))]
    pub track_id: i32,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum RoomActionSchema {
    /// Starts the head of the queue, or resumes the paused track
    Play,
    Pause {
        /// The position the client reached, in milliseconds
        #[serde(rename = "positionMs")]
        position_ms: Option<u32>,
    },
    Skip,
    Seek {
        #[serde(rename = "positionMs")]
        position_ms: u32,
    },
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewMessageSchema {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MessagesQuery {
    /// How many of the latest messages to return, 50 by default and 200 at most
    pub limit: Option<u32>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTrackSchema {
    #[validate(length(min = 1, max = 255))]
    pub external_id: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub artist: String,
    #[validate(length(max = 255))]
    pub album: Option<String>,
    #[validate(url)]
    pub artwork_url: Option<String>,
    #[validate(range(min = 1))]
    pub duration_ms: u32,
}

impl From<RoleSchema> for MemberRole {
    fn from(value: RoleSchema) -> Self {
        match value {
            RoleSchema::Owner => MemberRole::Owner,
            RoleSchema::Moderator => MemberRole::Moderator,
            RoleSchema::Member => MemberRole::Member,
        }
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
