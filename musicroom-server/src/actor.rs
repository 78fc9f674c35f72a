use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use musicroom_core::UserId;

/// The header the upstream identity provider puts the authenticated user id in
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user performing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing X-User-Id header"))?;

        let user_id = value
            .trim()
            .parse::<UserId>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or((StatusCode::BAD_REQUEST, "X-User-Id must be a positive integer"))?;

        Ok(Self(user_id))
    }
}
