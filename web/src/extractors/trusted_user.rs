use crate::extractors::RejectionType;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use hub::UserId;

/// Header carrying the user identity established by the authenticating proxy
/// in front of this service.
pub(crate) const USER_ID_HEADER: &str = "x-user-id";

pub(crate) struct TrustedUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for TrustedUser
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    // Authentication happens upstream; a request reaching the hub without an
    // identity is rejected outright instead of being attached to an anonymous user.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())
            .map(|user_id| TrustedUser(user_id.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Missing {USER_ID_HEADER} header"),
                )
            })
    }
}
