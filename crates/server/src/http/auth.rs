use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use db::models::user::User;

use crate::{AppState, error::ApiError};

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// The caller identified by a valid bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let reject = |reason: &str| {
            tracing::warn!(
                path = %parts.uri.path(),
                method = %parts.method,
                reason,
                "Unauthorized API request"
            );
            ApiError::Unauthorized
        };

        let Some(token) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_authorization_bearer)
        else {
            return Err(reject("missing_token"));
        };

        let user_id = match state.tokens().verify(token) {
            Ok(user_id) => user_id,
            Err(_) => return Err(reject("invalid_token")),
        };

        // Tokens outlive account deletion.
        if User::find_by_id(&state.db().pool, user_id).await?.is_none() {
            return Err(reject("unknown_user"));
        }

        Ok(AuthUser(user_id))
    }
}
