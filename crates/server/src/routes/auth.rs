use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use db::{
    TransactionTrait,
    models::user::{NewUser, User},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    password::{self, hash_password, verify_password},
};

#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct SignInResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

/// Runs argon2 on the blocking pool.
pub(crate) async fn hash_in_background(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| ApiError::Internal(format!("Password hashing task failed: {err}")))?
        .map_err(ApiError::from)
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<User>>), ApiError> {
    password::validate_password(&payload.password).map_err(ApiError::BadRequest)?;
    let password_hash = hash_in_background(payload.password).await?;

    let tx = state.db().pool.begin().await?;
    let user = User::create(
        &tx,
        &NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, "Registered user");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(user))))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<ResponseJson<ApiResponse<SignInResponse>>, ApiError> {
    let Some((user, stored_hash)) =
        User::find_credentials(&state.db().pool, payload.email.trim()).await?
    else {
        tracing::warn!("Sign-in for unknown email");
        return Err(ApiError::Unauthorized);
    };

    let password = payload.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|err| ApiError::Internal(format!("Password check task failed: {err}")))?;
    if !verified {
        tracing::warn!(user_id = user.id, "Sign-in with wrong password");
        return Err(ApiError::Unauthorized);
    }

    let access_token = state
        .tokens()
        .issue(user.id)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(ResponseJson(ApiResponse::success(SignInResponse {
        access_token,
        token_type: "Bearer".to_string(),
        user,
    })))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/register", post(register))
        .route("/sign-in", post(sign_in));

    Router::new().nest("/auth", inner)
}
