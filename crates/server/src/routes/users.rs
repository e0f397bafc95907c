use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::{
    TransactionTrait,
    models::user::{UpdateUser, User, UserError},
};
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    AppState, error::ApiError, http::auth::AuthUser, middleware::load_user_middleware, password,
    routes::auth::hash_in_background,
};

#[derive(Debug, Default, Deserialize, TS)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn get_users(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = User::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_user(
    _user: AuthUser,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let me = User::find_by_id(&state.db().pool, user.id())
        .await?
        .ok_or(UserError::NotFound)?;
    Ok(ResponseJson(ApiResponse::success(me)))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let password_hash = match payload.password {
        Some(password) => {
            password::validate_password(&password).map_err(ApiError::BadRequest)?;
            Some(hash_in_background(password).await?)
        }
        None => None,
    };

    let tx = state.db().pool.begin().await?;
    let updated = User::update(
        &tx,
        user.id(),
        &UpdateUser {
            username: payload.username,
            email: payload.email,
            password_hash,
        },
    )
    .await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    User::delete(&tx, user.id()).await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id(), "Deleted account");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let user_router = Router::new()
        .route("/", get(get_user))
        .layer(from_fn_with_state(state.clone(), load_user_middleware));

    let inner = Router::new()
        .route("/", get(get_users))
        .route("/me", get(get_me).put(update_me).delete(delete_me))
        .nest("/{user_id}", user_router);

    Router::new().nest("/users", inner)
}
