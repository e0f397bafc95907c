use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    TransactionTrait,
    models::favorite::{
        CreateFavorite, Favorite, FavoriteStatus, FavoriteWithPost, UpdateFavorite,
    },
};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, http::auth::AuthUser};

pub async fn get_favorites(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<FavoriteWithPost>>>, ApiError> {
    let favorites = Favorite::find_for_user(&state.db().pool, user.id()).await?;
    Ok(ResponseJson(ApiResponse::success(favorites)))
}

pub async fn create_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateFavorite>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Favorite>>), ApiError> {
    let tx = state.db().pool.begin().await?;
    let favorite = Favorite::create(&tx, user.id(), &payload).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(favorite))))
}

pub async fn update_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(favorite_id): Path<i64>,
    Json(payload): Json<UpdateFavorite>,
) -> Result<ResponseJson<ApiResponse<Favorite>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    let favorite = Favorite::update(&tx, favorite_id, user.id(), &payload).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(favorite)))
}

pub async fn delete_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(favorite_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    Favorite::delete(&tx, favorite_id, user.id()).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_favorite_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<FavoriteStatus>>, ApiError> {
    let status = Favorite::status_for_post(&state.db().pool, user.id(), post_id).await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn delete_favorite_by_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    Favorite::delete_by_post(&tx, user.id(), post_id).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/favorites", get(get_favorites).post(create_favorite))
        .route(
            "/favorites/{favorite_id}",
            put(update_favorite).delete(delete_favorite),
        )
        .route(
            "/posts/{post_id}/favorite",
            get(get_favorite_status).delete(delete_favorite_by_post),
        )
}
