use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::{
    TransactionTrait,
    models::tag::{BulkDeleteResult, BulkDeleteTags, CreateTag, Tag, UpdateTag},
};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, http::auth::AuthUser};

pub async fn get_tags(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Tag>>>, ApiError> {
    let tags = Tag::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(tags)))
}

pub async fn create_tag(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<CreateTag>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Tag>>), ApiError> {
    let tx = state.db().pool.begin().await?;
    let tag = Tag::create(&tx, &payload).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(tag))))
}

pub async fn update_tag(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(tag_id): Path<i64>,
    Json(payload): Json<UpdateTag>,
) -> Result<ResponseJson<ApiResponse<Tag>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    let tag = Tag::update(&tx, tag_id, &payload).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(tag)))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(tag_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    Tag::delete(&tx, tag_id).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn bulk_delete_tags(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<BulkDeleteTags>,
) -> Result<ResponseJson<ApiResponse<BulkDeleteResult>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    let result = Tag::bulk_delete(&tx, &payload).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(result)))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/", get(get_tags).post(create_tag))
        .route("/bulk-delete", post(bulk_delete_tags))
        .route("/{tag_id}", put(update_tag).delete(delete_tag));

    Router::new().nest("/tags", inner)
}
