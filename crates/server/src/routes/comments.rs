use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    TransactionTrait,
    models::comment::{Comment, CommentWithAuthor, CreateComment, UpdateComment},
};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, http::auth::AuthUser};

pub async fn get_task_comments(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Vec<CommentWithAuthor>>>, ApiError> {
    let comments = Comment::find_for_task(&state.db().pool, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
    Json(payload): Json<CreateComment>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Comment>>), ApiError> {
    let tx = state.db().pool.begin().await?;
    let comment = Comment::create(&tx, user.id(), task_id, &payload).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(comment))))
}

pub async fn update_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(comment_id): Path<i64>,
    Json(payload): Json<UpdateComment>,
) -> Result<ResponseJson<ApiResponse<Comment>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    let comment = Comment::update(&tx, comment_id, user.id(), &payload).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(comment_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    Comment::delete(&tx, comment_id, user.id()).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/tasks/{task_id}/comments",
            get(get_task_comments).post(create_comment),
        )
        .route(
            "/comments/{comment_id}",
            put(update_comment).delete(delete_comment),
        )
}
