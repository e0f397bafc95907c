use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::{
    TransactionTrait,
    models::review::{CreateReview, PostReviews, Review, ReviewWithAuthor, UpdateReview},
};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, http::auth::AuthUser, middleware::load_review_middleware};

pub async fn get_post_reviews(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<PostReviews>>, ApiError> {
    let reviews = Review::find_for_post(&state.db().pool, post_id).await?;
    Ok(ResponseJson(ApiResponse::success(reviews)))
}

pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateReview>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Review>>), ApiError> {
    let tx = state.db().pool.begin().await?;
    let review = Review::create(&tx, user.id(), post_id, &payload).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(review))))
}

pub async fn get_review(
    _user: AuthUser,
    Extension(review): Extension<ReviewWithAuthor>,
) -> Result<ResponseJson<ApiResponse<ReviewWithAuthor>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(review)))
}

pub async fn update_review(
    Extension(existing): Extension<ReviewWithAuthor>,
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateReview>,
) -> Result<ResponseJson<ApiResponse<Review>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    let review = Review::update(&tx, existing.review.id, user.id(), &payload).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(review)))
}

pub async fn delete_review(
    Extension(existing): Extension<ReviewWithAuthor>,
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    Review::delete(&tx, existing.review.id, user.id()).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let review_router = Router::new()
        .route(
            "/",
            get(get_review).put(update_review).delete(delete_review),
        )
        .layer(from_fn_with_state(state.clone(), load_review_middleware));

    Router::new()
        .route(
            "/posts/{post_id}/reviews",
            get(get_post_reviews).post(create_review),
        )
        .nest("/reviews/{review_id}", review_router)
}
