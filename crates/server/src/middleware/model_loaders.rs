use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::models::{category::Category, review::Review, user::User};

use crate::{AppState, error::ApiError};

async fn fetch_model_or_error<M, E, Fut>(
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::warn!("{model_name} {model_id} not found");
            Err(ApiError::NotFound(format!("{model_name} not found")))
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(ApiError::Internal(format!("Failed to load {model_name}")))
        }
    }
}

async fn load_request_extension<M, E, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_error(model_name, model_id, load_future).await?;
    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_user_middleware(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    load_request_extension(
        request,
        next,
        "User",
        user_id,
        User::find_by_id(&state.db().pool, user_id),
    )
    .await
}

pub async fn load_category_middleware(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    load_request_extension(
        request,
        next,
        "Category",
        category_id,
        Category::find_by_id(&state.db().pool, category_id),
    )
    .await
}

pub async fn load_review_middleware(
    State(state): State<AppState>,
    Path(review_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    load_request_extension(
        request,
        next,
        "Review",
        review_id,
        Review::find_by_id(&state.db().pool, review_id),
    )
    .await
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::fetch_model_or_error;

    #[tokio::test]
    async fn fetch_model_or_error_returns_not_found_on_missing_model() {
        let result =
            fetch_model_or_error::<String, &'static str, _>("Category", 7, async { Ok(None) })
                .await;

        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn fetch_model_or_error_returns_internal_error_on_fetch_failure() {
        let result = fetch_model_or_error::<String, &'static str, _>("Category", 7, async {
            Err("db unavailable")
        })
        .await;

        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
