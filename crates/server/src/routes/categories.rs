use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::{
    TransactionTrait,
    models::category::{Category, CreateCategory, UpdateCategory},
};
use utils::response::ApiResponse;

use crate::{
    AppState, error::ApiError, http::auth::AuthUser, middleware::load_category_middleware,
};

pub async fn get_categories(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = Category::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(categories)))
}

pub async fn get_category(
    Extension(category): Extension<Category>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn create_category(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<CreateCategory>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Category>>), ApiError> {
    let tx = state.db().pool.begin().await?;
    let category = Category::create(&tx, &payload).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(category))))
}

pub async fn update_category(
    Extension(existing): Extension<Category>,
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<UpdateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    let category = Category::update(&tx, existing.id, &payload).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn delete_category(
    Extension(existing): Extension<Category>,
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    Category::delete(&tx, existing.id).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let category_router = Router::new()
        .route(
            "/",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .layer(from_fn_with_state(state.clone(), load_category_middleware));

    let inner = Router::new()
        .route("/", get(get_categories).post(create_category))
        .nest("/{category_id}", category_router);

    Router::new().nest("/categories", inner)
}
