use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    TransactionTrait,
    models::post::{CreatePost, Post, PostWithAuthor, UpdatePost},
    tag_resolution::RandomPicker,
    types::PostStatus,
};
use utils::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    http::auth::AuthUser,
    uploads::{PendingImage, remove_stored},
};

/// Text fields and the optional image of a post form. Absent fields stay
/// `None`; a clearable field sent empty becomes `Some(None)`.
#[derive(Debug, Default)]
struct PostForm {
    title: Option<String>,
    content: Option<String>,
    status: Option<PostStatus>,
    tag_id: Option<Option<i64>>,
    latitude: Option<Option<f64>>,
    longitude: Option<Option<f64>>,
    image: Option<(String, Vec<u8>)>,
}

fn parse_status(raw: &str) -> Result<PostStatus, ApiError> {
    raw.trim().parse::<PostStatus>().map_err(|_| {
        ApiError::BadRequest("Status must be one of NATURA, URBAN, RURAL".to_string())
    })
}

fn parse_tag_id(raw: &str) -> Result<Option<i64>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| ApiError::BadRequest("tagId must be an integer".to_string()))
}

/// `Some(None)` clears the coordinate; unparseable input leaves it untouched.
fn parse_coordinate(name: &str, raw: &str) -> Option<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(None);
    }
    match raw.parse::<f64>() {
        Ok(value) => Some(Some(value)),
        Err(_) => {
            tracing::debug!(field = name, value = raw, "Ignoring unparseable coordinate");
            None
        }
    }
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, ApiError> {
    let mut form = PostForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            // Browsers send an empty part when no file was chosen.
            if !file_name.is_empty() || !bytes.is_empty() {
                form.image = Some((file_name, bytes.to_vec()));
            }
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "content" => form.content = Some(value),
            "status" if !value.trim().is_empty() => form.status = Some(parse_status(&value)?),
            "tagId" | "tag_id" => form.tag_id = Some(parse_tag_id(&value)?),
            "latitude" => {
                if let Some(latitude) = parse_coordinate("latitude", &value) {
                    form.latitude = Some(latitude);
                }
            }
            "longitude" => {
                if let Some(longitude) = parse_coordinate("longitude", &value) {
                    form.longitude = Some(longitude);
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

fn accept_image(state: &AppState, form: &mut PostForm) -> Result<Option<PendingImage>, ApiError> {
    form.image
        .take()
        .map(|(file_name, bytes)| PendingImage::accept(&state.config().upload, &file_name, bytes))
        .transpose()
        .map_err(ApiError::from)
}

pub async fn get_posts(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<PostWithAuthor>>>, ApiError> {
    let posts = Post::find_all_with_authors(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(posts)))
}

pub async fn get_my_posts(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<PostWithAuthor>>>, ApiError> {
    let posts = Post::find_by_user_with_authors(&state.db().pool, user.id()).await?;
    Ok(ResponseJson(ApiResponse::success(posts)))
}

pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Post>>), ApiError> {
    let mut form = read_post_form(multipart).await?;
    let image = accept_image(&state, &mut form)?;
    let status = form
        .status
        .ok_or_else(|| ApiError::BadRequest("Status is required".to_string()))?;

    let data = CreatePost {
        title: form.title.unwrap_or_default(),
        content: form.content.unwrap_or_default(),
        status,
        tag_id: form.tag_id.flatten(),
        image: image.as_ref().map(|image| image.file_name.clone()),
        latitude: form.latitude.flatten(),
        longitude: form.longitude.flatten(),
    };

    let upload_dir = &state.config().upload.dir;
    let tx = state.db().pool.begin().await?;
    let (post, resolution) =
        Post::create_with_resolved_tag(&tx, user.id(), &data, &mut RandomPicker::from_entropy())
            .await?;
    let stored = match image {
        Some(image) => Some(image.persist(upload_dir).await?),
        None => None,
    };
    if let Err(err) = tx.commit().await {
        if let Some(file_name) = &stored {
            remove_stored(upload_dir, file_name).await;
        }
        return Err(err.into());
    }

    tracing::info!(
        post_id = post.id,
        tag_id = ?post.tag_id,
        resolution = ?resolution,
        "Created post"
    );
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(post))))
}

pub async fn update_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<Post>>, ApiError> {
    let mut form = read_post_form(multipart).await?;
    let image = accept_image(&state, &mut form)?;

    let data = UpdatePost {
        title: form.title,
        content: form.content,
        status: form.status,
        tag_id: form.tag_id,
        image: image.as_ref().map(|image| image.file_name.clone()),
        latitude: form.latitude,
        longitude: form.longitude,
    };

    let upload_dir = &state.config().upload.dir;
    let tx = state.db().pool.begin().await?;
    let previous_image = Post::find_by_id(&tx, post_id)
        .await?
        .and_then(|post| post.image);
    let post = Post::update(&tx, post_id, user.id(), &data).await?;
    let stored = match image {
        Some(image) => Some(image.persist(upload_dir).await?),
        None => None,
    };
    if let Err(err) = tx.commit().await {
        if let Some(file_name) = &stored {
            remove_stored(upload_dir, file_name).await;
        }
        return Err(err.into());
    }

    if let (Some(_), Some(previous)) = (&stored, previous_image) {
        remove_stored(upload_dir, &previous).await;
    }
    Ok(ResponseJson(ApiResponse::success(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let tx = state.db().pool.begin().await?;
    let removed = Post::delete(&tx, post_id, user.id()).await?;
    tx.commit().await?;

    if let Some(image) = removed.image {
        remove_stored(&state.config().upload.dir, &image).await;
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/", get(get_posts).post(create_post))
        .route("/user", get(get_my_posts))
        .route("/{post_id}", put(update_post).delete(delete_post));

    Router::new().nest("/posts", inner)
}
