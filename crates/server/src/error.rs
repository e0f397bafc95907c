use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        category::CategoryError, comment::CommentError, favorite::FavoriteError, post::PostError,
        review::ReviewError, tag::TagError, task::TaskError, user::UserError,
    },
    policy::AccessError,
    tag_resolution::TagResolutionError,
};
use thiserror::Error;
use utils::response::ApiResponse;

use crate::{password::PasswordError, uploads::UploadError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Post(#[from] PostError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Favorite(#[from] FavoriteError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Comment(#[from] CommentError),
    #[error(transparent)]
    TagResolution(#[from] TagResolutionError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<&'static str> for ApiError {
    fn from(msg: &'static str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }
}

fn access_status(err: &AccessError) -> StatusCode {
    match err {
        AccessError::NotFound(_) => StatusCode::NOT_FOUND,
        AccessError::Forbidden(_) => StatusCode::FORBIDDEN,
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::User(err) => match err {
                UserError::NotFound => (StatusCode::NOT_FOUND, "UserError"),
                UserError::UsernameTaken
                | UserError::EmailTaken
                | UserError::AlreadyRegistered => (StatusCode::CONFLICT, "UserError"),
                UserError::Validation(_) => (StatusCode::BAD_REQUEST, "UserError"),
                UserError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::Tag(err) => match err {
                TagError::NotFound | TagError::NoneMatched => (StatusCode::NOT_FOUND, "TagError"),
                TagError::Duplicate(_) | TagError::InUse(_) => (StatusCode::CONFLICT, "TagError"),
                TagError::EmptySelection => (StatusCode::BAD_REQUEST, "PreconditionFailed"),
                TagError::Validation(_) => (StatusCode::BAD_REQUEST, "TagError"),
                TagError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TagError"),
            },
            ApiError::Category(err) => match err {
                CategoryError::NotFound => (StatusCode::NOT_FOUND, "CategoryError"),
                CategoryError::Duplicate => (StatusCode::CONFLICT, "CategoryError"),
                CategoryError::Validation(_) => (StatusCode::BAD_REQUEST, "CategoryError"),
                CategoryError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CategoryError"),
            },
            ApiError::Post(err) => match err {
                PostError::Access(access) => (access_status(access), "PostError"),
                PostError::UnknownTag(_) | PostError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "PostError")
                }
                PostError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PostError"),
            },
            ApiError::Review(err) => match err {
                ReviewError::Access(access) => (access_status(access), "ReviewError"),
                ReviewError::PostNotFound => (StatusCode::NOT_FOUND, "ReviewError"),
                ReviewError::AlreadyReviewed => (StatusCode::CONFLICT, "ReviewError"),
                ReviewError::Validation(_) => (StatusCode::BAD_REQUEST, "ReviewError"),
                ReviewError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ReviewError"),
            },
            ApiError::Favorite(err) => match err {
                FavoriteError::Access(access) => (access_status(access), "FavoriteError"),
                FavoriteError::PostNotFound | FavoriteError::NotFavorited => {
                    (StatusCode::NOT_FOUND, "FavoriteError")
                }
                FavoriteError::AlreadyFavorited => (StatusCode::CONFLICT, "FavoriteError"),
                FavoriteError::Validation(_) => (StatusCode::BAD_REQUEST, "FavoriteError"),
                FavoriteError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "FavoriteError"),
            },
            ApiError::Task(err) => match err {
                TaskError::Access(access) => (access_status(access), "TaskError"),
                TaskError::UnknownTag(_) | TaskError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "TaskError")
                }
                TaskError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TaskError"),
            },
            ApiError::Comment(err) => match err {
                CommentError::Access(access) => (access_status(access), "CommentError"),
                CommentError::TaskNotFound => (StatusCode::NOT_FOUND, "CommentError"),
                CommentError::Validation(_) => (StatusCode::BAD_REQUEST, "CommentError"),
                CommentError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CommentError"),
            },
            ApiError::TagResolution(err) => match err {
                TagResolutionError::NoTags => (StatusCode::BAD_REQUEST, "PreconditionFailed"),
                TagResolutionError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "TagResolutionError")
                }
            },
            ApiError::Upload(err) => match err {
                UploadError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UploadError"),
                _ => (StatusCode::BAD_REQUEST, "UploadError"),
            },
            ApiError::Password(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PasswordError"),
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, "MultipartError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Precondition(_) => (StatusCode::BAD_REQUEST, "PreconditionFailed"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status_and_type();

        let error_message = match &self {
            ApiError::Multipart(_) => {
                "Failed to read the upload. Please ensure the form is valid and try again."
                    .to_string()
            }
            ApiError::Unauthorized => "Unauthorized. Please sign in again.".to_string(),
            ApiError::NotFound(msg)
            | ApiError::Internal(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Precondition(msg)
            | ApiError::Conflict(msg)
            | ApiError::Forbidden(msg) => msg.clone(),
            // Store failures are logged below; clients only see the kind.
            _ if status_code.is_server_error() => format!("{}: internal error", error_type),
            _ => self.to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
