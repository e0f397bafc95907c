use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::{validate_optional_text, validate_text};
use crate::{
    entities::{favorite, post, review, tag, user},
    models::tag::Tag,
    policy::{self, AccessError, Mismatch},
    tag_resolution::{self, ResolutionPath, TagPicker, TagResolutionError},
    types::PostStatus,
};

const TITLE_MAX: usize = 100;
const CONTENT_MAX: usize = 1000;
const IMAGE_MAX: usize = 300;

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Tag {0} not found")]
    UnknownTag(i64),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub image: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub user_id: i64,
    pub tag_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post with its author's username and its tag name resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    #[ts(flatten)]
    pub post: Post,
    pub username: String,
    pub tag_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub tag_id: Option<i64>,
    pub image: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Fields a post owner may change. `None` leaves a field untouched; the
/// nested options on `tag_id` and the coordinates allow clearing them.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    pub tag_id: Option<Option<i64>>,
    pub image: Option<String>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
}

impl From<post::Model> for Post {
    fn from(model: post::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            content: model.content,
            status: model.status,
            image: model.image,
            latitude: model.latitude,
            longitude: model.longitude,
            user_id: model.user_id,
            tag_id: model.tag_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

fn validate_coordinate(field: &str, value: Option<f64>, bound: f64) -> Result<(), PostError> {
    match value {
        Some(value) if !value.is_finite() || value.abs() > bound => Err(PostError::Validation(
            format!("{field} must be between -{bound} and {bound}"),
        )),
        _ => Ok(()),
    }
}

async fn ensure_tag_exists<C: ConnectionTrait>(db: &C, tag_id: i64) -> Result<(), PostError> {
    if tag::Entity::find_by_id(tag_id).one(db).await?.is_none() {
        return Err(PostError::UnknownTag(tag_id));
    }
    Ok(())
}

impl Post {
    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = post::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from))
    }

    /// Every post, newest first.
    pub async fn find_all_with_authors<C: ConnectionTrait>(
        db: &C,
    ) -> Result<Vec<PostWithAuthor>, DbErr> {
        let records = post::Entity::find()
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .all(db)
            .await?;
        Self::with_authors(db, records).await
    }

    /// Posts created by `user_id`, newest first.
    pub async fn find_by_user_with_authors<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<Vec<PostWithAuthor>, DbErr> {
        let records = post::Entity::find()
            .filter(post::Column::UserId.eq(user_id))
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .all(db)
            .await?;
        Self::with_authors(db, records).await
    }

    pub(crate) async fn with_authors<C: ConnectionTrait>(
        db: &C,
        records: Vec<post::Model>,
    ) -> Result<Vec<PostWithAuthor>, DbErr> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<i64> = records.iter().map(|post| post.user_id).collect();
        let tag_ids: Vec<i64> = records.iter().filter_map(|post| post.tag_id).collect();

        let usernames: HashMap<i64, String> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|user| (user.id, user.username))
            .collect();
        let tag_names: HashMap<i64, String> = if tag_ids.is_empty() {
            HashMap::new()
        } else {
            tag::Entity::find()
                .filter(tag::Column::Id.is_in(tag_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|tag| (tag.id, tag.name))
                .collect()
        };

        Ok(records
            .into_iter()
            .map(|record| {
                let username = usernames.get(&record.user_id).cloned().unwrap_or_default();
                let tag_name = record.tag_id.and_then(|id| tag_names.get(&id).cloned());
                PostWithAuthor {
                    post: Self::from(record),
                    username,
                    tag_name,
                }
            })
            .collect())
    }

    /// Creates a post with exactly the tag in `data`. An explicit tag id must
    /// reference an existing tag.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        data: &CreatePost,
    ) -> Result<Self, PostError> {
        validate_text("Title", &data.title, TITLE_MAX).map_err(PostError::Validation)?;
        validate_text("Content", &data.content, CONTENT_MAX).map_err(PostError::Validation)?;
        validate_optional_text("Image", data.image.as_deref(), IMAGE_MAX)
            .map_err(PostError::Validation)?;
        validate_coordinate("Latitude", data.latitude, 90.0)?;
        validate_coordinate("Longitude", data.longitude, 180.0)?;
        if let Some(tag_id) = data.tag_id {
            ensure_tag_exists(db, tag_id).await?;
        }

        let now = Utc::now();
        let active = post::ActiveModel {
            title: Set(data.title.clone()),
            content: Set(data.content.clone()),
            status: Set(data.status),
            image: Set(data.image.clone()),
            latitude: Set(data.latitude),
            longitude: Set(data.longitude),
            user_id: Set(user_id),
            tag_id: Set(data.tag_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from(model))
    }

    /// Creates a post, picking a tag for it when none was given. The post
    /// stays untagged only when no tags exist at all.
    pub async fn create_with_resolved_tag<C, P>(
        db: &C,
        user_id: i64,
        data: &CreatePost,
        picker: &mut P,
    ) -> Result<(Self, Option<ResolutionPath>), PostError>
    where
        C: ConnectionTrait,
        P: TagPicker,
    {
        if data.tag_id.is_some() {
            return Ok((Self::create(db, user_id, data).await?, None));
        }

        let tags = Tag::find_all(db).await?;
        let resolution = match tag_resolution::resolve(data.status, &tags, picker) {
            Ok(resolution) => Some(resolution),
            Err(TagResolutionError::NoTags) => {
                tracing::warn!("No tags exist; creating post without a tag");
                None
            }
            Err(TagResolutionError::Database(err)) => return Err(err.into()),
        };

        let mut data = data.clone();
        data.tag_id = resolution.as_ref().map(|resolution| resolution.tag.id);
        let post = Self::create(db, user_id, &data).await?;
        Ok((post, resolution.map(|resolution| resolution.path)))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
        data: &UpdatePost,
    ) -> Result<Self, PostError> {
        let record = post::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Post")?;

        if let Some(title) = &data.title {
            validate_text("Title", title, TITLE_MAX).map_err(PostError::Validation)?;
        }
        if let Some(content) = &data.content {
            validate_text("Content", content, CONTENT_MAX).map_err(PostError::Validation)?;
        }
        validate_optional_text("Image", data.image.as_deref(), IMAGE_MAX)
            .map_err(PostError::Validation)?;
        validate_coordinate("Latitude", data.latitude.flatten(), 90.0)?;
        validate_coordinate("Longitude", data.longitude.flatten(), 180.0)?;
        if let Some(Some(tag_id)) = data.tag_id {
            ensure_tag_exists(db, tag_id).await?;
        }

        let mut active: post::ActiveModel = record.into();
        if let Some(title) = data.title.clone() {
            active.title = Set(title);
        }
        if let Some(content) = data.content.clone() {
            active.content = Set(content);
        }
        if let Some(status) = data.status {
            active.status = Set(status);
        }
        if let Some(tag_id) = data.tag_id {
            active.tag_id = Set(tag_id);
        }
        if let Some(image) = data.image.clone() {
            active.image = Set(Some(image));
        }
        if let Some(latitude) = data.latitude {
            active.latitude = Set(latitude);
        }
        if let Some(longitude) = data.longitude {
            active.longitude = Set(longitude);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from(updated))
    }

    /// Deletes an owned post with its reviews and favorites, returning the
    /// removed post so callers can clean up its image.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
    ) -> Result<Self, PostError> {
        let record = post::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Post")?;
        Self::delete_with_dependents(db, vec![record.id]).await?;
        Ok(Self::from(record))
    }

    pub(crate) async fn delete_with_dependents<C: ConnectionTrait>(
        db: &C,
        post_ids: Vec<i64>,
    ) -> Result<u64, DbErr> {
        if post_ids.is_empty() {
            return Ok(0);
        }
        review::Entity::delete_many()
            .filter(review::Column::PostId.is_in(post_ids.clone()))
            .exec(db)
            .await?;
        favorite::Entity::delete_many()
            .filter(favorite::Column::PostId.is_in(post_ids.clone()))
            .exec(db)
            .await?;
        let result = post::Entity::delete_many()
            .filter(post::Column::Id.is_in(post_ids))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
