use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::validate_optional_text;
use crate::{
    entities::{favorite, post},
    models::post::{Post, PostWithAuthor},
    policy::{self, AccessError, Mismatch},
};

const NOTES_MAX: usize = 500;

#[derive(Debug, Error)]
pub enum FavoriteError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Post not found")]
    PostNotFound,
    #[error("Post already in favorites")]
    AlreadyFavorited,
    #[error("Favorite not found")]
    NotFavorited,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Favorite {
    pub id: i64,
    pub notes: Option<String>,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A favorite joined with the post it points at.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct FavoriteWithPost {
    #[serde(flatten)]
    #[ts(flatten)]
    pub favorite: Favorite,
    pub post: PostWithAuthor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct FavoriteStatus {
    pub favorited: bool,
    pub favorite: Option<Favorite>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateFavorite {
    pub post_id: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct UpdateFavorite {
    pub notes: Option<String>,
}

impl From<favorite::Model> for Favorite {
    fn from(model: favorite::Model) -> Self {
        Self {
            id: model.id,
            notes: model.notes,
            user_id: model.user_id,
            post_id: model.post_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

fn validate_notes(notes: Option<&str>) -> Result<(), FavoriteError> {
    validate_optional_text("Notes", notes, NOTES_MAX).map_err(FavoriteError::Validation)
}

impl Favorite {
    /// The caller's favorites, newest first, each with its post projection.
    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<Vec<FavoriteWithPost>, DbErr> {
        let records = favorite::Entity::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .order_by_desc(favorite::Column::CreatedAt)
            .order_by_desc(favorite::Column::Id)
            .all(db)
            .await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i64> = records.iter().map(|record| record.post_id).collect();
        let posts = post::Entity::find()
            .filter(post::Column::Id.is_in(post_ids))
            .all(db)
            .await?;
        let posts: HashMap<i64, PostWithAuthor> = Post::with_authors(db, posts)
            .await?
            .into_iter()
            .map(|projected| (projected.post.id, projected))
            .collect();

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let post = posts.get(&record.post_id)?.clone();
                Some(FavoriteWithPost {
                    favorite: Self::from(record),
                    post,
                })
            })
            .collect())
    }

    pub async fn status_for_post<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        post_id: i64,
    ) -> Result<FavoriteStatus, DbErr> {
        let record = Self::find_record(db, user_id, post_id).await?;
        Ok(FavoriteStatus {
            favorited: record.is_some(),
            favorite: record.map(Self::from),
        })
    }

    async fn find_record<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        post_id: i64,
    ) -> Result<Option<favorite::Model>, DbErr> {
        favorite::Entity::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::PostId.eq(post_id))
            .one(db)
            .await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        data: &CreateFavorite,
    ) -> Result<Self, FavoriteError> {
        validate_notes(data.notes.as_deref())?;
        if post::Entity::find_by_id(data.post_id).one(db).await?.is_none() {
            return Err(FavoriteError::PostNotFound);
        }
        if Self::find_record(db, user_id, data.post_id).await?.is_some() {
            return Err(FavoriteError::AlreadyFavorited);
        }
        Self::insert(db, user_id, data).await
    }

    /// The unique (user, post) index rejects a duplicate that raced past the
    /// lookup in `create`.
    async fn insert<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        data: &CreateFavorite,
    ) -> Result<Self, FavoriteError> {
        let now = Utc::now();
        let active = favorite::ActiveModel {
            notes: Set(data.notes.clone()),
            user_id: Set(user_id),
            post_id: Set(data.post_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await.map_err(|err| {
            if policy::is_unique_violation(&err) {
                FavoriteError::AlreadyFavorited
            } else {
                FavoriteError::Database(err)
            }
        })?;
        Ok(Self::from(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
        data: &UpdateFavorite,
    ) -> Result<Self, FavoriteError> {
        let record = favorite::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Favorite")?;
        validate_notes(data.notes.as_deref())?;

        let mut active: favorite::ActiveModel = record.into();
        active.notes = Set(data.notes.clone());
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from(updated))
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
    ) -> Result<u64, FavoriteError> {
        let record = favorite::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Favorite")?;
        let result = favorite::Entity::delete_by_id(record.id).exec(db).await?;
        Ok(result.rows_affected)
    }

    /// Removes the caller's favorite of `post_id`.
    pub async fn delete_by_post<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        post_id: i64,
    ) -> Result<u64, FavoriteError> {
        let record = Self::find_record(db, user_id, post_id)
            .await?
            .ok_or(FavoriteError::NotFavorited)?;
        let result = favorite::Entity::delete_by_id(record.id).exec(db).await?;
        Ok(result.rows_affected)
    }

    pub(crate) async fn delete_by_user<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<u64, DbErr> {
        let result = favorite::Entity::delete_many()
            .filter(favorite::Column::UserId.eq(user_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
