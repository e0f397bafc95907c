use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::validate_text;
use crate::{
    entities::{post, review, user},
    policy::{self, AccessError, Mismatch},
};

const COMMENT_MAX: usize = 500;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Post not found")]
    PostNotFound,
    #[error("You have already reviewed this post")]
    AlreadyReviewed,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Review {
    pub id: i64,
    pub rating: i32,
    pub comment: String,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    #[ts(flatten)]
    pub review: Review,
    pub username: String,
}

/// Reviews of one post together with its rating summary.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct PostReviews {
    pub reviews: Vec<ReviewWithAuthor>,
    pub average_rating: f64,
    pub total_reviews: u64,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateReview {
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct UpdateReview {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

impl From<review::Model> for Review {
    fn from(model: review::Model) -> Self {
        Self {
            id: model.id,
            rating: model.rating,
            comment: model.comment,
            user_id: model.user_id,
            post_id: model.post_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

/// Mean rating rounded to one decimal, or 0 when there are no ratings.
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|rating| i64::from(*rating)).sum();
    let mean = sum as f64 / ratings.len() as f64;
    (mean * 10.0).round_ties_even() / 10.0
}

fn validate_rating(rating: i32) -> Result<(), ReviewError> {
    if !(1..=5).contains(&rating) {
        return Err(ReviewError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

impl Review {
    /// All reviews of a post, newest first, with the rating summary.
    pub async fn find_for_post<C: ConnectionTrait>(
        db: &C,
        post_id: i64,
    ) -> Result<PostReviews, ReviewError> {
        if post::Entity::find_by_id(post_id).one(db).await?.is_none() {
            return Err(ReviewError::PostNotFound);
        }

        let records = review::Entity::find()
            .filter(review::Column::PostId.eq(post_id))
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id)
            .all(db)
            .await?;
        let ratings: Vec<i32> = records.iter().map(|record| record.rating).collect();
        let reviews = Self::with_authors(db, records).await?;

        Ok(PostReviews {
            average_rating: average_rating(&ratings),
            total_reviews: reviews.len() as u64,
            reviews,
        })
    }

    /// Rating summary only: `(average, count)`.
    pub async fn rating_summary<C: ConnectionTrait>(
        db: &C,
        post_id: i64,
    ) -> Result<(f64, u64), DbErr> {
        let ratings: Vec<i32> = review::Entity::find()
            .select_only()
            .column(review::Column::Rating)
            .filter(review::Column::PostId.eq(post_id))
            .into_tuple()
            .all(db)
            .await?;
        Ok((average_rating(&ratings), ratings.len() as u64))
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<ReviewWithAuthor>, DbErr> {
        let Some(record) = review::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        Ok(Self::with_authors(db, vec![record]).await?.into_iter().next())
    }

    async fn with_authors<C: ConnectionTrait>(
        db: &C,
        records: Vec<review::Model>,
    ) -> Result<Vec<ReviewWithAuthor>, DbErr> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let user_ids: Vec<i64> = records.iter().map(|record| record.user_id).collect();
        let usernames: HashMap<i64, String> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|user| (user.id, user.username))
            .collect();

        Ok(records
            .into_iter()
            .map(|record| ReviewWithAuthor {
                username: usernames.get(&record.user_id).cloned().unwrap_or_default(),
                review: Self::from(record),
            })
            .collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        post_id: i64,
        data: &CreateReview,
    ) -> Result<Self, ReviewError> {
        validate_rating(data.rating)?;
        validate_text("Comment", &data.comment, COMMENT_MAX).map_err(ReviewError::Validation)?;

        if post::Entity::find_by_id(post_id).one(db).await?.is_none() {
            return Err(ReviewError::PostNotFound);
        }
        let existing = review::Entity::find()
            .filter(review::Column::UserId.eq(user_id))
            .filter(review::Column::PostId.eq(post_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ReviewError::AlreadyReviewed);
        }
        Self::insert(db, user_id, post_id, data).await
    }

    /// The unique (user, post) index rejects a duplicate that raced past the
    /// lookup in `create`.
    async fn insert<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        post_id: i64,
        data: &CreateReview,
    ) -> Result<Self, ReviewError> {
        let now = Utc::now();
        let active = review::ActiveModel {
            rating: Set(data.rating),
            comment: Set(data.comment.clone()),
            user_id: Set(user_id),
            post_id: Set(post_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await.map_err(|err| {
            if policy::is_unique_violation(&err) {
                ReviewError::AlreadyReviewed
            } else {
                ReviewError::Database(err)
            }
        })?;
        Ok(Self::from(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
        data: &UpdateReview,
    ) -> Result<Self, ReviewError> {
        let record = review::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Review")?;

        if let Some(rating) = data.rating {
            validate_rating(rating)?;
        }
        if let Some(comment) = &data.comment {
            validate_text("Comment", comment, COMMENT_MAX).map_err(ReviewError::Validation)?;
        }

        let mut active: review::ActiveModel = record.into();
        if let Some(rating) = data.rating {
            active.rating = Set(rating);
        }
        if let Some(comment) = data.comment.clone() {
            active.comment = Set(comment);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from(updated))
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
    ) -> Result<u64, ReviewError> {
        let record = review::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Review")?;
        let result = review::Entity::delete_by_id(record.id).exec(db).await?;
        Ok(result.rows_affected)
    }

    pub(crate) async fn delete_by_user<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<u64, DbErr> {
        let result = review::Entity::delete_many()
            .filter(review::Column::UserId.eq(user_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
