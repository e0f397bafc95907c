use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::validate_text;
use crate::{
    entities::{comment, user},
    models::task::Task,
    policy::{self, AccessError, Mismatch},
};

const CONTENT_MAX: usize = 1000;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Task not found")]
    TaskNotFound,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub task_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    #[ts(flatten)]
    pub comment: Comment,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateComment {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct UpdateComment {
    pub content: String,
}

impl From<comment::Model> for Comment {
    fn from(model: comment::Model) -> Self {
        Self {
            id: model.id,
            content: model.content,
            user_id: model.user_id,
            task_id: model.task_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

fn validate_content(content: &str) -> Result<(), CommentError> {
    validate_text("Comment", content, CONTENT_MAX).map_err(CommentError::Validation)
}

impl Comment {
    /// Comments on a task in the order they were written.
    pub async fn find_for_task<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
    ) -> Result<Vec<CommentWithAuthor>, CommentError> {
        if !Task::exists(db, task_id).await? {
            return Err(CommentError::TaskNotFound);
        }
        let records = comment::Entity::find()
            .filter(comment::Column::TaskId.eq(task_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(db)
            .await?;
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
            .map(|record| CommentWithAuthor {
                username: usernames.get(&record.user_id).cloned().unwrap_or_default(),
                comment: Self::from(record),
            })
            .collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        task_id: i64,
        data: &CreateComment,
    ) -> Result<Self, CommentError> {
        validate_content(&data.content)?;
        if !Task::exists(db, task_id).await? {
            return Err(CommentError::TaskNotFound);
        }

        let now = Utc::now();
        let active = comment::ActiveModel {
            content: Set(data.content.clone()),
            user_id: Set(user_id),
            task_id: Set(task_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from(model))
    }

    /// Only the author may edit; anyone else gets a permission error.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
        data: &UpdateComment,
    ) -> Result<Self, CommentError> {
        let record = comment::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Reveal, "Comment")?;
        validate_content(&data.content)?;

        let mut active: comment::ActiveModel = record.into();
        active.content = Set(data.content.clone());
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from(updated))
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
    ) -> Result<u64, CommentError> {
        let record = comment::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Reveal, "Comment")?;
        let result = comment::Entity::delete_by_id(record.id).exec(db).await?;
        Ok(result.rows_affected)
    }

    pub(crate) async fn delete_by_user<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<u64, DbErr> {
        let result = comment::Entity::delete_many()
            .filter(comment::Column::UserId.eq(user_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
