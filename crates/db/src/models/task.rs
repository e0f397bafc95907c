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
    entities::{comment, tag, task},
    policy::{self, AccessError, Mismatch},
    types::PostStatus,
};

const TITLE_MAX: usize = 100;
const CONTENT_MAX: usize = 1000;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Tag {0} not found")]
    UnknownTag(i64),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub user_id: i64,
    pub tag_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateTask {
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub tag_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    pub tag_id: Option<i64>,
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            content: model.content,
            status: model.status,
            user_id: model.user_id,
            tag_id: model.tag_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

async fn ensure_tag_exists<C: ConnectionTrait>(db: &C, tag_id: i64) -> Result<(), TaskError> {
    if tag::Entity::find_by_id(tag_id).one(db).await?.is_none() {
        return Err(TaskError::UnknownTag(tag_id));
    }
    Ok(())
}

impl Task {
    pub async fn find_by_user<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from).collect())
    }

    pub async fn find_owned<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
    ) -> Result<Self, TaskError> {
        let record = task::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Task")?;
        Ok(Self::from(record))
    }

    pub async fn exists<C: ConnectionTrait>(db: &C, id: i64) -> Result<bool, DbErr> {
        Ok(task::Entity::find_by_id(id).one(db).await?.is_some())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        data: &CreateTask,
    ) -> Result<Self, TaskError> {
        validate_text("Title", &data.title, TITLE_MAX).map_err(TaskError::Validation)?;
        validate_text("Content", &data.content, CONTENT_MAX).map_err(TaskError::Validation)?;
        ensure_tag_exists(db, data.tag_id).await?;

        let now = Utc::now();
        let active = task::ActiveModel {
            title: Set(data.title.clone()),
            content: Set(data.content.clone()),
            status: Set(data.status),
            user_id: Set(user_id),
            tag_id: Set(data.tag_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
        data: &UpdateTask,
    ) -> Result<Self, TaskError> {
        let record = task::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Task")?;

        if let Some(title) = &data.title {
            validate_text("Title", title, TITLE_MAX).map_err(TaskError::Validation)?;
        }
        if let Some(content) = &data.content {
            validate_text("Content", content, CONTENT_MAX).map_err(TaskError::Validation)?;
        }
        if let Some(tag_id) = data.tag_id {
            ensure_tag_exists(db, tag_id).await?;
        }

        let mut active: task::ActiveModel = record.into();
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
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from(updated))
    }

    /// Deletes an owned task and its comments.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        id: i64,
        principal: i64,
    ) -> Result<u64, TaskError> {
        let record = task::Entity::find_by_id(id).one(db).await?;
        let record = policy::authorize(record, principal, Mismatch::Conceal, "Task")?;
        Ok(Self::delete_with_dependents(db, vec![record.id]).await?)
    }

    pub(crate) async fn delete_with_dependents<C: ConnectionTrait>(
        db: &C,
        task_ids: Vec<i64>,
    ) -> Result<u64, DbErr> {
        if task_ids.is_empty() {
            return Ok(0);
        }
        comment::Entity::delete_many()
            .filter(comment::Column::TaskId.is_in(task_ids.clone()))
            .exec(db)
            .await?;
        let result = task::Entity::delete_many()
            .filter(task::Column::Id.is_in(task_ids))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        tag::{CreateTag, Tag, TagError},
        test_db::setup_db,
        user::{NewUser, User},
    };

    async fn fixture() -> (sea_orm::DatabaseConnection, User, User, Tag) {
        let db = setup_db().await;
        let ana = User::create(
            &db,
            &NewUser {
                username: "ana".to_string(),
                email: "ana@example.com".to_string(),
                password_hash: "hash".to_string(),
            },
        )
        .await
        .unwrap();
        let bea = User::create(
            &db,
            &NewUser {
                username: "bea".to_string(),
                email: "bea@example.com".to_string(),
                password_hash: "hash".to_string(),
            },
        )
        .await
        .unwrap();
        let farm = Tag::create(
            &db,
            &CreateTag {
                name: "Farm".to_string(),
            },
        )
        .await
        .unwrap();
        (db, ana, bea, farm)
    }

    fn new_task(tag_id: i64) -> CreateTask {
        CreateTask {
            title: "Fence".to_string(),
            content: "Repair the north fence".to_string(),
            status: PostStatus::Rural,
            tag_id,
        }
    }

    #[tokio::test]
    async fn create_requires_existing_tag() {
        let (db, ana, _bea, _farm) = fixture().await;
        let err = Task::create(&db, ana.id, &new_task(404)).await.unwrap_err();
        assert!(matches!(err, TaskError::UnknownTag(404)));
    }

    #[tokio::test]
    async fn tasks_are_private_to_owner() {
        let (db, ana, bea, farm) = fixture().await;
        let task = Task::create(&db, ana.id, &new_task(farm.id)).await.unwrap();

        assert_eq!(Task::find_owned(&db, task.id, ana.id).await.unwrap().id, task.id);
        let err = Task::find_owned(&db, task.id, bea.id).await.unwrap_err();
        assert!(matches!(err, TaskError::Access(AccessError::NotFound(_))));
        let err = Task::update(
            &db,
            task.id,
            bea.id,
            &UpdateTask {
                title: Some("Mine".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TaskError::Access(AccessError::NotFound(_))));
        assert!(Task::find_by_user(&db, bea.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tag_in_use_by_task_cannot_be_deleted() {
        let (db, ana, _bea, farm) = fixture().await;
        let task = Task::create(&db, ana.id, &new_task(farm.id)).await.unwrap();

        let err = Tag::delete(&db, farm.id).await.unwrap_err();
        assert!(matches!(err, TagError::InUse(1)));

        Task::delete(&db, task.id, ana.id).await.unwrap();
        assert_eq!(Tag::delete(&db, farm.id).await.unwrap(), 1);
    }
}
