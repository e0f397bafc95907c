use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::validate_text;
use crate::{
    entities::{post, tag, task},
    policy,
};

const NAME_MAX: usize = 50;

#[derive(Debug, Error)]
pub enum TagError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Tag not found")]
    NotFound,
    #[error("Tag '{0}' already exists")]
    Duplicate(String),
    #[error("Tag is still assigned to {0} task(s)")]
    InUse(u64),
    #[error("No tag ids provided")]
    EmptySelection,
    #[error("No tags found with the provided ids")]
    NoneMatched,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateTag {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct UpdateTag {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct BulkDeleteTags {
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct BulkDeleteResult {
    pub deleted_count: u64,
}

impl From<tag::Model> for Tag {
    fn from(model: tag::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl Tag {
    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = tag::Entity::find()
            .order_by_asc(tag::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = tag::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from))
    }

    pub async fn find_by_name<C: ConnectionTrait>(
        db: &C,
        name: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = tag::Entity::find()
            .filter(tag::Column::Name.eq(name))
            .one(db)
            .await?;
        Ok(record.map(Self::from))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateTag) -> Result<Self, TagError> {
        let name = data.name.trim();
        validate_text("Tag name", name, NAME_MAX).map_err(TagError::Validation)?;
        if policy::value_taken::<tag::Entity, _>(db, tag::Column::Name, name, tag::Column::Id, None)
            .await?
        {
            return Err(TagError::Duplicate(name.to_string()));
        }

        let now = Utc::now();
        let active = tag::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active
            .insert(db)
            .await
            .map_err(|err| duplicate_or_db(err, name))?;
        Ok(Self::from(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateTag,
    ) -> Result<Self, TagError> {
        let name = data.name.trim();
        validate_text("Tag name", name, NAME_MAX).map_err(TagError::Validation)?;

        let record = tag::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(TagError::NotFound)?;

        if policy::value_taken::<tag::Entity, _>(
            db,
            tag::Column::Name,
            name,
            tag::Column::Id,
            Some(id),
        )
        .await?
        {
            return Err(TagError::Duplicate(name.to_string()));
        }

        let mut active: tag::ActiveModel = record.into();
        active.name = Set(name.to_string());
        active.updated_at = Set(Utc::now().into());

        let updated = active
            .update(db)
            .await
            .map_err(|err| duplicate_or_db(err, name))?;
        Ok(Self::from(updated))
    }

    /// Deletes one tag. Posts carrying it become untagged.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, TagError> {
        if tag::Entity::find_by_id(id).one(db).await?.is_none() {
            return Err(TagError::NotFound);
        }
        Self::delete_existing(db, vec![id]).await
    }

    /// Deletes every listed tag that exists and reports how many were removed.
    /// Unknown ids are ignored as long as at least one id matches.
    pub async fn bulk_delete<C: ConnectionTrait>(
        db: &C,
        data: &BulkDeleteTags,
    ) -> Result<BulkDeleteResult, TagError> {
        let requested: BTreeSet<i64> = data.tag_ids.iter().copied().collect();
        if requested.is_empty() {
            return Err(TagError::EmptySelection);
        }

        let existing: Vec<i64> = tag::Entity::find()
            .select_only()
            .column(tag::Column::Id)
            .filter(tag::Column::Id.is_in(requested.iter().copied()))
            .into_tuple()
            .all(db)
            .await?;
        if existing.is_empty() {
            return Err(TagError::NoneMatched);
        }

        let deleted_count = Self::delete_existing(db, existing).await?;
        tracing::info!(
            requested = requested.len(),
            deleted_count,
            "Bulk deleted tags"
        );
        Ok(BulkDeleteResult { deleted_count })
    }

    /// Inserts `names` when the tag table is empty. Returns the tags created.
    pub async fn seed_defaults<C: ConnectionTrait>(
        db: &C,
        names: &[&str],
    ) -> Result<Vec<Self>, TagError> {
        if tag::Entity::find().count(db).await? > 0 {
            return Ok(Vec::new());
        }
        let mut created = Vec::with_capacity(names.len());
        for name in names {
            created.push(
                Self::create(
                    db,
                    &CreateTag {
                        name: (*name).to_string(),
                    },
                )
                .await?,
            );
        }
        Ok(created)
    }

    async fn delete_existing<C: ConnectionTrait>(db: &C, ids: Vec<i64>) -> Result<u64, TagError> {
        let referencing_tasks: Vec<i64> = task::Entity::find()
            .select_only()
            .column(task::Column::Id)
            .filter(task::Column::TagId.is_in(ids.clone()))
            .into_tuple()
            .all(db)
            .await?;
        if !referencing_tasks.is_empty() {
            return Err(TagError::InUse(referencing_tasks.len() as u64));
        }

        post::Entity::update_many()
            .col_expr(post::Column::TagId, Expr::value(Option::<i64>::None))
            .filter(post::Column::TagId.is_in(ids.clone()))
            .exec(db)
            .await?;

        let result = tag::Entity::delete_many()
            .filter(tag::Column::Id.is_in(ids))
            .exec(db)
            .await
            .map_err(|err| {
                if policy::is_foreign_key_violation(&err) {
                    TagError::InUse(0)
                } else {
                    TagError::Database(err)
                }
            })?;
        Ok(result.rows_affected)
    }
}

fn duplicate_or_db(err: DbErr, name: &str) -> TagError {
    if policy::is_unique_violation(&err) {
        TagError::Duplicate(name.to_string())
    } else {
        TagError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            post::{CreatePost, Post},
            test_db::setup_db,
            user::{NewUser, User},
        },
        types::PostStatus,
    };

    async fn create_tag(db: &sea_orm::DatabaseConnection, name: &str) -> Tag {
        Tag::create(
            db,
            &CreateTag {
                name: name.to_string(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let db = setup_db().await;
        create_tag(&db, "Beach").await;

        let err = Tag::create(
            &db,
            &CreateTag {
                name: "Beach".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TagError::Duplicate(name) if name == "Beach"));
    }

    #[tokio::test]
    async fn update_allows_keeping_own_name_but_not_anothers() {
        let db = setup_db().await;
        let beach = create_tag(&db, "Beach").await;
        create_tag(&db, "Lake").await;

        let same = Tag::update(
            &db,
            beach.id,
            &UpdateTag {
                name: "Beach".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(same.name, "Beach");

        let err = Tag::update(
            &db,
            beach.id,
            &UpdateTag {
                name: "Lake".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TagError::Duplicate(_)));
    }

    #[tokio::test]
    async fn rejects_blank_and_long_names() {
        let db = setup_db().await;
        let blank = Tag::create(
            &db,
            &CreateTag {
                name: "  ".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(blank, TagError::Validation(_)));

        let long = Tag::create(
            &db,
            &CreateTag {
                name: "x".repeat(51),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(long, TagError::Validation(_)));
    }

    #[tokio::test]
    async fn seed_defaults_only_fills_empty_table() {
        let db = setup_db().await;
        let created = Tag::seed_defaults(&db, &["Beach", "City"]).await.unwrap();
        assert_eq!(created.len(), 2);

        let again = Tag::seed_defaults(&db, &["Forest"]).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(Tag::find_all(&db).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bulk_delete_counts_only_existing_ids() {
        let db = setup_db().await;
        create_tag(&db, "Beach").await;
        let lake = create_tag(&db, "Lake").await;
        create_tag(&db, "River").await;

        let result = Tag::bulk_delete(
            &db,
            &BulkDeleteTags {
                tag_ids: vec![lake.id, 999, 1000],
            },
        )
        .await
        .unwrap();
        assert_eq!(result.deleted_count, 1);
        assert_eq!(Tag::find_all(&db).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bulk_delete_requires_ids_and_a_match() {
        let db = setup_db().await;
        create_tag(&db, "Beach").await;

        let empty = Tag::bulk_delete(&db, &BulkDeleteTags { tag_ids: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(empty, TagError::EmptySelection));

        let none = Tag::bulk_delete(
            &db,
            &BulkDeleteTags {
                tag_ids: vec![404, 405],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(none, TagError::NoneMatched));
        assert_eq!(Tag::find_all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_tag_untags_posts() {
        let db = setup_db().await;
        let user = User::create(
            &db,
            &NewUser {
                username: "ana".to_string(),
                email: "ana@example.com".to_string(),
                password_hash: "hash".to_string(),
            },
        )
        .await
        .unwrap();
        let beach = create_tag(&db, "Beach").await;
        let post = Post::create(
            &db,
            user.id,
            &CreatePost {
                title: "Shore".to_string(),
                content: "Waves".to_string(),
                status: PostStatus::Natura,
                tag_id: Some(beach.id),
                image: None,
                latitude: None,
                longitude: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(post.tag_id, Some(beach.id));

        Tag::delete(&db, beach.id).await.unwrap();

        let reloaded = Post::find_by_id(&db, post.id).await.unwrap().unwrap();
        assert_eq!(reloaded.tag_id, None);
        assert!(Tag::find_by_id(&db, beach.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_tag_is_not_found() {
        let db = setup_db().await;
        let err = Tag::delete(&db, 42).await.unwrap_err();
        assert!(matches!(err, TagError::NotFound));
    }
}
