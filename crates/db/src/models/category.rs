use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::{validate_optional_text, validate_text};
use crate::{entities::category, policy};

const NAME_MAX: usize = 50;
const DESCRIPTION_MAX: usize = 200;
pub const DEFAULT_COLOR: &str = "#3B82F6";

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Category not found")]
    NotFound,
    #[error("Category with this name already exists")]
    Duplicate,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl From<category::Model> for Category {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            color: model.color,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

fn validate_color(color: &str) -> Result<(), CategoryError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|ch| ch.is_ascii_hexdigit());
    if !valid {
        return Err(CategoryError::Validation(
            "Color must be a valid hex color code (e.g., #3B82F6)".to_string(),
        ));
    }
    Ok(())
}

impl Category {
    /// Newest first.
    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = category::Entity::find()
            .order_by_desc(category::Column::CreatedAt)
            .order_by_desc(category::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = category::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateCategory,
    ) -> Result<Self, CategoryError> {
        let name = data.name.trim();
        validate_text("Category name", name, NAME_MAX).map_err(CategoryError::Validation)?;
        validate_optional_text("Description", data.description.as_deref(), DESCRIPTION_MAX)
            .map_err(CategoryError::Validation)?;
        let color = match data.color.as_deref().filter(|color| !color.is_empty()) {
            Some(color) => {
                validate_color(color)?;
                color.to_string()
            }
            None => DEFAULT_COLOR.to_string(),
        };
        if policy::value_taken::<category::Entity, _>(
            db,
            category::Column::Name,
            name,
            category::Column::Id,
            None,
        )
        .await?
        {
            return Err(CategoryError::Duplicate);
        }

        let now = Utc::now();
        let active = category::ActiveModel {
            name: Set(name.to_string()),
            description: Set(data.description.clone()),
            color: Set(color),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await.map_err(duplicate_or_db)?;
        Ok(Self::from(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateCategory,
    ) -> Result<Self, CategoryError> {
        let record = category::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(CategoryError::NotFound)?;

        let name = data.name.as_deref().map(str::trim);
        if let Some(name) = name {
            validate_text("Category name", name, NAME_MAX).map_err(CategoryError::Validation)?;
        }
        validate_optional_text("Description", data.description.as_deref(), DESCRIPTION_MAX)
            .map_err(CategoryError::Validation)?;
        let color = data.color.as_deref().filter(|color| !color.is_empty());
        if let Some(color) = color {
            validate_color(color)?;
        }

        let mut active: category::ActiveModel = record.clone().into();
        if let Some(name) = name {
            if name != record.name
                && policy::value_taken::<category::Entity, _>(
                    db,
                    category::Column::Name,
                    name,
                    category::Column::Id,
                    Some(id),
                )
                .await?
            {
                return Err(CategoryError::Duplicate);
            }
            active.name = Set(name.to_string());
        }
        if let Some(description) = data.description.clone() {
            active.description = Set(Some(description).filter(|text| !text.is_empty()));
        }
        if let Some(color) = color {
            active.color = Set(color.to_string());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await.map_err(duplicate_or_db)?;
        Ok(Self::from(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, CategoryError> {
        let result = category::Entity::delete_by_id(id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(CategoryError::NotFound);
        }
        Ok(result.rows_affected)
    }
}

fn duplicate_or_db(err: DbErr) -> CategoryError {
    if policy::is_unique_violation(&err) {
        CategoryError::Duplicate
    } else {
        CategoryError::Database(err)
    }
}
