//! Ownership and uniqueness rules shared by every model.
//!
//! Uniqueness is checked up front so callers get a readable conflict, but the
//! unique indexes in the schema remain the real guard: a racing insert that
//! slips past the pre-check surfaces through [`is_unique_violation`].

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, SqlErr};
use thiserror::Error;

use crate::entities::{comment, favorite, post, review, task};

/// Records that belong to exactly one user.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

impl Owned for post::Model {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

impl Owned for task::Model {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

impl Owned for comment::Model {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

impl Owned for review::Model {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

impl Owned for favorite::Model {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

/// How an owner mismatch is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// Indistinguishable from a missing record.
    Conceal,
    /// Reported as a permission failure.
    Reveal,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
}

/// Returns the record when `principal` owns it.
pub fn authorize<T: Owned>(
    record: Option<T>,
    principal: i64,
    mismatch: Mismatch,
    entity: &str,
) -> Result<T, AccessError> {
    match (record, mismatch) {
        (None, Mismatch::Conceal) => Err(concealed(entity)),
        (None, Mismatch::Reveal) => Err(AccessError::NotFound(format!("{entity} not found"))),
        (Some(record), _) if record.owner_id() == principal => Ok(record),
        (Some(_), Mismatch::Conceal) => Err(concealed(entity)),
        (Some(_), Mismatch::Reveal) => Err(AccessError::Forbidden(format!(
            "You can only modify your own {}s",
            entity.to_lowercase()
        ))),
    }
}

fn concealed(entity: &str) -> AccessError {
    AccessError::NotFound(format!(
        "{entity} not found or you don't have permission"
    ))
}

/// Whether another row already holds `value` in `column`. `exclude_id` skips
/// the row being updated.
pub async fn value_taken<E, C>(
    db: &C,
    column: E::Column,
    value: &str,
    primary_key: E::Column,
    exclude_id: Option<i64>,
) -> Result<bool, DbErr>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let mut query = E::find().filter(column.eq(value));
    if let Some(id) = exclude_id {
        query = query.filter(primary_key.ne(id));
    }
    Ok(query.one(db).await?.is_some())
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string();
    message.contains("UNIQUE constraint failed") || message.contains("duplicate key value")
}

pub fn is_foreign_key_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) {
        return true;
    }
    err.to_string().contains("FOREIGN KEY constraint failed")
}
