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
    entities::{post, task, user},
    models::{post::Post, task::Task},
    policy,
};

const USERNAME_MAX: usize = 80;
const EMAIL_MAX: usize = 120;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("User not found")]
    NotFound,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Email already taken")]
    EmailTaken,
    #[error("Username or email already registered")]
    AlreadyRegistered,
    #[error("{0}")]
    Validation(String),
}

/// Public view of an account. The password hash never leaves this module
/// except through [`User::find_credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

fn validate_username(username: &str) -> Result<(), UserError> {
    validate_text("Username", username, USERNAME_MAX).map_err(UserError::Validation)
}

fn validate_email(email: &str) -> Result<(), UserError> {
    validate_text("Email", email, EMAIL_MAX).map_err(UserError::Validation)?;
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !domain.contains('@')
        });
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(UserError::Validation("Not a valid email address".to_string()));
    }
    Ok(())
}

impl User {
    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = user::Entity::find()
            .order_by_asc(user::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from))
    }

    /// Looks up an account by email along with its stored password hash.
    pub async fn find_credentials<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<(Self, String)>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(email.trim()))
            .one(db)
            .await?;
        Ok(record.map(|model| {
            let hash = model.password_hash.clone();
            (Self::from(model), hash)
        }))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &NewUser) -> Result<Self, UserError> {
        let username = data.username.trim();
        let email = data.email.trim();
        validate_username(username)?;
        validate_email(email)?;

        if policy::value_taken::<user::Entity, _>(
            db,
            user::Column::Username,
            username,
            user::Column::Id,
            None,
        )
        .await?
        {
            return Err(UserError::UsernameTaken);
        }
        if policy::value_taken::<user::Entity, _>(
            db,
            user::Column::Email,
            email,
            user::Column::Id,
            None,
        )
        .await?
        {
            return Err(UserError::EmailTaken);
        }

        let now = Utc::now();
        let active = user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(data.password_hash.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await.map_err(conflict_or_db)?;
        Ok(Self::from(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateUser,
    ) -> Result<Self, UserError> {
        let record = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(UserError::NotFound)?;

        let mut active: user::ActiveModel = record.clone().into();

        if let Some(username) = data.username.as_deref().map(str::trim) {
            validate_username(username)?;
            if username != record.username {
                if policy::value_taken::<user::Entity, _>(
                    db,
                    user::Column::Username,
                    username,
                    user::Column::Id,
                    Some(id),
                )
                .await?
                {
                    return Err(UserError::UsernameTaken);
                }
                active.username = Set(username.to_string());
            }
        }

        if let Some(email) = data.email.as_deref().map(str::trim) {
            validate_email(email)?;
            if email != record.email {
                if policy::value_taken::<user::Entity, _>(
                    db,
                    user::Column::Email,
                    email,
                    user::Column::Id,
                    Some(id),
                )
                .await?
                {
                    return Err(UserError::EmailTaken);
                }
                active.email = Set(email.to_string());
            }
        }

        if let Some(hash) = data.password_hash.clone() {
            active.password_hash = Set(hash);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await.map_err(conflict_or_db)?;
        Ok(Self::from(updated))
    }

    /// Removes the account and everything it owns.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, UserError> {
        if user::Entity::find_by_id(id).one(db).await?.is_none() {
            return Err(UserError::NotFound);
        }

        let post_ids = post::Entity::find()
            .filter(post::Column::UserId.eq(id))
            .all(db)
            .await?
            .into_iter()
            .map(|post| post.id)
            .collect::<Vec<_>>();
        Post::delete_with_dependents(db, post_ids).await?;

        let task_ids = task::Entity::find()
            .filter(task::Column::UserId.eq(id))
            .all(db)
            .await?
            .into_iter()
            .map(|task| task.id)
            .collect::<Vec<_>>();
        Task::delete_with_dependents(db, task_ids).await?;

        super::review::Review::delete_by_user(db, id).await?;
        super::favorite::Favorite::delete_by_user(db, id).await?;
        super::comment::Comment::delete_by_user(db, id).await?;

        let result = user::Entity::delete_by_id(id).exec(db).await?;
        tracing::info!(user_id = id, "Deleted user and owned records");
        Ok(result.rows_affected)
    }
}

fn conflict_or_db(err: DbErr) -> UserError {
    if policy::is_unique_violation(&err) {
        UserError::AlreadyRegistered
    } else {
        UserError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_db::setup_db;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
        }
    }

    #[tokio::test]
    async fn create_rejects_taken_username_and_email() {
        let db = setup_db().await;
        User::create(&db, &new_user("ana", "ana@example.com"))
            .await
            .unwrap();

        let err = User::create(&db, &new_user("ana", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::UsernameTaken));

        let err = User::create(&db, &new_user("bea", "ana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn create_validates_email_shape() {
        let db = setup_db().await;
        for email in ["plain", "a@b", "@example.com", "a b@example.com"] {
            let err = User::create(&db, &new_user("ana", email))
                .await
                .unwrap_err();
            assert!(matches!(err, UserError::Validation(_)), "accepted {email}");
        }
    }

    #[tokio::test]
    async fn update_checks_uniqueness_against_other_users_only() {
        let db = setup_db().await;
        let ana = User::create(&db, &new_user("ana", "ana@example.com"))
            .await
            .unwrap();
        User::create(&db, &new_user("bea", "bea@example.com"))
            .await
            .unwrap();

        let unchanged = User::update(
            &db,
            ana.id,
            &UpdateUser {
                username: Some("ana".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(unchanged.username, "ana");

        let err = User::update(
            &db,
            ana.id,
            &UpdateUser {
                email: Some("bea@example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));

        let renamed = User::update(
            &db,
            ana.id,
            &UpdateUser {
                username: Some("ana2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.username, "ana2");
    }

    #[tokio::test]
    async fn credentials_lookup_returns_hash() {
        let db = setup_db().await;
        User::create(&db, &new_user("ana", "ana@example.com"))
            .await
            .unwrap();

        let (user, hash) = User::find_credentials(&db, "ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(hash, "$argon2id$stub");
        assert!(
            User::find_credentials(&db, "nobody@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_missing_user_is_not_found() {
        let db = setup_db().await;
        assert!(matches!(
            User::delete(&db, 9).await.unwrap_err(),
            UserError::NotFound
        ));
    }
}
