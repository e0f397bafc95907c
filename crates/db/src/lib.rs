use db_migration::Migrator;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

pub use sea_orm::{DatabaseConnection as DbPool, DbErr, TransactionTrait};

pub mod entities;
pub mod models;
pub mod policy;
pub mod tag_resolution;
pub mod types;

#[derive(Clone)]
pub struct DBService {
    pub pool: DbPool,
}

impl DBService {
    /// Connects to `database_url` and brings the schema up to date.
    pub async fn new(database_url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options.sqlx_logging(false);
        let pool = Database::connect(options).await?;
        Migrator::up(&pool, None).await?;
        tracing::info!("Database ready at {}", redact_url(database_url));
        Ok(DBService { pool })
    }

    pub fn from_pool(pool: DbPool) -> DBService {
        DBService { pool }
    }
}

fn redact_url(url: &str) -> String {
    match url.split_once('@') {
        Some((scheme_and_credentials, host)) => {
            let scheme = scheme_and_credentials
                .split_once("://")
                .map(|(scheme, _)| scheme)
                .unwrap_or("db");
            format!("{scheme}://***@{host}")
        }
        None => url.to_string(),
    }
}
