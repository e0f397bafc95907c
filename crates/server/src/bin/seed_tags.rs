//! Creates the default tag set on a fresh database.

use anyhow::Context;
use db::{DBService, TransactionTrait, models::tag::Tag, tag_resolution::DEFAULT_TAGS};
use server::startup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    startup::init_tracing();

    let config = startup::load_config().context("failed to load config")?;
    let db = DBService::new(&config.database_url)
        .await
        .context("failed to open database")?;

    let tx = db.pool.begin().await?;
    let created = Tag::seed_defaults(&tx, DEFAULT_TAGS).await?;
    tx.commit().await?;

    if created.is_empty() {
        println!("Tags already exist; nothing to seed");
    } else {
        for tag in &created {
            println!("Created tag {} \"{}\"", tag.id, tag.name);
        }
        println!("Seeded {} tags", created.len());
    }
    Ok(())
}
