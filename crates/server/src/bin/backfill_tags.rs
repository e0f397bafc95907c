//! Assigns a tag to every post that has none, then reports what changed.

use anyhow::{Context, bail};
use db::{
    DBService, TransactionTrait,
    tag_resolution::{RandomPicker, TagResolutionError, backfill_untagged_posts},
};
use server::startup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    startup::init_tracing();

    let config = startup::load_config().context("failed to load config")?;
    let db = DBService::new(&config.database_url)
        .await
        .context("failed to open database")?;

    let tx = db.pool.begin().await?;
    let report = match backfill_untagged_posts(&tx, &mut RandomPicker::from_entropy()).await {
        Ok(report) => report,
        Err(TagResolutionError::NoTags) => {
            tx.rollback().await?;
            bail!("no tags exist; run seed_tags or create tags first");
        }
        Err(err) => {
            tx.rollback().await?;
            return Err(err.into());
        }
    };

    for assignment in &report.assignments {
        println!(
            "post {} \"{}\" ({}) -> tag {} \"{}\" [{:?}]",
            assignment.post_id,
            assignment.post_title,
            assignment.status,
            assignment.tag_id,
            assignment.tag_name,
            assignment.path,
        );
    }

    if !report.is_complete() {
        tx.rollback().await?;
        bail!(
            "{} posts still have no tag; nothing was saved",
            report.remaining_untagged
        );
    }
    tx.commit().await?;

    println!(
        "Tagged {} posts ({} themed, {} fallback); {} posts total, none untagged",
        report.assignments.len(),
        report.themed,
        report.fallback,
        report.total_posts,
    );
    Ok(())
}
