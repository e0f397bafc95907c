//! Picks a tag for a post from its status.
//!
//! Each status has an ordered list of themed tag names. Resolution narrows the
//! existing tags to that list; when none of the themed names exist it falls
//! back to every existing tag. The final choice is uniform over the candidate
//! set and comes from a [`TagPicker`] so callers control the randomness.

use rand::{Rng, SeedableRng, rngs::StdRng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use crate::{entities::post, models::tag::Tag, types::PostStatus};

const NATURA_TAGS: &[&str] = &[
    "River",
    "Mountain",
    "Beach",
    "Forest",
    "Lake",
    "Ocean",
    "Waterfall",
];
const URBAN_TAGS: &[&str] = &["City", "Street", "Building", "Park", "Mall", "Square"];
const RURAL_TAGS: &[&str] = &["Desert", "Village", "Farm", "Countryside", "Field", "Ranch"];

/// Tags created by the seeding utility when the tag table is empty.
pub const DEFAULT_TAGS: &[&str] = &[
    "Mountain", "Beach", "City", "Forest", "Desert", "Lake", "River", "Park",
];

pub fn themed_tag_names(status: PostStatus) -> &'static [&'static str] {
    match status {
        PostStatus::Natura => NATURA_TAGS,
        PostStatus::Urban => URBAN_TAGS,
        PostStatus::Rural => RURAL_TAGS,
    }
}

#[derive(Debug, Error)]
pub enum TagResolutionError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("No tags exist; create tags before assigning them")]
    NoTags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPath {
    Themed,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet<'a> {
    pub path: ResolutionPath,
    pub tags: Vec<&'a Tag>,
}

/// Candidate tags for `status` among `existing`.
///
/// Themed candidates keep the theme's order; fallback candidates are ordered
/// by name.
pub fn candidate_set(
    status: PostStatus,
    existing: &[Tag],
) -> Result<CandidateSet<'_>, TagResolutionError> {
    if existing.is_empty() {
        return Err(TagResolutionError::NoTags);
    }

    let themed: Vec<&Tag> = themed_tag_names(status)
        .iter()
        .filter_map(|name| existing.iter().find(|tag| tag.name == *name))
        .collect();
    if !themed.is_empty() {
        return Ok(CandidateSet {
            path: ResolutionPath::Themed,
            tags: themed,
        });
    }

    let mut fallback: Vec<&Tag> = existing.iter().collect();
    fallback.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(CandidateSet {
        path: ResolutionPath::Fallback,
        tags: fallback,
    })
}

/// Source of the uniform choice among candidates.
pub trait TagPicker {
    /// Returns an index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

pub struct RandomPicker<R> {
    rng: R,
}

impl RandomPicker<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> TagPicker for RandomPicker<R> {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub tag: Tag,
    pub path: ResolutionPath,
}

pub fn resolve<P: TagPicker + ?Sized>(
    status: PostStatus,
    existing: &[Tag],
    picker: &mut P,
) -> Result<Resolution, TagResolutionError> {
    let candidates = candidate_set(status, existing)?;
    let index = picker.pick(candidates.tags.len()).min(candidates.tags.len() - 1);
    Ok(Resolution {
        tag: candidates.tags[index].clone(),
        path: candidates.path,
    })
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct BackfillAssignment {
    pub post_id: i64,
    pub post_title: String,
    pub status: PostStatus,
    pub tag_id: i64,
    pub tag_name: String,
    pub path: ResolutionPath,
}

#[derive(Debug, Clone, Default, Serialize, TS)]
#[ts(export)]
pub struct BackfillReport {
    pub assignments: Vec<BackfillAssignment>,
    pub themed: usize,
    pub fallback: usize,
    pub total_posts: u64,
    pub remaining_untagged: u64,
}

impl BackfillReport {
    pub fn is_complete(&self) -> bool {
        self.remaining_untagged == 0
    }
}

/// Assigns a tag to every untagged post. Run inside a transaction: on error
/// nothing should be committed.
pub async fn backfill_untagged_posts<C, P>(
    db: &C,
    picker: &mut P,
) -> Result<BackfillReport, TagResolutionError>
where
    C: ConnectionTrait,
    P: TagPicker + ?Sized,
{
    let tags = Tag::find_all(db).await?;
    if tags.is_empty() {
        return Err(TagResolutionError::NoTags);
    }
    tracing::info!(tag_count = tags.len(), "Loaded tags for backfill");

    let untagged = post::Entity::find()
        .filter(post::Column::TagId.is_null())
        .order_by_asc(post::Column::Id)
        .all(db)
        .await?;

    let mut report = BackfillReport::default();
    for record in untagged {
        let resolution = resolve(record.status, &tags, picker)?;
        match resolution.path {
            ResolutionPath::Themed => report.themed += 1,
            ResolutionPath::Fallback => report.fallback += 1,
        }
        report.assignments.push(BackfillAssignment {
            post_id: record.id,
            post_title: record.title.clone(),
            status: record.status,
            tag_id: resolution.tag.id,
            tag_name: resolution.tag.name.clone(),
            path: resolution.path,
        });

        let mut active: post::ActiveModel = record.into();
        active.tag_id = Set(Some(resolution.tag.id));
        active.update(db).await?;
    }

    report.total_posts = post::Entity::find().count(db).await?;
    report.remaining_untagged = post::Entity::find()
        .filter(post::Column::TagId.is_null())
        .count(db)
        .await?;
    Ok(report)
}
