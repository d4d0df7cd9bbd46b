//! Feed assembly
//!
//! Two selection strategies over the accepted posts:
//! - strict: fully ordered by tier, then recency
//! - weighted: recency first, lower tiers down-sampled with a stable hash

pub mod cursor;
pub mod weighted;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::PostStore;
use crate::error::Result;
use crate::models::{FeedSkeleton, PostRecord, SkeletonFeedPost};

pub use cursor::{RecencyCursor, StrictCursor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStrategy {
    Strict,
    #[default]
    Weighted,
}

impl FeedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStrategy::Strict => "strict",
            FeedStrategy::Weighted => "weighted",
        }
    }
}

impl fmt::Display for FeedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(FeedStrategy::Strict),
            "weighted" => Ok(FeedStrategy::Weighted),
            other => Err(format!(
                "Unknown feed strategy '{}': expected 'strict' or 'weighted'",
                other
            )),
        }
    }
}

pub struct FeedAssembler {
    store: Arc<dyn PostStore>,
    strategy: FeedStrategy,
}

impl FeedAssembler {
    pub fn new(store: Arc<dyn PostStore>, strategy: FeedStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn strategy(&self) -> FeedStrategy {
        self.strategy
    }

    /// One page of the feed. `limit` is expected to be already clamped.
    pub async fn assemble(&self, cursor: Option<&str>, limit: usize) -> Result<FeedSkeleton> {
        let cursor = cursor.filter(|c| !c.is_empty());

        match self.strategy {
            FeedStrategy::Strict => self.strict_page(cursor, limit).await,
            FeedStrategy::Weighted => self.weighted_page(cursor, limit).await,
        }
    }

    async fn strict_page(&self, cursor: Option<&str>, limit: usize) -> Result<FeedSkeleton> {
        let cursor = cursor.map(StrictCursor::decode);
        let records = self.store.fetch_by_priority(cursor.as_ref(), limit).await?;

        let next = records
            .last()
            .map(|last| StrictCursor::from_record(last).encode());
        Ok(skeleton(&records, next))
    }

    async fn weighted_page(&self, cursor: Option<&str>, limit: usize) -> Result<FeedSkeleton> {
        let cursor = cursor.map(RecencyCursor::decode);
        let candidates = self
            .store
            .fetch_by_recency(cursor.as_ref(), weighted::candidate_window(limit))
            .await?;

        let selected = weighted::select_weighted(&candidates, limit);
        tracing::debug!(
            candidates = candidates.len(),
            selected = selected.len(),
            "Weighted page assembled"
        );

        let next = selected
            .last()
            .map(|last| RecencyCursor::from_record(last).encode());
        Ok(skeleton(&selected, next))
    }
}

fn skeleton(records: &[PostRecord], cursor: Option<String>) -> FeedSkeleton {
    FeedSkeleton {
        cursor,
        feed: records
            .iter()
            .map(|record| SkeletonFeedPost {
                post: record.uri.clone(),
            })
            .collect(),
    }
}
