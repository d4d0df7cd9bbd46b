//! Firehose subscription handler
//!
//! Classifies the create operations of a batch against one registry snapshot,
//! then flushes one batched delete and one idempotent batched insert.
//!
//! A batch spans several firehose commits, so a post can be created and
//! deleted inside the same batch. Deleted URIs are never inserted.

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::PostStore;
use crate::error::Result;
use crate::metrics;
use crate::models::{CommitBatch, CreateOp, PostRecord};
use crate::registry::VtuberRegistry;
use crate::services::classifier::{accepted_record, PostClassifier, Verdict};

/// Maximum characters of post text written to the log
const LOG_TEXT_LIMIT: usize = 280;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub rejected: usize,
    pub deleted: usize,
    pub inserted: u64,
}

pub struct FirehoseSubscription {
    registry: Arc<VtuberRegistry>,
    store: Arc<dyn PostStore>,
    classifier: PostClassifier,
    log_posts: bool,
}

impl FirehoseSubscription {
    pub fn new(
        registry: Arc<VtuberRegistry>,
        store: Arc<dyn PostStore>,
        classifier: PostClassifier,
        log_posts: bool,
    ) -> Self {
        Self {
            registry,
            store,
            classifier,
            log_posts,
        }
    }

    pub async fn handle_batch(&self, batch: CommitBatch) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let snapshot = self.registry.current();
        let keywords = self.registry.keywords();

        let deletes: Vec<String> = batch.deletes.into_iter().map(|op| op.uri).collect();
        let deleted_uris: HashSet<&str> = deletes.iter().map(String::as_str).collect();
        let mut accepted: Vec<PostRecord> = Vec::new();
        let mut rejected = 0;
        let mut superseded = 0;

        for create in &batch.creates {
            if deleted_uris.contains(create.uri.as_str()) {
                tracing::trace!(uri = %create.uri, "Post deleted within the same batch");
                superseded += 1;
                continue;
            }

            match self.classifier.classify(&snapshot, keywords, create) {
                Verdict::Accept { priority } => {
                    metrics::record_classified("accepted", "");
                    if self.log_posts {
                        log_accepted(create, priority);
                    }
                    accepted.push(accepted_record(create, priority));
                }
                Verdict::Reject(reason) => {
                    metrics::record_classified("rejected", reason.as_str());
                    tracing::trace!(uri = %create.uri, reason = reason.as_str(), "Post rejected");
                    rejected += 1;
                }
            }
        }

        if !deletes.is_empty() {
            self.store.delete_posts(&deletes).await?;
            metrics::record_deleted(deletes.len() as u64);
        }

        let inserted = if accepted.is_empty() {
            0
        } else {
            self.store.insert_posts(&accepted).await?
        };

        let outcome = BatchOutcome {
            accepted: accepted.len(),
            rejected,
            deleted: deletes.len(),
            inserted,
        };
        tracing::debug!(
            accepted = outcome.accepted,
            rejected = outcome.rejected,
            deleted = outcome.deleted,
            inserted = outcome.inserted,
            superseded,
            "Commit batch processed"
        );
        Ok(outcome)
    }
}

fn log_accepted(create: &CreateOp, priority: u8) {
    let text = create.record.text.as_deref().unwrap_or_default();
    tracing::info!(
        uri = %create.uri,
        author = %create.author,
        priority,
        text = %truncate_text(text, LOG_TEXT_LIMIT),
        "Accepted post"
    );
}

fn truncate_text(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
