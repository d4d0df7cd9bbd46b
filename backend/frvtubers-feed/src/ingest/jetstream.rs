//! Jetstream firehose consumer
//!
//! Reads JSON commit events for `app.bsky.feed.post` over a websocket,
//! groups them into batches by size and age, and hands each batch to the
//! subscription handler sequentially.
//!
//! The cursor (`time_us`) of the last successfully flushed event is kept. A
//! failed flush drops the connection and the consumer resumes from that
//! cursor, so the failed batch is replayed rather than lost. When nothing has
//! been flushed yet, the resume point is the first event of the failed batch.

use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::config::IngestConfig;
use crate::error::{AppError, Result};
use crate::models::{CommitBatch, CreateOp, DeleteOp, PostContent, POST_COLLECTION};
use crate::services::FirehoseSubscription;

#[derive(Debug, Deserialize)]
struct JetstreamEvent {
    did: String,
    #[serde(default)]
    time_us: Option<i64>,
    kind: String,
    #[serde(default)]
    commit: Option<JetstreamCommit>,
}

#[derive(Debug, Deserialize)]
struct JetstreamCommit {
    operation: String,
    collection: String,
    rkey: String,
    #[serde(default)]
    cid: Option<String>,
    #[serde(default)]
    record: Option<PostContent>,
}

/// Post operation decoded from one event
#[derive(Debug, Clone, PartialEq)]
pub enum PostOp {
    Create(CreateOp),
    Delete(DeleteOp),
}

/// Decodes one Jetstream message; anything that is not a post create or
/// delete yields `None`
pub fn decode_event(raw: &str) -> Option<(PostOp, Option<i64>)> {
    let event: JetstreamEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping undecodable Jetstream message");
            return None;
        }
    };

    if event.kind != "commit" {
        return None;
    }
    let commit = event.commit?;
    if commit.collection != POST_COLLECTION {
        return None;
    }

    let uri = format!("at://{}/{}/{}", event.did, commit.collection, commit.rkey);
    let op = match commit.operation.as_str() {
        "create" => PostOp::Create(CreateOp {
            uri,
            cid: commit.cid.unwrap_or_default(),
            author: event.did,
            record: commit.record.unwrap_or_default(),
        }),
        "delete" => PostOp::Delete(DeleteOp { uri }),
        _ => return None,
    };
    Some((op, event.time_us))
}

/// Operations accumulated since the last flush
#[derive(Debug)]
pub struct PendingBatch {
    batch: CommitBatch,
    started_at: Instant,
    first_time_us: Option<i64>,
    last_time_us: Option<i64>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self {
            batch: CommitBatch::default(),
            started_at: Instant::now(),
            first_time_us: None,
            last_time_us: None,
        }
    }

    pub fn add(&mut self, op: PostOp, time_us: Option<i64>) {
        if self.batch.is_empty() {
            self.started_at = Instant::now();
        }
        match op {
            PostOp::Create(create) => self.batch.creates.push(create),
            PostOp::Delete(delete) => self.batch.deletes.push(delete),
        }
        if time_us.is_some() {
            if self.first_time_us.is_none() {
                self.first_time_us = time_us;
            }
            self.last_time_us = time_us;
        }
    }

    /// Cursor of the oldest operation still pending
    pub fn first_time_us(&self) -> Option<i64> {
        self.first_time_us
    }

    pub fn should_flush_by_size(&self, max_size: usize) -> bool {
        self.batch.len() >= max_size
    }

    pub fn should_flush_by_time(&self, max_age: Duration) -> bool {
        !self.batch.is_empty() && self.started_at.elapsed() >= max_age
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Takes the accumulated operations and the cursor of the newest one
    pub fn take(&mut self) -> (CommitBatch, Option<i64>) {
        let taken = std::mem::replace(self, Self::new());
        (taken.batch, taken.last_time_us)
    }
}

impl Default for PendingBatch {
    fn default() -> Self {
        Self::new()
    }
}

pub struct JetstreamConsumer {
    config: IngestConfig,
    subscription: Arc<FirehoseSubscription>,
    cursor: Option<i64>,
}

impl JetstreamConsumer {
    pub fn new(config: IngestConfig, subscription: Arc<FirehoseSubscription>) -> Self {
        Self {
            config,
            subscription,
            cursor: None,
        }
    }

    /// Subscription URL with the post collection filter and resume cursor
    pub fn subscribe_url(&self) -> String {
        let base = &self.config.subscription_endpoint;
        let mut url = if base.contains("wantedCollections=") {
            base.clone()
        } else {
            let sep = if base.contains('?') { '&' } else { '?' };
            format!("{}{}wantedCollections={}", base, sep, POST_COLLECTION)
        };
        if let Some(cursor) = self.cursor {
            url.push_str(&format!("&cursor={}", cursor));
        }
        url
    }

    /// Consumes forever, reconnecting after `reconnect_delay` on any failure
    pub async fn run(mut self) {
        tracing::info!(
            endpoint = %self.config.subscription_endpoint,
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval.as_millis(),
            "Starting Jetstream consumer"
        );

        loop {
            match self.consume().await {
                Ok(()) => tracing::info!("Jetstream connection closed, reconnecting"),
                Err(e) => tracing::error!(
                    error = %e,
                    cursor = ?self.cursor,
                    "Jetstream consumer failed, reconnecting"
                ),
            }
            sleep(self.config.reconnect_delay).await;
        }
    }

    async fn consume(&mut self) -> Result<()> {
        let url = self.subscribe_url();
        let (mut ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| AppError::Upstream(format!("Jetstream connect failed: {}", e)))?;
        tracing::info!(url = %url, "Connected to Jetstream");

        let mut pending = PendingBatch::new();
        let mut ticker = tokio::time::interval(self.config.flush_interval);

        loop {
            tokio::select! {
                message = ws.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Some((op, time_us)) = decode_event(&text) {
                                pending.add(op, time_us);
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            self.flush(&mut pending).await?;
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            self.flush(&mut pending).await?;
                            return Err(AppError::Upstream(format!("Jetstream read failed: {}", e)));
                        }
                    }

                    if pending.should_flush_by_size(self.config.batch_size) {
                        self.flush(&mut pending).await?;
                    }
                }
                _ = ticker.tick() => {
                    if pending.should_flush_by_time(self.config.flush_interval) {
                        self.flush(&mut pending).await?;
                    }
                }
            }
        }
    }

    async fn flush(&mut self, pending: &mut PendingBatch) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }

        let first_time_us = pending.first_time_us();
        let (batch, time_us) = pending.take();

        if let Err(e) = self.subscription.handle_batch(batch).await {
            // Nothing flushed yet on this run: resume just before the failed
            // batch rather than from the live tail.
            if self.cursor.is_none() {
                self.cursor = first_time_us.map(|t| t.saturating_sub(1));
            }
            return Err(e);
        }

        if time_us.is_some() {
            self.cursor = time_us;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryPostStore, PostStore};
    use crate::models::PostRecord;
    use crate::registry::{ManualOverrides, VtuberCatalog, VtuberRegistry};
    use crate::services::feed::cursor::{RecencyCursor, StrictCursor};
    use crate::services::PostClassifier;
    use async_trait::async_trait;

    /// Store whose writes always fail
    struct FailingStore;

    #[async_trait]
    impl PostStore for FailingStore {
        async fn insert_posts(&self, _posts: &[PostRecord]) -> Result<u64> {
            Err(AppError::Database("connection refused".into()))
        }

        async fn delete_posts(&self, _uris: &[String]) -> Result<u64> {
            Err(AppError::Database("connection refused".into()))
        }

        async fn fetch_by_priority(
            &self,
            _cursor: Option<&StrictCursor>,
            _limit: usize,
        ) -> Result<Vec<PostRecord>> {
            Ok(Vec::new())
        }

        async fn fetch_by_recency(
            &self,
            _cursor: Option<&RecencyCursor>,
            _limit: usize,
        ) -> Result<Vec<PostRecord>> {
            Ok(Vec::new())
        }
    }

    const CREATE: &str = r#"{
        "did": "did:plc:author",
        "time_us": 1725911162329308,
        "kind": "commit",
        "commit": {
            "rev": "3l3qo2vutsw2b",
            "operation": "create",
            "collection": "app.bsky.feed.post",
            "rkey": "3l3qo2vuowo2b",
            "record": {
                "$type": "app.bsky.feed.post",
                "createdAt": "2024-09-09T19:46:02.102Z",
                "langs": ["fr"],
                "text": "Nouveau stream vtuberfr ce soir"
            },
            "cid": "bafyreidwaivazkwu67xztlmuobx35hs2lnfh3kolmgfmucldvhd3sgzcqi"
        }
    }"#;

    #[test]
    fn test_decode_create() {
        let (op, time_us) = decode_event(CREATE).unwrap();
        assert_eq!(time_us, Some(1725911162329308));

        match op {
            PostOp::Create(create) => {
                assert_eq!(
                    create.uri,
                    "at://did:plc:author/app.bsky.feed.post/3l3qo2vuowo2b"
                );
                assert_eq!(create.author, "did:plc:author");
                assert_eq!(create.record.langs, Some(vec!["fr".to_string()]));
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_decode_delete() {
        let raw = r#"{"did":"did:plc:a","time_us":1,"kind":"commit",
            "commit":{"operation":"delete","collection":"app.bsky.feed.post","rkey":"xyz"}}"#;
        let (op, _) = decode_event(raw).unwrap();
        assert_eq!(
            op,
            PostOp::Delete(DeleteOp {
                uri: "at://did:plc:a/app.bsky.feed.post/xyz".into()
            })
        );
    }

    #[test]
    fn test_decode_ignores_other_events() {
        let like = r#"{"did":"did:plc:a","kind":"commit",
            "commit":{"operation":"create","collection":"app.bsky.feed.like","rkey":"1"}}"#;
        let identity = r#"{"did":"did:plc:a","kind":"identity","identity":{}}"#;
        let update = r#"{"did":"did:plc:a","kind":"commit",
            "commit":{"operation":"update","collection":"app.bsky.feed.post","rkey":"1"}}"#;

        assert!(decode_event(like).is_none());
        assert!(decode_event(identity).is_none());
        assert!(decode_event(update).is_none());
        assert!(decode_event("not json").is_none());
    }

    #[test]
    fn test_pending_batch_flush_rules() {
        let mut pending = PendingBatch::new();
        assert!(!pending.should_flush_by_time(Duration::ZERO));

        let (op, time_us) = decode_event(CREATE).unwrap();
        pending.add(op, time_us);
        pending.add(PostOp::Delete(DeleteOp { uri: "at://x".into() }), Some(2));

        assert_eq!(pending.len(), 2);
        assert!(pending.should_flush_by_size(2));
        assert!(!pending.should_flush_by_size(3));
        assert!(pending.should_flush_by_time(Duration::ZERO));

        assert_eq!(pending.first_time_us(), Some(1725911162329308));
        let (batch, cursor) = pending.take();
        assert_eq!(batch.creates.len(), 1);
        assert_eq!(batch.deletes.len(), 1);
        assert_eq!(cursor, Some(2));
        assert!(pending.is_empty());
        assert!(pending.first_time_us().is_none());
    }

    fn consumer(endpoint: &str) -> JetstreamConsumer {
        consumer_with_store(endpoint, Arc::new(InMemoryPostStore::new()))
    }

    fn consumer_with_store(endpoint: &str, store: Arc<dyn PostStore>) -> JetstreamConsumer {
        let registry = Arc::new(VtuberRegistry::new(
            VtuberCatalog::default(),
            ManualOverrides::default(),
        ));
        let subscription = Arc::new(FirehoseSubscription::new(
            registry,
            store,
            PostClassifier::new(false),
            false,
        ));
        JetstreamConsumer::new(
            IngestConfig {
                subscription_endpoint: endpoint.to_string(),
                ..IngestConfig::default()
            },
            subscription,
        )
    }

    #[test]
    fn test_subscribe_url() {
        let mut plain = consumer("wss://jetstream.example/subscribe");
        assert_eq!(
            plain.subscribe_url(),
            "wss://jetstream.example/subscribe?wantedCollections=app.bsky.feed.post"
        );

        plain.cursor = Some(42);
        assert_eq!(
            plain.subscribe_url(),
            "wss://jetstream.example/subscribe?wantedCollections=app.bsky.feed.post&cursor=42"
        );

        let filtered =
            consumer("wss://jetstream.example/subscribe?wantedCollections=app.bsky.feed.post");
        assert_eq!(
            filtered.subscribe_url(),
            "wss://jetstream.example/subscribe?wantedCollections=app.bsky.feed.post"
        );
    }

    #[tokio::test]
    async fn test_flush_advances_cursor() {
        let mut jetstream = consumer("wss://jetstream.example/subscribe");
        let mut pending = PendingBatch::new();
        let (op, time_us) = decode_event(CREATE).unwrap();
        pending.add(op, time_us);

        jetstream.flush(&mut pending).await.unwrap();
        assert_eq!(jetstream.cursor, Some(1725911162329308));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_first_failed_flush_resumes_before_the_batch() {
        let mut jetstream =
            consumer_with_store("wss://jetstream.example/subscribe", Arc::new(FailingStore));
        let mut pending = PendingBatch::new();
        let (op, time_us) = decode_event(CREATE).unwrap();
        pending.add(op, time_us);
        pending.add(
            PostOp::Delete(DeleteOp {
                uri: "at://did:plc:author/app.bsky.feed.post/old".into(),
            }),
            Some(1725911162329400),
        );

        assert!(jetstream.flush(&mut pending).await.is_err());
        assert_eq!(jetstream.cursor, Some(1725911162329307));
        assert!(jetstream.subscribe_url().ends_with("&cursor=1725911162329307"));
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_last_flushed_cursor() {
        let mut jetstream =
            consumer_with_store("wss://jetstream.example/subscribe", Arc::new(FailingStore));
        jetstream.cursor = Some(100);

        let mut pending = PendingBatch::new();
        let (op, time_us) = decode_event(CREATE).unwrap();
        pending.add(op, time_us);

        assert!(jetstream.flush(&mut pending).await.is_err());
        assert_eq!(jetstream.cursor, Some(100));
    }
}
