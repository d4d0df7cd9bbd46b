//! In-process post store
//!
//! Same ordering and cursor semantics as the Postgres store. Used by tests and
//! local runs without a database.

use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::post_repo::PostStore;
use crate::error::Result;
use crate::models::PostRecord;
use crate::services::feed::cursor::{RecencyCursor, StrictCursor};

#[derive(Debug, Default)]
pub struct InMemoryPostStore {
    posts: Mutex<HashMap<String, PostRecord>>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, uri: &str) -> Option<PostRecord> {
        self.lock().get(uri).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PostRecord>> {
        self.posts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn page<K, F>(&self, key: F, after: Option<K>, limit: usize) -> Vec<PostRecord>
    where
        K: Ord,
        F: Fn(&PostRecord) -> K,
    {
        let posts = self.lock();
        let mut page: Vec<&PostRecord> = posts
            .values()
            .filter(|post| after.as_ref().map_or(true, |bound| key(post) < *bound))
            .collect();
        page.sort_by_key(|post| Reverse(key(post)));
        page.into_iter().take(limit).cloned().collect()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn insert_posts(&self, posts: &[PostRecord]) -> Result<u64> {
        let mut stored = self.lock();
        let mut inserted = 0;
        for post in posts {
            if !stored.contains_key(&post.uri) {
                stored.insert(post.uri.clone(), post.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn delete_posts(&self, uris: &[String]) -> Result<u64> {
        let mut stored = self.lock();
        Ok(uris.iter().filter(|uri| stored.remove(*uri).is_some()).count() as u64)
    }

    async fn fetch_by_priority(
        &self,
        cursor: Option<&StrictCursor>,
        limit: usize,
    ) -> Result<Vec<PostRecord>> {
        let after = cursor.map(|c| (c.priority, c.indexed_at.clone(), c.uri.clone()));
        Ok(self.page(
            |p| (p.priority, p.indexed_at.clone(), p.uri.clone()),
            after,
            limit,
        ))
    }

    async fn fetch_by_recency(
        &self,
        cursor: Option<&RecencyCursor>,
        limit: usize,
    ) -> Result<Vec<PostRecord>> {
        let after = cursor.map(|c| (c.indexed_at.clone(), c.priority, c.uri.clone()));
        Ok(self.page(
            |p| (p.indexed_at.clone(), p.priority, p.uri.clone()),
            after,
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(uri: &str, priority: i16, indexed_at: &str) -> PostRecord {
        PostRecord {
            uri: uri.into(),
            cid: format!("cid-{}", uri),
            author: "did:plc:a".into(),
            priority,
            indexed_at: indexed_at.into(),
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = InMemoryPostStore::new();
        let post = record("at://a/1", 1, "2025-01-01T00:00:00.000Z");

        assert_eq!(store.insert_posts(&[post.clone()]).await.unwrap(), 1);
        let mut changed = post.clone();
        changed.priority = 2;
        assert_eq!(store.insert_posts(&[changed]).await.unwrap(), 0);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("at://a/1").unwrap().priority, 1);
    }

    #[tokio::test]
    async fn test_delete_ignores_unknown() {
        let store = InMemoryPostStore::new();
        store
            .insert_posts(&[record("at://a/1", 0, "2025-01-01T00:00:00.000Z")])
            .await
            .unwrap();

        let deleted = store
            .delete_posts(&["at://a/1".to_string(), "at://a/404".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_priority_order_and_cursor() {
        let store = InMemoryPostStore::new();
        store
            .insert_posts(&[
                record("at://a/1", 0, "2025-01-01T00:00:03.000Z"),
                record("at://a/2", 2, "2025-01-01T00:00:01.000Z"),
                record("at://a/3", 2, "2025-01-01T00:00:02.000Z"),
                record("at://a/4", 1, "2025-01-01T00:00:04.000Z"),
            ])
            .await
            .unwrap();

        let first = store.fetch_by_priority(None, 2).await.unwrap();
        let uris: Vec<&str> = first.iter().map(|p| p.uri.as_str()).collect();
        assert_eq!(uris, vec!["at://a/3", "at://a/2"]);

        let cursor = StrictCursor::from_record(first.last().unwrap());
        let rest = store.fetch_by_priority(Some(&cursor), 10).await.unwrap();
        let uris: Vec<&str> = rest.iter().map(|p| p.uri.as_str()).collect();
        assert_eq!(uris, vec!["at://a/4", "at://a/1"]);
    }

    #[tokio::test]
    async fn test_recency_order_breaks_ties_on_uri() {
        let store = InMemoryPostStore::new();
        store
            .insert_posts(&[
                record("at://a/1", 1, "2025-01-01T00:00:00.000Z"),
                record("at://a/2", 1, "2025-01-01T00:00:00.000Z"),
                record("at://a/3", 2, "2025-01-01T00:00:00.000Z"),
            ])
            .await
            .unwrap();

        let page = store.fetch_by_recency(None, 10).await.unwrap();
        let uris: Vec<&str> = page.iter().map(|p| p.uri.as_str()).collect();
        assert_eq!(uris, vec!["at://a/3", "at://a/2", "at://a/1"]);

        let cursor = RecencyCursor::from_record(&page[1]);
        let rest = store.fetch_by_recency(Some(&cursor), 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].uri, "at://a/1");
    }
}
