//! Persistence of accepted posts

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::Result;
use crate::models::PostRecord;
use crate::services::feed::cursor::{RecencyCursor, StrictCursor};

/// Rows per INSERT statement; five bind parameters each
const INSERT_CHUNK_SIZE: usize = 1000;

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Inserts records, ignoring any whose `uri` already exists.
    /// Returns the number of rows actually inserted.
    async fn insert_posts(&self, posts: &[PostRecord]) -> Result<u64>;

    /// Deletes by `uri`; unknown URIs are ignored
    async fn delete_posts(&self, uris: &[String]) -> Result<u64>;

    /// Page ordered by `(priority, indexed_at, uri)` descending
    async fn fetch_by_priority(
        &self,
        cursor: Option<&StrictCursor>,
        limit: usize,
    ) -> Result<Vec<PostRecord>>;

    /// Page ordered by `(indexed_at, priority, uri)` descending
    async fn fetch_by_recency(
        &self,
        cursor: Option<&RecencyCursor>,
        limit: usize,
    ) -> Result<Vec<PostRecord>>;
}

pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn insert_posts(&self, posts: &[PostRecord]) -> Result<u64> {
        let mut inserted = 0;
        for chunk in posts.chunks(INSERT_CHUNK_SIZE) {
            let result = insert_query(chunk).build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn delete_posts(&self, uris: &[String]) -> Result<u64> {
        if uris.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM post WHERE uri = ANY($1)")
            .bind(uris)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_by_priority(
        &self,
        cursor: Option<&StrictCursor>,
        limit: usize,
    ) -> Result<Vec<PostRecord>> {
        let records = priority_page_query(cursor, limit)
            .build_query_as::<PostRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn fetch_by_recency(
        &self,
        cursor: Option<&RecencyCursor>,
        limit: usize,
    ) -> Result<Vec<PostRecord>> {
        let records = recency_page_query(cursor, limit)
            .build_query_as::<PostRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}

fn insert_query(posts: &[PostRecord]) -> QueryBuilder<'_, Postgres> {
    let mut builder =
        QueryBuilder::new("INSERT INTO post (uri, cid, author, priority, indexed_at) ");
    builder.push_values(posts, |mut row, post| {
        row.push_bind(&post.uri)
            .push_bind(&post.cid)
            .push_bind(&post.author)
            .push_bind(post.priority)
            .push_bind(&post.indexed_at);
    });
    builder.push(" ON CONFLICT (uri) DO NOTHING");
    builder
}

fn priority_page_query(cursor: Option<&StrictCursor>, limit: usize) -> QueryBuilder<'_, Postgres> {
    let mut builder =
        QueryBuilder::new("SELECT uri, cid, author, priority, indexed_at FROM post");
    if let Some(cursor) = cursor {
        builder
            .push(" WHERE (priority, indexed_at, uri) < (")
            .push_bind(cursor.priority)
            .push(", ")
            .push_bind(&cursor.indexed_at)
            .push(", ")
            .push_bind(&cursor.uri)
            .push(")");
    }
    builder
        .push(" ORDER BY priority DESC, indexed_at DESC, uri DESC LIMIT ")
        .push_bind(limit as i64);
    builder
}

fn recency_page_query(cursor: Option<&RecencyCursor>, limit: usize) -> QueryBuilder<'_, Postgres> {
    let mut builder =
        QueryBuilder::new("SELECT uri, cid, author, priority, indexed_at FROM post");
    if let Some(cursor) = cursor {
        builder
            .push(" WHERE (indexed_at, priority, uri) < (")
            .push_bind(&cursor.indexed_at)
            .push(", ")
            .push_bind(cursor.priority)
            .push(", ")
            .push_bind(&cursor.uri)
            .push(")");
    }
    builder
        .push(" ORDER BY indexed_at DESC, priority DESC, uri DESC LIMIT ")
        .push_bind(limit as i64);
    builder
}
