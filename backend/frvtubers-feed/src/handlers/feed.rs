use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::services::FeedAssembler;

/// Record key of the feed generator record (at most 15 characters)
pub const FEED_SHORTNAME: &str = "frvtubers";

#[derive(Debug, Deserialize)]
pub struct FeedSkeletonParams {
    pub feed: String,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

pub struct FeedHandlerState {
    pub assembler: FeedAssembler,
    pub config: FeedConfig,
}

impl FeedHandlerState {
    pub fn feed_uri(&self) -> String {
        format!(
            "at://{}/app.bsky.feed.generator/{}",
            self.config.publisher_did, FEED_SHORTNAME
        )
    }

    fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit.max(1))
    }
}

#[get("/xrpc/app.bsky.feed.getFeedSkeleton")]
pub async fn get_feed_skeleton(
    query: web::Query<FeedSkeletonParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    if query.feed != state.feed_uri() {
        return Err(AppError::UnsupportedAlgorithm(format!(
            "Unsupported algorithm: {}",
            query.feed
        )));
    }

    let limit = state.clamp_limit(query.limit);
    let strategy = state.assembler.strategy();
    debug!(
        strategy = %strategy,
        limit,
        has_cursor = query.cursor.is_some(),
        "Assembling feed skeleton"
    );

    let started = Instant::now();
    let skeleton = state
        .assembler
        .assemble(query.cursor.as_deref(), limit)
        .await?;
    metrics::record_feed_request(strategy.as_str(), started.elapsed());

    Ok(HttpResponse::Ok().json(skeleton))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedDescription {
    pub uri: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescribeFeedGeneratorResponse {
    pub did: String,
    pub feeds: Vec<FeedDescription>,
}

#[get("/xrpc/app.bsky.feed.describeFeedGenerator")]
pub async fn describe_feed_generator(state: web::Data<FeedHandlerState>) -> HttpResponse {
    HttpResponse::Ok().json(DescribeFeedGeneratorResponse {
        did: state.config.service_did(),
        feeds: vec![FeedDescription {
            uri: state.feed_uri(),
        }],
    })
}
