//! Prometheus metrics for ingestion, roster sync and feed serving

use actix_web::{HttpResponse, Responder};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Duration;

static POSTS_CLASSIFIED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feedgen_posts_classified_total",
        "Posts classified by the subscription (accepted/rejected by reason)",
        &["verdict", "reason"]
    )
    .expect("Failed to register posts classified metric")
});

static POSTS_DELETED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "feedgen_posts_deleted_total",
        "Post delete operations received from the firehose"
    )
    .expect("Failed to register posts deleted metric")
});

static ROSTER_REFRESH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feedgen_roster_refresh_total",
        "Team roster refresh attempts (success/empty/error/skipped)",
        &["status"]
    )
    .expect("Failed to register roster refresh metric")
});

static ROSTER_MEMBERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "feedgen_roster_members",
        "Members in the current team roster"
    )
    .expect("Failed to register roster members metric")
});

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feedgen_feed_requests_total",
        "Feed skeleton requests by strategy",
        &["strategy"]
    )
    .expect("Failed to register feed requests metric")
});

static FEED_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feedgen_feed_request_duration_seconds",
        "Duration of feed skeleton assembly",
        &["strategy"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register feed request duration metric")
});

/// Record one classification outcome; `reason` is empty for accepted posts
pub fn record_classified(verdict: &str, reason: &str) {
    POSTS_CLASSIFIED_TOTAL
        .with_label_values(&[verdict, reason])
        .inc();
}

pub fn record_deleted(count: u64) {
    POSTS_DELETED_TOTAL.inc_by(count);
}

/// Record roster refresh result (success/empty/error/skipped)
pub fn record_roster_refresh(status: &str) {
    ROSTER_REFRESH_TOTAL.with_label_values(&[status]).inc();
}

pub fn set_roster_members(count: usize) {
    ROSTER_MEMBERS.set(count as i64);
}

pub fn record_feed_request(strategy: &str, duration: Duration) {
    FEED_REQUESTS_TOTAL.with_label_values(&[strategy]).inc();
    FEED_REQUEST_DURATION_SECONDS
        .with_label_values(&[strategy])
        .observe(duration.as_secs_f64());
}

/// `GET /metrics` in the Prometheus text format
pub async fn serve_metrics() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "Failed to encode metrics");
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
