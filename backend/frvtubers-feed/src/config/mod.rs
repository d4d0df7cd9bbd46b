use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::services::feed::FeedStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    pub roster: RosterConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Public hostname of the feed generator, used to build its did:web
    pub hostname: String,
    /// DID of the account that publishes the feed record
    pub publisher_did: String,
    pub strategy: FeedStrategy,
    /// Drop English-only posts that carry no French signal
    pub english_exclusion: bool,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl FeedConfig {
    pub fn service_did(&self) -> String {
        format!("did:web:{}", self.hostname)
    }
}

/// Catalog location and manual overrides applied on top of it
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub manual_team_dids: Vec<String>,
    #[serde(default)]
    pub manual_team_handles: Vec<String>,
    #[serde(default)]
    pub manual_vtuber_dids: Vec<String>,
    #[serde(default)]
    pub manual_vtuber_handles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub team_name: String,
    #[serde(with = "duration_millis")]
    pub refresh_interval: Duration,
    #[serde(with = "duration_millis")]
    pub retry_interval: Duration,
    /// Upper bound for each Twitch HTTP request
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
}

impl RosterConfig {
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.client_id, &self.client_secret),
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty()
        )
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            team_name: default_team_name(),
            refresh_interval: DEFAULT_ROSTER_INTERVAL,
            retry_interval: ROSTER_RETRY_INTERVAL,
            request_timeout: ROSTER_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub subscription_endpoint: String,
    pub batch_size: usize,
    #[serde(with = "duration_millis")]
    pub flush_interval: Duration,
    #[serde(with = "duration_millis")]
    pub reconnect_delay: Duration,
    pub log_posts: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            subscription_endpoint: default_subscription_endpoint(),
            batch_size: 100,
            flush_interval: Duration::from_millis(1000),
            reconnect_delay: Duration::from_millis(3000),
            log_posts: false,
        }
    }
}

/// Roster refresh cadence when nothing else is configured (1 hour)
pub const DEFAULT_ROSTER_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Delay before retrying a failed roster refresh (10 minutes)
pub const ROSTER_RETRY_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Timeout applied to each Twitch token or Helix request
pub const ROSTER_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Configuration("DATABASE_URL must be set".to_string()))?;

        let strategy = match env::var("FEED_STRATEGY") {
            Ok(raw) => raw.parse::<FeedStrategy>().map_err(AppError::Configuration)?,
            Err(_) => FeedStrategy::default(),
        };

        let ingest_defaults = IngestConfig::default();

        Ok(Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: parse_var("APP_PORT").unwrap_or(3000),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            },
            feed: FeedConfig {
                hostname: env::var("FEEDGEN_HOSTNAME")
                    .unwrap_or_else(|_| "localhost".to_string()),
                publisher_did: env::var("FEEDGEN_PUBLISHER_DID")
                    .unwrap_or_else(|_| "did:example:alice".to_string()),
                strategy,
                english_exclusion: parse_bool_var("FEED_ENGLISH_EXCLUSION").unwrap_or(false),
                default_limit: parse_var("FEED_DEFAULT_LIMIT").unwrap_or(30),
                max_limit: parse_var("FEED_MAX_LIMIT").unwrap_or(100),
            },
            registry: RegistryConfig {
                catalog_path: env::var("VTUBER_CATALOG_PATH")
                    .ok()
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
                manual_team_dids: list_var("MANUAL_TEAM_DIDS"),
                manual_team_handles: list_var("MANUAL_TEAM_HANDLES"),
                manual_vtuber_dids: list_var("MANUAL_VTUBER_DIDS"),
                manual_vtuber_handles: list_var("MANUAL_VTUBER_HANDLES"),
            },
            roster: RosterConfig {
                client_id: env::var("TWITCH_CLIENT_ID").ok(),
                client_secret: env::var("TWITCH_CLIENT_SECRET").ok(),
                team_name: env::var("TWITCH_TEAM_NAME").unwrap_or_else(|_| default_team_name()),
                refresh_interval: roster_interval_from(
                    env::var("TWITCH_TEAM_REFRESH_INTERVAL_MS").ok().as_deref(),
                ),
                retry_interval: ROSTER_RETRY_INTERVAL,
                request_timeout: parse_var::<u64>("TWITCH_REQUEST_TIMEOUT_MS")
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis)
                    .unwrap_or(ROSTER_REQUEST_TIMEOUT),
            },
            ingest: IngestConfig {
                subscription_endpoint: env::var("FEEDGEN_SUBSCRIPTION_ENDPOINT")
                    .unwrap_or_else(|_| default_subscription_endpoint()),
                batch_size: parse_var::<usize>("FEEDGEN_INGEST_BATCH_SIZE")
                    .filter(|size| *size > 0)
                    .unwrap_or(ingest_defaults.batch_size),
                flush_interval: parse_var("FEEDGEN_INGEST_FLUSH_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(ingest_defaults.flush_interval),
                reconnect_delay: parse_var("FEEDGEN_SUBSCRIPTION_RECONNECT_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(ingest_defaults.reconnect_delay),
                log_posts: parse_bool_var("FEEDGEN_LOG_POSTS").unwrap_or(false),
            },
        })
    }
}

/// Interval in milliseconds; anything missing, unparsable or non-positive
/// falls back to the one hour default.
pub fn roster_interval_from(raw: Option<&str>) -> Duration {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| Duration::from_millis(ms as u64))
        .filter(|d| !d.is_zero())
        .unwrap_or(DEFAULT_ROSTER_INTERVAL)
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_bool_var(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn list_var(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn default_team_name() -> String {
    "frvtubers".to_string()
}

fn default_subscription_endpoint() -> String {
    "wss://jetstream2.us-east.bsky.network/subscribe".to_string()
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
