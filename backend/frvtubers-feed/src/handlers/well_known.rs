use actix_web::{get, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::FeedConfig;
use crate::registry::{RegistryStats, VtuberRegistry};

/// did:web document advertising this host as a feed generator
#[get("/.well-known/did.json")]
pub async fn did_document(config: web::Data<FeedConfig>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": config.service_did(),
        "service": [{
            "id": "#bsky_fg",
            "type": "BskyFeedGenerator",
            "serviceEndpoint": format!("https://{}", config.hostname),
        }],
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub registry: RegistrySummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrySummary {
    pub profiles: usize,
    pub team_profiles: usize,
    pub roster_members: usize,
    pub roster_generated_at: Option<String>,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

impl RegistrySummary {
    fn new(stats: RegistryStats, registry: &VtuberRegistry) -> Self {
        Self {
            profiles: stats.profiles,
            team_profiles: stats.team_profiles,
            roster_members: stats.roster_members,
            roster_generated_at: registry.team_generated_at(),
            last_refresh_at: registry.last_refresh_at(),
        }
    }
}

#[get("/health")]
pub async fn health(registry: web::Data<VtuberRegistry>) -> HttpResponse {
    let summary = RegistrySummary::new(registry.stats(), &registry);
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        registry: summary,
    })
}
