//! Twitch team roster source
//!
//! App access token via the client-credentials grant, then the Helix
//! `teams` endpoint. Only the first team entry of the response is used.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::RosterConfig;
use crate::error::{AppError, Result};
use crate::models::TeamMember;

const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const TWITCH_HELIX_URL: &str = "https://api.twitch.tv/helix";

/// Roster members as fetched, with the time they were generated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSnapshot {
    pub members: Vec<TeamMember>,
    pub generated_at: Option<String>,
}

#[async_trait]
pub trait RosterSource: Send + Sync {
    /// `Ok(None)` when the source answered but had no roster to offer
    async fn fetch_roster(&self) -> Result<Option<RosterSnapshot>>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TeamResponse {
    #[serde(default)]
    data: Vec<TeamEntry>,
}

#[derive(Debug, Deserialize)]
struct TeamEntry {
    #[serde(default)]
    users: Vec<TeamUser>,
}

#[derive(Debug, Deserialize)]
struct TeamUser {
    user_id: String,
    user_login: String,
    user_name: Option<String>,
    user_display_name: Option<String>,
}

impl From<TeamUser> for TeamMember {
    fn from(user: TeamUser) -> Self {
        let display_name = user
            .user_display_name
            .or(user.user_name)
            .unwrap_or_else(|| user.user_login.clone());
        Self {
            user_id: user.user_id,
            user_login: user.user_login,
            display_name,
        }
    }
}

pub struct TwitchRosterSource {
    client_id: String,
    client_secret: String,
    team_name: String,
    token_url: String,
    helix_url: String,
    http_client: Client,
}

impl TwitchRosterSource {
    /// `Ok(None)` when the client credentials are not configured
    pub fn from_config(config: &RosterConfig) -> Result<Option<Self>> {
        if !config.has_credentials() {
            return Ok(None);
        }

        // Every request is bounded so a stalled Twitch call surfaces as a
        // failed refresh instead of parking the sync loop.
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Some(Self {
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            team_name: config.team_name.clone(),
            token_url: TWITCH_TOKEN_URL.to_string(),
            helix_url: TWITCH_HELIX_URL.to_string(),
            http_client,
        }))
    }

    /// Points the client at other token and Helix hosts
    pub fn with_endpoints(mut self, token_url: &str, helix_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self.helix_url = helix_url.trim_end_matches('/').to_string();
        self
    }

    async fn app_access_token(&self) -> Result<String> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Failed to retrieve Twitch app token ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn team(&self, token: &str) -> Result<TeamResponse> {
        let response = self
            .http_client
            .get(format!("{}/teams", self.helix_url))
            .query(&[("name", self.team_name.as_str())])
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Failed to fetch Twitch team \"{}\" ({}): {}",
                self.team_name, status, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RosterSource for TwitchRosterSource {
    async fn fetch_roster(&self) -> Result<Option<RosterSnapshot>> {
        let token = self.app_access_token().await?;
        let team = self.team(&token).await?;

        let members = match first_team_members(team) {
            Some(members) => members,
            None => {
                tracing::warn!(
                    team = %self.team_name,
                    "Twitch team not found or returned no data"
                );
                return Ok(None);
            }
        };

        Ok(Some(RosterSnapshot {
            members,
            generated_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        }))
    }
}

fn first_team_members(response: TeamResponse) -> Option<Vec<TeamMember>> {
    response
        .data
        .into_iter()
        .next()
        .map(|team| team.users.into_iter().map(TeamMember::from).collect())
}
