//! Curated VTuber catalog and manual overrides
//!
//! The catalog is produced offline by the ingestion tooling and shipped as a
//! JSON document. It may carry a team roster snapshot that seeds the registry
//! until the first live refresh.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::RegistryConfig;
use crate::error::{AppError, Result};
use crate::models::{TeamMember, VtuberProfile};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtuberCatalog {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub profiles: Vec<VtuberProfile>,
    #[serde(default)]
    pub team: Option<TeamSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

impl VtuberCatalog {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Configuration(format!(
                "Failed to load VTuber catalog from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let catalog = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            profiles = catalog.profiles.len(),
            team_members = catalog.team.as_ref().map(|t| t.members.len()).unwrap_or(0),
            "VTuber catalog loaded"
        );
        Ok(catalog)
    }

    /// Catalog from the configured path, or an empty one when none is set
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        match &config.catalog_path {
            Some(path) => Self::load(path),
            None => {
                tracing::warn!("VTUBER_CATALOG_PATH not set - starting with an empty catalog");
                Ok(Self::default())
            }
        }
    }
}

/// Hand-maintained corrections that take precedence over automatic matching
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualOverrides {
    pub team_dids: Vec<String>,
    pub team_handles: Vec<String>,
    pub vtuber_dids: Vec<String>,
    pub vtuber_handles: Vec<String>,
}

impl From<&RegistryConfig> for ManualOverrides {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            team_dids: config.manual_team_dids.clone(),
            team_handles: config.manual_team_handles.clone(),
            vtuber_dids: config.manual_vtuber_dids.clone(),
            vtuber_handles: config.manual_vtuber_handles.clone(),
        }
    }
}
