//! Team login matching
//!
//! A catalog profile is flagged as a team member when one of its identifiers
//! (Twitch login, handle, handle local part, display name and its tokens)
//! lines up with a login of the current Twitch team roster. Matching is
//! permissive on purpose: exact equality, alphanumeric-normalized equality and
//! substring containment in both directions all count. Manual overrides are
//! the correction mechanism for false positives.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::{TeamMember, VtuberProfile};

/// Lower-cases the value and strips every character outside `[a-z0-9]`.
/// Returns `None` when nothing is left.
pub fn normalize_identifier(value: &str) -> Option<String> {
    let normalized: String = value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Local part of a handle: text after the first `@` (if any), cut at the
/// first `.`. `"@neko.bsky.social"` and `"neko.bsky.social"` both give `"neko"`.
pub fn extract_handle_local_part(handle: &str) -> Option<String> {
    let base = match handle.find('@') {
        Some(idx) => &handle[idx + 1..],
        None => handle,
    };
    let local = base.split('.').next().unwrap_or_default().trim();

    if local.is_empty() {
        None
    } else {
        Some(local.to_string())
    }
}

/// Identifier candidates of a profile in exact (lower-cased) and normalized form
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdentifierCandidates {
    pub exact: HashSet<String>,
    pub normalized: HashSet<String>,
}

impl IdentifierCandidates {
    pub fn from_profile(profile: &VtuberProfile) -> Self {
        let mut candidates = Self::default();

        if let Some(login) = &profile.twitch_login {
            candidates.push(login);
        }
        candidates.push(&profile.handle);
        if let Some(local) = extract_handle_local_part(&profile.handle) {
            candidates.push(&local);
        }

        if let Some(display_name) = &profile.display_name {
            candidates.push(display_name);
            for token in display_name.split(|c: char| c.is_whitespace() || c == '-' || c == '_') {
                candidates.push(token);
            }
        }

        candidates
    }

    fn push(&mut self, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }

        let lower = trimmed.to_lowercase();
        if let Some(normalized) = normalize_identifier(&lower) {
            self.normalized.insert(normalized);
        }
        self.exact.insert(lower);
    }
}

/// Immutable lookup structures derived from one roster snapshot
#[derive(Debug, Default, Clone)]
pub struct RosterIndex {
    members: Vec<TeamMember>,
    logins: HashSet<String>,
    normalized_logins: HashSet<String>,
    generated_at: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl RosterIndex {
    pub fn build(
        members: Vec<TeamMember>,
        generated_at: Option<String>,
        refreshed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut logins = HashSet::new();
        let mut normalized_logins = HashSet::new();

        for member in &members {
            let login = member.user_login.trim().to_lowercase();
            if login.is_empty() {
                continue;
            }
            if let Some(normalized) = normalize_identifier(&login) {
                normalized_logins.insert(normalized);
            }
            logins.insert(login);
        }

        Self {
            members,
            logins,
            normalized_logins,
            generated_at,
            refreshed_at,
        }
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn generated_at(&self) -> Option<&str> {
        self.generated_at.as_deref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn is_empty(&self) -> bool {
        self.logins.is_empty()
    }

    /// Whether the profile lines up with any roster login
    pub fn matches_team_login(&self, profile: &VtuberProfile) -> bool {
        if self.is_empty() {
            return false;
        }

        let candidates = IdentifierCandidates::from_profile(profile);

        if candidates.exact.iter().any(|c| self.logins.contains(c)) {
            return true;
        }
        if candidates
            .normalized
            .iter()
            .any(|c| self.normalized_logins.contains(c))
        {
            return true;
        }

        contains_either_way(&candidates.exact, &self.logins)
            || contains_either_way(&candidates.normalized, &self.normalized_logins)
    }
}

fn contains_either_way(candidates: &HashSet<String>, logins: &HashSet<String>) -> bool {
    candidates.iter().filter(|c| !c.is_empty()).any(|candidate| {
        logins
            .iter()
            .filter(|l| !l.is_empty())
            .any(|login| candidate.contains(login.as_str()) || login.contains(candidate.as_str()))
    })
}
