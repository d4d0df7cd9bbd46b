//! VTuber classification registry
//!
//! Resolves an author DID to a priority tier:
//! - 2: member of the Twitch team (catalog flag, roster match or manual tag)
//! - 1: known VTuber from the catalog or manual additions
//! - 0: anyone else
//!
//! State is published as immutable [`RegistrySnapshot`]s. A roster refresh
//! builds a complete new snapshot and swaps the `Arc`, so readers see either
//! the previous state or the fully recomputed one.

pub mod catalog;
pub mod keywords;
pub mod matching;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::models::{TeamMember, VtuberProfile};

pub use catalog::{ManualOverrides, TeamSnapshot, VtuberCatalog};
pub use keywords::KeywordCorpus;
pub use matching::RosterIndex;

pub const PRIORITY_TEAM: u8 = 2;
pub const PRIORITY_KNOWN: u8 = 1;
pub const PRIORITY_UNKNOWN: u8 = 0;

/// Profile and team counts exposed for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub profiles: usize,
    pub team_profiles: usize,
    pub roster_members: usize,
}

/// One consistent view of profiles, team flags and the roster they were
/// computed from
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    profiles: HashMap<String, VtuberProfile>,
    handles: HashMap<String, String>,
    team: HashSet<String>,
    roster: RosterIndex,
}

impl RegistrySnapshot {
    pub fn priority_of(&self, did: &str) -> u8 {
        if self.team.contains(did) {
            PRIORITY_TEAM
        } else if self.profiles.contains_key(did) {
            PRIORITY_KNOWN
        } else {
            PRIORITY_UNKNOWN
        }
    }

    pub fn profile_of(&self, did: &str) -> Option<&VtuberProfile> {
        self.profiles.get(did)
    }

    pub fn profile_by_handle(&self, handle: &str) -> Option<&VtuberProfile> {
        self.handles
            .get(&handle.trim().to_lowercase())
            .and_then(|did| self.profiles.get(did))
    }

    pub fn roster(&self) -> &RosterIndex {
        &self.roster
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            profiles: self.profiles.len(),
            team_profiles: self.team.len(),
            roster_members: self.roster.members().len(),
        }
    }
}

pub struct VtuberRegistry {
    /// Catalog profiles and manual additions carrying their base team flag
    base_profiles: HashMap<String, VtuberProfile>,
    /// Manual team tags resolved to DIDs
    manual_team: HashSet<String>,
    /// Lower-cased handle to DID, first catalog entry wins
    handles: HashMap<String, String>,
    keywords: KeywordCorpus,
    current: RwLock<Arc<RegistrySnapshot>>,
    writer: Mutex<()>,
}

impl VtuberRegistry {
    /// Loads the catalog, applies manual overrides and seeds the roster with
    /// the snapshot bundled in the catalog, if any.
    pub fn new(catalog: VtuberCatalog, overrides: ManualOverrides) -> Self {
        let keywords = KeywordCorpus::from_profiles(&catalog.profiles);

        let mut base_profiles: HashMap<String, VtuberProfile> = HashMap::new();
        let mut handles: HashMap<String, String> = HashMap::new();
        for mut profile in catalog.profiles {
            profile.did = profile.did.trim().to_string();
            profile.handle = profile.handle.to_lowercase();
            if base_profiles.contains_key(&profile.did) {
                tracing::warn!(did = %profile.did, "Duplicate catalog DID, keeping first entry");
                continue;
            }
            index_handle(&mut handles, &profile);
            base_profiles.insert(profile.did.clone(), profile);
        }

        for did in overrides.vtuber_dids.iter().filter(|d| !d.trim().is_empty()) {
            let did = ensure_profile(&mut base_profiles, did);
            if let Some(profile) = base_profiles.get(&did) {
                index_handle(&mut handles, profile);
            }
        }

        for handle in &overrides.vtuber_handles {
            if !handles.contains_key(&handle.trim().to_lowercase()) {
                tracing::warn!(handle = %handle, "Manual VTuber handle not found in catalog");
            }
        }

        let mut manual_team = HashSet::new();
        for did in overrides.team_dids.iter().filter(|d| !d.trim().is_empty()) {
            let did = ensure_profile(&mut base_profiles, did);
            if let Some(profile) = base_profiles.get(&did) {
                index_handle(&mut handles, profile);
            }
            manual_team.insert(did);
        }
        for handle in &overrides.team_handles {
            match handles.get(&handle.trim().to_lowercase()) {
                Some(did) => {
                    manual_team.insert(did.clone());
                }
                None => {
                    tracing::warn!(handle = %handle, "Manual team handle not found in catalog");
                }
            }
        }

        let (members, generated_at) = match catalog.team {
            Some(team) => (team.members, team.generated_at.or(catalog.generated_at)),
            None => (Vec::new(), None),
        };
        let roster = RosterIndex::build(members, generated_at, None);
        let snapshot = build_snapshot(&base_profiles, &manual_team, &handles, roster);

        tracing::info!(
            profiles = snapshot.profiles.len(),
            team_profiles = snapshot.team.len(),
            roster_members = snapshot.roster.members().len(),
            topic_keywords = keywords.topic_keywords().len(),
            "VTuber registry initialized"
        );

        Self {
            base_profiles,
            manual_team,
            handles,
            keywords,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        }
    }

    /// Current snapshot; hold on to it for the duration of a batch
    pub fn current(&self) -> Arc<RegistrySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn priority_of(&self, did: &str) -> u8 {
        self.current().priority_of(did)
    }

    pub fn profile_of(&self, did: &str) -> Option<VtuberProfile> {
        self.current().profile_of(did).cloned()
    }

    pub fn profile_by_handle(&self, handle: &str) -> Option<VtuberProfile> {
        self.current().profile_by_handle(handle).cloned()
    }

    /// Replaces the roster and recomputes every team flag.
    ///
    /// A missing `generated_at` keeps the previous generation timestamp.
    pub fn refresh_roster(
        &self,
        members: Vec<TeamMember>,
        generated_at: Option<String>,
    ) -> RegistryStats {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let generated_at = generated_at.or_else(|| {
            self.current()
                .roster
                .generated_at()
                .map(str::to_string)
        });
        let roster = RosterIndex::build(members, generated_at, Some(Utc::now()));
        let snapshot = Arc::new(build_snapshot(
            &self.base_profiles,
            &self.manual_team,
            &self.handles,
            roster,
        ));
        let stats = snapshot.stats();

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;

        tracing::info!(
            roster_members = stats.roster_members,
            team_profiles = stats.team_profiles,
            "Team roster applied"
        );
        stats
    }

    pub fn team_members(&self) -> Vec<TeamMember> {
        self.current().roster.members().to_vec()
    }

    pub fn team_generated_at(&self) -> Option<String> {
        self.current().roster.generated_at().map(str::to_string)
    }

    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.current().roster.refreshed_at()
    }

    pub fn stats(&self) -> RegistryStats {
        self.current().stats()
    }

    pub fn keywords(&self) -> &KeywordCorpus {
        &self.keywords
    }
}

fn ensure_profile(profiles: &mut HashMap<String, VtuberProfile>, did: &str) -> String {
    let did = did.trim().to_string();
    profiles
        .entry(did.clone())
        .or_insert_with(|| VtuberProfile::bare(&did, None));
    did
}

/// Adds the profile's handle unless another DID already claimed it
fn index_handle(handles: &mut HashMap<String, String>, profile: &VtuberProfile) {
    let handle = profile.handle.to_lowercase();
    match handles.get(&handle) {
        Some(existing) if existing != &profile.did => {
            tracing::warn!(
                handle = %handle,
                kept = %existing,
                ignored = %profile.did,
                "Handle shared by several catalog profiles, keeping first"
            );
        }
        Some(_) => {}
        None => {
            handles.insert(handle, profile.did.clone());
        }
    }
}

/// Pure recomputation of team flags: base flag, then roster match, then
/// manual tags which always win.
fn build_snapshot(
    base_profiles: &HashMap<String, VtuberProfile>,
    manual_team: &HashSet<String>,
    handles: &HashMap<String, String>,
    roster: RosterIndex,
) -> RegistrySnapshot {
    let mut profiles = HashMap::with_capacity(base_profiles.len());
    let mut team = HashSet::new();

    for (did, base) in base_profiles {
        let mut profile = base.clone();
        profile.is_fr_vtubers_team = base.is_fr_vtubers_team
            || roster.matches_team_login(base)
            || manual_team.contains(did);

        if profile.is_fr_vtubers_team {
            team.insert(did.clone());
        }
        profiles.insert(did.clone(), profile);
    }

    RegistrySnapshot {
        handles: handles.clone(),
        profiles,
        team,
        roster,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(login: &str) -> TeamMember {
        TeamMember {
            user_id: format!("id-{}", login),
            user_login: login.to_string(),
            display_name: login.to_string(),
        }
    }

    fn profile(did: &str, handle: &str, twitch: Option<&str>, team: bool) -> VtuberProfile {
        VtuberProfile {
            twitch_login: twitch.map(str::to_string),
            is_fr_vtubers_team: team,
            ..VtuberProfile::bare(did, Some(handle))
        }
    }

    fn catalog(profiles: Vec<VtuberProfile>, team: Option<Vec<TeamMember>>) -> VtuberCatalog {
        VtuberCatalog {
            generated_at: Some("2025-01-01T00:00:00.000Z".into()),
            profiles,
            team: team.map(|members| TeamSnapshot {
                generated_at: None,
                members,
            }),
        }
    }

    #[test]
    fn test_priority_tiers() {
        let registry = VtuberRegistry::new(
            catalog(
                vec![
                    profile("did:plc:team", "team.bsky.social", None, true),
                    profile("did:plc:known", "known.bsky.social", None, false),
                ],
                None,
            ),
            ManualOverrides::default(),
        );

        assert_eq!(registry.priority_of("did:plc:team"), PRIORITY_TEAM);
        assert_eq!(registry.priority_of("did:plc:known"), PRIORITY_KNOWN);
        assert_eq!(registry.priority_of("did:plc:stranger"), PRIORITY_UNKNOWN);
    }

    #[test]
    fn test_profile_lookup_by_handle_is_case_insensitive() {
        let registry = VtuberRegistry::new(
            catalog(vec![profile("did:plc:a", "Neko.BSKY.social", None, false)], None),
            ManualOverrides::default(),
        );

        let found = registry.profile_by_handle("NEKO.bsky.social").unwrap();
        assert_eq!(found.did, "did:plc:a");
        assert_eq!(registry.profile_of("did:plc:a").unwrap().handle, "neko.bsky.social");
    }

    #[test]
    fn test_shared_handle_keeps_first_catalog_entry() {
        let profiles = vec![
            profile("did:plc:first", "Neko.bsky.social", None, false),
            profile("did:plc:second", "neko.bsky.social", None, false),
            profile("did:plc:first", "other.bsky.social", None, true),
        ];

        for _ in 0..10 {
            let registry = VtuberRegistry::new(
                catalog(profiles.clone(), None),
                ManualOverrides {
                    team_handles: vec!["NEKO.bsky.social".into()],
                    ..ManualOverrides::default()
                },
            );

            let found = registry.profile_by_handle("neko.bsky.social").unwrap();
            assert_eq!(found.did, "did:plc:first");
            assert_eq!(registry.priority_of("did:plc:first"), PRIORITY_TEAM);
            assert_eq!(registry.priority_of("did:plc:second"), PRIORITY_KNOWN);
            // Duplicate DID entries do not replace the first one
            assert!(registry.profile_by_handle("other.bsky.social").is_none());

            registry.refresh_roster(Vec::new(), None);
            assert_eq!(
                registry.profile_by_handle("neko.bsky.social").unwrap().did,
                "did:plc:first"
            );
        }
    }

    #[test]
    fn test_bundled_roster_seeds_team() {
        let registry = VtuberRegistry::new(
            catalog(
                vec![profile("did:plc:alice", "alice.bsky.social", Some("alice_vt"), false)],
                Some(vec![member("alice_vt")]),
            ),
            ManualOverrides::default(),
        );

        assert_eq!(registry.priority_of("did:plc:alice"), PRIORITY_TEAM);
        assert_eq!(
            registry.team_generated_at().as_deref(),
            Some("2025-01-01T00:00:00.000Z")
        );
        assert!(registry.last_refresh_at().is_none());
    }

    #[test]
    fn test_roster_refresh_moves_team_membership() {
        let registry = VtuberRegistry::new(
            catalog(
                vec![
                    profile("did:plc:alice", "alice.bsky.social", Some("alice_vt"), false),
                    profile("did:plc:bob", "bob.bsky.social", Some("bob_vt"), false),
                ],
                Some(vec![member("alice_vt")]),
            ),
            ManualOverrides::default(),
        );
        assert_eq!(registry.priority_of("did:plc:alice"), PRIORITY_TEAM);
        assert_eq!(registry.priority_of("did:plc:bob"), PRIORITY_KNOWN);

        let before = registry.current();
        let stats = registry.refresh_roster(vec![member("bob_vt")], Some("2025-02-01".into()));

        assert_eq!(stats.roster_members, 1);
        assert_eq!(registry.priority_of("did:plc:alice"), PRIORITY_KNOWN);
        assert_eq!(registry.priority_of("did:plc:bob"), PRIORITY_TEAM);
        assert!(registry.last_refresh_at().is_some());

        // A snapshot taken before the refresh is unaffected
        assert_eq!(before.priority_of("did:plc:alice"), PRIORITY_TEAM);
        assert_eq!(before.priority_of("did:plc:bob"), PRIORITY_KNOWN);
    }

    #[test]
    fn test_base_team_flag_survives_empty_roster() {
        let registry = VtuberRegistry::new(
            catalog(vec![profile("did:plc:base", "base.bsky.social", None, true)], None),
            ManualOverrides::default(),
        );

        registry.refresh_roster(Vec::new(), None);
        assert_eq!(registry.priority_of("did:plc:base"), PRIORITY_TEAM);
    }

    #[test]
    fn test_manual_overrides_win() {
        let overrides = ManualOverrides {
            team_dids: vec!["did:plc:outsider".into()],
            team_handles: vec!["Carol.bsky.social".into(), "ghost.bsky.social".into()],
            vtuber_dids: vec!["did:plc:extra".into()],
            vtuber_handles: vec![],
        };
        let registry = VtuberRegistry::new(
            catalog(vec![profile("did:plc:carol", "carol.bsky.social", None, false)], None),
            overrides,
        );

        assert_eq!(registry.priority_of("did:plc:carol"), PRIORITY_TEAM);
        assert_eq!(registry.priority_of("did:plc:extra"), PRIORITY_KNOWN);

        // Manual team DID outside the catalog gets a minimal profile
        let outsider = registry.profile_of("did:plc:outsider").unwrap();
        assert_eq!(outsider.handle, "did:plc:outsider");
        assert!(outsider.is_fr_vtubers_team);

        registry.refresh_roster(Vec::new(), None);
        assert_eq!(registry.priority_of("did:plc:carol"), PRIORITY_TEAM);
        assert_eq!(registry.priority_of("did:plc:outsider"), PRIORITY_TEAM);
    }

    #[test]
    fn test_missing_generated_at_keeps_previous() {
        let registry = VtuberRegistry::new(catalog(vec![], Some(vec![])), ManualOverrides::default());
        registry.refresh_roster(vec![member("x")], Some("2025-03-01".into()));
        registry.refresh_roster(vec![member("y")], None);

        assert_eq!(registry.team_generated_at().as_deref(), Some("2025-03-01"));
        assert_eq!(registry.team_members()[0].user_login, "y");
    }

    #[test]
    fn test_stats() {
        let registry = VtuberRegistry::new(
            catalog(
                vec![
                    profile("did:plc:a", "a.bsky.social", None, true),
                    profile("did:plc:b", "b.bsky.social", None, false),
                ],
                None,
            ),
            ManualOverrides::default(),
        );

        assert_eq!(
            registry.stats(),
            RegistryStats {
                profiles: 2,
                team_profiles: 1,
                roster_members: 0,
            }
        );
    }
}
