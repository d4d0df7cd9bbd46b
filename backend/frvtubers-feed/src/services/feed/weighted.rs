//! Weighted down-sampling of recent posts
//!
//! Each candidate gets a pseudo-random but stable score derived from its URI.
//! Lower tiers are accepted with a lower probability; team posts are always
//! kept. Slots left empty are backfilled in fetch order so a page is only
//! short when the candidate window itself is.

use sha2::{Digest, Sha256};

use crate::models::PostRecord;

/// Upper bound of the candidate window fetched per page
pub const MAX_CANDIDATE_WINDOW: usize = 200;

/// Number of candidates to fetch for a page of `limit` posts
pub fn candidate_window(limit: usize) -> usize {
    (limit * 3).max(limit + 10).min(MAX_CANDIDATE_WINDOW)
}

/// Acceptance probability of a priority tier, clamped to `0..=2`
pub fn acceptance_for(priority: i16) -> f64 {
    match priority.clamp(0, 2) {
        2 => 1.0,
        1 => 0.65,
        _ => 0.35,
    }
}

/// First 32 bits of SHA-256(uri) as a big-endian integer, scaled to `[0, 1]`
pub fn uri_score(uri: &str) -> f64 {
    let digest = Sha256::digest(uri.as_bytes());
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    head as f64 / u32::MAX as f64
}

/// Picks up to `limit` candidates, returned in their original order
pub fn select_weighted(candidates: &[PostRecord], limit: usize) -> Vec<PostRecord> {
    if limit == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut picked = vec![false; candidates.len()];
    let mut count = 0;

    for (idx, record) in candidates.iter().enumerate() {
        if count == limit {
            break;
        }
        let acceptance = acceptance_for(record.priority);
        if acceptance >= 1.0 || uri_score(&record.uri) <= acceptance {
            picked[idx] = true;
            count += 1;
        }
    }

    // Backfill
    for slot in picked.iter_mut() {
        if count == limit {
            break;
        }
        if !*slot {
            *slot = true;
            count += 1;
        }
    }

    candidates
        .iter()
        .zip(picked)
        .filter(|(_, keep)| *keep)
        .map(|(record, _)| record.clone())
        .collect()
}
