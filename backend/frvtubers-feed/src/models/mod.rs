use serde::{Deserialize, Serialize};

/// Collection of Bluesky posts; the only collection the feed ingests
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// A known VTuber account from the curated catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtuberProfile {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub matched_terms: Vec<String>,
    #[serde(default)]
    pub twitch_login: Option<String>,
    #[serde(default)]
    pub is_fr_vtubers_team: bool,
}

impl VtuberProfile {
    /// Minimal profile for an identity that is only known by its DID
    pub fn bare(did: &str, handle: Option<&str>) -> Self {
        let did = did.trim().to_string();
        let handle = handle.unwrap_or(&did).to_lowercase();
        Self {
            did,
            handle,
            display_name: None,
            description: None,
            score: 0.0,
            matched_terms: Vec::new(),
            twitch_login: None,
            is_fr_vtubers_team: false,
        }
    }
}

/// One entry of the Twitch team roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user_id: String,
    pub user_login: String,
    pub display_name: String,
}

/// Accepted post as persisted in the `post` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub uri: String,
    pub cid: String,
    pub author: String,
    pub priority: i16,
    pub indexed_at: String,
}

/// Post record body as carried by a create operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub langs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOp {
    pub uri: String,
    pub cid: String,
    pub author: String,
    pub record: PostContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOp {
    pub uri: String,
}

/// Post operations decoded from one or more repository commits, handled as a
/// single unit by the subscription
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitBatch {
    pub creates: Vec<CreateOp>,
    pub deletes: Vec<DeleteOp>,
}

impl CommitBatch {
    pub fn len(&self) -> usize {
        self.creates.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty()
    }
}

/// Feed skeleton item: a reference to a post by URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonFeedPost {
    pub post: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSkeleton {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub feed: Vec<SkeletonFeedPost>,
}
