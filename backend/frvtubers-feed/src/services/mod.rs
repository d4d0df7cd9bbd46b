//! Service layer
//!
//! - classifier: keep/drop decision for firehose posts
//! - subscription: batch handling between the firehose and the store
//! - feed: page assembly for the feed skeleton endpoint
//! - roster_source: Twitch team roster client

pub mod classifier;
pub mod feed;
pub mod roster_source;
pub mod subscription;

pub use classifier::{PostClassifier, RejectReason, Verdict};
pub use feed::{FeedAssembler, FeedStrategy};
pub use roster_source::{RosterSnapshot, RosterSource, TwitchRosterSource};
pub use subscription::{BatchOutcome, FirehoseSubscription};
