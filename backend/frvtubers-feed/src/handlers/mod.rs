pub mod feed;
pub mod well_known;

pub use feed::{describe_feed_generator, get_feed_skeleton, FeedHandlerState, FEED_SHORTNAME};
pub use well_known::{did_document, health};
