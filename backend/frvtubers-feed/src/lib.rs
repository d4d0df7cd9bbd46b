pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

pub use registry::VtuberRegistry;
pub use services::{FeedAssembler, FeedStrategy, FirehoseSubscription, PostClassifier};
