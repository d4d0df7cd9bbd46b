pub mod jetstream;

pub use jetstream::{decode_event, JetstreamConsumer, PendingBatch, PostOp};
