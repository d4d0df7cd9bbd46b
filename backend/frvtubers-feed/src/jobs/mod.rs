pub mod roster_sync;

pub use roster_sync::{start_roster_sync, RefreshOutcome, RosterSyncJob};
