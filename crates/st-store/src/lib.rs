//! Persistence for tuning runs: the overwritten result snapshot and the
//! append-only iteration history.

pub mod history;
pub mod snapshot;

pub use history::HistoryLog;
pub use snapshot::{Snapshot, SnapshotEntry, SnapshotStore};
