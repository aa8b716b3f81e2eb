//! History buffer and snapshot persistence for battwatch.
//!
//! This crate keeps the most recent battery samples in memory and writes them
//! to durable storage so the history survives a restart.
//!
//! # Features
//!
//! - Fixed-capacity FIFO history with O(1) append and eviction
//! - Whole-history JSON snapshots written via temp file and rename
//! - Count-based flush policy with a staleness guard against out-of-order writes
//! - In-memory storage backend for tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use battwatch_store::{
//!     FlushPolicy, HistoryStore, JsonFileStorage, PersistenceScheduler, default_snapshot_path,
//! };
//! use battwatch_types::Sample;
//!
//! let storage = Arc::new(JsonFileStorage::new(default_snapshot_path()));
//! let scheduler = PersistenceScheduler::new(storage, FlushPolicy::EveryAppends(10));
//!
//! let mut history = HistoryStore::with_samples(1000, scheduler.load_on_startup());
//! history.append(Sample::builder().voltage(13.2).build());
//! scheduler.maybe_flush(history.total_appends(), &history.snapshot_all());
//! ```

mod error;
mod history;
mod scheduler;
mod snapshot;

pub use error::{Error, Result};
pub use history::{DEFAULT_CAPACITY, HistoryStore};
pub use scheduler::{DEFAULT_FLUSH_INTERVAL, FlushOutcome, FlushPolicy, PersistenceScheduler};
pub use snapshot::{JsonFileStorage, MemoryStorage, SnapshotStorage};

/// Default snapshot path following platform conventions.
///
/// - Linux: `~/.local/share/battwatch/history.json`
/// - macOS: `~/Library/Application Support/battwatch/history.json`
/// - Windows: `C:\Users\<user>\AppData\Local\battwatch\history.json`
pub fn default_snapshot_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("battwatch")
        .join("history.json")
}
