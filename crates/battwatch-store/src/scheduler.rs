//! Decides when the history is written to durable storage.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use battwatch_types::Sample;

use crate::snapshot::SnapshotStorage;

/// Default number of appends between flushes.
pub const DEFAULT_FLUSH_INTERVAL: u64 = 10;

/// When to write a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Flush whenever the append counter reaches a multiple of `k`.
    EveryAppends(u64),
    /// Only flush when asked to explicitly.
    Manual,
}

impl FlushPolicy {
    /// Build a policy from a configured interval; zero means [`FlushPolicy::Manual`].
    pub fn from_interval(interval: u64) -> Self {
        if interval == 0 {
            Self::Manual
        } else {
            Self::EveryAppends(interval)
        }
    }

    /// Whether an append that brought the counter to `total` should trigger a flush.
    pub fn should_flush(&self, total: u64) -> bool {
        match *self {
            Self::EveryAppends(k) => k > 0 && total > 0 && total % k == 0,
            Self::Manual => false,
        }
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::EveryAppends(DEFAULT_FLUSH_INTERVAL)
    }
}

impl fmt::Display for FlushPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EveryAppends(k) => write!(f, "every {} appends", k),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Result of a flush attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The policy did not call for a write, or this snapshot is already stored.
    Skipped,
    /// The snapshot was written.
    Written { samples: usize },
    /// A newer snapshot had already been written; this one was dropped.
    Superseded,
    /// The write failed. The previous snapshot, if any, is unchanged.
    Failed(String),
}

impl FlushOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Writes history snapshots according to a [`FlushPolicy`].
///
/// Each snapshot is tagged with the append counter it was taken at. Writes are
/// serialized, and a snapshot older than the last one written is discarded, so
/// concurrent flushes can finish in any order without the stored snapshot ever
/// going backwards.
///
/// All methods block on file I/O. Async callers should run them on a blocking
/// worker.
pub struct PersistenceScheduler {
    storage: Arc<dyn SnapshotStorage>,
    policy: FlushPolicy,
    /// Counter of the last snapshot written. Also serves as the writer lock.
    last_persisted: Mutex<Option<u64>>,
}

impl PersistenceScheduler {
    pub fn new(storage: Arc<dyn SnapshotStorage>, policy: FlushPolicy) -> Self {
        Self {
            storage,
            policy,
            last_persisted: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Append counter of the most recent successful write.
    pub fn last_persisted(&self) -> Option<u64> {
        *self
            .last_persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`FlushPolicy::should_flush`].
    pub fn should_flush(&self, total: u64) -> bool {
        self.policy.should_flush(total)
    }

    /// Write `snapshot` if the policy calls for it at `total`.
    pub fn maybe_flush(&self, total: u64, snapshot: &[Sample]) -> FlushOutcome {
        if !self.should_flush(total) {
            return FlushOutcome::Skipped;
        }
        self.flush(total, snapshot)
    }

    /// Write `snapshot` regardless of policy.
    pub fn flush(&self, total: u64, snapshot: &[Sample]) -> FlushOutcome {
        let mut last = self
            .last_persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match *last {
            Some(persisted) if total < persisted => {
                debug!(
                    "Dropping snapshot at {} appends, {} already persisted",
                    total, persisted
                );
                return FlushOutcome::Superseded;
            }
            Some(persisted) if total == persisted => return FlushOutcome::Skipped,
            _ => {}
        }

        match self.storage.save(snapshot) {
            Ok(()) => {
                *last = Some(total);
                debug!(
                    "Persisted {} samples at {} appends",
                    snapshot.len(),
                    total
                );
                FlushOutcome::Written {
                    samples: snapshot.len(),
                }
            }
            Err(e) => {
                warn!("Failed to persist history snapshot: {}", e);
                FlushOutcome::Failed(e.to_string())
            }
        }
    }

    /// Read the stored snapshot for startup.
    ///
    /// A missing snapshot yields an empty history. So does an unreadable or
    /// corrupt one, after a warning; startup never fails because of it.
    pub fn load_on_startup(&self) -> Vec<Sample> {
        match self.storage.load() {
            Ok(Some(samples)) => {
                info!("Restored {} samples from snapshot", samples.len());
                samples
            }
            Ok(None) => {
                info!("No snapshot found, starting with empty history");
                Vec::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable snapshot, starting empty: {}", e);
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for PersistenceScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceScheduler")
            .field("policy", &self.policy)
            .field("last_persisted", &self.last_persisted())
            .finish_non_exhaustive()
    }
}
