//! Durable snapshot storage.
//!
//! A snapshot is the complete ordered history at flush time. Every save
//! replaces the previous snapshot wholesale; nothing is merged or appended.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use battwatch_types::Sample;

use crate::error::{Error, Result};

/// Storage port for history snapshots.
///
/// Implementations must make `save` a total replacement: after a successful
/// `save(s)`, `load()` returns exactly `s`.
pub trait SnapshotStorage: Send + Sync {
    /// Read the stored snapshot, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<Sample>>>;

    /// Replace the stored snapshot.
    fn save(&self, samples: &[Sample]) -> Result<()>;
}

/// Snapshot stored as a pretty-printed JSON array in a single file.
///
/// Saves go through a sibling `.tmp` file that is renamed over the target, so
/// an interrupted write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Create storage backed by the file at `path`. The file need not exist.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<Vec<Sample>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Io {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let samples: Vec<Sample> = serde_json::from_slice(&bytes)?;
        debug!("Read {} samples from {}", samples.len(), self.path.display());
        Ok(Some(samples))
    }

    fn save(&self, samples: &[Sample]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_vec_pretty(samples)?;
        let tmp = self.temp_path();

        fs::write(&tmp, json).map_err(|e| Error::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::Io {
            path: self.path.clone(),
            source: e,
        })?;

        debug!("Wrote {} samples to {}", samples.len(), self.path.display());
        Ok(())
    }
}

/// In-process snapshot storage.
///
/// Useful for tests and for running without a writable disk. Writes can be
/// made to fail on demand to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<Option<Vec<Sample>>>,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage that already holds a snapshot.
    pub fn with_snapshot(samples: Vec<Sample>) -> Self {
        Self {
            snapshot: Mutex::new(Some(samples)),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current stored snapshot.
    pub fn stored(&self) -> Option<Vec<Sample>> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<Sample>>> {
        Ok(self.stored())
    }

    fn save(&self, samples: &[Sample]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("simulated write failure"),
            });
        }

        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(samples.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
