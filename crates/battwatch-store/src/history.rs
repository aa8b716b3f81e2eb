//! Fixed-capacity in-memory sample history.

use std::collections::VecDeque;

use battwatch_types::Sample;

/// Default number of samples retained.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Ordered, bounded buffer of the most recently accepted samples.
///
/// Order is arrival order; samples are never re-sorted by their own
/// timestamps. Once `capacity` is reached each append evicts the oldest entry.
///
/// `HistoryStore` performs no locking of its own. Share it behind a mutex and
/// take copies ([`snapshot_all`](Self::snapshot_all), [`tail`](Self::tail))
/// for any work that should not hold the lock.
///
/// ```
/// use battwatch_store::HistoryStore;
/// use battwatch_types::Sample;
///
/// let mut history = HistoryStore::new(2);
/// for v in [12.0, 12.5, 13.0] {
///     history.append(Sample::builder().voltage(v).build());
/// }
///
/// let voltages: Vec<f64> = history.snapshot_all().iter().map(|s| s.voltage).collect();
/// assert_eq!(voltages, vec![12.5, 13.0]);
/// assert_eq!(history.latest().map(|s| s.voltage), Some(13.0));
/// ```
#[derive(Debug, Clone)]
pub struct HistoryStore {
    samples: VecDeque<Sample>,
    capacity: usize,
    total_appends: u64,
}

impl HistoryStore {
    /// Create an empty store. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_appends: 0,
        }
    }

    /// Create a store seeded with restored samples.
    ///
    /// If more than `capacity` samples are supplied only the newest are kept.
    /// Restored samples do not count towards [`total_appends`](Self::total_appends).
    pub fn with_samples(capacity: usize, samples: Vec<Sample>) -> Self {
        let mut store = Self::new(capacity);
        let skip = samples.len().saturating_sub(store.capacity);
        store.samples.extend(samples.into_iter().skip(skip));
        store
    }

    /// Append a sample, evicting the oldest entry if the store is full.
    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        self.total_appends += 1;
    }

    /// The most recently appended sample.
    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Copy of the whole buffer, oldest first.
    pub fn snapshot_all(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// Copy of the newest `min(n, len)` samples, oldest first.
    pub fn tail(&self, n: usize) -> Vec<Sample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no samples are held.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of appends since this store was constructed.
    pub fn total_appends(&self) -> u64 {
        self.total_appends
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
