//! Application state shared across handlers.
//!
//! # Locking
//!
//! The history buffer sits behind a single async mutex. Every handler holds it
//! only long enough to append or copy samples out. State-of-health scoring and
//! snapshot writes run on those copies after the lock is released, so a slow
//! disk never stalls ingestion or queries.
//!
//! Snapshot writes run on the blocking thread pool via
//! [`tokio::task::spawn_blocking`]. Out-of-order completion is handled by the
//! [`PersistenceScheduler`], which drops any snapshot older than the last one
//! written.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use battwatch_core::soh::MIN_SAMPLES;
use battwatch_core::{SohEstimate, SohEstimator, VoltageStats};
use battwatch_store::{FlushOutcome, HistoryStore, PersistenceScheduler};
use battwatch_types::Sample;

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// Recent samples, oldest first.
    history: Mutex<HistoryStore>,
    /// Snapshot writer.
    scheduler: Arc<PersistenceScheduler>,
    /// Configuration the service was started with.
    config: Config,
    estimator: SohEstimator,
}

impl AppState {
    /// Create state around an existing history buffer.
    pub fn new(history: HistoryStore, scheduler: PersistenceScheduler, config: Config) -> Arc<Self> {
        Arc::new(Self {
            history: Mutex::new(history),
            scheduler: Arc::new(scheduler),
            config,
            estimator: SohEstimator::default(),
        })
    }

    /// Create state with history restored from the scheduler's snapshot.
    ///
    /// Performs blocking file I/O; call it before the server starts.
    pub fn restore(scheduler: PersistenceScheduler, config: Config) -> Arc<Self> {
        let restored = scheduler.load_on_startup();
        let history = HistoryStore::with_samples(config.history.capacity, restored);
        info!(
            "History ready with {} of {} samples",
            history.len(),
            history.capacity()
        );
        Self::new(history, scheduler, config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Record a validated sample and flush if the policy calls for it.
    pub async fn ingest(&self, sample: Sample) -> IngestReceipt {
        let (total_appends, snapshot) = {
            let mut history = self.history.lock().await;
            history.append(sample);
            let total = history.total_appends();
            let snapshot = self
                .scheduler
                .should_flush(total)
                .then(|| history.snapshot_all());
            (total, snapshot)
        };

        debug!(
            "Received sample #{}: {:.2} V, {:.2} A",
            total_appends, sample.voltage, sample.current
        );

        let flush = match snapshot {
            Some(snapshot) => self.persist(total_appends, snapshot).await,
            None => FlushOutcome::Skipped,
        };

        IngestReceipt {
            sample,
            total_appends,
            flush,
        }
    }

    /// Latest sample together with the current state-of-health score.
    pub async fn latest_with_health(&self) -> LatestStatus {
        let (latest, window) = {
            let history = self.history.lock().await;
            (history.latest(), history.tail(self.estimator.window()))
        };

        match latest {
            Some(sample) => LatestStatus::Reading {
                sample,
                soh: self.estimator.compute(&window).value(),
            },
            None => LatestStatus::NoData,
        }
    }

    /// The most recent samples, oldest first.
    ///
    /// `None` uses the configured default limit. Any value is clamped to
    /// `[0, min(max_limit, capacity)]`, so a negative limit yields an empty page.
    pub async fn history(&self, limit: Option<i64>) -> HistoryPage {
        let history = self.history.lock().await;
        let upper = self.config.history.max_limit.min(history.capacity());
        let requested = limit.unwrap_or(self.config.history.default_limit as i64);
        let n = requested.clamp(0, upper as i64) as usize;

        let data = history.tail(n);
        HistoryPage {
            count: data.len(),
            data,
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        let data_point_count = self.history.lock().await.len();
        HealthReport {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            timestamp: OffsetDateTime::now_utc(),
            data_point_count,
        }
    }

    /// State-of-health score with the inputs that produced it.
    pub async fn soh_report(&self) -> SohReport {
        let window = self.history.lock().await.tail(self.estimator.window());
        let estimate = self.estimator.compute(&window);

        let detail = match estimate {
            SohEstimate::Scored(_) => None,
            SohEstimate::InsufficientData { available } => Some(format!(
                "{} of {} samples required",
                available, MIN_SAMPLES
            )),
            SohEstimate::Fallback(e) => Some(e.to_string()),
        };

        SohReport {
            soh: estimate.value(),
            outcome: estimate.kind(),
            window: self.estimator.window(),
            samples_considered: window.len(),
            voltage: VoltageStats::from_samples(&window),
            detail,
        }
    }

    /// Write the whole history now, regardless of flush policy.
    pub async fn flush_now(&self) -> FlushOutcome {
        let (total, snapshot) = {
            let history = self.history.lock().await;
            (history.total_appends(), history.snapshot_all())
        };
        self.persist(total, snapshot).await
    }

    async fn persist(&self, total: u64, snapshot: Vec<Sample>) -> FlushOutcome {
        let scheduler = Arc::clone(&self.scheduler);
        match tokio::task::spawn_blocking(move || scheduler.flush(total, &snapshot)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Snapshot task failed: {}", e);
                FlushOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Result of accepting one sample.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    /// The sample as stored.
    pub sample: Sample,
    /// Appends since startup, including this one.
    pub total_appends: u64,
    /// What happened to the snapshot triggered by this append, if any.
    pub flush: FlushOutcome,
}

/// Answer to "what is the battery doing right now".
#[derive(Debug, Clone, PartialEq)]
pub enum LatestStatus {
    Reading { sample: Sample, soh: f64 },
    NoData,
}

/// A page of recent history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub count: usize,
    pub data: Vec<Sample>,
}

/// Liveness summary.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub data_point_count: usize,
}

/// Detailed state-of-health breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct SohReport {
    /// Reported score.
    pub soh: f64,
    /// `scored`, `insufficient_data` or `fallback`.
    pub outcome: &'static str,
    /// Configured window size.
    pub window: usize,
    /// Samples actually in the window.
    pub samples_considered: usize,
    /// Voltage statistics over the window, if any samples exist.
    pub voltage: Option<VoltageStats>,
    /// Why no score was computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use battwatch_store::{FlushPolicy, MemoryStorage};

    fn sample(voltage: f64) -> Sample {
        Sample::builder()
            .voltage(voltage)
            .current(1.0)
            .temperature(20.0)
            .position(10.0, 20.0)
            .build()
    }

    fn create_test_state(policy: FlushPolicy) -> (Arc<MemoryStorage>, Arc<AppState>) {
        let storage = Arc::new(MemoryStorage::new());
        let scheduler = PersistenceScheduler::new(storage.clone(), policy);
        let config = Config::default();
        let history = HistoryStore::new(config.history.capacity);
        (storage, AppState::new(history, scheduler, config))
    }

    fn small_config(capacity: usize, default_limit: usize, max_limit: usize) -> Config {
        let mut config = Config::default();
        config.history.capacity = capacity;
        config.history.default_limit = default_limit;
        config.history.max_limit = max_limit;
        config
    }

    #[tokio::test]
    async fn test_app_state_new_is_empty() {
        let (_, state) = create_test_state(FlushPolicy::default());
        assert_eq!(state.latest_with_health().await, LatestStatus::NoData);
        assert_eq!(state.health_check().await.data_point_count, 0);
        assert_eq!(state.history(None).await.count, 0);
    }

    #[tokio::test]
    async fn test_ingest_then_latest() {
        let (_, state) = create_test_state(FlushPolicy::default());

        let receipt = state.ingest(sample(12.6)).await;
        assert_eq!(receipt.total_appends, 1);
        assert_eq!(receipt.flush, FlushOutcome::Skipped);

        match state.latest_with_health().await {
            LatestStatus::Reading { sample, soh } => {
                assert_eq!(sample.voltage, 12.6);
                // Fewer than the minimum samples reports full health.
                assert_eq!(soh, 100.0);
            }
            LatestStatus::NoData => panic!("expected a reading"),
        }
    }

    #[tokio::test]
    async fn test_latest_scores_window() {
        let (_, state) = create_test_state(FlushPolicy::Manual);
        for _ in 0..12 {
            state.ingest(sample(13.4)).await;
        }

        match state.latest_with_health().await {
            LatestStatus::Reading { soh, .. } => assert_eq!(soh, 96.5),
            LatestStatus::NoData => panic!("expected a reading"),
        }
    }

    #[tokio::test]
    async fn test_ingest_flushes_every_k() {
        let (storage, state) = create_test_state(FlushPolicy::EveryAppends(10));

        for i in 1..=25u64 {
            let receipt = state.ingest(sample(12.0)).await;
            assert_eq!(receipt.flush.is_written(), i % 10 == 0);
        }

        assert_eq!(storage.save_count(), 2);
        assert_eq!(storage.stored().map(|s| s.len()), Some(20));
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_sample() {
        let (storage, state) = create_test_state(FlushPolicy::EveryAppends(1));
        storage.set_fail_writes(true);

        let receipt = state.ingest(sample(12.2)).await;
        assert!(matches!(receipt.flush, FlushOutcome::Failed(_)));
        assert_eq!(state.health_check().await.data_point_count, 1);
        assert!(storage.stored().is_none());
    }

    #[tokio::test]
    async fn test_history_limits() {
        let storage = Arc::new(MemoryStorage::new());
        let scheduler = PersistenceScheduler::new(storage, FlushPolicy::Manual);
        let config = small_config(50, 5, 20);
        let state = AppState::new(HistoryStore::new(50), scheduler, config);

        for i in 0..40 {
            state.ingest(sample(i as f64)).await;
        }

        let page = state.history(None).await;
        assert_eq!(page.count, 5);
        let voltages: Vec<f64> = page.data.iter().map(|s| s.voltage).collect();
        assert_eq!(voltages, vec![35.0, 36.0, 37.0, 38.0, 39.0]);

        assert_eq!(state.history(Some(3)).await.count, 3);
        assert_eq!(state.history(Some(0)).await.count, 0);
        assert_eq!(state.history(Some(-7)).await.count, 0);
        assert_eq!(state.history(Some(1_000_000)).await.count, 20);
    }

    #[tokio::test]
    async fn test_history_limit_bounded_by_capacity() {
        let storage = Arc::new(MemoryStorage::new());
        let scheduler = PersistenceScheduler::new(storage, FlushPolicy::Manual);
        let state = AppState::new(HistoryStore::new(8), scheduler, small_config(8, 5, 100));

        for i in 0..30 {
            state.ingest(sample(i as f64)).await;
        }

        let page = state.history(Some(100)).await;
        assert_eq!(page.count, 8);
        assert_eq!(page.data.last().map(|s| s.voltage), Some(29.0));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_, state) = create_test_state(FlushPolicy::Manual);
        state.ingest(sample(12.0)).await;
        state.ingest(sample(12.1)).await;

        let report = state.health_check().await;
        assert_eq!(report.status, "healthy");
        assert_eq!(report.data_point_count, 2);
        assert!(!report.version.is_empty());
    }

    #[tokio::test]
    async fn test_soh_report_insufficient() {
        let (_, state) = create_test_state(FlushPolicy::Manual);
        for _ in 0..3 {
            state.ingest(sample(12.8)).await;
        }

        let report = state.soh_report().await;
        assert_eq!(report.soh, 100.0);
        assert_eq!(report.outcome, "insufficient_data");
        assert_eq!(report.samples_considered, 3);
        assert_eq!(report.detail.as_deref(), Some("3 of 10 samples required"));
        assert_eq!(report.voltage.map(|v| v.max), Some(12.8));
    }

    #[tokio::test]
    async fn test_soh_report_fallback_on_zero_voltage() {
        let (_, state) = create_test_state(FlushPolicy::Manual);
        for _ in 0..10 {
            state.ingest(sample(0.0)).await;
        }

        let report = state.soh_report().await;
        assert_eq!(report.soh, 95.0);
        assert_eq!(report.outcome, "fallback");
        assert!(report.detail.is_some());
    }

    #[tokio::test]
    async fn test_soh_report_scored() {
        let (_, state) = create_test_state(FlushPolicy::Manual);
        for _ in 0..150 {
            state.ingest(sample(14.0)).await;
        }

        let report = state.soh_report().await;
        assert_eq!(report.outcome, "scored");
        assert_eq!(report.soh, 100.0);
        assert_eq!(report.window, 100);
        assert_eq!(report.samples_considered, 100);
        assert!(report.detail.is_none());
    }

    #[tokio::test]
    async fn test_flush_now_with_manual_policy() {
        let (storage, state) = create_test_state(FlushPolicy::Manual);
        for _ in 0..7 {
            let receipt = state.ingest(sample(12.4)).await;
            assert_eq!(receipt.flush, FlushOutcome::Skipped);
        }
        assert_eq!(storage.save_count(), 0);

        assert_eq!(state.flush_now().await, FlushOutcome::Written { samples: 7 });
        assert_eq!(storage.stored().map(|s| s.len()), Some(7));
    }

    #[tokio::test]
    async fn test_restore_seeds_history() {
        let restored: Vec<Sample> = (0..5).map(|i| sample(12.0 + i as f64)).collect();
        let storage = Arc::new(MemoryStorage::with_snapshot(restored.clone()));
        let scheduler = PersistenceScheduler::new(storage, FlushPolicy::default());

        let state = AppState::restore(scheduler, Config::default());

        assert_eq!(state.history(None).await.data, restored);
        assert_eq!(
            state.latest_with_health().await,
            LatestStatus::Reading {
                sample: restored[4],
                soh: 100.0
            }
        );
    }

    #[tokio::test]
    async fn test_restore_truncates_to_capacity() {
        let restored: Vec<Sample> = (0..30).map(|i| sample(i as f64)).collect();
        let storage = Arc::new(MemoryStorage::with_snapshot(restored));
        let scheduler = PersistenceScheduler::new(storage, FlushPolicy::default());

        let state = AppState::restore(scheduler, small_config(10, 10, 10));
        let page = state.history(None).await;
        assert_eq!(page.count, 10);
        assert_eq!(page.data.first().map(|s| s.voltage), Some(20.0));
    }
}
