//! Battery state-of-health (SOH) estimation from recent voltage history.
//!
//! The score is a heuristic in `[70.0, 100.0]` derived from the last
//! [`SOH_WINDOW`] samples:
//!
//! 1. A base score from the peak voltage, piecewise-linear with breakpoints at
//!    13.8 V and 13.0 V (see [`base_score`]).
//! 2. A stability penalty proportional to the relative voltage spread, capped
//!    at [`MAX_STABILITY_PENALTY`] (see [`stability_penalty`]).
//! 3. `clamp(base - penalty, 70, 100)`, rounded to one decimal place.
//!
//! Two special cases bypass the clamp:
//!
//! | Condition | Result |
//! |-----------|--------|
//! | fewer than [`MIN_SAMPLES`] samples | [`INSUFFICIENT_DATA_SCORE`] (100.0) |
//! | zero mean voltage or non-finite arithmetic | [`FALLBACK_SCORE`] (95.0) |
//!
//! The lowest base-score branch is unbounded below and changes slope at 13.0 V
//! (16 points per volt below, 8.75 above). Only the final clamp bounds the
//! result.
//!
//! # Example
//!
//! ```
//! use battwatch_core::soh::{SohEstimate, SohEstimator};
//! use battwatch_types::Sample;
//!
//! let samples: Vec<Sample> = (0..20)
//!     .map(|_| Sample::builder().voltage(13.4).build())
//!     .collect();
//!
//! let estimate = SohEstimator::default().compute(&samples);
//! assert_eq!(estimate, SohEstimate::Scored(96.5));
//! ```

use serde::Serialize;
use tracing::debug;

use battwatch_types::Sample;

use crate::error::EstimationError;

/// Number of most recent samples scored.
pub const SOH_WINDOW: usize = 100;
/// Minimum number of samples before a score is attempted.
pub const MIN_SAMPLES: usize = 10;
/// Score reported when there is not enough history.
pub const INSUFFICIENT_DATA_SCORE: f64 = 100.0;
/// Score reported when the arithmetic cannot be carried out.
pub const FALLBACK_SCORE: f64 = 95.0;
/// Lower clamp bound for computed scores.
pub const MIN_SCORE: f64 = 70.0;
/// Upper clamp bound for computed scores.
pub const MAX_SCORE: f64 = 100.0;
/// Largest stability penalty subtracted from the base score.
pub const MAX_STABILITY_PENALTY: f64 = 5.0;

/// Peak voltage at or above which the base score is 100.
pub const FULL_HEALTH_VOLTAGE: f64 = 13.8;
/// Breakpoint between the middle and lower base-score branches.
pub const NOMINAL_VOLTAGE: f64 = 13.0;

/// Outcome of a state-of-health computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SohEstimate {
    /// A score computed from the voltage window.
    Scored(f64),
    /// Too few samples were supplied.
    InsufficientData {
        /// Number of samples that were available.
        available: usize,
    },
    /// The computation hit an arithmetic edge case.
    Fallback(EstimationError),
}

impl SohEstimate {
    /// The score to report for this outcome.
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            SohEstimate::Scored(score) => *score,
            SohEstimate::InsufficientData { .. } => INSUFFICIENT_DATA_SCORE,
            SohEstimate::Fallback(_) => FALLBACK_SCORE,
        }
    }

    /// Short machine-readable name of the outcome.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SohEstimate::Scored(_) => "scored",
            SohEstimate::InsufficientData { .. } => "insufficient_data",
            SohEstimate::Fallback(_) => "fallback",
        }
    }
}

/// Summary statistics of the voltages in a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

impl VoltageStats {
    /// Compute stats over the voltage field, or `None` for an empty slice.
    #[must_use]
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let (min, max, sum) = samples.iter().map(|s| s.voltage).fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), v| (min.min(v), max.max(v), sum + v),
        );

        Some(Self {
            min,
            max,
            mean: sum / samples.len() as f64,
            count: samples.len(),
        })
    }

    fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.mean.is_finite()
    }
}

/// Base score from peak voltage.
///
/// ```
/// use battwatch_core::soh::base_score;
///
/// assert_eq!(base_score(14.2), 100.0);
/// assert_eq!(base_score(13.0), 93.0);
/// assert_eq!(base_score(12.5), 85.0);
/// assert!(base_score(11.0) < 70.0);
/// ```
#[must_use]
pub fn base_score(max_v: f64) -> f64 {
    if max_v >= FULL_HEALTH_VOLTAGE {
        100.0
    } else if max_v >= NOMINAL_VOLTAGE {
        93.0 + ((max_v - 13.0) / 0.8) * 7.0
    } else {
        85.0 + ((max_v - 12.5) / 0.5) * 8.0
    }
}

/// Penalty for voltage instability: ten times the relative spread, capped at
/// [`MAX_STABILITY_PENALTY`].
pub fn stability_penalty(stats: &VoltageStats) -> Result<f64, EstimationError> {
    if stats.mean == 0.0 {
        return Err(EstimationError::ZeroAverage);
    }

    let relative_spread = (stats.max - stats.min) / stats.mean;
    if !relative_spread.is_finite() {
        return Err(EstimationError::NonFinite);
    }

    Ok((relative_spread * 10.0).min(MAX_STABILITY_PENALTY))
}

/// Stateless state-of-health estimator.
///
/// Identical input always yields identical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SohEstimator {
    window: usize,
    min_samples: usize,
}

impl Default for SohEstimator {
    fn default() -> Self {
        Self {
            window: SOH_WINDOW,
            min_samples: MIN_SAMPLES,
        }
    }
}

impl SohEstimator {
    /// Number of trailing samples this estimator scores.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Select the trailing window of `samples` that will be scored.
    #[must_use]
    pub fn window_of<'a>(&self, samples: &'a [Sample]) -> &'a [Sample] {
        &samples[samples.len().saturating_sub(self.window)..]
    }

    /// Estimate state of health from chronologically ordered samples.
    #[must_use]
    pub fn compute(&self, samples: &[Sample]) -> SohEstimate {
        if samples.len() < self.min_samples {
            return SohEstimate::InsufficientData {
                available: samples.len(),
            };
        }

        let Some(stats) = VoltageStats::from_samples(self.window_of(samples)) else {
            return SohEstimate::InsufficientData { available: 0 };
        };

        match score(&stats) {
            Ok(value) => SohEstimate::Scored(value),
            Err(e) => {
                debug!("SOH estimation fell back to {}: {}", FALLBACK_SCORE, e);
                SohEstimate::Fallback(e)
            }
        }
    }
}

/// Convenience wrapper returning only the reported score.
#[must_use]
pub fn estimate_soh(samples: &[Sample]) -> f64 {
    SohEstimator::default().compute(samples).value()
}

fn score(stats: &VoltageStats) -> Result<f64, EstimationError> {
    if !stats.is_finite() {
        return Err(EstimationError::NonFinite);
    }

    let base = base_score(stats.max);
    let penalty = stability_penalty(stats)?;
    let clamped = (base - penalty).clamp(MIN_SCORE, MAX_SCORE);

    Ok(round_to_tenth(clamped))
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(voltages: &[f64]) -> Vec<Sample> {
        voltages
            .iter()
            .map(|&v| Sample::builder().voltage(v).build())
            .collect()
    }

    fn constant(voltage: f64, count: usize) -> Vec<Sample> {
        samples(&vec![voltage; count])
    }

    // --- Insufficient data ---

    #[test]
    fn test_fewer_than_min_samples_is_full_health() {
        for count in 0..MIN_SAMPLES {
            let estimate = SohEstimator::default().compute(&constant(3.0, count));
            assert_eq!(estimate, SohEstimate::InsufficientData { available: count });
            assert_eq!(estimate.value(), 100.0);
        }
    }

    #[test]
    fn test_exactly_min_samples_is_scored() {
        let estimate = SohEstimator::default().compute(&constant(13.4, MIN_SAMPLES));
        assert!(matches!(estimate, SohEstimate::Scored(_)));
    }

    // --- Base score ---

    #[test]
    fn test_base_score_branches() {
        assert_eq!(base_score(13.8), 100.0);
        assert_eq!(base_score(15.0), 100.0);
        assert!((base_score(13.4) - 96.5).abs() < 1e-9);
        assert_eq!(base_score(13.0), 93.0);
        assert!((base_score(12.75) - 89.0).abs() < 1e-9);
        assert_eq!(base_score(12.5), 85.0);
    }

    #[test]
    fn test_base_score_slope_change_at_nominal() {
        let below = base_score(12.9) - base_score(12.8);
        let above = base_score(13.1) - base_score(13.0);
        assert!((below - 1.6).abs() < 1e-9);
        assert!((above - 0.875).abs() < 1e-9);
        assert!((base_score(12.999_999) - 93.0).abs() < 1e-3);
    }

    #[test]
    fn test_base_score_unbounded_below() {
        assert_eq!(base_score(10.0), 45.0);
        assert!(base_score(0.0) < 0.0);
    }

    // --- Scoring ---

    #[test]
    fn test_zero_spread_mid_branch() {
        let estimate = SohEstimator::default().compute(&constant(13.4, 20));
        assert_eq!(estimate, SohEstimate::Scored(96.5));
    }

    #[test]
    fn test_high_voltage_stable_readings() {
        let mut voltages = vec![14.0; 30];
        voltages[7] = 13.9;
        let estimate = SohEstimator::default().compute(&samples(&voltages));

        let value = estimate.value();
        assert!((95.0..=100.0).contains(&value), "got {}", value);
        assert!(value < 100.0);
    }

    #[test]
    fn test_penalty_capped_at_five() {
        // Spread of 1.0 V around ~13.9 V mean gives raw penalty ~0.72; widen
        // the window until the cap applies.
        let mut voltages = vec![14.0; 10];
        voltages.extend(vec![7.0; 10]);
        let stats = VoltageStats::from_samples(&samples(&voltages)).unwrap();
        assert_eq!(stability_penalty(&stats).unwrap(), MAX_STABILITY_PENALTY);

        let estimate = SohEstimator::default().compute(&samples(&voltages));
        assert_eq!(estimate, SohEstimate::Scored(95.0));
    }

    #[test]
    fn test_low_voltage_clamped_to_minimum() {
        let estimate = SohEstimator::default().compute(&constant(11.0, 50));
        assert_eq!(estimate, SohEstimate::Scored(MIN_SCORE));
    }

    #[test]
    fn test_rounded_to_one_decimal() {
        // base(13.33) = 93 + 0.4125 * 7 = 95.8875
        let value = SohEstimator::default().compute(&constant(13.33, 10)).value();
        assert_eq!(value, 95.9);
    }

    #[test]
    fn test_only_last_window_is_scored() {
        // 50 deep-discharge readings followed by 100 healthy ones.
        let mut voltages = vec![11.0; 50];
        voltages.extend(vec![13.4; SOH_WINDOW]);
        let estimate = SohEstimator::default().compute(&samples(&voltages));
        assert_eq!(estimate, SohEstimate::Scored(96.5));

        // One old reading still inside the window changes the result.
        let mut voltages = vec![11.0; 50];
        voltages.extend(vec![13.4; SOH_WINDOW - 1]);
        let estimate = SohEstimator::default().compute(&samples(&voltages));
        assert_ne!(estimate, SohEstimate::Scored(96.5));
    }

    #[test]
    fn test_window_of_short_input() {
        let estimator = SohEstimator::default();
        let input = constant(12.0, 5);
        assert_eq!(estimator.window_of(&input).len(), 5);

        let input = constant(12.0, 250);
        assert_eq!(estimator.window_of(&input).len(), SOH_WINDOW);
    }

    // --- Fallback ---

    #[test]
    fn test_zero_average_falls_back() {
        let estimate = SohEstimator::default().compute(&constant(0.0, 12));
        assert_eq!(estimate, SohEstimate::Fallback(EstimationError::ZeroAverage));
        assert_eq!(estimate.value(), FALLBACK_SCORE);
    }

    #[test]
    fn test_symmetric_voltages_zero_average_falls_back() {
        let voltages: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 5.0 } else { -5.0 }).collect();
        let estimate = SohEstimator::default().compute(&samples(&voltages));
        assert_eq!(estimate, SohEstimate::Fallback(EstimationError::ZeroAverage));
    }

    #[test]
    fn test_non_finite_voltage_falls_back() {
        let mut voltages = vec![13.0; 10];
        voltages[3] = f64::INFINITY;
        let estimate = SohEstimator::default().compute(&samples(&voltages));
        assert_eq!(estimate, SohEstimate::Fallback(EstimationError::NonFinite));
    }

    #[test]
    fn test_estimate_kind_names() {
        assert_eq!(SohEstimate::Scored(90.0).kind(), "scored");
        assert_eq!(
            SohEstimate::InsufficientData { available: 3 }.kind(),
            "insufficient_data"
        );
        assert_eq!(
            SohEstimate::Fallback(EstimationError::ZeroAverage).kind(),
            "fallback"
        );
    }

    #[test]
    fn test_estimate_soh_wrapper() {
        assert_eq!(estimate_soh(&[]), 100.0);
        assert_eq!(estimate_soh(&constant(13.4, 10)), 96.5);
    }

    #[test]
    fn test_deterministic() {
        let voltages: Vec<f64> = (0..120).map(|i| 12.6 + (i % 7) as f64 * 0.15).collect();
        let input = samples(&voltages);
        let first = SohEstimator::default().compute(&input);
        for _ in 0..5 {
            assert_eq!(SohEstimator::default().compute(&input), first);
        }
    }

    // --- VoltageStats ---

    #[test]
    fn test_voltage_stats() {
        let stats = VoltageStats::from_samples(&samples(&[12.0, 13.0, 14.0])).unwrap();
        assert_eq!(stats.min, 12.0);
        assert_eq!(stats.max, 14.0);
        assert_eq!(stats.mean, 13.0);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn test_voltage_stats_empty() {
        assert!(VoltageStats::from_samples(&[]).is_none());
    }
}
