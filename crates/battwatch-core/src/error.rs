//! Error types for battwatch-core.
//!
//! Only [`ValidationError`] ever reaches a caller as a failure. An
//! [`EstimationError`] is always folded into
//! [`SohEstimate::Fallback`](crate::soh::SohEstimate::Fallback) so the query
//! path never faults.

use thiserror::Error;

/// Reasons an inbound telemetry payload is rejected.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The payload was not a JSON object.
    #[error("Payload must be a JSON object")]
    NotAnObject,

    /// A required numeric field is absent or null.
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// A field could not be interpreted as a number.
    #[error("Field '{field}' is not a number: {value}")]
    NotANumber {
        field: &'static str,
        value: String,
    },

    /// A field parsed to NaN or infinity.
    #[error("Field '{field}' must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    /// A field lies outside its physical range.
    #[error("Field '{field}' value {value} is outside valid range ({min} to {max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The optional timestamp could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Arithmetic conditions that prevent a state-of-health score from being computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EstimationError {
    /// Mean voltage of the window is zero, so relative spread is undefined.
    #[error("Average voltage is zero")]
    ZeroAverage,

    /// An intermediate value was NaN or infinite.
    #[error("Non-finite intermediate value")]
    NonFinite,
}
