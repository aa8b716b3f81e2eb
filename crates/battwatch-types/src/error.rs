//! Error types for data parsing in battwatch-types.

use thiserror::Error;

/// Errors that can occur when parsing telemetry data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The timestamp text is not valid RFC 3339.
    #[error("Invalid timestamp '{input}': {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Result type alias using battwatch-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
