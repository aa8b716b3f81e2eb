//! Platform-agnostic types for battwatch battery telemetry.
//!
//! This crate provides the shared [`Sample`] type used by the estimator,
//! the history store and the HTTP service.
//!
//! # Example
//!
//! ```
//! use battwatch_types::Sample;
//!
//! let sample = Sample::builder()
//!     .voltage(13.1)
//!     .current(-2.4)
//!     .temperature(24.0)
//!     .position(56.95, 24.1)
//!     .build();
//! assert!(sample.is_finite());
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{Sample, SampleBuilder, parse_timestamp};
