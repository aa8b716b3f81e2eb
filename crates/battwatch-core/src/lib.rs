//! Domain logic for battwatch battery telemetry.
//!
//! This crate holds the pure, I/O-free parts of the system:
//!
//! - **Ingestion validation** ([`validation`]): turns a loosely typed JSON
//!   payload from the device into a normalized [`Sample`](battwatch_types::Sample)
//! - **State-of-health estimation** ([`soh`]): scores battery health from the
//!   recent voltage history
//!
//! # Quick Start
//!
//! ```
//! use battwatch_core::{estimate_soh, ingest_value};
//! use time::OffsetDateTime;
//!
//! let mut history = Vec::new();
//! for _ in 0..12 {
//!     let payload = serde_json::json!({
//!         "voltage": 13.4, "current": 0.8, "temperature": 21.0,
//!         "latitude": 0.0, "longitude": 0.0,
//!     });
//!     history.push(ingest_value(&payload, OffsetDateTime::now_utc())?);
//! }
//!
//! assert_eq!(estimate_soh(&history), 96.5);
//! # Ok::<(), battwatch_core::ValidationError>(())
//! ```

pub mod error;
pub mod soh;
pub mod validation;

pub use error::{EstimationError, ValidationError};
pub use soh::{SohEstimate, SohEstimator, VoltageStats, estimate_soh};
pub use validation::{ingest, ingest_value};
