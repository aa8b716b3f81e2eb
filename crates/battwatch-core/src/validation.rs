//! Validation and normalization of inbound telemetry payloads.
//!
//! The device posts a flat JSON object. Numeric fields may arrive either as
//! JSON numbers or as numeric strings (some firmware builds format floats with
//! `snprintf`). Everything is normalized to `f64` here so the history store can
//! trust its input.
//!
//! # Example
//!
//! ```
//! use battwatch_core::validation::ingest_value;
//! use time::OffsetDateTime;
//!
//! let payload = serde_json::json!({
//!     "voltage": 13.1,
//!     "current": "-2.5",
//!     "temperature": 24,
//!     "latitude": 56.95,
//!     "longitude": 24.1,
//! });
//!
//! let sample = ingest_value(&payload, OffsetDateTime::UNIX_EPOCH).unwrap();
//! assert_eq!(sample.current, -2.5);
//! assert_eq!(sample.temperature, 24.0);
//! ```

use serde_json::{Map, Value};
use time::OffsetDateTime;

use battwatch_types::{Sample, parse_timestamp};

use crate::error::ValidationError;

/// Numeric fields every payload must carry.
pub const REQUIRED_FIELDS: [&str; 5] = ["voltage", "current", "temperature", "latitude", "longitude"];

/// Valid latitude range in decimal degrees.
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
/// Valid longitude range in decimal degrees.
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Validate an arbitrary JSON value and build a [`Sample`].
///
/// Returns [`ValidationError::NotAnObject`] for anything other than an object.
pub fn ingest_value(payload: &Value, received_at: OffsetDateTime) -> Result<Sample, ValidationError> {
    match payload {
        Value::Object(fields) => ingest(fields, received_at),
        _ => Err(ValidationError::NotAnObject),
    }
}

/// Validate a field map and build a [`Sample`].
///
/// `received_at` is used as the sample timestamp unless the payload carries
/// its own RFC 3339 `timestamp` string. Unknown fields are ignored.
pub fn ingest(fields: &Map<String, Value>, received_at: OffsetDateTime) -> Result<Sample, ValidationError> {
    let voltage = number_field(fields, "voltage")?;
    let current = number_field(fields, "current")?;
    let temperature = number_field(fields, "temperature")?;
    let latitude = ranged(number_field(fields, "latitude")?, "latitude", LATITUDE_RANGE)?;
    let longitude = ranged(number_field(fields, "longitude")?, "longitude", LONGITUDE_RANGE)?;

    let timestamp = match fields.get("timestamp") {
        None | Some(Value::Null) => received_at,
        Some(Value::String(s)) => {
            parse_timestamp(s).map_err(|e| ValidationError::InvalidTimestamp(e.to_string()))?
        }
        Some(other) => return Err(ValidationError::InvalidTimestamp(other.to_string())),
    };

    Ok(Sample {
        timestamp,
        voltage,
        current,
        temperature,
        latitude,
        longitude,
    })
}

fn number_field(fields: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    let value = match fields.get(field) {
        None | Some(Value::Null) => return Err(ValidationError::MissingField(field)),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| ValidationError::NotANumber {
            field,
            value: n.to_string(),
        })?,
        Some(Value::String(s)) => {
            s.trim()
                .parse::<f64>()
                .map_err(|_| ValidationError::NotANumber {
                    field,
                    value: s.clone(),
                })?
        }
        Some(other) => {
            return Err(ValidationError::NotANumber {
                field,
                value: other.to_string(),
            });
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFinite { field, value })
    }
}

fn ranged(value: f64, field: &'static str, (min, max): (f64, f64)) -> Result<f64, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
