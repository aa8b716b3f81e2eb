//! Core types for battery telemetry data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{ParseError, ParseResult};

/// One normalized telemetry reading from the remote device.
///
/// Samples are immutable once created. The ingestion layer is responsible for
/// rejecting non-finite values before a `Sample` is constructed; downstream
/// components trust their input.
///
/// # Serialization
///
/// The timestamp is serialized as an RFC 3339 string so persisted snapshots
/// stay greppable:
///
/// ```
/// use battwatch_types::Sample;
///
/// let sample = Sample::builder().voltage(13.2).build();
/// let json = serde_json::to_string(&sample).unwrap();
/// assert!(json.contains("\"timestamp\":\"1970-01-01T00:00:00Z\""));
/// assert!(json.contains("\"voltage\":13.2"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// When the reading was accepted (UTC).
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Pack voltage in volts.
    pub voltage: f64,
    /// Pack current in amps.
    pub current: f64,
    /// Pack temperature in degrees Celsius.
    pub temperature: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            timestamp: OffsetDateTime::UNIX_EPOCH,
            voltage: 0.0,
            current: 0.0,
            temperature: 0.0,
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl Sample {
    /// Create a builder for constructing a `Sample`.
    pub fn builder() -> SampleBuilder {
        SampleBuilder::default()
    }

    /// Returns `true` if every numeric field is finite.
    ///
    /// ```
    /// use battwatch_types::Sample;
    ///
    /// assert!(Sample::builder().voltage(12.9).build().is_finite());
    /// assert!(!Sample::builder().current(f64::NAN).build().is_finite());
    /// ```
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [
            self.voltage,
            self.current,
            self.temperature,
            self.latitude,
            self.longitude,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Builder for constructing a `Sample`.
#[derive(Debug, Default, Clone)]
#[must_use]
pub struct SampleBuilder {
    sample: Sample,
}

impl SampleBuilder {
    /// Set the timestamp.
    pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.sample.timestamp = timestamp;
        self
    }

    /// Set the voltage.
    pub fn voltage(mut self, voltage: f64) -> Self {
        self.sample.voltage = voltage;
        self
    }

    /// Set the current.
    pub fn current(mut self, current: f64) -> Self {
        self.sample.current = current;
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.sample.temperature = temperature;
        self
    }

    /// Set latitude and longitude.
    pub fn position(mut self, latitude: f64, longitude: f64) -> Self {
        self.sample.latitude = latitude;
        self.sample.longitude = longitude;
        self
    }

    /// Build the `Sample`.
    #[must_use]
    pub fn build(self) -> Sample {
        self.sample
    }
}

/// Parse an RFC 3339 timestamp.
///
/// ```
/// use battwatch_types::parse_timestamp;
///
/// let ts = parse_timestamp("2024-05-01T12:00:00Z").unwrap();
/// assert_eq!(ts.unix_timestamp(), 1_714_564_800);
/// assert!(parse_timestamp("yesterday").is_err());
/// ```
pub fn parse_timestamp(input: &str) -> ParseResult<OffsetDateTime> {
    OffsetDateTime::parse(input.trim(), &Rfc3339).map_err(|e| ParseError::InvalidTimestamp {
        input: input.to_string(),
        reason: e.to_string(),
    })
}
