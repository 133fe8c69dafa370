//! Sensor readings and the validation applied to untrusted input.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One temperature/humidity sample as held in the history buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub heat_index: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub sequence_id: u64,
}

/// A numeric field as it arrives on the wire. Sensor firmware posts either
/// JSON numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// The value as a finite `f64`, if it is one.
    pub fn as_finite(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|v| v.is_finite())
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// The unvalidated ingestion payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingInput {
    #[serde(default)]
    pub temperature: Option<RawValue>,
    #[serde(default)]
    pub humidity: Option<RawValue>,
    #[serde(default, alias = "heat_index")]
    pub heat_index: Option<RawValue>,
}

impl ReadingInput {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature: Some(temperature.into()),
            humidity: Some(humidity.into()),
            heat_index: None,
        }
    }

    pub fn with_heat_index(mut self, heat_index: impl Into<RawValue>) -> Self {
        self.heat_index = Some(heat_index.into());
        self
    }

    /// Checks the required fields and produces a `Measurement`.
    ///
    /// A heat index that is absent or unparseable falls back to the temperature.
    pub fn validate(&self) -> Result<Measurement, ValidationError> {
        let temperature = required("temperature", self.temperature.as_ref())?;
        let humidity = required("humidity", self.humidity.as_ref())?;
        let heat_index = self.heat_index.as_ref().and_then(RawValue::as_finite);
        Measurement::new(temperature, humidity, heat_index)
    }
}

fn required(field: &'static str, value: Option<&RawValue>) -> Result<f64, ValidationError> {
    let value = value.ok_or(ValidationError::Missing { field })?;
    value.as_finite().ok_or_else(|| ValidationError::NotANumber {
        field,
        value: value.to_string(),
    })
}

/// A validated sample that has not been stamped with a time or sequence id yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    temperature: f64,
    humidity: f64,
    heat_index: f64,
}

impl Measurement {
    pub fn new(
        temperature: f64,
        humidity: f64,
        heat_index: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let temperature = finite("temperature", temperature)?;
        let humidity = finite("humidity", humidity)?;
        let heat_index = heat_index.filter(|v| v.is_finite()).unwrap_or(temperature);
        Ok(Self {
            temperature,
            humidity,
            heat_index,
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn heat_index(&self) -> f64 {
        self.heat_index
    }

    /// Turns the measurement into a stored `Reading`.
    pub fn stamp(self, timestamp: i64, sequence_id: u64) -> Reading {
        Reading {
            temperature: self.temperature,
            humidity: self.humidity,
            heat_index: self.heat_index,
            timestamp,
            sequence_id,
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotANumber {
            field,
            value: value.to_string(),
        })
    }
}
