use serde::{Deserialize, Serialize};

/// A single environmental snapshot published by the bridge.
///
/// Serializes as a flat JSON object with exactly four keys:
///
/// ```text
/// {"deviceId":"dev1","humidity":45.68,"pressure":1012.35,"temperature":22.22}
/// ```
///
/// All three measurements come from one poll cycle and are rounded to two
/// decimal places at construction. A `Reading` is built, serialized, and
/// discarded within a single loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Device identifier, fixed for the lifetime of the process.
    pub device_id: String,

    /// Percent relative humidity.
    pub humidity: f64,

    /// Atmospheric pressure in millibars.
    pub pressure: f64,

    /// Temperature in degrees Celsius.
    pub temperature: f64,
}

impl Reading {
    /// Create a reading, rounding each measurement to two decimal places.
    pub fn new(device_id: impl Into<String>, humidity: f64, pressure: f64, temperature: f64) -> Self {
        Self {
            device_id: device_id.into(),
            humidity: round2(humidity),
            pressure: round2(pressure),
            temperature: round2(temperature),
        }
    }

    /// Serialize to the flat JSON wire format.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
