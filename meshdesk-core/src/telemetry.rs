use serde::Serialize;

/// Raw metrics reported by the transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryReading {
    pub from: Option<u32>,
    pub voltage: Option<f32>,
    pub battery_level: Option<u32>,
    pub rssi: Option<i32>,
}

/// Transient sample forwarded to live displays. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub from: Option<u32>,
    pub voltage: Option<f32>,
    pub rssi: Option<i32>,
}

impl TelemetrySample {
    /// Returns `None` when the reading carries neither a voltage nor a
    /// signal strength.
    pub fn from_reading(reading: &TelemetryReading) -> Option<Self> {
        let voltage = reading.voltage.filter(|v| v.is_finite());
        if voltage.is_none() && reading.rssi.is_none() {
            return None;
        }

        Some(Self {
            from: reading.from,
            voltage,
            rssi: reading.rssi,
        })
    }
}
