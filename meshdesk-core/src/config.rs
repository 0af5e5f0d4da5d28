use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

/// Timing knobs for a [`SessionManager`](crate::SessionManager)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Discovery pass run first and discarded to warm the platform cache
    pub warmup_scan: Duration,
    /// Discovery pass whose results are returned
    pub scan: Duration,
    /// Upper bound for opening a link to a device
    pub connect_timeout: Duration,
    /// Upper bound for unsubscribing from and closing a link
    pub close_timeout: Duration,
    /// Upper bound for a single outbound command (text or config)
    pub command_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warmup_scan: Duration::from_secs(2),
            scan: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// LoRa modem presets offered for radio configuration
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ModemPreset {
    #[default]
    LongFast,
    MediumSlow,
    ShortFast,
}

/// Radio settings pushed to the attached device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Firmware region code (e.g. 1 = US)
    pub region: i32,
    pub modem_preset: ModemPreset,
}
