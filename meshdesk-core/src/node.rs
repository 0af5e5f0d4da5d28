use serde::{Deserialize, Serialize};
use std::fmt;

/// Long name shown for a node that never announced one
pub const UNKNOWN_LONG_NAME: &str = "Unknown";
/// Short name shown for a node that never announced one
pub const UNKNOWN_SHORT_NAME: &str = "N/A";

/// One of the identifier forms a node can be looked up by.
///
/// Mesh nodes carry a numeric id (the radio's node number) and a
/// human-oriented hex id such as `!a1b2c3d4`. Either may be missing from a
/// given record, so lookups accept both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Num(u32),
    Hex(String),
}

impl NodeKey {
    /// Canonical hex id for a node number, as the firmware formats it
    pub fn hex_for(num: u32) -> String {
        format!("!{num:08x}")
    }
}

impl From<u32> for NodeKey {
    fn from(num: u32) -> Self {
        NodeKey::Num(num)
    }
}

impl From<&str> for NodeKey {
    fn from(id: &str) -> Self {
        NodeKey::Hex(id.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(id: String) -> Self {
        NodeKey::Hex(id)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Num(num) => write!(f, "{num}"),
            NodeKey::Hex(id) => f.write_str(id),
        }
    }
}

/// A mesh participant as last known to this client.
///
/// This is the flat, normalized shape: every reader (cache, store, consumers)
/// sees position as a plain `(latitude, longitude)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub num: Option<u32>,
    pub id: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub snr: Option<f32>,
    pub battery_level: Option<u32>,
    pub voltage: Option<f32>,
    pub rssi: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_heard: Option<u64>,
}

impl NodeRecord {
    pub fn long_name_or_default(&self) -> &str {
        self.long_name.as_deref().unwrap_or(UNKNOWN_LONG_NAME)
    }

    pub fn short_name_or_default(&self) -> &str {
        self.short_name.as_deref().unwrap_or(UNKNOWN_SHORT_NAME)
    }

    /// Key the record is persisted under: the node number when known,
    /// otherwise the hex id.
    pub fn storage_key(&self) -> Option<String> {
        match (self.num, &self.id) {
            (Some(num), _) => Some(num.to_string()),
            (None, Some(id)) => Some(id.clone()),
            (None, None) => None,
        }
    }

    /// True when both records describe the same physical node
    pub fn same_node(&self, other: &NodeRecord) -> bool {
        match (self.num, other.num) {
            (Some(a), Some(b)) => a == b,
            _ => self.id.is_some() && self.id == other.id,
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Overwrite every field that `newer` carries; keep the rest.
    pub(crate) fn merge(&mut self, newer: NodeRecord) {
        let NodeRecord {
            num,
            id,
            long_name,
            short_name,
            snr,
            battery_level,
            voltage,
            rssi,
            latitude,
            longitude,
            last_heard,
        } = newer;

        overwrite(&mut self.num, num);
        overwrite(&mut self.id, id);
        overwrite(&mut self.long_name, long_name);
        overwrite(&mut self.short_name, short_name);
        overwrite(&mut self.snr, snr);
        overwrite(&mut self.battery_level, battery_level);
        overwrite(&mut self.voltage, voltage);
        overwrite(&mut self.rssi, rssi);
        overwrite(&mut self.last_heard, last_heard);

        // Position only moves as a pair
        if latitude.is_some() && longitude.is_some() {
            self.latitude = latitude;
            self.longitude = longitude;
        }
    }

    /// Fill only the fields this record is missing, taking them from an
    /// older record of the same node.
    pub(crate) fn fill_missing(&mut self, older: NodeRecord) {
        self.num = self.num.or(older.num);
        self.id = self.id.take().or(older.id);
        self.long_name = self.long_name.take().or(older.long_name);
        self.short_name = self.short_name.take().or(older.short_name);
        self.snr = self.snr.or(older.snr);
        self.battery_level = self.battery_level.or(older.battery_level);
        self.voltage = self.voltage.or(older.voltage);
        self.rssi = self.rssi.or(older.rssi);
        self.last_heard = self.last_heard.or(older.last_heard);
        if self.position().is_none() {
            self.latitude = older.latitude;
            self.longitude = older.longitude;
        }
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Node update as delivered by the transport, in the nested shape the radio
/// reports it. [`NodeUpdate::normalize`] flattens it into a [`NodeRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    pub num: Option<u32>,
    pub user: Option<UserInfo>,
    pub snr: Option<f32>,
    pub rssi: Option<i32>,
    pub device_metrics: Option<NodeMetrics>,
    pub position: Option<PositionFix>,
    pub last_heard: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub battery_level: Option<u32>,
    pub voltage: Option<f32>,
}

/// Position as the radio reports it: either degrees or the integer
/// `1e-7` degree encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub latitude_i: Option<i32>,
    pub longitude_i: Option<i32>,
}

impl PositionFix {
    /// Resolve to a `(lat, lon)` pair in degrees, if both halves are valid
    pub fn degrees(&self) -> Option<(f64, f64)> {
        let lat = self
            .latitude
            .or_else(|| self.latitude_i.map(|v| f64::from(v) / 1e7))
            .filter(|v| v.is_finite() && (-90.0..=90.0).contains(v))?;
        let lon = self
            .longitude
            .or_else(|| self.longitude_i.map(|v| f64::from(v) / 1e7))
            .filter(|v| v.is_finite() && (-180.0..=180.0).contains(v))?;
        Some((lat, lon))
    }
}

/// Battery level the firmware reports when running on external power
const POWERED_BATTERY_LEVEL: u32 = 101;

impl NodeUpdate {
    pub fn has_identifier(&self) -> bool {
        self.num.is_some() || self.hex_id().is_some()
    }

    fn hex_id(&self) -> Option<String> {
        self.user.as_ref().and_then(|u| non_empty(u.id.as_deref()))
    }

    /// Flatten into a [`NodeRecord`]. Malformed optional fields are dropped
    /// rather than rejected.
    pub fn normalize(&self) -> NodeRecord {
        let user = self.user.as_ref();
        let metrics = self.device_metrics.as_ref();
        let position = self.position.as_ref().and_then(PositionFix::degrees);

        NodeRecord {
            num: self.num,
            id: self.hex_id(),
            long_name: user.and_then(|u| non_empty(u.long_name.as_deref())),
            short_name: user.and_then(|u| non_empty(u.short_name.as_deref())),
            snr: self.snr.filter(|v| v.is_finite()),
            battery_level: metrics
                .and_then(|m| m.battery_level)
                .filter(|level| *level <= POWERED_BATTERY_LEVEL),
            voltage: metrics
                .and_then(|m| m.voltage)
                .filter(|v| v.is_finite() && *v >= 0.0),
            rssi: self.rssi,
            latitude: position.map(|(lat, _)| lat),
            longitude: position.map(|(_, lon)| lon),
            last_heard: self.last_heard,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
