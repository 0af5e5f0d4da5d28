//! Contract between the session and whatever carries bytes to the radio.

pub mod meshtastic;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::RadioConfig;
use crate::node::{NodeKey, NodeUpdate};
use crate::telemetry::TelemetryReading;

pub use self::meshtastic::MeshtasticTransport;

/// Destination meaning "no specific recipient"
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// A device found by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub name: String,
    pub address: String,
}

/// Application port a mesh packet was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppPort {
    TextMessage,
    Other(i32),
}

/// Raw fields of an inbound application packet
#[derive(Debug, Clone, PartialEq)]
pub struct TextPacket {
    pub port: AppPort,
    pub from: Option<u32>,
    pub from_id: Option<String>,
    pub channel: Option<u32>,
    pub payload: Vec<u8>,
}

impl TextPacket {
    /// Preferred lookup key for the sender: hex id, else node number
    pub fn sender_key(&self) -> Option<NodeKey> {
        self.from_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(NodeKey::from)
            .or(self.from.map(NodeKey::Num))
    }
}

/// Events a transport pushes into the session's sink
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(TextPacket),
    NodeUpdate(NodeUpdate),
    Telemetry(TelemetryReading),
    /// The radio told us which node it is
    LocalNode { num: u32 },
    /// The link dropped without being asked to
    LinkLost,
}

/// Where a transport delivers inbound events
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Physical discovery/connect/send/close over the wireless link.
///
/// Implementations deliver inbound events on their own context through the
/// [`EventSink`] handed to [`Transport::subscribe`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// An open link, exclusively owned by the session while connected
    type Handle: Send + Sync + 'static;

    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>>;

    async fn open(&self, address: &str) -> Result<Self::Handle>;

    async fn close(&self, handle: Self::Handle) -> Result<()>;

    async fn send_text(
        &self,
        handle: &Self::Handle,
        text: &str,
        channel: u32,
        destination: u32,
    ) -> Result<()>;

    async fn send_config(&self, handle: &Self::Handle, config: &RadioConfig) -> Result<()>;

    async fn subscribe(&self, handle: &Self::Handle, sink: EventSink) -> Result<()>;

    async fn unsubscribe(&self, handle: &Self::Handle) -> Result<()>;
}
