//! Core library for the meshdesk mesh-radio client
//!
//! This crate owns the connection session to a Meshtastic device, the node
//! cache, and the hand-off of inbound events to a consumer. Radio access and
//! persistence sit behind the [`Transport`] and [`Store`] traits.

pub mod cache;
pub mod config;
pub mod error;
pub mod message;
pub mod node;
pub mod notify;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types
pub use cache::NodeCache;
pub use config::{ModemPreset, RadioConfig, SessionConfig};
pub use error::SessionError;
pub use message::{ChatMessage, MessageRecord, Role};
pub use node::{NodeKey, NodeRecord, NodeUpdate};
pub use notify::{EventKind, Notification, NotificationLoop};
pub use session::{Phase, SessionManager, SessionStatus};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use telemetry::TelemetrySample;
pub use transport::{DiscoveredDevice, MeshtasticTransport, Transport, TransportEvent};
