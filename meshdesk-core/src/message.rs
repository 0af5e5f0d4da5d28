use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sender id recorded for messages typed on this client
pub const LOCAL_SENDER_ID: &str = "^local";
/// Label consumers show for messages typed on this client
pub const LOCAL_USER_LABEL: &str = "Me";

/// Which side of the link a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Role {
    Local,
    Remote,
}

/// A stored chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender_id: String,
    pub role: Role,
    pub payload: String,
    pub channel: u32,
    pub timestamp: DateTime<Utc>,
}

/// A chat message as delivered to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub sender_id: String,
    /// Resolved display name of the sender, e.g. `Alice (!0a)`
    pub sender_label: String,
    pub role: Role,
    pub text: String,
    pub channel: u32,
}

impl ChatMessage {
    pub(crate) fn local(text: String, channel: u32) -> Self {
        Self {
            sender_id: LOCAL_SENDER_ID.to_string(),
            sender_label: LOCAL_USER_LABEL.to_string(),
            role: Role::Local,
            text,
            channel,
        }
    }
}
