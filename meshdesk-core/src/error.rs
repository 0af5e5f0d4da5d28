use thiserror::Error;

/// Outcomes a session call can fail with. Collaborator errors never cross
/// the session boundary as anything else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Discovery, open, or a send failed at the hardware/OS layer
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The device did not answer within the configured bound
    #[error("Timed out after {millis}ms while {action}")]
    ConnectionTimeout { action: &'static str, millis: u64 },

    /// The call is not valid in the current session state
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// An inbound event was missing fields it needs
    #[error("Malformed event: {0}")]
    MalformedEvent(&'static str),
}

impl SessionError {
    pub(crate) fn timeout(action: &'static str, bound: std::time::Duration) -> Self {
        SessionError::ConnectionTimeout {
            action,
            millis: u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
