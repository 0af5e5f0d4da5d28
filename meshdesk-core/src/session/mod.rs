//! Connection lifecycle, inbound event handling and outbound commands.

mod manager;

#[cfg(test)]
mod tests;

pub use manager::{Phase, SessionManager, SessionStatus};
