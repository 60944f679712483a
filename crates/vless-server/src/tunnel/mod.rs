//! Tunnel sessions: handshake, outbound connect, relay.
//!
//! # Submodules
//!
//! - **[`session`]**: the per-connection state machine. Receives the first
//!   message, decodes and authenticates it, connects, acknowledges, relays.
//! - **[`connector`]**: outbound TCP connect bounded by a timeout.
//! - **[`relay`]**: the two forwarding loops and the idle watchdog.
//!
//! # Data Flow
//!
//! ```text
//! upgraded WebSocket (server.rs)
//!   → TunnelSession::run
//!       → vless_core::decode_authenticated (first message)
//!       → connector::connect
//!       → write early payload, send [version, 0]
//!       → relay::relay until either side ends
//! ```

pub mod connector;
pub mod relay;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use session::{TunnelSession, TunnelSettings};
