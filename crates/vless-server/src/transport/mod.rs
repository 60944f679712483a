//! Transports that deliver tunnel messages to a session.

pub mod websocket;
