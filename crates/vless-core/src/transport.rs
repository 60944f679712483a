//! Abstract message transport carrying a tunnel.
//!
//! The tunnel only needs "receive the next discrete message" and "write
//! bytes". The WebSocket implementation lives in the server; tests use
//! in-memory channels.

use crate::error::VlessResult;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = VlessResult<T>> + Send + 'a>>;

/// Receiving half of a message transport.
pub trait MessageReader: Send {
    /// Receive the next message. `Ok(None)` means the peer closed.
    fn recv(&mut self) -> TransportFuture<'_, Option<Vec<u8>>>;
}

/// Sending half of a message transport.
pub trait MessageWriter: Send {
    /// Send `data` as one message.
    fn send<'a>(&'a mut self, data: &'a [u8]) -> TransportFuture<'a, ()>;

    /// Close the transport.
    fn close(&mut self) -> TransportFuture<'_, ()>;
}

/// A duplex message transport that can be split into independent halves.
pub trait MessageStream: Send {
    type Reader: MessageReader;
    type Writer: MessageWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}
