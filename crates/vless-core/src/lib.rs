//! vless-core: Shared protocol library for vless-relay.
//!
//! Provides the request header decoder, the shared identifier type, a
//! bounds-checked byte cursor, and the abstract message transport the tunnel
//! runs over.

pub mod cursor;
pub mod error;
pub mod header;
pub mod identity;
pub mod transport;

// Re-export commonly used items at crate root.
pub use cursor::ByteCursor;
pub use error::{VlessError, VlessResult};
pub use header::{
    acknowledgment, decode, decode_authenticated, encode_request, AddressFamily, Command,
    HandshakeRequest, TargetAddress,
};
pub use identity::{Identifier, IDENTIFIER_LEN};
pub use transport::{MessageReader, MessageStream, MessageWriter, TransportFuture};
