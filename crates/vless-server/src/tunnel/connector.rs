//! Outbound TCP connect with a deadline.

use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;
use vless_core::{VlessError, VlessResult};

/// Connect to `host:port`, giving up after `timeout`.
///
/// `host` may be an IP literal (including uncompressed IPv6) or a name to
/// resolve. No retry.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> VlessResult<TcpStream> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| VlessError::Timeout)??;

    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "could not set TCP_NODELAY");
    }
    Ok(stream)
}
