//! Bidirectional relay between the client transport and the outbound socket.
//!
//! Two forwarding loops run concurrently inside the session task:
//! - **Client→Remote**: each inbound message is written to the TCP socket.
//! - **Remote→Client**: each TCP read is sent as one outbound message.
//!
//! Whichever loop ends first (EOF or I/O error) ends the relay and the other
//! loop is dropped mid-await. An optional idle watchdog ends it when neither
//! direction has moved a byte for the configured duration. Closing the
//! sockets is left to the caller.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::debug;
use vless_core::{MessageReader, MessageWriter};

/// Read buffer for the remote→client direction.
const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// Why the relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    ClientClosed,
    RemoteClosed,
    ClientError,
    RemoteError,
    IdleTimeout,
}

/// Byte counts and end reason of a finished relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_remote: u64,
    pub remote_to_client: u64,
    pub end: RelayEnd,
}

/// Relay until one side ends. Errors are logged and folded into [`RelayEnd`].
pub async fn relay<R, W>(
    session_id: u64,
    client_rx: &mut R,
    client_tx: &mut W,
    remote: &mut TcpStream,
    idle_timeout: Option<Duration>,
) -> RelayStats
where
    R: MessageReader,
    W: MessageWriter,
{
    let (mut remote_rx, mut remote_tx) = remote.split();
    let activity = Notify::new();
    let mut up = 0u64;
    let mut down = 0u64;

    let end = tokio::select! {
        end = client_to_remote(session_id, client_rx, &mut remote_tx, &mut up, &activity) => end,
        end = remote_to_client(session_id, &mut remote_rx, client_tx, &mut down, &activity) => end,
        end = idle_watchdog(&activity, idle_timeout) => end,
    };

    RelayStats {
        client_to_remote: up,
        remote_to_client: down,
        end,
    }
}

async fn client_to_remote<R: MessageReader>(
    session_id: u64,
    client_rx: &mut R,
    remote_tx: &mut WriteHalf<'_>,
    count: &mut u64,
    activity: &Notify,
) -> RelayEnd {
    loop {
        match client_rx.recv().await {
            Ok(Some(data)) => {
                if let Err(e) = remote_tx.write_all(&data).await {
                    debug!(session_id, error = %e, "remote write failed");
                    return RelayEnd::RemoteError;
                }
                *count += data.len() as u64;
                activity.notify_one();
            }
            Ok(None) => {
                debug!(session_id, "client closed");
                return RelayEnd::ClientClosed;
            }
            Err(e) => {
                debug!(session_id, error = %e, "client read failed");
                return RelayEnd::ClientError;
            }
        }
    }
}

async fn remote_to_client<W: MessageWriter>(
    session_id: u64,
    remote_rx: &mut ReadHalf<'_>,
    client_tx: &mut W,
    count: &mut u64,
    activity: &Notify,
) -> RelayEnd {
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        match remote_rx.read(&mut buf).await {
            Ok(0) => {
                debug!(session_id, "remote closed");
                return RelayEnd::RemoteClosed;
            }
            Ok(n) => {
                if let Err(e) = client_tx.send(&buf[..n]).await {
                    debug!(session_id, error = %e, "client write failed");
                    return RelayEnd::ClientError;
                }
                *count += n as u64;
                activity.notify_one();
            }
            Err(e) => {
                debug!(session_id, error = %e, "remote read failed");
                return RelayEnd::RemoteError;
            }
        }
    }
}

async fn idle_watchdog(activity: &Notify, idle_timeout: Option<Duration>) -> RelayEnd {
    let Some(idle) = idle_timeout else {
        return std::future::pending().await;
    };
    loop {
        if tokio::time::timeout(idle, activity.notified()).await.is_err() {
            return RelayEnd::IdleTimeout;
        }
    }
}
