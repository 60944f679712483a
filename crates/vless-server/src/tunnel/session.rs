//! One tunnel from handshake to teardown.
//!
//! ```text
//! AwaitingHandshake → Authenticating → Connecting → Relaying → Closed
//!          └────────────────┴──────────────┴──→ Aborted
//! ```
//!
//! Every rejection before the outbound connection is up (bad header, wrong
//! identifier, unsupported command, failed connect) looks the same to the
//! client: the transport is closed and nothing is written.

use super::connector;
use super::relay::{relay, RelayStats};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};
use vless_core::{
    decode_authenticated, Command, Identifier, MessageReader, MessageStream, MessageWriter,
};

/// Read-only settings shared by every session.
#[derive(Debug, Clone)]
pub struct TunnelSettings {
    /// The only identifier accepted in handshakes.
    pub identifier: Identifier,
    pub connect_timeout: Duration,
    /// How long a fresh transport may stay silent before its first message.
    pub handshake_timeout: Duration,
    /// `None` disables the relay idle timeout.
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Authenticating,
    Connecting,
    Relaying,
    Closed,
    Aborted,
}

/// Why a session ended before relaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The client went away before the tunnel was established.
    Disconnected,
    /// No first message arrived within the handshake timeout.
    HandshakeTimeout,
    /// The first message was not a well-formed header.
    Malformed,
    /// The header carried the wrong identifier.
    Unauthorized,
    /// UDP and mux requests are not served.
    UnsupportedCommand,
    /// The destination could not be reached, or refused the initial payload.
    ConnectFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Relayed(RelayStats),
    Aborted(AbortReason),
}

/// A single tunnel session. Consumed by [`TunnelSession::run`].
pub struct TunnelSession {
    id: u64,
    peer: SocketAddr,
    settings: Arc<TunnelSettings>,
    state: SessionState,
}

impl TunnelSession {
    pub fn new(id: u64, peer: SocketAddr, settings: Arc<TunnelSettings>) -> Self {
        Self {
            id,
            peer,
            settings,
            state: SessionState::AwaitingHandshake,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session_id = self.id, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Run the session over `inbound` until it closes or aborts.
    ///
    /// Both the inbound transport and the outbound socket are closed before
    /// this returns.
    pub async fn run<T: MessageStream>(mut self, inbound: T) -> SessionOutcome {
        let (mut reader, mut writer) = inbound.split();

        let outcome = self.drive(&mut reader, &mut writer).await;

        if let Err(e) = writer.close().await {
            debug!(session_id = self.id, error = %e, "inbound close failed");
        }

        match outcome {
            SessionOutcome::Relayed(stats) => {
                self.transition(SessionState::Closed);
                info!(
                    session_id = self.id,
                    peer = %self.peer,
                    up = stats.client_to_remote,
                    down = stats.remote_to_client,
                    end = ?stats.end,
                    "tunnel closed"
                );
            }
            SessionOutcome::Aborted(reason) => {
                self.transition(SessionState::Aborted);
                debug!(session_id = self.id, peer = %self.peer, ?reason, "tunnel aborted");
            }
        }
        outcome
    }

    async fn drive<R, W>(&mut self, reader: &mut R, writer: &mut W) -> SessionOutcome
    where
        R: MessageReader,
        W: MessageWriter,
    {
        let first = match timeout(self.settings.handshake_timeout, reader.recv()).await {
            Ok(Ok(Some(message))) => message,
            Ok(Ok(None)) => return SessionOutcome::Aborted(AbortReason::Disconnected),
            Ok(Err(e)) => {
                debug!(session_id = self.id, error = %e, "no handshake received");
                return SessionOutcome::Aborted(AbortReason::Disconnected);
            }
            Err(_) => {
                debug!(session_id = self.id, peer = %self.peer, "handshake timed out");
                return SessionOutcome::Aborted(AbortReason::HandshakeTimeout);
            }
        };

        self.transition(SessionState::Authenticating);
        let request = match decode_authenticated(&first, &self.settings.identifier) {
            Ok(request) => request,
            Err(e) => {
                debug!(session_id = self.id, peer = %self.peer, error = %e, "handshake rejected");
                let reason = if e.is_parse_error() {
                    AbortReason::Malformed
                } else {
                    AbortReason::Unauthorized
                };
                return SessionOutcome::Aborted(reason);
            }
        };
        if request.command != Command::Tcp {
            debug!(session_id = self.id, command = ?request.command, "unsupported command");
            return SessionOutcome::Aborted(AbortReason::UnsupportedCommand);
        }

        self.transition(SessionState::Connecting);
        let host = request.host();
        let mut outbound =
            match connector::connect(&host, request.port, self.settings.connect_timeout).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(session_id = self.id, dest = %host, port = request.port, error = %e, "connect failed");
                    return SessionOutcome::Aborted(AbortReason::ConnectFailed);
                }
            };
        info!(session_id = self.id, peer = %self.peer, dest = %host, port = request.port, "tunnel open");

        // Early payload goes out before the acknowledgment and before any
        // later client message.
        let payload = request.payload(&first);
        if !payload.is_empty() {
            if let Err(e) = outbound.write_all(payload).await {
                debug!(session_id = self.id, error = %e, "initial payload write failed");
                shutdown(&mut outbound).await;
                return SessionOutcome::Aborted(AbortReason::ConnectFailed);
            }
        }

        if let Err(e) = writer.send(&request.acknowledgment()).await {
            debug!(session_id = self.id, error = %e, "acknowledgment send failed");
            shutdown(&mut outbound).await;
            return SessionOutcome::Aborted(AbortReason::Disconnected);
        }

        self.transition(SessionState::Relaying);
        let stats = relay(
            self.id,
            reader,
            writer,
            &mut outbound,
            self.settings.idle_timeout,
        )
        .await;
        shutdown(&mut outbound).await;

        SessionOutcome::Relayed(stats)
    }
}

async fn shutdown(stream: &mut TcpStream) {
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "outbound shutdown failed");
    }
}
