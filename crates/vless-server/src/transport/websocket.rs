//! WebSocket transport using tokio-tungstenite.
//!
//! The HTTP front answers the upgrade request itself (see
//! [`upgrade_response`]); once hyper hands over the upgraded connection it is
//! wrapped in a [`WebSocketTransport`], which splits into the reader/writer
//! halves the tunnel runs on. Binary messages carry tunnel bytes; text,
//! ping and pong frames are skipped.

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::header::{
    HeaderValue, CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE,
};
use hyper::upgrade::Upgraded;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use vless_core::{
    MessageReader, MessageStream, MessageWriter, TransportFuture, VlessError,
};

/// Whether `req` asks for a WebSocket upgrade.
pub fn is_upgrade_request<B>(req: &Request<B>) -> bool {
    let headers = req.headers();
    let connection_upgrade = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    let upgrade_websocket = headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"));

    connection_upgrade && upgrade_websocket && headers.contains_key(SEC_WEBSOCKET_KEY)
}

/// Build the `101 Switching Protocols` response for an upgrade request.
///
/// Returns `None` when the request has no `Sec-WebSocket-Key`.
pub fn upgrade_response<B>(req: &Request<B>) -> Option<Response<Full<Bytes>>> {
    let key = req.headers().get(SEC_WEBSOCKET_KEY)?;
    let accept = derive_accept_key(key.as_bytes());

    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = resp.headers_mut();
    headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(SEC_WEBSOCKET_ACCEPT, HeaderValue::from_str(&accept).ok()?);
    Some(resp)
}

/// Message transport over an established WebSocket.
pub struct WebSocketTransport<S> {
    ws: WebSocketStream<S>,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self { ws }
    }

    /// Wrap a raw stream whose HTTP handshake has already completed.
    pub async fn from_raw(stream: S, role: Role) -> Self {
        Self::new(WebSocketStream::from_raw_socket(stream, role, None).await)
    }
}

impl WebSocketTransport<TokioIo<Upgraded>> {
    /// Wrap a connection hyper upgraded after our `101` response.
    pub async fn from_upgraded(upgraded: Upgraded) -> Self {
        Self::from_raw(TokioIo::new(upgraded), Role::Server).await
    }
}

impl<S> MessageStream for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Reader = WebSocketReader<S>;
    type Writer = WebSocketWriter<S>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketReader { stream },
            WebSocketWriter { sink, closed: false },
        )
    }
}

/// Receiving half of a [`WebSocketTransport`].
pub struct WebSocketReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

impl<S> MessageReader for WebSocketReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn recv(&mut self) -> TransportFuture<'_, Option<Vec<u8>>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    // Pings are answered by tungstenite itself.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return Err(VlessError::Transport(format!("WS recv failed: {e}")))
                    }
                }
            }
        })
    }
}

/// Sending half of a [`WebSocketTransport`].
pub struct WebSocketWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    closed: bool,
}

impl<S> MessageWriter for WebSocketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn send<'a>(&'a mut self, data: &'a [u8]) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.sink
                .send(Message::Binary(data.to_vec().into()))
                .await
                .map_err(|e| VlessError::Transport(format!("WS send failed: {e}")))
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            self.sink
                .close()
                .await
                .map_err(|e| VlessError::Transport(format!("WS close failed: {e}")))
        })
    }
}
