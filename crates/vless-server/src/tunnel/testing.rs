//! In-memory transport and socket helpers shared by tunnel tests.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use vless_core::{MessageReader, MessageStream, MessageWriter, TransportFuture, VlessError};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Server side of an in-memory message transport.
pub struct ChannelTransport {
    rx: UnboundedReceiver<Vec<u8>>,
    tx: UnboundedSender<Vec<u8>>,
}

pub struct ChannelReader {
    rx: UnboundedReceiver<Vec<u8>>,
}

pub struct ChannelWriter {
    tx: Option<UnboundedSender<Vec<u8>>>,
}

impl MessageStream for ChannelTransport {
    type Reader = ChannelReader;
    type Writer = ChannelWriter;

    fn split(self) -> (ChannelReader, ChannelWriter) {
        (ChannelReader { rx: self.rx }, ChannelWriter { tx: Some(self.tx) })
    }
}

impl MessageReader for ChannelReader {
    fn recv(&mut self) -> TransportFuture<'_, Option<Vec<u8>>> {
        Box::pin(async move { Ok(self.rx.recv().await) })
    }
}

impl MessageWriter for ChannelWriter {
    fn send<'a>(&'a mut self, data: &'a [u8]) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            let tx = self
                .tx
                .as_ref()
                .ok_or_else(|| VlessError::Transport("writer closed".into()))?;
            tx.send(data.to_vec())
                .map_err(|_| VlessError::Transport("peer gone".into()))
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.tx = None;
            Ok(())
        })
    }
}

/// Client side of an in-memory message transport.
pub struct TestClient {
    to_server: Option<UnboundedSender<Vec<u8>>>,
    from_server: UnboundedReceiver<Vec<u8>>,
}

impl TestClient {
    pub fn send(&self, data: impl Into<Vec<u8>>) {
        if let Some(tx) = &self.to_server {
            let _ = tx.send(data.into());
        }
    }

    /// Next message from the server, `None` once the server side closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        tokio::time::timeout(RECV_TIMEOUT, self.from_server.recv())
            .await
            .expect("timed out waiting for server message")
    }

    /// Collect messages until `len` bytes arrived.
    pub async fn recv_all(&mut self, len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        while out.len() < len {
            let msg = self.recv().await.expect("server closed early");
            out.extend_from_slice(&msg);
        }
        out
    }

    pub fn close(&mut self) {
        self.to_server = None;
    }
}

pub fn channel_transport() -> (ChannelTransport, TestClient) {
    let (to_server, rx) = unbounded_channel();
    let (tx, from_server) = unbounded_channel();
    (
        ChannelTransport { rx, tx },
        TestClient {
            to_server: Some(to_server),
            from_server,
        },
    )
}

/// A connected TCP pair: (local end, remote end).
pub async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (local, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (local.unwrap(), accepted.unwrap().0)
}

/// Spawn a TCP echo server and return its address.
pub async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut rd, mut wr) = stream.split();
                let _ = tokio::io::copy(&mut rd, &mut wr).await;
            });
        }
    });
    addr
}

/// Read from `stream` until `len` bytes arrived or the deadline passes.
pub async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(RECV_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("timed out reading from socket")
        .unwrap();
    buf
}

/// Write `data` and flush.
pub async fn write_all(stream: &mut TcpStream, data: &[u8]) {
    stream.write_all(data).await.unwrap();
    stream.flush().await.unwrap();
}
