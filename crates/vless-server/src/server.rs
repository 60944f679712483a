//! Core server: accepts TCP connections, speaks HTTP/1.1 on them, and hands
//! WebSocket upgrades to tunnel sessions.
//!
//! Owns the tunnel settings and the session limiter. Every accepted
//! connection gets its own task; every upgraded WebSocket gets its own
//! [`TunnelSession`] task.

use crate::config::ServerConfig;
use crate::http;
use crate::limits::SessionLimiter;
use crate::transport::websocket::{self, WebSocketTransport};
use crate::tunnel::{TunnelSession, TunnelSettings};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::HOST;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use vless_core::{VlessError, VlessResult};

/// The relay server instance.
pub struct RelayServer {
    /// Server configuration.
    config: ServerConfig,
    /// Settings handed to every tunnel session.
    settings: Arc<TunnelSettings>,
    /// Concurrent session cap.
    limiter: SessionLimiter,
    /// Next session id, for log correlation only.
    next_session_id: AtomicU64,
}

impl RelayServer {
    pub fn new(config: ServerConfig) -> Self {
        let settings = Arc::new(TunnelSettings {
            identifier: config.identifier,
            connect_timeout: config.connect_timeout,
            handshake_timeout: config.handshake_timeout,
            idle_timeout: config.idle_timeout,
        });
        let limiter = SessionLimiter::new(config.max_sessions);

        Self {
            config,
            settings,
            limiter,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> VlessResult<TcpListener> {
        let addr = SocketAddr::new(self.config.bind, self.config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| VlessError::Transport(format!("bind {addr} failed: {e}")))?;
        info!(addr = %addr, "listening");
        Ok(listener)
    }

    /// Bind and serve until the task is dropped.
    pub async fn run(self) -> VlessResult<()> {
        let listener = self.bind().await?;
        Arc::new(self).serve(listener).await;
        Ok(())
    }

    /// Accept loop. Never returns; accept errors are logged and skipped.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.serve_connection(stream, peer).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    }

    async fn serve_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let io = TokioIo::new(stream);
        let server = self.clone();
        let service = service_fn(move |req| {
            let server = server.clone();
            async move { server.handle_request(req, peer).await }
        });

        if let Err(e) = http1::Builder::new()
            .serve_connection(io, service)
            .with_upgrades()
            .await
        {
            debug!(peer = %peer, error = %e, "HTTP connection ended with error");
        }
    }

    async fn handle_request(
        self: Arc<Self>,
        req: Request<Incoming>,
        peer: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        if websocket::is_upgrade_request(&req) {
            return Ok(self.start_tunnel(req, peer));
        }

        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let host = req
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned);
        drop(req);

        let resp = match (&method, path.as_str()) {
            (&Method::GET, "/") => http::landing_page(&self.config.index_path).await,
            (&Method::GET, "/sub") => http::subscription(
                &self.config.identifier,
                host.as_deref(),
                self.config.subscription_port,
                &self.config.node_name,
            ),
            _ => http::empty(StatusCode::NOT_FOUND),
        };
        debug!(peer = %peer, method = %method, path = %path, status = %resp.status(), "http request");
        Ok(resp)
    }

    /// Answer the upgrade and spawn the session that takes over the socket.
    fn start_tunnel(&self, mut req: Request<Incoming>, peer: SocketAddr) -> Response<Full<Bytes>> {
        let Some(guard) = self.limiter.try_acquire() else {
            warn!(
                peer = %peer,
                active = self.limiter.active(),
                max = self.limiter.max_sessions(),
                "session limit reached, refusing upgrade"
            );
            return http::empty(StatusCode::SERVICE_UNAVAILABLE);
        };
        let Some(resp) = websocket::upgrade_response(&req) else {
            return http::empty(StatusCode::BAD_REQUEST);
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let settings = self.settings.clone();
        tokio::spawn(async move {
            let _guard = guard; // slot held until the session ends
            match hyper::upgrade::on(&mut req).await {
                Ok(upgraded) => {
                    debug!(session_id, peer = %peer, "WebSocket upgraded");
                    let transport = WebSocketTransport::from_upgraded(upgraded).await;
                    TunnelSession::new(session_id, peer, settings)
                        .run(transport)
                        .await;
                }
                Err(e) => {
                    warn!(session_id, peer = %peer, error = %e, "WebSocket upgrade failed");
                }
            }
        });

        resp
    }
}
