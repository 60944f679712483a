//! Plain HTTP responses served next to the tunnel endpoint.
//!
//! `/` returns the landing page from disk, `/sub` returns a base64-encoded
//! `vless://` share link for the host the client used to reach us.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use std::path::Path;
use tracing::warn;
use vless_core::Identifier;

const HTML_UTF8: &str = "text/html; charset=utf-8";
const TEXT_UTF8: &str = "text/plain; charset=utf-8";

/// Respond with an empty body and the given status.
pub fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = status;
    resp
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

/// Serve the landing page, or `500 Server Error` if it cannot be read.
pub async fn landing_page(index_path: &Path) -> Response<Full<Bytes>> {
    match tokio::fs::read(index_path).await {
        Ok(content) => with_body(StatusCode::OK, HTML_UTF8, Bytes::from(content)),
        Err(e) => {
            warn!(path = %index_path.display(), error = %e, "cannot read landing page");
            let mut resp = empty(StatusCode::INTERNAL_SERVER_ERROR);
            *resp.body_mut() = Full::new(Bytes::from_static(b"Server Error"));
            resp
        }
    }
}

/// Build the share link advertised by `/sub`.
///
/// The link assumes TLS is terminated in front of us on `port` and that the
/// tunnel is reached over WebSocket at `/`.
pub fn share_link(identifier: &Identifier, host: &str, port: u16, name: &str) -> String {
    format!(
        "vless://{identifier}@{host}:{port}?encryption=none&security=tls&sni={host}&type=ws&host={host}&path=%2F#{name}"
    )
}

/// Serve the base64 subscription body for `host`.
///
/// `host` is the request's `Host` header; without one there is nothing to
/// advertise and the request is refused.
pub fn subscription(
    identifier: &Identifier,
    host: Option<&str>,
    port: u16,
    name: &str,
) -> Response<Full<Bytes>> {
    let Some(host) = host.filter(|h| !h.is_empty()) else {
        return empty(StatusCode::BAD_REQUEST);
    };
    let link = share_link(identifier, host, port, name);
    let encoded = STANDARD.encode(link);
    with_body(StatusCode::OK, TEXT_UTF8, Bytes::from(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn identifier() -> Identifier {
        "5efabea4-f6d4-91fd-b8f0-17e004c89c60".parse().unwrap()
    }

    async fn body_bytes(resp: Response<Full<Bytes>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn share_link_format() {
        let link = share_link(&identifier(), "node.example", 443, "HF-Node");
        assert_eq!(
            link,
            "vless://5efabea4-f6d4-91fd-b8f0-17e004c89c60@node.example:443?encryption=none\
             &security=tls&sni=node.example&type=ws&host=node.example&path=%2F#HF-Node"
        );
    }

    #[tokio::test]
    async fn subscription_is_base64_of_link() {
        let resp = subscription(&identifier(), Some("node.example"), 443, "HF-Node");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), TEXT_UTF8);
        let body = body_bytes(resp).await;
        let decoded = STANDARD.decode(&body).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            share_link(&identifier(), "node.example", 443, "HF-Node")
        );
    }

    #[test]
    fn subscription_without_host_is_bad_request() {
        let resp = subscription(&identifier(), None, 443, "HF-Node");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = subscription(&identifier(), Some(""), 443, "HF-Node");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn landing_page_reads_file() {
        let path = std::env::temp_dir().join(format!("vless-landing-{}.html", std::process::id()));
        tokio::fs::write(&path, b"<h1>hi</h1>").await.unwrap();
        let resp = landing_page(&path).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), HTML_UTF8);
        assert_eq!(body_bytes(resp).await, Bytes::from_static(b"<h1>hi</h1>"));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_landing_page_is_server_error() {
        let resp = landing_page(Path::new("/nonexistent/vless/index.html")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_bytes(resp).await, Bytes::from_static(b"Server Error"));
    }
}
