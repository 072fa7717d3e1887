use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

use crate::base::{ConnectError, Target};
use crate::handshake::{Handshaker, HandshakeSession};
use crate::socket::proxy::ProxySettings;

/// Upper bound on the proxy's CONNECT response headers.
const MAX_RESPONSE_HEADER_BYTES: usize = 8192;

/// Tunnels through an HTTP proxy with a CONNECT request.
///
/// Runs as the first step of the pipeline when a proxy is configured: the
/// raw connect has dialed the proxy, and this step asks it to open a
/// tunnel to the real target. Bytes the proxy sends past its response
/// headers belong to the tunneled protocol and are preserved as residual
/// read-ahead.
pub struct HttpConnectHandshaker {
    target_authority: String,
    auth_header: Option<String>,
}

impl HttpConnectHandshaker {
    pub fn new(proxy: &ProxySettings, target: &Target) -> Self {
        Self {
            target_authority: target.authority(),
            auth_header: proxy.auth_header(),
        }
    }
}

#[async_trait]
impl Handshaker for HttpConnectHandshaker {
    fn name(&self) -> &'static str {
        "http_connect"
    }

    async fn handshake(
        &self,
        mut session: HandshakeSession,
        _deadline: Instant,
    ) -> Result<HandshakeSession, ConnectError> {
        // 1. Send the CONNECT request.
        let mut request = format!(
            "CONNECT {} HTTP/1.1\r\nHost: {}\r\n",
            self.target_authority, self.target_authority
        );
        if let Some(auth) = &self.auth_header {
            request.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
        }
        request.push_str("\r\n");

        session
            .endpoint
            .write_all(request.as_bytes())
            .await
            .map_err(|e| ConnectError::handshake(format!("proxy write failed: {e}")))?;

        // 2. Read until the end of the response headers.
        let mut response = Vec::new();
        let mut buf = [0u8; 1024];
        let header_end = loop {
            if let Some(pos) = find_header_end(&response) {
                break pos;
            }
            if response.len() > MAX_RESPONSE_HEADER_BYTES {
                return Err(ConnectError::handshake("proxy response headers too big"));
            }
            let n = session
                .endpoint
                .read(&mut buf)
                .await
                .map_err(|e| ConnectError::handshake(format!("proxy read failed: {e}")))?;
            if n == 0 {
                return Err(ConnectError::handshake("proxy closed connection mid-response"));
            }
            response.extend_from_slice(&buf[..n]);
        };

        // 3. Check the status line.
        let head = String::from_utf8_lossy(&response[..header_end]);
        let status_line = head.lines().next().unwrap_or("");
        if !status_line.starts_with("HTTP/1.1 200") && !status_line.starts_with("HTTP/1.0 200") {
            tracing::debug!(status = %status_line, "proxy refused CONNECT");
            return Err(ConnectError::handshake(format!(
                "proxy refused tunnel: {status_line}"
            )));
        }
        tracing::debug!(addr = %self.target_authority, "proxy tunnel established");

        // 4. Anything past the headers is read-ahead for the next layer.
        session.residual.extend_from_slice(&response[header_end + 4..]);
        Ok(session)
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ChannelConfig;
    use std::time::Duration;

    fn handshaker(auth: bool) -> HttpConnectHandshaker {
        let mut proxy = ProxySettings::new("http://proxy.internal:3128").unwrap();
        if auth {
            proxy = proxy.with_auth("user", "pass");
        }
        HttpConnectHandshaker::new(&proxy, &Target::new("svc.local", 50051))
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    async fn run_with_response(
        hs: HttpConnectHandshaker,
        response: &'static [u8],
    ) -> (Result<HandshakeSession, ConnectError>, Vec<u8>) {
        let (client, mut server) = tokio::io::duplex(4096);
        let server_task = tokio::spawn(async move {
            let mut request = vec![0u8; 1024];
            let n = server.read(&mut request).await.unwrap();
            request.truncate(n);
            server.write_all(response).await.unwrap();
            request
        });

        let session = HandshakeSession::new(Box::new(client), ChannelConfig::new());
        let result = hs.handshake(session, deadline()).await;
        let request = server_task.await.unwrap();
        (result, request)
    }

    #[tokio::test]
    async fn test_tunnel_established() {
        let (result, request) =
            run_with_response(handshaker(false), b"HTTP/1.1 200 Connection established\r\n\r\n")
                .await;
        let session = result.unwrap();
        assert!(session.residual.is_empty());

        let request = String::from_utf8(request).unwrap();
        assert!(request.starts_with("CONNECT svc.local:50051 HTTP/1.1\r\n"));
        assert!(request.contains("Host: svc.local:50051\r\n"));
        assert!(!request.contains("Proxy-Authorization"));
    }

    #[tokio::test]
    async fn test_residual_bytes_preserved() {
        let (result, _) = run_with_response(
            handshaker(false),
            b"HTTP/1.1 200 Connection established\r\n\r\nEARLYDATA",
        )
        .await;
        let session = result.unwrap();
        assert_eq!(&session.residual[..], b"EARLYDATA");
    }

    #[tokio::test]
    async fn test_auth_header_sent() {
        let (result, request) =
            run_with_response(handshaker(true), b"HTTP/1.1 200 OK\r\n\r\n").await;
        assert!(result.is_ok());
        let request = String::from_utf8(request).unwrap();
        assert!(request.contains("Proxy-Authorization: Basic dXNlcjpwYXNz\r\n"));
    }

    #[tokio::test]
    async fn test_proxy_refusal_fails_handshake() {
        let (result, _) = run_with_response(
            handshaker(false),
            b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ConnectError::HandshakeFailed(_)));
    }

    #[tokio::test]
    async fn test_truncated_response_fails_handshake() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut request = vec![0u8; 1024];
            let _ = server.read(&mut request).await;
            server.write_all(b"HTTP/1.1 200 OK\r\n").await.unwrap();
            drop(server); // close before the header terminator
        });

        let session = HandshakeSession::new(Box::new(client), ChannelConfig::new());
        let err = handshaker(false).handshake(session, deadline()).await.unwrap_err();
        assert!(matches!(err, ConnectError::HandshakeFailed(_)));
    }
}
