use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::client::conn::http2::SendRequest;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::sync::oneshot;

use crate::base::{ChannelConfig, ConnectError};
use crate::socket::endpoint::BoxedEndpoint;
use crate::transport::rewind::Rewind;
use crate::transport::{Transport, TransportBuilder};

/// HTTP/2 client transport over a negotiated endpoint.
///
/// Construction stores the endpoint and does no I/O; `start_reading`
/// wraps it with the residual read-ahead and spawns the connection driver
/// task, which performs the HTTP/2 preface exchange and then multiplexes
/// streams until the peer goes away.
pub struct Http2Transport {
    endpoint: Option<BoxedEndpoint>,
    ready_rx: Option<oneshot::Receiver<Result<SendRequest<Empty<Bytes>>, ConnectError>>>,
    sender: Option<SendRequest<Empty<Bytes>>>,
}

impl Http2Transport {
    pub fn new(endpoint: BoxedEndpoint) -> Self {
        Self { endpoint: Some(endpoint), ready_rx: None, sender: None }
    }

    /// Issue a request over the multiplexed session, waiting for session
    /// establishment first if needed.
    pub async fn send_request(
        &mut self,
        req: Request<Empty<Bytes>>,
    ) -> Result<Response<Incoming>, ConnectError> {
        self.ready_inner().await?;
        let sender = self.sender.as_mut().ok_or(ConnectError::Internal("transport not ready"))?;
        sender
            .send_request(req)
            .await
            .map_err(|e| ConnectError::Internal(if e.is_closed() {
                "transport session closed"
            } else {
                "transport stream failed"
            }))
    }

    async fn ready_inner(&mut self) -> Result<(), ConnectError> {
        if self.sender.is_some() {
            return Ok(());
        }
        let rx =
            self.ready_rx.take().ok_or(ConnectError::Internal("transport not started"))?;
        match rx.await {
            Ok(Ok(sender)) => {
                self.sender = Some(sender);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ConnectError::Internal("transport driver terminated")),
        }
    }
}

impl std::fmt::Debug for Http2Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http2Transport")
            .field("started", &self.endpoint.is_none())
            .field("ready", &self.sender.is_some())
            .finish()
    }
}

impl Transport for Http2Transport {
    fn start_reading(&mut self, residual: Bytes) {
        let endpoint = self.endpoint.take().expect("start_reading called twice");
        let (tx, rx) = oneshot::channel();
        self.ready_rx = Some(rx);

        let io = TokioIo::new(Rewind::new(residual, endpoint));
        tokio::spawn(async move {
            match hyper::client::conn::http2::handshake(TokioExecutor::new(), io).await {
                Ok((sender, conn)) => {
                    let _ = tx.send(Ok(sender));
                    if let Err(e) = conn.await {
                        tracing::debug!(error = %e, "transport connection terminated");
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "transport session establishment failed");
                    let _ = tx.send(Err(ConnectError::Internal(
                        "transport session establishment failed",
                    )));
                }
            }
        });
    }

    fn ready(&mut self) -> BoxFuture<'_, Result<(), ConnectError>> {
        Box::pin(self.ready_inner())
    }
}

/// Builds [`Http2Transport`]s. The default transport builder for channel
/// factories.
#[derive(Debug, Clone, Copy, Default)]
pub struct Http2TransportBuilder;

impl Http2TransportBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl TransportBuilder for Http2TransportBuilder {
    fn build_transport(
        &self,
        _config: &ChannelConfig,
        endpoint: BoxedEndpoint,
    ) -> Box<dyn Transport> {
        Box::new(Http2Transport::new(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::service::service_fn;
    use std::convert::Infallible;

    /// Minimal in-memory HTTP/2 server for one connection.
    fn spawn_h2_server(server_io: Box<dyn crate::socket::Endpoint>) {
        tokio::spawn(async move {
            let service = service_fn(|_req: Request<Incoming>| async {
                Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"ok"))))
            });
            let _ = hyper::server::conn::http2::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(server_io), service)
                .await;
        });
    }

    #[tokio::test]
    async fn test_ready_and_request_roundtrip() {
        let (client, server) = tokio::io::duplex(16 * 1024);
        spawn_h2_server(Box::new(server));

        let mut transport = Http2Transport::new(Box::new(client));
        transport.start_reading(Bytes::new());
        transport.ready().await.unwrap();

        let req = Request::builder()
            .uri("http://svc.local/ping")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let resp = transport.send_request(req).await.unwrap();
        assert!(resp.status().is_success());
    }

    #[tokio::test]
    async fn test_request_fails_when_peer_is_not_http2() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            // Not an HTTP/2 peer: the connection driver dies on the bogus
            // frame and in-flight requests fail.
            let _ = server.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            drop(server);
        });

        let mut transport = Http2Transport::new(Box::new(client));
        transport.start_reading(Bytes::new());

        let req = Request::builder()
            .uri("http://svc.local/ping")
            .body(Empty::<Bytes>::new())
            .unwrap();
        assert!(transport.send_request(req).await.is_err());
    }

    #[tokio::test]
    async fn test_ready_without_start_is_an_error() {
        let (client, _server) = tokio::io::duplex(64);
        let mut transport = Http2Transport::new(Box::new(client));
        assert_eq!(
            transport.ready().await,
            Err(ConnectError::Internal("transport not started"))
        );
    }
}
