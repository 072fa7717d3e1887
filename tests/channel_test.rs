//! Channel Factory Tests
//!
//! Covers:
//! - Proxy-configured factories put the CONNECT step first in the pipeline
//! - Lame-channel degradation instead of unusable handles
//! - End-to-end connect through a scripted proxy with residual read-ahead

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::time::Instant;

use rpcnet::base::{ChannelConfig, ConnectError, Target};
use rpcnet::channel::{ChannelFactory, ChannelFactoryConfig};
use rpcnet::socket::{BoxedEndpoint, ProxySettings, RawConnector};
use rpcnet::transport::{Transport, TransportBuilder};

struct MockRaw {
    server_tx: mpsc::UnboundedSender<DuplexStream>,
    dialed: Mutex<Vec<Target>>,
}

impl MockRaw {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DuplexStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { server_tx: tx, dialed: Mutex::new(Vec::new()) }), rx)
    }
}

#[async_trait]
impl RawConnector for MockRaw {
    async fn connect(
        &self,
        target: &Target,
        _config: &ChannelConfig,
        _deadline: Instant,
    ) -> Result<BoxedEndpoint, ConnectError> {
        self.dialed.lock().unwrap().push(target.clone());
        let (client, server) = tokio::io::duplex(4096);
        let _ = self.server_tx.send(server);
        Ok(Box::new(client))
    }
}

#[derive(Debug)]
struct RecordingTransport {
    residual: Arc<Mutex<Option<Bytes>>>,
}

impl Transport for RecordingTransport {
    fn start_reading(&mut self, residual: Bytes) {
        *self.residual.lock().unwrap() = Some(residual);
    }

    fn ready(&mut self) -> BoxFuture<'_, Result<(), ConnectError>> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Default)]
struct RecordingTransportBuilder {
    built: AtomicUsize,
    residual: Arc<Mutex<Option<Bytes>>>,
}

impl TransportBuilder for RecordingTransportBuilder {
    fn build_transport(
        &self,
        _config: &ChannelConfig,
        _endpoint: BoxedEndpoint,
    ) -> Box<dyn Transport> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Box::new(RecordingTransport { residual: Arc::clone(&self.residual) })
    }
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

#[tokio::test]
async fn test_proxy_factory_prepends_connect_handshaker() {
    let factory = ChannelFactory::new(ChannelFactoryConfig {
        proxy: ProxySettings::new("http://proxy.internal:3128"),
        ..Default::default()
    });

    let connector = factory.create_connector(&Target::new("svc.local", 50051));
    assert_eq!(connector.handshake_manager().handshaker_names(), vec!["http_connect"]);

    // And the raw connect dials the proxy, not the target.
    assert_eq!(
        factory.dial_target(&Target::new("svc.local", 50051)),
        Target::new("proxy.internal", 3128)
    );
}

#[tokio::test]
async fn test_plain_factory_has_empty_pipeline() {
    let factory = ChannelFactory::new(ChannelFactoryConfig::default());
    let connector = factory.create_connector(&Target::new("svc.local", 50051));
    assert!(connector.handshake_manager().is_empty());
    assert_eq!(
        factory.dial_target(&Target::new("svc.local", 50051)),
        Target::new("svc.local", 50051)
    );
}

#[tokio::test]
async fn test_invalid_target_degrades_to_lame_channel() {
    let factory = ChannelFactory::new(ChannelFactoryConfig::default());
    let channel = factory.create_plaintext_channel("not a target", ChannelConfig::new());

    assert!(channel.is_lame());
    assert!(channel.subchannel().is_none());

    // Every call fails with the fixed internal status, repeatedly.
    for _ in 0..3 {
        let err = channel.connect_once(deadline()).await.unwrap_err();
        assert_eq!(err, ConnectError::Internal("failed to create channel"));
    }
}

#[tokio::test]
async fn test_valid_target_yields_working_channel() {
    let factory = ChannelFactory::new(ChannelFactoryConfig::default());
    let channel = factory.create_plaintext_channel("svc.local:50051", ChannelConfig::new());
    assert!(!channel.is_lame());
    assert_eq!(channel.target(), "svc.local:50051");
    assert!(channel.subchannel().is_some());
}

#[tokio::test]
async fn test_connect_once_hands_over_result() {
    let (raw, mut servers) = MockRaw::new();
    let builder = Arc::new(RecordingTransportBuilder::default());

    let factory = ChannelFactory::new(ChannelFactoryConfig::default())
        .with_raw_connector(Arc::clone(&raw) as Arc<dyn RawConnector>)
        .with_transport_builder(Arc::clone(&builder) as Arc<dyn TransportBuilder>);

    let config = ChannelConfig::new().set_str("authority", "svc.local");
    let channel = factory.create_plaintext_channel("svc.local:50051", config.clone());

    let result = channel.connect_once(deadline()).await.unwrap();
    assert!(result.transport.is_some());
    assert_eq!(result.config, Some(config));
    assert_eq!(builder.built.load(Ordering::SeqCst), 1);
    let _server = servers.recv().await.unwrap();
}

#[tokio::test]
async fn test_connect_through_scripted_proxy_seeds_residual() {
    let (raw, mut servers) = MockRaw::new();
    let builder = Arc::new(RecordingTransportBuilder::default());

    let factory = ChannelFactory::new(ChannelFactoryConfig {
        proxy: ProxySettings::new("http://proxy.internal:3128"),
        ..Default::default()
    })
    .with_raw_connector(Arc::clone(&raw) as Arc<dyn RawConnector>)
    .with_transport_builder(Arc::clone(&builder) as Arc<dyn TransportBuilder>);

    let channel = factory.create_plaintext_channel("svc.local:50051", ChannelConfig::new());

    // Scripted proxy: accept the CONNECT and pipeline two early bytes of
    // the tunneled protocol behind the response headers.
    tokio::spawn(async move {
        let mut server = servers.recv().await.unwrap();
        let mut request = vec![0u8; 1024];
        let n = server.read(&mut request).await.unwrap();
        let request = String::from_utf8_lossy(&request[..n]).to_string();
        assert!(request.starts_with("CONNECT svc.local:50051 HTTP/1.1\r\n"));
        server
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\nOK")
            .await
            .unwrap();
        // Keep the tunnel open until the test is done with it.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let result = channel.connect_once(deadline()).await.unwrap();
    assert!(result.transport.is_some());
    assert!(result.config.is_some());

    // The raw connect dialed the proxy, and the transport's read loop was
    // seeded with the proxy's read-ahead.
    assert_eq!(raw.dialed.lock().unwrap().as_slice(), &[Target::new("proxy.internal", 3128)]);
    assert_eq!(builder.residual.lock().unwrap().as_deref(), Some(&b"OK"[..]));
}

#[tokio::test]
async fn test_proxy_refusal_surfaces_handshake_failure() {
    let (raw, mut servers) = MockRaw::new();
    let builder = Arc::new(RecordingTransportBuilder::default());

    let factory = ChannelFactory::new(ChannelFactoryConfig {
        proxy: ProxySettings::new("http://proxy.internal:3128"),
        ..Default::default()
    })
    .with_raw_connector(Arc::clone(&raw) as Arc<dyn RawConnector>)
    .with_transport_builder(Arc::clone(&builder) as Arc<dyn TransportBuilder>);

    let channel = factory.create_plaintext_channel("svc.local:50051", ChannelConfig::new());

    tokio::spawn(async move {
        let mut server = servers.recv().await.unwrap();
        let mut request = vec![0u8; 1024];
        let _ = server.read(&mut request).await.unwrap();
        server.write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n").await.unwrap();
    });

    let err = channel.connect_once(deadline()).await.unwrap_err();
    assert!(matches!(err, ConnectError::HandshakeFailed(_)));
    assert_eq!(builder.built.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_factory_preamble_parks_attempt() {
    let (raw, mut servers) = MockRaw::new();
    let builder = Arc::new(RecordingTransportBuilder::default());

    let factory = ChannelFactory::new(ChannelFactoryConfig {
        preamble: Bytes::from_static(b"PRI\r\n"),
        ..Default::default()
    })
    .with_raw_connector(Arc::clone(&raw) as Arc<dyn RawConnector>)
    .with_transport_builder(Arc::clone(&builder) as Arc<dyn TransportBuilder>);

    let channel = factory.create_plaintext_channel("svc.local:50051", ChannelConfig::new());

    let server_task = tokio::spawn(async move {
        let mut server = servers.recv().await.unwrap();
        let mut preamble = vec![0u8; 5];
        server.read_exact(&mut preamble).await.unwrap();
        preamble
    });

    // The waiting interface reports the parked attempt as abandoned.
    let err = channel.connect_once(deadline()).await.unwrap_err();
    assert_eq!(err, ConnectError::Internal("connection attempt abandoned"));
    assert_eq!(server_task.await.unwrap(), b"PRI\r\n");
    assert_eq!(builder.built.load(Ordering::SeqCst), 0);
}
