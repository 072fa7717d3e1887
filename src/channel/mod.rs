//! Channel-factory glue.
//!
//! Provisions one [`Connector`] per subchannel and wraps it in a
//! [`Channel`] handle:
//! - a proxy-configured factory prepends an HTTP CONNECT handshaker to
//!   every connector's pipeline
//! - [`ChannelFactory::create_plaintext_channel`] never returns an
//!   unusable handle; provisioning failure degrades to a lame channel that
//!   fails every call with a fixed internal error

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::base::{ChannelConfig, ConnectError, Target};
use crate::connector::{new_result_slot, ConnectArgs, ConnectResult, Connector};
use crate::exec::ExecCtx;
use crate::handshake::{HandshakeManager, HttpConnectHandshaker};
use crate::socket::proxy::ProxySettings;
use crate::socket::raw::{RawConnector, TcpRawConnector};
use crate::transport::{Http2TransportBuilder, TransportBuilder};

/// The fixed status every call on a lame channel reports.
const LAME_CHANNEL_STATUS: &str = "failed to create channel";

/// Explicit factory configuration. Passed to channel construction instead
/// of living in process-wide state.
#[derive(Debug, Clone, Default)]
pub struct ChannelFactoryConfig {
    /// HTTP proxy to tunnel through, if any.
    pub proxy: Option<ProxySettings>,
    /// Raw bytes to send after every raw connect, before any handshake.
    /// Empty means none.
    pub preamble: Bytes,
}

/// Builds connectors and channels.
pub struct ChannelFactory {
    exec: ExecCtx,
    raw: Arc<dyn RawConnector>,
    transport_builder: Arc<dyn TransportBuilder>,
    config: ChannelFactoryConfig,
}

impl ChannelFactory {
    /// Create a factory with the default TCP raw connector and HTTP/2
    /// transport builder. Must be called from within a tokio runtime.
    pub fn new(config: ChannelFactoryConfig) -> Self {
        Self {
            exec: ExecCtx::new(),
            raw: Arc::new(TcpRawConnector::new()),
            transport_builder: Arc::new(Http2TransportBuilder::new()),
            config,
        }
    }

    /// Substitute the raw connector (tests, alternative socket layers).
    pub fn with_raw_connector(mut self, raw: Arc<dyn RawConnector>) -> Self {
        self.raw = raw;
        self
    }

    /// Substitute the transport builder.
    pub fn with_transport_builder(mut self, builder: Arc<dyn TransportBuilder>) -> Self {
        self.transport_builder = builder;
        self
    }

    /// Provision one connector for `target`, with a CONNECT handshaker
    /// first in the pipeline when a proxy is configured.
    pub fn create_connector(&self, target: &Target) -> Arc<Connector> {
        let mut mgr = HandshakeManager::new();
        if let Some(proxy) = &self.config.proxy {
            mgr.add(Box::new(HttpConnectHandshaker::new(proxy, target)));
        }
        Arc::new(Connector::new(
            self.exec.clone(),
            Arc::clone(&self.raw),
            Arc::clone(&self.transport_builder),
            mgr,
        ))
    }

    /// The address the raw connect should dial for `target`: the proxy
    /// when one is configured, the target itself otherwise.
    pub fn dial_target(&self, target: &Target) -> Target {
        match &self.config.proxy {
            Some(proxy) => proxy.target(),
            None => target.clone(),
        }
    }

    /// Create a plaintext channel for `target` (`host:port`).
    ///
    /// Never returns an unusable handle: if the target does not parse or
    /// the subchannel cannot be provisioned, the result is a lame channel
    /// whose every call fails with a fixed internal error, so callers
    /// never need to null-check.
    pub fn create_plaintext_channel(&self, target: &str, config: ChannelConfig) -> Channel {
        let parsed: Target = match target.parse() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(addr = %target, error = %e, "channel creation degraded to lame");
                return Channel {
                    target: target.to_string(),
                    inner: ChannelKind::Lame { status: ConnectError::Internal(LAME_CHANNEL_STATUS) },
                };
            }
        };

        let subchannel = Subchannel {
            dial_target: self.dial_target(&parsed),
            preamble: self.config.preamble.clone(),
            connector: self.create_connector(&parsed),
            config,
        };
        Channel { target: target.to_string(), inner: ChannelKind::Working(Box::new(subchannel)) }
    }
}

impl std::fmt::Debug for ChannelFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelFactory").field("config", &self.config).finish()
    }
}

/// One subchannel: a connector plus the arguments it is dialed with.
#[derive(Debug)]
pub struct Subchannel {
    dial_target: Target,
    preamble: Bytes,
    connector: Arc<Connector>,
    config: ChannelConfig,
}

impl Subchannel {
    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    /// Run a single connection attempt and wait for its terminal result.
    /// No retry, no backoff; those decisions belong to the caller.
    pub async fn connect_once(&self, deadline: Instant) -> Result<ConnectResult, ConnectError> {
        let args = ConnectArgs::new(self.dial_target.clone(), self.config.clone(), deadline)
            .with_preamble(self.preamble.clone());
        let slot = new_result_slot();
        let (tx, rx) = oneshot::channel();
        self.connector.start(
            args,
            Arc::clone(&slot),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        // A dropped sender means the attempt ended without a completion
        // (the preamble path), which this waiting interface surfaces as an
        // abandonment error.
        rx.await.map_err(|_| ConnectError::Internal("connection attempt abandoned"))??;
        let result = std::mem::take(&mut *slot.lock().unwrap());
        Ok(result)
    }
}

#[derive(Debug)]
enum ChannelKind {
    Working(Box<Subchannel>),
    Lame { status: ConnectError },
}

/// A channel handle. Always usable: lame channels accept calls and fail
/// each one with their fixed status instead of being null.
#[derive(Debug)]
pub struct Channel {
    target: String,
    inner: ChannelKind,
}

impl Channel {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_lame(&self) -> bool {
        matches!(self.inner, ChannelKind::Lame { .. })
    }

    /// The subchannel backing this channel, if it is not lame.
    pub fn subchannel(&self) -> Option<&Subchannel> {
        match &self.inner {
            ChannelKind::Working(sub) => Some(sub),
            ChannelKind::Lame { .. } => None,
        }
    }

    /// Run one connection attempt for this channel.
    pub async fn connect_once(&self, deadline: Instant) -> Result<ConnectResult, ConnectError> {
        match &self.inner {
            ChannelKind::Working(sub) => sub.connect_once(deadline).await,
            ChannelKind::Lame { status } => Err(status.clone()),
        }
    }
}
