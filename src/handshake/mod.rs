//! Handshake negotiation pipeline.
//!
//! A connected endpoint is not usable for RPC traffic until every
//! configured negotiation step has run against it. This module provides:
//! - [`Handshaker`]: one negotiation step (proxy tunnel, security, ...)
//! - [`HandshakeManager`](manager::HandshakeManager): the ordered pipeline,
//!   pass-through when empty
//! - [`http_connect`]: HTTP CONNECT proxy tunneling

pub mod http_connect;
pub mod manager;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::time::Instant;

use crate::base::{ChannelConfig, ConnectError};
use crate::socket::endpoint::BoxedEndpoint;

pub use http_connect::HttpConnectHandshaker;
pub use manager::HandshakeManager;

/// The in-progress negotiation state threaded through the pipeline.
///
/// Each stage takes the session by value and returns it (possibly with a
/// wrapped endpoint, a modified configuration, or extra residual bytes).
/// On failure the session is dropped by whoever holds it, which releases
/// the endpoint, the negotiated configuration, and any residual buffer in
/// one place.
#[derive(Debug)]
pub struct HandshakeSession {
    /// The endpoint under negotiation. Stages that layer a protocol on top
    /// (e.g. TLS) replace this with a wrapping endpoint.
    pub endpoint: BoxedEndpoint,
    /// The configuration as negotiated so far.
    pub config: ChannelConfig,
    /// Bytes read past the end of the negotiation exchange. These belong
    /// to the next protocol layer and must seed the transport's read loop.
    pub residual: BytesMut,
}

impl HandshakeSession {
    pub fn new(endpoint: BoxedEndpoint, config: ChannelConfig) -> Self {
        Self { endpoint, config, residual: BytesMut::new() }
    }
}

/// A single negotiation step in the handshake pipeline.
#[async_trait]
pub trait Handshaker: Send + Sync {
    /// Stable identifier used in tracing output and pipeline inspection.
    fn name(&self) -> &'static str;

    /// Run this step. The overall pipeline deadline is enforced by the
    /// manager; `deadline` is provided for stages that issue sub-requests
    /// with their own timing.
    async fn handshake(
        &self,
        session: HandshakeSession,
        deadline: Instant,
    ) -> Result<HandshakeSession, ConnectError>;
}
