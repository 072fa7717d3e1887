//! Multiplexed transport construction.
//!
//! The connector's final stage turns a negotiated endpoint into a
//! stream-multiplexing transport:
//! - [`Transport`] / [`TransportBuilder`]: the construction seam the
//!   connector drives; builders are infallible because the handshake has
//!   already validated the endpoint
//! - [`rewind`]: replays handshake read-ahead bytes before the endpoint
//! - [`http2`]: the default HTTP/2 transport built on hyper's client
//!   connection

pub mod http2;
pub mod rewind;

use std::fmt;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::base::{ChannelConfig, ConnectError};
use crate::socket::endpoint::BoxedEndpoint;

pub use http2::{Http2Transport, Http2TransportBuilder};
pub use rewind::Rewind;

/// A stream-multiplexing transport handle.
///
/// Ownership passes to the caller through the connection attempt's result
/// slot. The handle is inert until [`start_reading`](Transport::start_reading)
/// seeds its read loop with the handshake's residual bytes.
pub trait Transport: Send + fmt::Debug {
    /// Begin the transport's read loop. `residual` holds bytes the
    /// handshake read past the end of its own exchange; they must be
    /// consumed before any fresh endpoint reads. Called exactly once.
    fn start_reading(&mut self, residual: Bytes);

    /// Resolves once the multiplexed session is established (or has
    /// terminally failed). Requires a prior `start_reading`.
    fn ready(&mut self) -> BoxFuture<'_, Result<(), ConnectError>>;
}

/// Constructs a [`Transport`] from a negotiated endpoint.
///
/// Construction is infallible by design: the handshake pipeline has
/// already validated the endpoint, so there is no recoverable failure
/// left at this point. Session-level failures surface later through
/// [`Transport::ready`] and the transport's own calls.
pub trait TransportBuilder: Send + Sync {
    fn build_transport(
        &self,
        config: &ChannelConfig,
        endpoint: BoxedEndpoint,
    ) -> Box<dyn Transport>;
}
