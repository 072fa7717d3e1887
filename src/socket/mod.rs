//! Raw socket layer.
//!
//! Provides the socket-level half of a connection attempt:
//! - [`endpoint`]: the [`Endpoint`](endpoint::Endpoint) byte-stream
//!   abstraction every later stage operates on
//! - [`raw`]: asynchronous DNS → TCP connect with deadline enforcement
//! - [`proxy`]: HTTP proxy settings consumed by the CONNECT handshaker

pub mod endpoint;
pub mod proxy;
pub mod raw;

pub use endpoint::{BoxedEndpoint, Endpoint};
pub use proxy::ProxySettings;
pub use raw::{RawConnector, TcpRawConnector};
