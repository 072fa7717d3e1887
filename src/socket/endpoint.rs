use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

/// A connected byte stream.
///
/// Everything after the raw connect (preamble write, handshake stages,
/// transport framing) operates on this abstraction rather than a concrete
/// socket type, so handshakers can wrap one endpoint in another (TLS over
/// TCP, tunnel over proxy) and tests can substitute in-memory streams.
pub trait Endpoint: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T> Endpoint for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

/// Owned endpoint handle passed between connection stages.
pub type BoxedEndpoint = Box<dyn Endpoint>;
