use thiserror::Error;

/// Terminal errors reported through a connection attempt's completion
/// callback.
///
/// The connector never retries internally: every variant here is final for
/// the attempt, and retry/backoff decisions belong to the caller.
///
/// Programming-contract violations (starting a second attempt while one is
/// in flight, a missing completion callback) are *not* represented here;
/// they are fatal and panic at the violation site.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The raw connect did not produce an endpoint. Covers refused
    /// connections, unreachable addresses, resolution failures, and the
    /// connect deadline expiring.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// A stage of the handshake pipeline rejected the endpoint or the
    /// handshake deadline expired.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Internal provisioning failure. This is the fixed status a lame
    /// channel reports for every call.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl ConnectError {
    /// Shorthand for a [`ConnectError::ConnectFailed`] with a formatted
    /// message.
    pub fn connect(msg: impl Into<String>) -> Self {
        ConnectError::ConnectFailed(msg.into())
    }

    /// Shorthand for a [`ConnectError::HandshakeFailed`] with a formatted
    /// message.
    pub fn handshake(msg: impl Into<String>) -> Self {
        ConnectError::HandshakeFailed(msg.into())
    }
}
