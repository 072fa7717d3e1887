use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::base::{ChannelConfig, ConnectError, Target};
use crate::socket::endpoint::BoxedEndpoint;

/// Performs the socket-level connect for one attempt.
///
/// Implementations resolve exactly one outcome per call: a connected
/// [`BoxedEndpoint`] or a [`ConnectError::ConnectFailed`]. Deadline
/// enforcement is the implementation's job; the connector never re-checks
/// elapsed time itself.
#[async_trait]
pub trait RawConnector: Send + Sync {
    async fn connect(
        &self,
        target: &Target,
        config: &ChannelConfig,
        deadline: Instant,
    ) -> Result<BoxedEndpoint, ConnectError>;
}

/// Default raw connector: DNS resolution followed by TCP connect.
///
/// Resolves the target and tries each returned address in order until one
/// connects or the deadline expires. Trying alternative addresses is part
/// of the *raw* connect; from the connector's point of view this is still
/// a single attempt with a single outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpRawConnector;

impl TcpRawConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RawConnector for TcpRawConnector {
    async fn connect(
        &self,
        target: &Target,
        _config: &ChannelConfig,
        deadline: Instant,
    ) -> Result<BoxedEndpoint, ConnectError> {
        let authority = target.authority();

        // 1. DNS resolution, bounded by the attempt deadline.
        let addrs = tokio::time::timeout_at(deadline, tokio::net::lookup_host(&authority))
            .await
            .map_err(|_| ConnectError::connect(format!("deadline exceeded resolving {authority}")))?
            .map_err(|e| ConnectError::connect(format!("failed to resolve {authority}: {e}")))?;

        // 2. TCP connect, first address that accepts wins.
        let mut last_err = None;
        for addr in addrs {
            match tokio::time::timeout_at(deadline, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    tracing::debug!(peer = %addr, "raw connect established");
                    return Ok(Box::new(stream));
                }
                Ok(Err(e)) => {
                    tracing::debug!(peer = %addr, error = %e, "raw connect to address failed");
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    return Err(ConnectError::connect(format!(
                        "deadline exceeded connecting to {authority}"
                    )));
                }
            }
        }

        Err(match last_err {
            Some(e) => ConnectError::connect(format!("failed to connect to {authority}: {e}")),
            None => ConnectError::connect(format!("no addresses resolved for {authority}")),
        })
    }
}
