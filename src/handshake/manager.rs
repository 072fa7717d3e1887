use tokio::time::Instant;

use crate::base::{ChannelConfig, ConnectError};
use crate::handshake::{Handshaker, HandshakeSession};
use crate::socket::endpoint::BoxedEndpoint;

/// Ordered pipeline of negotiation steps.
///
/// Owned by a single connector for the connector's whole lifetime and
/// destroyed with it. An empty pipeline is a pass-through: the endpoint
/// and configuration come back unchanged with no residual bytes.
#[derive(Default)]
pub struct HandshakeManager {
    handshakers: Vec<Box<dyn Handshaker>>,
}

impl HandshakeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the end of the pipeline. Steps run in insertion
    /// order.
    pub fn add(&mut self, handshaker: Box<dyn Handshaker>) {
        self.handshakers.push(handshaker);
    }

    pub fn len(&self) -> usize {
        self.handshakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handshakers.is_empty()
    }

    /// Names of the configured steps, in execution order.
    pub fn handshaker_names(&self) -> Vec<&'static str> {
        self.handshakers.iter().map(|h| h.name()).collect()
    }

    /// Run every step against `endpoint`, bounded by `deadline`.
    ///
    /// On success the returned session carries the negotiated endpoint,
    /// the negotiated configuration, and any residual read-ahead bytes.
    /// On failure (including deadline expiry) the in-progress session is
    /// dropped here, releasing all three exactly once.
    pub async fn do_handshake(
        &self,
        endpoint: BoxedEndpoint,
        config: ChannelConfig,
        deadline: Instant,
    ) -> Result<HandshakeSession, ConnectError> {
        let run = async {
            let mut session = HandshakeSession::new(endpoint, config);
            for handshaker in &self.handshakers {
                tracing::debug!(stage = handshaker.name(), "running handshake stage");
                session = handshaker.handshake(session, deadline).await?;
            }
            Ok(session)
        };

        match tokio::time::timeout_at(deadline, run).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::handshake("deadline exceeded".to_string())),
        }
    }
}

impl std::fmt::Debug for HandshakeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeManager")
            .field("handshakers", &self.handshaker_names())
            .finish()
    }
}
