//! The asynchronous channel connector.
//!
//! Turns a target address into a ready-to-use multiplexed transport by
//! running, in order: raw connect → optional preamble write → handshake
//! pipeline → transport construction. Exactly one attempt is in flight at
//! a time, and each attempt reports exactly one terminal result through a
//! completion callback dispatched on the shared execution context.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use crate::base::{ChannelConfig, ConnectError, Target};
use crate::exec::{Callback, ExecCtx};
use crate::handshake::HandshakeManager;
use crate::socket::raw::RawConnector;
use crate::transport::{Transport, TransportBuilder};

/// Completion callback for one connection attempt. Invoked exactly once,
/// with `Ok(())` iff the result slot was populated.
pub type CompletionCallback = Callback;

/// Inputs for one connection attempt. Copied into the attempt at `start`
/// and immutable for its duration.
#[derive(Debug, Clone)]
pub struct ConnectArgs {
    /// Address the raw connect dials. With a proxy configured this is the
    /// proxy, and the CONNECT handshaker carries the real target.
    pub target: Target,
    /// Deadline threaded through raw connect and handshake. Neither stage
    /// re-checks elapsed time outside its own enforcement.
    pub deadline: Instant,
    /// Channel-argument snapshot handed to the handshake pipeline.
    pub config: ChannelConfig,
    /// Raw bytes written immediately after the raw connect, before any
    /// handshake. Empty means no preamble. A preamble-configured attempt
    /// never proceeds to handshake; the write is terminal for the attempt.
    pub preamble: Bytes,
}

impl ConnectArgs {
    pub fn new(target: Target, config: ChannelConfig, deadline: Instant) -> Self {
        Self { target, deadline, config, preamble: Bytes::new() }
    }

    pub fn with_preamble(mut self, preamble: Bytes) -> Self {
        self.preamble = preamble;
        self
    }
}

/// Output of one connection attempt. Empty on failure; on success holds
/// the started transport and the negotiated configuration, whose ownership
/// passes to whoever takes them from the slot.
#[derive(Debug, Default)]
pub struct ConnectResult {
    pub transport: Option<Box<dyn Transport>>,
    pub config: Option<ChannelConfig>,
}

impl ConnectResult {
    /// Reset to the empty (failure) state.
    pub fn clear(&mut self) {
        self.transport = None;
        self.config = None;
    }

    pub fn is_empty(&self) -> bool {
        self.transport.is_none() && self.config.is_none()
    }
}

/// Shared slot the connector populates before the completion callback
/// fires. The in-flight attempt has exclusive write access by contract.
pub type ResultSlot = Arc<Mutex<ConnectResult>>;

pub fn new_result_slot() -> ResultSlot {
    Arc::new(Mutex::new(ConnectResult::default()))
}

#[derive(Debug, Default)]
struct ConnectorState {
    in_flight: bool,
    shutdown: bool,
}

/// Per-attempt context: everything a single attempt owns, threaded through
/// the state machine as one value so a second `start` can never corrupt
/// in-flight fields.
struct Attempt {
    args: ConnectArgs,
    result: ResultSlot,
    notify: CompletionCallback,
}

/// One-attempt-at-a-time connection orchestrator.
///
/// Shared ownership (`Arc<Connector>`) replaces manual reference counting:
/// every asynchronous hop that must outlive its caller clones the handle,
/// and the last drop destroys the owned handshake pipeline exactly once.
/// Correctness relies on the one-attempt contract rather than a lock: the
/// internal mutex only guards the in-flight/shutdown flags, never attempt
/// data.
pub struct Connector {
    exec: ExecCtx,
    raw: Arc<dyn RawConnector>,
    transport_builder: Arc<dyn TransportBuilder>,
    handshake_mgr: HandshakeManager,
    state: Mutex<ConnectorState>,
}

impl Connector {
    pub fn new(
        exec: ExecCtx,
        raw: Arc<dyn RawConnector>,
        transport_builder: Arc<dyn TransportBuilder>,
        handshake_mgr: HandshakeManager,
    ) -> Self {
        Self { exec, raw, transport_builder, handshake_mgr, state: Mutex::new(Default::default()) }
    }

    /// The owned handshake pipeline. Exposed for factory-provisioning
    /// inspection; the pipeline itself runs only inside attempts.
    pub fn handshake_manager(&self) -> &HandshakeManager {
        &self.handshake_mgr
    }

    /// Begin one connection attempt. Non-blocking: the outcome arrives
    /// later through `notify`, scheduled on the execution context.
    ///
    /// # Panics
    ///
    /// Panics if an attempt is already in flight. Starting a second
    /// attempt is a programming-contract violation, never queued or
    /// dropped silently.
    pub fn start(self: &Arc<Self>, args: ConnectArgs, result: ResultSlot, notify: CompletionCallback) {
        {
            let mut state = self.state.lock().unwrap();
            assert!(!state.in_flight, "connection attempt already in flight");
            if state.shutdown {
                drop(state);
                tracing::debug!(addr = %args.target, "start refused: connector is shut down");
                result.lock().unwrap().clear();
                self.exec.schedule(notify, Err(ConnectError::connect("connector is shut down")));
                return;
            }
            state.in_flight = true;
        }

        tracing::debug!(addr = %args.target, "starting connection attempt");
        let connector = Arc::clone(self);
        tokio::spawn(async move {
            connector.drive_attempt(Attempt { args, result, notify }).await;
        });
    }

    /// Mark the connector inactive for future `start` calls. Does not
    /// cancel an in-flight raw connect or handshake; their deadline still
    /// bounds them.
    pub fn shutdown(&self) {
        self.state.lock().unwrap().shutdown = true;
    }

    async fn drive_attempt(self: Arc<Self>, attempt: Attempt) {
        let Attempt { args, result, notify } = attempt;

        // 1. Raw connect.
        let endpoint = match self.raw.connect(&args.target, &args.config, args.deadline).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::debug!(addr = %args.target, error = %e, "raw connect failed");
                result.lock().unwrap().clear();
                self.complete(notify, Err(e));
                return;
            }
        };

        // 2. Optional preamble write. Fire-and-forget and terminal for the
        // attempt: the write task holds an extra connector handle for its
        // own lifetime, no handshake follows, and the completion callback
        // is never invoked. The attempt stays marked in flight.
        if !args.preamble.is_empty() {
            let connector = Arc::clone(&self);
            let preamble = args.preamble.clone();
            let mut endpoint = endpoint;
            tokio::spawn(async move {
                if let Err(e) = endpoint.write_all(&preamble).await {
                    tracing::debug!(error = %e, "preamble write failed");
                }
                drop(connector);
            });
            drop(notify);
            return;
        }

        // 3. Handshake. On failure the pipeline's in-progress session
        // (endpoint, negotiated config, residual buffer) is dropped by the
        // failure path, exactly once.
        let session = match self
            .handshake_mgr
            .do_handshake(endpoint, args.config.clone(), args.deadline)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(addr = %args.target, error = %e, "handshake failed");
                result.lock().unwrap().clear();
                self.complete(notify, Err(e));
                return;
            }
        };

        // 4. Transport construction and read-loop start. Construction is
        // infallible given a negotiated endpoint; the read loop must be
        // running, seeded with the residual bytes, before completion.
        let mut transport =
            self.transport_builder.build_transport(&session.config, session.endpoint);
        transport.start_reading(session.residual.freeze());

        tracing::debug!(addr = %args.target, "connection attempt succeeded");
        {
            let mut slot = result.lock().unwrap();
            slot.transport = Some(transport);
            slot.config = Some(session.config);
        }
        self.complete(notify, Ok(()));
    }

    /// Deliver the attempt's single terminal result. The in-flight flag is
    /// cleared before the callback is scheduled so the callback itself may
    /// start the next attempt.
    fn complete(&self, notify: CompletionCallback, outcome: Result<(), ConnectError>) {
        self.state.lock().unwrap().in_flight = false;
        self.exec.schedule(notify, outcome);
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Connector")
            .field("in_flight", &state.in_flight)
            .field("shutdown", &state.shutdown)
            .field("handshake_mgr", &self.handshake_mgr)
            .finish()
    }
}
