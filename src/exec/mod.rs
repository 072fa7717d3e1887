//! Deferred execution context.
//!
//! Completion callbacks in the connector are never invoked inline: doing so
//! from deep inside a callback chain would grow the call stack and let a
//! completion re-enter the connector while its state is mid-transition.
//! [`ExecCtx`] instead queues each callback+result pair onto an unbounded
//! channel drained by a single spawned task, which serializes delivery in
//! submission order.

use tokio::sync::mpsc;

use crate::base::ConnectError;

/// A deferred completion callback. Invoked exactly once with the terminal
/// result of the operation it was registered for.
pub type Callback = Box<dyn FnOnce(Result<(), ConnectError>) + Send + 'static>;

struct Deferred {
    cb: Callback,
    result: Result<(), ConnectError>,
}

/// Ordered, non-reentrant callback scheduler.
///
/// Cloning an `ExecCtx` yields a handle onto the same queue; callbacks
/// scheduled from any clone are delivered in submission order by one drain
/// task. The drain task exits when every handle has been dropped.
#[derive(Clone)]
pub struct ExecCtx {
    tx: mpsc::UnboundedSender<Deferred>,
}

impl ExecCtx {
    /// Create an execution context and spawn its drain task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Deferred>();
        tokio::spawn(async move {
            while let Some(deferred) = rx.recv().await {
                (deferred.cb)(deferred.result);
            }
        });
        Self { tx }
    }

    /// Queue `cb` to be invoked with `result` after all previously
    /// scheduled callbacks have run.
    pub fn schedule(&self, cb: Callback, result: Result<(), ConnectError>) {
        // Send only fails once the drain task is gone, i.e. at shutdown
        // when delivery no longer matters.
        if self.tx.send(Deferred { cb, result }).is_err() {
            tracing::warn!("exec ctx drain task gone; dropping scheduled callback");
        }
    }
}

impl Default for ExecCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx").finish()
    }
}
