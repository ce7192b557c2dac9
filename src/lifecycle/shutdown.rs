//! Shutdown signaling for the sidecar.
//!
//! The server only ever stops once, so the signal is a single-shot pair
//! rather than a broadcast: the bootstrap (or a test) holds the handle, the
//! accept loop holds the signal.

use tokio::sync::oneshot;

/// Create a linked shutdown handle/signal pair.
pub fn channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = oneshot::channel();
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Requests shutdown when triggered, or when dropped.
pub struct ShutdownHandle {
    tx: oneshot::Sender<()>,
}

impl ShutdownHandle {
    /// Ask the server to stop accepting connections.
    pub fn trigger(self) {
        let _ = self.tx.send(());
    }
}

/// Completes once shutdown has been requested.
pub struct ShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl ShutdownSignal {
    /// Wait for the shutdown request. A dropped handle counts as a request,
    /// so an aborted bootstrap still stops the server.
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}
