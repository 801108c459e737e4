//! Shutdown coordination for the probe server.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

/// Unrecoverable environment fault; stops the whole server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// Requests arrive without a peer address: the router was served without
    /// connect info.
    #[error("cannot determine client address: server is not serving connect info")]
    MissingPeerAddress,
}

/// Coordinator for graceful and fatal shutdown.
///
/// A watch channel rather than a broadcast so that a subscriber created after
/// the trigger still observes it.
pub struct Shutdown {
    tx: watch::Sender<bool>,
    fatal: Mutex<Option<FatalError>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx,
            fatal: Mutex::new(None),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger a graceful shutdown.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a fatal error and trigger shutdown. The first error wins.
    pub fn fatal(&self, err: FatalError) {
        {
            let mut slot = self.fatal.lock();
            if slot.is_none() {
                tracing::error!(error = %err, "Fatal configuration error; shutting down");
                *slot = Some(err);
            }
        }
        self.trigger();
    }

    pub fn fatal_error(&self) -> Option<FatalError> {
        self.fatal.lock().clone()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half handed to long-running tasks.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered.
    pub async fn recv(&mut self) {
        // Sender dropped means the owner is gone; treat as shutdown.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
