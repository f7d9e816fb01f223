//! Signal-driven shutdown.
//!
//! SIGINT and SIGTERM are turned into a `true` on a `watch` channel. The
//! accept loop holds the receiving end, so it can be stopped in tests by
//! sending on the channel directly without involving OS signals.

use std::io;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::watch;
use tracing::info;

/// Owns the signal handlers and the shutdown channel.
pub struct ShutdownController {
    tx: watch::Sender<bool>,
    sigint: Signal,
    sigterm: Signal,
}

impl ShutdownController {
    /// Register SIGINT / SIGTERM handlers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> io::Result<Self> {
        let (tx, _rx) = watch::channel(false);
        Ok(Self {
            tx,
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// A receiver for the accept loop.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Signal shutdown to every subscriber.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Wait for SIGINT or SIGTERM, then signal shutdown.
    pub async fn wait(mut self) {
        tokio::select! {
            _ = self.sigint.recv() => info!("Received SIGINT, shutting down..."),
            _ = self.sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
        self.trigger();
    }
}
