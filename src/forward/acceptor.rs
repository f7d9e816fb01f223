//! The forwarder and its accept loop.
//!
//! A [`Forwarder`] is built once from a source and target address. The
//! endpoint kind is resolved from the source at construction and then used
//! for both the listener and every dial to the target.
//!
//! # Example
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sockfwd::forward::Forwarder;
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let forwarder = Forwarder::new(":9001", "127.0.0.1:9002");
//!
//! tokio::spawn(forwarder.run(shutdown_rx));
//!
//! // Later: stop accepting.
//! shutdown_tx.send(true)?;
//! # Ok(())
//! # }
//! ```

use super::endpoint::{BoxedConnection, EndpointKind, Listener};
use super::error::{ForwardError, ForwardResult};
use super::relay::{RELAY_BUFFER_SIZE, relay};
use super::tune::{TuneOptions, tune};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Process-wide forwarding configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct Forwarder {
    source_addr: String,
    target_addr: String,
    endpoint_kind: EndpointKind,
    tune: TuneOptions,
    relay_buffer_size: usize,
}

impl Forwarder {
    /// Create a forwarder, resolving the endpoint kind from `source`.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source_addr = source.into();
        let endpoint_kind = EndpointKind::resolve(&source_addr);

        Self {
            source_addr,
            target_addr: target.into(),
            endpoint_kind,
            tune: TuneOptions::default(),
            relay_buffer_size: RELAY_BUFFER_SIZE,
        }
    }

    /// Override the socket tuning options.
    pub fn with_tuning(mut self, tune: TuneOptions) -> Self {
        self.tune = tune;
        self
    }

    /// Override the per-pump copy buffer size.
    pub fn with_relay_buffer_size(mut self, size: usize) -> Self {
        self.relay_buffer_size = size;
        self
    }

    /// Address the listener is opened on.
    pub fn source_addr(&self) -> &str {
        &self.source_addr
    }

    /// Address dialed for every accepted connection.
    pub fn target_addr(&self) -> &str {
        &self.target_addr
    }

    /// Endpoint kind resolved from the source at construction.
    pub fn endpoint_kind(&self) -> EndpointKind {
        self.endpoint_kind
    }

    /// Tuning options applied to both sides of every relay.
    pub fn tuning(&self) -> &TuneOptions {
        &self.tune
    }

    /// Per-pump copy buffer size.
    pub fn relay_buffer_size(&self) -> usize {
        self.relay_buffer_size
    }

    /// Open the listening endpoint.
    pub async fn listen(&self) -> ForwardResult<Listener> {
        self.endpoint_kind
            .bind(&self.source_addr)
            .await
            .map_err(|e| ForwardError::Listen {
                addr: self.source_addr.clone(),
                source: e,
            })
    }

    /// Listen and serve until `shutdown_rx` fires.
    ///
    /// Only a listen failure is returned as an error.
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) -> ForwardResult<()> {
        let listener = self.listen().await?;
        Arc::new(self).serve(listener, shutdown_rx).await;
        Ok(())
    }

    /// Run the accept loop on an already open listener.
    ///
    /// Accept and tuning failures are logged and the loop continues. The loop
    /// exits when the shutdown signal becomes `true` (or its sender is
    /// dropped), closing the listener. Relays already running are not waited
    /// for.
    pub async fn serve(
        self: Arc<Self>,
        listener: Listener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(
            "Forwarding from {} to {} ({:?})",
            self.source_addr, self.target_addr, self.endpoint_kind
        );

        if *shutdown_rx.borrow_and_update() {
            return;
        }

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((conn, peer)) => {
                            debug!("Accepted connection from {}", peer);
                            if let Err(e) = tune(&*conn, &self.tune) {
                                warn!("Failed to tune connection from {}: {}", peer, e);
                                continue;
                            }
                            tokio::spawn(relay(conn, peer, Arc::clone(&self)));
                        }
                        Err(e) => {
                            warn!("Error accepting connection: {}", e);
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutting down listener on {}", self.source_addr);
                        break;
                    }
                }
            }
        }

        drop(listener);
    }

    /// Dial the target with the source's endpoint kind and tune it.
    pub(crate) async fn dial_target(&self) -> ForwardResult<BoxedConnection> {
        let target = self
            .endpoint_kind
            .connect(&self.target_addr)
            .await
            .map_err(|e| ForwardError::Dial {
                addr: self.target_addr.clone(),
                source: e,
            })?;
        tune(&*target, &self.tune)?;
        Ok(target)
    }
}
