//! The forwarding engine.
//!
//! ```text
//! client ──► Listener (source) ──accept──► tune ──► relay task
//!                                                     │
//!                                   dial target ◄─────┘ (same endpoint kind)
//!                                        │
//!                                      tune
//!                                        │
//!                     ┌──────────────────┴──────────────────┐
//!               pump client->target                 pump target->client
//! ```
//!
//! - [`endpoint`]: endpoint kind resolution, listeners and dialing
//! - [`tune`]: capability-based socket tuning
//! - [`acceptor`]: the [`Forwarder`] and its accept loop
//! - [`relay`]: per-connection dial and bidirectional pumps

pub mod acceptor;
pub mod endpoint;
pub mod error;
pub mod relay;
pub mod tune;

pub use acceptor::Forwarder;
pub use endpoint::{BoxedConnection, Connection, EndpointKind, Listener};
pub use error::{ForwardError, ForwardResult, TuneOp, TuningError};
pub use relay::{RELAY_BUFFER_SIZE, splice};
pub use tune::{TuneOptions, Tunable, tune};
