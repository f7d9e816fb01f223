//! Error types for forwarding operations.
//!
//! This module defines errors for:
//! - Opening the listening endpoint (fatal at startup)
//! - Dialing the target (per connection)
//! - Socket tuning (per connection)

use std::fmt;
use std::io;
use thiserror::Error;

/// Identity of a single socket tuning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneOp {
    /// `TCP_NODELAY`.
    NoDelay,
    /// `SO_KEEPALIVE`.
    KeepAlive,
    /// Keepalive idle time and probe interval.
    KeepAlivePeriod,
    /// `SO_RCVBUF`.
    RecvBuffer,
    /// `SO_SNDBUF`.
    SendBuffer,
}

impl fmt::Display for TuneOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TuneOp::NoDelay => "TCP_NODELAY",
            TuneOp::KeepAlive => "SO_KEEPALIVE",
            TuneOp::KeepAlivePeriod => "TCP keepalive period",
            TuneOp::RecvBuffer => "SO_RCVBUF",
            TuneOp::SendBuffer => "SO_SNDBUF",
        };
        f.write_str(name)
    }
}

/// A socket tuning step failed; the remaining steps were skipped.
#[derive(Debug, Error)]
#[error("Failed to set {op}: {source}")]
pub struct TuningError {
    /// The step that failed.
    pub op: TuneOp,
    /// The underlying OS error.
    #[source]
    pub source: io::Error,
}

/// Errors from the forwarding engine.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Failed to open the listening endpoint.
    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        /// The address we tried to listen on.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to dial the target.
    #[error("Failed to connect to target {addr}: {source}")]
    Dial {
        /// The address we tried to dial.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Socket tuning failed.
    #[error(transparent)]
    Tuning(#[from] TuningError),
}

/// Result type for forwarding operations.
pub type ForwardResult<T> = Result<T, ForwardError>;
