//! sockfwd: transparent byte-level socket forwarder
//!
//! Bridges one listening endpoint (TCP port or Unix domain socket) to one
//! target endpoint, relaying bytes in both directions between every accepted
//! client and a freshly dialed target connection. TCP connections are tuned
//! for throughput (no Nagle, keepalive, 1 MiB socket buffers).
//!
//! # Architecture
//!
//! - **Forward**: endpoint resolution, accept loop, relays and socket tuning
//! - **Config**: layered TOML configuration merged with CLI flags
//! - **Shutdown**: SIGINT/SIGTERM turned into an injectable cancellation signal

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod forward;
pub mod shutdown;
