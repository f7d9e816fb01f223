//! Command-line interface definitions for sockfwd.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Transparent TCP / Unix domain socket forwarder.
///
/// Listens on the source address and, for every client, dials the target
/// address and relays bytes in both directions. Addresses are either a Unix
/// socket path or a `host:port` / `:port` network address.
#[derive(Parser, Debug)]
#[command(name = "sockfwd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source address (Unix socket path or TCP address) to listen on.
    ///
    /// If a filesystem entry exists at this path, both the listener and the
    /// target dial use Unix domain sockets; otherwise both use TCP.
    #[arg(short = 's', long = "source", value_name = "ADDR")]
    pub source: Option<String>,

    /// Target address (Unix socket path or TCP address) to forward to.
    #[arg(short = 't', long = "target", value_name = "ADDR")]
    pub target: Option<String>,

    /// Path to additional config file.
    ///
    /// Merged on top of system and user configs; `--source` and `--target`
    /// still take priority.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = debug level
    /// -vv   = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
