//! Configuration system for sockfwd.
//!
//! Addresses and tuning parameters can come from TOML files as well as the
//! command line.
//!
//! # Configuration Hierarchy
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. Built-in defaults
//! 2. System config: `/etc/sockfwd/config.toml`
//! 3. User config: `~/.config/sockfwd/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (`--source`, `--target`)
//!
//! Missing system/user files are skipped. A missing `--config` file or
//! invalid TOML anywhere is an error.
//!
//! # Example
//!
//! ```toml
//! source = ":9001"
//! target = "127.0.0.1:9002"
//!
//! [tuning]
//! nodelay = true
//! keepalive_secs = 30
//! recv_buffer_size = 1048576
//! send_buffer_size = 1048576
//! relay_buffer_size = 131072
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Config, TuningConfig};
