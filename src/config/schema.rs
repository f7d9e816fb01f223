//! Configuration schema definitions.
//!
//! Every field is optional in the file format so that layered configs only
//! override what they actually set.

use super::error::ConfigError;
use crate::forward::tune::MAX_KEEPALIVE_SECS;
use crate::forward::{Forwarder, RELAY_BUFFER_SIZE, TuneOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Listen address: a Unix socket path or `host:port` / `:port`.
    #[serde(default)]
    pub source: Option<String>,

    /// Dial address: a Unix socket path or `host:port` / `:port`.
    #[serde(default)]
    pub target: Option<String>,

    /// Socket and relay tuning.
    #[serde(default)]
    pub tuning: TuningConfig,
}

impl Config {
    /// Merge another config into this one.
    ///
    /// Scalars are overridden when set (and, for addresses, non-empty).
    pub fn merge(&mut self, other: Config) {
        if let Some(source) = other.source.filter(|s| !s.is_empty()) {
            self.source = Some(source);
        }
        if let Some(target) = other.target.filter(|t| !t.is_empty()) {
            self.target = Some(target);
        }
        self.tuning.merge(other.tuning);
    }

    /// The source and target addresses, both required.
    pub fn addresses(&self) -> Result<(&str, &str), ConfigError> {
        let source = self
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingAddress("source"))?;
        let target = self
            .target
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingAddress("target"))?;
        Ok((source, target))
    }

    /// Build the forwarder described by this config.
    ///
    /// The endpoint kind is resolved here, once, from the source address.
    pub fn forwarder(&self) -> Result<Forwarder, ConfigError> {
        let (source, target) = self.addresses()?;
        Ok(Forwarder::new(source, target)
            .with_tuning(self.tuning.tune_options()?)
            .with_relay_buffer_size(self.tuning.relay_buffer_size()?))
    }
}

/// Tuning overrides. Unset fields fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TuningConfig {
    /// Disable Nagle's algorithm on TCP connections.
    #[serde(default)]
    pub nodelay: Option<bool>,

    /// Keepalive idle time and probe interval, in seconds.
    #[serde(default)]
    pub keepalive_secs: Option<u64>,

    /// `SO_RCVBUF` in bytes.
    #[serde(default)]
    pub recv_buffer_size: Option<usize>,

    /// `SO_SNDBUF` in bytes.
    #[serde(default)]
    pub send_buffer_size: Option<usize>,

    /// Per-direction copy buffer in bytes.
    #[serde(default)]
    pub relay_buffer_size: Option<usize>,
}

impl TuningConfig {
    fn merge(&mut self, other: TuningConfig) {
        if other.nodelay.is_some() {
            self.nodelay = other.nodelay;
        }
        if other.keepalive_secs.is_some() {
            self.keepalive_secs = other.keepalive_secs;
        }
        if other.recv_buffer_size.is_some() {
            self.recv_buffer_size = other.recv_buffer_size;
        }
        if other.send_buffer_size.is_some() {
            self.send_buffer_size = other.send_buffer_size;
        }
        if other.relay_buffer_size.is_some() {
            self.relay_buffer_size = other.relay_buffer_size;
        }
    }

    /// Socket options with defaults filled in.
    pub fn tune_options(&self) -> Result<TuneOptions, ConfigError> {
        let defaults = TuneOptions::default();

        let keepalive_period = match self.keepalive_secs {
            Some(0) => return Err(invalid("tuning.keepalive_secs")),
            Some(secs) if secs > MAX_KEEPALIVE_SECS => {
                return Err(ConfigError::InvalidValue {
                    field: "tuning.keepalive_secs".to_string(),
                    message: format!("must be at most {MAX_KEEPALIVE_SECS}"),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.keepalive_period,
        };

        Ok(TuneOptions {
            nodelay: self.nodelay.unwrap_or(defaults.nodelay),
            keepalive_period,
            recv_buffer_size: non_zero(
                self.recv_buffer_size,
                defaults.recv_buffer_size,
                "tuning.recv_buffer_size",
            )?,
            send_buffer_size: non_zero(
                self.send_buffer_size,
                defaults.send_buffer_size,
                "tuning.send_buffer_size",
            )?,
        })
    }

    /// Relay copy buffer size with the default filled in.
    pub fn relay_buffer_size(&self) -> Result<usize, ConfigError> {
        non_zero(
            self.relay_buffer_size,
            RELAY_BUFFER_SIZE,
            "tuning.relay_buffer_size",
        )
    }
}

fn non_zero(value: Option<usize>, default: usize, field: &str) -> Result<usize, ConfigError> {
    match value {
        Some(0) => Err(invalid(field)),
        Some(v) => Ok(v),
        None => Ok(default),
    }
}

fn invalid(field: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: "must be greater than zero".to_string(),
    }
}
