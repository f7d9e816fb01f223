//! Throughput-oriented socket tuning.
//!
//! Tuning is dispatched on capability rather than on connection type: any
//! connection that can hand out a network socket reference via [`Tunable`]
//! gets the options applied, everything else is left alone. TCP streams
//! expose their socket, Unix domain streams do not.

use super::error::{TuneOp, TuningError};
use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::time::Duration;
use tokio::net::{TcpStream, UnixStream};

/// Default keepalive idle time and probe interval.
pub const DEFAULT_KEEPALIVE_PERIOD: Duration = Duration::from_secs(30);

/// Largest keepalive idle time / interval Linux accepts, in seconds.
pub const MAX_KEEPALIVE_SECS: u64 = 32_767;

/// Default `SO_RCVBUF` / `SO_SNDBUF` size (1 MiB).
pub const DEFAULT_SOCKET_BUFFER_SIZE: usize = 1024 * 1024;

/// Options applied to every tunable connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneOptions {
    /// Disable Nagle's algorithm.
    pub nodelay: bool,
    /// Keepalive idle time and probe interval.
    pub keepalive_period: Duration,
    /// Requested receive buffer size in bytes.
    pub recv_buffer_size: usize,
    /// Requested send buffer size in bytes.
    pub send_buffer_size: usize,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            nodelay: true,
            keepalive_period: DEFAULT_KEEPALIVE_PERIOD,
            recv_buffer_size: DEFAULT_SOCKET_BUFFER_SIZE,
            send_buffer_size: DEFAULT_SOCKET_BUFFER_SIZE,
        }
    }
}

/// A connection that may expose OS-level network socket options.
pub trait Tunable {
    /// Borrow the underlying network socket, or `None` if this connection
    /// kind has nothing to tune.
    fn network_socket(&self) -> Option<SockRef<'_>>;
}

impl Tunable for TcpStream {
    fn network_socket(&self) -> Option<SockRef<'_>> {
        Some(SockRef::from(self))
    }
}

impl Tunable for UnixStream {
    fn network_socket(&self) -> Option<SockRef<'_>> {
        None
    }
}

/// Apply `opts` to `conn`.
///
/// Steps run in a fixed order (nodelay, keepalive, keepalive period, receive
/// buffer, send buffer) and the first failure aborts the rest. Connections
/// without a network socket succeed without doing anything.
pub fn tune<T>(conn: &T, opts: &TuneOptions) -> Result<(), TuningError>
where
    T: Tunable + ?Sized,
{
    let Some(socket) = conn.network_socket() else {
        return Ok(());
    };

    let failed = |op: TuneOp| move |source: io::Error| TuningError { op, source };

    socket
        .set_nodelay(opts.nodelay)
        .map_err(failed(TuneOp::NoDelay))?;
    socket
        .set_keepalive(true)
        .map_err(failed(TuneOp::KeepAlive))?;
    socket
        .set_tcp_keepalive(&keepalive(opts.keepalive_period))
        .map_err(failed(TuneOp::KeepAlivePeriod))?;
    socket
        .set_recv_buffer_size(opts.recv_buffer_size)
        .map_err(failed(TuneOp::RecvBuffer))?;
    socket
        .set_send_buffer_size(opts.send_buffer_size)
        .map_err(failed(TuneOp::SendBuffer))?;

    Ok(())
}

fn keepalive(period: Duration) -> TcpKeepalive {
    let keepalive = TcpKeepalive::new().with_time(period);

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
    ))]
    let keepalive = keepalive.with_interval(period);

    keepalive
}
