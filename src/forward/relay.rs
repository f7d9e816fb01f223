//! Per-connection relay.
//!
//! A relay dials the target, tunes it, and runs two independent pumps
//! (client -> target and target -> client). Each pump stops on its own when
//! its source reaches end-of-stream or fails; the relay finishes once both
//! have stopped, at which point both connections are dropped and closed.
//!
//! Relays report nothing back to their caller. Everything worth knowing is
//! logged here.

use super::acceptor::Forwarder;
use super::endpoint::BoxedConnection;
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Default size of the per-pump copy buffer (128 KiB).
pub const RELAY_BUFFER_SIZE: usize = 128 * 1024;

/// Direction of a pump, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ClientToTarget,
    TargetToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToTarget => f.write_str("client->target"),
            Direction::TargetToClient => f.write_str("target->client"),
        }
    }
}

/// Handle one accepted client connection end to end.
pub(crate) async fn relay(client: BoxedConnection, peer: String, forwarder: Arc<Forwarder>) {
    let target = match forwarder.dial_target().await {
        Ok(target) => target,
        Err(e) => {
            warn!("Dropping connection from {}: {}", peer, e);
            return;
        }
    };

    debug!("Relaying {} -> {}", peer, forwarder.target_addr());
    splice(client, target, forwarder.relay_buffer_size()).await;
    debug!("Relay for {} finished", peer);
}

/// Pump bytes both ways between `client` and `target` until both directions
/// have stopped.
pub async fn splice(client: BoxedConnection, target: BoxedConnection, buffer_size: usize) {
    let (client_read, client_write) = tokio::io::split(client);
    let (target_read, target_write) = tokio::io::split(target);

    let upstream = tokio::spawn(pump(
        Direction::ClientToTarget,
        client_read,
        target_write,
        buffer_size,
    ));
    let downstream = tokio::spawn(pump(
        Direction::TargetToClient,
        target_read,
        client_write,
        buffer_size,
    ));

    let (upstream, downstream) = tokio::join!(upstream, downstream);
    for result in [upstream, downstream] {
        if let Err(e) = result {
            warn!("Pump task failed: {}", e);
        }
    }
}

/// One direction of a relay.
///
/// On clean end-of-stream the destination's write side is shut down so the
/// peer sees EOF; the opposite direction is left running.
async fn pump<R, W>(direction: Direction, mut reader: R, mut writer: W, buffer_size: usize)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match copy_stream(&mut reader, &mut writer, buffer_size).await {
        Ok(bytes) => {
            debug!("{} reached end of stream after {} bytes", direction, bytes);
            if let Err(e) = writer.shutdown().await {
                log_pump_error(direction, &e);
            }
        }
        Err(e) => log_pump_error(direction, &e),
    }
}

/// Copy from `reader` to `writer` through a fixed `buffer_size` buffer until
/// end-of-stream, returning the number of bytes copied.
pub async fn copy_stream<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

fn log_pump_error(direction: Direction, e: &io::Error) {
    match e.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::NotConnected => debug!("{} closed: {}", direction, e),
        _ => warn!("{} failed: {}", direction, e),
    }
}
