//! Endpoint kind resolution, listening and dialing.
//!
//! An address is either a filesystem path (Unix domain socket) or a network
//! `host:port`. The kind is decided by probing the filesystem: if an entry
//! exists at the address it is a Unix socket, otherwise a network address.
//!
//! Network addresses may omit the host (`:9001`). Listening on such an
//! address binds every IPv4 interface; dialing it targets the local host.

use super::tune::Tunable;
use std::borrow::Cow;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tracing::{debug, warn};

/// A duplex byte stream that can be relayed and (maybe) tuned.
pub trait Connection: AsyncRead + AsyncWrite + Tunable + Unpin + Send + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Tunable + Unpin + Send + 'static {}

/// Type-erased connection, as produced by [`Listener::accept`] and
/// [`EndpointKind::connect`].
pub type BoxedConnection = Box<dyn Connection>;

/// How an address is listened on and dialed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Filesystem path to a Unix domain socket.
    UnixSocket,
    /// TCP `host:port`.
    Network,
}

impl EndpointKind {
    /// Classify `addr` by probing for a filesystem entry at that path.
    ///
    /// Symlinks are followed, so a dangling link is `Network`. A failed probe
    /// is not an error; it simply means `Network`.
    pub fn resolve(addr: &str) -> Self {
        if !addr.is_empty() && fs::metadata(addr).is_ok() {
            EndpointKind::UnixSocket
        } else {
            EndpointKind::Network
        }
    }

    /// Open a listener on `addr` using this kind.
    pub async fn bind(self, addr: &str) -> io::Result<Listener> {
        match self {
            EndpointKind::Network => {
                let addr = listen_addr(addr);
                let listener = TcpListener::bind(&*addr).await?;
                Ok(Listener {
                    inner: ListenerInner::Tcp(listener),
                })
            }
            EndpointKind::UnixSocket => {
                let path = Path::new(addr);
                remove_stale_socket(path)?;
                let listener = UnixListener::bind(path)?;
                Ok(Listener {
                    inner: ListenerInner::Unix {
                        listener,
                        _guard: SocketFileGuard {
                            path: path.to_path_buf(),
                        },
                    },
                })
            }
        }
    }

    /// Dial `addr` using this kind.
    pub async fn connect(self, addr: &str) -> io::Result<BoxedConnection> {
        match self {
            EndpointKind::Network => {
                let addr = dial_addr(addr);
                let stream = TcpStream::connect(&*addr).await?;
                Ok(Box::new(stream))
            }
            EndpointKind::UnixSocket => {
                let stream = UnixStream::connect(addr).await?;
                Ok(Box::new(stream))
            }
        }
    }
}

/// Normalize a network address for listening (`:port` binds all interfaces).
pub fn listen_addr(addr: &str) -> Cow<'_, str> {
    with_default_host(addr, "0.0.0.0")
}

/// Normalize a network address for dialing (`:port` targets the local host).
pub fn dial_addr(addr: &str) -> Cow<'_, str> {
    with_default_host(addr, "127.0.0.1")
}

fn with_default_host<'a>(addr: &'a str, host: &str) -> Cow<'a, str> {
    if addr.starts_with(':') {
        Cow::Owned(format!("{host}{addr}"))
    } else {
        Cow::Borrowed(addr)
    }
}

/// Remove a leftover socket file so the listener can bind over it.
///
/// Only socket entries are removed; anything else is left in place and the
/// subsequent bind reports the conflict.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!("Removing stale socket file {:?}", path);
            fs::remove_file(path)
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Removes the Unix socket file when the listener goes away.
#[derive(Debug)]
struct SocketFileGuard {
    path: PathBuf,
}

impl Drop for SocketFileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove socket file {:?}: {}", self.path, e);
        }
    }
}

/// An open listening endpoint. Dropping it closes the listener.
#[derive(Debug)]
pub struct Listener {
    inner: ListenerInner,
}

#[derive(Debug)]
enum ListenerInner {
    Tcp(TcpListener),
    Unix {
        // Declared first so the listener closes before the file is removed.
        listener: UnixListener,
        _guard: SocketFileGuard,
    },
}

impl Listener {
    /// Accept the next inbound connection, with a printable peer address.
    pub async fn accept(&self) -> io::Result<(BoxedConnection, String)> {
        match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                let stream: BoxedConnection = Box::new(stream);
                Ok((stream, peer.to_string()))
            }
            ListenerInner::Unix { listener, .. } => {
                let (stream, peer) = listener.accept().await?;
                let peer = peer
                    .as_pathname()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "unix peer".to_string());
                let stream: BoxedConnection = Box::new(stream);
                Ok((stream, peer))
            }
        }
    }

    /// Local TCP address, if this is a network listener.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        match &self.inner {
            ListenerInner::Tcp(listener) => listener.local_addr().ok(),
            ListenerInner::Unix { .. } => None,
        }
    }

    /// The endpoint kind this listener was opened with.
    pub fn kind(&self) -> EndpointKind {
        match self.inner {
            ListenerInner::Tcp(_) => EndpointKind::Network,
            ListenerInner::Unix { .. } => EndpointKind::UnixSocket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_resolve_missing_path_is_network() {
        assert_eq!(EndpointKind::resolve(":9001"), EndpointKind::Network);
        assert_eq!(EndpointKind::resolve("127.0.0.1:9002"), EndpointKind::Network);
        assert_eq!(
            EndpointKind::resolve("/definitely/not/here.sock"),
            EndpointKind::Network
        );
        assert_eq!(EndpointKind::resolve(""), EndpointKind::Network);
    }

    #[test]
    fn test_resolve_existing_path_is_unix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&path).unwrap();

        assert_eq!(
            EndpointKind::resolve(path.to_str().unwrap()),
            EndpointKind::UnixSocket
        );
    }

    #[test]
    fn test_resolve_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.sock");
        let link = dir.path().join("link.sock");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert_eq!(
            EndpointKind::resolve(link.to_str().unwrap()),
            EndpointKind::Network
        );

        let _listener = std::os::unix::net::UnixListener::bind(&real).unwrap();
        assert_eq!(
            EndpointKind::resolve(link.to_str().unwrap()),
            EndpointKind::UnixSocket
        );
    }

    #[test]
    fn test_address_normalization() {
        assert_eq!(listen_addr(":9001"), "0.0.0.0:9001");
        assert_eq!(dial_addr(":9001"), "127.0.0.1:9001");
        assert_eq!(listen_addr("127.0.0.1:9001"), "127.0.0.1:9001");
        assert_eq!(dial_addr("[::1]:9001"), "[::1]:9001");
    }

    #[tokio::test]
    async fn test_bind_over_stale_socket_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let listener = EndpointKind::UnixSocket
            .bind(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(listener.kind(), EndpointKind::UnixSocket);
        assert!(listener.tcp_addr().is_none());

        drop(listener);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_bind_refuses_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-socket");
        std::fs::write(&path, b"keep me").unwrap();

        let result = EndpointKind::UnixSocket.bind(path.to_str().unwrap()).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_tcp_accept_and_connect() {
        let listener = EndpointKind::Network.bind("127.0.0.1:0").await.unwrap();
        let addr = listener.tcp_addr().unwrap().to_string();

        let (dialed, accepted) = tokio::join!(
            EndpointKind::Network.connect(&addr),
            listener.accept()
        );
        let mut dialed = dialed.unwrap();
        let (mut accepted, peer) = accepted.unwrap();
        assert!(peer.starts_with("127.0.0.1:"));
        assert!(accepted.network_socket().is_some());

        dialed.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[tokio::test]
    async fn test_unix_connection_not_tunable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.sock");
        let listener = EndpointKind::UnixSocket
            .bind(path.to_str().unwrap())
            .await
            .unwrap();

        let (dialed, accepted) = tokio::join!(
            EndpointKind::UnixSocket.connect(path.to_str().unwrap()),
            listener.accept()
        );
        assert!(dialed.unwrap().network_socket().is_none());
        assert!(accepted.unwrap().0.network_socket().is_none());
    }
}
