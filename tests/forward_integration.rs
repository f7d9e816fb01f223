use sockfwd::forward::{EndpointKind, Forwarder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

/// TCP echo server: mirrors each connection until EOF, then closes it.
async fn tcp_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });
    addr
}

/// Unix echo server with the same behavior.
fn unix_echo_server(listener: UnixListener) {
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });
}

async fn connect_with_retry(addr: SocketAddr) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("forwarder never started listening on {addr}");
}

/// Start a forwarder on an ephemeral local port.
async fn start_tcp_forwarder(target: SocketAddr) -> (SocketAddr, watch::Sender<bool>) {
    let forwarder = Arc::new(Forwarder::new("127.0.0.1:0", target.to_string()));
    let listener = forwarder.listen().await.unwrap();
    let addr = listener.tcp_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forwarder.serve(listener, shutdown_rx));
    (addr, shutdown_tx)
}

fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed))
        .collect()
}

#[tokio::test]
async fn test_tcp_ping_roundtrip_with_port_only_source() {
    let echo_addr = tcp_echo_server().await;

    // Reserve a port, then release it for the forwarder.
    let port = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let forwarder = Forwarder::new(format!(":{port}"), echo_addr.to_string());
    assert_eq!(forwarder.endpoint_kind(), EndpointKind::Network);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(forwarder.run(shutdown_rx));

    let mut client = connect_with_retry(SocketAddr::from(([127, 0, 0, 1], port))).await;
    client.write_all(b"ping").await.unwrap();

    let mut buf = [0u8; 4];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"ping");

    shutdown_tx.send(true).unwrap();
    timeout(WAIT, server).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_large_payload_with_half_close() {
    let echo_addr = tcp_echo_server().await;
    let (addr, _shutdown_tx) = start_tcp_forwarder(echo_addr).await;

    let data = payload(1024 * 1024 + 123, 3);
    let client = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = client.into_split();

    let sent = data.clone();
    let write_task = tokio::spawn(async move {
        writer.write_all(&sent).await.unwrap();
        writer.shutdown().await.unwrap();
        writer
    });

    let mut received = Vec::new();
    timeout(WAIT, reader.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    let _writer = write_task.await.unwrap();

    assert_eq!(received.len(), data.len());
    assert_eq!(received, data);
}

#[tokio::test]
async fn test_concurrent_clients_are_isolated() {
    let echo_addr = tcp_echo_server().await;
    let (addr, _shutdown_tx) = start_tcp_forwarder(echo_addr).await;

    let mut clients = Vec::new();
    for seed in 0..8u8 {
        clients.push(tokio::spawn(async move {
            let data = payload(200 * 1024 + seed as usize, seed);
            let client = TcpStream::connect(addr).await.unwrap();
            let (mut reader, mut writer) = client.into_split();

            let sent = data.clone();
            let write_task = tokio::spawn(async move {
                writer.write_all(&sent).await.unwrap();
                writer.shutdown().await.unwrap();
                writer
            });

            let mut received = Vec::new();
            reader.read_to_end(&mut received).await.unwrap();
            let _writer = write_task.await.unwrap();
            assert_eq!(received, data, "client {seed} saw foreign bytes");
        }));
    }

    for client in clients {
        timeout(WAIT, client).await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_dial_failure_does_not_stop_acceptor() {
    let dead_target = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let (addr, shutdown_tx) = start_tcp_forwarder(dead_target).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 1];
    let read = timeout(WAIT, first.read(&mut buf)).await.unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));

    // Bring the target up at the same address; the next client gets relayed.
    let target = TcpListener::bind(dead_target).await.unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = target.accept().await.unwrap();
        stream.write_all(b"hello").await.unwrap();
    });

    let mut second = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 5];
    timeout(WAIT, second.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"hello");

    shutdown_tx.send(true).unwrap();
}

#[tokio::test]
async fn test_unix_source_dials_unix_target() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a.sock");
    let target = dir.path().join("b.sock");

    // Create the source entry fresh so it resolves as a Unix socket.
    drop(std::os::unix::net::UnixListener::bind(&source).unwrap());
    unix_echo_server(UnixListener::bind(&target).unwrap());

    let forwarder = Forwarder::new(source.to_str().unwrap(), target.to_str().unwrap());
    assert_eq!(forwarder.endpoint_kind(), EndpointKind::UnixSocket);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let forwarder = Arc::new(forwarder);
    let listener = forwarder.listen().await.unwrap();
    assert_eq!(listener.kind(), EndpointKind::UnixSocket);
    let server = tokio::spawn(Arc::clone(&forwarder).serve(listener, shutdown_rx));

    let mut client = UnixStream::connect(&source).await.unwrap();
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"ping");

    shutdown_tx.send(true).unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
    assert!(!source.exists());
}

#[tokio::test]
async fn test_unix_source_does_not_fall_back_to_tcp_target() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a.sock");
    drop(std::os::unix::net::UnixListener::bind(&source).unwrap());

    // A TCP target is dialed as a path under the coupled endpoint kind, so
    // the relay never reaches it.
    let echo_addr = tcp_echo_server().await;
    let forwarder = Arc::new(Forwarder::new(source.to_str().unwrap(), echo_addr.to_string()));
    let listener = forwarder.listen().await.unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forwarder.serve(listener, shutdown_rx));

    let mut client = UnixStream::connect(&source).await.unwrap();
    let _ = client.write_all(b"ping").await;
    let mut buf = [0u8; 4];
    let read = timeout(WAIT, client.read(&mut buf)).await.unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));
}
