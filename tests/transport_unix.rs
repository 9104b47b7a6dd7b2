#![cfg(unix)]
//! Tests for the `transport::unix` helpers and `UnixConnector`.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use enclave_bridge::transport::unix;
use enclave_bridge::{Connector, UnixConnector};

#[tokio::test]
async fn listen_accept_and_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.sock");
    let listener = unix::listen(&path).unwrap();

    let connector = UnixConnector::new(&path);
    let client_handle = tokio::spawn(async move { connector.connect().await.unwrap() });

    let (mut server_stream, _) = unix::accept(&listener).await.unwrap();
    let mut client_stream = client_handle.await.unwrap();

    client_stream.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    server_stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
}

#[tokio::test]
async fn connect_to_missing_socket_fails() {
    let dir = tempfile::tempdir().unwrap();
    let connector = UnixConnector::new(dir.path().join("absent.sock"));

    let err = connector.connect().await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[tokio::test]
async fn listen_replaces_stale_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.sock");

    let first = unix::listen(&path).unwrap();
    drop(first);
    assert!(path.exists(), "socket file outlives its listener");

    let listener = unix::listen(&path).unwrap();
    let connect = tokio::spawn({
        let path = path.clone();
        async move { unix::connect(&path).await }
    });
    unix::accept(&listener).await.unwrap();
    connect.await.unwrap().unwrap();
}

#[test]
fn connector_reports_its_path() {
    let connector = UnixConnector::new("/run/enclave/enclave.sock");
    assert_eq!(connector.peer(), "unix:/run/enclave/enclave.sock");
    assert_eq!(
        connector.path(),
        std::path::Path::new("/run/enclave/enclave.sock")
    );
}
