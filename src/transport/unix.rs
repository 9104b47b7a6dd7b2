use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::unix::SocketAddr;
use tokio::net::{UnixListener, UnixStream};

use super::Connector;

/// Connect to a Unix-domain socket.
pub async fn connect(path: impl AsRef<Path>) -> std::io::Result<UnixStream> {
    UnixStream::connect(path).await
}

/// Bind a Unix-domain listener, replacing a stale socket file if present.
pub fn listen(path: impl AsRef<Path>) -> std::io::Result<UnixListener> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(path)
}

/// Accept a single connection from a listener.
pub async fn accept(listener: &UnixListener) -> std::io::Result<(UnixStream, SocketAddr)> {
    listener.accept().await
}

/// Connector for an enclave exposed as a Unix-domain socket.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Connector for UnixConnector {
    type Stream = UnixStream;

    async fn connect(&self) -> std::io::Result<UnixStream> {
        connect(&self.path).await
    }

    fn peer(&self) -> String {
        format!("unix:{}", self.path.display())
    }
}
