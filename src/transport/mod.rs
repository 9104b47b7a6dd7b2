use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Unix-domain socket transport (connect, listen, accept).
#[cfg(unix)]
pub mod unix;

/// TCP transport for local development against a mock enclave.
#[cfg(feature = "tcp")]
pub mod tcp;

/// VSock transport for hypervisor-isolated enclaves (connect, listen, accept).
#[cfg(feature = "vsock")]
pub mod vsock;

/// Opens byte-stream connections to the enclave.
///
/// One call to [`connect`](Connector::connect) is one attempt; timeouts and
/// retries are layered on by the client.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a fresh stream to the peer.
    async fn connect(&self) -> io::Result<Self::Stream>;

    /// Human-readable peer address for logs.
    fn peer(&self) -> String;
}
