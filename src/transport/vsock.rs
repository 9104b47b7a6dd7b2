use async_trait::async_trait;
use tokio_vsock::{VsockAddr, VsockListener, VsockStream};

use super::Connector;

/// Connect to a VSock endpoint.
pub async fn connect(cid: u32, port: u32) -> std::io::Result<VsockStream> {
    VsockStream::connect(VsockAddr::new(cid, port)).await
}

/// Bind a VSock listener.
pub fn listen(port: u32) -> std::io::Result<VsockListener> {
    VsockListener::bind(VsockAddr::new(tokio_vsock::VMADDR_CID_ANY, port))
}

/// Accept a single connection from a VSock listener.
pub async fn accept(listener: &mut VsockListener) -> std::io::Result<(VsockStream, VsockAddr)> {
    listener.accept().await
}

/// Connector for an enclave reachable over a hypervisor socket.
#[derive(Debug, Clone, Copy)]
pub struct VsockConnector {
    cid: u32,
    port: u32,
}

impl VsockConnector {
    pub fn new(cid: u32, port: u32) -> Self {
        Self { cid, port }
    }
}

#[async_trait]
impl Connector for VsockConnector {
    type Stream = VsockStream;

    async fn connect(&self) -> std::io::Result<VsockStream> {
        connect(self.cid, self.port).await
    }

    fn peer(&self) -> String {
        format!("vsock:{}:{}", self.cid, self.port)
    }
}
