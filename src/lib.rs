pub mod client;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod guardian;
pub mod retry;
pub mod transport;

// Re-export key types at crate root for convenience.
pub use client::{ClientConfig, ConnectionState, CorrelationCheck, ReconnectPolicy, TransportClient};
pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use error::{Error, FrameError, GuardianError, Result, TransportError};
pub use frame::codec::FrameCodec;
pub use frame::Frame;
pub use guardian::types::{
    AttestationBundle, AttestationSubmission, ConsensusState, ConsensusStatus, HealthReport,
    SubmissionStatus,
};
pub use guardian::{GuardianConfig, GuardianSubmitter};
pub use retry::RetryPolicy;
pub use transport::Connector;

#[cfg(unix)]
pub use transport::unix::UnixConnector;

#[cfg(feature = "tcp")]
pub use transport::tcp::TcpConnector;

#[cfg(feature = "vsock")]
pub use transport::vsock::VsockConnector;
