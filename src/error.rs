use std::io;
use std::time::Duration;

/// Errors from frame parsing and encoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u64, max: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from the enclave transport client.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to enclave: {0}")]
    Connect(#[source] io::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("not connected")]
    NotConnected,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to parse response frame: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("response id mismatch: sent {sent}, received {received}")]
    CorrelationMismatch { sent: String, received: String },
}

impl TransportError {
    /// Socket open or handshake failure. Retried by the connect policy.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::ConnectTimeout(_))
    }

    /// Socket-level failure on an established connection. Eligible for the
    /// reconnect-and-resend path.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Closed | Self::Frame(FrameError::Io(_))
        )
    }
}

/// Errors from guardian submission and status queries.
#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    #[error("all {total} guardian endpoints failed; last error: {last_error}")]
    AllUnreachable {
        total: usize,
        last_error: Box<GuardianError>,
    },

    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed response body from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("invalid guardian configuration: {0}")]
    Config(String),
}

impl GuardianError {
    /// Endpoint that produced a per-endpoint failure, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Http { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Decode { endpoint, .. }
            | Self::InvalidResponse { endpoint, .. } => Some(endpoint),
            Self::AllUnreachable { .. } | Self::Config(_) => None,
        }
    }
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Guardian(#[from] GuardianError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
