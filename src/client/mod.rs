pub mod connection;

use std::time::Duration;

use crate::error::Error;
use crate::retry::RetryPolicy;

pub use connection::TransportClient;

/// Lifecycle of the client's single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What `send()` does when the connection is missing or fails mid-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Connect lazily when `send()` finds the client disconnected.
    pub auto_connect: bool,
    /// How many times a single `send()` may reconnect and resend after a
    /// socket-level failure.
    pub max_reconnects: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::once()
    }
}

impl ReconnectPolicy {
    /// Reconnect and resend at most once per `send()`.
    pub const fn once() -> Self {
        Self {
            auto_connect: true,
            max_reconnects: 1,
        }
    }

    /// Never reconnect implicitly; `send()` on a disconnected client fails.
    pub const fn disabled() -> Self {
        Self {
            auto_connect: false,
            max_reconnects: 0,
        }
    }

    pub(crate) fn allows(&self, used: u32) -> bool {
        used < self.max_reconnects
    }
}

/// How a response whose `id` differs from the request's is handled.
///
/// Only one request is ever in flight per connection, so a mismatch means the
/// peer answered out of turn or pushed an unsolicited frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorrelationCheck {
    /// Return whatever frame arrives next.
    Ignore,
    /// Return the frame but log the mismatch.
    #[default]
    Warn,
    /// Fail with `TransportError::CorrelationMismatch` and drop the connection.
    Enforce,
}

/// Configuration for a [`TransportClient`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on a single connect attempt (default: 5s).
    pub connect_timeout: Duration,

    /// Retry policy applied to `connect()` (default: 3 attempts, 1s, x2).
    pub retry_policy: RetryPolicy,

    /// Implicit connect/reconnect behavior of `send()`.
    pub reconnect: ReconnectPolicy,

    /// Maximum frame payload size in bytes, both directions (default: 32 MiB).
    pub max_payload_size: u32,

    /// Response id verification.
    pub correlation: CorrelationCheck,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            retry_policy: RetryPolicy::default(),
            reconnect: ReconnectPolicy::default(),
            max_payload_size: crate::frame::MAX_PAYLOAD_SIZE,
            correlation: CorrelationCheck::default(),
        }
    }
}

impl ClientConfig {
    /// Create a builder for constructing a `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Shorthand for a connect retry policy of `attempts` tries starting at
    /// `delay` and doubling.
    pub fn retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.config.retry_policy = RetryPolicy::exponential(attempts, delay, 2.0);
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.config.max_payload_size = size;
        self
    }

    pub fn correlation(mut self, check: CorrelationCheck) -> Self {
        self.config.correlation = check;
        self
    }

    /// Build the `ClientConfig`, validating that all values are sensible.
    pub fn build(self) -> Result<ClientConfig, Error> {
        if self.config.max_payload_size == 0 {
            return Err(Error::Config("max_payload_size must be > 0".into()));
        }
        if self.config.connect_timeout.is_zero() {
            return Err(Error::Config("connect_timeout must be > 0".into()));
        }
        self.config
            .retry_policy
            .validate()
            .map_err(|e| Error::Config(format!("connect retry policy: {e}")))?;
        Ok(self.config)
    }
}
