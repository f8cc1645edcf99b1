//! Error types for the relayer.

use thiserror::Error;

/// Errors returned by [`crate::Relayer::fulfill_decryption`] and the
/// service loop built on top of it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RelayerError {
    /// The borrower has no scored profile on-chain.
    #[error("no encrypted tier for borrower {borrower}")]
    NotFound {
        /// Normalized borrower address.
        borrower: String,
    },

    /// The lender holds no active, unexpired grant from the borrower.
    #[error("lender {lender} has no active grant from borrower {borrower}")]
    AccessDenied {
        /// Normalized borrower address.
        borrower: String,
        /// Normalized lender address.
        lender: String,
    },

    /// The gateway did not answer within the configured bound.
    #[error("gateway did not answer within {timeout_ms} ms")]
    GatewayTimeout {
        /// The bound that elapsed.
        timeout_ms: u64,
    },

    /// Transport failure between relayer and gateway.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The gateway refused to decrypt. Permanent.
    #[error("gateway rejected the request: {0}")]
    GatewayRejected(String),

    /// A decryption proof does not bind the request it claims to answer.
    #[error("decryption proof does not match request {request_id}")]
    InvalidProof {
        /// Hex-encoded request id.
        request_id: String,
    },

    /// The chain could not be read.
    #[error("event source error: {0}")]
    EventSource(String),

    /// Invalid relayer configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RelayerError {
    /// Only transport-level failures are worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayTimeout { .. } | Self::NetworkError(_))
    }
}

impl From<ConfigError> for RelayerError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<EventSourceError> for RelayerError {
    fn from(err: EventSourceError) -> Self {
        Self::EventSource(err.to_string())
    }
}

/// Errors reported by a [`crate::DecryptionGateway`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway gave up on its own side before answering.
    #[error("gateway timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// The gateway refused the request (unknown handle, missing allowance...).
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Errors reading or validating a [`crate::RelayerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Errors from an [`crate::EventSource`] or the poller driving it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventSourceError {
    /// The RPC endpoint could not be reached or returned garbage.
    #[error("event source unavailable: {0}")]
    Unavailable(String),

    #[error("invalid block range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    /// The consumer side of the event channel went away.
    #[error("event channel closed")]
    ChannelClosed,
}
