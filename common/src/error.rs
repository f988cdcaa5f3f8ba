//! Error types for StreamLedger operations.

use crate::{AccountId, Amount, StreamKey};
use thiserror::Error;

/// Main error type for stream ledger operations.
///
/// Every variant is a precondition failure detected before any state is
/// mutated, so an `Err` always means the operation had no effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Sender and receiver are the same account.
    #[error("Sender and receiver must differ: {0}")]
    SenderEqualsReceiver(AccountId),

    /// Account identifier is empty, too long or has disallowed characters.
    #[error("Invalid account: {0:?}")]
    InvalidAccount(AccountId),

    /// Stream amount must be positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Amount),

    /// Stream duration must be positive (and within the configured maximum).
    #[error("Invalid duration: {0}s")]
    InvalidDuration(u64),

    /// The sender has never created a stream.
    #[error("No stream store for sender {0}")]
    StoreNotFound(AccountId),

    /// No stream exists for the pair.
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamKey),

    /// A stream already exists for the pair.
    #[error("Stream already exists: {0}")]
    StreamAlreadyExists(StreamKey),

    /// The stream was already accepted.
    #[error("Stream already active: {0}")]
    StreamAlreadyActive(StreamKey),

    /// The stream has not been accepted yet.
    #[error("Stream not active: {0}")]
    StreamNotActive(StreamKey),

    /// Caller is neither sender nor receiver of the stream.
    #[error("{caller} is not a participant of {stream}")]
    NotParticipant { caller: AccountId, stream: StreamKey },

    /// Checked arithmetic failed.
    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    /// Not enough value to withdraw or extract.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl StreamError {
    /// Get a stable error code for reporting to callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::SenderEqualsReceiver(_) => "SENDER_EQUALS_RECEIVER",
            StreamError::InvalidAccount(_) => "INVALID_ACCOUNT",
            StreamError::InvalidAmount(_) => "INVALID_AMOUNT",
            StreamError::InvalidDuration(_) => "INVALID_DURATION",
            StreamError::StoreNotFound(_) => "STORE_NOT_FOUND",
            StreamError::StreamNotFound(_) => "STREAM_NOT_FOUND",
            StreamError::StreamAlreadyExists(_) => "STREAM_ALREADY_EXISTS",
            StreamError::StreamAlreadyActive(_) => "STREAM_ALREADY_ACTIVE",
            StreamError::StreamNotActive(_) => "STREAM_NOT_ACTIVE",
            StreamError::NotParticipant { .. } => "NOT_PARTICIPANT",
            StreamError::ArithmeticOverflow(_) => "ARITHMETIC_OVERFLOW",
            StreamError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            StreamError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for StreamLedger operations.
pub type Result<T> = std::result::Result<T, StreamError>;
