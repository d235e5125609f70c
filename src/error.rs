/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/
use thiserror::Error;

/**
Errors that can occur while subscribing to the real-time feed.

Every variant except `InvalidConfig` is soft: it invalidates the current operation or
session, never the subscription as a whole. The subscription loop reports soft errors
through the Error event and keeps running until it is cancelled.
*/
#[derive(Debug, Error)]
pub enum FeedError {
    /// The transport could not be established.
    #[error("Connect error: {0}")]
    Connect(String),
    /// The session failed while sending or receiving, or is not open.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The payload is not a valid structured message.
    #[error("Parse error: {message}")]
    Parse { message: String, payload: String },
    /// The payload parsed but its `type` discriminator is missing or not understood.
    #[error("Protocol error: {message}")]
    Protocol { message: String, payload: String },
    /// The signer could not produce a signature block.
    #[error("Signing error: {0}")]
    Signing(String),
    /// The subscription configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Cancellation was requested while the operation was suspended.
    #[error("Cancellation requested")]
    Cancelled,
}

impl FeedError {
    /// Returns true if the error only invalidates the current message or session.
    pub fn is_soft(&self) -> bool {
        !matches!(self, FeedError::InvalidConfig(_) | FeedError::Cancelled)
    }

    /// Raw frame text attached to the error, if any.
    pub fn payload(&self) -> Option<&str> {
        match self {
            FeedError::Parse { payload, .. } | FeedError::Protocol { payload, .. } => {
                Some(payload.as_str())
            }
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::Transport(e.to_string())
    }
}

impl From<url::ParseError> for FeedError {
    fn from(e: url::ParseError) -> Self {
        FeedError::InvalidConfig(format!("invalid endpoint: {}", e))
    }
}

/// A type alias for `Result<T, FeedError>`.
///
/// # Example
///
/// ```rust
/// use coinbase_feed::error::FeedResult;
///
/// fn example_function() -> FeedResult<String> {
///     Ok("Success!".to_string())
/// }
/// ```
pub type FeedResult<T> = Result<T, FeedError>;
