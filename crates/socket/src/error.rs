//! Error handling for event-stream transfer operations.
//!
//! `TransferError` is the single error type returned by the connection
//! manager and the transport implementations. None of its variants are
//! fatal to the process: callers log them and carry on with the next cycle.
//!
//! **Connection errors**:
//! - `ConnectTimeout`: the connect attempt lost the race against its deadline
//! - `Connect`: the transport refused or failed the handshake
//!
//! **Runtime errors**:
//! - `NotConnected`: emit requested outside the `Connected` state
//! - `Emit`: the transport failed to send an event
//! - `Close`: the transport failed to close a link cleanly
//!
//! **Data errors**:
//! - `Serialization`: the payload could not be turned into a JSON object
//! - `InvalidEndpoint`: the configured host could not be turned into a URL

use std::time::Duration;

use thiserror::Error;

/// The unified error type for collector transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The connect attempt did not finish before the deadline and was abandoned.
    #[error("Connect attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The transport reported a failure while establishing the link.
    #[error("Connection error: {0}")]
    Connect(String),

    /// `emit` was called while the session is not `Connected`.
    #[error("Not connected to the collector")]
    NotConnected,

    /// The transport failed to deliver an event.
    #[error("Emit error: {0}")]
    Emit(String),

    /// Closing the link failed. The link is considered gone regardless.
    #[error("Close error: {0}")]
    Close(String),

    /// Payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The configured collector endpoint is not a valid URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<serde_json::Error> for TransferError {
    fn from(e: serde_json::Error) -> Self {
        TransferError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for TransferError {
    fn from(e: url::ParseError) -> Self {
        TransferError::InvalidEndpoint(e.to_string())
    }
}

#[cfg(feature = "socketio")]
impl From<rust_socketio::Error> for TransferError {
    fn from(e: rust_socketio::Error) -> Self {
        TransferError::Connect(e.to_string())
    }
}

impl TransferError {
    /// True for failures that happened while establishing a link.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            TransferError::ConnectTimeout(_) | TransferError::Connect(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            TransferError::ConnectTimeout(Duration::from_secs(10)).to_string(),
            "Connect attempt timed out after 10s"
        );
        assert_eq!(
            TransferError::NotConnected.to_string(),
            "Not connected to the collector"
        );
    }

    #[test]
    fn test_connect_failure_classification() {
        assert!(TransferError::ConnectTimeout(Duration::from_secs(1)).is_connect_failure());
        assert!(TransferError::Connect("refused".into()).is_connect_failure());
        assert!(!TransferError::Emit("broken pipe".into()).is_connect_failure());
        assert!(!TransferError::NotConnected.is_connect_failure());
    }

    #[test]
    fn test_url_error_conversion() {
        let err: TransferError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, TransferError::InvalidEndpoint(_)));
    }
}
