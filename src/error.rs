//! # Error Types
//!
//! Custom error types for HAB Link using `thiserror`.

use thiserror::Error;

/// Main error type for HAB Link
#[derive(Debug, Error)]
pub enum HabLinkError {
    /// Radio link I/O errors (serial port, framing)
    #[error("link error: {0}")]
    Link(String),

    /// No modem serial port could be opened
    #[error("modem port not found, tried: {0}")]
    PortNotFound(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image capture errors
    #[error("capture error: {0}")]
    Capture(String),

    /// Persistent storage errors
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type alias for HAB Link
pub type Result<T> = std::result::Result<T, HabLinkError>;

/// Protocol-level failure taxonomy surfaced in session outcomes.
///
/// Every variant is recoverable: the session machine resets to idle and the
/// failed outcome is reported to the caller. Hardware bring-up failures are
/// not part of this taxonomy; those are fatal and handled in `main`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No frame arrived within the configured deadline
    #[error("no frame received within the configured deadline")]
    LinkTimeout,

    /// A begin marker arrived while a transfer was already in progress
    #[error("begin marker received mid-transfer")]
    UnexpectedMarker,

    /// The accumulated transfer failed to decode at end-of-transfer
    #[error("transfer payload failed to decode: {0}")]
    EncodingError(String),

    /// The accumulated transfer outgrew the configured limit
    #[error("transfer exceeds the {limit} byte limit")]
    BufferExceeded { limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        assert_eq!(
            SessionError::LinkTimeout.to_string(),
            "no frame received within the configured deadline"
        );
        assert_eq!(
            SessionError::BufferExceeded { limit: 1024 }.to_string(),
            "transfer exceeds the 1024 byte limit"
        );
    }

    #[test]
    fn test_session_error_is_comparable() {
        // Outcomes are matched on in the session loop and in tests
        assert_eq!(SessionError::LinkTimeout, SessionError::LinkTimeout);
        assert_ne!(SessionError::LinkTimeout, SessionError::UnexpectedMarker);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: HabLinkError = io.into();
        assert!(matches!(err, HabLinkError::Io(_)));
    }
}
