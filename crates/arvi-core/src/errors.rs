//! Error types for the ARVI integration
//!
//! This module contains the error types used throughout the integration core:
//! platform error codes reported across the boundary, session-variable decoding
//! errors, and the main `IntegrationError` type that unifies them.

use core::fmt;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Platform Error Codes
// ----------------------------------------------------------------------------

/// Error code attached to a failed platform response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Unclassified failure, also used for failures synthesized in-process
    Unknown,
    /// The response could not be matched to a request on the platform side
    BadResponseId,
    /// No error
    None,
    /// The application key was rejected
    ApiKeyError,
    /// The authentication data was rejected
    AuthDataError,
    /// Authentication with the platform failed
    AuthenticationError,
    /// The request itself was rejected
    RequestError,
    /// A code this SDK does not know about
    Other(i32),
}

impl ErrorCode {
    /// Get the raw integer value used across the boundary
    pub fn as_raw(&self) -> i32 {
        match self {
            ErrorCode::Unknown => -1,
            ErrorCode::BadResponseId => -2,
            ErrorCode::None => 0,
            ErrorCode::ApiKeyError => 1,
            ErrorCode::AuthDataError => 2,
            ErrorCode::AuthenticationError => 3,
            ErrorCode::RequestError => 4,
            ErrorCode::Other(code) => *code,
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -1 => ErrorCode::Unknown,
            -2 => ErrorCode::BadResponseId,
            0 => ErrorCode::None,
            1 => ErrorCode::ApiKeyError,
            2 => ErrorCode::AuthDataError,
            3 => ErrorCode::AuthenticationError,
            4 => ErrorCode::RequestError,
            other => ErrorCode::Other(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Other(code) => write!(f, "{}", code),
            known => write!(f, "{:?} ({})", known, known.as_raw()),
        }
    }
}

// ----------------------------------------------------------------------------
// Codec Errors
// ----------------------------------------------------------------------------

/// Errors raised while converting session values to and from raw bytes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Length mismatch for {type_name}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid boolean byte: {0:#04x}")]
    InvalidBool(u8),
    #[error("Character U+{0:04X} does not fit in a single UTF-16 code unit")]
    CharOutOfRange(u32),
    #[error("Code unit {0:#06x} is not a valid character")]
    InvalidChar(u16),
    #[error("Invalid UTF-8 string: {0}")]
    InvalidUtf8(String),
}

// ----------------------------------------------------------------------------
// Integration Errors
// ----------------------------------------------------------------------------

/// Core error type for the ARVI integration
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("Application key is empty. Configure `app_key` before initializing the integration.")]
    EmptyAppKey,

    #[error("Platform plugin not found: {reason}")]
    PluginNotFound { reason: String },

    #[error("Platform message module not initialized. Error: {reason}")]
    MessagesNotInitialized { reason: String },

    #[error("Session variables module not initialized. Error: {reason}")]
    SessionVariablesNotInitialized { reason: String },

    #[error("Integration API not initialized. Was Integration::initialize() called?")]
    NotInitialized,

    #[error("Unknown error: the platform did not accept the request")]
    EnqueueFailed,

    #[error("A response has already been written for this message")]
    ResponseAlreadySet,

    #[error("The platform rejected the response for message {name}")]
    ResponseWriteRejected { name: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Rate limited: {reason}")]
    RateLimited { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl IntegrationError {
    /// Create an invalid argument error with a reason
    pub fn invalid_argument<T: Into<String>>(reason: T) -> Self {
        IntegrationError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a rate limiting error with a reason
    pub fn rate_limited<T: Into<String>>(reason: T) -> Self {
        IntegrationError::RateLimited {
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        IntegrationError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a plugin-not-found error with a reason
    pub fn plugin_not_found<T: Into<String>>(reason: T) -> Self {
        IntegrationError::PluginNotFound {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, IntegrationError>;
pub type IntegrationResult<T> = Result<T>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_round_trip_for_known_codes() {
        for raw in [-2, -1, 0, 1, 2, 3, 4] {
            assert_eq!(ErrorCode::from(raw).as_raw(), raw);
        }
        assert_eq!(ErrorCode::from(1), ErrorCode::ApiKeyError);
    }

    #[test]
    fn test_unknown_error_code_is_preserved() {
        let code = ErrorCode::from(42);
        assert_eq!(code, ErrorCode::Other(42));
        assert_eq!(code.as_raw(), 42);
        assert_eq!(code.to_string(), "42");
    }

    #[test]
    fn test_not_initialized_message_is_actionable() {
        let message = IntegrationError::NotInitialized.to_string();
        assert!(message.contains("initialize"));
    }
}
