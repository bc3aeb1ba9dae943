//! Error types for ZStack operations.
//!
//! This module provides the crate-wide error enum, the poller's terminal failure
//! kinds, and the structured error object the management server returns, together
//! with the helpers that turn a nested server cause chain into one diagnostic line.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Maximum number of nested causes followed when flattening a server error.
pub const MAX_CAUSE_DEPTH: usize = 10;

/// Main error type for ZStack operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Login rejected, or the login response could not be decoded
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network, DNS or TLS failure before any HTTP status was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Attempted to build a poller from something other than a 202 envelope
    #[error("Invalid async response: {0}")]
    InvalidAsyncResponse(String),

    /// Async job resolution failed
    #[error(transparent)]
    Poll(#[from] PollError),

    /// Non-success status returned by a resource endpoint
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Flattened server error chain or raw body
        message: String,
    },

    /// Failed to parse a response body
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid endpoint or URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid UUID format
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),
}

/// Terminal failures of an async job poll.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// The location returned 404
    #[error("location {location} is no longer available")]
    Expired {
        /// Polled location
        location: String,
    },

    /// The deadline elapsed before the job reached a terminal state
    #[error("querying location {location} timed out after {timeout:?}")]
    Timeout {
        /// Polled location
        location: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// The location answered with a status outside the polling protocol
    #[error("location {location} returned status code {status} and error response {body}")]
    Unexpected {
        /// Polled location
        location: String,
        /// HTTP status code
        status: u16,
        /// Verbatim response body
        body: String,
    },

    /// The job succeeded but its result could not be decoded
    #[error("failed to decode result from {location}: {message}")]
    DecodeFailure {
        /// Polled location
        location: String,
        /// Decoder message
        message: String,
    },

    /// The job failed on the server (503 with an error body)
    #[error("job at {location} failed: {message}")]
    ServerError {
        /// Polled location
        location: String,
        /// Flattened server error chain
        message: String,
    },
}

/// Specialized result type for ZStack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error object returned by the management server.
///
/// Every field is optional on the wire; missing strings decode as empty. The
/// `cause` link makes this a chain, which is never trusted beyond
/// [`MAX_CAUSE_DEPTH`] hops.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code for programmatic handling
    #[serde(default)]
    pub code: String,
    /// Human-readable summary
    #[serde(default)]
    pub description: String,
    /// Additional details
    #[serde(default)]
    pub details: String,
    /// Server-side elaboration hint
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub elaboration: String,
    /// Opaque key/value payload attached by the server
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub opaque: HashMap<String, serde_json::Value>,
    /// Nested cause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ApiError>>,
}

/// Envelope carrying an optional [`ApiError`] under the `error` key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Server error, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ApiError {
    /// Create an error with the three fields that appear in diagnostics.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            details: details.into(),
            ..Self::default()
        }
    }

    /// Attach a nested cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Iterate over this error and its causes, outermost first.
    ///
    /// Yields at most `MAX_CAUSE_DEPTH + 1` items.
    pub fn chain(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |err| err.cause.as_deref()).take(MAX_CAUSE_DEPTH + 1)
    }

    /// Diagnostic segment for this error alone.
    #[must_use]
    pub fn segment(&self) -> String {
        format!(
            "code:{},detail:{},description:{}",
            self.code, self.details, self.description
        )
    }

    /// Flatten the cause chain into one message, outermost first.
    ///
    /// ```
    /// use zstack_core::error::ApiError;
    ///
    /// let err = ApiError::new("SYS.1006", "operation failed", "")
    ///     .with_cause(ApiError::new("HOST.1001", "host disconnected", "kvm-01"));
    /// assert_eq!(
    ///     err.flatten(),
    ///     "code:SYS.1006,detail:,description:operation failed: \
    ///      code:HOST.1001,detail:kvm-01,description:host disconnected"
    /// );
    /// ```
    #[must_use]
    pub fn flatten(&self) -> String {
        self.chain()
            .map(Self::segment)
            .collect::<Vec<_>>()
            .join(": ")
    }

    /// Message used when login is rejected: description and details.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} {}", self.description, self.details)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.flatten())
    }
}

/// Decode `{"error": {...}}` from a response body, if present.
///
/// Malformed or error-less bodies yield `None`.
#[must_use]
pub fn decode_api_error(body: &str) -> Option<ApiError> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|response| response.error)
}

/// Describe a non-success response.
///
/// Prefers the flattened server error chain and falls back to the status code
/// and raw body.
#[must_use]
pub fn describe_failure(status: StatusCode, body: &str) -> String {
    match decode_api_error(body) {
        Some(err) => err.flatten(),
        None => generic_failure(status, body),
    }
}

pub(crate) fn generic_failure(status: StatusCode, body: &str) -> String {
    format!("status code {}, {}", status.as_u16(), body)
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::InvalidAsyncResponse(_) => "INVALID_ASYNC_RESPONSE",
            Self::Poll(err) => err.error_code(),
            Self::Api { .. } => "API_ERROR",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidUuid(_) => "INVALID_UUID",
        }
    }

    /// Wrap a transport failure with the operation and URL it happened on.
    pub(crate) fn transport(operation: &str, url: impl Display, err: &reqwest::Error) -> Self {
        Self::Transport(format!("{operation} {url}: {err}"))
    }

    /// Returns true if polling gave up because the deadline elapsed.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Poll(PollError::Timeout { .. }))
    }
}

impl PollError {
    /// Returns the error code for this poll failure.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Expired { .. } => "POLL_EXPIRED",
            Self::Timeout { .. } => "POLL_TIMEOUT",
            Self::Unexpected { .. } => "POLL_UNEXPECTED",
            Self::DecodeFailure { .. } => "POLL_DECODE_FAILURE",
            Self::ServerError { .. } => "POLL_SERVER_ERROR",
        }
    }

    /// Location the failing poll was querying.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Expired { location }
            | Self::Timeout { location, .. }
            | Self::Unexpected { location, .. }
            | Self::DecodeFailure { location, .. }
            | Self::ServerError { location, .. } => location,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidUuid(err.to_string())
    }
}
