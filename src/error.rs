//! Error types for the GoCD provider.

use thiserror::Error;

/// Errors raised while configuring the provider or managing GoCD objects.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object was not found on the GoCD server.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The server or the provider rejected the supplied values.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// The provider configuration is incomplete or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is not registered.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A JSON serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A YAML serialization/deserialization error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The HTTP request could not be sent or its response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The GoCD API answered with an unexpected status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the server.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The object already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Authentication or authorization failed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The server is throttling requests.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The server is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// An operation did not finish in time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation is not valid in the current state (stale etag, unconfigured provider).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The operation is not supported for this type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Yaml(_err) => "yaml error (see Debug output)",
            Self::Http(_err) => "http transport error (see Debug output)",
            Self::Api { message, .. } => message,
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Map a non-success HTTP status returned by GoCD to an error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            400 | 422 => Self::Validation(message),
            401 | 403 => Self::PermissionDenied(message),
            409 => Self::AlreadyExists(message),
            412 => Self::FailedPrecondition(message),
            429 => Self::ResourceExhausted(message),
            503 => Self::Unavailable(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            Self::Unavailable(_) | Self::ResourceExhausted(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Prefix the message with what the provider was doing, keeping the variant.
    ///
    /// ```
    /// use gocd_provider::ProviderError;
    ///
    /// let err = ProviderError::NotFound("profile 'k8s' not found".to_string())
    ///     .context("getting cluster profile 'k8s' errored with");
    /// assert_eq!(
    ///     err.message(),
    ///     "getting cluster profile 'k8s' errored with: profile 'k8s' not found"
    /// );
    /// ```
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        let wrap = |msg: String| format!("{}: {}", context, msg);
        match self {
            Self::NotFound(msg) => Self::NotFound(wrap(msg)),
            Self::Validation(msg) => Self::Validation(wrap(msg)),
            Self::Sdk(msg) => Self::Sdk(wrap(msg)),
            Self::Configuration(msg) => Self::Configuration(wrap(msg)),
            Self::UnknownResource(msg) => Self::UnknownResource(wrap(msg)),
            Self::Api { status, message } => Self::Api {
                status,
                message: wrap(message),
            },
            Self::AlreadyExists(msg) => Self::AlreadyExists(wrap(msg)),
            Self::PermissionDenied(msg) => Self::PermissionDenied(wrap(msg)),
            Self::ResourceExhausted(msg) => Self::ResourceExhausted(wrap(msg)),
            Self::Unavailable(msg) => Self::Unavailable(wrap(msg)),
            Self::DeadlineExceeded(msg) => Self::DeadlineExceeded(wrap(msg)),
            Self::FailedPrecondition(msg) => Self::FailedPrecondition(wrap(msg)),
            Self::Unimplemented(msg) => Self::Unimplemented(wrap(msg)),
            Self::InvalidRequest(msg) => Self::InvalidRequest(wrap(msg)),
            other => Self::Sdk(format!("{}: {}", context, other)),
        }
    }
}
