//! Error types for the provider and its cloud client.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Classification of a failed cloud call.
///
/// Callers branch on the kind, never on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The entity does not exist (HTTP 404).
    NotFound,
    /// A 5xx response that survived the transport retry budget.
    TransientServerError,
    /// A 4xx response other than 404.
    ClientError,
    /// The request never produced an HTTP response.
    Transport,
    /// A poller gave up before its condition was met.
    DeadlineExceeded,
    /// The remote reported the awaited action as failed.
    ActionFailed,
    /// Anything else, such as an undecodable response body.
    Other,
}

/// An error returned by a [`CloudClient`](crate::client::CloudClient) call.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    /// What kind of failure this is.
    pub kind: ErrorKind,
    /// The HTTP status, when a response was received.
    pub status: Option<u16>,
    /// A human-readable message, usually taken from the remote error body.
    pub message: String,
}

impl ApiError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Classify an HTTP error status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            404 => ErrorKind::NotFound,
            400..=499 => ErrorKind::ClientError,
            500..=599 => ErrorKind::TransientServerError,
            _ => ErrorKind::Other,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    /// Shorthand for a [`ErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_status(404, message)
    }

    /// Shorthand for a [`ErrorKind::DeadlineExceeded`] error.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeadlineExceeded, message)
    }

    /// Whether this error means the entity is gone.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Whether the failure was a 5xx or a transport failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::TransientServerError | ErrorKind::Transport
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::new(ErrorKind::Other, format!("failed to decode response: {err}"));
        }
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), err.to_string()),
            None => Self::new(ErrorKind::Transport, err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Other, format!("failed to decode response: {err}"))
    }
}

/// Errors surfaced to the host by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A configuration value failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The plan asks for a transition the remote cannot perform.
    #[error("Inconsistent plan: {0}")]
    SchemaConsistency(String),

    /// A wait for an event or status ran out of time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The provider is not configured or its configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A cloud API call failed.
    #[error("API error: {0}")]
    Api(ApiError),

    /// An internal error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::SchemaConsistency(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Api(err) => &err.message,
            Self::Sdk(msg) => msg,
        }
    }

    /// Whether the error means the remote entity no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Convert into an error diagnostic for the host.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            Self::NotFound(_) => "Resource not found",
            Self::Validation(_) => "Invalid configuration",
            Self::SchemaConsistency(_) => "Unsupported change",
            Self::DeadlineExceeded(_) => "Timed out",
            Self::Configuration(_) => "Provider not configured",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Serialization(_) => "Malformed state",
            Self::Api(_) => "Linode API request failed",
            Self::Sdk(_) => "Internal error",
        };
        Diagnostic::error(summary).with_detail(self.to_string())
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        match err.kind {
            ErrorKind::NotFound => Self::NotFound(err.message),
            ErrorKind::DeadlineExceeded => Self::DeadlineExceeded(err.message),
            _ => Self::Api(err),
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        err.to_diagnostic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("database 123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: database 123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("linode_widget".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: linode_widget");
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(ApiError::from_status(404, "gone").kind, ErrorKind::NotFound);
        assert_eq!(ApiError::from_status(400, "bad").kind, ErrorKind::ClientError);
        assert_eq!(ApiError::from_status(401, "auth").kind, ErrorKind::ClientError);
        assert_eq!(
            ApiError::from_status(502, "bad gateway").kind,
            ErrorKind::TransientServerError
        );
        assert_eq!(ApiError::from_status(302, "moved").kind, ErrorKind::Other);
        assert_eq!(ApiError::from_status(500, "oops").status, Some(500));
    }

    #[test]
    fn test_api_error_to_provider_error() {
        let err: ProviderError = ApiError::not_found("database 7").into();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "database 7");

        let err: ProviderError = ApiError::deadline_exceeded("waited 5m").into();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));

        let err: ProviderError = ApiError::from_status(400, "label too long").into();
        assert!(matches!(err, ProviderError::Api(ref e) if e.kind == ErrorKind::ClientError));
        assert_eq!(err.message(), "label too long");
    }

    #[test]
    fn test_to_diagnostic() {
        let diag: Diagnostic =
            ProviderError::SchemaConsistency("cannot change engine".to_string()).into();
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Unsupported change");
        assert_eq!(
            diag.detail.as_deref(),
            Some("Inconsistent plan: cannot change engine")
        );
    }
}
