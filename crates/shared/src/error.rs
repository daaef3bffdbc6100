//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// Hosts map these onto their wire protocol; the status codes follow HTTP
/// semantics so a 4xx/5xx split is preserved regardless of transport.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request (missing file name, bad size header, bad config value).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uploaded content exceeds the configured size limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Content media type is not accepted.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Business rule violation (item-count bounds).
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Access to content denied (scan status gate).
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Host persistence error.
    #[error("Database error: {0}")]
    Database(String),

    /// Content store or scanner error.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::PayloadTooLarge(_) => 413,
            Self::UnsupportedMediaType(_) => 415,
            Self::BusinessRule(_) => 422,
            Self::Database(_) | Self::ExternalService(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure is attributable to the client request.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
