//! Attachment error types.

use std::io;

use attachments_shared::AppError;
use thiserror::Error;

use super::types::ScanStatus;
use crate::storage::StorageError;

/// Attachment operation errors.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// Content exceeds the size limit (declared length or streamed bytes).
    #[error("content exceeds the size limit of {limit} bytes")]
    ContentTooLarge {
        /// Effective limit in bytes.
        limit: u64,
    },

    /// Media type derived from the file name is not accepted.
    #[error("media type '{mime_type}' of file '{file_name}' is not accepted")]
    UnsupportedMediaType {
        /// File name the media type was derived from.
        file_name: String,
        /// Derived media type.
        mime_type: String,
    },

    /// Malformed request or configuration value.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Composition holds fewer items than declared.
    #[error("composition '{composition}' requires at least {min} items, got {actual}")]
    MinimumAmountNotFulfilled {
        /// Qualified composition name.
        composition: String,
        /// Declared minimum.
        min: u64,
        /// Item count in the payload.
        actual: u64,
    },

    /// Composition holds more items than declared.
    #[error("composition '{composition}' allows at most {max} items, got {actual}")]
    MaximumAmountExceeded {
        /// Qualified composition name.
        composition: String,
        /// Declared maximum.
        max: u64,
        /// Item count in the payload.
        actual: u64,
    },

    /// Content requested while the scan status is not clean.
    #[error("attachment not accessible: scan status is {}", status_label(.status))]
    AttachmentNotAccessible {
        /// Scan status at read time.
        status: Option<ScanStatus>,
    },

    /// Content store call failed or returned an unusable response.
    #[error("content store failure: {0}")]
    StoreFailure(String),

    /// Host persistence call failed.
    #[error("repository error: {0}")]
    Repository(String),
}

#[allow(clippy::ref_option)]
fn status_label(status: &Option<ScanStatus>) -> &'static str {
    status.map_or("unset", ScanStatus::as_str)
}

impl AttachmentError {
    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a store failure error.
    #[must_use]
    pub fn store_failure(msg: impl Into<String>) -> Self {
        Self::StoreFailure(msg.into())
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Create a not accessible error for the given scan status.
    #[must_use]
    pub fn not_accessible(status: Option<ScanStatus>) -> Self {
        Self::AttachmentNotAccessible { status }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::AttachmentNotAccessible { .. } => 403,
            Self::ContentTooLarge { .. } => 413,
            Self::UnsupportedMediaType { .. } => 415,
            Self::MinimumAmountNotFulfilled { .. } | Self::MaximumAmountExceeded { .. } => 422,
            Self::StoreFailure(_) | Self::Repository(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ContentTooLarge { .. } => "CONTENT_TOO_LARGE",
            Self::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::MinimumAmountNotFulfilled { .. } => "MINIMUM_AMOUNT_NOT_FULFILLED",
            Self::MaximumAmountExceeded { .. } => "MAXIMUM_AMOUNT_EXCEEDED",
            Self::AttachmentNotAccessible { .. } => "ATTACHMENT_NOT_ACCESSIBLE",
            Self::StoreFailure(_) => "STORE_FAILURE",
            Self::Repository(_) => "REPOSITORY_ERROR",
        }
    }

    /// Wraps this error into an `io::Error` so it can travel through a byte stream.
    #[must_use]
    pub fn into_io(self) -> io::Error {
        let kind = match self {
            Self::AttachmentNotAccessible { .. } => io::ErrorKind::PermissionDenied,
            Self::ContentTooLarge { .. } => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }

    /// Recovers an attachment error carried by a stream error, or wraps the
    /// I/O failure as a store failure.
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        if err
            .get_ref()
            .is_some_and(|inner| inner.downcast_ref::<Self>().is_some())
        {
            if let Some(inner) = err.into_inner()
                && let Ok(attachment_err) = inner.downcast::<Self>()
            {
                return *attachment_err;
            }
            return Self::store_failure("stream failed");
        }
        Self::StoreFailure(err.to_string())
    }
}

impl From<StorageError> for AttachmentError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Stream(io_err) => Self::from_io(io_err),
            other => Self::StoreFailure(other.to_string()),
        }
    }
}

impl From<AttachmentError> for AppError {
    fn from(err: AttachmentError) -> Self {
        let msg = err.to_string();
        match err {
            AttachmentError::BadRequest(_) => Self::Validation(msg),
            AttachmentError::ContentTooLarge { .. } => Self::PayloadTooLarge(msg),
            AttachmentError::UnsupportedMediaType { .. } => Self::UnsupportedMediaType(msg),
            AttachmentError::MinimumAmountNotFulfilled { .. }
            | AttachmentError::MaximumAmountExceeded { .. } => Self::BusinessRule(msg),
            AttachmentError::AttachmentNotAccessible { .. } => Self::Forbidden(msg),
            AttachmentError::StoreFailure(_) => Self::ExternalService(msg),
            AttachmentError::Repository(_) => Self::Database(msg),
        }
    }
}
