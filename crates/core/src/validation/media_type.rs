//! Media type derivation and acceptance checks.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::attachment::AttachmentError;

/// Media type used when an extension is not recognized.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Built-in extension table, consulted before `mime_guess` (case-insensitive).
static EXTENSION_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        // Documents
        ("pdf", "application/pdf"),
        ("doc", "application/msword"),
        (
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("xls", "application/vnd.ms-excel"),
        (
            "xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        ("ppt", "application/vnd.ms-powerpoint"),
        (
            "pptx",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ),
        ("odt", "application/vnd.oasis.opendocument.text"),
        ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
        ("rtf", "application/rtf"),
        ("txt", "text/plain"),
        ("csv", "text/csv"),
        ("md", "text/markdown"),
        ("html", "text/html"),
        ("htm", "text/html"),
        ("xml", "application/xml"),
        ("json", "application/json"),
        // Images
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("webp", "image/webp"),
        ("bmp", "image/bmp"),
        ("svg", "image/svg+xml"),
        ("tif", "image/tiff"),
        ("tiff", "image/tiff"),
        // Archives
        ("zip", "application/zip"),
        ("gz", "application/gzip"),
        ("tar", "application/x-tar"),
        // Media
        ("mp3", "audio/mpeg"),
        ("wav", "audio/wav"),
        ("mp4", "video/mp4"),
        ("mov", "video/quicktime"),
        // Mail
        ("eml", "message/rfc822"),
        ("msg", "application/vnd.ms-outlook"),
    ]
    .into_iter()
    .collect()
});

/// Extension of `file_name`, lowercased.
///
/// # Errors
///
/// Returns `BadRequest` for blank names and names without an extension or
/// with a trailing dot.
pub fn extension(file_name: &str) -> Result<String, AttachmentError> {
    let trimmed = file_name.trim();
    if trimmed.is_empty() {
        return Err(AttachmentError::bad_request("file name is required"));
    }
    match trimmed.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Ok(ext.to_ascii_lowercase()),
        _ => Err(AttachmentError::bad_request(format!(
            "file name '{trimmed}' has no extension"
        ))),
    }
}

/// Media type for an extension; unknown extensions map to
/// `application/octet-stream`.
#[must_use]
pub fn media_type_for_extension(ext: &str) -> String {
    let ext = ext.to_ascii_lowercase();
    if let Some(known) = EXTENSION_TYPES.get(ext.as_str()) {
        return (*known).to_string();
    }
    mime_guess::from_ext(&ext)
        .first()
        .map_or_else(|| DEFAULT_MEDIA_TYPE.to_string(), |m| m.essence_str().to_string())
}

/// Whether `mime_type` matches one of `patterns`.
///
/// No patterns, an empty list or a `*/*` entry accept everything. A
/// `type/*` pattern accepts any subtype. Matching ignores case.
#[must_use]
pub fn is_accepted(mime_type: &str, patterns: Option<&[String]>) -> bool {
    let Some(patterns) = patterns else {
        return true;
    };
    if patterns.is_empty() {
        return true;
    }
    let mime_type = mime_type.to_ascii_lowercase();
    patterns.iter().any(|pattern| {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern == "*/*" || pattern == mime_type {
            return true;
        }
        pattern
            .strip_suffix("/*")
            .is_some_and(|major| mime_type.split('/').next() == Some(major))
    })
}

/// Derive the media type of `file_name` and check it against `patterns`.
///
/// # Errors
///
/// Returns `BadRequest` for a missing or extension-less file name and
/// `UnsupportedMediaType` when no pattern matches.
pub fn validate_media_type(
    file_name: Option<&str>,
    patterns: Option<&[String]>,
) -> Result<String, AttachmentError> {
    let file_name = file_name.ok_or_else(|| AttachmentError::bad_request("file name is required"))?;
    let mime_type = media_type_for_extension(&extension(file_name)?);
    if !is_accepted(&mime_type, patterns) {
        return Err(AttachmentError::UnsupportedMediaType {
            file_name: file_name.to_string(),
            mime_type,
        });
    }
    Ok(mime_type)
}
