//! Attachment types and data structures.

use attachments_shared::ContentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EntityKey, Field};

/// Malware scan status of stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// Uploaded, no scan requested or finished yet.
    Unscanned,
    /// Scan in progress.
    Scanning,
    /// Scanned, no malware found.
    Clean,
    /// Scanned, malware found.
    Infected,
    /// No scanner is configured for this deployment.
    NoScanner,
}

impl ScanStatus {
    /// Convert to the stored string value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unscanned => "UNSCANNED",
            Self::Scanning => "SCANNING",
            Self::Clean => "CLEAN",
            Self::Infected => "INFECTED",
            Self::NoScanner => "NO_SCANNER",
        }
    }

    /// Parse from the stored string value (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNSCANNED" => Some(Self::Unscanned),
            "SCANNING" => Some(Self::Scanning),
            "CLEAN" => Some(Self::Clean),
            "INFECTED" => Some(Self::Infected),
            "NO_SCANNER" => Some(Self::NoScanner),
            _ => None,
        }
    }

    /// Whether a read of content in this status should request a scan.
    #[must_use]
    pub fn needs_scan(status: Option<Self>) -> bool {
        matches!(status, None | Some(Self::Unscanned | Self::Scanning))
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata a caller may not set directly; only this crate writes it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadonlyFields {
    /// Content id issued by the store.
    pub content_id: Field<ContentId>,
    /// Scan status.
    pub status: Field<ScanStatus>,
    /// Time of the last finished scan.
    pub scanned_at: Field<DateTime<Utc>>,
}

impl ReadonlyFields {
    /// Fields describing content that has been removed.
    #[must_use]
    pub fn cleared() -> Self {
        Self {
            content_id: Field::Null,
            status: Field::Null,
            scanned_at: Field::Null,
        }
    }

    /// Whether none of the fields is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content_id.is_missing() && self.status.is_missing() && self.scanned_at.is_missing()
    }

    /// Overlays the present fields of `other` onto `self`.
    pub fn merge(&mut self, other: Self) {
        if !other.content_id.is_missing() {
            self.content_id = other.content_id;
        }
        if !other.status.is_missing() {
            self.status = other.status;
        }
        if !other.scanned_at.is_missing() {
            self.scanned_at = other.scanned_at;
        }
    }
}

/// Previously persisted attachment metadata (never content bytes).
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentSnapshot {
    /// Attachment entity name.
    pub entity: String,
    /// Key of the attachment row.
    pub key: EntityKey,
    /// Keys of the ancestor rows, from the root row down to the direct parent.
    pub lineage: Vec<EntityKey>,
    /// Stored content id.
    pub content_id: Option<ContentId>,
    /// Stored scan status.
    pub status: Option<ScanStatus>,
    /// Stored scan timestamp.
    pub scanned_at: Option<DateTime<Utc>>,
}

/// Draft phase of the request, passed explicitly instead of ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftMode {
    /// Not a draft request.
    #[default]
    Inactive,
    /// Intermediate edit of a draft.
    Edit,
    /// Activation of a draft into the active entity.
    Activate,
}

/// Per-request context threaded through the interceptors.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Draft phase.
    pub draft: DraftMode,
    /// Raw `Content-Length` value of the request, if the caller declared one.
    pub declared_length: Option<String>,
}

impl RequestContext {
    /// Context of a non-draft request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the draft phase.
    #[must_use]
    pub fn with_draft(mut self, draft: DraftMode) -> Self {
        self.draft = draft;
        self
    }

    /// Set the declared request length header.
    #[must_use]
    pub fn with_declared_length(mut self, value: impl Into<String>) -> Self {
        self.declared_length = Some(value.into());
        self
    }
}
