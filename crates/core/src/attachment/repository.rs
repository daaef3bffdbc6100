//! Host collaborator contracts: entity persistence and malware scanning.

use std::future::Future;

use attachments_shared::ContentId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::AttachmentError;
use super::types::{AttachmentSnapshot, ReadonlyFields};
use crate::model::EntityKey;
use crate::schema::SchemaPath;

/// Repository trait for the host's entity persistence.
///
/// This trait is implemented by the host to run keyed selects and updates
/// against its own storage; this crate never writes entity rows otherwise.
pub trait EntityStore: Send + Sync + 'static {
    /// Select the attachment rows reachable from the given root rows along
    /// `path`.
    ///
    /// For a single-segment path (the root itself is an attachment entity)
    /// the root rows are returned. Each snapshot carries the keys of its
    /// ancestors from the root row down to its direct parent.
    fn select_attachments(
        &self,
        root: &str,
        path: &SchemaPath,
        root_keys: &[EntityKey],
    ) -> impl Future<Output = Result<Vec<AttachmentSnapshot>, AttachmentError>> + Send;

    /// Write read-only attachment fields of one row.
    ///
    /// Missing fields are left untouched; null fields are cleared.
    fn update_readonly_fields(
        &self,
        entity: &str,
        key: &EntityKey,
        fields: &ReadonlyFields,
    ) -> impl Future<Output = Result<(), AttachmentError>> + Send;
}

/// Malware scanner entry point.
///
/// Dispatch is fire-and-forget: implementations must return immediately and
/// never fail the caller. Results show up later as a status change on the row.
pub trait Scanner: Send + Sync {
    /// Request a scan of stored content.
    fn scan_async(&self, entity: &str, content_id: &ContentId);
}

/// Scanner for deployments without malware scanning.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScanner;

impl Scanner for NoopScanner {
    fn scan_async(&self, entity: &str, content_id: &ContentId) {
        debug!(entity, content_id = %content_id, "no scanner configured, scan skipped");
    }
}

/// A queued scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Attachment entity name.
    pub entity: String,
    /// Content to scan.
    pub content_id: ContentId,
}

/// Scanner that hands requests to a background worker over a channel.
#[derive(Debug, Clone)]
pub struct ScanQueue {
    sender: mpsc::UnboundedSender<ScanRequest>,
}

impl ScanQueue {
    /// Create a queue and the receiver a scan worker consumes.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Scanner for ScanQueue {
    fn scan_async(&self, entity: &str, content_id: &ContentId) {
        let request = ScanRequest {
            entity: entity.to_string(),
            content_id: content_id.clone(),
        };
        if self.sender.send(request).is_err() {
            warn!(entity, content_id = %content_id, "scan worker is gone, scan request dropped");
        }
    }
}
