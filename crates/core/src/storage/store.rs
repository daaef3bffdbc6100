//! Content store contract.

use std::future::Future;

use attachments_shared::ContentId;

use super::error::StorageError;
use crate::content::Content;

/// Blob store holding attachment content.
///
/// Implementations are shared across requests and must tolerate concurrent
/// calls. Content is passed as a stream in both directions.
pub trait ContentStore: Send + Sync + 'static {
    /// Store `content` and return the id it can be read back with.
    fn upload(
        &self,
        content: Content,
        file_name: &str,
        mime_type: &str,
    ) -> impl Future<Output = Result<ContentId, StorageError>> + Send;

    /// Open stored content.
    fn read(&self, content_id: &ContentId)
    -> impl Future<Output = Result<Content, StorageError>> + Send;

    /// Remove stored content. Removing unknown content succeeds.
    fn delete(&self, content_id: &ContentId)
    -> impl Future<Output = Result<(), StorageError>> + Send;
}
