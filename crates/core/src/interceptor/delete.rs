//! Delete stage: queue removal of content owned by deleted rows.

use tracing::{debug, info};

use super::AttachmentService;
use crate::attachment::{AttachmentError, EntityStore};
use crate::model::EntityKey;
use crate::storage::ContentStore;
use crate::transaction::TransactionContext;

impl<S, E> AttachmentService<S, E>
where
    S: ContentStore,
    E: EntityStore,
{
    /// Defer `DeleteContent` for every stored attachment under the rows of
    /// `entity` with `keys`. No content is read.
    pub(super) async fn schedule_content_deletion(
        &self,
        tx: &mut TransactionContext,
        entity: &str,
        keys: &[EntityKey],
    ) -> Result<usize, AttachmentError> {
        let keys: Vec<EntityKey> = keys.iter().filter(|k| !k.is_empty()).cloned().collect();
        if keys.is_empty() {
            debug!(entity, "delete without keys, nothing to schedule");
            return Ok(0);
        }

        let mut queued = 0;
        for path in self.resolve_paths(entity, true) {
            let snapshots = self
                .entities
                .select_attachments(entity, &path.path, &keys)
                .await?;
            for content_id in snapshots.into_iter().filter_map(|s| s.content_id) {
                if tx.defer_delete(content_id) {
                    queued += 1;
                }
            }
        }
        if queued > 0 {
            info!(entity, rows = keys.len(), queued, "attachment content scheduled for removal");
        }
        Ok(queued)
    }
}
