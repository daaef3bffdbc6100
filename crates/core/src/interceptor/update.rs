//! Update stage: create, replace and remove content against stored state.

use std::collections::HashSet;

use attachments_shared::{ContentId, RemovalTiming};
use tracing::{debug, info};

use super::create::{cleared_row, row_matches_key};
use super::{AttachmentService, ResolvedPath, WriteRequest};
use crate::attachment::{AttachmentError, AttachmentSnapshot, EntityStore};
use crate::model::{EntityKey, Field, Row, rows_at_mut};
use crate::readonly::ReadonlyFieldPropagator;
use crate::storage::ContentStore;
use crate::transaction::TransactionContext;

/// Where a stored attachment stands relative to the update payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    /// The payload still carries the row.
    Present,
    /// A composition on the way is in the payload without the row.
    Removed,
    /// The payload says nothing about the row.
    Untouched,
}

impl<S, E> AttachmentService<S, E>
where
    S: ContentStore,
    E: EntityStore,
{
    pub(super) async fn apply_content_changes(
        &self,
        request: &mut WriteRequest<'_>,
    ) -> Result<(), AttachmentError> {
        self.load_snapshots(request).await?;
        let guards = self.check_uploads(request)?;

        let mut handled: HashSet<ContentId> = HashSet::new();
        for ((path, snapshots), guard) in request
            .paths
            .iter()
            .zip(&request.snapshots)
            .zip(guards)
        {
            for row in rows_at_mut(request.rows, &path.associations()) {
                if row.attachment.content.is_missing() {
                    continue;
                }
                let existing = snapshots
                    .iter()
                    .find(|snap| row_matches_key(row, &snap.key, path.target_keys()))
                    .and_then(|snap| snap.content_id.clone())
                    .filter(|id| !id.is_blank());

                if matches!(row.attachment.content, Field::Value(_)) {
                    self.upload_row(request.tx, path, guard.limit(), row).await?;
                    if let Some(old) = existing {
                        debug!(entity = path.target(), content_id = %old, "replaced content queued for removal");
                        request.tx.defer_delete(old.clone());
                        handled.insert(old);
                    }
                } else if let Some(old) = existing {
                    if row.attachment.content_id.value() == Some(&old) {
                        debug!(entity = path.target(), content_id = %old, "content id unchanged, nothing to remove");
                        handled.insert(old);
                        continue;
                    }
                    handled.insert(old.clone());
                    self.remove_content(request.tx, path.target(), old, self.settings.explicit_removal)
                        .await?;
                    let key = row.key(path.target_keys());
                    let fields = cleared_row(row);
                    ReadonlyFieldPropagator::register(request.tx, path.target(), &key, fields);
                }
            }
        }

        for (path, snapshots) in request.paths.iter().zip(&request.snapshots) {
            for snap in snapshots {
                let Some(content_id) = snap.content_id.clone().filter(|id| !id.is_blank()) else {
                    continue;
                };
                if handled.contains(&content_id) {
                    continue;
                }
                if membership(request.rows, path, snap) == Membership::Removed {
                    debug!(entity = path.target(), key = %snap.key, "attachment left its composition");
                    handled.insert(content_id.clone());
                    self.remove_content(
                        request.tx,
                        path.target(),
                        content_id,
                        self.settings.composition_removal,
                    )
                    .await?;
                }
            }
        }
        Ok(())
    }

    /// Fetch the stored attachments of every path for the payload's root rows.
    async fn load_snapshots(&self, request: &mut WriteRequest<'_>) -> Result<(), AttachmentError> {
        let mut snapshots = Vec::with_capacity(request.paths.len());
        for path in &request.paths {
            let root_keys: Vec<EntityKey> = request
                .rows
                .iter()
                .map(|row| row.key(path.keys.first().map_or(&[][..], Vec::as_slice)))
                .filter(|key| !key.is_empty())
                .collect();
            if root_keys.is_empty() {
                snapshots.push(Vec::new());
                continue;
            }
            let found = self
                .entities
                .select_attachments(&request.entity.name, &path.path, &root_keys)
                .await?;
            debug!(path = %path.path, snapshots = found.len(), "loaded stored attachments");
            snapshots.push(found);
        }
        request.snapshots = snapshots;
        Ok(())
    }

    /// Delete `content_id` now or queue it for commit.
    async fn remove_content(
        &self,
        tx: &mut TransactionContext,
        entity: &str,
        content_id: ContentId,
        timing: RemovalTiming,
    ) -> Result<(), AttachmentError> {
        match timing {
            RemovalTiming::Immediate => {
                self.store.delete(&content_id).await?;
                info!(entity, content_id = %content_id, "attachment content removed");
                tx.record_eager_delete(content_id);
            }
            RemovalTiming::OnCommit => {
                tx.defer_delete(content_id);
            }
        }
        Ok(())
    }
}

/// Follow the lineage of `snap` through the payload.
fn membership(rows: &[Row], path: &ResolvedPath, snap: &AttachmentSnapshot) -> Membership {
    let associations = path.associations();
    let chain: Vec<&EntityKey> = snap.lineage.iter().chain(std::iter::once(&snap.key)).collect();
    if chain.len() != path.keys.len() {
        return Membership::Untouched;
    }

    let root_names = path.keys.first().map_or(&[][..], Vec::as_slice);
    let Some(mut current) = rows.iter().find(|row| row_matches_key(row, chain[0], root_names)) else {
        return Membership::Untouched;
    };
    for (depth, association) in associations.iter().enumerate() {
        let Some(children) = current.children(association) else {
            return Membership::Untouched;
        };
        let names = &path.keys[depth + 1];
        match children
            .iter()
            .find(|child| row_matches_key(child, chain[depth + 1], names))
        {
            Some(child) => current = child,
            None => return Membership::Removed,
        }
    }
    Membership::Present
}
