//! Deferred work of one unit of work.
//!
//! The interceptors queue read-only metadata writes and content deletes here.
//! Read-only fields are written by [`TransactionContext::before_close`] while
//! the host's transaction is still open, so a failed write aborts it. Content
//! is deleted only by [`TransactionContext::commit`], once the host committed.
//! [`TransactionContext::rollback`] removes the uploads instead.

use std::collections::{BTreeMap, HashSet};

use attachments_shared::ContentId;
use tracing::{debug, info, warn};

use crate::attachment::{AttachmentError, EntityStore, ReadonlyFields, ScanRequest, Scanner};
use crate::model::EntityKey;
use crate::storage::ContentStore;

/// One deferred action.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWork {
    /// Remove content from the store.
    DeleteContent {
        /// Content to remove.
        content_id: ContentId,
    },
    /// Write read-only attachment fields of one row.
    PersistReadonlyFields {
        /// Attachment entity name.
        entity: String,
        /// Row key.
        key: EntityKey,
        /// Fields to write.
        fields: ReadonlyFields,
    },
}

/// Outcome of a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Rows whose read-only fields were written late, at commit.
    pub persisted: usize,
    /// Late read-only field writes that failed and were only logged.
    pub failed_writes: usize,
    /// Content removed from the store.
    pub deleted: usize,
    /// Deletes that failed and were only logged.
    pub failed_deletes: usize,
    /// Scan requests dispatched.
    pub scans: usize,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    /// Queued actions dropped.
    pub discarded: usize,
    /// Uploads removed again.
    pub compensated: usize,
    /// Compensating deletes that failed.
    pub failed: usize,
}

/// Deferred work and compensation state of one host transaction.
#[derive(Debug, Default)]
pub struct TransactionContext {
    deletes: Vec<ContentId>,
    readonly: BTreeMap<(String, EntityKey), ReadonlyFields>,
    uploads: Vec<ContentId>,
    eagerly_deleted: HashSet<ContentId>,
    scans: Vec<ScanRequest>,
}

impl TransactionContext {
    /// Empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue removal of `content_id` on commit.
    ///
    /// Returns `false` when the id is blank, already queued, or already
    /// removed during this transaction.
    pub fn defer_delete(&mut self, content_id: ContentId) -> bool {
        if content_id.is_blank()
            || self.eagerly_deleted.contains(&content_id)
            || self.deletes.contains(&content_id)
        {
            debug!(content_id = %content_id, "content delete already handled, skipped");
            return false;
        }
        self.deletes.push(content_id);
        true
    }

    /// Queue a read-only field write on commit, merged with earlier writes
    /// for the same row.
    pub fn defer_readonly(&mut self, entity: &str, key: EntityKey, fields: ReadonlyFields) {
        if fields.is_empty() {
            return;
        }
        self.readonly
            .entry((entity.to_string(), key))
            .or_default()
            .merge(fields);
    }

    /// Remember content uploaded in this transaction, for compensation and,
    /// when `scan` is set, a scan request on commit.
    pub fn record_upload(&mut self, entity: &str, content_id: ContentId, scan: bool) {
        if scan {
            self.scans.push(ScanRequest {
                entity: entity.to_string(),
                content_id: content_id.clone(),
            });
        }
        self.uploads.push(content_id);
    }

    /// Remember content already removed during this transaction.
    pub fn record_eager_delete(&mut self, content_id: ContentId) {
        self.deletes.retain(|queued| queued != &content_id);
        self.eagerly_deleted.insert(content_id);
    }

    /// Content ids uploaded in this transaction.
    #[must_use]
    pub fn uploads(&self) -> &[ContentId] {
        &self.uploads
    }

    /// Whether `content_id` is queued for removal.
    #[must_use]
    pub fn is_delete_pending(&self, content_id: &ContentId) -> bool {
        self.deletes.contains(content_id)
    }

    /// Queued actions in execution order.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingWork> {
        self.readonly
            .iter()
            .map(|((entity, key), fields)| PendingWork::PersistReadonlyFields {
                entity: entity.clone(),
                key: key.clone(),
                fields: fields.clone(),
            })
            .chain(self.deletes.iter().map(|content_id| PendingWork::DeleteContent {
                content_id: content_id.clone(),
            }))
            .collect()
    }

    /// Whether nothing is queued or recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
            && self.readonly.is_empty()
            && self.uploads.is_empty()
            && self.scans.is_empty()
    }

    /// Write the queued read-only fields while the host transaction is open.
    ///
    /// Returns the number of rows written. A write that fails stays queued,
    /// so a following [`rollback`](Self::rollback) accounts for it.
    ///
    /// # Errors
    ///
    /// Returns the repository error of the first failed write. The host must
    /// then roll back.
    pub async fn before_close<E>(&mut self, entities: &E) -> Result<usize, AttachmentError>
    where
        E: EntityStore,
    {
        let mut persisted = 0;
        while let Some(((entity, key), fields)) = self.readonly.pop_first() {
            if let Err(e) = entities.update_readonly_fields(&entity, &key, &fields).await {
                warn!(entity = %entity, key = %key, error = %e, "read-only field write failed, transaction must roll back");
                self.readonly.insert((entity, key), fields);
                return Err(e);
            }
            persisted += 1;
        }
        if persisted > 0 {
            debug!(persisted, "read-only fields written before close");
        }
        Ok(persisted)
    }

    /// Run the queued work after the host transaction committed.
    ///
    /// Read-only fields not yet written by [`before_close`](Self::before_close)
    /// are written first. Content referenced by committed rows is never
    /// removed here, so write failures are only logged. Deferred deletes then
    /// run, failures logged as well. Scan requests are dispatched last.
    pub async fn commit<S, E>(self, store: &S, entities: &E, scanner: &dyn Scanner) -> CommitSummary
    where
        S: ContentStore,
        E: EntityStore,
    {
        let mut summary = CommitSummary::default();

        for ((entity, key), fields) in &self.readonly {
            match entities.update_readonly_fields(entity, key, fields).await {
                Ok(()) => summary.persisted += 1,
                Err(e) => {
                    summary.failed_writes += 1;
                    warn!(entity = %entity, key = %key, error = %e, "late read-only field write failed");
                }
            }
        }

        for content_id in &self.deletes {
            match store.delete(content_id).await {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    summary.failed_deletes += 1;
                    warn!(content_id = %content_id, error = %e, "deferred content delete failed");
                }
            }
        }

        for request in &self.scans {
            scanner.scan_async(&request.entity, &request.content_id);
            summary.scans += 1;
        }

        info!(
            persisted = summary.persisted,
            failed_writes = summary.failed_writes,
            deleted = summary.deleted,
            failed_deletes = summary.failed_deletes,
            scans = summary.scans,
            "attachment work committed"
        );
        summary
    }

    /// Drop the queued work and remove content uploaded in this transaction.
    pub async fn rollback<S>(self, store: &S) -> RollbackSummary
    where
        S: ContentStore,
    {
        let discarded = self.deletes.len() + self.readonly.len();
        let failed = compensate(store, &self.uploads).await;
        let summary = RollbackSummary {
            discarded,
            compensated: self.uploads.len() - failed,
            failed,
        };
        info!(
            discarded = summary.discarded,
            compensated = summary.compensated,
            failed = summary.failed,
            "attachment work rolled back"
        );
        summary
    }
}

/// Delete `uploads`, returning the number of failures.
async fn compensate<S: ContentStore>(store: &S, uploads: &[ContentId]) -> usize {
    let mut failed = 0;
    for content_id in uploads {
        if let Err(e) = store.delete(content_id).await {
            failed += 1;
            warn!(content_id = %content_id, error = %e, "compensating content delete failed");
        }
    }
    failed
}
