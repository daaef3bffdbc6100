//! CRUD interceptors for entities owning attachments.
//!
//! [`AttachmentService`] is the single entry point for the host. It runs the
//! stage list of [`pipeline::stages`] for each operation:
//! - `before_create` / `before_update` stream content to the store and queue
//!   deferred work on the [`TransactionContext`]
//! - `before_delete` queues removal of content owned by deleted rows
//! - `before_read` / `after_read` extend the selection and hand out lazy,
//!   scan-gated content
//!
//! The host calls [`AttachmentService::before_close`] after its own writes,
//! while its transaction is still open, and then
//! [`AttachmentService::commit`] or [`AttachmentService::rollback`] once the
//! transaction is decided.

mod create;
mod delete;
pub mod pipeline;
mod read;
mod update;

use std::sync::Arc;

use attachments_shared::AttachmentSettings;
use tracing::debug;

use crate::attachment::{
    AttachmentError, AttachmentSnapshot, EntityStore, RequestContext, Scanner,
};
use crate::model::{ElementKind, EntityDefinition, EntityKey, Row, SchemaModel, Select, rows_at_mut};
use crate::readonly::ReadonlyFieldPropagator;
use crate::schema::{ContentFieldLocator, LocateMode, PathCache, SchemaPath};
use crate::storage::ContentStore;
use crate::transaction::{CommitSummary, RollbackSummary, TransactionContext};
use crate::validation::{CountMode, CountValidator};
use pipeline::{Operation, Phase, Stage, stages};

/// Attachment path with the schema facts the interceptors need.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPath {
    pub(crate) path: SchemaPath,
    /// Key element names per segment, root first.
    pub(crate) keys: Vec<Vec<String>>,
    /// UUID key element names per segment, root first.
    pub(crate) generated_keys: Vec<Vec<String>>,
    pub(crate) max_size: Option<String>,
    pub(crate) media_types: Option<Vec<String>>,
}

impl ResolvedPath {
    pub(crate) fn target(&self) -> &str {
        self.path.target()
    }

    pub(crate) fn associations(&self) -> Vec<&str> {
        self.path.associations()
    }

    pub(crate) fn target_keys(&self) -> &[String] {
        self.keys.last().map_or(&[][..], Vec::as_slice)
    }
}

/// Per-request state threaded through the write stages.
pub(crate) struct WriteRequest<'r> {
    pub(crate) operation: Operation,
    pub(crate) entity: &'r EntityDefinition,
    pub(crate) ctx: &'r RequestContext,
    pub(crate) rows: &'r mut [Row],
    pub(crate) tx: &'r mut TransactionContext,
    pub(crate) paths: Vec<ResolvedPath>,
    /// Stored attachments per path, fetched by the update stages.
    pub(crate) snapshots: Vec<Vec<AttachmentSnapshot>>,
}

/// Runs the attachment stages around the host's CRUD operations.
pub struct AttachmentService<S, E> {
    pub(crate) store: Arc<S>,
    pub(crate) entities: Arc<E>,
    pub(crate) scanner: Arc<dyn Scanner>,
    pub(crate) schema: Arc<dyn SchemaModel>,
    pub(crate) paths: PathCache,
    pub(crate) settings: AttachmentSettings,
}

impl<S, E> Clone for AttachmentService<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            entities: Arc::clone(&self.entities),
            scanner: Arc::clone(&self.scanner),
            schema: Arc::clone(&self.schema),
            paths: self.paths.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S, E> AttachmentService<S, E>
where
    S: ContentStore,
    E: EntityStore,
{
    /// Create a service over the host's collaborators.
    pub fn new(
        schema: Arc<dyn SchemaModel>,
        store: Arc<S>,
        entities: Arc<E>,
        scanner: Arc<dyn Scanner>,
        settings: AttachmentSettings,
    ) -> Self {
        Self {
            store,
            entities,
            scanner,
            schema,
            paths: PathCache::new(),
            settings,
        }
    }

    /// The content store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Attachment paths reachable from `root`.
    #[must_use]
    pub fn attachment_paths(&self, root: &str) -> Arc<[SchemaPath]> {
        self.paths.paths(self.schema.as_ref(), root)
    }

    /// Run the create stages on `rows` of `entity`.
    ///
    /// # Errors
    ///
    /// Returns validation errors before any upload and store errors of the
    /// first failed upload.
    pub async fn before_create(
        &self,
        tx: &mut TransactionContext,
        ctx: &RequestContext,
        entity: &str,
        rows: &mut [Row],
    ) -> Result<(), AttachmentError> {
        self.run_write(Operation::Create, tx, ctx, entity, rows).await
    }

    /// Run the update stages on `rows` of `entity`.
    ///
    /// # Errors
    ///
    /// Returns validation errors before any upload, repository errors of the
    /// snapshot query and store errors of uploads and immediate deletes.
    pub async fn before_update(
        &self,
        tx: &mut TransactionContext,
        ctx: &RequestContext,
        entity: &str,
        rows: &mut [Row],
    ) -> Result<(), AttachmentError> {
        self.run_write(Operation::Update, tx, ctx, entity, rows).await
    }

    /// Queue removal of all content owned by the rows of `entity` with `keys`.
    ///
    /// Returns the number of content ids queued.
    ///
    /// # Errors
    ///
    /// Returns repository errors of the snapshot query.
    pub async fn before_delete(
        &self,
        tx: &mut TransactionContext,
        entity: &str,
        keys: &[EntityKey],
    ) -> Result<usize, AttachmentError> {
        let mut queued = 0;
        for stage in stages(Operation::Delete, Phase::Before) {
            debug!(entity, stage = %stage, "running attachment stage");
            if *stage == Stage::ScheduleContentDeletion {
                queued += self.schedule_content_deletion(tx, entity, keys).await?;
            }
        }
        Ok(queued)
    }

    /// Extend `select` so content reads carry their id and scan status.
    pub fn before_read(&self, entity: &str, select: &mut Select) {
        for stage in stages(Operation::Read, Phase::Before) {
            if *stage == Stage::ExtendSelection {
                self.extend_selection(entity, select);
            }
        }
    }

    /// Replace content in result `rows` with lazy, scan-gated proxies.
    ///
    /// # Errors
    ///
    /// Returns `AttachmentNotAccessible` for a direct content read of
    /// content that is not clean.
    pub fn after_read(&self, entity: &str, rows: &mut [Row]) -> Result<(), AttachmentError> {
        for stage in stages(Operation::Read, Phase::After) {
            if *stage == Stage::WrapContent {
                self.wrap_content(entity, rows)?;
            }
        }
        Ok(())
    }

    /// Write the queued read-only fields inside the host transaction.
    ///
    /// # Errors
    ///
    /// Returns the repository error of a failed write. The host must roll
    /// back its transaction and call [`rollback`](Self::rollback).
    pub async fn before_close(&self, tx: &mut TransactionContext) -> Result<usize, AttachmentError> {
        tx.before_close(self.entities.as_ref()).await
    }

    /// Run the deferred work of `tx` after the host committed.
    pub async fn commit(&self, tx: TransactionContext) -> CommitSummary {
        tx.commit(self.store.as_ref(), self.entities.as_ref(), self.scanner.as_ref())
            .await
    }

    /// Discard the deferred work of `tx` and remove its uploads.
    pub async fn rollback(&self, tx: TransactionContext) -> RollbackSummary {
        tx.rollback(self.store.as_ref()).await
    }

    /// Attachment paths of `root` with usable content fields.
    ///
    /// Write operations only follow compositions; reads follow every
    /// association.
    pub(crate) fn resolve_paths(&self, root: &str, cascading_only: bool) -> Vec<ResolvedPath> {
        let locator = ContentFieldLocator::new(self.schema.as_ref());
        self.attachment_paths(root)
            .iter()
            .filter(|path| !cascading_only || path.is_cascading())
            .filter(|path| locator.field_names(path).is_some())
            .filter_map(|path| self.resolve(path))
            .collect()
    }

    fn resolve(&self, path: &SchemaPath) -> Option<ResolvedPath> {
        let mut keys = Vec::with_capacity(path.segments().len());
        let mut generated_keys = Vec::with_capacity(path.segments().len());
        for segment in path.segments() {
            let entity = self.schema.entity(&segment.target)?;
            keys.push(entity.keys.clone());
            generated_keys.push(entity.uuid_keys().map(String::from).collect());
        }
        let target = self.schema.entity(path.target())?;
        let (max_size, media_types) = match target.content_element().map(|e| &e.kind) {
            Some(ElementKind::Content {
                max_size,
                acceptable_media_types,
            }) => (max_size.clone(), acceptable_media_types.clone()),
            _ => (None, None),
        };
        Some(ResolvedPath {
            path: path.clone(),
            keys,
            generated_keys,
            max_size,
            media_types,
        })
    }

    async fn run_write(
        &self,
        operation: Operation,
        tx: &mut TransactionContext,
        ctx: &RequestContext,
        entity: &str,
        rows: &mut [Row],
    ) -> Result<(), AttachmentError> {
        let Some(definition) = self.schema.entity(entity) else {
            debug!(entity, "entity not in schema, attachment stages skipped");
            return Ok(());
        };
        let paths = self.resolve_paths(entity, true);
        let located: Vec<SchemaPath> = paths.iter().map(|p| p.path.clone()).collect();
        let mode = match operation {
            Operation::Update => LocateMode::ContentOrComposition,
            _ => LocateMode::Content,
        };
        let present = ContentFieldLocator::new(self.schema.as_ref())
            .locate(&located, rows, mode)
            .present;

        let mut request = WriteRequest {
            operation,
            entity: definition,
            ctx,
            rows,
            tx,
            paths,
            snapshots: Vec::new(),
        };

        for stage in stages(operation, Phase::Before) {
            if stage.needs_content() && !present {
                debug!(entity, stage = %stage, "no attachment data in payload, stage skipped");
                continue;
            }
            debug!(entity, stage = %stage, "running attachment stage");
            match stage {
                Stage::RestoreReadonly => Self::restore_readonly(&mut request),
                Stage::ValidateCounts => self.validate_counts(&request)?,
                Stage::AssignKeys => Self::assign_keys(&mut request),
                Stage::ValidateMediaTypes => Self::validate_media_types(&mut request)?,
                Stage::UploadContent => self.upload_content(&mut request).await?,
                Stage::ApplyContentChanges => self.apply_content_changes(&mut request).await?,
                Stage::StashReadonly => Self::stash_readonly(&mut request),
                Stage::ScheduleContentDeletion | Stage::ExtendSelection | Stage::WrapContent => {}
            }
        }
        Ok(())
    }

    fn restore_readonly(request: &mut WriteRequest<'_>) {
        let draft = request.ctx.draft;
        for path in &request.paths {
            for row in rows_at_mut(request.rows, &path.associations()) {
                let key = row.key(path.target_keys());
                ReadonlyFieldPropagator::restore_for(draft, request.tx, path.target(), &key, row);
            }
        }
    }

    fn validate_counts(&self, request: &WriteRequest<'_>) -> Result<(), AttachmentError> {
        let mode = match request.operation {
            Operation::Update => CountMode::for_update(request.ctx.draft),
            _ => CountMode::for_create(request.ctx.draft),
        };
        CountValidator::new(self.schema.as_ref()).validate(
            &request.entity.name,
            request.rows,
            mode,
        )
    }

    fn stash_readonly(request: &mut WriteRequest<'_>) {
        let draft = request.ctx.draft;
        for path in &request.paths {
            for row in rows_at_mut(request.rows, &path.associations()) {
                ReadonlyFieldPropagator::stash_for(draft, row);
            }
        }
    }
}
