//! Create stages: key assignment, media type checks and uploads.

use std::collections::HashSet;

use tracing::{debug, info};
use uuid::Uuid;

use super::{AttachmentService, ResolvedPath, WriteRequest};
use crate::attachment::{AttachmentError, EntityStore, ReadonlyFields, ScanStatus};
use crate::content::SizeGuard;
use crate::model::{EntityKey, Field, KeyValue, Row, Value, rows_at, rows_at_mut};
use crate::readonly::ReadonlyFieldPropagator;
use crate::storage::ContentStore;
use crate::transaction::TransactionContext;
use crate::validation::media_type::{DEFAULT_MEDIA_TYPE, validate_media_type};

impl<S, E> AttachmentService<S, E>
where
    S: ContentStore,
    E: EntityStore,
{
    /// Generate missing UUID keys on every row along the attachment paths,
    /// parents included.
    pub(super) fn assign_keys(request: &mut WriteRequest<'_>) {
        let mut assigned = 0usize;
        for path in &request.paths {
            let associations = path.associations();
            for (depth, generated) in path.generated_keys.iter().enumerate() {
                if generated.is_empty() {
                    continue;
                }
                for row in rows_at_mut(request.rows, &associations[..depth]) {
                    for key in generated {
                        if matches!(row.get(key), None | Some(Value::Null)) {
                            row.insert(key.clone(), Value::Uuid(Uuid::new_v4()));
                            assigned += 1;
                        }
                    }
                }
            }
        }
        if assigned > 0 {
            debug!(entity = %request.entity.name, assigned, "generated missing keys");
        }
    }

    /// Derive the media type of every incoming content and check it against
    /// the accepted types. Fills `mimeType` where the caller left it out.
    pub(super) fn validate_media_types(
        request: &mut WriteRequest<'_>,
    ) -> Result<(), AttachmentError> {
        for path in &request.paths {
            for row in rows_at_mut(request.rows, &path.associations()) {
                if !matches!(row.attachment.content, Field::Value(_)) {
                    continue;
                }
                let file_name = row.attachment.file_name.value().map(String::as_str);
                let mime_type = validate_media_type(file_name, path.media_types.as_deref())?;
                if row.attachment.mime_type.value().is_none() {
                    row.attachment.mime_type = Field::Value(mime_type);
                }
            }
        }
        Ok(())
    }

    /// Upload the content of every attachment row that carries some.
    pub(super) async fn upload_content(
        &self,
        request: &mut WriteRequest<'_>,
    ) -> Result<(), AttachmentError> {
        let guards = self.check_uploads(request)?;
        for (path, guard) in request.paths.iter().zip(guards) {
            for row in rows_at_mut(request.rows, &path.associations()) {
                if matches!(row.attachment.content, Field::Value(_)) {
                    self.upload_row(request.tx, path, guard.limit(), row).await?;
                }
            }
        }
        Ok(())
    }

    /// Checks run before the first upload of a request: one size guard per
    /// path, the declared request length, and one upload per attachment key.
    pub(super) fn check_uploads(
        &self,
        request: &WriteRequest<'_>,
    ) -> Result<Vec<SizeGuard>, AttachmentError> {
        let mut guards = Vec::with_capacity(request.paths.len());
        for path in &request.paths {
            let guard =
                SizeGuard::resolve(path.max_size.as_deref(), &self.settings.default_max_size)?;
            let mut seen: HashSet<EntityKey> = HashSet::new();
            let mut uploads = 0usize;
            for row in rows_at(request.rows, &path.associations()) {
                if !matches!(row.attachment.content, Field::Value(_)) {
                    continue;
                }
                uploads += 1;
                let key = row.key(path.target_keys());
                if !key.is_empty() && !seen.insert(key.clone()) {
                    return Err(AttachmentError::bad_request(format!(
                        "attachment {key} of '{}' appears more than once",
                        path.path
                    )));
                }
            }
            if uploads > 0 {
                guard.check_declared_length(request.ctx.declared_length.as_deref())?;
            }
            guards.push(guard);
        }
        Ok(guards)
    }

    /// Stream the content of `row` to the store and record the new id.
    ///
    /// On failure no content id is set on the row.
    pub(super) async fn upload_row(
        &self,
        tx: &mut TransactionContext,
        path: &ResolvedPath,
        limit: u64,
        row: &mut Row,
    ) -> Result<(), AttachmentError> {
        let Field::Value(content) = row.attachment.content.take() else {
            return Ok(());
        };
        let file_name = row.attachment.file_name.value().cloned().unwrap_or_default();
        let mime_type = row
            .attachment
            .mime_type
            .value()
            .cloned()
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

        let guard = SizeGuard::new(limit);
        let content_id = self
            .store
            .upload(guard.wrap(content), &file_name, &mime_type)
            .await
            .map_err(|e| guard.classify(e.into()))?;
        if content_id.is_blank() {
            return Err(AttachmentError::store_failure(
                "content store returned a blank content id",
            ));
        }

        let key = row.key(path.target_keys());
        info!(
            entity = path.target(),
            key = %key,
            content_id = %content_id,
            bytes = guard.bytes_read(),
            "attachment content stored"
        );

        row.attachment.content_id = Field::Value(content_id.clone());
        row.attachment.status = Field::Value(ScanStatus::Unscanned);
        row.attachment.scanned_at = Field::Null;

        tx.record_upload(path.target(), content_id, self.settings.scan_on_upload);
        ReadonlyFieldPropagator::register(tx, path.target(), &key, ReadonlyFieldPropagator::capture(row));
        Ok(())
    }
}

/// Whether `row` is the payload row of `key`: every key component the row
/// carries matches, and it carries at least one.
pub(super) fn row_matches_key(row: &Row, key: &EntityKey, key_names: &[String]) -> bool {
    let mut compared = false;
    for name in key_names {
        let Some(value) = row.get(name).and_then(KeyValue::from_value) else {
            continue;
        };
        if key.get(name) != Some(&value) {
            return false;
        }
        compared = true;
    }
    compared
}

/// Fields written when content is removed from a row.
pub(super) fn cleared_row(row: &mut Row) -> ReadonlyFields {
    row.attachment.content_id = Field::Null;
    row.attachment.status = Field::Null;
    row.attachment.scanned_at = Field::Null;
    ReadonlyFields::cleared()
}
