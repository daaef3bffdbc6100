//! Read stages: selection rewrite and lazy content wrapping.

use std::sync::Arc;

use tracing::debug;

use super::AttachmentService;
use crate::attachment::{AttachmentError, EntityStore, ScanStatus};
use crate::content::{LazyContent, verify_status};
use crate::model::{
    Field, Row, Select, SelectItem, expanded_mut, names, rows_at_mut, selects_all, selects_column,
};
use crate::storage::ContentStore;

impl<S, E> AttachmentService<S, E>
where
    S: ContentStore,
    E: EntityStore,
{
    pub(super) fn extend_selection(&self, entity: &str, select: &mut Select) {
        for path in self.resolve_paths(entity, false) {
            let Some(items) = level_mut(&mut select.items, &path.associations()) else {
                continue;
            };
            if selects_all(items) {
                continue;
            }
            if selects_column(items, names::CONTENT_ID) {
                ensure_column(items, names::STATUS);
            } else if selects_column(items, names::CONTENT) {
                ensure_column(items, names::CONTENT_ID);
                ensure_column(items, names::STATUS);
                debug!(path = %path.path, "content id and status added to selection");
            }
        }
    }

    pub(super) fn wrap_content(&self, entity: &str, rows: &mut [Row]) -> Result<(), AttachmentError> {
        for path in self.resolve_paths(entity, false) {
            for row in rows_at_mut(rows, &path.associations()) {
                if row.attachment.content.is_missing() {
                    continue;
                }
                let Some(content_id) = row
                    .attachment
                    .content_id
                    .value()
                    .filter(|id| !id.is_blank())
                    .cloned()
                else {
                    row.attachment.content = Field::Null;
                    continue;
                };
                let status = row.attachment.status.value().copied();

                if row.key(path.target_keys()).is_empty() {
                    if ScanStatus::needs_scan(status) {
                        self.scanner.scan_async(path.target(), &content_id);
                    }
                    verify_status(status)?;
                }

                let store = Arc::clone(&self.store);
                let lazy = LazyContent::new(status, move || async move {
                    store.read(&content_id).await.map_err(AttachmentError::from)
                });
                row.attachment.content = Field::Value(lazy.into_content());
            }
        }
        Ok(())
    }
}

/// Selection items at the end of `associations`, if every step is expanded.
fn level_mut<'s>(
    items: &'s mut Vec<SelectItem>,
    associations: &[&str],
) -> Option<&'s mut Vec<SelectItem>> {
    match associations.split_first() {
        None => Some(items),
        Some((first, rest)) => level_mut(expanded_mut(items, first)?, rest),
    }
}

fn ensure_column(items: &mut Vec<SelectItem>, column: &str) {
    if !selects_column(items, column) {
        items.push(SelectItem::Column(column.to_string()));
    }
}
