//! Read-only attachment metadata hand-off.
//!
//! `contentId`, `status` and `scannedAt` are never taken from callers. During
//! a draft edit the values computed by this crate are parked in the row's
//! side-channel and removed from the row, so the host does not write them to
//! the draft. On activation they are put back and queued for persistence.

use tracing::debug;

use crate::attachment::{DraftMode, ReadonlyFields};
use crate::model::{EntityKey, Field, Row};
use crate::transaction::TransactionContext;

/// Moves read-only fields between a row, its side-channel and the
/// transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadonlyFieldPropagator;

impl ReadonlyFieldPropagator {
    /// Read-only fields currently set on `row`.
    #[must_use]
    pub fn capture(row: &Row) -> ReadonlyFields {
        ReadonlyFields {
            content_id: row.attachment.content_id.clone(),
            status: row.attachment.status.clone(),
            scanned_at: row.attachment.scanned_at.clone(),
        }
    }

    /// Park the read-only fields of `row` in its side-channel and clear them
    /// from the row. Returns whether anything was parked.
    pub fn stash(row: &mut Row) -> bool {
        let captured = Self::capture(row);
        if captured.is_empty() {
            return false;
        }
        row.readonly_stash
            .get_or_insert_with(ReadonlyFields::default)
            .merge(captured);
        row.attachment.content_id = Field::Missing;
        row.attachment.status = Field::Missing;
        row.attachment.scanned_at = Field::Missing;
        true
    }

    /// Put parked fields back onto `row` and drop the side-channel.
    ///
    /// Returns the restored fields, if any were parked.
    pub fn restore(row: &mut Row) -> Option<ReadonlyFields> {
        let parked = row.readonly_stash.take()?;
        if !parked.content_id.is_missing() {
            row.attachment.content_id = parked.content_id.clone();
        }
        if !parked.status.is_missing() {
            row.attachment.status = parked.status.clone();
        }
        if !parked.scanned_at.is_missing() {
            row.attachment.scanned_at = parked.scanned_at.clone();
        }
        Some(parked)
    }

    /// Queue a write of `fields` for the row identified by `key`.
    pub fn register(
        tx: &mut TransactionContext,
        entity: &str,
        key: &EntityKey,
        fields: ReadonlyFields,
    ) {
        if key.is_empty() {
            debug!(entity, "row without key, read-only fields not queued");
            return;
        }
        tx.defer_readonly(entity, key.clone(), fields);
    }

    /// Restore parked fields when activating a draft and queue their write.
    pub fn restore_for(
        draft: DraftMode,
        tx: &mut TransactionContext,
        entity: &str,
        key: &EntityKey,
        row: &mut Row,
    ) {
        if draft != DraftMode::Activate {
            return;
        }
        if let Some(fields) = Self::restore(row) {
            Self::register(tx, entity, key, fields);
        }
    }

    /// Park read-only fields when editing a draft.
    pub fn stash_for(draft: DraftMode, row: &mut Row) {
        if draft == DraftMode::Edit {
            Self::stash(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use attachments_shared::ContentId;

    use super::*;
    use crate::attachment::ScanStatus;
    use crate::transaction::PendingWork;

    fn uploaded_row() -> Row {
        let mut row = Row::new();
        row.attachment.content_id = Field::Value(ContentId::new("c1"));
        row.attachment.status = Field::Value(ScanStatus::Unscanned);
        row
    }

    #[test]
    fn test_stash_then_restore_round_trips() {
        let mut row = uploaded_row();
        assert!(ReadonlyFieldPropagator::stash(&mut row));
        assert!(row.attachment.content_id.is_missing());
        assert!(row.attachment.status.is_missing());
        assert!(row.readonly_stash.is_some());

        let restored = ReadonlyFieldPropagator::restore(&mut row).unwrap();
        assert_eq!(restored.content_id, Field::Value(ContentId::new("c1")));
        assert_eq!(row.attachment.content_id, Field::Value(ContentId::new("c1")));
        assert_eq!(row.attachment.status, Field::Value(ScanStatus::Unscanned));
        assert!(row.attachment.scanned_at.is_missing());
        assert!(row.readonly_stash.is_none());
    }

    #[test]
    fn test_stash_without_fields_is_noop() {
        let mut row = Row::new();
        assert!(!ReadonlyFieldPropagator::stash(&mut row));
        assert!(row.readonly_stash.is_none());
        assert!(ReadonlyFieldPropagator::restore(&mut row).is_none());
    }

    #[test]
    fn test_repeated_edits_keep_latest_values() {
        let mut row = uploaded_row();
        ReadonlyFieldPropagator::stash(&mut row);
        row.attachment.content_id = Field::Value(ContentId::new("c2"));
        ReadonlyFieldPropagator::stash(&mut row);

        let parked = row.readonly_stash.as_ref().unwrap();
        assert_eq!(parked.content_id, Field::Value(ContentId::new("c2")));
        assert_eq!(parked.status, Field::Value(ScanStatus::Unscanned));
    }

    #[test]
    fn test_activation_restores_and_registers() {
        let key = EntityKey::new().with("ID", 1_i64);
        let mut row = uploaded_row();
        let mut tx = TransactionContext::new();

        ReadonlyFieldPropagator::stash_for(DraftMode::Edit, &mut row);
        ReadonlyFieldPropagator::restore_for(DraftMode::Edit, &mut tx, "Attachments", &key, &mut row);
        assert!(tx.pending().is_empty());

        ReadonlyFieldPropagator::restore_for(
            DraftMode::Activate,
            &mut tx,
            "Attachments",
            &key,
            &mut row,
        );
        assert!(matches!(
            tx.pending().as_slice(),
            [PendingWork::PersistReadonlyFields { entity, .. }] if entity == "Attachments"
        ));
        assert_eq!(row.attachment.content_id, Field::Value(ContentId::new("c1")));
    }

    #[test]
    fn test_register_skips_keyless_rows() {
        let mut tx = TransactionContext::new();
        ReadonlyFieldPropagator::register(
            &mut tx,
            "Attachments",
            &EntityKey::new(),
            ReadonlyFieldPropagator::capture(&uploaded_row()),
        );
        assert!(tx.pending().is_empty());
    }
}
