//! Create and read interceptor tests against the in-memory host.
//!
//! Covers streaming uploads, size and media type rejection, count bounds,
//! compensation of uploads and scan-gated reads.

#![allow(clippy::unwrap_used)]

mod common;

use attachments_core::model::{Select, SelectItem, names, rows_at_mut};
use attachments_core::{
    AttachmentError, Content, DraftMode, Field, RequestContext, Row, ScanStatus,
    TransactionContext,
};
use common::{
    CountingStore, content_id, create_committed, harness, id_row, key, order, read_all, upload,
};
use rstest::rstest;

#[tokio::test]
async fn test_create_uploads_and_sets_readonly_fields() {
    let h = harness();
    let mut rows = vec![order(vec![upload(100, "report.pdf", b"%PDF-1.7")])];
    let mut tx = TransactionContext::new();

    h.service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap();

    let attachment = &rows_at_mut(&mut rows, &["attachments"])[0].attachment;
    assert!(attachment.content.is_missing());
    assert_eq!(attachment.status, Field::Value(ScanStatus::Unscanned));
    assert_eq!(attachment.mime_type, Field::Value("application/pdf".to_string()));
    let id = attachment.content_id.value().cloned().unwrap();
    assert_eq!(tx.uploads(), std::slice::from_ref(&id));
    assert_eq!(CountingStore::count(&h.store.uploads), 1);
    assert_eq!(h.store.bytes(&id).await, b"%PDF-1.7");
}

#[tokio::test]
async fn test_create_assigns_missing_keys() {
    let h = harness();
    let attachment = Row::new()
        .with_file_name("a.txt")
        .with_content(Content::from_bytes("x"));
    let mut rows = vec![Row::new().with_children("attachments", vec![attachment])];
    let mut tx = TransactionContext::new();

    h.service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap();

    assert!(rows[0].get(names::ID).is_some());
    assert!(rows_at_mut(&mut rows, &["attachments"])[0].get(names::ID).is_some());
}

#[tokio::test]
async fn test_nested_create_read_after_clean_scan() {
    let h = harness();
    let item = id_row(10).with_children("attachments", vec![upload(200, "x.bin", b"X")]);
    create_committed(&h, vec![id_row(1).with_children("items", vec![item])]).await;

    let stored = h.entities.stored("ItemAttachments", &key(200)).unwrap();
    assert_eq!(stored.fields.status, Field::Value(ScanStatus::Unscanned));
    let id = stored.fields.content_id.value().cloned().unwrap();
    assert_eq!(h.scanner.requests(), vec![("ItemAttachments".to_string(), id)]);

    h.entities.set_status("ItemAttachments", &key(200), ScanStatus::Clean);
    let result = h.entities.result_row("ItemAttachments", &key(200));
    let item = id_row(10).with_children("attachments", vec![result]);
    let mut rows = vec![id_row(1).with_children("items", vec![item])];
    h.service.after_read("Orders", &mut rows).unwrap();
    assert_eq!(CountingStore::count(&h.store.reads), 0);

    let content = rows_at_mut(&mut rows, &["items", "attachments"])[0]
        .attachment
        .content
        .take()
        .into_value()
        .unwrap();
    assert_eq!(read_all(content).await.unwrap(), b"X");
    assert_eq!(CountingStore::count(&h.store.reads), 1);
}

#[tokio::test]
async fn test_unscanned_content_is_not_released() {
    let h = harness();
    create_committed(&h, vec![order(vec![upload(100, "a.txt", b"data")])]).await;

    let mut rows = vec![order(vec![h.entities.result_row("Attachments", &key(100))])];
    h.service.after_read("Orders", &mut rows).unwrap();

    let content = rows_at_mut(&mut rows, &["attachments"])[0]
        .attachment
        .content
        .take()
        .into_value()
        .unwrap();
    let err = read_all(content).await.unwrap_err();
    assert!(matches!(
        err,
        AttachmentError::AttachmentNotAccessible {
            status: Some(ScanStatus::Unscanned)
        }
    ));
    assert_eq!(CountingStore::count(&h.store.reads), 0);
}

#[tokio::test]
async fn test_direct_read_requests_scan_and_fails_eagerly() {
    let h = harness();
    let rows = create_committed(&h, vec![order(vec![upload(100, "a.txt", b"data")])]).await;
    let id = content_id(&rows[0].children("attachments").unwrap()[0]);
    let scans_after_commit = h.scanner.requests().len();

    let mut direct = h.entities.result_row("Attachments", &key(100));
    direct.values.clear();
    let mut result = vec![direct];
    let err = h.service.after_read("Attachments", &mut result).unwrap_err();

    assert_eq!(err.error_code(), "ATTACHMENT_NOT_ACCESSIBLE");
    let requests = h.scanner.requests();
    assert_eq!(requests.len(), scans_after_commit + 1);
    assert_eq!(requests.last().unwrap().1, id);
}

#[tokio::test]
async fn test_direct_read_of_clean_content_skips_scan() {
    let h = harness();
    create_committed(&h, vec![order(vec![upload(100, "a.txt", b"data")])]).await;
    h.entities.set_status("Attachments", &key(100), ScanStatus::Clean);
    let scans = h.scanner.requests().len();

    let mut direct = h.entities.result_row("Attachments", &key(100));
    direct.values.clear();
    let mut result = vec![direct];
    h.service.after_read("Attachments", &mut result).unwrap();

    assert_eq!(h.scanner.requests().len(), scans);
    let content = result[0].attachment.content.take().into_value().unwrap();
    assert_eq!(read_all(content).await.unwrap(), b"data");
}

#[tokio::test]
async fn test_rows_without_content_id_get_null_content() {
    let h = harness();
    let mut row = id_row(100);
    row.attachment.content = Field::Null;
    let mut rows = vec![order(vec![row])];

    h.service.after_read("Orders", &mut rows).unwrap();

    assert!(rows_at_mut(&mut rows, &["attachments"])[0].attachment.content.is_null());
    assert_eq!(CountingStore::count(&h.store.reads), 0);
}

#[tokio::test]
async fn test_oversized_content_is_rejected() {
    let h = harness();
    let big = id_row(100)
        .with_file_name("big.txt")
        .with_content(Content::from_bytes(vec![b'a'; 4096]));
    let mut rows = vec![order(vec![big])];
    let mut tx = TransactionContext::new();

    let err = h
        .service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap_err();

    assert!(matches!(err, AttachmentError::ContentTooLarge { .. }));
    assert_eq!(err.status_code(), 413);
    let attachment = &rows_at_mut(&mut rows, &["attachments"])[0].attachment;
    assert!(attachment.content_id.value().is_none());
    assert!(tx.uploads().is_empty());
}

#[tokio::test]
async fn test_declared_length_rejects_before_streaming() {
    let h = harness();
    let mut rows = vec![order(vec![upload(100, "a.txt", b"small")])];
    let mut tx = TransactionContext::new();
    let ctx = RequestContext::new().with_declared_length("5000");

    let err = h
        .service
        .before_create(&mut tx, &ctx, "Orders", &mut rows)
        .await
        .unwrap_err();

    assert!(matches!(err, AttachmentError::ContentTooLarge { .. }));
    assert_eq!(CountingStore::count(&h.store.uploads), 0);
}

#[rstest]
#[case("report", "BAD_REQUEST")]
#[case("report.", "BAD_REQUEST")]
#[case("setup.exe", "UNSUPPORTED_MEDIA_TYPE")]
#[case("archive.zip", "UNSUPPORTED_MEDIA_TYPE")]
#[tokio::test]
async fn test_rejected_file_names(#[case] file_name: &'static str, #[case] code: &str) {
    let h = harness();
    let mut rows = vec![order(vec![upload(100, file_name, b"x")])];
    let mut tx = TransactionContext::new();

    let err = h
        .service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), code);
    assert_eq!(CountingStore::count(&h.store.uploads), 0);
}

#[rstest]
#[case("report.pdf")]
#[case("photo.PNG")]
#[case("notes.txt")]
#[tokio::test]
async fn test_accepted_file_names(#[case] file_name: &'static str) {
    let h = harness();
    let mut rows = vec![order(vec![upload(100, file_name, b"x")])];
    let mut tx = TransactionContext::new();

    h.service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap();
    assert_eq!(CountingStore::count(&h.store.uploads), 1);
}

#[tokio::test]
async fn test_create_checks_maximum_only() {
    let h = harness();
    let mut tx = TransactionContext::new();
    let too_many = (0..4).map(|i| upload(100 + i, "a.txt", b"x")).collect();
    let mut rows = vec![order(too_many)];

    let err = h
        .service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AttachmentError::MaximumAmountExceeded { max: 3, actual: 4, .. }
    ));
    assert_eq!(CountingStore::count(&h.store.uploads), 0);

    let mut rows = vec![id_row(1).with_children("items", Vec::new())];
    h.service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_attachment_key_is_rejected() {
    let h = harness();
    let mut rows = vec![order(vec![
        upload(100, "a.txt", b"1"),
        upload(100, "b.txt", b"2"),
    ])];
    let mut tx = TransactionContext::new();

    let err = h
        .service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::BadRequest(_)));
    assert_eq!(CountingStore::count(&h.store.uploads), 0);
}

#[tokio::test]
async fn test_store_failure_leaves_no_content_id() {
    let h = harness();
    h.store.fail_uploads();
    let mut rows = vec![order(vec![upload(100, "a.txt", b"x")])];
    let mut tx = TransactionContext::new();

    let err = h
        .service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap_err();

    assert!(matches!(err, AttachmentError::StoreFailure(_)));
    assert_eq!(err.status_code(), 500);
    let attachment = &rows_at_mut(&mut rows, &["attachments"])[0].attachment;
    assert!(attachment.content_id.is_missing());
    assert!(tx.is_empty());
}

#[tokio::test]
async fn test_rollback_removes_uploads() {
    let h = harness();
    let mut rows = vec![order(vec![upload(100, "a.txt", b"x")])];
    let mut tx = TransactionContext::new();
    h.service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap();
    let id = content_id(&rows[0].children("attachments").unwrap()[0]);

    let summary = h.service.rollback(tx).await;

    assert_eq!(summary.compensated, 1);
    assert!(!h.store.exists(&id).await);
    assert!(h.entities.writes().is_empty());
    assert!(h.scanner.requests().is_empty());
}

#[tokio::test]
async fn test_failed_readonly_write_aborts_before_close() {
    let h = harness();
    let mut rows = vec![order(vec![upload(100, "a.txt", b"x")])];
    let mut tx = TransactionContext::new();
    h.service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap();
    h.entities.persist(&h.service.attachment_paths("Orders"), &rows);
    let id = content_id(&rows[0].children("attachments").unwrap()[0]);
    h.entities.fail_writes();

    let err = h.service.before_close(&mut tx).await.unwrap_err();
    assert!(matches!(err, AttachmentError::Repository(_)));
    assert!(h.store.exists(&id).await);

    // The host transaction aborts, so no stored row keeps the id.
    let summary = h.service.rollback(tx).await;
    assert_eq!(summary.compensated, 1);
    assert!(!h.store.exists(&id).await);
    let stored = h.entities.stored("Attachments", &key(100)).unwrap();
    assert!(stored.fields.content_id.is_missing());
    assert!(h.scanner.requests().is_empty());
}

#[tokio::test]
async fn test_late_readonly_failure_keeps_content_of_committed_rows() {
    let h = harness();
    let mut rows = vec![order(vec![upload(100, "a.txt", b"x")])];
    let mut tx = TransactionContext::new();
    h.service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .unwrap();
    h.entities.persist(&h.service.attachment_paths("Orders"), &rows);
    let id = content_id(&rows[0].children("attachments").unwrap()[0]);
    h.entities.fail_writes();

    let summary = h.service.commit(tx).await;

    assert_eq!(summary.failed_writes, 1);
    assert_eq!(h.store.bytes(&id).await, b"x");
    assert_eq!(h.scanner.requests().len(), 1);
}

#[tokio::test]
async fn test_draft_edit_parks_readonly_fields_until_activation() {
    let h = harness();
    let mut rows = vec![order(vec![upload(100, "a.txt", b"x")])];
    let mut tx = TransactionContext::new();
    let edit = RequestContext::new().with_draft(DraftMode::Edit);
    h.service
        .before_create(&mut tx, &edit, "Orders", &mut rows)
        .await
        .unwrap();

    let parked = {
        let row = &rows[0].children("attachments").unwrap()[0];
        assert!(row.attachment.content_id.is_missing());
        row.readonly_stash.clone().unwrap()
    };
    assert!(parked.content_id.value().is_some());

    let activate = RequestContext::new().with_draft(DraftMode::Activate);
    let mut tx = TransactionContext::new();
    h.service
        .before_update(&mut tx, &activate, "Orders", &mut rows)
        .await
        .unwrap();

    let row = &rows[0].children("attachments").unwrap()[0];
    assert_eq!(row.attachment.content_id, parked.content_id);
    assert!(row.readonly_stash.is_none());
    assert_eq!(tx.pending().len(), 1);
}

#[tokio::test]
async fn test_read_selection_gains_content_id_and_status() {
    let h = harness();
    let mut select = Select::columns(["ID"]).expand("attachments", Select::columns(["content"]));
    h.service.before_read("Orders", &mut select);

    let SelectItem::Expand { items, .. } = &select.items[1] else {
        panic!("expand kept");
    };
    assert_eq!(
        items,
        &vec![
            SelectItem::Column(names::CONTENT.to_string()),
            SelectItem::Column(names::CONTENT_ID.to_string()),
            SelectItem::Column(names::STATUS.to_string()),
        ]
    );

    let mut untouched = Select::columns(["ID"]).expand("attachments", Select::all());
    let before = untouched.clone();
    h.service.before_read("Orders", &mut untouched);
    assert_eq!(untouched, before);

    let mut id_only = Select::all().expand("items", Select::columns(["ID"]));
    let before = id_only.clone();
    h.service.before_read("Orders", &mut id_only);
    assert_eq!(id_only, before);
}
