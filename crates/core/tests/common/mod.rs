//! Shared fixtures for the interceptor integration tests.
//!
//! The host side is simulated in memory: a schema catalog, an entity store
//! holding attachment rows with their lineage, a recording scanner and a
//! content store wrapper counting calls to the OpenDAL memory backend.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use attachments_core::model::{ElementDefinition, KeyValue, names};
use attachments_core::storage::ContentStore;
use attachments_core::{
    AttachmentError, AttachmentService, AttachmentSettings, AttachmentSnapshot, Catalog, Content,
    CommitSummary,
    ContentId, EntityDefinition, EntityKey, EntityStore, Field, OpendalContentStore,
    ReadonlyFields, RequestContext, Row, ScanStatus, Scanner, SchemaPath, StorageError,
    TransactionContext, Value,
};

pub type Service = AttachmentService<CountingStore, MemoryEntityStore>;

/// `Orders` own attachments directly and through their `items`.
pub fn catalog() -> Catalog {
    Catalog::new()
        .with(
            EntityDefinition::new("Orders")
                .with_element(
                    ElementDefinition::composition("attachments", "Attachments")
                        .with_bounds(None, Some(3)),
                )
                .with_element(
                    ElementDefinition::composition("items", "Items").with_bounds(Some(1), None),
                ),
        )
        .with(
            EntityDefinition::new("Items")
                .with_element(ElementDefinition::composition("attachments", "ItemAttachments")),
        )
        .with(
            EntityDefinition::attachment("Attachments")
                .with_max_size("1KB")
                .with_media_types(["application/pdf", "image/*", "text/plain"]),
        )
        .with(EntityDefinition::attachment("ItemAttachments"))
}

pub struct Harness {
    pub service: Service,
    pub store: Arc<CountingStore>,
    pub entities: Arc<MemoryEntityStore>,
    pub scanner: Arc<RecordingScanner>,
}

pub fn harness() -> Harness {
    harness_with(AttachmentSettings::default())
}

pub fn harness_with(settings: AttachmentSettings) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(CountingStore::new());
    let entities = Arc::new(MemoryEntityStore::default());
    let scanner = Arc::new(RecordingScanner::default());
    let service = AttachmentService::new(
        Arc::new(catalog()),
        Arc::clone(&store),
        Arc::clone(&entities),
        Arc::clone(&scanner) as Arc<dyn Scanner>,
        settings,
    );
    Harness {
        service,
        store,
        entities,
        scanner,
    }
}

pub fn key(id: i64) -> EntityKey {
    EntityKey::new().with(names::ID, id)
}

pub fn id_row(id: i64) -> Row {
    Row::new().with(names::ID, Value::Integer(id))
}

/// Attachment payload row carrying content.
pub fn upload(id: i64, file_name: &str, bytes: &'static [u8]) -> Row {
    id_row(id)
        .with_file_name(file_name)
        .with_content(Content::from_bytes(bytes))
}

/// `Orders` row 1 with direct attachments.
pub fn order(attachments: Vec<Row>) -> Row {
    id_row(1).with_children("attachments", attachments)
}

/// Run a create of `Orders` rows, persist them host-side and commit.
pub async fn create_committed(h: &Harness, mut rows: Vec<Row>) -> Vec<Row> {
    let mut tx = TransactionContext::new();
    h.service
        .before_create(&mut tx, &RequestContext::new(), "Orders", &mut rows)
        .await
        .expect("create");
    h.entities.persist(&h.service.attachment_paths("Orders"), &rows);
    finish(h, tx).await;
    rows
}

/// Close the host transaction successfully: read-only fields are written
/// inside it, the deferred work runs after it.
pub async fn finish(h: &Harness, mut tx: TransactionContext) -> CommitSummary {
    h.service.before_close(&mut tx).await.expect("before close");
    h.service.commit(tx).await
}

/// Content id set on a payload row by the interceptors.
pub fn content_id(row: &Row) -> ContentId {
    row.attachment
        .content_id
        .value()
        .cloned()
        .expect("row has a content id")
}

pub async fn read_all(content: Content) -> Result<Vec<u8>, AttachmentError> {
    content
        .into_bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(AttachmentError::from_io)
}

/// Attachment row as stored by the host.
#[derive(Debug, Clone)]
pub struct StoredAttachment {
    pub entity: String,
    pub key: EntityKey,
    pub lineage: Vec<EntityKey>,
    pub fields: ReadonlyFields,
}

/// Host persistence double.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    rows: Mutex<Vec<StoredAttachment>>,
    writes: Mutex<Vec<(String, EntityKey, ReadonlyFields)>>,
    selects: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryEntityStore {
    /// Store the attachment rows of `payload` along `paths`, the way the host
    /// writes a create payload.
    pub fn persist(&self, paths: &[SchemaPath], payload: &[Row]) {
        for path in paths {
            let mut found = Vec::new();
            collect(payload, &path.associations(), Vec::new(), &mut found);
            let mut rows = self.rows.lock().unwrap();
            for (key, lineage) in found {
                if let Some(stored) = rows
                    .iter_mut()
                    .find(|r| r.entity == path.target() && r.key == key)
                {
                    stored.lineage = lineage;
                } else {
                    rows.push(StoredAttachment {
                        entity: path.target().to_string(),
                        key,
                        lineage,
                        fields: ReadonlyFields::default(),
                    });
                }
            }
        }
    }

    pub fn stored(&self, entity: &str, key: &EntityKey) -> Option<StoredAttachment> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.entity == entity && &r.key == key)
            .cloned()
    }

    pub fn set_status(&self, entity: &str, key: &EntityKey, status: ScanStatus) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.entity == entity && &r.key == key) {
            row.fields.status = Field::Value(status);
        }
    }

    /// Result row the host returns for a read selecting `content`.
    pub fn result_row(&self, entity: &str, key: &EntityKey) -> Row {
        let stored = self.stored(entity, key).expect("stored attachment");
        let mut row = Row::new();
        for (name, value) in key.iter() {
            row.insert(name, value.to_value());
        }
        row.attachment.content = Field::Null;
        row.attachment.content_id = stored.fields.content_id;
        row.attachment.status = stored.fields.status;
        row.attachment.scanned_at = stored.fields.scanned_at;
        row
    }

    pub fn writes(&self) -> Vec<(String, EntityKey, ReadonlyFields)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

fn row_key(row: &Row) -> Option<EntityKey> {
    let value = row.get(names::ID).and_then(KeyValue::from_value)?;
    let mut key = EntityKey::new();
    key.insert(names::ID, value);
    Some(key)
}

fn collect(
    rows: &[Row],
    associations: &[&str],
    lineage: Vec<EntityKey>,
    out: &mut Vec<(EntityKey, Vec<EntityKey>)>,
) {
    for row in rows {
        let Some(key) = row_key(row) else { continue };
        match associations.split_first() {
            None => out.push((key, lineage.clone())),
            Some((first, rest)) => {
                if let Some(children) = row.children(first) {
                    let mut next = lineage.clone();
                    next.push(key);
                    collect(children, rest, next, out);
                }
            }
        }
    }
}

impl EntityStore for MemoryEntityStore {
    async fn select_attachments(
        &self,
        _root: &str,
        path: &SchemaPath,
        root_keys: &[EntityKey],
    ) -> Result<Vec<AttachmentSnapshot>, AttachmentError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        let depth = path.depth();
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| r.entity == path.target() && r.lineage.len() >= depth)
            .filter_map(|r| {
                // Lineage relative to the queried root.
                let lineage = &r.lineage[r.lineage.len() - depth..];
                let root = lineage.first().unwrap_or(&r.key);
                root_keys.contains(root).then(|| AttachmentSnapshot {
                    entity: r.entity.clone(),
                    key: r.key.clone(),
                    lineage: lineage.to_vec(),
                    content_id: r.fields.content_id.value().cloned(),
                    status: r.fields.status.value().copied(),
                    scanned_at: r.fields.scanned_at.value().copied(),
                })
            })
            .collect())
    }

    async fn update_readonly_fields(
        &self,
        entity: &str,
        key: &EntityKey,
        fields: &ReadonlyFields,
    ) -> Result<(), AttachmentError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AttachmentError::repository("connection reset"));
        }
        self.writes
            .lock()
            .unwrap()
            .push((entity.to_string(), key.clone(), fields.clone()));
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.entity == entity && &r.key == key) {
            row.fields.merge(fields.clone());
        }
        Ok(())
    }
}

/// Scanner recording every request.
#[derive(Debug, Default)]
pub struct RecordingScanner {
    requests: Mutex<Vec<(String, ContentId)>>,
}

impl RecordingScanner {
    pub fn requests(&self) -> Vec<(String, ContentId)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Scanner for RecordingScanner {
    fn scan_async(&self, entity: &str, content_id: &ContentId) {
        self.requests
            .lock()
            .unwrap()
            .push((entity.to_string(), content_id.clone()));
    }
}

/// Memory-backed content store counting calls.
#[derive(Debug)]
pub struct CountingStore {
    inner: OpendalContentStore,
    pub uploads: AtomicUsize,
    pub reads: AtomicUsize,
    pub deletes: AtomicUsize,
    fail_uploads: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: OpendalContentStore::memory().expect("memory store"),
            uploads: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
        }
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub async fn exists(&self, content_id: &ContentId) -> bool {
        self.inner.exists(content_id).await.expect("stat")
    }

    pub async fn bytes(&self, content_id: &ContentId) -> Vec<u8> {
        let content = self.inner.read(content_id).await.expect("stored content");
        content.into_bytes().await.expect("readable").to_vec()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl ContentStore for CountingStore {
    async fn upload(
        &self,
        content: Content,
        file_name: &str,
        mime_type: &str,
    ) -> Result<ContentId, StorageError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::operation("bucket unavailable"));
        }
        self.inner.upload(content, file_name, mime_type).await
    }

    async fn read(&self, content_id: &ContentId) -> Result<Content, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(content_id).await
    }

    async fn delete(&self, content_id: &ContentId) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(content_id).await
    }
}

