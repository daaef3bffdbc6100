//! Attachment content lifecycle for business entities.
//!
//! This crate intercepts create/read/update/delete requests on entities that
//! own attachment compositions and manages their binary content against an
//! external content store, independently of the host's own persistence.
//! It has ZERO web or database dependencies: the host's schema model, entity
//! persistence, malware scanner and transaction boundary are collaborators.
//!
//! # Modules
//!
//! - `model` - Schema model, payload rows and select trees
//! - `schema` - Attachment path discovery and content field location
//! - `content` - Content streams, size guard and the lazy, scan-gated proxy
//! - `validation` - Item-count and media-type validators
//! - `transaction` - Deferred work and compensation per unit of work
//! - `readonly` - Read-only metadata hand-off across draft passes
//! - `interceptor` - The CRUD interceptors and their staged pipeline
//! - `attachment` - Errors, record types and host collaborator contracts
//! - `storage` - Content store contract and the OpenDAL-backed store

pub mod attachment;
pub mod content;
pub mod interceptor;
pub mod model;
pub mod readonly;
pub mod schema;
pub mod storage;
pub mod transaction;
pub mod validation;

pub use attachment::{
    AttachmentError, AttachmentSnapshot, DraftMode, EntityStore, NoopScanner, ReadonlyFields,
    RequestContext, ScanQueue, ScanRequest, ScanStatus, Scanner,
};
pub use content::{Content, LazyContent, SizeGuard};
pub use interceptor::AttachmentService;
pub use model::{Catalog, EntityDefinition, EntityKey, Field, Row, SchemaModel, Select, Value};
pub use schema::{PathCache, SchemaGraphWalker, SchemaPath};
pub use storage::{ContentStore, OpendalContentStore, StorageError};
pub use transaction::{CommitSummary, PendingWork, RollbackSummary, TransactionContext};

pub use attachments_shared::{AttachmentSettings, ContentId, RemovalTiming};
