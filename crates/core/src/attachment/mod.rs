//! Attachment records, errors and host collaborator contracts.
//!
//! This module provides the vocabulary shared by every interceptor:
//! - Scan status and read-only metadata
//! - Snapshots of previously persisted attachments
//! - The request context (draft phase, declared length)
//! - Entity persistence and scanner contracts implemented by the host

mod error;
mod repository;
mod types;

pub use error::AttachmentError;
pub use repository::{EntityStore, NoopScanner, ScanQueue, ScanRequest, Scanner};
pub use types::{
    AttachmentSnapshot, DraftMode, ReadonlyFields, RequestContext, ScanStatus,
};
