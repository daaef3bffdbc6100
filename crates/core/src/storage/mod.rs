//! Content storage using Apache OpenDAL.
//!
//! This module provides the content store contract used by the interceptors
//! and a vendor-agnostic implementation supporting:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, DigitalOcean Spaces
//! - Azure Blob Storage
//! - Local filesystem (development only)
//! - In-process memory (tests only)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Apache OpenDAL                              │
//! │                   (Unified Storage API)                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ op.writer_with("key")      │ op.reader("key")                    │
//! │ writer.write / abort       │ reader.into_bytes_stream(..)        │
//! │ op.delete("key")           │ op.stat("key")                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod service;
mod store;

pub use error::StorageError;
pub use service::OpendalContentStore;
pub use store::ContentStore;
