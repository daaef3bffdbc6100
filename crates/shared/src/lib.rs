//! Shared types, errors, and configuration for the attachments core.
//!
//! This crate provides common types used across all other crates:
//! - Opaque content identifiers handed out by content stores
//! - Application-wide error types with HTTP status mapping
//! - Configuration management (size limits, removal policy, storage provider)

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, AttachmentSettings, RemovalTiming, StorageProvider, StorageSettings};
pub use error::{AppError, AppResult};
pub use types::ContentId;
