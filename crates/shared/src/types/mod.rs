//! Common types used across the application.

pub mod content_id;

pub use content_id::ContentId;
