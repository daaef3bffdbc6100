//! Attachment path discovery and content field location.

mod cache;
mod locator;
mod walker;

#[cfg(test)]
mod walker_props;

pub use cache::PathCache;
pub use locator::{ContentFieldLocator, ContentFieldNames, ContentFields, LocateMode};
pub use walker::{PathSegment, SchemaGraphWalker, SchemaPath};
