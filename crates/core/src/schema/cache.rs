//! Schema path caching using Moka.
//!
//! The schema is immutable for the lifetime of the process, so paths are
//! computed once per root entity and never expire.

use std::sync::Arc;

use moka::sync::Cache;

use super::walker::{SchemaGraphWalker, SchemaPath};
use crate::model::SchemaModel;

/// Default cache capacity (number of root entities).
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Cache of attachment paths keyed by root entity name.
#[derive(Clone)]
pub struct PathCache {
    cache: Cache<String, Arc<[SchemaPath]>>,
}

impl PathCache {
    /// Creates a cache with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a cache holding at most `max_capacity` root entities.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Attachment paths of `root`, walking the schema on first use.
    #[must_use]
    pub fn paths(&self, schema: &dyn SchemaModel, root: &str) -> Arc<[SchemaPath]> {
        self.cache.get_with(root.to_string(), || {
            Arc::from(SchemaGraphWalker::new(schema).walk(root))
        })
    }

    /// Drops all cached paths.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Returns the number of entries currently in the cache.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs cache maintenance tasks.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCache")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
