// src/catalog/cache.rs

use lru::LruCache;
use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::debug;

use super::TableCatalog;
use crate::address::Release;
use crate::error::Result;

pub const DEFAULT_CAPACITY: usize = 100;

/// Process-wide, bounded memo of parsed catalogs keyed by (year, release).
///
/// Building a catalog means downloading and parsing the full lookup file, so callers
/// share one `CatalogCache` and pass it wherever tables are resolved.
pub struct CatalogCache {
    inner: Mutex<LruCache<(u16, Release), Arc<TableCatalog>>>,
}

impl CatalogCache {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        CatalogCache {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<(u16, Release), Arc<TableCatalog>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the cached catalog, or runs `load` and caches what it returns.
    /// Failed loads are not cached.
    pub fn get_or_load<F>(&self, year: u16, release: Release, load: F) -> Result<Arc<TableCatalog>>
    where
        F: FnOnce() -> Result<TableCatalog>,
    {
        if let Some(hit) = self.lock().get(&(year, release)) {
            debug!(year, %release, "catalog cache hit");
            return Ok(Arc::clone(hit));
        }
        // the lock is not held while loading, which can take seconds
        let catalog = Arc::new(load()?);
        self.lock().put((year, release), Arc::clone(&catalog));
        Ok(catalog)
    }

    pub fn contains(&self, year: u16, release: Release) -> bool {
        self.lock().contains(&(year, release))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
