// src/fetch/mod.rs
//
// Collaborators that turn a `Locator` into rows: byte fetching (HTTP, on-disk cache,
// in-memory), archive member extraction and CSV/Excel parsing.

pub mod archive;
pub mod cache;
pub mod http;
pub mod parse;
pub mod source;

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::error::{AcsError, Result};

pub use cache::CachedFetcher;
pub use http::HttpFetcher;
pub use parse::{Encoding, RowStream};
pub use source::{MemorySource, RemoteSource, TabularSource};

/// Blocking byte retrieval for a URL.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

impl<T: Fetch + ?Sized> Fetch for &T {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url)
    }
}

impl<T: Fetch + ?Sized> Fetch for Box<T> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url)
    }
}

/// Fixed URL → bytes map. Unknown URLs answer like a 404.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(url.into(), bytes.into());
    }

    /// Number of `fetch` calls served so far, hits and misses alike.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| AcsError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}
