// src/fetch/source.rs

use lru::LruCache;
use std::{
    collections::HashMap,
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};
use tracing::{debug, instrument};

use super::{archive::open_member, parse, Encoding, Fetch, RowStream};
use crate::error::{AcsError, Result};
use crate::locator::Locator;

/// Anything that can produce the rows of a located tabular resource.
pub trait TabularSource {
    fn rows(&self, locator: &Locator, encoding: Encoding) -> Result<RowStream>;

    /// Convenience for small reference files that are consumed whole.
    fn collect_rows(&self, locator: &Locator, encoding: Encoding) -> Result<Vec<Vec<String>>> {
        self.rows(locator, encoding)?.collect()
    }
}

impl<T: TabularSource + ?Sized> TabularSource for &T {
    fn rows(&self, locator: &Locator, encoding: Encoding) -> Result<RowStream> {
        (**self).rows(locator, encoding)
    }
}

impl<T: TabularSource + ?Sized> TabularSource for Box<T> {
    fn rows(&self, locator: &Locator, encoding: Encoding) -> Result<RowStream> {
        (**self).rows(locator, encoding)
    }
}

/// Archives are reused for consecutive members (estimate then margin, one template
/// after another), so keep the last few in memory.
const ARCHIVE_MEMO: usize = 4;

/// Fetches over a `Fetch`, opens archive members and parses by file extension.
pub struct RemoteSource<F> {
    fetcher: F,
    archives: Mutex<LruCache<String, Arc<Vec<u8>>>>,
}

impl<F: Fetch> RemoteSource<F> {
    pub fn new(fetcher: F) -> Self {
        RemoteSource {
            fetcher,
            archives: Mutex::new(LruCache::new(
                NonZeroUsize::new(ARCHIVE_MEMO).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn archive(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        if let Some(hit) = self.lock_archives().get(url) {
            return Ok(Arc::clone(hit));
        }
        let bytes = Arc::new(self.fetcher.fetch(url)?);
        self.lock_archives()
            .put(url.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    fn lock_archives(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<Vec<u8>>>> {
        // a poisoned memo only loses cached bytes
        self.archives
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn is_excel(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".xls") || lower.ends_with(".xlsx")
}

impl<F: Fetch> TabularSource for RemoteSource<F> {
    #[instrument(level = "debug", skip(self), fields(locator = %locator))]
    fn rows(&self, locator: &Locator, encoding: Encoding) -> Result<RowStream> {
        let bytes = match &locator.member {
            Some(member) => {
                let archive = self.archive(&locator.url)?;
                open_member(&archive, &locator.url, member)?
            }
            None => self.fetcher.fetch(&locator.url)?,
        };
        debug!(bytes = bytes.len(), "fetched resource");

        if is_excel(locator.file_name()) {
            let rows = parse::excel_rows(bytes)?;
            Ok(Box::new(rows.into_iter().map(Ok)))
        } else {
            Ok(parse::csv_rows(bytes, encoding))
        }
    }
}

/// Rows keyed by locator, for tests and offline use. Unknown locators answer like a
/// 404.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: HashMap<Locator, Vec<Vec<String>>>,
    requests: Mutex<HashMap<Locator, usize>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<R, S>(&mut self, locator: Locator, rows: R)
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect())
            .collect();
        self.tables.insert(locator, rows);
    }

    /// How many times `rows` has been called for this locator.
    pub fn requests(&self, locator: &Locator) -> usize {
        self.requests
            .lock()
            .map(|m| m.get(locator).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl TabularSource for MemorySource {
    fn rows(&self, locator: &Locator, _encoding: Encoding) -> Result<RowStream> {
        if let Ok(mut m) = self.requests.lock() {
            *m.entry(locator.clone()).or_insert(0) += 1;
        }
        let rows = self
            .tables
            .get(locator)
            .cloned()
            .ok_or_else(|| AcsError::HttpStatus {
                url: locator.to_string(),
                status: 404,
            })?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}
