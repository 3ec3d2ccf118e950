// src/fetch/cache.rs

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};
use url::Url;

use super::Fetch;
use crate::error::{AcsError, Result};

/// Read-through on-disk cache in front of another fetcher.
///
/// Files land under `<dir>/<host>/<path segments…>`, so the layout mirrors the remote
/// tree and a hit never reaches the inner fetcher.
pub struct CachedFetcher<F> {
    inner: F,
    dir: PathBuf,
}

impl<F: Fetch> CachedFetcher<F> {
    pub fn new(inner: F, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(CachedFetcher { inner, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path a URL is cached at.
    pub fn cache_path(&self, url_str: &str) -> Result<PathBuf> {
        let url = Url::parse(url_str)
            .map_err(|e| AcsError::Config(format!("cannot cache '{}': {}", url_str, e)))?;
        let mut path = self.dir.join(url.host_str().unwrap_or("local"));
        for seg in url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        {
            path.push(seg);
        }
        if path == self.dir {
            path.push("index");
        }
        Ok(path)
    }
}

impl<F: Fetch> Fetch for CachedFetcher<F> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.cache_path(url)?;
        if path.is_file() {
            debug!(path = %path.display(), "cache hit");
            return Ok(fs::read(&path)?);
        }

        let bytes = self.inner.fetch(url)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // write beside the target, then rename, so a crash never leaves a short file
        let tmp = path.with_extension("part");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        info!(path = %path.display(), bytes = bytes.len(), "cached");
        Ok(bytes)
    }
}
