// src/fetch/http.rs

use reqwest::blocking::Client;
use std::{thread::sleep, time::Duration};
use tracing::{debug, error, instrument, warn};

use super::Fetch;
use crate::config::Config;
use crate::error::{AcsError, Result};

/// Blocking HTTP fetcher with bounded exponential-backoff retry.
///
/// Client errors (4xx) are returned immediately; transport failures and 5xx responses
/// are retried up to `max_retries` times.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    initial_backoff_ms: u64,
}

impl HttpFetcher {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.http_timeout())
            .gzip(true)
            .build()
            .map_err(|source| AcsError::Http {
                url: "<client builder>".to_string(),
                source,
            })?;
        Ok(HttpFetcher {
            client,
            max_retries: cfg.max_retries,
            initial_backoff_ms: cfg.retry_backoff_ms,
        })
    }

    fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|source| AcsError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AcsError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().map_err(|source| AcsError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

fn is_retryable(err: &AcsError) -> bool {
    match err {
        AcsError::Http { .. } => true,
        AcsError::HttpStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Longest single wait between attempts.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Doubling delay before retry `attempt` (1-based), capped at `MAX_BACKOFF_MS`.
fn backoff_ms(initial_ms: u64, attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    initial_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempts = 0;
        loop {
            match self.fetch_once(url) {
                Ok(b) => return Ok(b),
                Err(e) if attempts < self.max_retries && is_retryable(&e) => {
                    attempts += 1;
                    let backoff = backoff_ms(self.initial_backoff_ms, attempts);
                    warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                    sleep(Duration::from_millis(backoff));
                }
                Err(e) => {
                    error!(%url, error = %e, "fetch failed");
                    return Err(e);
                }
            }
        }
    }
}
