// src/client.rs
//
// Wires configuration, fetching, URL templates and the catalog cache into one handle.

use tracing::{info, instrument};

use crate::address::{GeoAddress, Release, StateScope, TableAddress};
use crate::assemble::{AssembledTable, TableAssembler};
use crate::catalog::{CatalogCache, TableMeta};
use crate::config::Config;
use crate::error::{AcsError, Result};
use crate::fetch::{CachedFetcher, HttpFetcher, RemoteSource, TabularSource};
use crate::frame::CensusFrame;
use crate::locator::{Locator, UrlTemplates};

pub struct AcsClient {
    config: Config,
    source: Box<dyn TabularSource>,
    urls: UrlTemplates,
    catalogs: CatalogCache,
}

impl AcsClient {
    /// HTTP fetching, read through `cache_dir` when one is configured.
    pub fn from_config(config: Config) -> Result<Self> {
        let http = HttpFetcher::new(&config)?;
        let source: Box<dyn TabularSource> = match &config.cache_dir {
            Some(dir) => {
                info!(cache_dir = %dir.display(), "using on-disk fetch cache");
                Box::new(RemoteSource::new(CachedFetcher::new(http, dir.clone())?))
            }
            None => Box::new(RemoteSource::new(http)),
        };
        Ok(Self::with_source(config, source))
    }

    pub fn with_source(config: Config, source: Box<dyn TabularSource>) -> Self {
        let urls = UrlTemplates::from_config(&config);
        let catalogs = CatalogCache::new(config.catalog_capacity);
        AcsClient {
            config,
            source,
            urls,
            catalogs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn urls(&self) -> &UrlTemplates {
        &self.urls
    }

    pub fn catalogs(&self) -> &CatalogCache {
        &self.catalogs
    }

    pub fn assembler(&self) -> TableAssembler<'_, dyn TabularSource> {
        TableAssembler::new(&*self.source, &self.urls, &self.catalogs)
    }

    /// Address parsed with this client's default vintage.
    pub fn table_address(&self, address: &str) -> Result<TableAddress> {
        TableAddress::parse_with_defaults(address, self.config.default_year, self.config.default_release)
    }

    pub fn geo_address(&self, address: &str) -> Result<GeoAddress> {
        GeoAddress::parse_with_defaults(address, self.config.default_year, self.config.default_release)
    }

    #[instrument(level = "info", skip(self))]
    pub fn rows(&self, address: &str) -> Result<AssembledTable<'_, dyn TabularSource>> {
        let addr = self.table_address(address)?;
        self.assembler().assemble(&addr)
    }

    pub fn frame(&self, address: &str) -> Result<CensusFrame> {
        CensusFrame::from_table(self.rows(address)?)
    }

    pub fn table_meta(&self, year: u16, release: Release, table_id: &str) -> Result<TableMeta> {
        let catalog = self.assembler().catalog(year, release)?;
        Ok(catalog.table(table_id)?.clone())
    }

    /// Locator of the TIGER/Line archive holding the boundaries for an address.
    pub fn boundary(&self, geo: &GeoAddress) -> Result<Locator> {
        let state = match geo.state {
            StateScope::State(st) => Some(st),
            StateScope::Us => None,
        };
        self.urls.tiger_boundary_url(geo.year, geo.summary_level, state)
    }

    /// Locator of the workbook pairing the state's record numbers with GEOIDs.
    pub fn geoid_workbook(&self, geo: &GeoAddress) -> Result<Locator> {
        match geo.state {
            StateScope::State(st) => self.urls.geoid_url(geo.year, geo.release, st),
            StateScope::Us => Err(AcsError::Config(
                "GEOID workbooks are published per state, not for the US".into(),
            )),
        }
    }
}
