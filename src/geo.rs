// src/geo.rs
//
// LOGRECNO → geography attributes for one state's geography file.

use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::address::{Release, SummaryLevel};
use crate::error::{AcsError, Result};
use crate::fetch::{Encoding, TabularSource};
use crate::locator::{states::State, UrlTemplates};

/// Key under which `GeoIndex::get` answers with the column names themselves.
pub const HEADER_KEY: &str = "LOGRECNO";

/// Record numbers are zero-padded in both the geography and sequence files, but not
/// always to the same width.
pub fn logrecno_key(s: &str) -> String {
    let t = s.trim();
    if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = t.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        t.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRecord {
    pub logrecno: String,
    pub geoid: String,
    pub stusab: String,
    pub county: String,
    pub name: String,
    pub sumlevel: String,
}

impl GeoRecord {
    fn header() -> Self {
        GeoRecord {
            logrecno: "LOGRECNO".into(),
            geoid: "GEOID".into(),
            stusab: "STUSAB".into(),
            county: "COUNTY".into(),
            name: "NAME".into(),
            sumlevel: "SUMLEVEL".into(),
        }
    }

    /// Summary level compared as an integer, so `"040"` and `"40"` agree.
    pub fn summary_level(&self) -> Option<u16> {
        self.sumlevel.trim().parse().ok()
    }

    pub fn is_level(&self, sl: SummaryLevel) -> bool {
        self.summary_level() == Some(sl.code())
    }
}

/// Column positions of the geography file, learned from the year's header template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoHeader {
    pub year: u16,
    pub release: Release,
    logrecno: usize,
    sumlevel: usize,
    geoid: Option<usize>,
    stusab: Option<usize>,
    county: Option<usize>,
    name: Option<usize>,
}

impl GeoHeader {
    /// From the template's first row of column names.
    pub fn from_names(year: u16, release: Release, names: &[String]) -> Result<Self> {
        let find = |col: &str| names.iter().position(|n| n.trim().eq_ignore_ascii_case(col));
        let need = |col: &'static str| {
            find(col).ok_or(AcsError::MissingGeoColumn {
                column: col,
                year,
                release,
            })
        };
        Ok(GeoHeader {
            year,
            release,
            logrecno: need("LOGRECNO")?,
            sumlevel: need("SUMLEVEL")?,
            geoid: find("GEOID"),
            stusab: find("STUSAB"),
            county: find("COUNTY"),
            name: find("NAME"),
        })
    }

    #[instrument(level = "debug", skip(source, urls))]
    pub fn load<S: TabularSource + ?Sized>(
        source: &S,
        urls: &UrlTemplates,
        year: u16,
        release: Release,
    ) -> Result<Self> {
        let loc = urls.geo_header_url(year, release)?;
        let names = source
            .rows(&loc, Encoding::Latin1)?
            .next()
            .transpose()?
            .unwrap_or_default();
        Self::from_names(year, release, &names)
    }

    fn record(&self, row: &[String]) -> GeoRecord {
        let get = |i: Option<usize>| {
            i.and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        GeoRecord {
            logrecno: get(Some(self.logrecno)),
            geoid: get(self.geoid),
            stusab: get(self.stusab),
            county: get(self.county),
            name: get(self.name),
            sumlevel: get(Some(self.sumlevel)),
        }
    }
}

/// Geography records of one state, keyed by record number.
///
/// The key space is only meaningful inside the (year, release, state) the index was
/// built for; record numbers repeat across states.
#[derive(Debug, Clone)]
pub struct GeoIndex {
    pub state: &'static State,
    pub summary_level: SummaryLevel,
    records: HashMap<String, GeoRecord>,
    header: GeoRecord,
}

impl GeoIndex {
    pub fn from_rows<I>(
        header: &GeoHeader,
        state: &'static State,
        summary_level: SummaryLevel,
        rows: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Vec<String>>>,
    {
        let mut records = HashMap::new();
        for row in rows {
            let row = row?;
            if row.iter().all(|f| f.is_empty()) {
                continue;
            }
            let rec = header.record(&row);
            records.insert(logrecno_key(&rec.logrecno), rec);
        }
        let header_rec = GeoRecord::header();
        records.insert(HEADER_KEY.to_string(), header_rec.clone());
        Ok(GeoIndex {
            state,
            summary_level,
            records,
            header: header_rec,
        })
    }

    /// Reads the state's geography file.
    #[instrument(level = "info", skip(source, urls, header, state), fields(year = header.year, release = %header.release, state = state.abbr))]
    pub fn load<S: TabularSource + ?Sized>(
        source: &S,
        urls: &UrlTemplates,
        header: &GeoHeader,
        state: &'static State,
        summary_level: SummaryLevel,
    ) -> Result<Self> {
        let loc = urls.geo_url(header.year, header.release, state, summary_level)?;
        let index = Self::from_rows(
            header,
            state,
            summary_level,
            source.rows(&loc, Encoding::Latin1)?,
        )?;
        debug!(records = index.len(), "geography index built");
        Ok(index)
    }

    /// Record for a LOGRECNO. `"LOGRECNO"` itself yields the column names.
    pub fn get(&self, logrecno: &str) -> Option<&GeoRecord> {
        self.records.get(&logrecno_key(logrecno))
    }

    pub fn header(&self) -> &GeoRecord {
        &self.header
    }

    /// Number of geography records, not counting the header entry.
    pub fn len(&self) -> usize {
        self.records.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> impl Iterator<Item = &GeoRecord> {
        self.records
            .iter()
            .filter(|(k, _)| k.as_str() != HEADER_KEY)
            .map(|(_, r)| r)
    }
}
