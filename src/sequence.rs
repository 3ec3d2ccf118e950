// src/sequence.rs
//
// One physical sequence segment: the header template that names its columns and the
// paired estimate/margin files that hold its rows.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::address::{Release, SummaryLevel};
use crate::catalog::{normalize_table_id, ColumnMeta, TableCatalog};
use crate::error::{AcsError, Result};
use crate::fetch::{Encoding, RowStream, TabularSource};
use crate::locator::{states::State, Locator, UrlTemplates};
use crate::value::Estimate;

/// FILEID, FILETYPE, STUSAB, CHARITER, SEQUENCE, LOGRECNO.
pub const SUPPORT_FIELDS: usize = 6;
pub const LOGRECNO_POS: usize = 5;

/// Header codes appear as `B01001_001` or, in older templates, `B01001e1`.
static HEADER_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+\d+[A-Za-z]*?)_?[eE]?(\d+)$").expect("header code pattern")
});

/// Canonical `TABLE_LLL` form of a sequence header code, if it looks like one.
pub fn canonical_code(header: &str) -> Option<(String, u32)> {
    let caps = HEADER_CODE_RE.captures(header.trim())?;
    let table = normalize_table_id(&caps[1]);
    let line: u32 = caps[2].parse().ok()?;
    Some((table, line))
}

fn ileave(est: &[String], margin: impl Fn(&String) -> String) -> Vec<String> {
    est.iter().flat_map(|e| [e.clone(), margin(e)]).collect()
}

/// Column names and descriptions of a sequence, from its header template.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceHeader {
    pub year: u16,
    pub release: Release,
    pub seq: u16,
    names: Vec<String>,
    descriptions: Vec<String>,
}

impl SequenceHeader {
    pub fn new(
        year: u16,
        release: Release,
        seq: u16,
        mut names: Vec<String>,
        mut descriptions: Vec<String>,
    ) -> Result<Self> {
        // spreadsheet rows can carry trailing empty cells
        for row in [&mut names, &mut descriptions] {
            while row.last().is_some_and(|n| n.is_empty()) {
                row.pop();
            }
        }
        if names.len() != descriptions.len() {
            return Err(AcsError::source_format(
                year,
                release,
                seq,
                format!(
                    "header template has {} column names but {} descriptions",
                    names.len(),
                    descriptions.len()
                ),
            ));
        }
        if names.len() < SUPPORT_FIELDS {
            return Err(AcsError::source_format(
                year,
                release,
                seq,
                format!("header template has only {} columns", names.len()),
            ));
        }
        Ok(SequenceHeader {
            year,
            release,
            seq,
            names,
            descriptions,
        })
    }

    #[instrument(level = "debug", skip(source, urls))]
    pub fn load<S: TabularSource + ?Sized>(
        source: &S,
        urls: &UrlTemplates,
        year: u16,
        release: Release,
        seq: u16,
    ) -> Result<Self> {
        let loc = urls.seq_header_url(year, release, seq)?;
        let mut rows = source.rows(&loc, Encoding::Latin1)?;
        let names = rows.next().transpose()?.unwrap_or_default();
        let descriptions = rows.next().transpose()?.unwrap_or_default();
        Self::new(year, release, seq, names, descriptions)
    }

    /// Number of estimate columns in the segment.
    pub fn data_width(&self) -> usize {
        self.names.len() - SUPPORT_FIELDS
    }

    pub fn data_names(&self) -> &[String] {
        &self.names[SUPPORT_FIELDS..]
    }

    pub fn data_descriptions(&self) -> &[String] {
        &self.descriptions[SUPPORT_FIELDS..]
    }

    /// Support field names followed by `name, name_m90` for every data column.
    pub fn file_headers(&self) -> Vec<String> {
        let mut v = self.names[..SUPPORT_FIELDS].to_vec();
        v.extend(ileave(self.data_names(), |e| format!("{}_m90", e)));
        v
    }

    /// Laid out like `file_headers`; margins have no description of their own.
    pub fn descriptions(&self) -> Vec<String> {
        let mut v = self.descriptions[..SUPPORT_FIELDS].to_vec();
        v.extend(ileave(self.data_descriptions(), |_| String::new()));
        v
    }

    /// Data offset of a column code, matched in canonical form.
    pub fn offset_of(&self, code: &str) -> Option<usize> {
        let want = canonical_code(code)?;
        self.data_names()
            .iter()
            .position(|n| canonical_code(n).as_ref() == Some(&want))
    }
}

/// Support fields and estimate/margin pairs of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRow {
    pub support: Vec<String>,
    pub values: Vec<Estimate>,
}

impl SequenceRow {
    pub fn logrecno(&self) -> &str {
        &self.support[LOGRECNO_POS]
    }

    /// Support fields then estimate and margin text, alternating.
    pub fn flatten(&self) -> Vec<String> {
        let mut v = self.support.clone();
        for e in &self.values {
            v.push(e.value.to_string());
            v.push(e.margin90.to_string());
        }
        v
    }
}

/// Reader for one (year, release, state, sequence).
#[derive(Debug, Clone)]
pub struct SequenceReader {
    pub state: &'static State,
    pub summary_level: SummaryLevel,
    header: Arc<SequenceHeader>,
    estimate: Locator,
    margin: Locator,
}

impl SequenceReader {
    /// Reuses a header already loaded for the same (year, release, sequence).
    pub fn with_header(
        urls: &UrlTemplates,
        header: Arc<SequenceHeader>,
        state: &'static State,
        summary_level: SummaryLevel,
    ) -> Result<Self> {
        let (year, release, seq) = (header.year, header.release, header.seq);
        Ok(SequenceReader {
            state,
            summary_level,
            estimate: urls.seq_estimate_url(year, release, state, summary_level, seq)?,
            margin: urls.seq_margin_url(year, release, state, summary_level, seq)?,
            header,
        })
    }

    pub fn new<S: TabularSource + ?Sized>(
        source: &S,
        urls: &UrlTemplates,
        year: u16,
        release: Release,
        state: &'static State,
        summary_level: SummaryLevel,
        seq: u16,
    ) -> Result<Self> {
        let header = SequenceHeader::load(source, urls, year, release, seq)?;
        Self::with_header(urls, Arc::new(header), state, summary_level)
    }

    pub fn header(&self) -> &SequenceHeader {
        &self.header
    }

    pub fn seq(&self) -> u16 {
        self.header.seq
    }

    pub fn file_headers(&self) -> Vec<String> {
        self.header.file_headers()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.header.descriptions()
    }

    /// Column metadata for the segment.
    ///
    /// With a catalog, the columns of every table stored in this sequence, carrying the
    /// template's long descriptions. Without one, a column per header code.
    pub fn columns(&self, catalog: Option<&TableCatalog>) -> Result<Vec<ColumnMeta>> {
        let h = &self.header;
        let descriptions = h.data_descriptions();
        match catalog {
            Some(cat) => {
                let tables = cat.tables_in_sequence(h.seq);
                if tables.is_empty() {
                    return Err(AcsError::source_format(
                        h.year,
                        h.release,
                        h.seq,
                        "table lookup has no table stored in this sequence",
                    ));
                }
                let mut cols: Vec<ColumnMeta> = tables
                    .iter()
                    .flat_map(|t| t.columns_in(h.seq).cloned())
                    .collect();
                for c in &mut cols {
                    let offset = h.offset_of(&c.code).unwrap_or(c.seq_offset);
                    c.long_description = descriptions.get(offset).cloned();
                }
                cols.sort_by_key(|c| c.seq_offset);
                Ok(cols)
            }
            None => {
                let mut cols: Vec<ColumnMeta> = Vec::with_capacity(h.data_width());
                for (offset, name) in h.data_names().iter().enumerate() {
                    let (table, line) = canonical_code(name).unwrap_or_else(|| (name.clone(), 0));
                    let position = cols.iter().filter(|c| c.table == table).count();
                    cols.push(ColumnMeta {
                        code: if line > 0 {
                            format!("{}_{:03}", table, line)
                        } else {
                            name.clone()
                        },
                        table,
                        line,
                        description: descriptions[offset].clone(),
                        long_description: Some(descriptions[offset].clone()),
                        stub: None,
                        seq: h.seq,
                        seq_offset: offset,
                        position,
                    });
                }
                Ok(cols)
            }
        }
    }

    /// Estimate and margin rows read in lock step; the shorter file ends the sequence.
    #[instrument(level = "debug", skip(self, source), fields(state = self.state.abbr, seq = self.header.seq))]
    pub fn rows<S: TabularSource + ?Sized>(&self, source: &S) -> Result<SequenceRows> {
        let est = source.rows(&self.estimate, Encoding::Latin1)?;
        let margin = source.rows(&self.margin, Encoding::Latin1)?;
        debug!(estimate = %self.estimate, margin = %self.margin, "reading sequence");
        Ok(SequenceRows {
            year: self.header.year,
            release: self.header.release,
            seq: self.header.seq,
            est,
            margin,
        })
    }
}

/// Lazy rows of one sequence for one state.
pub struct SequenceRows {
    year: u16,
    release: Release,
    seq: u16,
    est: RowStream,
    margin: RowStream,
}

impl SequenceRows {
    fn combine(&self, e: Vec<String>, m: Vec<String>) -> Result<SequenceRow> {
        if e.len() < SUPPORT_FIELDS {
            return Err(AcsError::source_format(
                self.year,
                self.release,
                self.seq,
                format!("estimate row has {} fields, fewer than the support fields", e.len()),
            ));
        }
        let values = e[SUPPORT_FIELDS..]
            .iter()
            .zip(m.iter().skip(SUPPORT_FIELDS))
            .map(|(v, mg)| Estimate::parse(v, mg))
            .collect();
        let mut support = e;
        support.truncate(SUPPORT_FIELDS);
        Ok(SequenceRow { support, values })
    }
}

impl Iterator for SequenceRows {
    type Item = Result<SequenceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let e = self.est.next()?;
        let m = self.margin.next()?;
        Some(match (e, m) {
            (Ok(e), Ok(m)) => self.combine(e, m),
            (Err(err), _) | (_, Err(err)) => Err(err),
        })
    }
}
