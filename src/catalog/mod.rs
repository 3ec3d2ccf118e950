// src/catalog/mod.rs
//
// Table metadata for one (year, release): which sequence segments hold each table and
// where each of its columns sits inside them, parsed from the release's
// sequence/table-number lookup file.

pub mod cache;
pub mod shell;

pub use cache::CatalogCache;
pub use shell::TableShell;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

use crate::address::Release;
use crate::error::{AcsError, Result};
use crate::fetch::{Encoding, TabularSource};
use crate::locator::UrlTemplates;

/// Position of the first data column in a sequence row (1-based). Columns 1..=6 are
/// FILEID, FILETYPE, STUSAB, CHARITER, SEQUENCE and LOGRECNO.
pub const FIRST_DATA_POSITION: usize = 7;

/// One estimate column of a table. Its margin twin shares everything except the code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMeta {
    /// `<table>_<line:03>`, e.g. `B17001_002`.
    pub code: String,
    pub table: String,
    pub line: u32,
    /// Text from the lookup file's title column for this line.
    pub description: String,
    /// Fully qualified description from the sequence header template, when known.
    pub long_description: Option<String>,
    /// Indented label from the table shell, when the shell was available.
    pub stub: Option<String>,
    /// Sequence number of the segment holding the column.
    pub seq: u16,
    /// Zero-based index among the segment's data columns.
    pub seq_offset: usize,
    /// Zero-based index among the table's columns.
    pub position: usize,
}

impl ColumnMeta {
    pub fn margin_code(&self) -> String {
        format!("{}_m90", self.code)
    }

    /// Long description if there is one, otherwise the short one.
    pub fn best_description(&self) -> &str {
        self.long_description.as_deref().unwrap_or(&self.description)
    }
}

/// One physical slice of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub seq: u16,
    /// 1-based start position of the slice in the sequence row.
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMeta {
    pub id: String,
    pub title: String,
    pub universe: Option<String>,
    pub subject: Option<String>,
    pub segments: Vec<Segment>,
    /// Keyed by line number, so iteration is in table order.
    pub columns: BTreeMap<u32, ColumnMeta>,
}

impl TableMeta {
    pub fn sequences(&self) -> Vec<u16> {
        self.segments.iter().map(|s| s.seq).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns.values()
    }

    /// Columns stored in one segment, in table order.
    pub fn columns_in(&self, seq: u16) -> impl Iterator<Item = &ColumnMeta> {
        self.columns.values().filter(move |c| c.seq == seq)
    }
}

/// Uppercase, with the numeric part left-padded to five digits: `b1701` → `B01701`.
pub fn normalize_table_id(id: &str) -> String {
    let id = id.trim().to_ascii_uppercase();
    let prefix_len = id.find(|c: char| c.is_ascii_digit()).unwrap_or(id.len());
    let (prefix, rest) = id.split_at(prefix_len);
    let digits_len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, suffix) = rest.split_at(digits_len);
    if digits.is_empty() {
        return id;
    }
    format!("{}{:0>5}{}", prefix, digits, suffix)
}

/// The same table under the other of the detailed (B) / collapsed (C) prefixes.
fn sibling_id(id: &str) -> Option<String> {
    if let Some(rest) = id.strip_prefix('B') {
        Some(format!("C{}", rest))
    } else {
        id.strip_prefix('C').map(|rest| format!("B{}", rest))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCatalog {
    pub year: u16,
    pub release: Release,
    tables: HashMap<String, TableMeta>,
}

/// Column indexes of the lookup file fields this parser reads.
struct LookupHeader {
    table_id: usize,
    seq: usize,
    line: usize,
    start: usize,
    title: usize,
    subject: Option<usize>,
}

impl LookupHeader {
    fn from_row(row: &[String], year: u16, release: Release) -> Result<Self> {
        let find = |name: &str| row.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let need = |name: &str| {
            find(name).ok_or_else(|| {
                AcsError::malformed(
                    format!("{}/{} table lookup", year, release),
                    format!("header has no '{}' column", name),
                )
            })
        };
        Ok(LookupHeader {
            table_id: need("Table ID")?,
            seq: need("Sequence Number")?,
            line: need("Line Number")?,
            start: need("Start Position")?,
            title: need("Table Title")?,
            subject: find("Subject Area"),
        })
    }
}

fn field(row: &[String], i: usize) -> &str {
    row.get(i).map(|s| s.trim()).unwrap_or("")
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl TableCatalog {
    /// Fetches and parses the lookup file for the vintage, then merges the table
    /// shell. A vintage without a published shell keeps the lookup data alone.
    #[instrument(level = "info", skip(source, urls))]
    pub fn load<S: TabularSource + ?Sized>(
        source: &S,
        urls: &UrlTemplates,
        year: u16,
        release: Release,
    ) -> Result<Self> {
        let loc = urls.table_lookup_url(year, release)?;
        let rows = source.rows(&loc, Encoding::Latin1)?;
        let mut catalog = Self::from_rows(year, release, rows)?;
        match TableShell::load(source, urls, year, release) {
            Ok(shell) => catalog.merge_shell(&shell),
            Err(AcsError::HttpStatus { status: 404, url }) => {
                warn!(%url, "no table shell for this vintage");
            }
            Err(e) => return Err(e),
        }
        info!(tables = catalog.len(), "table catalog built");
        Ok(catalog)
    }

    /// Builds the catalog from lookup rows, header row first.
    pub fn from_rows<I>(year: u16, release: Release, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Vec<String>>>,
    {
        let mut rows = rows.into_iter();
        let header = match rows.next() {
            Some(h) => h?,
            None => {
                return Err(AcsError::malformed(
                    format!("{}/{} table lookup", year, release),
                    "file is empty",
                ))
            }
        };
        let h = LookupHeader::from_row(&header, year, release)?;

        let mut tables: HashMap<String, TableMeta> = HashMap::new();
        // columns seen so far in each table's current segment
        let mut in_segment: HashMap<String, usize> = HashMap::new();

        for row in rows {
            let row = row?;
            let raw_id = field(&row, h.table_id);
            if raw_id.is_empty() {
                continue;
            }
            let id = normalize_table_id(raw_id);
            let line = field(&row, h.line);
            let title = field(&row, h.title);

            if line.is_empty() {
                if title.contains("Universe") {
                    if let Some(t) = tables.get_mut(&id) {
                        let u = title.trim_start_matches("Universe:").trim();
                        t.universe = non_empty(u);
                    }
                    continue;
                }

                let seq = parse_seq(field(&row, h.seq), year, release, &id)?;
                let start: usize = field(&row, h.start).parse().map_err(|_| {
                    AcsError::source_format(
                        year,
                        release,
                        seq,
                        format!("table {} has non-numeric start position", id),
                    )
                })?;
                let subject = h.subject.and_then(|i| non_empty(field(&row, i)));

                match tables.get_mut(&id) {
                    Some(t) => {
                        if start != FIRST_DATA_POSITION {
                            return Err(AcsError::source_format(
                                year,
                                release,
                                seq,
                                format!(
                                    "continuation of table {} starts at position {}, expected {}",
                                    id, start, FIRST_DATA_POSITION
                                ),
                            ));
                        }
                        debug!(table = %id, seq, "additional segment");
                        t.segments.push(Segment { seq, start });
                        if t.subject.is_none() {
                            t.subject = subject;
                        }
                    }
                    None => {
                        tables.insert(
                            id.clone(),
                            TableMeta {
                                id: id.clone(),
                                title: title.to_string(),
                                universe: None,
                                subject,
                                segments: vec![Segment { seq, start }],
                                columns: BTreeMap::new(),
                            },
                        );
                    }
                }
                in_segment.insert(id, 0);
                continue;
            }

            // fractional line numbers are sub-headings
            let Ok(line_no) = line.parse::<u32>() else {
                continue;
            };
            let Some(t) = tables.get_mut(&id) else {
                continue;
            };
            let Some(seg) = t.segments.last().copied() else {
                continue;
            };
            if let Some(c) = t.columns.get_mut(&line_no) {
                c.description = title.to_string();
                continue;
            }
            let ordinal = in_segment.entry(id.clone()).or_insert(0);
            let position = t.columns.len();
            t.columns.insert(
                line_no,
                ColumnMeta {
                    code: format!("{}_{:03}", id, line_no),
                    table: id.clone(),
                    line: line_no,
                    description: title.to_string(),
                    long_description: None,
                    stub: None,
                    seq: seg.seq,
                    seq_offset: seg.start.saturating_sub(FIRST_DATA_POSITION) + *ordinal,
                    position,
                },
            );
            *ordinal += 1;
        }

        // lines can arrive out of order; positions follow line order
        for t in tables.values_mut() {
            for (i, c) in t.columns.values_mut().enumerate() {
                c.position = i;
            }
        }

        Ok(TableCatalog {
            year,
            release,
            tables,
        })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Looks a table up by id, case-insensitively and with the numeric part padded.
    /// A miss names the B/C sibling when the catalog has it.
    pub fn table(&self, id: &str) -> Result<&TableMeta> {
        let key = normalize_table_id(id);
        self.tables.get(&key).ok_or_else(|| AcsError::UnknownTable {
            sibling: sibling_id(&key).filter(|s| self.tables.contains_key(s)),
            table: key,
            year: self.year,
            release: self.release,
        })
    }

    /// Tables with at least one segment in `seq`, sorted by id.
    pub fn tables_in_sequence(&self, seq: u16) -> Vec<&TableMeta> {
        let mut v: Vec<&TableMeta> = self
            .tables
            .values()
            .filter(|t| t.segments.iter().any(|s| s.seq == seq))
            .collect();
        v.sort_by(|a, b| a.id.cmp(&b.id));
        v
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableMeta> {
        self.tables.values()
    }
}

fn parse_seq(s: &str, year: u16, release: Release, table: &str) -> Result<u16> {
    s.parse().map_err(|_| {
        AcsError::malformed(
            format!("{}/{} table lookup", year, release),
            format!("table {} has sequence number '{}'", table, s),
        )
    })
}
