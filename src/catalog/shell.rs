// src/catalog/shell.rs
//
// The release's table-shell workbook: one row per table title, universe and column
// stub. It carries the short column labels the lookup file lacks, and universes for
// tables whose lookup entry has none.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

use super::{normalize_table_id, TableCatalog};
use crate::address::Release;
use crate::error::{AcsError, Result};
use crate::fetch::{Encoding, TabularSource};
use crate::locator::UrlTemplates;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShellTable {
    pub id: String,
    pub title: String,
    pub universe: Option<String>,
    /// Stub text by line number.
    pub stubs: BTreeMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableShell {
    tables: HashMap<String, ShellTable>,
}

struct ShellHeader {
    table_id: usize,
    line: usize,
    unique_id: usize,
    stub: usize,
}

impl ShellHeader {
    fn from_row(row: &[String], year: u16, release: Release) -> Result<Self> {
        let need = |name: &str| {
            row.iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    AcsError::malformed(
                        format!("{}/{} table shell", year, release),
                        format!("header has no '{}' column", name),
                    )
                })
        };
        Ok(ShellHeader {
            table_id: need("Table ID")?,
            line: need("Line")?,
            unique_id: need("UniqueID")?,
            stub: need("Stub")?,
        })
    }
}

fn cell(row: &[String], i: usize) -> &str {
    row.get(i).map(|s| s.trim()).unwrap_or("")
}

impl TableShell {
    #[instrument(level = "info", skip(source, urls))]
    pub fn load<S: TabularSource + ?Sized>(
        source: &S,
        urls: &UrlTemplates,
        year: u16,
        release: Release,
    ) -> Result<Self> {
        let loc = urls.table_shell_url(year, release)?;
        let shell = Self::from_rows(year, release, source.rows(&loc, Encoding::Utf8)?)?;
        info!(tables = shell.len(), "table shell parsed");
        Ok(shell)
    }

    /// Rows with UniqueID set are column stubs; the others are table titles, or
    /// universes when the stub says so.
    pub fn from_rows<I>(year: u16, release: Release, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Vec<String>>>,
    {
        let mut rows = rows.into_iter();
        let h = match rows.next() {
            Some(r) => ShellHeader::from_row(&r?, year, release)?,
            None => return Ok(TableShell::default()),
        };

        let mut tables: HashMap<String, ShellTable> = HashMap::new();
        for row in rows {
            let row = row?;
            let raw_id = cell(&row, h.table_id);
            if raw_id.is_empty() {
                continue;
            }
            let id = normalize_table_id(raw_id);
            let stub = cell(&row, h.stub);

            if cell(&row, h.unique_id).is_empty() {
                match tables.get_mut(&id) {
                    None => {
                        tables.insert(
                            id.clone(),
                            ShellTable {
                                id,
                                title: stub.to_string(),
                                ..ShellTable::default()
                            },
                        );
                    }
                    Some(t) if stub.contains("Universe") => {
                        let u = stub.trim_start_matches("Universe:").trim();
                        t.universe = (!u.is_empty()).then(|| u.to_string());
                    }
                    Some(_) => {}
                }
                continue;
            }

            // fractional lines are headings
            let Ok(line) = cell(&row, h.line).parse::<u32>() else {
                continue;
            };
            if let Some(t) = tables.get_mut(&id) {
                t.stubs.insert(line, stub.to_string());
            }
        }
        Ok(TableShell { tables })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, id: &str) -> Option<&ShellTable> {
        self.tables.get(&normalize_table_id(id))
    }
}

impl TableCatalog {
    /// Copies shell stubs onto matching columns and fills universes the lookup
    /// file left empty. Tables only the shell knows are ignored.
    pub fn merge_shell(&mut self, shell: &TableShell) {
        let mut merged = 0usize;
        for t in self.tables.values_mut() {
            let Some(s) = shell.table(&t.id) else {
                continue;
            };
            if t.universe.is_none() {
                t.universe = s.universe.clone();
            }
            for (line, c) in t.columns.iter_mut() {
                if let Some(stub) = s.stubs.get(line) {
                    c.stub = Some(stub.clone());
                }
            }
            merged += 1;
        }
        debug!(tables = merged, "table shell merged");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemorySource;
    use crate::fixture::{self, Fixture};

    fn rows(lines: &[&[&str]]) -> Vec<Result<Vec<String>>> {
        lines
            .iter()
            .map(|l| Ok(l.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    const HEADER: &[&str] = &["Table ID", "Line", "UniqueID", "Stub", "Data Release"];

    #[test]
    fn titles_universes_and_stubs() -> Result<()> {
        let shell = TableShell::from_rows(
            2016,
            Release::Five,
            rows(&[
                HEADER,
                &["B01001", "", "", "SEX BY AGE", ""],
                &["B01001", "", "", "Universe:  Total population", ""],
                &["B01001", "1", "B01001_001", "Total:", ""],
                &["B01001", "2", "B01001_002", "Male:", ""],
                &["B01001", "2.5", "B01001_002.5", "heading", ""],
                &["", "", "", "", ""],
                &["b1002", "", "", "MEDIAN AGE BY SEX", ""],
            ]),
        )?;
        assert_eq!(shell.len(), 2);
        let t = shell.table("b01001").unwrap();
        assert_eq!(t.title, "SEX BY AGE");
        assert_eq!(t.universe.as_deref(), Some("Total population"));
        assert_eq!(t.stubs.len(), 2);
        assert_eq!(t.stubs[&2], "Male:");
        assert!(shell.table("B01002").is_some());
        Ok(())
    }

    #[test]
    fn missing_stub_column() {
        let err = TableShell::from_rows(2016, Release::Five, rows(&[&["Table ID", "Line", "UniqueID"]]))
            .unwrap_err();
        assert!(err.to_string().contains("Stub"));
    }

    #[test]
    fn catalog_load_merges_the_shell() -> Result<()> {
        fixture::init_test_logging();
        let fx = Fixture::new();
        let cat = fx.assembler().catalog(fixture::YEAR, fixture::RELEASE)?;

        let c17002 = cat.table("C17002")?;
        assert_eq!(
            c17002.universe.as_deref(),
            Some("Population for whom poverty status is determined")
        );
        // lookup titles are kept
        assert_eq!(c17002.title, "RATIO OF INCOME TO POVERTY LEVEL");

        let b01001 = cat.table("B01001")?;
        assert_eq!(b01001.columns[&3].stub.as_deref(), Some("Under 5 years"));
        assert_eq!(cat.table("B17001")?.columns[&1].stub, None);
        Ok(())
    }

    #[test]
    fn catalog_without_a_shell() -> Result<()> {
        let fx = Fixture::new();
        let lookup = fx.source.collect_rows(&fx.lookup_locator(), Encoding::Latin1)?;
        let mut source = MemorySource::new();
        source.insert(fx.lookup_locator(), lookup);

        let cat = TableCatalog::load(&source, &fx.urls, fixture::YEAR, fixture::RELEASE)?;
        assert!(cat.table("C17002")?.universe.is_none());
        assert_eq!(cat.table("B01001")?.columns[&3].stub, None);
        Ok(())
    }

    #[test]
    fn unreadable_shell_fails_the_catalog() {
        let mut fx = Fixture::new();
        let loc = fx.urls.table_shell_url(fixture::YEAR, fixture::RELEASE).unwrap();
        fx.source.insert(loc, vec![vec!["Table ID", "Line"]]);
        let err = TableCatalog::load(&fx.source, &fx.urls, fixture::YEAR, fixture::RELEASE).unwrap_err();
        assert!(matches!(err, AcsError::Malformed { .. }), "{:?}", err);
    }
}
