// src/assemble.rs
//
// Joins a table's sequence segments with the geography index, state by state.

use std::sync::Arc;
use tracing::{debug, info, instrument, trace};

use crate::address::{Release, StateScope, SummaryLevel, TableAddress};
use crate::catalog::{CatalogCache, ColumnMeta, TableCatalog, TableMeta};
use crate::error::{AcsError, Result};
use crate::fetch::TabularSource;
use crate::geo::{GeoHeader, GeoIndex};
use crate::locator::{states::State, UrlTemplates};
use crate::sequence::{SequenceHeader, SequenceReader, SequenceRow, SequenceRows};
use crate::value::{Estimate, Value};

/// Geography and record-id columns that lead every assembled row.
pub const GEO_COLUMNS: [&str; 5] = ["GEOID", "STUSAB", "COUNTY", "NAME", "LOGRECNO"];

/// One output row: geography attributes, the record number, and the table's
/// estimates in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRow {
    pub geoid: String,
    pub stusab: String,
    pub county: String,
    pub name: String,
    pub logrecno: String,
    pub values: Vec<Estimate>,
}

impl AssembledRow {
    /// Geography fields as text, then each estimate followed by its margin.
    pub fn flatten(&self) -> Vec<Value> {
        let mut v: Vec<Value> = [
            &self.geoid,
            &self.stusab,
            &self.county,
            &self.name,
            &self.logrecno,
        ]
        .into_iter()
        .map(|s| Value::Text(s.clone()))
        .collect();
        for e in &self.values {
            v.push(e.value.clone());
            v.push(e.margin90.clone());
        }
        v
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.flatten().iter().map(Value::to_string).collect()
    }
}

/// Which data offsets of one segment belong to the table.
#[derive(Debug, Clone)]
struct SegmentPlan {
    header: Arc<SequenceHeader>,
    offsets: Vec<usize>,
}

/// Resolves table requests against a tabular source.
pub struct TableAssembler<'a, S: ?Sized> {
    source: &'a S,
    urls: &'a UrlTemplates,
    catalogs: &'a CatalogCache,
}

impl<'a, S: TabularSource + ?Sized> TableAssembler<'a, S> {
    pub fn new(source: &'a S, urls: &'a UrlTemplates, catalogs: &'a CatalogCache) -> Self {
        TableAssembler {
            source,
            urls,
            catalogs,
        }
    }

    pub fn catalog(&self, year: u16, release: Release) -> Result<Arc<TableCatalog>> {
        self.catalogs.get_or_load(year, release, || {
            TableCatalog::load(self.source, self.urls, year, release)
        })
    }

    /// Plans the request and returns its rows, lazily, state by state.
    #[instrument(level = "info", skip(self, addr), fields(request = %addr))]
    pub fn assemble(&self, addr: &TableAddress) -> Result<AssembledTable<'a, S>> {
        self.assemble_parts(
            addr.year,
            addr.release,
            addr.state,
            addr.summary_level,
            &addr.table,
        )
    }

    pub fn assemble_parts(
        &self,
        year: u16,
        release: Release,
        scope: StateScope,
        summary_level: SummaryLevel,
        table_id: &str,
    ) -> Result<AssembledTable<'a, S>> {
        let catalog = self.catalog(year, release)?;
        let table = catalog.table(table_id)?.clone();

        // column membership is the same for every state, so plan it once
        let mut plans = Vec::with_capacity(table.segments.len());
        let mut columns: Vec<ColumnMeta> = Vec::with_capacity(table.columns.len());
        for seq in table.sequences() {
            let header = Arc::new(SequenceHeader::load(self.source, self.urls, year, release, seq)?);
            let plan = plan_segment(&table, &header, &mut columns)?;
            debug!(seq, columns = plan.offsets.len(), "segment planned");
            plans.push(plan);
        }
        if columns.len() != table.columns.len() {
            return Err(AcsError::source_format(
                year,
                release,
                table.segments.first().map_or(0, |s| s.seq),
                format!(
                    "table {} declares {} columns but its segments hold {}",
                    table.id,
                    table.columns.len(),
                    columns.len()
                ),
            ));
        }

        let geo_header = GeoHeader::load(self.source, self.urls, year, release)?;
        info!(
            table = %table.id,
            segments = plans.len(),
            columns = columns.len(),
            states = scope.states().len(),
            "assembling table"
        );

        Ok(AssembledTable {
            source: self.source,
            urls: self.urls,
            year,
            release,
            summary_level,
            table,
            columns,
            plans,
            geo_header,
            states: scope.states().iter(),
            current: None,
            done: false,
        })
    }
}

fn plan_segment(
    table: &TableMeta,
    header: &Arc<SequenceHeader>,
    columns: &mut Vec<ColumnMeta>,
) -> Result<SegmentPlan> {
    let descriptions = header.data_descriptions();
    let mut offsets = Vec::new();
    for col in table.columns_in(header.seq) {
        let offset = header.offset_of(&col.code).unwrap_or(col.seq_offset);
        if offset >= header.data_width() {
            return Err(AcsError::source_format(
                header.year,
                header.release,
                header.seq,
                format!(
                    "column {} at offset {} is past the {} data columns of the segment",
                    col.code,
                    offset,
                    header.data_width()
                ),
            ));
        }
        let mut c = col.clone();
        c.seq_offset = offset;
        c.long_description = descriptions.get(offset).filter(|d| !d.is_empty()).cloned();
        c.position = columns.len();
        columns.push(c);
        offsets.push(offset);
    }
    Ok(SegmentPlan {
        header: Arc::clone(header),
        offsets,
    })
}

/// Rows of one state: its geography index and a row stream per segment.
struct StateRows {
    state: &'static State,
    geo: GeoIndex,
    segments: Vec<SequenceRows>,
    emitted: usize,
}

/// Lazily assembled result of one table request.
pub struct AssembledTable<'a, S: ?Sized> {
    source: &'a S,
    urls: &'a UrlTemplates,
    year: u16,
    release: Release,
    summary_level: SummaryLevel,
    table: TableMeta,
    columns: Vec<ColumnMeta>,
    plans: Vec<SegmentPlan>,
    geo_header: GeoHeader,
    states: std::slice::Iter<'static, State>,
    current: Option<StateRows>,
    done: bool,
}

impl<'a, S: TabularSource + ?Sized> AssembledTable<'a, S> {
    pub fn table(&self) -> &TableMeta {
        &self.table
    }

    /// Table columns in output order, with long descriptions from the templates.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Geography fields, the record id, then `code, code_m90` per column.
    pub fn header(&self) -> Vec<String> {
        let mut h: Vec<String> = GEO_COLUMNS.iter().map(|s| s.to_string()).collect();
        for c in &self.columns {
            h.push(c.code.clone());
            h.push(c.margin_code());
        }
        h
    }

    /// Human titles laid out like `header`.
    pub fn titles(&self) -> Vec<String> {
        let mut t: Vec<String> = GEO_COLUMNS.iter().map(|s| s.to_string()).collect();
        for c in &self.columns {
            let d = c.best_description();
            t.push(d.to_string());
            t.push(format!("Margin for {}", d));
        }
        t
    }

    /// Header row first, then each data row as text.
    pub fn into_string_rows(self) -> impl Iterator<Item = Result<Vec<String>>> + 'a
    where
        S: 'a,
    {
        let header = self.header();
        std::iter::once(Ok(header)).chain(self.map(|r| r.map(|r| r.to_strings())))
    }

    fn open_state(&self, state: &'static State) -> Result<StateRows> {
        let geo = GeoIndex::load(
            self.source,
            self.urls,
            &self.geo_header,
            state,
            self.summary_level,
        )?;
        let segments = self
            .plans
            .iter()
            .map(|p| {
                SequenceReader::with_header(
                    self.urls,
                    Arc::clone(&p.header),
                    state,
                    self.summary_level,
                )?
                .rows(self.source)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(StateRows {
            state,
            geo,
            segments,
            emitted: 0,
        })
    }

    fn source_error(&self, seq: u16, detail: String) -> AcsError {
        AcsError::source_format(self.year, self.release, seq, detail)
    }

    /// Next row of the current state that passes the summary-level filter, or `None`
    /// when the state is exhausted.
    fn next_in_state(&mut self) -> Option<Result<AssembledRow>> {
        loop {
            let cur = self.current.as_mut()?;
            let mut parts: Vec<SequenceRow> = Vec::with_capacity(cur.segments.len());
            for stream in cur.segments.iter_mut() {
                match stream.next()? {
                    Ok(r) => parts.push(r),
                    Err(e) => return Some(Err(e)),
                }
            }
            let logrecno = parts[0].logrecno().to_string();
            if let Some((i, p)) = parts
                .iter()
                .enumerate()
                .find(|(_, p)| p.logrecno() != logrecno)
            {
                let seq = self.plans[i].header.seq;
                return Some(Err(self.source_error(
                    seq,
                    format!(
                        "{} record {} does not line up with record {} of sequence {}",
                        cur_state(&self.current),
                        p.logrecno(),
                        logrecno,
                        self.plans[0].header.seq
                    ),
                )));
            }

            let cur = self.current.as_mut()?;
            let Some(geo) = cur.geo.get(&logrecno) else {
                let seq = self.plans[0].header.seq;
                let state = cur.state.abbr;
                return Some(Err(self.source_error(
                    seq,
                    format!("{} record {} is missing from the geography file", state, logrecno),
                )));
            };
            if !geo.is_level(self.summary_level) {
                continue;
            }

            let mut values = Vec::with_capacity(self.columns.len());
            for (plan, part) in self.plans.iter().zip(parts.iter()) {
                for &off in &plan.offsets {
                    match part.values.get(off) {
                        Some(e) => values.push(e.clone()),
                        None => {
                            let detail = format!(
                                "record {} has {} values, column offset {} is past the end",
                                logrecno,
                                part.values.len(),
                                off
                            );
                            return Some(Err(AcsError::source_format(
                                self.year,
                                self.release,
                                plan.header.seq,
                                detail,
                            )));
                        }
                    }
                }
            }
            let row = AssembledRow {
                geoid: geo.geoid.clone(),
                stusab: geo.stusab.clone(),
                county: geo.county.clone(),
                name: geo.name.clone(),
                logrecno,
                values,
            };
            cur.emitted += 1;
            return Some(Ok(row));
        }
    }
}

fn cur_state(current: &Option<StateRows>) -> &'static str {
    current.as_ref().map_or("?", |c| c.state.abbr)
}

impl<'a, S: TabularSource + ?Sized> Iterator for AssembledTable<'a, S> {
    type Item = Result<AssembledRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if self.current.is_some() {
                match self.next_in_state() {
                    Some(Ok(row)) => return Some(Ok(row)),
                    Some(Err(e)) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                    None => {
                        if let Some(cur) = self.current.take() {
                            debug!(state = cur.state.abbr, rows = cur.emitted, "state done");
                        }
                    }
                }
            }
            let Some(state) = self.states.next() else {
                self.done = true;
                return None;
            };
            trace!(state = state.abbr, "opening state");
            match self.open_state(state) {
                Ok(rows) => self.current = Some(rows),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{self, Fixture};
    use crate::locator::states;

    fn collect(fx: &Fixture, addr: &str) -> Result<(Vec<String>, Vec<AssembledRow>)> {
        let assembler = fx.assembler();
        let table = assembler.assemble(&TableAddress::parse(addr)?)?;
        let header = table.header();
        let rows = table.collect::<Result<Vec<_>>>()?;
        Ok((header, rows))
    }

    #[test]
    fn header_width_is_geo_plus_interleaved_pairs() -> Result<()> {
        fixture::init_test_logging();
        let fx = Fixture::new();
        let (header, rows) = collect(&fx, "census://2016/5/RI/140/B17001")?;
        assert_eq!(header.len(), 4 + 1 + 2 * fixture::B17001_COLUMNS);
        assert_eq!(&header[..6], &["GEOID", "STUSAB", "COUNTY", "NAME", "LOGRECNO", "B17001_001"]);
        assert_eq!(header[6], "B17001_001_m90");
        for r in &rows {
            assert_eq!(r.flatten().len(), header.len());
        }
        Ok(())
    }

    #[test]
    fn only_the_requested_summary_level() -> Result<()> {
        let fx = Fixture::new();
        let (_, tracts) = collect(&fx, "2016/5/RI/tract/B17001")?;
        assert_eq!(tracts.len(), fixture::RI_TRACTS);
        assert!(tracts.iter().all(|r| r.geoid.starts_with("14000US44")));

        let (_, counties) = collect(&fx, "2016/5/RI/50/B17001")?;
        assert_eq!(counties.len(), fixture::RI_COUNTIES);
        assert!(counties.iter().all(|r| r.geoid.starts_with("05000US44")));

        let (_, none) = collect(&fx, "2016/5/RI/160/B17001")?;
        assert!(none.is_empty());
        Ok(())
    }

    #[test]
    fn values_are_coerced_and_projected() -> Result<()> {
        let fx = Fixture::new();
        let (_, rows) = collect(&fx, "2016/5/RI/140/B17001")?;
        let first = &rows[0];
        assert_eq!(first.logrecno, "0000010");
        assert_eq!(first.name, "Census Tract 101, Providence County, Rhode Island");
        assert_eq!(first.values[0].value, Value::Int(1010));
        assert_eq!(first.values[0].margin90, Value::Int(11));
        assert_eq!(first.values[1].value, Value::Float(1.5));
        // text cells survive coercion untouched
        assert_eq!(first.values[2].value, Value::Text(".".into()));
        Ok(())
    }

    #[test]
    fn idempotent() -> Result<()> {
        let fx = Fixture::new();
        let a = collect(&fx, "2016/5/RI/140/B17001")?;
        let b = collect(&fx, "2016/5/RI/140/B17001")?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn multi_segment_columns_are_concatenated() -> Result<()> {
        let fx = Fixture::new();
        let (header, rows) = collect(&fx, "2016/5/RI/140/B01001")?;
        let codes: Vec<_> = header[5..].iter().step_by(2).cloned().collect();
        assert_eq!(codes, vec!["B01001_001", "B01001_002", "B01001_003", "B01001_004"]);
        assert_eq!(header.len(), 5 + 2 * 4);
        let r = &rows[0];
        let v: Vec<_> = r.values.iter().map(|e| e.value.clone()).collect();
        assert_eq!(v, vec![Value::Int(30), Value::Int(14), Value::Int(16), Value::Int(5)]);
        Ok(())
    }

    #[test]
    fn national_scope_concatenates_states() -> Result<()> {
        let fx = Fixture::new();
        let (us_header, us) = collect(&fx, "2016/5/US/140/B17001")?;
        let mut expected = Vec::new();
        for st in states::ROSTER {
            let (h, rows) = collect(&fx, &format!("2016/5/{}/140/B17001", st.abbr))?;
            assert_eq!(h, us_header);
            expected.extend(rows);
        }
        assert_eq!(us, expected);

        let assembler = fx.assembler();
        let rows: Vec<_> = assembler
            .assemble(&TableAddress::parse("2016/5/US/140/B17001")?)?
            .into_string_rows()
            .collect::<Result<_>>()?;
        assert_eq!(rows.iter().filter(|r| r[0] == "GEOID").count(), 1);
        Ok(())
    }

    #[test]
    fn unknown_tables() -> Result<()> {
        let fx = Fixture::new();
        let assembler = fx.assembler();
        let err = match assembler.assemble(&TableAddress::parse("2016/5/RI/140/B99999")?) {
            Err(e) => e,
            Ok(_) => panic!("B99999 should not resolve"),
        };
        assert!(matches!(&err, AcsError::UnknownTable { sibling: None, .. }));
        assert!(err.to_string().contains("B99999"));

        let err = match assembler.assemble(&TableAddress::parse("2016/5/RI/140/c17001")?) {
            Err(e) => e,
            Ok(_) => panic!("C17001 should not resolve"),
        };
        assert!(err.to_string().contains("did you mean B17001"), "{}", err);
        Ok(())
    }

    #[test]
    fn catalog_is_fetched_once() -> Result<()> {
        let fx = Fixture::new();
        collect(&fx, "2016/5/RI/140/B17001")?;
        collect(&fx, "2016/5/RI/140/B01001")?;
        assert_eq!(fx.source.requests(&fx.lookup_locator()), 1);
        Ok(())
    }

    #[test]
    fn unsupported_vintage_is_a_config_error() -> Result<()> {
        let fx = Fixture::new();
        let err = match fx.assembler().assemble(&TableAddress::parse("2011/5/RI/140/B17001")?) {
            Err(e) => e,
            Ok(_) => panic!("2011 is not a supported vintage"),
        };
        assert!(matches!(err, AcsError::Config(ref m) if m.contains("2011/5")), "{}", err);
        Ok(())
    }

    fn source_error_seq(fx: &Fixture, addr: &str) -> Result<(u16, String)> {
        let assembler = fx.assembler();
        let err = match assembler.assemble(&TableAddress::parse(addr)?) {
            Ok(table) => match table.collect::<Result<Vec<_>>>() {
                Err(e) => e,
                Ok(rows) => panic!("{} assembled {} rows without error", addr, rows.len()),
            },
            Err(e) => e,
        };
        match err {
            AcsError::SourceFormat { seq, detail, .. } => Ok((seq, detail)),
            other => panic!("expected a source format error, got {:?}", other),
        }
    }

    #[test]
    fn segments_must_agree_on_record_numbers() -> Result<()> {
        let mut fx = Fixture::new();
        for loc in [
            fx.ri_estimates(SummaryLevel::TRACT, 3),
            fx.ri_margins(SummaryLevel::TRACT, 3),
        ] {
            fx.edit(&loc, |rows| rows[0][5] = "0000002".into());
        }
        let (seq, detail) = source_error_seq(&fx, "2016/5/RI/140/B01001")?;
        assert_eq!(seq, 3);
        assert!(detail.contains("0000002"), "{}", detail);

        // single-segment tables never compare record numbers across files
        collect(&fx, "2016/5/RI/140/B17001")?;
        Ok(())
    }

    #[test]
    fn records_must_exist_in_the_geography_file() -> Result<()> {
        let mut fx = Fixture::new();
        fx.edit(&fx.ri_geo(SummaryLevel::TRACT), |rows| {
            rows.retain(|r| r[4] != "0000011")
        });
        let (seq, detail) = source_error_seq(&fx, "2016/5/RI/140/B17001")?;
        assert_eq!(seq, 4);
        assert!(detail.contains("missing from the geography file"), "{}", detail);
        Ok(())
    }

    #[test]
    fn short_data_rows_are_source_errors() -> Result<()> {
        let mut fx = Fixture::new();
        fx.edit(&fx.ri_estimates(SummaryLevel::TRACT, 4), |rows| {
            rows[1].truncate(6 + 10)
        });
        let (seq, detail) = source_error_seq(&fx, "2016/5/RI/140/B17001")?;
        assert_eq!(seq, 4);
        assert!(detail.contains("past the end"), "{}", detail);

        // the two C17002 columns are still inside the short row
        collect(&fx, "2016/5/RI/140/C17002")?;
        Ok(())
    }

    #[test]
    fn columns_past_the_header_width_fail_planning() -> Result<()> {
        let mut fx = Fixture::new();
        let header = fx.urls.seq_header_url(fixture::YEAR, fixture::RELEASE, 4)?;
        fx.edit(&header, |rows| {
            for r in rows.iter_mut() {
                r.truncate(6 + 2 + 10);
            }
        });
        let err = match fx.assembler().assemble(&TableAddress::parse("2016/5/RI/140/B17001")?) {
            Err(e) => e,
            Ok(_) => panic!("planning should reject the short header"),
        };
        assert!(matches!(err, AcsError::SourceFormat { seq: 4, .. }), "{:?}", err);
        assert!(err.to_string().contains("B17001_011"), "{}", err);
        Ok(())
    }
}
