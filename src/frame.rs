// src/frame.rs
//
// Columnar view of assembled rows, with the ACS handbook's margin-of-error
// propagation for derived estimates.

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    collections::HashMap,
    fs::{self, File},
    io::BufWriter,
    path::Path,
    sync::Arc,
};
use tracing::{info, instrument};

use crate::assemble::{AssembledRow, AssembledTable, GEO_COLUMNS};
use crate::error::{AcsError, Result};
use crate::fetch::TabularSource;
use crate::value::Value;

pub const TITLE_KEY: &str = "title";

/// An estimate series paired with its 90% margins.
pub type Series = (Float64Array, Float64Array);

/// Assembled rows as an Arrow record batch: text geography columns, then `Float64`
/// estimate and margin columns. Non-numeric cells become nulls.
#[derive(Debug, Clone)]
pub struct CensusFrame {
    batch: RecordBatch,
}

impl CensusFrame {
    pub fn from_rows(header: &[String], rows: &[AssembledRow], titles: &[String]) -> Result<Self> {
        let flat: Vec<Vec<Value>> = rows.iter().map(AssembledRow::flatten).collect();
        let mut fields = Vec::with_capacity(header.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(header.len());

        for (i, name) in header.iter().enumerate() {
            let title = titles.get(i).cloned().unwrap_or_else(|| name.clone());
            let meta = HashMap::from([(TITLE_KEY.to_string(), title)]);
            if i < GEO_COLUMNS.len() {
                fields.push(Field::new(name, DataType::Utf8, true).with_metadata(meta));
                let values: StringArray = flat
                    .iter()
                    .map(|r| r.get(i).map(|v| v.to_string()))
                    .collect();
                columns.push(Arc::new(values));
            } else {
                fields.push(Field::new(name, DataType::Float64, true).with_metadata(meta));
                let values: Float64Array = flat
                    .iter()
                    .map(|r| r.get(i).and_then(Value::as_f64))
                    .collect();
                columns.push(Arc::new(values));
            }
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(CensusFrame { batch })
    }

    /// Drains an assembled table into a frame.
    pub fn from_table<S: TabularSource + ?Sized>(table: AssembledTable<'_, S>) -> Result<Self> {
        let header = table.header();
        let titles = table.titles();
        let rows = table.collect::<Result<Vec<_>>>()?;
        Self::from_rows(&header, &rows, &titles)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Human-readable title of a column.
    pub fn title(&self, name: &str) -> Option<&str> {
        let (_, field) = self.batch.schema_ref().column_with_name(name)?;
        field.metadata().get(TITLE_KEY).map(String::as_str)
    }

    pub fn numeric(&self, name: &str) -> Result<&Float64Array> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
            .ok_or_else(|| AcsError::UnknownColumn(name.to_string()))
    }

    pub fn text(&self, name: &str) -> Result<&StringArray> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| AcsError::UnknownColumn(name.to_string()))
    }

    /// An estimate column and its `_m90` twin.
    pub fn series(&self, name: &str) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>)> {
        let est = self.numeric(name)?.iter().collect();
        let m90 = self.numeric(&format!("{}_m90", name))?.iter().collect();
        Ok((est, m90))
    }

    /// Row index of each GEOID.
    pub fn geoid_index(&self) -> Result<HashMap<String, usize>> {
        let geoids = self.text("GEOID")?;
        Ok(geoids
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.map(|g| (g.to_string(), i)))
            .collect())
    }

    /// Sum of the estimates; margins combine as the root of the summed squares.
    pub fn sum_with_margin(&self, cols: &[&str]) -> Result<Series> {
        let series = cols
            .iter()
            .map(|c| self.series(c))
            .collect::<Result<Vec<_>>>()?;
        let n = self.num_rows();
        let mut est = Vec::with_capacity(n);
        let mut m90 = Vec::with_capacity(n);
        for row in 0..n {
            let mut e = Some(0.0);
            let mut sq = Some(0.0);
            for (ev, mv) in &series {
                e = e.zip(ev[row]).map(|(a, b)| a + b);
                sq = sq.zip(mv[row]).map(|(a, b)| a + b * b);
            }
            est.push(e);
            m90.push(sq.map(f64::sqrt));
        }
        Ok((Float64Array::from(est), Float64Array::from(m90)))
    }

    /// Ratio of two columns where the numerator is not part of the denominator.
    pub fn ratio(&self, num: &str, den: &str) -> Result<Series> {
        self.derive_ratio(num, den, false)
    }

    /// Ratio where the numerator is a subset of the denominator. When the subset
    /// formula's radicand is not positive the ratio formula is used instead.
    pub fn proportion(&self, num: &str, den: &str) -> Result<Series> {
        self.derive_ratio(num, den, true)
    }

    fn derive_ratio(&self, num: &str, den: &str, subset: bool) -> Result<Series> {
        let (n, nm) = self.series(num)?;
        let (d, dm) = self.series(den)?;
        let mut est = Vec::with_capacity(n.len());
        let mut m90 = Vec::with_capacity(n.len());
        for i in 0..n.len() {
            let (r, m) = match (n[i], nm[i], d[i], dm[i]) {
                (Some(n), Some(nm), Some(d), Some(dm)) if d != 0.0 => {
                    let r = n / d;
                    (Some(r), ratio_margin(nm, dm, r, d, subset))
                }
                _ => (None, None),
            };
            est.push(r);
            m90.push(m);
        }
        Ok((Float64Array::from(est), Float64Array::from(m90)))
    }

    pub fn product(&self, a: &str, b: &str) -> Result<Series> {
        let (a, am) = self.series(a)?;
        let (b, bm) = self.series(b)?;
        let mut est = Vec::with_capacity(a.len());
        let mut m90 = Vec::with_capacity(a.len());
        for i in 0..a.len() {
            match (a[i], am[i], b[i], bm[i]) {
                (Some(a), Some(am), Some(b), Some(bm)) => {
                    est.push(Some(a * b));
                    m90.push(Some((a * a * bm * bm + b * b * am * am).sqrt()));
                }
                _ => {
                    est.push(None);
                    m90.push(None);
                }
            }
        }
        Ok((Float64Array::from(est), Float64Array::from(m90)))
    }

    /// Writes the batch as Snappy-compressed Parquet, atomically.
    #[instrument(level = "info", skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("parquet.tmp");
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), self.batch.schema(), Some(props))?;
        writer.write(&self.batch)?;
        writer.close()?;
        fs::rename(&tmp, path)?;
        info!(rows = self.num_rows(), "parquet written");
        Ok(())
    }
}

fn ratio_margin(nm: f64, dm: f64, r: f64, d: f64, subset: bool) -> Option<f64> {
    let general = nm * nm + r * r * dm * dm;
    if !subset {
        return Some(general.sqrt() / d);
    }
    let sub = nm * nm - r * r * dm * dm;
    if sub > 0.0 {
        Some(sub.sqrt() / d)
    } else {
        (general > 0.0).then(|| general.sqrt() / d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Estimate;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn sample() -> CensusFrame {
        let header: Vec<String> = GEO_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(["T_001", "T_001_m90", "T_002", "T_002_m90"].map(String::from))
            .collect();
        let row = |geoid: &str, a: &str, am: &str, b: &str, bm: &str| AssembledRow {
            geoid: geoid.into(),
            stusab: "RI".into(),
            county: "007".into(),
            name: geoid.into(),
            logrecno: "0000010".into(),
            values: vec![Estimate::parse(a, am), Estimate::parse(b, bm)],
        };
        let rows = vec![
            row("g1", "100", "30", "40", "40"),
            row("g2", "200", "20", "50", "10"),
            row("g3", ".", ".", "0", "5"),
        ];
        let mut titles = header.clone();
        titles[5] = "Total:".into();
        CensusFrame::from_rows(&header, &rows, &titles).unwrap()
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn schema_and_titles() -> Result<()> {
        let f = sample();
        assert_eq!(f.num_rows(), 3);
        assert_eq!(f.column_names()[5], "T_001");
        assert_eq!(f.title("T_001"), Some("Total:"));
        assert_eq!(f.numeric("T_001")?.null_count(), 1);
        assert!(matches!(f.numeric("GEOID"), Err(AcsError::UnknownColumn(_))));
        assert_eq!(f.geoid_index()?["g2"], 1);
        Ok(())
    }

    #[test]
    fn sums_add_margins_in_quadrature() -> Result<()> {
        let (est, m90) = sample().sum_with_margin(&["T_001", "T_002"])?;
        assert!(close(Some(est.value(0)), 140.0));
        assert!(close(Some(m90.value(0)), 50.0));
        assert!(est.is_null(2));
        Ok(())
    }

    #[test]
    fn ratio_and_proportion() -> Result<()> {
        let f = sample();
        // row 0: r = 0.4; general radicand 40² + 0.16·30² = 1744
        let (r, m) = f.ratio("T_002", "T_001")?;
        assert!(close(Some(r.value(0)), 0.4));
        assert!(close(Some(m.value(0)), 1744f64.sqrt() / 100.0));

        // subset radicand 1600 - 144 = 1456 > 0
        let (_, m) = f.proportion("T_002", "T_001")?;
        assert!(close(Some(m.value(0)), 1456f64.sqrt() / 100.0));

        // row 1: p = 0.25; subset radicand 100 - 0.0625·400 = 75
        assert!(close(Some(m.value(1)), 75f64.sqrt() / 200.0));

        // missing numerators give nulls
        let (r, _) = f.ratio("T_001", "T_002")?;
        assert!(r.is_null(2));
        Ok(())
    }

    #[test]
    fn proportion_falls_back_to_ratio_formula() {
        // subset radicand 1 - 1·100 < 0, general 1 + 100
        assert!(close(ratio_margin(1.0, 10.0, 1.0, 10.0, true), 101f64.sqrt() / 10.0));
        assert_eq!(ratio_margin(0.0, 0.0, 1.0, 10.0, true), None);
    }

    #[test]
    fn exact_ratio_has_zero_margin() -> Result<()> {
        let header: Vec<String> = GEO_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(["A", "A_m90", "B", "B_m90"].map(String::from))
            .collect();
        let row = AssembledRow {
            geoid: "g1".into(),
            stusab: "RI".into(),
            county: "".into(),
            name: "g1".into(),
            logrecno: "1".into(),
            values: vec![Estimate::parse("50", "0"), Estimate::parse("100", "0")],
        };
        let f = CensusFrame::from_rows(&header, &[row], &header)?;

        let (r, m) = f.ratio("A", "B")?;
        assert!(close(Some(r.value(0)), 0.5));
        assert!(m.is_valid(0));
        assert_eq!(m.value(0), 0.0);

        // both proportion radicands are zero
        let (_, m) = f.proportion("A", "B")?;
        assert!(m.is_null(0));
        Ok(())
    }

    #[test]
    fn product_margin() -> Result<()> {
        let (p, m) = sample().product("T_001", "T_002")?;
        assert!(close(Some(p.value(1)), 10_000.0));
        // sqrt(200²·10² + 50²·20²)
        assert!(close(Some(m.value(1)), (4_000_000f64 + 1_000_000f64).sqrt()));
        Ok(())
    }

    #[test]
    fn parquet_round_trip_keeps_rows() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("b17001.parquet");
        let f = sample();
        f.write_parquet(&path)?;
        assert!(!path.with_extension("parquet.tmp").exists());

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let mut rows = 0;
        for batch in reader {
            rows += batch?.num_rows();
        }
        assert_eq!(rows, 3);
        Ok(())
    }
}
