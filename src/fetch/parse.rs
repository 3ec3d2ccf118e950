// src/fetch/parse.rs

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;

use crate::error::{AcsError, Result};

/// Lazy sequence of parsed rows.
pub type RowStream = Box<dyn Iterator<Item = Result<Vec<String>>>>;

/// Text encoding of a delimited file. Census reference and geography files are
/// latin-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            // every latin-1 byte is the code point of the same value
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Headerless, flexible CSV. Fields are decoded and trimmed; the header row, if the
/// file has one, comes back as the first row.
pub fn csv_rows(bytes: Vec<u8>, encoding: Encoding) -> RowStream {
    let rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(bytes));
    Box::new(rdr.into_byte_records().map(move |rec| -> Result<Vec<String>> {
        let rec = rec?;
        Ok(rec
            .iter()
            .map(|f| encoding.decode(f).trim().to_string())
            .collect())
    }))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

/// Rows of the first worksheet of an `.xls`/`.xlsx` workbook, as display strings.
pub fn excel_rows(bytes: Vec<u8>) -> Result<Vec<Vec<String>>> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| AcsError::Excel(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AcsError::Excel("workbook has no worksheets".to_string()))?
        .map_err(|e| AcsError::Excel(e.to_string()))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}
