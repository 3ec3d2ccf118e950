//! Error types for ACS summary-file access.

use thiserror::Error;

use crate::address::Release;

/// Everything that can go wrong between a table request and its assembled rows.
#[derive(Debug, Error)]
pub enum AcsError {
    /// Caller mistake or an unrecognised file-format version: unsupported vintage,
    /// malformed address, bad state token.
    #[error("configuration error: {0}")]
    Config(String),

    /// Table id absent from the vintage's lookup file.
    #[error("{}", unknown_table_message(.table, .year, .release, .sibling))]
    UnknownTable {
        table: String,
        year: u16,
        release: Release,
        sibling: Option<String>,
    },

    #[error("unknown summary level name '{0}'")]
    UnknownSummaryLevel(String),

    #[error("unknown state or geoid '{0}'")]
    UnknownState(String),

    #[error("no column '{0}' in frame")]
    UnknownColumn(String),

    /// Geography header template lacks a column the index needs.
    #[error("geography header for {year}/{release} has no {column} column")]
    MissingGeoColumn {
        column: &'static str,
        year: u16,
        release: Release,
    },

    /// Remote files disagree with each other or with the lookup file.
    #[error("source format error in {year}/{release} sequence {seq}: {detail}")]
    SourceFormat {
        year: u16,
        release: Release,
        seq: u16,
        detail: String,
    },

    /// A reference file (lookup, template archive) is structurally unusable.
    #[error("malformed {resource}: {detail}")]
    Malformed { resource: String, detail: String },

    #[error("http error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http status {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("excel error: {0}")]
    Excel(String),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

fn unknown_table_message(
    table: &str,
    year: &u16,
    release: &Release,
    sibling: &Option<String>,
) -> String {
    match sibling {
        Some(s) => format!(
            "table {} not found in {}/{} lookup; did you mean {}?",
            table, year, release, s
        ),
        None => format!("table {} not found in {}/{} lookup", table, year, release),
    }
}

impl AcsError {
    pub(crate) fn source_format(
        year: u16,
        release: Release,
        seq: u16,
        detail: impl Into<String>,
    ) -> Self {
        AcsError::SourceFormat {
            year,
            release,
            seq,
            detail: detail.into(),
        }
    }

    pub(crate) fn malformed(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        AcsError::Malformed {
            resource: resource.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AcsError>;
