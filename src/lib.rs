// src/lib.rs
//
// Table-oriented access to the American Community Survey summary files: resolve a
// `census://` address to the remote sequence and geography files, then stream the
// table's rows for every matching geography.

pub mod address;
pub mod assemble;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod geo;
pub mod locator;
pub mod sequence;
pub mod value;

#[cfg(test)]
mod fixture;

pub use address::{GeoAddress, Release, StateScope, SummaryLevel, TableAddress};
pub use assemble::{AssembledRow, AssembledTable, TableAssembler};
pub use catalog::{CatalogCache, ColumnMeta, TableCatalog, TableMeta};
pub use client::AcsClient;
pub use config::Config;
pub use dimensions::{DimensionRules, Dimensions};
pub use error::{AcsError, Result};
pub use frame::CensusFrame;
pub use locator::{Locator, UrlTemplates};
pub use value::{Estimate, Value};
