// src/fixture.rs
//
// A small synthetic 2016 5-year vintage served from memory. Rhode Island has data;
// every other state has empty geography and sequence files.
//
// Tables:
//   B01001  two segments, sequences 2 and 3, two columns each
//   C17002  sequence 4, start 7, two columns
//   B17001  sequence 4, start 9, 52 columns

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::address::{Release, SummaryLevel};
use crate::assemble::TableAssembler;
use crate::catalog::CatalogCache;
use crate::fetch::{Encoding, MemorySource, TabularSource};
use crate::locator::{states, GeoGroup, Locator, UrlTemplates};

pub const YEAR: u16 = 2016;
pub const RELEASE: Release = Release::Five;
pub const B17001_COLUMNS: usize = 52;
pub const RI_TRACTS: usize = 3;
pub const RI_COUNTIES: usize = 5;

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,acsfiles=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

const SUPPORT: [&str; 6] = ["FILEID", "FILETYPE", "STUSAB", "CHARITER", "SEQUENCE", "LOGRECNO"];

fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

/// (logrecno, sumlevel, county, geoid, name)
type GeoLine = (&'static str, &'static str, &'static str, &'static str, &'static str);

const RI_TRACT_GROUP: &[GeoLine] = &[
    ("0000001", "040", "", "04000US44", "Rhode Island"),
    ("0000010", "140", "007", "14000US44007010100", "Census Tract 101, Providence County, Rhode Island"),
    ("0000011", "140", "007", "14000US44007010200", "Census Tract 102, Providence County, Rhode Island"),
    ("0000012", "140", "009", "14000US44009051500", "Census Tract 515, Washington County, Rhode Island"),
    ("0000020", "150", "007", "15000US440070101001", "Block Group 1, Census Tract 101, Providence County, Rhode Island"),
];

const RI_OTHER_GROUP: &[GeoLine] = &[
    ("0000001", "040", "", "04000US44", "Rhode Island"),
    ("0000002", "050", "001", "05000US44001", "Bristol County, Rhode Island"),
    ("0000003", "050", "003", "05000US44003", "Kent County, Rhode Island"),
    ("0000004", "050", "005", "05000US44005", "Newport County, Rhode Island"),
    ("0000005", "050", "007", "05000US44007", "Providence County, Rhode Island"),
    ("0000006", "050", "009", "05000US44009", "Washington County, Rhode Island"),
];

pub struct Fixture {
    pub source: MemorySource,
    pub urls: UrlTemplates,
    pub catalogs: CatalogCache,
}

impl Fixture {
    pub fn new() -> Self {
        let urls = UrlTemplates::new("https://acs.test/summary_file", "https://acs.test/tiger");
        let mut source = MemorySource::new();
        insert_lookup(&mut source, &urls);
        insert_shell(&mut source, &urls);
        insert_templates(&mut source, &urls);

        for st in states::ROSTER {
            for group in [GeoGroup::TractsBlockGroups, GeoGroup::AllOther] {
                let sl = group.representative_level();
                let geo: &[GeoLine] = match (st.abbr, group) {
                    ("RI", GeoGroup::TractsBlockGroups) => RI_TRACT_GROUP,
                    ("RI", GeoGroup::AllOther) => RI_OTHER_GROUP,
                    _ => &[],
                };
                insert_state(&mut source, &urls, st, sl, geo);
            }
        }

        Fixture {
            source,
            urls,
            catalogs: CatalogCache::new(4),
        }
    }

    pub fn assembler(&self) -> TableAssembler<'_, MemorySource> {
        TableAssembler::new(&self.source, &self.urls, &self.catalogs)
    }

    pub fn lookup_locator(&self) -> Locator {
        self.urls
            .table_lookup_url(YEAR, RELEASE)
            .expect("fixture vintage is supported")
    }

    pub fn ri_geo(&self, sl: SummaryLevel) -> Locator {
        self.urls
            .geo_url(YEAR, RELEASE, ri(), sl)
            .expect("fixture vintage is supported")
    }

    pub fn ri_estimates(&self, sl: SummaryLevel, seq: u16) -> Locator {
        self.urls
            .seq_estimate_url(YEAR, RELEASE, ri(), sl, seq)
            .expect("fixture vintage is supported")
    }

    pub fn ri_margins(&self, sl: SummaryLevel, seq: u16) -> Locator {
        self.urls
            .seq_margin_url(YEAR, RELEASE, ri(), sl, seq)
            .expect("fixture vintage is supported")
    }

    /// Rewrites the rows stored at `loc` in place.
    pub fn edit(&mut self, loc: &Locator, edit: impl FnOnce(&mut Vec<Vec<String>>)) {
        let mut rows = self
            .source
            .collect_rows(loc, Encoding::Latin1)
            .expect("fixture file exists");
        edit(&mut rows);
        self.source.insert(loc.clone(), rows);
    }
}

pub fn ri() -> &'static states::State {
    states::by_abbr("RI").expect("RI is on the roster")
}

fn insert_shell(source: &mut MemorySource, urls: &UrlTemplates) {
    let rows = vec![
        row(&["Table ID", "Line", "UniqueID", "Stub"]),
        row(&["B01001", "", "", "SEX BY AGE"]),
        row(&["B01001", "", "", "Universe:  Total population"]),
        row(&["B01001", "1", "B01001_001", "Total:"]),
        row(&["B01001", "2", "B01001_002", "Male:"]),
        row(&["B01001", "3", "B01001_003", "Under 5 years"]),
        row(&["B01001", "4", "B01001_004", "5 to 9 years"]),
        row(&["C17002", "", "", "RATIO OF INCOME TO POVERTY LEVEL IN THE PAST 12 MONTHS"]),
        row(&["C17002", "", "", "Universe:  Population for whom poverty status is determined"]),
        row(&["C17002", "1", "C17002_001", "Total:"]),
        row(&["C17002", "2", "C17002_002", "Under .50"]),
    ];
    let loc = urls
        .table_shell_url(YEAR, RELEASE)
        .expect("fixture vintage is supported");
    source.insert(loc, rows);
}

fn insert_lookup(source: &mut MemorySource, urls: &UrlTemplates) {
    let mut rows = vec![row(&[
        "File ID",
        "Table ID",
        "Sequence Number",
        "Line Number",
        "Start Position",
        "Total Cells in Table",
        "Total Cells in Sequence",
        "Table Title",
        "Subject Area",
    ])];
    let title = |id: &str, seq: &str, start: &str, title: &str, subject: &str| {
        row(&["ACSSF", id, seq, "", start, "", "", title, subject])
    };
    let universe = |id: &str, seq: &str, u: &str| row(&["ACSSF", id, seq, "", "", "", "", u, ""]);
    let line = |id: &str, seq: &str, n: &str, t: &str| row(&["ACSSF", id, seq, n, "", "", "", t, ""]);

    rows.push(title("B01001", "0002", "7", "SEX BY AGE", "Age-Sex"));
    rows.push(universe("B01001", "0002", "Universe:  Total population"));
    rows.push(line("B01001", "0002", "1", "Total:"));
    rows.push(line("B01001", "0002", "2", "Male:"));
    rows.push(title("B01001", "0003", "7", "SEX BY AGE", "Age-Sex"));
    rows.push(line("B01001", "0003", "3", "Under 5 years"));
    rows.push(line("B01001", "0003", "4", "5 to 9 years"));

    rows.push(title("C17002", "0004", "7", "RATIO OF INCOME TO POVERTY LEVEL", "Poverty"));
    rows.push(line("C17002", "0004", "1", "Total:"));
    rows.push(line("C17002", "0004", "2", "Under .50"));

    rows.push(title("B17001", "0004", "9", "POVERTY STATUS BY SEX BY AGE", "Poverty"));
    rows.push(universe(
        "B17001",
        "0004",
        "Universe:  Population for whom poverty status is determined",
    ));
    for n in 1..=B17001_COLUMNS {
        rows.push(line("B17001", "0004", &n.to_string(), &format!("Line {}", n)));
        if n == 2 {
            rows.push(line("B17001", "0004", "2.5", "sub-heading"));
        }
    }

    let loc = urls
        .table_lookup_url(YEAR, RELEASE)
        .expect("fixture vintage is supported");
    source.insert(loc, rows);
}

/// Codes and descriptions of each sequence's data columns.
fn sequence_columns(seq: u16) -> Vec<(String, String)> {
    match seq {
        2 => vec![
            ("B01001_001".into(), "SEX BY AGE: Total:".into()),
            ("B01001_002".into(), "SEX BY AGE: Male:".into()),
        ],
        3 => vec![
            ("B01001_003".into(), "SEX BY AGE: Male: Under 5 years".into()),
            ("B01001_004".into(), "SEX BY AGE: Male: 5 to 9 years".into()),
        ],
        4 => {
            let mut v: Vec<(String, String)> = vec![
                ("C17002_001".into(), "RATIO OF INCOME TO POVERTY LEVEL: Total:".into()),
                ("C17002_002".into(), "RATIO OF INCOME TO POVERTY LEVEL: Under .50".into()),
            ];
            for n in 1..=B17001_COLUMNS {
                v.push((
                    format!("B17001_{:03}", n),
                    format!("POVERTY STATUS BY SEX BY AGE: Line {}", n),
                ));
            }
            v
        }
        _ => Vec::new(),
    }
}

fn insert_templates(source: &mut MemorySource, urls: &UrlTemplates) {
    for seq in [2u16, 3, 4] {
        let cols = sequence_columns(seq);
        let mut names = row(&SUPPORT);
        let mut desc = row(&["File Identification", "File Type", "State", "Character Iteration", "Sequence", "Logical Record"]);
        for (code, d) in cols {
            names.push(code);
            desc.push(d);
        }
        let loc = urls
            .seq_header_url(YEAR, RELEASE, seq)
            .expect("fixture vintage is supported");
        source.insert(loc, vec![names, desc]);
    }

    let loc = urls
        .geo_header_url(YEAR, RELEASE)
        .expect("fixture vintage is supported");
    source.insert(
        loc,
        vec![
            row(&["FILEID", "STUSAB", "SUMLEVEL", "COMPONENT", "LOGRECNO", "US", "STATE", "COUNTY", "GEOID", "NAME"]),
            row(&["File", "State", "Summary Level", "Component", "Record", "US", "State FIPS", "County", "Geo ID", "Name"]),
        ],
    );
}

/// Estimate text for a record and data offset. The first B17001 cells of each record
/// exercise integer, float and text coercion.
fn estimate(seq: u16, logrecno: &str, offset: usize) -> String {
    let rec: usize = logrecno.trim_start_matches('0').parse().unwrap_or(0);
    match (seq, offset) {
        (2, 0) => (rec * 3).to_string(),
        (2, 1) => (rec + 4).to_string(),
        (3, 0) => (rec + 6).to_string(),
        (3, 1) => (rec / 2).to_string(),
        (4, 2) => (rec * 100 + rec).to_string(),
        (4, 3) => "1.5".to_string(),
        (4, 4) => ".".to_string(),
        _ => (rec * 1000 + offset).to_string(),
    }
}

fn margin(seq: u16, _logrecno: &str, offset: usize) -> String {
    match (seq, offset) {
        (4, 2) => "11".to_string(),
        (4, 4) => ".".to_string(),
        _ => (offset + 1).to_string(),
    }
}

fn insert_state(
    source: &mut MemorySource,
    urls: &UrlTemplates,
    st: &'static states::State,
    sl: SummaryLevel,
    geo: &[GeoLine],
) {
    let geo_rows: Vec<Vec<String>> = geo
        .iter()
        .map(|&(lr, sumlev, county, geoid, name)| {
            row(&["ACSSF", st.abbr, sumlev, "00", lr, "", "44", county, geoid, name])
        })
        .collect();
    let loc = urls
        .geo_url(YEAR, RELEASE, st, sl)
        .expect("fixture vintage is supported");
    source.insert(loc, geo_rows);

    for seq in [2u16, 3, 4] {
        let width = sequence_columns(seq).len();
        let seq_s = format!("{:04}", seq);
        let lower = st.lower();
        let make = |kind: &str, cell: &dyn Fn(u16, &str, usize) -> String| -> Vec<Vec<String>> {
            let filetype = format!("2016{}5", kind);
            geo.iter()
                .map(|&(lr, ..)| {
                    let mut r = row(&[
                        "ACSSF",
                        filetype.as_str(),
                        lower.as_str(),
                        "000",
                        seq_s.as_str(),
                        lr,
                    ]);
                    r.extend((0..width).map(|off| cell(seq, lr, off)));
                    r
                })
                .collect()
        };
        let e = urls
            .seq_estimate_url(YEAR, RELEASE, st, sl, seq)
            .expect("fixture vintage is supported");
        let m = urls
            .seq_margin_url(YEAR, RELEASE, st, sl, seq)
            .expect("fixture vintage is supported");
        source.insert(e, make("e", &estimate));
        source.insert(m, make("m", &margin));
    }
}
