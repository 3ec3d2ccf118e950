// src/locator/mod.rs
//
// Pure mapping from (year, release, state, summary level, sequence) to the remote file,
// or archive member, that holds each piece of an ACS summary-file table.

pub mod states;

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::address::{Release, SummaryLevel};
use crate::config::{Config, DEFAULT_BASE_URL, DEFAULT_TIGER_URL};
use crate::error::{AcsError, Result};
use states::State;

/// (year, release) pairs whose directory layout and template names are known.
/// Anything else is refused rather than resolved against a guessed layout.
pub static SUPPORTED_VINTAGES: &[(u16, Release)] = &[
    (2014, Release::One),
    (2014, Release::Five),
    (2015, Release::One),
    (2015, Release::Five),
    (2016, Release::One),
    (2016, Release::Five),
];

/// State folders whose spelling differs from the roster for particular vintages.
/// (abbr, first year, last year, release, folder)
static FOLDER_QUIRKS: &[(&str, u16, u16, Release, &str)] =
    &[("DC", 2014, 2016, Release::One, "DistrictofColumbia")];

/// A remote file, optionally narrowed to one member of the archive it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    pub url: String,
    pub member: Option<String>,
}

impl Locator {
    pub fn new(url: impl Into<String>) -> Self {
        Locator {
            url: url.into(),
            member: None,
        }
    }

    pub fn member(url: impl Into<String>, member: impl Into<String>) -> Self {
        Locator {
            url: url.into(),
            member: Some(member.into()),
        }
    }

    /// Parses the `url#member` form produced by `Display`.
    pub fn parse(s: &str) -> Self {
        match s.split_once('#') {
            Some((url, member)) if !member.is_empty() => Locator::member(url, member),
            Some((url, _)) => Locator::new(url),
            None => Locator::new(s),
        }
    }

    /// File name of the member, or of the URL when there is no member.
    pub fn file_name(&self) -> &str {
        match &self.member {
            Some(m) => m.rsplit('/').next().unwrap_or(m),
            None => self.url.rsplit('/').next().unwrap_or(&self.url),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(m) => write!(f, "{}#{}", self.url, m),
            None => f.write_str(&self.url),
        }
    }
}

/// The two geography groupings the 5-year release splits its state folders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoGroup {
    TractsBlockGroups,
    AllOther,
}

impl GeoGroup {
    pub fn for_level(sl: SummaryLevel) -> Self {
        match sl.code() {
            140 | 150 => GeoGroup::TractsBlockGroups,
            _ => GeoGroup::AllOther,
        }
    }

    pub fn folder(self) -> &'static str {
        match self {
            GeoGroup::TractsBlockGroups => "Tracts_Block_Groups_Only",
            GeoGroup::AllOther => "All_Geographies_Not_Tracts_Block_Groups",
        }
    }

    fn from_folder(s: &str) -> Option<Self> {
        match s {
            "Tracts_Block_Groups_Only" => Some(GeoGroup::TractsBlockGroups),
            "All_Geographies_Not_Tracts_Block_Groups" => Some(GeoGroup::AllOther),
            _ => None,
        }
    }

    /// A summary level that resolves to this group.
    pub fn representative_level(self) -> SummaryLevel {
        match self {
            GeoGroup::TractsBlockGroups => SummaryLevel::TRACT,
            GeoGroup::AllOther => SummaryLevel::COUNTY,
        }
    }
}

pub fn check_vintage(year: u16, release: Release) -> Result<()> {
    if SUPPORTED_VINTAGES.contains(&(year, release)) {
        Ok(())
    } else {
        Err(AcsError::Config(format!(
            "unsupported ACS vintage {}/{}: no known file layout for this year and release",
            year, release
        )))
    }
}

/// Folder name for a state, honouring the per-vintage spelling quirks.
pub fn state_folder(state: &State, year: u16, release: Release) -> &'static str {
    FOLDER_QUIRKS
        .iter()
        .find(|(abbr, first, last, rel, _)| {
            *abbr == state.abbr && (*first..=*last).contains(&year) && *rel == release
        })
        .map(|q| q.4)
        .unwrap_or(state.folder)
}

/// TIGER/Line layer directory and file stem for a summary level, and whether the
/// layer is published as one national file.
fn tiger_layer(sl: SummaryLevel) -> Option<(&'static str, bool)> {
    match sl.code() {
        40 => Some(("state", true)),
        50 => Some(("county", true)),
        60 => Some(("cousub", false)),
        140 => Some(("tract", false)),
        150 => Some(("bg", false)),
        160 => Some(("place", false)),
        310 => Some(("cbsa", true)),
        610 => Some(("sldu", false)),
        620 => Some(("sldl", false)),
        950 => Some(("elsd", false)),
        960 => Some(("scsd", false)),
        970 => Some(("unsd", false)),
        _ => None,
    }
}

/// URL builders over a configurable remote root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplates {
    base_url: String,
    tiger_base_url: String,
}

impl Default for UrlTemplates {
    fn default() -> Self {
        UrlTemplates {
            base_url: DEFAULT_BASE_URL.to_string(),
            tiger_base_url: DEFAULT_TIGER_URL.to_string(),
        }
    }
}

impl UrlTemplates {
    pub fn new(base_url: &str, tiger_base_url: &str) -> Self {
        UrlTemplates {
            base_url: base_url.trim_end_matches('/').to_string(),
            tiger_base_url: tiger_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.base_url, &cfg.tiger_base_url)
    }

    fn data_url(&self, year: u16) -> String {
        format!("{}/{}/data", self.base_url, year)
    }

    /// `<data>/<release>_year_seq_by_state/<State>/[<group>/]`
    fn state_dir(&self, year: u16, release: Release, state: &State, sl: SummaryLevel) -> String {
        let group = match release {
            Release::One => String::new(),
            _ => format!("{}/", GeoGroup::for_level(sl).folder()),
        };
        format!(
            "{}/{}_year_seq_by_state/{}/{}",
            self.data_url(year),
            release,
            state_folder(state, year, release),
            group
        )
    }

    pub fn header_archive_url(&self, year: u16, release: Release) -> Result<String> {
        check_vintage(year, release)?;
        Ok(format!(
            "{}/{}_{}yr_Summary_FileTemplates.zip",
            self.data_url(year),
            year,
            release
        ))
    }

    /// Excel template whose first row names the sequence's columns and whose second
    /// row describes them.
    pub fn seq_header_url(&self, year: u16, release: Release, seq: u16) -> Result<Locator> {
        Ok(Locator::member(
            self.header_archive_url(year, release)?,
            format!("Seq{}.xls", seq),
        ))
    }

    /// Excel template naming the geography file's columns for this year.
    pub fn geo_header_url(&self, year: u16, release: Release) -> Result<Locator> {
        Ok(Locator::member(
            self.header_archive_url(year, release)?,
            format!("{}_SFGeoFileTemplate.xls", year),
        ))
    }

    pub fn seq_archive_url(
        &self,
        year: u16,
        release: Release,
        state: &State,
        sl: SummaryLevel,
        seq: u16,
    ) -> Result<String> {
        check_vintage(year, release)?;
        Ok(format!(
            "{}{}{}{}{:04}000.zip",
            self.state_dir(year, release, state, sl),
            year,
            release,
            state.lower(),
            seq
        ))
    }

    fn seq_member(&self, prefix: char, year: u16, release: Release, state: &State, seq: u16) -> String {
        format!("{}{}{}{}{:04}000.txt", prefix, year, release, state.lower(), seq)
    }

    pub fn seq_estimate_url(
        &self,
        year: u16,
        release: Release,
        state: &State,
        sl: SummaryLevel,
        seq: u16,
    ) -> Result<Locator> {
        Ok(Locator::member(
            self.seq_archive_url(year, release, state, sl, seq)?,
            self.seq_member('e', year, release, state, seq),
        ))
    }

    pub fn seq_margin_url(
        &self,
        year: u16,
        release: Release,
        state: &State,
        sl: SummaryLevel,
        seq: u16,
    ) -> Result<Locator> {
        Ok(Locator::member(
            self.seq_archive_url(year, release, state, sl, seq)?,
            self.seq_member('m', year, release, state, seq),
        ))
    }

    /// Per-state geography file; a headerless CSV.
    pub fn geo_url(
        &self,
        year: u16,
        release: Release,
        state: &State,
        sl: SummaryLevel,
    ) -> Result<Locator> {
        check_vintage(year, release)?;
        Ok(Locator::new(format!(
            "{}g{}{}{}.csv",
            self.state_dir(year, release, state, sl),
            year,
            release,
            state.lower()
        )))
    }

    /// Workbook pairing record numbers with GEOIDs and names. The one-year release
    /// publishes a single national workbook; five-year ones are per state.
    pub fn geoid_url(&self, year: u16, release: Release, state: &State) -> Result<Locator> {
        check_vintage(year, release)?;
        let doc = format!("{}/{}/documentation/geography", self.base_url, year);
        Ok(Locator::new(match release {
            Release::One => format!("{}/1_year_Mini_Geo.xlsx", doc),
            _ => format!("{}/5yr_year_geo/{}.xlsx", doc, state.lower()),
        }))
    }

    /// Table/sequence/line-number reference file for the release.
    pub fn table_lookup_url(&self, year: u16, release: Release) -> Result<Locator> {
        check_vintage(year, release)?;
        Ok(Locator::new(format!(
            "{}/{}/documentation/user_tools/ACS_{}yr_Seq_Table_Number_Lookup.txt",
            self.base_url, year, release
        )))
    }

    pub fn table_shell_url(&self, year: u16, release: Release) -> Result<Locator> {
        check_vintage(year, release)?;
        Ok(Locator::new(format!(
            "{}/{}/documentation/user_tools/ACS{}_Table_Shells.xlsx",
            self.base_url, year, year
        )))
    }

    /// TIGER/Line boundary archive for a summary level. National layers ignore the
    /// state; per-state layers require one.
    pub fn tiger_boundary_url(
        &self,
        year: u16,
        sl: SummaryLevel,
        state: Option<&State>,
    ) -> Result<Locator> {
        let (layer, national) = tiger_layer(sl).ok_or_else(|| {
            AcsError::Config(format!("no TIGER boundary layer for summary level {}", sl))
        })?;
        let scope = if national {
            "us".to_string()
        } else {
            let st = state.ok_or_else(|| {
                AcsError::Config(format!(
                    "TIGER {} boundaries are published per state; a state is required",
                    layer
                ))
            })?;
            format!("{:02}", st.fips)
        };
        Ok(Locator::new(format!(
            "{}/TIGER{}/{}/tl_{}_{}_{}.zip",
            self.tiger_base_url,
            year,
            layer.to_ascii_uppercase(),
            year,
            scope,
            layer
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqFileKind {
    Estimate,
    Margin,
}

/// Components of a sequence-file locator, recovered from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceFileKey {
    pub year: u16,
    pub release: Release,
    pub state: &'static State,
    /// `None` for the 1-year release, which has no geography folders.
    pub geo_group: Option<GeoGroup>,
    pub seq: u16,
    pub kind: SeqFileKind,
}

static SEQ_ARCHIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/(\d{4})/data/(\d)_year_seq_by_state/([A-Za-z]+)/(?:([A-Za-z_]+)/)?(\d{4})(\d)([a-z]{2})(\d{4})000\.zip$",
    )
    .expect("sequence archive pattern")
});

impl SequenceFileKey {
    pub fn from_locator(loc: &Locator) -> Option<Self> {
        let caps = SEQ_ARCHIVE_RE.captures(&loc.url)?;
        let year: u16 = caps[1].parse().ok()?;
        let release = Release::try_from(caps[2].parse::<u8>().ok()?).ok()?;
        if caps[5].parse::<u16>().ok()? != year || caps[6] != caps[2] {
            return None;
        }
        let state = states::by_abbr(&caps[7])?;
        if !states::by_folder(&caps[3]).is_some_and(|s| s == state) {
            return None;
        }
        let geo_group = match caps.get(4) {
            Some(m) => Some(GeoGroup::from_folder(m.as_str())?),
            None => None,
        };
        let seq: u16 = caps[8].parse().ok()?;
        let kind = match loc.member.as_deref()?.chars().next()? {
            'e' => SeqFileKind::Estimate,
            'm' => SeqFileKind::Margin,
            _ => return None,
        };
        Some(SequenceFileKey {
            year,
            release,
            state,
            geo_group,
            seq,
            kind,
        })
    }

    pub fn to_locator(&self, urls: &UrlTemplates) -> Result<Locator> {
        let sl = self
            .geo_group
            .unwrap_or(GeoGroup::AllOther)
            .representative_level();
        match self.kind {
            SeqFileKind::Estimate => {
                urls.seq_estimate_url(self.year, self.release, self.state, sl, self.seq)
            }
            SeqFileKind::Margin => {
                urls.seq_margin_url(self.year, self.release, self.state, sl, self.seq)
            }
        }
    }
}
