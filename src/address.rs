// src/address.rs
//
// Request addresses: `census://<year>/<release>/<state-or-US>/<summary-level>/<table>`
// for row data and `censusgeo://<year>/<release>/<state-or-US>/<summary-level>` for the
// boundary layer covering the same scope.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{AcsError, Result};
use crate::locator::states::{self, State};

/// ACS data release: 1-year, 3-year (discontinued) or 5-year estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Release {
    One,
    Three,
    Five,
}

impl Release {
    pub fn as_u8(self) -> u8 {
        match self {
            Release::One => 1,
            Release::Three => 3,
            Release::Five => 5,
        }
    }
}

impl TryFrom<u8> for Release {
    type Error = AcsError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            1 => Ok(Release::One),
            3 => Ok(Release::Three),
            5 => Ok(Release::Five),
            other => Err(AcsError::Config(format!(
                "release must be 1, 3 or 5, got {}",
                other
            ))),
        }
    }
}

impl From<Release> for u8 {
    fn from(r: Release) -> u8 {
        r.as_u8()
    }
}

impl FromStr for Release {
    type Err = AcsError;

    fn from_str(s: &str) -> Result<Self> {
        let n: u8 = s
            .trim()
            .parse()
            .map_err(|_| AcsError::Config(format!("release must be 1, 3 or 5, got '{}'", s)))?;
        Release::try_from(n)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Census summary-level names accepted in place of numeric codes.
static SUMMARY_LEVEL_NAMES: &[(&str, u16)] = &[
    ("us", 10),
    ("region", 20),
    ("division", 30),
    ("state", 40),
    ("county", 50),
    ("cosub", 60),
    ("tract", 140),
    ("blockgroup", 150),
    ("place", 160),
    ("cbsa", 310),
    ("ua", 400),
    ("cd", 500),
    ("sldu", 610),
    ("sldl", 620),
    ("puma", 795),
    ("zcta", 860),
    ("sdelm", 950),
    ("sdsec", 960),
    ("sduni", 970),
];

/// Numeric summary-level code, e.g. 140 for census tracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SummaryLevel(pub u16);

impl SummaryLevel {
    pub const TRACT: SummaryLevel = SummaryLevel(140);
    pub const COUNTY: SummaryLevel = SummaryLevel(50);

    /// Accepts a numeric code (`140`, `050`) or a name from the fixed name table.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u16>() {
            return Ok(SummaryLevel(n));
        }
        SUMMARY_LEVEL_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, code)| SummaryLevel(*code))
            .ok_or_else(|| AcsError::UnknownSummaryLevel(s.to_string()))
    }

    pub fn code(self) -> u16 {
        self.0
    }

    pub fn name(self) -> Option<&'static str> {
        SUMMARY_LEVEL_NAMES
            .iter()
            .find(|(_, code)| *code == self.0)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for SummaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Either one state-level jurisdiction or the whole nation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScope {
    State(&'static State),
    Us,
}

impl StateScope {
    /// Accepts `US`, `01000US`, a USPS abbreviation, a FIPS code or a state geoid
    /// such as `04000US44`.
    pub fn parse(s: &str) -> Result<Self> {
        let t = s.trim().to_ascii_uppercase();
        if t == "US" || t == "01000US" {
            return Ok(StateScope::Us);
        }
        let state = if let Some(fips) = t.strip_prefix("04000US") {
            fips.parse::<u8>().ok().and_then(states::by_fips)
        } else if let Ok(fips) = t.parse::<u8>() {
            states::by_fips(fips)
        } else if t.len() == 2 {
            states::by_abbr(&t)
        } else {
            None
        };
        state
            .map(StateScope::State)
            .ok_or_else(|| AcsError::UnknownState(s.trim().to_string()))
    }

    /// The jurisdictions this scope covers, in roster order.
    pub fn states(&self) -> &'static [State] {
        match self {
            StateScope::State(s) => std::slice::from_ref(*s),
            StateScope::Us => states::ROSTER,
        }
    }

    pub fn is_national(&self) -> bool {
        matches!(self, StateScope::Us)
    }
}

impl fmt::Display for StateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateScope::State(s) => f.write_str(s.abbr),
            StateScope::Us => f.write_str("US"),
        }
    }
}

fn components<'a>(s: &'a str, scheme: &str) -> Vec<&'a str> {
    let s = s.trim();
    let rest = s
        .strip_prefix(scheme)
        .and_then(|r| r.strip_prefix("://").or_else(|| r.strip_prefix(':')))
        .unwrap_or(s);
    rest.split('/').filter(|p| !p.is_empty()).collect()
}

fn parse_year(s: &str) -> Result<u16> {
    s.trim()
        .parse()
        .map_err(|_| AcsError::Config(format!("year must be numeric, got '{}'", s)))
}

/// Address of one table for one scope and vintage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAddress {
    pub year: u16,
    pub release: Release,
    pub state: StateScope,
    pub summary_level: SummaryLevel,
    pub table: String,
}

impl TableAddress {
    /// Parses a five-component address, or a three-component
    /// `<state>/<summary-level>/<table>` one that takes the given default vintage.
    pub fn parse_with_defaults(s: &str, year: u16, release: Release) -> Result<Self> {
        let parts = components(s, "census");
        let (year, release, rest) = match parts.len() {
            5 => (parse_year(parts[0])?, parts[1].parse::<Release>()?, &parts[2..]),
            3 => (year, release, &parts[..]),
            _ => {
                return Err(AcsError::Config(format!(
                    "table address must have 5 components \
                     (year/release/state/summary_level/table), got {:?}",
                    parts
                )))
            }
        };
        Ok(TableAddress {
            year,
            release,
            state: StateScope::parse(rest[0])?,
            summary_level: SummaryLevel::parse(rest[1])?,
            table: rest[2].trim().to_ascii_uppercase(),
        })
    }

    pub fn parse(s: &str) -> Result<Self> {
        let defaults = crate::config::Config::default();
        Self::parse_with_defaults(s, defaults.default_year, defaults.default_release)
    }

    /// The boundary-layer address for the same scope.
    pub fn geo(&self) -> GeoAddress {
        GeoAddress {
            year: self.year,
            release: self.release,
            state: self.state,
            summary_level: self.summary_level,
        }
    }
}

impl fmt::Display for TableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "census://{}/{}/{}/{}/{}",
            self.year, self.release, self.state, self.summary_level, self.table
        )
    }
}

impl FromStr for TableAddress {
    type Err = AcsError;

    fn from_str(s: &str) -> Result<Self> {
        TableAddress::parse(s)
    }
}

/// Address of the geographic boundary layer for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoAddress {
    pub year: u16,
    pub release: Release,
    pub state: StateScope,
    pub summary_level: SummaryLevel,
}

impl GeoAddress {
    pub fn parse_with_defaults(s: &str, year: u16, release: Release) -> Result<Self> {
        let parts = components(s, "censusgeo");
        let (year, release, rest) = match parts.len() {
            4 => (parse_year(parts[0])?, parts[1].parse::<Release>()?, &parts[2..]),
            2 => (year, release, &parts[..]),
            _ => {
                return Err(AcsError::Config(format!(
                    "geography address must have 4 components \
                     (year/release/state/summary_level), got {:?}",
                    parts
                )))
            }
        };
        Ok(GeoAddress {
            year,
            release,
            state: StateScope::parse(rest[0])?,
            summary_level: SummaryLevel::parse(rest[1])?,
        })
    }

    pub fn parse(s: &str) -> Result<Self> {
        let defaults = crate::config::Config::default();
        Self::parse_with_defaults(s, defaults.default_year, defaults.default_release)
    }
}

impl fmt::Display for GeoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "censusgeo://{}/{}/{}/{}",
            self.year, self.release, self.state, self.summary_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_table_address() {
        let a = TableAddress::parse("census://2016/5/RI/140/B17001").unwrap();
        assert_eq!(a.year, 2016);
        assert_eq!(a.release, Release::Five);
        assert_eq!(a.state.to_string(), "RI");
        assert_eq!(a.summary_level, SummaryLevel::TRACT);
        assert_eq!(a.table, "B17001");
        assert_eq!(a.to_string(), "census://2016/5/RI/140/B17001");
    }

    #[test]
    fn short_address_uses_default_vintage() {
        let a = TableAddress::parse("census://CA/tract/b17001").unwrap();
        assert_eq!((a.year, a.release), (2016, Release::Five));
        assert_eq!(a.table, "B17001");
        assert_eq!(a.state, StateScope::parse("06").unwrap());
    }

    #[test]
    fn wrong_component_count_is_config_error() {
        let err = TableAddress::parse("census://2016/5/RI/B17001").unwrap_err();
        assert!(matches!(err, AcsError::Config(_)));
    }

    #[test]
    fn release_must_be_known() {
        assert!(matches!(
            TableAddress::parse("2016/2/RI/140/B17001"),
            Err(AcsError::Config(_))
        ));
        assert_eq!("3".parse::<Release>().unwrap(), Release::Three);
    }

    #[test]
    fn state_scope_forms() {
        assert_eq!(StateScope::parse("us").unwrap(), StateScope::Us);
        assert_eq!(StateScope::parse("01000US").unwrap(), StateScope::Us);
        let ri = StateScope::parse("RI").unwrap();
        assert_eq!(StateScope::parse("44").unwrap(), ri);
        assert_eq!(StateScope::parse("04000US44").unwrap(), ri);
        assert_eq!(ri.states().len(), 1);
        assert_eq!(StateScope::Us.states().len(), 52);
        assert!(matches!(
            StateScope::parse("ZZ"),
            Err(AcsError::UnknownState(_))
        ));
    }

    #[test]
    fn summary_level_names() {
        assert_eq!(SummaryLevel::parse("county").unwrap().code(), 50);
        assert_eq!(SummaryLevel::parse("050").unwrap().code(), 50);
        assert_eq!(SummaryLevel::parse("CBSA").unwrap().code(), 310);
        assert_eq!(SummaryLevel(140).name(), Some("tract"));
        assert!(matches!(
            SummaryLevel::parse("hamlet"),
            Err(AcsError::UnknownSummaryLevel(_))
        ));
    }

    #[test]
    fn geo_address_round_trip() {
        let g = GeoAddress::parse("censusgeo://2015/1/NY/county").unwrap();
        assert_eq!(g.to_string(), "censusgeo://2015/1/NY/50");
        let t = TableAddress::parse("2015/1/NY/50/B01001").unwrap();
        assert_eq!(t.geo(), g);
    }
}
