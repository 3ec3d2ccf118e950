// src/dimensions.rs
//
// Sex, age, race and poverty facets mined from column descriptions. Every facet is
// an ordered rule list, first match wins, with one default; the lists are plain data
// and can be replaced from YAML.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

use crate::catalog::{ColumnMeta, TableMeta};
use crate::error::Result;

static AGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<range>(\d+) to (\d+) years)|",
        r"(?P<over>(\d+) years and over)|",
        r"(?P<and>(\d+) and (\d+) years)|",
        r"(?P<under>[Uu]nder (\d+) years)|",
        r"(?P<single>(\d+) years)",
    ))
    .expect("age pattern")
});

/// Upper bound used for open-ended age brackets.
pub const MAX_AGE: u32 = 120;

/// Matches when the description holds every `all` phrase and no `none` phrase.
/// Phrases compare case-insensitively on word boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub all: Vec<String>,
    #[serde(default)]
    pub none: Vec<String>,
    pub value: String,
}

impl Rule {
    fn new(all: &[&str], none: &[&str], value: &str) -> Self {
        Rule {
            all: all.iter().map(|s| s.to_string()).collect(),
            none: none.iter().map(|s| s.to_string()).collect(),
            value: value.to_string(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.all.iter().all(|p| contains_phrase(&lower, &p.to_lowercase()))
            && !self.none.iter().any(|p| contains_phrase(&lower, &p.to_lowercase()))
    }
}

fn first_match<'r>(rules: &'r [Rule], text: &str) -> Option<&'r str> {
    rules.iter().find(|r| r.matches(text)).map(|r| r.value.as_str())
}

/// `needle` occurs in `hay` without being glued to a letter or digit on either side.
/// Both are expected lowercase.
fn contains_phrase(hay: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let alnum_edge = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric());
    let check_start = alnum_edge(needle.chars().next());
    let check_end = alnum_edge(needle.chars().next_back());
    hay.match_indices(needle).any(|(i, m)| {
        let before = hay[..i].chars().next_back();
        let after = hay[i + m.len()..].chars().next();
        !(check_start && alnum_edge(before)) && !(check_end && alnum_edge(after))
    })
}

/// Facets of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub sex: String,
    pub age: String,
    pub race: String,
    pub poverty_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionRules {
    pub sex: Vec<Rule>,
    pub sex_default: String,
    /// Descriptions mentioning any of these have no meaningful age.
    pub age_exclusions: Vec<String>,
    pub age_default: String,
    /// Age of a column whose description is just "Total".
    pub age_total: String,
    /// Race iteration letter at the end of a table id.
    pub race_suffixes: BTreeMap<String, String>,
    pub race: Vec<Rule>,
    pub race_default: String,
    pub poverty: Vec<Rule>,
    pub poverty_default: String,
}

impl Default for DimensionRules {
    fn default() -> Self {
        let suffixes = [
            ("A", "white"),
            ("B", "black"),
            ("C", "aian"),
            ("D", "asian"),
            ("E", "nhopi"),
            ("F", "other"),
            ("G", "two"),
            ("H", "whitenh"),
            ("I", "hisp"),
        ];
        DimensionRules {
            sex: vec![
                Rule::new(&["female"], &[], "female"),
                Rule::new(&["male"], &[], "male"),
            ],
            sex_default: "both".into(),
            age_exclusions: vec!["grandparent".into(), "grandchild".into()],
            age_default: "na".into(),
            age_total: "all".into(),
            race_suffixes: suffixes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            race: vec![
                Rule::new(&["white alone, not hispanic or latino"], &[], "whitenh"),
                Rule::new(&["american indian and alaska native alone"], &["not"], "aian"),
                Rule::new(&["asian alone"], &["not"], "asian"),
                Rule::new(&["black or african american alone"], &["not"], "black"),
                Rule::new(&["native hawaiian and other pacific islander alone"], &["not"], "nhopi"),
                Rule::new(&["some other race alone"], &["not"], "other"),
                Rule::new(&["two or more races"], &["not"], "two"),
                Rule::new(&["white alone"], &["not"], "white"),
                Rule::new(&["hispanic or latino"], &["not"], "hisp"),
            ],
            race_default: "all".into(),
            poverty: vec![
                Rule::new(&["below poverty level"], &[], "lt100"),
                Rule::new(&["at or above poverty level"], &[], "gt100"),
                Rule::new(&["under .50"], &[], "lt050"),
                Rule::new(&[".50 to .99"], &[], "050-099"),
                Rule::new(&["1.00 to 1.24"], &[], "100-124"),
                Rule::new(&["1.25 to 1.49"], &[], "125-149"),
                Rule::new(&["1.50 to 1.84"], &[], "150-184"),
                Rule::new(&["1.85 to 1.99"], &[], "185-199"),
                Rule::new(&["2.00 and over"], &[], "gt200"),
            ],
            poverty_default: "all".into(),
        }
    }
}

impl DimensionRules {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&s)
    }

    pub fn sex(&self, description: &str) -> String {
        first_match(&self.sex, description)
            .unwrap_or(&self.sex_default)
            .to_string()
    }

    /// `NNN-NNN` age bracket from phrases such as "35 to 44 years".
    pub fn age(&self, description: &str) -> String {
        let d = description.trim();
        let lower = d.to_lowercase();
        if self.age_exclusions.iter().any(|w| lower.contains(&w.to_lowercase())) {
            return self.age_default.clone();
        }
        let last_part = d.split(':').map(str::trim).filter(|p| !p.is_empty()).next_back();
        if last_part.is_some_and(|p| p.eq_ignore_ascii_case("total")) {
            return self.age_total.clone();
        }
        let Some(caps) = AGE_RE.captures(d) else {
            return self.age_default.clone();
        };
        let nums: Vec<u32> = caps
            .iter()
            .skip(1)
            .flatten()
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        let bracket = |lo: u32, hi: u32| format!("{:03}-{:03}", lo, hi);
        match (nums.as_slice(), &caps) {
            ([lo, hi, ..], c) if c.name("range").is_some() || c.name("and").is_some() => bracket(*lo, *hi),
            ([lo, ..], c) if c.name("over").is_some() => bracket(*lo, MAX_AGE),
            ([hi, ..], c) if c.name("under").is_some() => bracket(0, *hi),
            ([n, ..], _) => bracket(*n, *n),
            _ => self.age_default.clone(),
        }
    }

    /// Race from the table id's iteration letter, else the column description, else
    /// the table title.
    pub fn race(&self, table_id: &str, description: &str, table_title: &str) -> String {
        let id = table_id.trim();
        let suffix_start = id
            .rfind(|c: char| c.is_ascii_digit())
            .map_or(id.len(), |i| i + 1);
        if let Some(v) = self.race_suffixes.get(&id[suffix_start..].to_ascii_uppercase()) {
            return v.clone();
        }
        first_match(&self.race, description)
            .or_else(|| first_match(&self.race, table_title))
            .unwrap_or(&self.race_default)
            .to_string()
    }

    pub fn poverty_status(&self, description: &str) -> String {
        first_match(&self.poverty, description)
            .unwrap_or(&self.poverty_default)
            .to_string()
    }

    pub fn classify(&self, column: &ColumnMeta, table: &TableMeta) -> Dimensions {
        let d = column.best_description();
        Dimensions {
            sex: self.sex(d),
            age: self.age(d),
            race: self.race(&table.id, d, &table.title),
            poverty_status: self.poverty_status(d),
        }
    }

    /// Every column of a table, in line order. Short lookup labels such as
    /// "Under 5 years" sit below a "Male:" or "Female:" line, so a column whose own
    /// text gives no sex inherits the last one seen. Age carries the same way and
    /// resets when the sex changes.
    pub fn classify_table<'t>(&self, table: &'t TableMeta) -> Vec<(&'t ColumnMeta, Dimensions)> {
        let mut current_sex: Option<String> = None;
        let mut current_age: Option<String> = None;
        table
            .columns()
            .map(|c| {
                let mut d = self.classify(c, table);
                if d.sex != self.sex_default {
                    if current_sex.as_deref() != Some(d.sex.as_str()) {
                        current_age = None;
                    }
                    current_sex = Some(d.sex.clone());
                } else if let Some(sex) = &current_sex {
                    d.sex = sex.clone();
                }
                if d.age != self.age_default {
                    current_age = Some(d.age.clone());
                } else if let Some(age) = &current_age {
                    d.age = age.clone();
                }
                (c, d)
            })
            .collect()
    }
}
