// src/locator/states.rs

/// One state-level jurisdiction that has its own set of summary files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State {
    pub fips: u8,
    /// USPS abbreviation, uppercase.
    pub abbr: &'static str,
    /// Folder name used in the remote directory layout. Capitalisation is significant.
    pub folder: &'static str,
}

impl State {
    pub fn lower(&self) -> String {
        self.abbr.to_ascii_lowercase()
    }
}

/// Every jurisdiction published in the ACS summary files: the 50 states, DC and
/// Puerto Rico, in FIPS order. A nation-wide request walks this whole table.
pub static ROSTER: &[State] = &[
    State { fips: 1, abbr: "AL", folder: "Alabama" },
    State { fips: 2, abbr: "AK", folder: "Alaska" },
    State { fips: 4, abbr: "AZ", folder: "Arizona" },
    State { fips: 5, abbr: "AR", folder: "Arkansas" },
    State { fips: 6, abbr: "CA", folder: "California" },
    State { fips: 8, abbr: "CO", folder: "Colorado" },
    State { fips: 9, abbr: "CT", folder: "Connecticut" },
    State { fips: 10, abbr: "DE", folder: "Delaware" },
    State { fips: 11, abbr: "DC", folder: "DistrictOfColumbia" },
    State { fips: 12, abbr: "FL", folder: "Florida" },
    State { fips: 13, abbr: "GA", folder: "Georgia" },
    State { fips: 15, abbr: "HI", folder: "Hawaii" },
    State { fips: 16, abbr: "ID", folder: "Idaho" },
    State { fips: 17, abbr: "IL", folder: "Illinois" },
    State { fips: 18, abbr: "IN", folder: "Indiana" },
    State { fips: 19, abbr: "IA", folder: "Iowa" },
    State { fips: 20, abbr: "KS", folder: "Kansas" },
    State { fips: 21, abbr: "KY", folder: "Kentucky" },
    State { fips: 22, abbr: "LA", folder: "Louisiana" },
    State { fips: 23, abbr: "ME", folder: "Maine" },
    State { fips: 24, abbr: "MD", folder: "Maryland" },
    State { fips: 25, abbr: "MA", folder: "Massachusetts" },
    State { fips: 26, abbr: "MI", folder: "Michigan" },
    State { fips: 27, abbr: "MN", folder: "Minnesota" },
    State { fips: 28, abbr: "MS", folder: "Mississippi" },
    State { fips: 29, abbr: "MO", folder: "Missouri" },
    State { fips: 30, abbr: "MT", folder: "Montana" },
    State { fips: 31, abbr: "NE", folder: "Nebraska" },
    State { fips: 32, abbr: "NV", folder: "Nevada" },
    State { fips: 33, abbr: "NH", folder: "NewHampshire" },
    State { fips: 34, abbr: "NJ", folder: "NewJersey" },
    State { fips: 35, abbr: "NM", folder: "NewMexico" },
    State { fips: 36, abbr: "NY", folder: "NewYork" },
    State { fips: 37, abbr: "NC", folder: "NorthCarolina" },
    State { fips: 38, abbr: "ND", folder: "NorthDakota" },
    State { fips: 39, abbr: "OH", folder: "Ohio" },
    State { fips: 40, abbr: "OK", folder: "Oklahoma" },
    State { fips: 41, abbr: "OR", folder: "Oregon" },
    State { fips: 42, abbr: "PA", folder: "Pennsylvania" },
    State { fips: 44, abbr: "RI", folder: "RhodeIsland" },
    State { fips: 45, abbr: "SC", folder: "SouthCarolina" },
    State { fips: 46, abbr: "SD", folder: "SouthDakota" },
    State { fips: 47, abbr: "TN", folder: "Tennessee" },
    State { fips: 48, abbr: "TX", folder: "Texas" },
    State { fips: 49, abbr: "UT", folder: "Utah" },
    State { fips: 50, abbr: "VT", folder: "Vermont" },
    State { fips: 51, abbr: "VA", folder: "Virginia" },
    State { fips: 53, abbr: "WA", folder: "Washington" },
    State { fips: 54, abbr: "WV", folder: "WestVirginia" },
    State { fips: 55, abbr: "WI", folder: "Wisconsin" },
    State { fips: 56, abbr: "WY", folder: "Wyoming" },
    State { fips: 72, abbr: "PR", folder: "PuertoRico" },
];

pub fn by_abbr(abbr: &str) -> Option<&'static State> {
    ROSTER.iter().find(|s| s.abbr.eq_ignore_ascii_case(abbr))
}

pub fn by_fips(fips: u8) -> Option<&'static State> {
    ROSTER.iter().find(|s| s.fips == fips)
}

/// Reverse of `State::folder`; accepts either DC spelling.
pub fn by_folder(folder: &str) -> Option<&'static State> {
    ROSTER
        .iter()
        .find(|s| s.folder.eq_ignore_ascii_case(folder))
}
