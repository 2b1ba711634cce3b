//! Allow-lists of team names recognised in role names.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const NATIONAL_ROLE_PREFIX: &str = "WC | ";
pub const CLUB_ROLE_PREFIX: &str = "UCL | ";

const NATIONAL_TEAMS: &[&str] = &[
    "Germany",
    "Portugal",
    "Spain",
    "Argentina",
    "Brazil",
    "Japan",
    "South Korea",
    "England",
    "Belgium",
    "France",
    "Italy",
    "Croatia",
    "India",
    "Australia",
    "Netherlands",
    "United States",
];

// Both spellings of Atletico are in use on the server.
const CLUB_TEAMS: &[&str] = &[
    "Manchester City",
    "Real Madrid",
    "FC Barcelona",
    "Arsenal",
    "Liverpool",
    "Atletico Madrid",
    "Bayer Leverkusen",
    "Juventus",
    "AC Milan",
    "Paris Saint-Germain",
    "Sporting CP",
    "Inter Milan",
    "Young Boys",
    "Bayern Munich",
    "Borussia Dortmund",
    "Chelsea",
    "Atlético Madrid",
];

/// National and club allow-lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCatalog {
    pub national: BTreeSet<String>,
    pub clubs: BTreeSet<String>,
}

impl Default for TeamCatalog {
    fn default() -> Self {
        Self::new(NATIONAL_TEAMS.iter().copied(), CLUB_TEAMS.iter().copied())
    }
}

impl TeamCatalog {
    pub fn new<N, C, S>(national: N, clubs: C) -> Self
    where
        N: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            national: national.into_iter().map(Into::into).collect(),
            clubs: clubs.into_iter().map(Into::into).collect(),
        }
    }

    /// `Some("Germany")` for `"WC | Germany"` when Germany is allow-listed.
    pub fn national_team<'a>(&self, role: &'a str) -> Option<&'a str> {
        role.strip_prefix(NATIONAL_ROLE_PREFIX)
            .filter(|name| self.national.contains(*name))
    }

    /// `Some("Arsenal")` for `"UCL | Arsenal"` when Arsenal is allow-listed.
    pub fn club_team<'a>(&self, role: &'a str) -> Option<&'a str> {
        role.strip_prefix(CLUB_ROLE_PREFIX)
            .filter(|name| self.clubs.contains(*name))
    }
}
