//! Domain types for one reconciliation pass.
//!
//! Everything here is ephemeral: members are fetched fresh from the platform
//! and reference rows are re-read from the spreadsheet on every pass.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A cleaned display name as it appears in the output sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(pub String);

impl Username {
    /// Key used for case-insensitive dedup and reference lookups.
    pub fn key(&self) -> String {
        self.0.trim().to_lowercase()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Username {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Overall rating looked up from the reference worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Ovr {
    Rating(u32),
    #[default]
    Missing,
}

impl Ovr {
    pub const MISSING_PLACEHOLDER: &'static str = "--";

    pub fn rating(self) -> Option<u32> {
        match self {
            Ovr::Rating(value) => Some(value),
            Ovr::Missing => None,
        }
    }
}

impl fmt::Display for Ovr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ovr::Rating(value) => write!(f, "{value}"),
            Ovr::Missing => f.write_str(Self::MISSING_PLACEHOLDER),
        }
    }
}

/// Team assignment derived from a member's roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TeamLabel {
    Both { national: String, club: String },
    National { name: String },
    Club { name: String },
    FreeAgent,
}

impl TeamLabel {
    pub const FREE_AGENT: &'static str = "Free Agent";

    /// Build a label from the (at most one) match of each category.
    pub fn from_matches(national: Option<String>, club: Option<String>) -> Self {
        match (national, club) {
            (Some(national), Some(club)) => TeamLabel::Both { national, club },
            (Some(name), None) => TeamLabel::National { name },
            (None, Some(name)) => TeamLabel::Club { name },
            (None, None) => TeamLabel::FreeAgent,
        }
    }

    /// `"National, Club"`, the single matched name, or `"Free Agent"`.
    pub fn team_and_club(&self) -> String {
        match self {
            TeamLabel::Both { national, club } => format!("{national}, {club}"),
            TeamLabel::National { name } | TeamLabel::Club { name } => name.clone(),
            TeamLabel::FreeAgent => Self::FREE_AGENT.to_string(),
        }
    }

    pub fn club_name(&self) -> String {
        self.team_and_club().to_uppercase()
    }

    pub fn is_free_agent(&self) -> bool {
        matches!(self, TeamLabel::FreeAgent)
    }
}

impl fmt::Display for TeamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.team_and_club())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A guild member as delivered by the chat platform, before cleaning.
///
/// `roles` holds role names in whatever order the platform returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMember {
    /// Guild nickname, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    /// Account username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl RawMember {
    /// Nickname when present, account name otherwise.
    pub fn display_name(&self) -> Option<&str> {
        self.nick
            .as_deref()
            .filter(|nick| !nick.is_empty())
            .or(self.name.as_deref())
    }
}

/// A member after name cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub raw_name: Option<String>,
    pub username: Username,
    pub roles: Vec<String>,
}

/// One row of the reference worksheet's team window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    /// Trimmed, lowercased username/team key.
    pub key: String,
    pub ovr: Ovr,
    pub logo: String,
    pub team_name: String,
}

/// A computed output row. Identity is its position in the output range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub username: Username,
    pub label: TeamLabel,
    pub ovr: Ovr,
}

impl OutputRow {
    pub fn team_and_club(&self) -> String {
        self.label.team_and_club()
    }

    pub fn club_name(&self) -> String {
        self.label.club_name()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
