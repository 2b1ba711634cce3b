//! Reference worksheet parsing: the team/OVR/logo window.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{Ovr, TeamRecord};

/// Which rows and columns of the reference worksheet hold team data.
///
/// Rows are zero-based with an exclusive end, so the default `8..29` covers
/// sheet rows 9 through 29.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceWindow {
    pub start_row: usize,
    pub end_row: usize,
    pub username_col: usize,
    pub ovr_col: usize,
    pub logo_col: usize,
    pub team_name_col: usize,
}

impl Default for ReferenceWindow {
    fn default() -> Self {
        Self {
            start_row: 8,
            end_row: 29,
            username_col: 0,
            ovr_col: 1,
            logo_col: 2,
            team_name_col: 3,
        }
    }
}

/// Lookups derived from one read of the reference worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    records: Vec<TeamRecord>,
    ovr_by_key: HashMap<String, u32>,
    logos: BTreeMap<String, String>,
    skipped_rows: usize,
}

impl ReferenceTable {
    /// Build the table from every value of the worksheet.
    ///
    /// Rows outside the window are ignored. Inside the window a row only
    /// contributes an OVR when its OVR cell is a non-negative integer
    /// string; anything else (short rows, `"N/A"`, blanks) is counted in
    /// [`skipped_rows`](Self::skipped_rows) and otherwise ignored.
    pub fn parse<R, C>(values: &[R], window: &ReferenceWindow) -> Self
    where
        R: AsRef<[C]>,
        C: AsRef<str>,
    {
        let mut table = Self::default();
        let end = window.end_row.min(values.len());
        let start = window.start_row.min(end);

        for row in &values[start..end] {
            let row: &[C] = row.as_ref();
            let key = cell(row, window.username_col).trim().to_lowercase();
            let ovr = parse_ovr(cell(row, window.ovr_col));

            match ovr {
                Ovr::Rating(value) => {
                    table.ovr_by_key.insert(key.clone(), value);
                }
                Ovr::Missing => table.skipped_rows += 1,
            }

            if row.len() > window.team_name_col {
                table.logos.insert(
                    cell(row, window.team_name_col).to_string(),
                    cell(row, window.logo_col).to_string(),
                );
            }

            if !key.is_empty() {
                table.records.push(TeamRecord {
                    key,
                    ovr,
                    logo: cell(row, window.logo_col).to_string(),
                    team_name: cell(row, window.team_name_col).to_string(),
                });
            }
        }

        table
    }

    /// OVR for a username, compared trimmed and case-insensitively.
    pub fn ovr_for(&self, username: &str) -> Ovr {
        self.ovr_by_key
            .get(&username.trim().to_lowercase())
            .copied()
            .map(Ovr::Rating)
            .unwrap_or(Ovr::Missing)
    }

    /// Team name of the first record matching `username`.
    pub fn team_for(&self, username: &str) -> Option<&str> {
        let key = username.trim().to_lowercase();
        self.records
            .iter()
            .find(|record| record.key == key)
            .map(|record| record.team_name.as_str())
    }

    pub fn records(&self) -> &[TeamRecord] {
        &self.records
    }

    /// Team name to logo reference, for every row wide enough to carry both.
    pub fn logos(&self) -> &BTreeMap<String, String> {
        &self.logos
    }

    /// Lookup entries with a usable OVR.
    pub fn ovr_entries(&self) -> BTreeMap<&str, u32> {
        self.ovr_by_key
            .iter()
            .map(|(key, value)| (key.as_str(), *value))
            .collect()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

fn cell<C: AsRef<str>>(row: &[C], col: usize) -> &str {
    row.get(col).map(AsRef::as_ref).unwrap_or("")
}

fn parse_ovr(raw: &str) -> Ovr {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Ovr::Missing;
    }
    raw.parse::<u32>().map(Ovr::Rating).unwrap_or(Ovr::Missing)
}
