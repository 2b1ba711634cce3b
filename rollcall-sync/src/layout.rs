//! Fixed cell geography of the spreadsheet: where reference data is read
//! from and which columns receive the output rows.

use serde::{Deserialize, Serialize};

use rollcall_core::{OutputRow, ReferenceWindow};

use crate::sheets::SheetTarget;

/// One output column and the row field written into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub column: String,
    pub field: OutputField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputField {
    Username,
    TeamAndClub,
    Ovr,
    ClubName,
}

impl OutputField {
    pub fn value(self, row: &OutputRow) -> String {
        match self {
            OutputField::Username => row.username.0.clone(),
            OutputField::TeamAndClub => row.team_and_club(),
            OutputField::Ovr => row.ovr.to_string(),
            OutputField::ClubName => row.club_name(),
        }
    }
}

/// Where a pass reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub reference_sheet: SheetTarget,
    pub reference_window: ReferenceWindow,
    pub output_sheet: SheetTarget,
    /// One-based sheet row of the first output row.
    pub start_row: u32,
    /// Written in order, one bulk update per column.
    pub columns: Vec<OutputColumn>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            reference_sheet: SheetTarget::Named("Team Sheets".to_string()),
            reference_window: ReferenceWindow::default(),
            output_sheet: SheetTarget::First,
            start_row: 22,
            columns: vec![
                OutputColumn {
                    column: "G".to_string(),
                    field: OutputField::Username,
                },
                OutputColumn {
                    column: "H".to_string(),
                    field: OutputField::TeamAndClub,
                },
                OutputColumn {
                    column: "P".to_string(),
                    field: OutputField::ClubName,
                },
            ],
        }
    }
}

impl SheetLayout {
    pub fn with_reference_sheet(mut self, title: impl Into<String>) -> Self {
        self.reference_sheet = SheetTarget::Named(title.into());
        self
    }

    /// Also write OVR values into `column`, ahead of the club-name column.
    pub fn with_ovr_column(mut self, column: impl Into<String>) -> Self {
        let entry = OutputColumn {
            column: column.into(),
            field: OutputField::Ovr,
        };
        let at = self
            .columns
            .iter()
            .position(|c| c.field == OutputField::ClubName)
            .unwrap_or(self.columns.len());
        self.columns.insert(at, entry);
        self
    }

    /// A1 range covering `rows` cells of `column`, e.g. `G22:G24`.
    pub fn column_range(&self, column: &str, rows: usize) -> String {
        column_range(column, self.start_row, rows)
    }
}

/// A1 range covering `rows` cells of `column` starting at `start_row`.
///
/// `rows` must be non-zero; a pass with no rows performs no writes.
pub fn column_range(column: &str, start_row: u32, rows: usize) -> String {
    let last = start_row as usize + rows.saturating_sub(1);
    format!("{column}{start_row}:{column}{last}")
}

/// Column-major values for one output column: `[[v1], [v2], ...]`.
pub fn column_values(rows: &[OutputRow], field: OutputField) -> Vec<Vec<String>> {
    rows.iter().map(|row| vec![field.value(row)]).collect()
}
