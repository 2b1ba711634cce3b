//! Spreadsheet backend seam and the Google Sheets implementation.

pub mod auth;
pub mod google;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SheetError;

pub use google::{GoogleSheets, GoogleSheetsConfig, SpreadsheetRef};

/// A worksheet inside the configured spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetTarget {
    /// The first worksheet, whatever its title.
    First,
    /// A worksheet by exact title.
    Named(String),
}

impl fmt::Display for SheetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetTarget::First => f.write_str("<first worksheet>"),
            SheetTarget::Named(title) => f.write_str(title),
        }
    }
}

/// Range-addressed read/write access to one spreadsheet.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    /// Every value of a worksheet, row-major. Trailing empty cells may be
    /// omitted, so rows can be ragged.
    async fn read_all(&self, sheet: &SheetTarget) -> Result<Vec<Vec<String>>, SheetError>;

    /// Overwrite an A1 range (unqualified, e.g. `G22:G30`) of a worksheet.
    async fn update(
        &self,
        sheet: &SheetTarget,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<(), SheetError>;
}
