//! The reconciliation pass.
//!
//! ## Steps
//!
//! 1. Read every value of the reference worksheet. Failure aborts the pass
//!    before anything is written.
//! 2. Fetch the guild roster. Failure aborts the pass.
//! 3. Merge members with reference OVRs into output rows.
//! 4. Write one bulk update per output column, in layout order.
//!
//! Step 4 is not transactional: if the second write fails the first stays.

use serde::Serialize;

use rollcall_core::{build_rows, OutputRow, ReferenceTable, RosterStats, TeamCatalog};

use crate::error::SyncError;
use crate::layout::{column_values, SheetLayout};
use crate::sheets::SheetBackend;
use crate::source::RosterSource;

/// Whether a pass writes to the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassMode {
    #[default]
    Write,
    /// Compute everything but skip the sheet updates.
    DryRun,
}

/// Outcome of one column update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteResult {
    Written { range: String, rows: usize },
    /// Dry-run mode: the range *would* have been written.
    WouldWrite { range: String, rows: usize },
}

impl WriteResult {
    pub fn range(&self) -> &str {
        match self {
            WriteResult::Written { range, .. } | WriteResult::WouldWrite { range, .. } => range,
        }
    }
}

/// Everything a finished pass produced.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub rows: Vec<OutputRow>,
    pub writes: Vec<WriteResult>,
    pub reference_entries: usize,
    pub skipped_reference_rows: usize,
    pub stats: RosterStats,
}

impl PassReport {
    pub fn written(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| matches!(w, WriteResult::Written { .. }))
            .count()
    }

    /// Rows whose username matched a numeric OVR in the reference sheet.
    pub fn rated_rows(&self) -> usize {
        self.rows.iter().filter(|row| row.ovr.rating().is_some()).count()
    }

    pub fn free_agents(&self) -> usize {
        self.rows.iter().filter(|row| row.label.is_free_agent()).count()
    }
}

/// Run one full reconciliation pass.
pub async fn run_pass(
    roster: &dyn RosterSource,
    sheet: &dyn SheetBackend,
    layout: &SheetLayout,
    catalog: &TeamCatalog,
    mode: PassMode,
) -> Result<PassReport, SyncError> {
    let values = sheet
        .read_all(&layout.reference_sheet)
        .await
        .map_err(SyncError::Reference)?;
    let reference = ReferenceTable::parse(&values, &layout.reference_window);
    tracing::debug!("extracted OVRs: {:?}", reference.ovr_entries());
    tracing::debug!("team logos: {:?}", reference.logos());

    let members = roster.fetch_members().await?;
    let (rows, stats) = build_rows(&members, catalog, &reference);
    tracing::debug!(
        "{} members -> {} rows ({} bots, {} duplicates dropped)",
        members.len(),
        rows.len(),
        stats.bots_skipped,
        stats.duplicates_dropped
    );

    let writes = write_columns(sheet, layout, &rows, mode).await?;
    if !writes.is_empty() && mode == PassMode::Write {
        tracing::info!("sheet updated: {} rows across {} ranges", rows.len(), writes.len());
    }

    Ok(PassReport {
        rows,
        writes,
        reference_entries: reference.ovr_entries().len(),
        skipped_reference_rows: reference.skipped_rows(),
        stats,
    })
}

async fn write_columns(
    sheet: &dyn SheetBackend,
    layout: &SheetLayout,
    rows: &[OutputRow],
    mode: PassMode,
) -> Result<Vec<WriteResult>, SyncError> {
    if rows.is_empty() {
        tracing::info!("no members to write; sheet left untouched");
        return Ok(Vec::new());
    }

    let total = layout.columns.len();
    let mut writes = Vec::with_capacity(total);
    for output in &layout.columns {
        let range = layout.column_range(&output.column, rows.len());

        if mode == PassMode::DryRun {
            tracing::info!("[dry-run] would write: {}", range);
            writes.push(WriteResult::WouldWrite {
                range,
                rows: rows.len(),
            });
            continue;
        }

        let values = column_values(rows, output.field);
        if let Err(source) = sheet.update(&layout.output_sheet, &range, values).await {
            return Err(SyncError::Write {
                range,
                completed: writes.len(),
                total,
                source,
            });
        }
        writes.push(WriteResult::Written {
            range,
            rows: rows.len(),
        });
    }

    Ok(writes)
}
