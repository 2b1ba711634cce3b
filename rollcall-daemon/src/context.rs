//! Session state built once at startup and shared by every pass.

use std::sync::Arc;

use rollcall_core::TeamCatalog;
use rollcall_sync::sheets::{GoogleSheets, GoogleSheetsConfig};
use rollcall_sync::{run_pass, PassMode, PassReport, RosterSource, SheetBackend, SheetLayout, SyncError};

use crate::config::DaemonConfig;
use crate::error::DaemonError;

/// Everything a reconciliation pass needs.
#[derive(Clone)]
pub struct SyncContext {
    pub roster: Arc<dyn RosterSource>,
    pub sheet: Arc<dyn SheetBackend>,
    pub layout: SheetLayout,
    pub catalog: TeamCatalog,
}

impl SyncContext {
    pub fn new(roster: Arc<dyn RosterSource>, sheet: Arc<dyn SheetBackend>) -> Self {
        Self {
            roster,
            sheet,
            layout: SheetLayout::default(),
            catalog: TeamCatalog::default(),
        }
    }

    pub fn with_layout(mut self, layout: SheetLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Wire the Google Sheets backend and the given roster source from config.
    pub fn from_config(
        config: &DaemonConfig,
        roster: Arc<dyn RosterSource>,
    ) -> Result<Self, DaemonError> {
        let sheets = GoogleSheets::new(
            config.service_account.clone(),
            GoogleSheetsConfig::new(config.spreadsheet.clone()),
        )?;
        tracing::info!("spreadsheet access as {}", sheets.service_account());
        Ok(Self::new(roster, Arc::new(sheets)).with_layout(config.layout()))
    }

    pub async fn run_pass(&self, mode: PassMode) -> Result<PassReport, SyncError> {
        run_pass(
            self.roster.as_ref(),
            self.sheet.as_ref(),
            &self.layout,
            &self.catalog,
            mode,
        )
        .await
    }
}
