//! `rollcall sync` — one in-process reconciliation pass.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use rollcall_core::OutputRow;
use rollcall_daemon::{init_tracing, run_once, DaemonConfig};
use rollcall_sync::{PassMode, PassReport, WriteResult};

/// Arguments for `rollcall sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Compute the rows and ranges without writing to the sheet.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = DaemonConfig::from_env().context("invalid configuration")?;
        if !self.json {
            init_tracing();
        }

        let mode = if self.dry_run {
            PassMode::DryRun
        } else {
            PassMode::Write
        };
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let report = runtime
            .block_on(run_once(&config, mode))
            .context("sync pass failed")?;

        if self.json {
            print_json(&report)?;
        } else {
            print_report(&report, self.dry_run);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct SyncReportJson<'a> {
    rows: &'a [OutputRow],
    writes: &'a [WriteResult],
    reference_entries: usize,
    skipped_reference_rows: usize,
    rated_rows: usize,
    free_agents: usize,
    bots_skipped: usize,
    duplicates_dropped: usize,
}

#[derive(Tabled)]
struct RowTable {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "username")]
    username: String,
    #[tabled(rename = "team")]
    team: String,
    #[tabled(rename = "OVR")]
    ovr: String,
}

fn print_json(report: &PassReport) -> Result<()> {
    let payload = SyncReportJson {
        rows: &report.rows,
        writes: &report.writes,
        reference_entries: report.reference_entries,
        skipped_reference_rows: report.skipped_reference_rows,
        rated_rows: report.rated_rows(),
        free_agents: report.free_agents(),
        bots_skipped: report.stats.bots_skipped,
        duplicates_dropped: report.stats.duplicates_dropped,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize sync JSON")?
    );
    Ok(())
}

fn print_report(report: &PassReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };

    if report.rows.is_empty() {
        println!("{prefix}✓ no members to write; sheet left untouched");
        return;
    }

    let table_rows: Vec<RowTable> = report
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| RowTable {
            index: i + 1,
            username: row.username.to_string(),
            team: row.team_and_club(),
            ovr: row.ovr.to_string(),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    println!(
        "{prefix}✓ {} rows ({} rated, {} free agents; {} bots skipped, {} duplicates dropped, {} OVR entries)",
        report.rows.len(),
        report.rated_rows(),
        report.free_agents(),
        report.stats.bots_skipped,
        report.stats.duplicates_dropped,
        report.reference_entries,
    );
    for write in &report.writes {
        match write {
            WriteResult::Written { range, .. } => println!("  ✎  {}", range.green()),
            WriteResult::WouldWrite { range, .. } => println!("  ~  {}", range.yellow()),
        }
    }
}
