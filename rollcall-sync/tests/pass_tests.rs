//! End-to-end reconciliation passes against in-memory roster and sheet fakes.

use std::sync::Mutex;

use async_trait::async_trait;
use rollcall_core::{Ovr, RawMember, TeamCatalog};
use rollcall_sync::{
    run_pass, PassMode, RosterSource, SheetBackend, SheetError, SheetLayout, SheetTarget,
    SourceError, SyncError, WriteResult,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeRoster {
    members: Result<Vec<RawMember>, String>,
}

#[async_trait]
impl RosterSource for FakeRoster {
    async fn fetch_members(&self) -> Result<Vec<RawMember>, SourceError> {
        match &self.members {
            Ok(members) => Ok(members.clone()),
            Err(msg) if msg == "missing guild" => Err(SourceError::GuildNotFound { guild_id: 42 }),
            Err(msg) => Err(SourceError::Platform(msg.clone())),
        }
    }
}

#[derive(Default)]
struct MemorySheet {
    reference: Vec<Vec<String>>,
    fail_reference: bool,
    /// Zero-based index of the update call that fails.
    fail_update_at: Option<usize>,
    updates: Mutex<Vec<(SheetTarget, String, Vec<Vec<String>>)>>,
    update_calls: Mutex<usize>,
}

#[async_trait]
impl SheetBackend for MemorySheet {
    async fn read_all(&self, sheet: &SheetTarget) -> Result<Vec<Vec<String>>, SheetError> {
        assert_eq!(sheet, &SheetTarget::Named("Team Sheets".into()));
        if self.fail_reference {
            return Err(SheetError::Backend("quota exceeded".into()));
        }
        Ok(self.reference.clone())
    }

    async fn update(
        &self,
        sheet: &SheetTarget,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<(), SheetError> {
        let call = {
            let mut calls = self.update_calls.lock().expect("lock");
            *calls += 1;
            *calls - 1
        };
        if self.fail_update_at == Some(call) {
            return Err(SheetError::Backend("connection reset".into()));
        }
        self.updates
            .lock()
            .expect("lock")
            .push((sheet.clone(), range.to_string(), values));
        Ok(())
    }
}

impl MemorySheet {
    fn with_reference(rows: &[&[&str]]) -> Self {
        let mut reference = vec![vec!["".to_string()]; 8];
        reference.extend(
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect::<Vec<_>>()),
        );
        Self {
            reference,
            ..Self::default()
        }
    }

    fn written(&self) -> Vec<(SheetTarget, String, Vec<Vec<String>>)> {
        self.updates.lock().expect("lock").clone()
    }
}

fn member(nick: Option<&str>, name: &str, roles: &[&str]) -> RawMember {
    RawMember {
        nick: nick.map(str::to_string),
        name: Some(name.to_string()),
        bot: false,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

fn cells(values: &[Vec<String>]) -> Vec<&str> {
    values.iter().map(|row| row[0].as_str()).collect()
}

fn three_member_roster() -> Vec<RawMember> {
    vec![
        member(None, "Sam", &["Member"]),
        member(Some("Alex (EU)"), "alex_de", &["WC | Germany"]),
        member(Some("ALEX"), "alex_other", &["WC | Germany", "UCL | Arsenal"]),
        member(Some("Kim"), "kim", &["UCL | Arsenal", "WC | Germany"]),
    ]
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_pass_writes_three_columns_in_first_seen_order() {
    init_logging();
    let roster = FakeRoster {
        members: Ok(three_member_roster()),
    };
    let sheet = MemorySheet::with_reference(&[&["kim", "87", "logo.png", "Germany"]]);

    let report = run_pass(
        &roster,
        &sheet,
        &SheetLayout::default(),
        &TeamCatalog::default(),
        PassMode::Write,
    )
    .await
    .expect("pass");

    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.stats.duplicates_dropped, 1);
    assert_eq!(report.rows[0].ovr.to_string(), "--");
    assert_eq!(report.rows[1].ovr, Ovr::Missing);
    assert_eq!(report.rows[2].ovr, Ovr::Rating(87));
    assert_eq!(report.rated_rows(), 1);
    assert_eq!(report.free_agents(), 1);
    assert_eq!(report.written(), 3);

    let written = sheet.written();
    let ranges: Vec<_> = written.iter().map(|(_, range, _)| range.as_str()).collect();
    assert_eq!(ranges, ["G22:G24", "H22:H24", "P22:P24"]);
    assert!(written.iter().all(|(target, _, _)| *target == SheetTarget::First));

    assert_eq!(cells(&written[0].2), ["Sam", "Alex", "Kim"]);
    assert_eq!(cells(&written[1].2), ["Free Agent", "Germany", "Germany, Arsenal"]);
    assert_eq!(cells(&written[2].2), ["FREE AGENT", "GERMANY", "GERMANY, ARSENAL"]);
}

#[tokio::test]
async fn reference_failure_aborts_without_writing() {
    let roster = FakeRoster {
        members: Ok(three_member_roster()),
    };
    let sheet = MemorySheet {
        fail_reference: true,
        ..MemorySheet::default()
    };

    let err = run_pass(
        &roster,
        &sheet,
        &SheetLayout::default(),
        &TeamCatalog::default(),
        PassMode::Write,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SyncError::Reference(_)), "got: {err}");
    assert!(sheet.written().is_empty());
}

#[tokio::test]
async fn missing_guild_aborts_without_writing() {
    let roster = FakeRoster {
        members: Err("missing guild".into()),
    };
    let sheet = MemorySheet::with_reference(&[]);

    let err = run_pass(
        &roster,
        &sheet,
        &SheetLayout::default(),
        &TeamCatalog::default(),
        PassMode::Write,
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, SyncError::Roster(SourceError::GuildNotFound { guild_id: 42 })),
        "got: {err}"
    );
    assert!(err.to_string().contains("guild 42 not found"));
    assert!(sheet.written().is_empty());
}

#[tokio::test]
async fn partial_write_failure_leaves_earlier_ranges_written() {
    let roster = FakeRoster {
        members: Ok(three_member_roster()),
    };
    let sheet = MemorySheet {
        fail_update_at: Some(1),
        ..MemorySheet::with_reference(&[])
    };

    let err = run_pass(
        &roster,
        &sheet,
        &SheetLayout::default(),
        &TeamCatalog::default(),
        PassMode::Write,
    )
    .await
    .unwrap_err();

    match err {
        SyncError::Write {
            range,
            completed,
            total,
            ..
        } => {
            assert_eq!(range, "H22:H24");
            assert_eq!(completed, 1);
            assert_eq!(total, 3);
        }
        other => panic!("expected write error, got {other:?}"),
    }
    let written = sheet.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].1, "G22:G24");
}

#[tokio::test]
async fn empty_roster_writes_nothing() {
    let mut bot = member(None, "helper-bot", &[]);
    bot.bot = true;
    let roster = FakeRoster {
        members: Ok(vec![bot]),
    };
    let sheet = MemorySheet::with_reference(&[]);

    let report = run_pass(
        &roster,
        &sheet,
        &SheetLayout::default(),
        &TeamCatalog::default(),
        PassMode::Write,
    )
    .await
    .expect("pass");

    assert!(report.rows.is_empty());
    assert!(report.writes.is_empty());
    assert_eq!(report.stats.bots_skipped, 1);
    assert!(sheet.written().is_empty());
}

#[tokio::test]
async fn dry_run_reports_ranges_without_updating() {
    let roster = FakeRoster {
        members: Ok(three_member_roster()),
    };
    let sheet = MemorySheet::with_reference(&[]);

    let report = run_pass(
        &roster,
        &sheet,
        &SheetLayout::default(),
        &TeamCatalog::default(),
        PassMode::DryRun,
    )
    .await
    .expect("pass");

    assert_eq!(report.written(), 0);
    assert!(report
        .writes
        .iter()
        .all(|w| matches!(w, WriteResult::WouldWrite { rows: 3, .. })));
    assert_eq!(report.writes[2].range(), "P22:P24");
    assert!(sheet.written().is_empty());
}

#[tokio::test]
async fn optional_ovr_column_writes_placeholders() {
    let roster = FakeRoster {
        members: Ok(three_member_roster()),
    };
    let sheet = MemorySheet::with_reference(&[&["Sam", "75"], &["Alex", "N/A"]]);

    let report = run_pass(
        &roster,
        &sheet,
        &SheetLayout::default().with_ovr_column("I"),
        &TeamCatalog::default(),
        PassMode::Write,
    )
    .await
    .expect("pass");

    assert_eq!(report.writes.len(), 4);
    assert_eq!(report.skipped_reference_rows, 1);
    let written = sheet.written();
    assert_eq!(written[2].1, "I22:I24");
    assert_eq!(cells(&written[2].2), ["75", "--", "--"]);
}
