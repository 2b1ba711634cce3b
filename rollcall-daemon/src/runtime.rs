use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serenity::all::{Client, Http};
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::time::Instant;

use rollcall_sync::{PassMode, PassReport};

use crate::config::DaemonConfig;
use crate::context::SyncContext;
use crate::discord::{build_client, DiscordRoster, GatewayBridge, MemberEvent};
use crate::error::{error_chain, io_err, DaemonError};
use crate::liveness::{router, LivenessState};

const SYNC_QUEUE_CAPACITY: usize = 64;

/// What asked for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Startup,
    Timer,
    MemberUpdated,
    MemberJoined,
    MemberLeft,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trigger::Startup => "startup",
            Trigger::Timer => "timer",
            Trigger::MemberUpdated => "member_updated",
            Trigger::MemberJoined => "member_joined",
            Trigger::MemberLeft => "member_left",
        };
        f.write_str(label)
    }
}

impl From<&MemberEvent> for Trigger {
    fn from(event: &MemberEvent) -> Self {
        match event {
            MemberEvent::Updated { .. } => Trigger::MemberUpdated,
            MemberEvent::Joined { .. } => Trigger::MemberJoined,
            MemberEvent::Left { .. } => Trigger::MemberLeft,
        }
    }
}

struct SyncJob {
    trigger: Trigger,
    respond_to: Option<oneshot::Sender<Result<PassSummary, String>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub trigger: Trigger,
    pub rows: usize,
    pub written: usize,
    /// Jobs answered by this pass, including the one that started it.
    pub coalesced: usize,
    pub duration_ms: u128,
    pub finished_at_unix: u64,
}

/// Outcome of the most recent passes, served by `/status`.
#[derive(Debug, Clone, Default)]
pub struct PassHistory {
    pub last_pass: Option<PassSummary>,
    pub last_error: Option<String>,
    pub passes: u64,
    pub failures: u64,
}

impl PassHistory {
    pub fn record_success(&mut self, summary: PassSummary) {
        self.passes += 1;
        self.last_pass = Some(summary);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: String) {
        self.passes += 1;
        self.failures += 1;
        self.last_error = Some(error);
    }
}

/// Timer settings for the periodic pass.
#[derive(Debug, Clone, Copy)]
struct Schedule {
    startup_delay: Duration,
    interval: Duration,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: DaemonConfig) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run one pass over REST only, without connecting to the gateway.
pub async fn run_once(config: &DaemonConfig, mode: PassMode) -> Result<PassReport, DaemonError> {
    let http = Arc::new(Http::new(&config.bot_token));
    let roster = Arc::new(DiscordRoster::new(http, config.guild_id));
    let ctx = SyncContext::from_config(config, roster)?;
    Ok(ctx.run_pass(mode).await?)
}

/// Run the daemon runtime.
pub async fn run(config: DaemonConfig) -> Result<(), DaemonError> {
    let (events_tx, events_rx) = mpsc::unbounded_channel::<MemberEvent>();
    let (ready_tx, ready_rx) = watch::channel(false);
    let client = build_client(
        &config,
        GatewayBridge::new(config.guild_id, events_tx, ready_tx),
    )
    .await?;

    let roster = Arc::new(DiscordRoster::new(client.http.clone(), config.guild_id));
    let ctx = SyncContext::from_config(&config, roster)?;
    let schedule = Schedule {
        startup_delay: config.startup_delay,
        interval: config.sync_interval,
    };
    let history = Arc::new(RwLock::new(PassHistory::default()));
    let liveness = LivenessState {
        history: history.clone(),
        started_at_unix: unix_seconds_now(),
    };
    let addr = format!("{}:{}", config.host, config.port);

    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(SYNC_QUEUE_CAPACITY);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let gateway_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = gateway_task(client, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = sync_processor_task(ctx, history, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let timer_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = timer_task(sync_tx, ready_rx, schedule, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let events_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = member_event_task(events_rx, sync_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };
    drop(sync_tx);

    let liveness_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = liveness_task(addr, liveness, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (
        gateway_result,
        processor_result,
        timer_result,
        events_result,
        liveness_result,
        signal_result,
    ) = tokio::join!(
        gateway_handle,
        processor_handle,
        timer_handle,
        events_handle,
        liveness_handle,
        signal_handle
    );

    handle_join("gateway", gateway_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("timer", timer_result)?;
    handle_join("member_events", events_result)?;
    handle_join("liveness", liveness_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn gateway_task(
    mut client: Client,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let shard_manager = client.shard_manager.clone();
    tokio::select! {
        result = client.start() => {
            result?;
            tracing::info!("gateway connection closed");
            Ok(())
        }
        _ = shutdown_rx.recv() => {
            shard_manager.shutdown_all().await;
            Ok(())
        }
    }
}

/// Sole consumer of the sync queue, so passes never overlap. Jobs that pile
/// up while a pass runs are answered together by the next one.
async fn sync_processor_task(
    ctx: SyncContext,
    history: Arc<RwLock<PassHistory>>,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let mut batch = vec![job];
                while let Ok(next) = sync_rx.try_recv() {
                    batch.push(next);
                }

                let outcome = process_batch(&ctx, &history, batch[0].trigger, batch.len()).await;
                for job in batch {
                    if let Some(respond_to) = job.respond_to {
                        let _ = respond_to.send(outcome.clone());
                    }
                }
            }
        }
    }

    Ok(())
}

async fn process_batch(
    ctx: &SyncContext,
    history: &RwLock<PassHistory>,
    trigger: Trigger,
    coalesced: usize,
) -> Result<PassSummary, String> {
    let started = Instant::now();
    match ctx.run_pass(PassMode::Write).await {
        Ok(report) => {
            let summary = PassSummary {
                trigger,
                rows: report.rows.len(),
                written: report.written(),
                coalesced,
                duration_ms: started.elapsed().as_millis(),
                finished_at_unix: unix_seconds_now(),
            };
            tracing::info!(
                trigger = %summary.trigger,
                rows = summary.rows,
                written = summary.written,
                coalesced = summary.coalesced,
                duration_ms = summary.duration_ms,
                "sync pass completed",
            );
            history.write().await.record_success(summary.clone());
            Ok(summary)
        }
        Err(err) => {
            let rendered = error_chain(&err);
            tracing::error!(trigger = %trigger, error = %rendered, "sync pass failed");
            history.write().await.record_failure(rendered.clone());
            Err(rendered)
        }
    }
}

async fn timer_task(
    sync_tx: mpsc::Sender<SyncJob>,
    mut ready_rx: watch::Receiver<bool>,
    schedule: Schedule,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    tokio::select! {
        _ = shutdown_rx.recv() => return Ok(()),
        ready = wait_until_ready(&mut ready_rx) => {
            if !ready {
                return Ok(());
            }
        }
    }

    tokio::select! {
        _ = shutdown_rx.recv() => return Ok(()),
        _ = tokio::time::sleep(schedule.startup_delay) => {}
    }
    if !scheduled_pass(&sync_tx, Trigger::Startup).await {
        return Ok(());
    }

    loop {
        if !scheduled_pass(&sync_tx, Trigger::Timer).await {
            break;
        }
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(schedule.interval) => {}
        }
    }

    Ok(())
}

async fn wait_until_ready(ready_rx: &mut watch::Receiver<bool>) -> bool {
    ready_rx.wait_for(|ready| *ready).await.is_ok()
}

/// Run one timer-driven pass. Returns `false` once the processor is gone.
async fn scheduled_pass(sync_tx: &mpsc::Sender<SyncJob>, trigger: Trigger) -> bool {
    match enqueue_sync(sync_tx, trigger).await {
        Ok(summary) => {
            tracing::debug!(trigger = %trigger, rows = summary.rows, "scheduled pass done");
            true
        }
        Err(DaemonError::ChannelClosed(_)) => false,
        Err(err) => {
            tracing::warn!(trigger = %trigger, error = %err, "scheduled pass failed; retrying next cycle");
            true
        }
    }
}

async fn member_event_task(
    mut events_rx: mpsc::UnboundedReceiver<MemberEvent>,
    sync_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                request_sync(&sync_tx, Trigger::from(&event));
            }
        }
    }

    Ok(())
}

async fn liveness_task(
    addr: String,
    state: LivenessState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| io_err(&addr, e))?;
    tracing::info!("liveness endpoint listening on http://{}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| io_err(&addr, e))
}

/// Queue a pass and wait for its outcome.
async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    trigger: Trigger,
) -> Result<PassSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            trigger,
            respond_to: Some(tx),
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

/// Queue a pass without waiting. A full queue already holds a pending pass.
fn request_sync(sync_tx: &mpsc::Sender<SyncJob>, trigger: Trigger) {
    let job = SyncJob {
        trigger,
        respond_to: None,
    };
    match sync_tx.try_send(job) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::debug!(trigger = %trigger, "sync queue full; pending pass will cover it");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::warn!(trigger = %trigger, "sync queue closed; event ignored");
        }
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the fmt subscriber. `RUST_LOG` overrides the default `info` level;
/// `LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rollcall_core::RawMember;
    use rollcall_sync::{RosterSource, SheetBackend, SheetError, SheetTarget, SourceError};
    use tokio::sync::Notify;
    use tokio::time::advance;

    use super::*;

    /// Roster that can hold each fetch until released.
    struct GatedRoster {
        fetches: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    #[async_trait]
    impl RosterSource for GatedRoster {
        async fn fetch_members(&self) -> Result<Vec<RawMember>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(SourceError::GuildNotFound { guild_id: 9 });
            }
            Ok(vec![RawMember {
                nick: Some("Alex (EU)".into()),
                name: Some("alex".into()),
                bot: false,
                roles: vec!["WC | Germany".into()],
            }])
        }
    }

    #[derive(Default)]
    struct CountingSheet {
        updates: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SheetBackend for CountingSheet {
        async fn read_all(&self, _sheet: &SheetTarget) -> Result<Vec<Vec<String>>, SheetError> {
            Ok(Vec::new())
        }

        async fn update(
            &self,
            _sheet: &SheetTarget,
            range: &str,
            _values: Vec<Vec<String>>,
        ) -> Result<(), SheetError> {
            self.updates.lock().expect("lock").push(range.to_string());
            Ok(())
        }
    }

    fn context(roster: Arc<GatedRoster>, sheet: Arc<CountingSheet>) -> SyncContext {
        SyncContext::new(roster, sheet)
    }

    fn roster(gate: Option<Arc<Notify>>, fail: bool) -> Arc<GatedRoster> {
        Arc::new(GatedRoster {
            fetches: AtomicUsize::new(0),
            gate,
            fail,
        })
    }

    #[tokio::test]
    async fn queued_jobs_coalesce_into_one_pass() {
        let gate = Arc::new(Notify::new());
        let roster = roster(Some(gate.clone()), false);
        let sheet = Arc::new(CountingSheet::default());
        let history = Arc::new(RwLock::new(PassHistory::default()));
        let (sync_tx, sync_rx) = mpsc::channel(SYNC_QUEUE_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let processor = tokio::spawn(sync_processor_task(
            context(roster.clone(), sheet.clone()),
            history.clone(),
            sync_rx,
            shutdown_tx.subscribe(),
        ));

        // First pass starts and blocks inside the roster fetch.
        let first = {
            let sync_tx = sync_tx.clone();
            tokio::spawn(async move { enqueue_sync(&sync_tx, Trigger::Startup).await })
        };
        while roster.fetches.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Three more triggers arrive while it runs.
        request_sync(&sync_tx, Trigger::MemberJoined);
        request_sync(&sync_tx, Trigger::MemberLeft);
        let waiting = {
            let sync_tx = sync_tx.clone();
            tokio::spawn(async move { enqueue_sync(&sync_tx, Trigger::Timer).await })
        };
        while sync_tx.capacity() > SYNC_QUEUE_CAPACITY - 3 {
            tokio::task::yield_now().await;
        }

        gate.notify_one();
        let first = first.await.expect("join").expect("first pass");
        assert_eq!(first.trigger, Trigger::Startup);
        assert_eq!(first.coalesced, 1);

        while roster.fetches.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();
        let second = waiting.await.expect("join").expect("second pass");
        assert_eq!(second.trigger, Trigger::MemberJoined);
        assert_eq!(second.coalesced, 3);

        assert_eq!(roster.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(sheet.updates.lock().expect("lock").len(), 6);
        assert_eq!(history.read().await.passes, 2);

        let _ = shutdown_tx.send(());
        processor.await.expect("join").expect("processor");
    }

    #[tokio::test]
    async fn failed_pass_is_reported_and_processor_keeps_running() {
        let roster = roster(None, true);
        let sheet = Arc::new(CountingSheet::default());
        let history = Arc::new(RwLock::new(PassHistory::default()));
        let (sync_tx, sync_rx) = mpsc::channel(SYNC_QUEUE_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let processor = tokio::spawn(sync_processor_task(
            context(roster.clone(), sheet.clone()),
            history.clone(),
            sync_rx,
            shutdown_tx.subscribe(),
        ));

        for _ in 0..2 {
            let err = enqueue_sync(&sync_tx, Trigger::Timer).await.unwrap_err();
            assert!(err.to_string().contains("guild 9 not found"), "got: {err}");
        }

        let history = history.read().await;
        assert_eq!(history.failures, 2);
        assert!(history.last_pass.is_none());
        assert!(sheet.updates.lock().expect("lock").is_empty());

        let _ = shutdown_tx.send(());
        processor.await.expect("join").expect("processor");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn timer_waits_for_ready_then_delay_then_repeats() {
        let (sync_tx, mut sync_rx) = mpsc::channel::<SyncJob>(SYNC_QUEUE_CAPACITY);
        let (ready_tx, ready_rx) = watch::channel(false);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let schedule = Schedule {
            startup_delay: Duration::from_secs(2),
            interval: Duration::from_secs(60),
        };

        let timer = tokio::spawn(timer_task(
            sync_tx,
            ready_rx,
            schedule,
            shutdown_tx.subscribe(),
        ));

        // Nothing runs before the gateway reports ready.
        advance(Duration::from_secs(300)).await;
        assert!(sync_rx.try_recv().is_err());

        ready_tx.send_replace(true);
        let started = Instant::now();
        let mut triggers = Vec::new();
        for _ in 0..3 {
            let job = sync_rx.recv().await.expect("job");
            triggers.push((job.trigger, started.elapsed().as_secs()));
            let summary = PassSummary {
                trigger: job.trigger,
                rows: 0,
                written: 0,
                coalesced: 1,
                duration_ms: 0,
                finished_at_unix: 0,
            };
            if let Some(respond_to) = job.respond_to {
                let _ = respond_to.send(Ok(summary));
            }
        }

        assert_eq!(
            triggers,
            [
                (Trigger::Startup, 2),
                (Trigger::Timer, 2),
                (Trigger::Timer, 62),
            ]
        );

        let _ = shutdown_tx.send(());
        timer.await.expect("join").expect("timer");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn timer_survives_failed_passes() {
        let (sync_tx, mut sync_rx) = mpsc::channel::<SyncJob>(SYNC_QUEUE_CAPACITY);
        let (_ready_tx, ready_rx) = watch::channel(true);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let schedule = Schedule {
            startup_delay: Duration::from_secs(0),
            interval: Duration::from_secs(60),
        };

        let timer = tokio::spawn(timer_task(
            sync_tx,
            ready_rx,
            schedule,
            shutdown_tx.subscribe(),
        ));

        for _ in 0..3 {
            let job = sync_rx.recv().await.expect("job keeps coming");
            if let Some(respond_to) = job.respond_to {
                let _ = respond_to.send(Err("sheet backend error: quota".to_string()));
            }
        }

        let _ = shutdown_tx.send(());
        timer.await.expect("join").expect("timer");
    }

    #[tokio::test]
    async fn member_events_enqueue_detached_jobs() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sync_tx, mut sync_rx) = mpsc::channel::<SyncJob>(SYNC_QUEUE_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let task = tokio::spawn(member_event_task(
            events_rx,
            sync_tx,
            shutdown_tx.subscribe(),
        ));

        events_tx
            .send(MemberEvent::Updated { user_id: 1 })
            .expect("send");
        events_tx
            .send(MemberEvent::Left { user_id: 2 })
            .expect("send");

        let first = sync_rx.recv().await.expect("first job");
        let second = sync_rx.recv().await.expect("second job");
        assert_eq!(first.trigger, Trigger::MemberUpdated);
        assert_eq!(second.trigger, Trigger::MemberLeft);
        assert!(first.respond_to.is_none());

        drop(events_tx);
        task.await.expect("join").expect("event task");
    }
}
