//! A single scraping agent.
//!
//! Each agent owns one browser session and one FIFO task queue, drained by a
//! dedicated tokio task. The loop wakes on enqueue (the channel recv is the
//! wake signal) and observes stop requests between tasks, never mid-task.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::task::{Task, TaskResult, TaskStatus};
use crate::config::Config;
use crate::error::AppError;
use crate::kw_number::KwNumber;
use crate::scrape::RegisterScraper;
use crate::session::{BrowserSession, SessionFactory};
use crate::storage::{artifact_filename, ResultSink};

/// Stable agent identifier. Sequential, so pool iteration order is creation
/// order and least-loaded ties resolve deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Point-in-time snapshot of one agent.
#[derive(Debug, Clone)]
pub struct AgentStatus {
    pub agent_id: AgentId,
    pub running: bool,
    pub current_task: Option<String>,
    pub queue_len: usize,
    pub completed: usize,
    pub failed: usize,
    pub uptime: Duration,
    /// `completed / (completed + failed)`, `None` before any task resolved
    pub success_rate: Option<f64>,
}

/// Mutable bookkeeping, guarded by one small lock so that
/// `queue_len + completed + failed` is always exact.
#[derive(Debug, Default)]
struct AgentState {
    queued: usize,
    completed: usize,
    failed: usize,
    current_task: Option<String>,
    started_at: Option<DateTime<Local>>,
}

/// State shared between the agent handle and its loop task.
struct AgentShared {
    state: Mutex<AgentState>,
    results: Mutex<Vec<TaskResult>>,
    running: AtomicBool,
}

impl AgentShared {
    fn lock_state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_results(&self) -> MutexGuard<'_, Vec<TaskResult>> {
        self.results.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Receiver end and session identity, handed to the loop on start and handed
/// back when the loop exits, so pause/resume keeps both.
struct LoopParts {
    rx: UnboundedReceiver<Task>,
    session: Option<Box<dyn BrowserSession>>,
}

/// One scraping agent, owned by the pool manager.
pub struct ScrapeAgent {
    id: AgentId,
    tx: UnboundedSender<Task>,
    shared: Arc<AgentShared>,
    stop: Arc<Notify>,
    idle: Option<LoopParts>,
    join: Option<JoinHandle<LoopParts>>,
    config: Arc<Config>,
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn ResultSink>,
}

impl ScrapeAgent {
    pub fn new(
        id: AgentId,
        config: Arc<Config>,
        factory: Arc<dyn SessionFactory>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id,
            tx,
            shared: Arc::new(AgentShared {
                state: Mutex::new(AgentState::default()),
                results: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
            }),
            stop: Arc::new(Notify::new()),
            idle: Some(LoopParts { rx, session: None }),
            join: None,
            config,
            factory,
            sink,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Appends a task to the agent's queue. Non-blocking, always succeeds.
    pub fn enqueue(&self, task: Task) {
        {
            let mut state = self.shared.lock_state();
            state.queued += 1;
        }
        info!("{}: queued task {} for KW {}", self.id, task.id, task.kw_number);
        // The receiver lives as long as the agent, so this cannot fail.
        let _ = self.tx.send(task);
    }

    /// Queued tasks, in-flight one included until its result is recorded.
    pub fn queue_len(&self) -> usize {
        self.shared.lock_state().queued
    }

    /// Spawns the processing loop. Idempotent: starting a running agent has
    /// no effect. After `pause` this resumes with the same session and queue.
    pub fn start(&mut self) {
        if self.join.is_some() {
            return;
        }
        let parts = match self.idle.take() {
            Some(parts) => parts,
            None => return,
        };

        {
            let mut state = self.shared.lock_state();
            state.started_at = Some(Local::now());
        }
        self.shared.running.store(true, Ordering::SeqCst);

        let ctx = LoopCtx {
            id: self.id,
            shared: Arc::clone(&self.shared),
            stop: Arc::clone(&self.stop),
            config: Arc::clone(&self.config),
            factory: Arc::clone(&self.factory),
            sink: Arc::clone(&self.sink),
        };
        self.join = Some(tokio::spawn(run_loop(ctx, parts)));
        info!("{}: started", self.id);
    }

    /// Stops the loop and releases the browser session. Waits for the
    /// in-flight task (if any) to resolve to a result first.
    pub async fn stop(&mut self) {
        self.halt(true).await;
        info!("{}: stopped", self.id);
    }

    /// Stops the loop but keeps the browser session open; queued tasks stay
    /// queued. A later `start` resumes exactly where the agent left off.
    pub async fn pause(&mut self) {
        self.halt(false).await;
        info!("{}: paused", self.id);
    }

    async fn halt(&mut self, close_session: bool) {
        if let Some(join) = self.join.take() {
            self.stop.notify_one();
            match join.await {
                Ok(parts) => self.idle = Some(parts),
                Err(e) => {
                    // Loop aborted without handing back its parts; rebuild
                    // the queue so the agent stays usable.
                    error!("{}: loop task failed: {}", self.id, e);
                    let (tx, rx) = mpsc::unbounded_channel();
                    self.tx = tx;
                    self.shared.lock_state().queued = 0;
                    self.idle = Some(LoopParts { rx, session: None });
                }
            }
        }
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.lock_state().current_task = None;

        if close_session {
            if let Some(parts) = self.idle.as_mut() {
                if let Some(mut session) = parts.session.take() {
                    if let Err(e) = session.close().await {
                        warn!("{}: session close failed: {}", self.id, e);
                    }
                }
            }
        }
    }

    /// Point-in-time status snapshot.
    pub fn status(&self) -> AgentStatus {
        let state = self.shared.lock_state();
        let resolved = state.completed + state.failed;
        let uptime = state
            .started_at
            .map(|t| (Local::now() - t).to_std().unwrap_or_default())
            .unwrap_or_default();
        AgentStatus {
            agent_id: self.id,
            running: self.shared.running.load(Ordering::SeqCst),
            current_task: state.current_task.clone(),
            queue_len: state.queued,
            completed: state.completed,
            failed: state.failed,
            uptime,
            success_rate: (resolved > 0).then(|| state.completed as f64 / resolved as f64),
        }
    }

    /// Snapshot of the agent's result log.
    pub fn results(&self) -> Vec<TaskResult> {
        self.shared.lock_results().clone()
    }
}

struct LoopCtx {
    id: AgentId,
    shared: Arc<AgentShared>,
    stop: Arc<Notify>,
    config: Arc<Config>,
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn ResultSink>,
}

/// The agent's processing loop. Per-task failures are converted into Failed
/// results; only a stop/pause request ends the loop.
async fn run_loop(ctx: LoopCtx, mut parts: LoopParts) -> LoopParts {
    loop {
        let task = tokio::select! {
            biased;
            _ = ctx.stop.notified() => break,
            maybe = parts.rx.recv() => match maybe {
                Some(task) => task,
                None => break,
            },
        };

        {
            let mut state = ctx.shared.lock_state();
            state.current_task = Some(task.kw_number.clone());
        }
        let started_at = Local::now();

        let (kw_display, outcome) = process_task(&ctx, &mut parts, &task).await;

        let result = match outcome {
            Ok(files) => {
                info!("{}: ✅ {} done ({} files)", ctx.id, kw_display, files.len());
                TaskResult {
                    task_id: task.id.clone(),
                    kw_number: kw_display,
                    status: TaskStatus::Success,
                    started_at,
                    finished_at: Local::now(),
                    error: None,
                    files,
                }
            }
            Err(e) => {
                error!("{}: ❌ {} failed: {}", ctx.id, kw_display, e);
                TaskResult {
                    task_id: task.id.clone(),
                    kw_number: kw_display,
                    status: TaskStatus::Failed,
                    started_at,
                    finished_at: Local::now(),
                    error: Some(e.to_string()),
                    files: Vec::new(),
                }
            }
        };

        let status = result.status;
        ctx.shared.lock_results().push(result);
        {
            // The queued slot is released together with the counter bump so
            // aggregate totals never dip while a task is in flight.
            let mut state = ctx.shared.lock_state();
            state.current_task = None;
            state.queued = state.queued.saturating_sub(1);
            match status {
                TaskStatus::Success => state.completed += 1,
                TaskStatus::Failed => state.failed += 1,
            }
        }

        if ctx.config.task_delay_ms > 0 {
            sleep(Duration::from_millis(ctx.config.task_delay_ms)).await;
        }
    }
    parts
}

/// Runs the retrieval protocol for one task. Returns the KW number the
/// result should be recorded under (corrected when possible) and the outcome.
async fn process_task(
    ctx: &LoopCtx,
    parts: &mut LoopParts,
    task: &Task,
) -> (String, Result<Vec<std::path::PathBuf>, AppError>) {
    // 1. Validate and correct the number. Invalid characters fail the task
    //    without touching the browser.
    let kw = match KwNumber::parse(&task.kw_number) {
        Ok(kw) => kw,
        Err(e) => return (task.kw_number.clone(), Err(e)),
    };
    let kw_display = kw.to_string();

    // A number whose artifacts are already complete on disk is not fetched
    // again when skipping is enabled.
    let formats = ctx.config.formats();
    if ctx.config.skip_existing && !formats.is_empty() {
        let filename = artifact_filename(&kw_display);
        if formats.iter().all(|f| ctx.sink.file_exists(&filename, *f)) {
            info!("⏭️ {} already saved in every format, skipping", kw_display);
            let paths = formats
                .iter()
                .map(|f| ctx.sink.file_path(&filename, *f))
                .collect();
            return (kw_display, Ok(paths));
        }
    }

    let outcome = async {
        // 2. Open the session lazily, on the first task that needs it.
        if parts.session.is_none() {
            parts.session = Some(ctx.factory.create().await?);
        }
        let session = parts
            .session
            .as_deref()
            .ok_or_else(|| AppError::Automation("no session".to_string()))?;

        // 3.–6. Search, probe, extract, persist.
        let scraper = RegisterScraper::new(session, &ctx.config);
        let data = scraper.scrape(&kw).await?;
        scraper.persist(&data, ctx.sink.as_ref(), &formats).await
    }
    .await;

    (kw_display, outcome)
}
