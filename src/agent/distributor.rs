//! Top-level work distribution.
//!
//! The distributor sizes the agent pool from configuration, fans a batch of
//! KW numbers out through the manager and aggregates progress for reporting.
//! It never touches an agent directly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use super::agent::{AgentId, AgentStatus};
use super::manager::AgentManager;
use super::task::{TaskId, TaskResult};
use crate::config::Config;
use crate::error::AppResult;
use crate::kw_number::KwNumber;
use crate::session::{ChromiumFactory, SessionFactory};
use crate::storage::{FileSink, ResultSink};

/// Aggregated batch progress. An instantaneous estimate: per-agent snapshots
/// are taken one at a time, without a global freeze.
#[derive(Debug, Clone)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_progress: usize,
    /// `completed / total`, `None` while the pool is empty of work
    pub success_rate: Option<f64>,
    pub agents: BTreeMap<AgentId, AgentStatus>,
}

impl Progress {
    /// Whether every submitted task has resolved.
    pub fn is_drained(&self) -> bool {
        self.in_progress == 0
    }
}

/// Façade over the agent pool: sizes it, feeds it batches, reports progress.
pub struct WorkDistributor {
    manager: AgentManager,
    config: Arc<Config>,
}

impl WorkDistributor {
    /// Builds a distributor with the default collaborators: headless
    /// Chromium sessions and a filesystem sink rooted at `output_dir`.
    pub async fn new(config: Config) -> AppResult<Self> {
        let sink = Arc::new(FileSink::new(&config.output_dir)?);
        let factory = Arc::new(ChromiumFactory::new(config.clone()));
        Self::with_collaborators(config, factory, sink).await
    }

    /// Builds a distributor with injected collaborators. This is the seam
    /// tests use to substitute scripted sessions and sinks.
    pub async fn with_collaborators(
        config: Config,
        factory: Arc<dyn SessionFactory>,
        sink: Arc<dyn ResultSink>,
    ) -> AppResult<Self> {
        let config = Arc::new(config);
        let manager = AgentManager::new(Arc::clone(&config), factory, sink);

        let pool_size = config.worker_count.max(1);
        for _ in 0..pool_size {
            manager.create_agent().await;
        }
        info!("📊 Agent pool sized to {}", pool_size);

        Ok(Self { manager, config })
    }

    /// Starts every agent and submits the batch, one task per KW number, in
    /// input order. Numbers are canonicalized first; a number that cannot be
    /// corrected is submitted as-is so the owning agent records the Failed
    /// result. Calling this while a previous batch is still draining layers
    /// the new batch onto the same pool.
    pub async fn start_processing(
        &self,
        kw_numbers: impl IntoIterator<Item = String>,
    ) -> Vec<TaskId> {
        self.manager.start_all().await;

        let mut canonical = Vec::new();
        for raw in kw_numbers {
            match KwNumber::parse(&raw) {
                Ok(kw) => canonical.push(kw.to_string()),
                Err(e) => {
                    warn!("KW number '{}' not correctable: {}", raw, e);
                    canonical.push(raw);
                }
            }
        }

        let count = canonical.len();
        let task_ids = self.manager.submit_batch(canonical).await;
        info!("🚀 Started processing {} KW numbers", count);
        task_ids
    }

    /// Stops every agent, waiting for in-flight tasks to resolve.
    pub async fn stop_processing(&self) {
        self.manager.stop_all().await;
        info!("⏹ Stopped processing");
    }

    /// Current aggregated progress across the pool.
    pub async fn progress(&self) -> Progress {
        let agents = self.manager.status_all().await;

        let completed: usize = agents.values().map(|s| s.completed).sum();
        let failed: usize = agents.values().map(|s| s.failed).sum();
        let queued: usize = agents.values().map(|s| s.queue_len).sum();
        let total = queued + completed + failed;

        Progress {
            total,
            completed,
            failed,
            in_progress: total - (completed + failed),
            success_rate: (total > 0).then(|| completed as f64 / total as f64),
            agents,
        }
    }

    /// Polls progress until the current workload is drained, logging a
    /// progress line per poll. There is no deadline: a stuck agent stalls
    /// the batch.
    pub async fn wait_until_drained(&self) -> Progress {
        let interval = Duration::from_millis(self.config.progress_poll_ms.max(100));
        loop {
            let progress = self.progress().await;
            if progress.is_drained() {
                return progress;
            }
            crate::logger::log_progress(&progress);
            sleep(interval).await;
        }
    }

    /// All recorded results across the pool.
    pub async fn results(&self) -> Vec<TaskResult> {
        self.manager.results_all().await
    }

    /// The pool manager, for direct pool administration.
    pub fn manager(&self) -> &AgentManager {
        &self.manager
    }
}
