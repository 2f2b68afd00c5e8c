//! Agent pool management.
//!
//! One coarse lock guards every structural mutation of the pool: creating
//! and removing agents, and the select-least-loaded-then-append step of task
//! assignment. The agents themselves run outside the lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::agent::{AgentId, AgentStatus, ScrapeAgent};
use super::task::{Task, TaskId, TaskResult};
use crate::config::Config;
use crate::session::SessionFactory;
use crate::storage::ResultSink;

struct PoolInner {
    agents: BTreeMap<AgentId, ScrapeAgent>,
    /// Assignment log: which tasks were routed to which agent
    assignments: BTreeMap<AgentId, Vec<TaskId>>,
    next_id: u64,
}

/// Owns the pool of scraping agents and routes tasks to them.
pub struct AgentManager {
    inner: Mutex<PoolInner>,
    config: Arc<Config>,
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn ResultSink>,
}

impl AgentManager {
    pub fn new(
        config: Arc<Config>,
        factory: Arc<dyn SessionFactory>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                agents: BTreeMap::new(),
                assignments: BTreeMap::new(),
                next_id: 1,
            }),
            config,
            factory,
            sink,
        }
    }

    /// Creates a new idle agent and returns its id. The agent is not started.
    pub async fn create_agent(&self) -> AgentId {
        let mut inner = self.inner.lock().await;
        let id = AgentId(inner.next_id);
        inner.next_id += 1;
        inner.agents.insert(
            id,
            ScrapeAgent::new(
                id,
                Arc::clone(&self.config),
                Arc::clone(&self.factory),
                Arc::clone(&self.sink),
            ),
        );
        inner.assignments.insert(id, Vec::new());
        info!("Created {}", id);
        id
    }

    /// Stops and deletes an agent along with its assignment log. Unknown ids
    /// are no-ops.
    pub async fn remove_agent(&self, id: AgentId) {
        let mut inner = self.inner.lock().await;
        if let Some(mut agent) = inner.agents.remove(&id) {
            agent.stop().await;
            inner.assignments.remove(&id);
            info!("Removed {}", id);
        }
    }

    /// Starts one agent; unknown ids are no-ops.
    pub async fn start_agent(&self, id: AgentId) {
        let mut inner = self.inner.lock().await;
        if let Some(agent) = inner.agents.get_mut(&id) {
            agent.start();
        }
    }

    /// Stops one agent, waiting for its in-flight task; unknown ids are
    /// no-ops.
    pub async fn stop_agent(&self, id: AgentId) {
        let mut inner = self.inner.lock().await;
        if let Some(agent) = inner.agents.get_mut(&id) {
            agent.stop().await;
        }
    }

    /// Pauses one agent: the loop stops but the browser session and queued
    /// tasks are kept, so `start_agent` resumes it. Unknown ids are no-ops.
    pub async fn pause_agent(&self, id: AgentId) {
        let mut inner = self.inner.lock().await;
        if let Some(agent) = inner.agents.get_mut(&id) {
            agent.pause().await;
        }
    }

    /// Starts every agent in the pool.
    pub async fn start_all(&self) {
        let mut inner = self.inner.lock().await;
        for agent in inner.agents.values_mut() {
            agent.start();
        }
    }

    /// Stops every agent, blocking on each in turn.
    pub async fn stop_all(&self) {
        let mut inner = self.inner.lock().await;
        for agent in inner.agents.values_mut() {
            agent.stop().await;
        }
    }

    /// Assigns a task to the agent with the fewest queued tasks. Ties break
    /// to the first agent in creation order. Selection and append happen
    /// under the pool lock, so concurrent submissions cannot race on the
    /// same minimum snapshot.
    ///
    /// Panics if the pool is empty; the distributor always creates at least
    /// one agent.
    pub async fn submit(&self, kw_number: impl Into<String>) -> TaskId {
        let mut inner = self.inner.lock().await;
        let target = inner
            .agents
            .values()
            .min_by_key(|agent| agent.queue_len())
            .map(ScrapeAgent::id)
            .expect("pool has no agents");

        let task = Task::new(kw_number);
        let task_id = task.id.clone();
        if let Some(agent) = inner.agents.get(&target) {
            agent.enqueue(task);
        }
        inner
            .assignments
            .entry(target)
            .or_default()
            .push(task_id.clone());
        info!("Assigned task {} to {}", task_id, target);
        task_id
    }

    /// Submits tasks one at a time, in input order. Not atomic as a whole.
    pub async fn submit_batch(
        &self,
        kw_numbers: impl IntoIterator<Item = String>,
    ) -> Vec<TaskId> {
        let mut task_ids = Vec::new();
        for kw in kw_numbers {
            task_ids.push(self.submit(kw).await);
        }
        task_ids
    }

    /// Status of one agent, `None` for unknown ids.
    pub async fn agent_status(&self, id: AgentId) -> Option<AgentStatus> {
        let inner = self.inner.lock().await;
        inner.agents.get(&id).map(ScrapeAgent::status)
    }

    /// Status of every agent. Each snapshot is taken on its own; the
    /// aggregate is approximate, not a consistent point in time.
    pub async fn status_all(&self) -> BTreeMap<AgentId, AgentStatus> {
        let inner = self.inner.lock().await;
        inner
            .agents
            .iter()
            .map(|(id, agent)| (*id, agent.status()))
            .collect()
    }

    /// The assignment log: task ids per agent, in assignment order.
    pub async fn assignments(&self) -> BTreeMap<AgentId, Vec<TaskId>> {
        let inner = self.inner.lock().await;
        inner.assignments.clone()
    }

    /// All recorded results across the pool, in per-agent order.
    pub async fn results_all(&self) -> Vec<TaskResult> {
        let inner = self.inner.lock().await;
        inner
            .agents
            .values()
            .flat_map(|agent| agent.results())
            .collect()
    }

    /// Ids of all agents, in creation order.
    pub async fn agent_ids(&self) -> Vec<AgentId> {
        let inner = self.inner.lock().await;
        inner.agents.keys().copied().collect()
    }
}
