//! Agent pool core: workers, pool management, work distribution.
//!
//! ## Layering
//!
//! ```text
//! WorkDistributor   (sizes the pool, fans out batches, aggregates progress)
//!     ↓
//! AgentManager      (owns all agents, least-loaded assignment, one pool lock)
//!     ↓
//! ScrapeAgent       (one browser session, one FIFO queue, one loop task)
//!     ↓
//! RegisterScraper   (the fixed per-record retrieval protocol)
//! ```
//!
//! The manager exclusively owns every agent; the distributor only ever goes
//! through the manager's API.

pub mod agent;
pub mod distributor;
pub mod manager;
pub mod task;

pub use agent::{AgentId, AgentStatus, ScrapeAgent};
pub use distributor::{Progress, WorkDistributor};
pub use manager::AgentManager;
pub use task::{Task, TaskId, TaskResult, TaskStatus};
