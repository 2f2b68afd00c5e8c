//! # KW Scraper
//!
//! Batch downloader for Polish electronic land-registry records (księgi
//! wieczyste). A configurable pool of scraping agents drains a batch of KW
//! numbers; each agent owns one headless-browser session and persists every
//! record it fetches in the configured formats.
//!
//! ## Architecture
//!
//! Four layers, dependencies pointing strictly downward:
//!
//! ### ① Infrastructure
//! - `session` - the browser-automation capability boundary; concrete
//!   sessions are headless Chromium, tests inject scripted ones
//! - `storage` - the persistence boundary; concrete sink is the filesystem
//!
//! ### ② Capabilities
//! - `kw_number` - KW number validation and control-digit correction
//! - `scrape` - the fixed search-and-extract protocol for one record
//!
//! ### ③ Workers
//! - `agent` - one browser session + one FIFO queue + one loop task each;
//!   per-task failures become results, never loop exits
//!
//! ### ④ Orchestration
//! - `agent::manager` - pool ownership and least-loaded task assignment
//! - `agent::distributor` - pool sizing, batch fan-out, progress aggregation

pub mod agent;
pub mod config;
pub mod error;
pub mod kw_number;
pub mod logger;
pub mod scrape;
pub mod session;
pub mod storage;

pub use agent::{
    AgentId, AgentManager, AgentStatus, Progress, Task, TaskId, TaskResult, TaskStatus,
    WorkDistributor,
};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use kw_number::KwNumber;
pub use scrape::{RegisterData, RegisterScraper, RegisterSection};
pub use session::{BrowserSession, SessionFactory};
pub use storage::{ResultSink, SaveFormat, StorageResult};
