//! Browser-automation boundary.
//!
//! The scraping core depends only on the [`BrowserSession`] capability set,
//! never on a concrete browser engine. Sessions are produced by a
//! [`SessionFactory`] so agents can open theirs lazily, on the first task,
//! and tests can substitute a scripted session.

pub mod chromium;

use std::path::Path;

use async_trait::async_trait;

pub use chromium::{ChromiumFactory, ChromiumSession};

use crate::error::AppResult;

/// Snapshot of a located page element.
#[derive(Debug, Clone)]
pub struct Element {
    /// Visible text content
    pub text: String,
}

/// One live browser session, exclusively owned by one agent.
///
/// `Send + Sync` because the agent loop holds a shared reference to the
/// session across awaits inside a spawned task.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Loads a page.
    async fn navigate(&self, url: &str) -> AppResult<()>;

    /// Finds one element by CSS selector; a missing element after the
    /// bounded wait is an error, never a hang.
    async fn find(&self, selector: &str) -> AppResult<Element>;

    /// Finds all elements matching a CSS selector.
    async fn find_all(&self, selector: &str) -> AppResult<Vec<Element>>;

    /// Types a value into an input element.
    async fn fill(&self, selector: &str, value: &str) -> AppResult<()>;

    /// Clicks an element.
    async fn click(&self, selector: &str) -> AppResult<()>;

    /// Full HTML source of the current page.
    async fn page_content(&self) -> AppResult<String>;

    /// Renders the current page to PDF.
    async fn print_pdf(&self) -> AppResult<Vec<u8>>;

    /// Stores a screenshot of the current page.
    async fn screenshot(&self, path: &Path) -> AppResult<()>;

    /// Releases the session.
    async fn close(&mut self) -> AppResult<()>;
}

/// Creates browser sessions on demand.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> AppResult<Box<dyn BrowserSession>>;
}
