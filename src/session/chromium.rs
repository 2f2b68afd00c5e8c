//! Headless Chromium session on top of `chromiumoxide`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::{BrowserSession, Element, SessionFactory};
use crate::config::Config;
use crate::error::{AppError, AppResult};

/// How often and how long `find` retries before giving up.
const FIND_RETRY_INTERVAL: Duration = Duration::from_millis(200);
const FIND_RETRIES: usize = 25;

/// A headless browser owned by one agent.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumSession {
    /// Launches a headless browser configured per `config`.
    pub async fn launch(config: &Config) -> AppResult<Self> {
        info!("🚀 Launching headless browser...");

        let mut args = vec![
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
        ];
        if config.use_proxy && !config.proxy_value.is_empty() {
            args.push(format!("--proxy-server={}", config.proxy_value));
        }
        if !config.load_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }

        let mut builder = BrowserConfig::builder().new_headless_mode().args(args);
        if let Some(exe) = resolve_executable(config)? {
            builder = builder.chrome_executable(Path::new(&exe));
        }
        let browser_config = builder.build().map_err(|e| {
            error!("Failed to configure headless browser: {}", e);
            AppError::Automation(e)
        })?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            error!("Failed to launch headless browser: {}", e);
            AppError::Automation(e.to_string())
        })?;
        debug!("Headless browser launched");

        // Drain CDP events in the background
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // Short delay to let the browser state settle
        sleep(Duration::from_millis(300)).await;

        let page = browser.new_page("about:blank").await?;
        info!("✅ Headless browser ready");

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    async fn locate(&self, selector: &str) -> AppResult<chromiumoxide::element::Element> {
        // The EKW pages render after navigation, so finds retry briefly
        // instead of failing on the first miss.
        let mut last_err = None;
        for _ in 0..FIND_RETRIES {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) => last_err = Some(e),
            }
            sleep(FIND_RETRY_INTERVAL).await;
        }
        Err(AppError::Automation(format!(
            "element '{}' not found: {}",
            selector,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        debug!("Navigating to {}", url);
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn find(&self, selector: &str) -> AppResult<Element> {
        let element = self.locate(selector).await?;
        let text = element.inner_text().await?.unwrap_or_default();
        Ok(Element { text })
    }

    async fn find_all(&self, selector: &str) -> AppResult<Vec<Element>> {
        let elements = self.page.find_elements(selector).await?;
        let mut snapshots = Vec::with_capacity(elements.len());
        for element in elements {
            let text = element.inner_text().await?.unwrap_or_default();
            snapshots.push(Element { text });
        }
        Ok(snapshots)
    }

    async fn fill(&self, selector: &str, value: &str) -> AppResult<()> {
        let element = self.locate(selector).await?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> AppResult<()> {
        let element = self.locate(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn page_content(&self) -> AppResult<String> {
        Ok(self.page.content().await?)
    }

    async fn print_pdf(&self) -> AppResult<Vec<u8>> {
        Ok(self.page.pdf(PrintToPdfParams::default()).await?)
    }

    async fn screenshot(&self, path: &Path) -> AppResult<()> {
        self.page
            .save_screenshot(ScreenshotParams::builder().build(), path)
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> AppResult<()> {
        debug!("Closing browser session");
        if let Err(e) = self.browser.close().await {
            error!("Failed to close browser cleanly: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

/// Picks the browser executable for the configured kind. An explicit
/// `chrome_executable` always wins; "chrome"/"chromium" fall back to
/// auto-detection, "edge" is driven over the same protocol through its
/// binary on `PATH`. Firefox speaks a different protocol and is rejected.
fn resolve_executable(config: &Config) -> AppResult<Option<String>> {
    if let Some(exe) = &config.chrome_executable {
        return Ok(Some(exe.clone()));
    }
    match config.browser_kind.trim().to_lowercase().as_str() {
        "chrome" | "chromium" => Ok(None),
        "edge" => Ok(Some("microsoft-edge".to_string())),
        other => Err(AppError::Config(format!(
            "unsupported browser_kind '{}', expected chrome, chromium or edge",
            other
        ))),
    }
}

/// Factory producing headless Chromium sessions from the shared config.
pub struct ChromiumFactory {
    config: Config,
}

impl ChromiumFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for ChromiumFactory {
    async fn create(&self) -> AppResult<Box<dyn BrowserSession>> {
        let session = ChromiumSession::launch(&self.config).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_executable_wins_over_kind() {
        let config = Config {
            browser_kind: "edge".to_string(),
            chrome_executable: Some("/opt/chrome/chrome".to_string()),
            ..Config::default()
        };
        assert_eq!(
            resolve_executable(&config).unwrap(),
            Some("/opt/chrome/chrome".to_string())
        );
    }

    #[test]
    fn chrome_kind_uses_autodetection() {
        let config = Config::default();
        assert_eq!(resolve_executable(&config).unwrap(), None);
    }

    #[test]
    fn edge_kind_selects_edge_binary() {
        let config = Config {
            browser_kind: "Edge".to_string(),
            ..Config::default()
        };
        assert_eq!(
            resolve_executable(&config).unwrap(),
            Some("microsoft-edge".to_string())
        );
    }

    #[test]
    fn unsupported_kind_is_a_config_error() {
        let config = Config {
            browser_kind: "firefox".to_string(),
            ..Config::default()
        };
        let err = resolve_executable(&config).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
