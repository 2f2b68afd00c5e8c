//! The fixed EKW search-and-extract flow.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{RegisterData, RegisterSection};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::kw_number::KwNumber;
use crate::session::BrowserSession;
use crate::storage::{artifact_filename, ResultSink, SaveFormat};

/// Header fields of the register page, in display order. Rows beyond these
/// are owner entries.
const BASIC_INFO_KEYS: [&str; 7] = [
    "Numer",
    "Typ",
    "Oznaczenie",
    "Zapis",
    "Zamknięcie",
    "Położenie",
    "Właściciel",
];

/// Drives one browser session through the retrieval protocol for one record.
pub struct RegisterScraper<'a> {
    session: &'a dyn BrowserSession,
    config: &'a Config,
}

impl<'a> RegisterScraper<'a> {
    pub fn new(session: &'a dyn BrowserSession, config: &'a Config) -> Self {
        Self { session, config }
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.config.settle_delay_ms)
    }

    /// Fetches one register: load the search page, submit the form, probe
    /// availability, extract the header and the configured sections.
    pub async fn scrape(&self, kw: &KwNumber) -> AppResult<RegisterData> {
        self.session.navigate(&self.config.base_url).await?;
        sleep(self.settle_delay()).await;

        self.fill_search_form(kw).await?;

        if !self.content_available().await {
            return Err(AppError::ContentUnavailable);
        }

        self.extract(kw).await
    }

    /// Persists an extracted record in every enabled format. A failed format
    /// is logged and skipped; the other formats still get written.
    pub async fn persist(
        &self,
        data: &RegisterData,
        sink: &dyn ResultSink,
        formats: &[SaveFormat],
    ) -> AppResult<Vec<PathBuf>> {
        let filename = artifact_filename(&data.kw_number);
        let mut files = Vec::new();

        for format in formats {
            let content = match self.render(data, *format).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Could not produce {} content for {}: {}", format, data.kw_number, e);
                    continue;
                }
            };
            let result = sink.save(*format, &content, &filename);
            if result.success {
                if let Some(path) = result.path {
                    files.push(path);
                }
            } else {
                warn!(
                    "{}",
                    AppError::Storage {
                        format: *format,
                        message: result.message,
                    }
                );
            }
        }

        Ok(files)
    }

    async fn render(&self, data: &RegisterData, format: SaveFormat) -> AppResult<Vec<u8>> {
        match format {
            SaveFormat::Pdf => self.session.print_pdf().await,
            SaveFormat::Html => Ok(self.session.page_content().await?.into_bytes()),
            SaveFormat::Json => Ok(serde_json::to_vec_pretty(data)?),
            SaveFormat::Csv => Ok(data.to_csv().into_bytes()),
        }
    }

    async fn fill_search_form(&self, kw: &KwNumber) -> AppResult<()> {
        debug!("Filling search form for {}", kw);
        self.session.fill("#kodWydzialuInput", &kw.court).await?;
        self.session
            .fill("#numerKsiegiWieczystej", &kw.number)
            .await?;
        self.session
            .fill("#cyfraKontrolna", &kw.control.to_string())
            .await?;
        self.session.click("#wyszukaj").await?;
        Ok(())
    }

    /// Probes whether the register's content can be opened: the regular
    /// printout button first, the full printout only under the fallback flag.
    async fn content_available(&self) -> bool {
        if self
            .session
            .find("input[name='przyciskWydrukZwykly']")
            .await
            .is_ok()
        {
            return true;
        }
        if self.config.try_fallback_content {
            return self
                .session
                .find("input[name='przyciskWydrukZupelny']")
                .await
                .is_ok();
        }
        false
    }

    async fn extract(&self, kw: &KwNumber) -> AppResult<RegisterData> {
        let mut data = RegisterData {
            kw_number: kw.to_string(),
            ..Default::default()
        };

        // Header rows come as label-less divs in a fixed order; anything past
        // the known keys is another owner row.
        let cells = self.session.find_all("div.left").await?;
        for (i, cell) in cells.iter().enumerate() {
            let text = cell.text.trim().to_string();
            match BASIC_INFO_KEYS.get(i) {
                Some(key) => {
                    data.basic_info.insert((*key).to_string(), text);
                }
                None => data.owners.push(text),
            }
        }

        for section in self.config.register_sections() {
            match self.extract_section(section).await {
                Ok(rows) => {
                    data.sections.insert(section.label().to_string(), rows);
                }
                Err(e) => {
                    warn!("Section {} of {} not extracted: {}", section.label(), kw, e);
                }
            }
        }

        info!("📄 Extracted register {}", kw);
        Ok(data)
    }

    async fn extract_section(&self, section: RegisterSection) -> AppResult<Vec<String>> {
        self.session
            .click(&format!("input[value='{}']", section.label()))
            .await?;
        sleep(self.settle_delay()).await;

        let cells = self.session.find_all("td").await?;
        Ok(cells
            .into_iter()
            .map(|c| c.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }
}
