use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::scrape::RegisterSection;
use crate::storage::SaveFormat;

/// EKW search page the scraper starts every task from.
pub const DEFAULT_BASE_URL: &str =
    "https://przegladarka-ekw.ms.gov.pl/eukw_prz/KsiegiWieczyste/wyszukiwanieKW";

/// Application configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of scraping agents in the pool (at least 1)
    pub worker_count: usize,
    /// Output formats to persist per record: pdf / html / json / csv
    pub save_formats: Vec<String>,
    /// When the regular printout is missing, also try the full printout
    pub try_fallback_content: bool,
    /// Browser kind: "chrome" or "edge"
    pub browser_kind: String,
    /// Explicit browser executable path, overrides `browser_kind`
    pub chrome_executable: Option<String>,
    /// Whether to route browser traffic through a proxy
    pub use_proxy: bool,
    /// Proxy address, e.g. "127.0.0.1:8080"
    pub proxy_value: String,
    /// Whether pages load images
    pub load_images: bool,
    /// Search page URL
    pub base_url: String,
    /// Directory saved records are written to
    pub output_dir: String,
    /// Text file with one KW number per line
    pub input_file: String,
    /// Register sections to extract: "I-O", "I-Sp", "II", "III", "IV"
    pub sections: Vec<String>,
    /// Fixed delay after each task, in milliseconds
    pub task_delay_ms: u64,
    /// Settle delay after navigation and section switches, in milliseconds
    pub settle_delay_ms: u64,
    /// Coordinator progress poll interval, in milliseconds
    pub progress_poll_ms: u64,
    /// Skip numbers whose artifacts already exist in every enabled format
    pub skip_existing: bool,
    /// Whether to show verbose logs
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: 2,
            save_formats: vec!["html".to_string(), "json".to_string()],
            try_fallback_content: false,
            browser_kind: "chrome".to_string(),
            chrome_executable: None,
            use_proxy: false,
            proxy_value: String::new(),
            load_images: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: "downloads".to_string(),
            input_file: "kw_numbers.txt".to_string(),
            sections: Vec::new(),
            task_delay_ms: 500,
            settle_delay_ms: 1000,
            progress_poll_ms: 1000,
            skip_existing: false,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults when
    /// the file does not exist, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)
                .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Builds configuration from defaults and environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_parse("KW_WORKER_COUNT") {
            self.worker_count = v;
        }
        if let Ok(v) = std::env::var("KW_SAVE_FORMATS") {
            self.save_formats = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(v) = env_parse("KW_TRY_FALLBACK_CONTENT") {
            self.try_fallback_content = v;
        }
        if let Ok(v) = std::env::var("KW_BROWSER_KIND") {
            self.browser_kind = v;
        }
        if let Ok(v) = std::env::var("KW_CHROME_EXECUTABLE") {
            self.chrome_executable = Some(v);
        }
        if let Some(v) = env_parse("KW_USE_PROXY") {
            self.use_proxy = v;
        }
        if let Ok(v) = std::env::var("KW_PROXY_VALUE") {
            self.proxy_value = v;
        }
        if let Some(v) = env_parse("KW_LOAD_IMAGES") {
            self.load_images = v;
        }
        if let Ok(v) = std::env::var("KW_BASE_URL") {
            self.base_url = v;
        }
        if let Ok(v) = std::env::var("KW_OUTPUT_DIR") {
            self.output_dir = v;
        }
        if let Ok(v) = std::env::var("KW_INPUT_FILE") {
            self.input_file = v;
        }
        if let Some(v) = env_parse("KW_TASK_DELAY_MS") {
            self.task_delay_ms = v;
        }
        if let Some(v) = env_parse("KW_SKIP_EXISTING") {
            self.skip_existing = v;
        }
        if let Some(v) = env_parse("KW_VERBOSE_LOGGING") {
            self.verbose_logging = v;
        }
    }

    /// Parsed save formats, unknown names skipped with a warning.
    pub fn formats(&self) -> Vec<SaveFormat> {
        self.save_formats
            .iter()
            .filter_map(|name| match SaveFormat::parse(name) {
                Some(f) => Some(f),
                None => {
                    tracing::warn!("Unknown save format '{}', skipping", name);
                    None
                }
            })
            .collect()
    }

    /// Parsed register sections, unknown names skipped with a warning.
    pub fn register_sections(&self) -> Vec<RegisterSection> {
        self.sections
            .iter()
            .filter_map(|name| match RegisterSection::parse(name) {
                Some(s) => Some(s),
                None => {
                    tracing::warn!("Unknown register section '{}', skipping", name);
                    None
                }
            })
            .collect()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.formats(), vec![SaveFormat::Html, SaveFormat::Json]);
        assert!(config.register_sections().is_empty());
    }

    #[test]
    fn parses_toml() {
        let raw = r#"
            worker_count = 4
            save_formats = ["pdf", "csv"]
            sections = ["I-O", "IV"]
            try_fallback_content = true
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.formats(), vec![SaveFormat::Pdf, SaveFormat::Csv]);
        assert_eq!(
            config.register_sections(),
            vec![RegisterSection::IO, RegisterSection::IV]
        );
        assert!(config.try_fallback_content);
        // untouched fields keep their defaults
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn unknown_formats_are_skipped() {
        let config = Config {
            save_formats: vec!["html".to_string(), "docx".to_string()],
            ..Config::default()
        };
        assert_eq!(config.formats(), vec![SaveFormat::Html]);
    }
}
