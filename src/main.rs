use anyhow::{Context, Result};
use kw_scraper::{logger, Config, WorkDistributor};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load("config.toml")?;
    logger::init(config.verbose_logging);
    logger::log_startup(&config);

    // One KW number per line; blank lines and '#' comments skipped
    let raw = std::fs::read_to_string(&config.input_file)
        .with_context(|| format!("reading KW number list {}", config.input_file))?;
    let kw_numbers: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if kw_numbers.is_empty() {
        tracing::warn!("⚠️ No KW numbers found in {}, nothing to do", config.input_file);
        return Ok(());
    }
    logger::log_batch_loaded(kw_numbers.len(), config.worker_count.max(1));

    let distributor = WorkDistributor::new(config).await?;
    distributor.start_processing(kw_numbers).await;

    let progress = distributor.wait_until_drained().await;
    distributor.stop_processing().await;

    logger::print_final_stats(&progress);
    Ok(())
}
