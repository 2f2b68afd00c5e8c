//! Logging setup and progress banners.
//!
//! One tracing subscriber for the whole process, installed once at startup;
//! components receive no logger handles and simply emit `tracing` events.

use std::sync::Once;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::agent::Progress;
use crate::config::Config;

static INIT: Once = Once::new();

/// Installs the global tracing subscriber. Safe to call more than once.
/// `RUST_LOG` overrides the default level; `verbose` raises the default
/// from `info` to `debug`.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    });
}

fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Logs the startup banner.
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 KW scraper starting - agent pool mode");
    info!("📊 Agents: {}", config.worker_count.max(1));
    info!("💾 Formats: {}", config.save_formats.join(", "));
    info!("📁 Output: {}", config.output_dir);
    info!("{}", "=".repeat(60));
}

/// Logs how many KW numbers were loaded for processing.
pub fn log_batch_loaded(total: usize, agents: usize) {
    info!("✓ Loaded {} KW numbers", total);
    info!("📋 Distributing across {} agents", agents);
}

/// Logs one aggregated progress line.
pub fn log_progress(progress: &Progress) {
    let rate = progress
        .success_rate
        .map(|r| format!("{:.2}%", r * 100.0))
        .unwrap_or_else(|| "N/A".to_string());
    info!(
        "⏳ {}/{} done ({} failed, {} in progress, success rate {})",
        progress.completed + progress.failed,
        progress.total,
        progress.failed,
        progress.in_progress,
        rate,
    );
}

/// Prints the final statistics block.
pub fn print_final_stats(progress: &Progress) {
    info!("{}", "=".repeat(60));
    info!("📊 Batch complete");
    info!(
        "Finished at: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ Succeeded: {}/{}", progress.completed, progress.total);
    info!("❌ Failed: {}", progress.failed);
    for (id, status) in &progress.agents {
        let rate = status
            .success_rate
            .map(|r| format!("{:.2}%", r * 100.0))
            .unwrap_or_else(|| "N/A".to_string());
        info!(
            "  {} - completed {}, failed {}, success rate {}",
            id, status.completed, status.failed, rate
        );
    }
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_flag_raises_default_level() {
        assert_eq!(default_level(false), "info");
        assert_eq!(default_level(true), "debug");
    }
}
