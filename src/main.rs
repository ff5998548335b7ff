//! # NetCarShow Pics
//!
//! A once-a-day batch job that walks a car catalog site, picks the models of
//! the configured vendors and years, and downloads a bounded number of
//! wallpapers per model.
//!
//! ## Usage
//!
//! ```sh
//! netcarshow_pics --vendors "AUDI,BMW" --years 2018-2019 --pics-amount 5
//! ```
//!
//! ## Architecture
//!
//! The run is a single sequential pipeline:
//! 1. **Load**: today's response cache bucket and the summary CSV (rebuilt from
//!    the pictures folder on first use)
//! 2. **Crawl**: root page → vendor pages → model pages → wallpaper pages,
//!    every page through the cache, every request throttled and retried
//! 3. **Persist**: cache and summary are written back whether or not the crawl
//!    succeeded, so a failed run can be resumed the same day

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cache;
mod cli;
mod config;
mod crawler;
mod error;
mod fetch;
mod models;
mod scrapers;
mod summary;
mod utils;

use cache::ResponseCache;
use cli::Cli;
use crawler::run_and_persist;
use fetch::http_fetcher;
use summary::SummaryStore;
use utils::{ensure_writable_dir, today_stamp};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let config = args.into_config()?;

    // --- Tracing init ---
    let default_level = if config.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("netcarshow_pics starting up");
    debug!(
        vendors = config.vendors.len(),
        years = ?config.years,
        pics_amount = config.pics_amount,
        "Configuration"
    );

    if let Err(e) = ensure_writable_dir(&config.pics_dir).await {
        error!(
            path = %config.pics_dir.display(),
            error = %e,
            "Pictures directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let fetcher = http_fetcher(config.delay, config.timeout)?;
    let mut cache = ResponseCache::load(&config.cache_file, &today_stamp())?;
    let mut summary = SummaryStore::load(
        &config.summary_file,
        config.pics_amount,
        &config.pics_dir,
        &config.base_url,
    )?;

    let stats = run_and_persist(&config, &fetcher, &mut cache, &mut summary).await?;

    info!(
        elapsed = ?start_time.elapsed(),
        models = stats.models,
        records = stats.records,
        downloaded = stats.images_downloaded,
        rows = summary.len(),
        "Execution complete"
    );
    Ok(())
}
