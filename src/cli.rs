//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also come from an environment variable, and the crawl
//! selection (vendors, years, picture limit, verbosity) can additionally be
//! read from a YAML file given with `--config`. Explicit flags win over the
//! file, the file wins over built-in defaults.

use crate::config::{
    Config, DEFAULT_BASE_URL, DEFAULT_PICS_AMOUNT, DEFAULT_VENDORS, DEFAULT_YEARS, FileConfig,
    HeaderProfiles, check_pics_amount, parse_vendors, parse_years,
};
use crate::error::CrawlError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Defaults: every built-in vendor, 2015-2019, five pictures per model
/// netcarshow_pics
///
/// # Two vendors, two model years, three pictures each, quiet output
/// netcarshow_pics --vendors "AUDI,LAND ROVER" --years 2018,2019 --pics-amount 3 --quiet
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Comma separated vendor names, matched case-insensitively
    #[arg(long, env = "NCS_VENDORS")]
    pub vendors: Option<String>,

    /// Model years: a list and/or inclusive ranges, e.g. "2015-2017,2019"
    #[arg(short, long, env = "NCS_YEARS")]
    pub years: Option<String>,

    /// Pictures to download per model (1-99)
    #[arg(short, long, env = "NCS_PICS_AMOUNT", value_parser = clap::value_parser!(u8).range(1..=99))]
    pub pics_amount: Option<u8>,

    /// Only report warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Optional path to a YAML file with vendors, years, pics_amount and verbose
    #[arg(short, long, env = "NCS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Site root
    #[arg(long, env = "NCS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Response cache file
    #[arg(long, env = "NCS_CACHE_FILE", default_value = "cache.bin")]
    pub cache_file: PathBuf,

    /// Summary CSV file
    #[arg(long, env = "NCS_SUMMARY_FILE", default_value = "summary.csv")]
    pub summary_file: PathBuf,

    /// Directory receiving the pictures
    #[arg(long, env = "NCS_PICS_DIR", default_value = "pics")]
    pub pics_dir: PathBuf,

    /// Seconds to wait before every request
    #[arg(long, env = "NCS_DELAY_SECS", default_value_t = 4)]
    pub delay_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "NCS_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl Cli {
    /// Fold flags, the optional YAML file and defaults into one [`Config`].
    pub fn into_config(self) -> Result<Config, CrawlError> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let vendors = match (self.vendors.as_deref(), file.vendors) {
            (Some(flag), _) => parse_vendors(flag),
            (None, Some(list)) => list,
            (None, None) => DEFAULT_VENDORS.iter().map(|v| v.to_string()).collect(),
        };
        if vendors.is_empty() {
            return Err(CrawlError::Config("no vendors selected".into()));
        }

        let years_spec = self
            .years
            .or(file.years)
            .unwrap_or_else(|| DEFAULT_YEARS.to_string());
        let years = parse_years(&years_spec)?;

        let pics_amount = check_pics_amount(
            self.pics_amount
                .or(file.pics_amount)
                .unwrap_or(DEFAULT_PICS_AMOUNT),
        )?;

        let verbose = if self.quiet {
            false
        } else {
            file.verbose.unwrap_or(true)
        };

        let base_url = if self.base_url.ends_with('/') {
            self.base_url
        } else {
            format!("{}/", self.base_url)
        };
        url::Url::parse(&base_url)?;

        Ok(Config {
            vendors,
            years,
            pics_amount,
            verbose,
            base_url,
            cache_file: self.cache_file,
            summary_file: self.summary_file,
            pics_dir: self.pics_dir,
            delay: Duration::from_secs(self.delay_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            headers: HeaderProfiles::new(),
        })
    }
}
