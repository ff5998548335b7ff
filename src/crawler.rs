//! The crawl driver.
//!
//! A run walks the site in fixed stages, strictly one request at a time:
//!
//! 1. **Root discovery**: read the vendor list and report configured vendors
//!    the site does not know
//! 2. **Vendors**: for each wanted vendor, read its model list
//! 3. **Models**: keep models whose year is wanted and whose link is not in the
//!    summary yet; read the model page for the best resolution and the number
//!    of pictures
//! 4. **Pictures**: visit up to the configured number of wallpaper pages,
//!    download each image not already on disk, and append one summary record
//!
//! All pages go through the [`ResponseCache`]; image bytes are fetched
//! directly. The first error stops the run; [`run_and_persist`] writes the
//! cache and the summary either way.

use crate::cache::ResponseCache;
use crate::config::{Config, normalize_name};
use crate::error::CrawlError;
use crate::fetch::Fetch;
use crate::models::{ModelLink, Resolution, SummaryRecord, VendorLink, parse_year};
use crate::scrapers::netcarshow::{
    content_url, highest_resolution, image_filename, parse_models, parse_vendors, picture_count,
    wallpaper_url,
};
use crate::summary::SummaryStore;
use std::collections::HashSet;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub vendors: usize,
    pub models: usize,
    pub records: usize,
    pub images_downloaded: usize,
    pub images_present: usize,
}

pub struct Crawler<'a, F> {
    config: &'a Config,
    fetcher: &'a F,
    cache: &'a mut ResponseCache,
    summary: &'a mut SummaryStore,
    /// Model links already processed, from the summary plus this run.
    seen: HashSet<String>,
    stats: CrawlStats,
}

impl<'a, F: Fetch> Crawler<'a, F> {
    pub fn new(
        config: &'a Config,
        fetcher: &'a F,
        cache: &'a mut ResponseCache,
        summary: &'a mut SummaryStore,
    ) -> Self {
        let seen = summary.known_links();
        Self {
            config,
            fetcher,
            cache,
            summary,
            seen,
            stats: CrawlStats::default(),
        }
    }

    /// Crawl every wanted vendor. Stops at the first error.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&mut self) -> Result<CrawlStats, CrawlError> {
        info!(cars_amount = self.seen.len(), "Known cars");

        let config = self.config;
        let vendors = self.discover_vendors().await?;
        for vendor in vendors.iter().filter(|v| config.wants_vendor(&v.name)) {
            self.crawl_vendor(vendor).await?;
        }

        info!(
            vendors = self.stats.vendors,
            models = self.stats.models,
            records = self.stats.records,
            downloaded = self.stats.images_downloaded,
            already_present = self.stats.images_present,
            "Crawl finished"
        );
        Ok(self.stats.clone())
    }

    async fn page(&mut self, url: &str) -> Result<String, CrawlError> {
        self.cache.get(self.fetcher, url, &self.config.headers.html).await
    }

    async fn discover_vendors(&mut self) -> Result<Vec<VendorLink>, CrawlError> {
        let root = self.config.base_url.clone();
        let html = self.page(&root).await?;
        let vendors = parse_vendors(&html, &self.config.base_url);
        debug!(count = vendors.len(), "Vendors listed on site");

        let missing = missing_vendors(self.config, &vendors);
        if !missing.is_empty() {
            warn!(vendors = ?missing, "Failed to match vendors");
        }
        Ok(vendors)
    }

    #[instrument(level = "info", skip_all, fields(vendor = %vendor.name))]
    async fn crawl_vendor(&mut self, vendor: &VendorLink) -> Result<(), CrawlError> {
        info!(link = %vendor.link, "Crawling vendor");
        self.stats.vendors += 1;

        let html = self.page(&vendor.link).await?;
        let models = parse_models(&html, &self.config.base_url);
        debug!(count = models.len(), "Models listed");

        for model in &models {
            self.crawl_model(vendor, model).await?;
        }
        Ok(())
    }

    async fn crawl_model(&mut self, vendor: &VendorLink, model: &ModelLink) -> Result<(), CrawlError> {
        let year = parse_year(&model.year_text);
        if !self.config.wants_year(year) {
            return Ok(());
        }
        if !self.seen.insert(model.link.clone()) {
            debug!(link = %model.link, "Already processed");
            return Ok(());
        }

        info!(car = %model.name, link = %model.link, "Crawling model");
        self.stats.models += 1;

        let html = self.page(&model.link).await?;
        let available = picture_count(&html);
        let amount = available.min(usize::from(self.config.pics_amount));
        let Some(resolution) = highest_resolution(&html) else {
            warn!(link = %model.link, available, "No resolution offered; skipping pictures");
            return Ok(());
        };
        debug!(%resolution, available, amount, "Model page parsed");

        let mut record = SummaryRecord::new(&vendor.name, year, &model.name, &model.link);
        // `amount` is bounded by `pics_amount`, a u8.
        for index in 1..=amount as u8 {
            self.fetch_picture(&mut record, resolution, index).await?;
        }

        if record.has_images() {
            self.summary.append(record);
            self.stats.records += 1;
        } else {
            warn!(link = %model.link, "No pictures found for model");
        }
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(index = index))]
    async fn fetch_picture(
        &mut self,
        record: &mut SummaryRecord,
        resolution: Resolution,
        index: u8,
    ) -> Result<(), CrawlError> {
        let page_url = wallpaper_url(&record.car_link, resolution, index);
        let html = self.page(&page_url).await?;

        let Some(image_url) = content_url(&html) else {
            debug!(%page_url, "No image on wallpaper page");
            return Ok(());
        };
        let Some(filename) = image_filename(&image_url) else {
            debug!(%image_url, "Image URL has no filename");
            return Ok(());
        };

        let path = self.config.pics_dir.join(&filename);
        if fs::try_exists(&path).await? {
            debug!(%filename, "Already on disk");
            self.stats.images_present += 1;
        } else {
            let headers = self.config.headers.pics_with_referer(&record.car_link)?;
            let bytes = self.fetcher.fetch(&image_url, &headers).await?;
            fs::write(&path, &bytes).await?;
            info!(%filename, bytes = bytes.len(), "Saved picture");
            self.stats.images_downloaded += 1;
        }

        record.images.insert(index, filename);
        record.image_link = Some(image_url);
        Ok(())
    }
}

/// Run one crawl, then write the cache and the summary back to disk.
///
/// Both files are persisted whether or not the crawl succeeded, so a failed
/// run can be resumed the same day from the pages fetched so far.
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `fetcher` - Network access, normally [`crate::fetch::http_fetcher`]
/// * `cache` - Today's response cache, written to its file afterwards
/// * `summary` - The summary store, written to its CSV afterwards
///
/// # Returns
///
/// The run's [`CrawlStats`].
///
/// # Errors
///
/// The crawl error if the crawl failed, otherwise the first persistence
/// error. Every failure is logged before it is returned.
pub async fn run_and_persist<F: Fetch>(
    config: &Config,
    fetcher: &F,
    cache: &mut ResponseCache,
    summary: &mut SummaryStore,
) -> Result<CrawlStats, CrawlError> {
    let outcome = Crawler::new(config, fetcher, cache, summary).run().await;

    let cache_saved = cache.persist();
    let summary_saved = summary.persist();

    if let Err(e) = &outcome {
        error!(kind = e.kind(), error = %e, "Crawl aborted");
    }
    if let Err(e) = &cache_saved {
        error!(error = %e, "Failed to write cache");
    }
    if let Err(e) = &summary_saved {
        error!(error = %e, "Failed to write summary");
    }

    let stats = outcome?;
    cache_saved?;
    summary_saved?;
    Ok(stats)
}

/// Configured vendors the site does not list (case and space insensitive).
pub fn missing_vendors(config: &Config, found: &[VendorLink]) -> Vec<String> {
    let found: HashSet<String> = found
        .iter()
        .map(|v| normalize_name(&v.name))
        .collect();
    config
        .vendors
        .iter()
        .zip(config.normalized_vendors())
        .filter(|(_, normalized)| !found.contains(normalized))
        .map(|(original, _)| original.clone())
        .collect()
}
