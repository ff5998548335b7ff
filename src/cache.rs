//! Day-bucketed response cache.
//!
//! Response bodies are stored per URL under a `YYYYMMDD` bucket. Only the
//! bucket for the current day is consulted; when the file on disk does not
//! contain today's bucket, everything is discarded and an empty bucket for
//! today is written immediately. Re-running on the same day therefore replays
//! already fetched pages from disk, while the first run of a new day fetches
//! everything again.
//!
//! # On-disk format
//!
//! `bincode` encoding of `HashMap<String, HashMap<String, String>>`
//! (day → URL → body). Writes are whole-file overwrites.

use crate::error::CrawlError;
use crate::fetch::Fetch;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

type Buckets = HashMap<String, HashMap<String, String>>;

#[derive(Debug)]
pub struct ResponseCache {
    path: PathBuf,
    today: String,
    buckets: Buckets,
}

impl ResponseCache {
    /// Load the cache file, resetting it when today's bucket is missing.
    ///
    /// A missing or undecodable file counts as empty. When the file holds no
    /// bucket for `today`, every older bucket is dropped and the reset cache is
    /// written back at once.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the bincode cache file
    /// * `today` - Day stamp of the run, as produced by `today_stamp`
    ///
    /// # Errors
    ///
    /// IO errors from reading the file or persisting the reset bucket.
    #[instrument(level = "info", skip_all, fields(path = %path.display(), %today))]
    pub fn load(path: &Path, today: &str) -> Result<Self, CrawlError> {
        let buckets: Buckets = if path.exists() {
            let data = fs::read(path)?;
            match bincode::deserialize(&data) {
                Ok(buckets) => buckets,
                Err(e) => {
                    warn!(error = %e, "Cache file unreadable; starting empty");
                    Buckets::new()
                }
            }
        } else {
            Buckets::new()
        };

        let mut cache = Self {
            path: path.to_path_buf(),
            today: today.to_string(),
            buckets,
        };

        if cache.buckets.contains_key(today) {
            info!(entries = cache.len(), "Resuming today's cache bucket");
        } else {
            info!(
                stale_buckets = cache.buckets.len(),
                "No bucket for today; discarding old cache"
            );
            cache.buckets = Buckets::from([(today.to_string(), HashMap::new())]);
            cache.persist()?;
        }
        Ok(cache)
    }

    /// Return the body for `url`, fetching and storing it on a miss.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get<F: Fetch>(
        &mut self,
        fetcher: &F,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<String, CrawlError> {
        if let Some(body) = self.lookup(url) {
            debug!("cache hit");
            return Ok(body.clone());
        }

        debug!("cache miss");
        let bytes = fetcher.fetch(url, headers).await?;
        let body = String::from_utf8_lossy(&bytes).into_owned();
        self.bucket_mut().insert(url.to_string(), body.clone());
        Ok(body)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lookup(url).is_some()
    }

    /// Number of entries in today's bucket.
    pub fn len(&self) -> usize {
        self.buckets.get(&self.today).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write all buckets back to disk.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub fn persist(&self) -> Result<(), CrawlError> {
        let data = bincode::serialize(&self.buckets)?;
        fs::write(&self.path, data)?;
        debug!(entries = self.len(), "Cache written");
        Ok(())
    }

    fn lookup(&self, url: &str) -> Option<&String> {
        self.buckets.get(&self.today)?.get(url)
    }

    fn bucket_mut(&mut self) -> &mut HashMap<String, String> {
        self.buckets.entry(self.today.clone()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Serves a fixed body and records every URL requested.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl Fetch for Recorder {
        async fn fetch(&self, url: &str, _headers: &HeaderMap) -> Result<Vec<u8>, CrawlError> {
            self.calls.borrow_mut().push(url.to_string());
            Ok(format!("body of {url}").into_bytes())
        }
    }

    fn read_raw(path: &Path) -> Buckets {
        bincode::deserialize(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_new_day_creates_and_persists_empty_bucket() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.bin");

        let cache = ResponseCache::load(&path, "20240101").unwrap();
        assert!(cache.is_empty());

        let raw = read_raw(&path);
        assert_eq!(raw.len(), 1);
        assert!(raw["20240101"].is_empty());
    }

    #[test]
    fn test_stale_buckets_are_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.bin");
        let old: Buckets = Buckets::from([(
            "20231231".to_string(),
            HashMap::from([("https://x/".to_string(), "old".to_string())]),
        )]);
        fs::write(&path, bincode::serialize(&old).unwrap()).unwrap();

        let cache = ResponseCache::load(&path, "20240101").unwrap();
        assert!(!cache.contains("https://x/"));

        let raw = read_raw(&path);
        assert!(!raw.contains_key("20231231"));
        assert!(raw["20240101"].is_empty());
    }

    #[test]
    fn test_corrupt_file_is_reset() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.bin");
        fs::write(&path, b"\xff\xff\xff not bincode").unwrap();

        let cache = ResponseCache::load(&path, "20240101").unwrap();
        assert!(cache.is_empty());
        assert!(read_raw(&path).contains_key("20240101"));
    }

    #[tokio::test]
    async fn test_hit_does_not_touch_network() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.bin");
        let fetcher = Recorder::default();
        let headers = HeaderMap::new();

        let mut cache = ResponseCache::load(&path, "20240101").unwrap();
        let first = cache.get(&fetcher, "https://x/a", &headers).await.unwrap();
        let second = cache.get(&fetcher, "https://x/a", &headers).await.unwrap();

        assert_eq!(first, "body of https://x/a");
        assert_eq!(first, second);
        assert_eq!(fetcher.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_same_day_reload_resumes_bucket() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.bin");
        let fetcher = Recorder::default();
        let headers = HeaderMap::new();

        let mut cache = ResponseCache::load(&path, "20240101").unwrap();
        cache.get(&fetcher, "https://x/a", &headers).await.unwrap();
        cache.persist().unwrap();

        let mut reloaded = ResponseCache::load(&path, "20240101").unwrap();
        assert_eq!(reloaded.len(), 1);
        reloaded.get(&fetcher, "https://x/a", &headers).await.unwrap();
        assert_eq!(fetcher.calls.borrow().len(), 1);

        let next_day = ResponseCache::load(&path, "20240102").unwrap();
        assert!(next_day.is_empty());
    }
}
