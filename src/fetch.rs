//! Network access with a fixed throttle and bounded retries.
//!
//! The module mirrors a decorator layout:
//! - [`Fetch`]: core trait for "GET this URL with these headers"
//! - [`HttpFetcher`]: one `reqwest` attempt, non-2xx statuses are errors
//! - [`RetryFetch`]: waits a fixed delay before every attempt and retries
//!   transient failures up to `max_retries` times
//!
//! # Retry Strategy
//!
//! - Fixed delay (4 seconds by default) before *every* attempt, including the first
//! - Maximum 5 retries, so at most 6 attempts per URL
//! - Only [`CrawlError::Http`] is retried; IO and other system errors propagate at once
//! - Exhaustion yields [`CrawlError::Connection`] wrapping the last error
//! - Each failed attempt is logged at `info`, so only verbose runs show it

use crate::error::CrawlError;
use crate::utils::truncate_for_log;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

pub const MAX_RETRIES: usize = 5;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(4);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait for fetching a URL body.
///
/// Implementors return the raw response bytes or an error. The crawler only
/// depends on this trait, so tests can substitute an in-memory site.
pub trait Fetch {
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Vec<u8>, CrawlError>;
}

/// Single-attempt HTTP GET over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CrawlError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Vec<u8>, CrawlError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET complete"
        );
        Ok(body.to_vec())
    }
}

/// Wrapper that throttles and retries any [`Fetch`] implementation.
pub struct RetryFetch<T> {
    /// The underlying fetcher.
    inner: T,
    /// Retries allowed after the first attempt.
    max_retries: usize,
    /// Pause before every attempt.
    delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: Fetch,
{
    pub fn new(inner: T, max_retries: usize, delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            delay,
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .finish()
    }
}

impl<T> Fetch for RetryFetch<T>
where
    T: Fetch,
{
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Vec<u8>, CrawlError> {
        let total_t0 = Instant::now();
        let mut failures = 0usize;

        loop {
            sleep(self.delay).await;
            match self.inner.fetch(url, headers).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if failures == self.max_retries {
                        error!(
                            attempts = failures + 1,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            kind = e.kind(),
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(CrawlError::Connection {
                            url: url.to_string(),
                            attempts: failures + 1,
                            source: Box::new(e),
                        });
                    }
                    failures += 1;
                    info!(
                        attempt = failures,
                        max = self.max_retries,
                        kind = e.kind(),
                        error = %truncate_for_log(&e.to_string(), 300),
                        "fetch attempt failed; retrying"
                    );
                }
            }
        }
    }
}

/// Build the production fetcher: `reqwest` with timeout, wrapped in retries.
///
/// # Arguments
///
/// * `delay` - Pause before every attempt, including the first
/// * `timeout` - Per-request timeout applied by the `reqwest` client
///
/// # Returns
///
/// A [`RetryFetch`] over an [`HttpFetcher`] allowing [`MAX_RETRIES`] retries.
///
/// # Errors
///
/// [`CrawlError::Http`] if the underlying client cannot be built (for example
/// when no TLS backend is available).
pub fn http_fetcher(delay: Duration, timeout: Duration) -> Result<RetryFetch<HttpFetcher>, CrawlError> {
    Ok(RetryFetch::new(HttpFetcher::new(timeout)?, MAX_RETRIES, delay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick(inner: HttpFetcher) -> RetryFetch<HttpFetcher> {
        RetryFetch::new(inner, MAX_RETRIES, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = quick(HttpFetcher::new(DEFAULT_TIMEOUT).unwrap());
        let body = fetcher
            .fetch(&format!("{}/ok", server.uri()), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn test_six_failures_raise_connection_error_without_seventh_try() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(6)
            .mount(&server)
            .await;

        let fetcher = quick(HttpFetcher::new(DEFAULT_TIMEOUT).unwrap());
        let err = fetcher
            .fetch(&format!("{}/down", server.uri()), &HeaderMap::new())
            .await
            .unwrap_err();

        match err {
            CrawlError::Connection { attempts, source, .. } => {
                assert_eq!(attempts, 6);
                assert!(matches!(*source, CrawlError::Http(_)));
            }
            other => panic!("expected connection error, got {other:?}"),
        }
        // `expect(6)` is verified when the server drops.
    }

    /// Fails a fixed number of times with the given error, then succeeds.
    struct Flaky {
        failures_left: Cell<usize>,
        calls: Cell<usize>,
        fatal: bool,
    }

    impl Fetch for Flaky {
        async fn fetch(&self, _url: &str, _headers: &HeaderMap) -> Result<Vec<u8>, CrawlError> {
            self.calls.set(self.calls.get() + 1);
            if self.fatal {
                return Err(CrawlError::Io(std::io::Error::other("disk full")));
            }
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                // Any non-2xx from a real server becomes `Http`; use a bogus
                // scheme to manufacture one without the network.
                let e = reqwest::Client::new().get("notascheme://x").send().await.unwrap_err();
                return Err(CrawlError::Http(e));
            }
            Ok(b"done".to_vec())
        }
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let fetcher = RetryFetch::new(
            Flaky {
                failures_left: Cell::new(5),
                calls: Cell::new(0),
                fatal: false,
            },
            MAX_RETRIES,
            Duration::ZERO,
        );
        let body = fetcher.fetch("http://x/", &HeaderMap::new()).await.unwrap();
        assert_eq!(body, b"done");
        assert_eq!(fetcher.inner.calls.get(), 6);
    }

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run two failing attempts and a success under a subscriber capped at `level`.
    fn retry_log_at(level: Level) -> String {
        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let fetcher = RetryFetch::new(
                    Flaky {
                        failures_left: Cell::new(2),
                        calls: Cell::new(0),
                        fatal: false,
                    },
                    MAX_RETRIES,
                    Duration::ZERO,
                );
                fetcher.fetch("http://x/", &HeaderMap::new()).await.unwrap();
            });
        });

        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_retry_lines_only_when_verbose() {
        let verbose = retry_log_at(Level::INFO);
        assert_eq!(verbose.matches("fetch attempt failed; retrying").count(), 2);

        let quiet = retry_log_at(Level::WARN);
        assert!(!quiet.contains("retrying"), "quiet output: {quiet}");
    }

    #[tokio::test]
    async fn test_system_errors_are_not_retried() {
        let fetcher = RetryFetch::new(
            Flaky {
                failures_left: Cell::new(0),
                calls: Cell::new(0),
                fatal: true,
            },
            MAX_RETRIES,
            Duration::ZERO,
        );
        let err = fetcher.fetch("http://x/", &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, CrawlError::Io(_)));
        assert_eq!(fetcher.inner.calls.get(), 1);
    }
}
