//! Error types shared by the fetcher, the cache, the summary store and the crawler.
//!
//! Only [`CrawlError::Http`] is considered transient. Everything else is a
//! system or configuration failure and propagates straight to `main`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// Transport failure or non-success HTTP status for a single attempt.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The retry budget for a URL was spent.
    #[error("connection failed for {url} after {attempts} attempts: {source}")]
    Connection {
        url: String,
        attempts: usize,
        #[source]
        source: Box<CrawlError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cache codec error: {0}")]
    CacheCodec(#[from] bincode::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CrawlError {
    /// Short name of the error kind, printed alongside each retry.
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlError::Http(e) if e.is_timeout() => "Timeout",
            CrawlError::Http(e) if e.is_status() => "HTTPError",
            CrawlError::Http(e) if e.is_connect() => "ConnectError",
            CrawlError::Http(_) => "RequestError",
            CrawlError::Connection { .. } => "ConnectionError",
            CrawlError::Io(_) => "IoError",
            CrawlError::Csv(_) => "CsvError",
            CrawlError::CacheCodec(_) => "CacheCodecError",
            CrawlError::Url(_) => "UrlError",
            CrawlError::Config(_) => "ConfigError",
        }
    }

    /// Whether another attempt at the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CrawlError::Http(_))
    }
}

impl From<serde_yaml::Error> for CrawlError {
    fn from(e: serde_yaml::Error) -> Self {
        CrawlError::Config(e.to_string())
    }
}
