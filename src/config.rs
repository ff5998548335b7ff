//! Immutable run configuration.
//!
//! [`Config`] is assembled once in `main` from the CLI, an optional YAML file
//! and built-in defaults, and is only read afterwards. Request header profiles
//! live here too: the `template` headers are merged into the `html` and `pics`
//! profiles at construction time, and the download `referer` is added to a
//! per-call copy by [`HeaderProfiles::pics_with_referer`].

use crate::error::CrawlError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Vendors crawled when nothing else is configured.
pub const DEFAULT_VENDORS: &[&str] = &[
    "ABARTH", "ALFA ROMEO", "ALPINE", "ASTON MARTIN", "AUDI", "BENTLEY", "BMW", "ALPINA",
    "CATERHAM", "CITROEN", "DACIA", "DS", "FERRARI", "FIAT", "FORD", "HONDA", "HYUNDAI",
    "INFINITI", "JAGUAR", "JEEP", "KIA", "LAMBORGHINI", "LAND ROVER", "LEVC", "LEXUS",
    "LOTUS", "MASERATI", "MAZDA", "MCLAREN", "MERCEDES-BENZ", "MG", "MICROCAR", "MINI",
    "MITSUBISHI", "MORGAN", "NISSAN", "PEUGEOT", "PORSCHE", "RENAULT", "ROLLS-ROYCE", "SEAT",
    "SKODA", "SMART", "SSANGYONG", "SUBARU", "SUZUKI", "TESLA", "TOYOTA", "VAUXHALL",
    "VOLKSWAGEN", "VOLVO",
];

pub const DEFAULT_YEARS: &str = "2015-2019";
pub const DEFAULT_PICS_AMOUNT: u8 = 5;
pub const MAX_PICS_AMOUNT: u8 = 99;
pub const DEFAULT_BASE_URL: &str = "https://www.netcarshow.com/";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/75.0.3770.100 Safari/537.36";

/// Every parameter of a crawl run.
#[derive(Debug, Clone)]
pub struct Config {
    pub vendors: Vec<String>,
    pub years: BTreeSet<i32>,
    pub pics_amount: u8,
    pub verbose: bool,
    pub base_url: String,
    pub cache_file: PathBuf,
    pub summary_file: PathBuf,
    pub pics_dir: PathBuf,
    pub delay: Duration,
    pub timeout: Duration,
    pub headers: HeaderProfiles,
}

impl Config {
    /// Vendor names normalized for comparison with names scraped from the site.
    pub fn normalized_vendors(&self) -> Vec<String> {
        self.vendors.iter().map(|v| normalize_name(v)).collect()
    }

    pub fn wants_vendor(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.vendors.iter().any(|v| normalize_name(v) == name)
    }

    pub fn wants_year(&self, year: Option<i32>) -> bool {
        year.is_some_and(|y| self.years.contains(&y))
    }
}

/// Optional YAML overrides, e.g.
///
/// ```yaml
/// vendors: [AUDI, BMW]
/// years: "2018-2019"
/// pics_amount: 3
/// verbose: false
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub vendors: Option<Vec<String>>,
    pub years: Option<String>,
    pub pics_amount: Option<u8>,
    pub verbose: Option<bool>,
}

impl FileConfig {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, CrawlError> {
        let text = std::fs::read_to_string(path)?;
        let parsed: FileConfig = serde_yaml::from_str(&text)?;
        debug!(?parsed, "Loaded config file");
        Ok(parsed)
    }
}

/// Request header sets, each already merged with the common template.
#[derive(Debug, Clone)]
pub struct HeaderProfiles {
    pub html: HeaderMap,
    pub pics: HeaderMap,
}

impl HeaderProfiles {
    pub fn new() -> Self {
        let template = header_map(&[
            ("accept-encoding", "gzip, deflate, br"),
            ("accept-language", "en-US;q=0.8,en;q=0.7"),
            ("cache-control", "no-cache"),
            ("pragma", "no-cache"),
            ("user-agent", USER_AGENT),
        ]);
        let mut html = header_map(&[
            ("upgrade-insecure-requests", "1"),
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,\
                 image/apng,*/*;q=0.8,application/signed-exchange;v=b3",
            ),
        ]);
        let mut pics = header_map(&[("accept", "image/webp,image/apng,image/*,*/*;q=0.8")]);

        html.extend(template.clone());
        pics.extend(template);

        Self { html, pics }
    }

    /// The `pics` profile with `referer` set for one download.
    pub fn pics_with_referer(&self, referer: &str) -> Result<HeaderMap, CrawlError> {
        let mut headers = self.pics.clone();
        let value = HeaderValue::from_str(referer)
            .map_err(|e| CrawlError::Config(format!("invalid referer {referer:?}: {e}")))?;
        headers.insert(REFERER, value);
        Ok(headers)
    }
}

impl Default for HeaderProfiles {
    fn default() -> Self {
        Self::new()
    }
}

fn header_map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    pairs
        .iter()
        .map(|&(k, v)| (HeaderName::from_static(k), HeaderValue::from_static(v)))
        .collect()
}

/// Lowercase and trim a vendor name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parse a year selection such as `2015-2019`, `2017,2019` or `2016 2018-2019`.
pub fn parse_years(input: &str) -> Result<BTreeSet<i32>, CrawlError> {
    let mut years = BTreeSet::new();
    for token in input.split([',', ' ']).map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((from, to)) => {
                let (from, to) = (parse_year_token(from)?, parse_year_token(to)?);
                if from > to {
                    return Err(CrawlError::Config(format!("empty year range {token:?}")));
                }
                years.extend(from..=to);
            }
            None => {
                years.insert(parse_year_token(token)?);
            }
        }
    }
    if years.is_empty() {
        return Err(CrawlError::Config("no years selected".into()));
    }
    Ok(years)
}

fn parse_year_token(token: &str) -> Result<i32, CrawlError> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CrawlError::Config(format!("invalid year {token:?}")));
    }
    token
        .parse()
        .map_err(|_| CrawlError::Config(format!("invalid year {token:?}")))
}

/// Validate the per-model picture limit.
pub fn check_pics_amount(amount: u8) -> Result<u8, CrawlError> {
    if (1..=MAX_PICS_AMOUNT).contains(&amount) {
        Ok(amount)
    } else {
        Err(CrawlError::Config(format!(
            "pics amount must be between 1 and {MAX_PICS_AMOUNT}, got {amount}"
        )))
    }
}

/// Split a comma separated vendor list, dropping blanks.
pub fn parse_vendors(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_years_range_and_list() {
        let years = parse_years("2015-2017, 2019").unwrap();
        assert_eq!(years.into_iter().collect::<Vec<_>>(), vec![2015, 2016, 2017, 2019]);
    }

    #[test]
    fn test_parse_years_space_separated() {
        let years = parse_years("2018 2016").unwrap();
        assert_eq!(years.into_iter().collect::<Vec<_>>(), vec![2016, 2018]);
    }

    #[test]
    fn test_parse_years_rejects_garbage() {
        assert!(parse_years("20x9").is_err());
        assert!(parse_years("2019-2015").is_err());
        assert!(parse_years("  ").is_err());
    }

    #[test]
    fn test_pics_amount_bounds() {
        assert!(check_pics_amount(0).is_err());
        assert_eq!(check_pics_amount(1).unwrap(), 1);
        assert_eq!(check_pics_amount(99).unwrap(), 99);
        assert!(check_pics_amount(100).is_err());
    }

    #[test]
    fn test_parse_vendors() {
        assert_eq!(parse_vendors("AUDI, ,bmw ,Land Rover"), vec!["AUDI", "bmw", "Land Rover"]);
    }

    #[test]
    fn test_profiles_merge_template() {
        let profiles = HeaderProfiles::new();
        assert!(profiles.html.contains_key("user-agent"));
        assert!(profiles.pics.contains_key("user-agent"));
        assert!(profiles.html["accept"].to_str().unwrap().starts_with("text/html"));
        assert!(profiles.pics["accept"].to_str().unwrap().starts_with("image/webp"));
        assert!(!profiles.pics.contains_key(REFERER));
    }

    #[test]
    fn test_referer_is_per_call() {
        let profiles = HeaderProfiles::new();
        let a = profiles.pics_with_referer("https://example.com/audi/2019-a4").unwrap();
        assert_eq!(a[REFERER], "https://example.com/audi/2019-a4");
        // The shared profile is untouched.
        assert!(!profiles.pics.contains_key(REFERER));
    }

    #[test]
    fn test_file_config_parses_yaml() {
        let parsed: FileConfig =
            serde_yaml::from_str("vendors: [AUDI]\nyears: \"2019\"\npics_amount: 2\n").unwrap();
        assert_eq!(parsed.vendors.unwrap(), vec!["AUDI"]);
        assert_eq!(parsed.years.as_deref(), Some("2019"));
        assert_eq!(parsed.pics_amount, Some(2));
        assert_eq!(parsed.verbose, None);
    }
}
