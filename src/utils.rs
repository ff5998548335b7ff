//! Utility functions for dates, string manipulation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - The day stamp that keys the response cache
//! - String truncation for logging and title casing for rebuilt car names
//! - File system validation for the pictures directory

use chrono::{Local, NaiveDate};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Today's local date as `YYYYMMDD`.
pub fn today_stamp() -> String {
    day_stamp(Local::now().date_naive())
}

/// Format a date the way cache buckets are keyed.
pub fn day_stamp(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Capitalize the first letter of every word, lowercasing the rest.
///
/// A "word" starts after any non-alphabetic character, so `mercedes-benz`
/// becomes `Mercedes-Benz` and `a4 avant` becomes `A4 Avant`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        let result = truncate_for_log("ééé", 3);
        assert!(result.starts_with('é'));
    }

    #[test]
    fn test_day_stamp() {
        let date = NaiveDate::from_ymd_opt(2019, 3, 7).unwrap();
        assert_eq!(day_stamp(date), "20190307");
        assert_eq!(today_stamp().len(), 8);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("audi a4 avant"), "Audi A4 Avant");
        assert_eq!(title_case("MERCEDES-BENZ e-class"), "Mercedes-Benz E-Class");
        assert_eq!(title_case("bmw x5m"), "Bmw X5M");
        assert_eq!(title_case(""), "");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pics");
        ensure_writable_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }
}
