//! Data models for scraped listings and summary records.
//!
//! - [`VendorLink`] and [`ModelLink`]: entries parsed from listing pages
//! - [`Resolution`]: a `WIDTHxHEIGHT` wallpaper variant
//! - [`SummaryRecord`]: one row of the summary CSV

use std::collections::BTreeMap;
use std::fmt;

/// A vendor entry from the root listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorLink {
    /// Absolute URL of the vendor page.
    pub link: String,
    /// Vendor name as displayed on the site.
    pub name: String,
}

/// A model entry from a vendor page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLink {
    /// Absolute URL of the model page; the summary dedup key.
    pub link: String,
    /// Model display name (anchor text).
    pub name: String,
    /// The year text shown next to the link, quotes and spaces stripped.
    pub year_text: String,
}

/// A wallpaper size offered on a model page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One discovered vendor/model image set.
///
/// `images` maps the 1-based picture index to the stored filename. Slots
/// that could not be resolved are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryRecord {
    pub vendor: Option<String>,
    pub year: Option<i32>,
    pub car: Option<String>,
    pub car_link: String,
    pub images: BTreeMap<u8, String>,
    /// Source URL of the last image resolved for this model. Kept in memory only.
    pub image_link: Option<String>,
}

impl SummaryRecord {
    pub fn new(vendor: &str, year: Option<i32>, car: &str, car_link: &str) -> Self {
        Self {
            vendor: Some(vendor.to_string()),
            year,
            car: Some(car.to_string()),
            car_link: car_link.to_string(),
            images: BTreeMap::new(),
            image_link: None,
        }
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}

/// CSV column name for picture slot `n`, e.g. `IMAGE_03`.
pub fn image_column(n: u8) -> String {
    format!("IMAGE_{n:02}")
}

/// Inverse of [`image_column`]; `None` for anything that is not an image column.
pub fn parse_image_column(header: &str) -> Option<u8> {
    parse_index(header.strip_prefix("IMAGE_")?)
}

/// Parse a decimal picture index, rejecting zero, signs and blanks.
pub fn parse_index(text: &str) -> Option<u8> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok().filter(|n| *n > 0)
}

/// Parse a model year shown on the site; non-numeric text means "unknown".
pub fn parse_year(text: &str) -> Option<i32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_columns() {
        assert_eq!(image_column(1), "IMAGE_01");
        assert_eq!(image_column(42), "IMAGE_42");
        assert_eq!(parse_image_column("IMAGE_07"), Some(7));
        assert_eq!(parse_image_column("IMAGE_LINK"), None);
        assert_eq!(parse_image_column("CAR"), None);
        assert_eq!(parse_image_column("IMAGE_00"), None);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2019"), Some(2019));
        assert_eq!(parse_year(" 2018 "), Some(2018));
        assert_eq!(parse_year("Concept"), None);
        assert_eq!(parse_year("-2019"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_resolution_display() {
        let r = Resolution {
            width: 1920,
            height: 1080,
        };
        assert_eq!(r.to_string(), "1920x1080");
    }
}
