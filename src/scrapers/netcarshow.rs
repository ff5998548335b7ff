//! Page parsers for the car catalog.
//!
//! Every function here is pure: it takes a page body already fetched through
//! the response cache and extracts one kind of information from it. A parse
//! miss yields an empty result, never an error.
//!
//! # Page layout
//!
//! - Root page: vendor anchors under `div.Ll li a`
//! - Vendor page: `ul.lst li` items, each with the model year as leading text
//!   and an anchor to the model page
//! - Model page: `WIDTHxHEIGHT` strings for the offered sizes and a
//!   `thz=[...]` script array listing the pictures
//! - Wallpaper page: `<meta itemprop="contentUrl" content="...">` with the image URL

use crate::models::{ModelLink, Resolution, VendorLink};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use url::Url;

static VENDOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.Ll li a").expect("vendor selector"));
static MODEL_ITEM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul.lst li").expect("model item selector"));
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("anchor selector"));
static CONTENT_URL_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[itemprop="contentUrl"]"#).expect("contentUrl selector")
});

static RESOLUTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)x(\d+)").expect("resolution regex"));
static THUMBS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"thz=\[(.*?)\]").expect("thumbs regex"));

/// Resolve a site-relative `href` against the base URL.
///
/// Leading and trailing slashes are dropped, so `/audi/` becomes
/// `{base}audi`. Absolute links are kept apart from a trailing slash.
pub fn root_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.trim_end_matches('/').to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), href.trim_matches('/'))
}

/// Vendors listed on the root page, in site order, one entry per link.
pub fn parse_vendors(html: &str, base: &str) -> Vec<VendorLink> {
    let document = Html::parse_document(html);
    let mut vendors: Vec<VendorLink> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for element in document.select(&VENDOR_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let link = root_url(base, href);
        let name = element.text().collect::<String>().trim().to_string();

        match positions.get(&link) {
            Some(&i) => vendors[i].name = name,
            None => {
                positions.insert(link.clone(), vendors.len());
                vendors.push(VendorLink { link, name });
            }
        }
    }
    vendors
}

/// Models listed on a vendor page, in site order.
///
/// List items without an anchor are skipped.
pub fn parse_models(html: &str, base: &str) -> Vec<ModelLink> {
    let document = Html::parse_document(html);
    document
        .select(&MODEL_ITEM_SELECTOR)
        .filter_map(|li| {
            let anchor = li.select(&ANCHOR_SELECTOR).next()?;
            let href = anchor.value().attr("href")?;
            Some(ModelLink {
                link: root_url(base, href),
                name: anchor.text().collect::<String>().trim().to_string(),
                year_text: leading_text(li)
                    .trim_matches(|c: char| c.is_whitespace() || c == '"')
                    .to_string(),
            })
        })
        .collect()
}

/// Text nodes of `element` that precede its first child element.
fn leading_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .map_while(|child| match child.value() {
            Node::Text(text) => Some(String::from(&**text)),
            Node::Comment(_) => Some(String::new()),
            _ => None,
        })
        .collect()
}

/// The offered size with the largest width, if any.
pub fn highest_resolution(html: &str) -> Option<Resolution> {
    RESOLUTION_RE
        .captures_iter(html)
        .filter_map(|caps| {
            Some(Resolution {
                width: caps[1].parse().ok()?,
                height: caps[2].parse().ok()?,
            })
        })
        .max_by_key(|r| (r.width, r.height))
}

/// Number of pictures listed in the `thz=[...]` array; zero when absent.
pub fn picture_count(html: &str) -> usize {
    THUMBS_RE
        .captures(html)
        .map(|caps| {
            caps[1]
                .split(',')
                .map(|entry| entry.trim().trim_matches(|c: char| c == '\'' || c == '"'))
                .filter(|entry| !entry.is_empty())
                .count()
        })
        .unwrap_or(0)
}

/// The image URL announced by a wallpaper page.
pub fn content_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&CONTENT_URL_SELECTOR)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

/// Wallpaper page for picture `index` at `resolution`.
///
/// The index is zero-padded to two digits: `wallpaper_01.htm` through
/// `wallpaper_99.htm`.
pub fn wallpaper_url(car_link: &str, resolution: Resolution, index: u8) -> String {
    format!("{car_link}/{resolution}/wallpaper_{index:02}.htm")
}

/// Filename for a downloaded image: the final path segment of its URL.
pub fn image_filename(image_url: &str) -> Option<String> {
    let segment = match Url::parse(image_url) {
        Ok(url) => url.path_segments()?.next_back()?.to_string(),
        Err(_) => image_url
            .split(['?', '#'])
            .next()?
            .rsplit('/')
            .next()?
            .to_string(),
    };
    match segment.as_str() {
        "" | "." | ".." => None,
        _ => Some(segment),
    }
}
