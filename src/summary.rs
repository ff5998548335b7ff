//! CSV-backed summary of every model processed so far.
//!
//! The summary decides which models are skipped on later runs: a model whose
//! page link is already present is never visited again, even if fewer than
//! the requested number of pictures were stored for it.
//!
//! # File format
//!
//! UTF-8 with a byte-order mark, `\n` line endings, header row
//! `VENDOR,YEAR,CAR,CAR_LINK,IMAGE_01..IMAGE_NN` where `NN` is the configured
//! picture limit. Absent or blank cells are written as `-` and read back as
//! absent.
//!
//! # Bootstrapping
//!
//! When no summary exists yet, [`rebuild_from_pics`] reconstructs one row per
//! model from the filenames already sitting in the pictures directory.

use crate::error::CrawlError;
use crate::models::{SummaryRecord, image_column, parse_image_column, parse_index, parse_year};
use crate::utils::title_case;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

const BOM: &str = "\u{feff}";
const PLACEHOLDER: &str = "-";
const BASE_COLUMNS: [&str; 4] = ["VENDOR", "YEAR", "CAR", "CAR_LINK"];

/// Vendor names containing the filename separator.
const HYPHENATED_VENDORS: [&str; 2] = ["rolls-royce", "mercedes-benz"];
const ESCAPE: char = '|';

#[derive(Debug)]
pub struct SummaryStore {
    path: PathBuf,
    pics_amount: u8,
    records: Vec<SummaryRecord>,
}

impl SummaryStore {
    /// Read the summary CSV, or rebuild it from `pics_dir` when it holds no rows.
    ///
    /// # Arguments
    ///
    /// * `path` - The summary CSV; it need not exist yet
    /// * `pics_amount` - Number of `IMAGE_NN` columns written by [`Self::persist`]
    /// * `pics_dir` - Pictures directory scanned when the CSV is missing or empty
    /// * `base_url` - Site root used to derive model links during a rebuild
    ///
    /// # Returns
    ///
    /// A store holding every record; [`Self::known_links`] gives the dedup set.
    ///
    /// # Errors
    ///
    /// IO or CSV errors from reading either source.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(
        path: &Path,
        pics_amount: u8,
        pics_dir: &Path,
        base_url: &str,
    ) -> Result<Self, CrawlError> {
        let mut records = read_csv(path)?;
        if records.is_empty() {
            records = rebuild_from_pics(pics_dir, base_url)?;
            info!(rows = records.len(), pics_dir = %pics_dir.display(), "Rebuilt summary from pictures");
        } else {
            info!(rows = records.len(), "Loaded summary");
        }
        Ok(Self {
            path: path.to_path_buf(),
            pics_amount,
            records,
        })
    }

    /// An empty store that will be written to `path`.
    pub fn empty(path: &Path, pics_amount: u8) -> Self {
        Self {
            path: path.to_path_buf(),
            pics_amount,
            records: Vec::new(),
        }
    }

    /// Model links already processed; the dedup set for a run.
    pub fn known_links(&self) -> HashSet<String> {
        self.records
            .iter()
            .filter(|r| !r.car_link.is_empty())
            .map(|r| r.car_link.clone())
            .collect()
    }

    pub fn append(&mut self, record: SummaryRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SummaryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column names for the configured picture limit.
    pub fn headers(&self) -> Vec<String> {
        BASE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain((1..=self.pics_amount).map(image_column))
            .collect()
    }

    /// Overwrite the CSV with every record.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub fn persist(&self) -> Result<(), CrawlError> {
        let mut file = fs::File::create(&self.path)?;
        file.write_all(BOM.as_bytes())?;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.write_record(self.headers())?;
        for record in &self.records {
            writer.write_record(self.row(record))?;
        }
        writer.flush()?;
        debug!(rows = self.records.len(), "Summary written");
        Ok(())
    }

    fn row(&self, record: &SummaryRecord) -> Vec<String> {
        let fixed = [
            record.vendor.clone(),
            record.year.map(|y| y.to_string()),
            record.car.clone(),
            Some(record.car_link.clone()),
        ];
        fixed
            .into_iter()
            .chain((1..=self.pics_amount).map(|n| record.images.get(&n).cloned()))
            .map(|cell| cell_or_placeholder(cell.as_deref()))
            .collect()
    }
}

fn cell_or_placeholder(cell: Option<&str>) -> String {
    match cell.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// A cell value, with blanks and the placeholder treated as absent.
fn present(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty() && cell != PLACEHOLDER).then(|| cell.to_string())
}

/// Parse a summary CSV. A missing file yields no rows.
pub fn read_csv(path: &Path) -> Result<Vec<SummaryRecord>, CrawlError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    let text = text.strip_prefix(BOM).unwrap_or(&text);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = SummaryRecord::default();
        for (header, cell) in headers.iter().zip(row.iter()) {
            match header.trim() {
                "VENDOR" => record.vendor = present(cell),
                "YEAR" => record.year = present(cell).as_deref().and_then(parse_year),
                "CAR" => record.car = present(cell),
                "CAR_LINK" => record.car_link = present(cell).unwrap_or_default(),
                other => {
                    if let (Some(n), Some(file)) = (parse_image_column(other), present(cell)) {
                        record.images.insert(n, file);
                    }
                }
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// One picture filename split into its summary fields.
#[derive(Debug, PartialEq)]
struct PictureName {
    vendor: String,
    year: Option<i32>,
    car: String,
    car_link: String,
    index: Option<u8>,
}

/// Split `vendor-model…-year-size-index.jpg`.
///
/// Hyphenated vendor names are escaped before splitting and restored after.
/// Names with fewer than four tokens are not pictures this tool wrote.
fn parse_picture_name(filename: &str, base_url: &str) -> Option<PictureName> {
    let lower = filename.to_lowercase();
    let stem = lower.strip_suffix(".jpg")?;

    let mut escaped = stem.to_string();
    for vendor in HYPHENATED_VENDORS {
        escaped = escaped.replace(vendor, &vendor.replace('-', &ESCAPE.to_string()));
    }

    let tokens: Vec<&str> = escaped.split('-').collect();
    let n = tokens.len();
    if n < 4 {
        return None;
    }
    let vendor = unescape(tokens[0].replace('_', " ").trim());
    let model: Vec<String> = tokens[1..n - 3].iter().map(|t| unescape(t)).collect();
    let year_text = tokens[n - 3].trim();

    let car = title_case(
        &std::iter::once(vendor.as_str())
            .chain(model.iter().map(String::as_str))
            .join(" ")
            .replace('_', " "),
    )
    .trim()
    .to_string();
    let car_link = format!(
        "{}/{}/{}-{}",
        base_url.trim_end_matches('/'),
        vendor.replace(' ', "_"),
        year_text,
        model.join("-")
    )
    .to_lowercase();

    Some(PictureName {
        vendor,
        year: parse_year(year_text),
        car,
        car_link,
        index: parse_index(tokens[n - 1]),
    })
}

fn unescape(token: &str) -> String {
    token.replace(ESCAPE, "-")
}

/// Reconstruct summary rows from an existing pictures directory.
///
/// Files are grouped by the model link derived from their name, so one model
/// stored at several resolutions still yields a single record. On an index
/// clash the first filename in sorted order wins. A missing directory yields
/// no rows.
#[instrument(level = "info", skip_all, fields(pics_dir = %pics_dir.display()))]
pub fn rebuild_from_pics(pics_dir: &Path, base_url: &str) -> Result<Vec<SummaryRecord>, CrawlError> {
    if !pics_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut filenames = Vec::new();
    for entry in fs::read_dir(pics_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Ok(name) = entry.file_name().into_string() {
                filenames.push(name);
            }
        }
    }
    filenames.sort();

    let mut records: Vec<SummaryRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for filename in filenames {
        let Some(picture) = parse_picture_name(&filename, base_url) else {
            debug!(%filename, "Skipping unrecognized file");
            continue;
        };
        let i = *positions.entry(picture.car_link.clone()).or_insert_with(|| {
            records.push(SummaryRecord::new(
                &picture.vendor,
                picture.year,
                &picture.car,
                &picture.car_link,
            ));
            records.len() - 1
        });
        if let Some(index) = picture.index {
            records[i].images.entry(index).or_insert(filename);
        }
    }
    Ok(records)
}
