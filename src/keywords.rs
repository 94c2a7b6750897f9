//! Keyword source: the CSV file listing one niche per row.
//!
//! The file must have a header row containing a `keyword` or `niche` column
//! (matched case-insensitively after trimming; `keyword` wins when both are
//! present). Values are trimmed and empty ones dropped. Row order is kept and
//! duplicates are not removed.

use crate::error::{AppError, Result};
use crate::models::Niche;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

const COLUMN_NAMES: [&str; 2] = ["keyword", "niche"];

/// Read niches from a CSV file on disk.
///
/// # Errors
///
/// - [`AppError::KeywordFile`] if the file cannot be opened
/// - [`AppError::MissingColumn`] if no recognized column is present
/// - [`AppError::Csv`] if the CSV itself is malformed
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_niches(path: &Path) -> Result<Vec<Niche>> {
    let file = std::fs::File::open(path).map_err(|source| AppError::KeywordFile {
        path: path.display().to_string(),
        source,
    })?;
    let niches = parse_niches(file, &path.display().to_string())?;
    info!(count = niches.len(), "Loaded niche keywords");
    Ok(niches)
}

/// Parse niches from any CSV reader. `label` names the source in errors.
pub fn parse_niches<R: Read>(reader: R, label: &str) -> Result<Vec<Niche>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = find_column(&headers).ok_or_else(|| AppError::MissingColumn {
        path: label.to_string(),
        found: headers.iter().collect::<Vec<_>>().join(", "),
    })?;
    debug!(column = &headers[column], "Using keyword column");

    let mut niches = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        match record.get(column).map(str::trim) {
            Some(keyword) if !keyword.is_empty() => niches.push(Niche::new(keyword)),
            _ => debug!(row = line + 1, "Skipping row with empty keyword"),
        }
    }

    if niches.is_empty() {
        warn!(source = %label, "Keyword file has no usable rows");
    }
    Ok(niches)
}

fn find_column(headers: &csv::StringRecord) -> Option<usize> {
    COLUMN_NAMES.iter().find_map(|name| {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    })
}
