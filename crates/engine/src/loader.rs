//! Recipient loader: parses the uploaded CSV into `RecipientRecord`s.
//!
//! Header validation is shared with the upload route so a bad file is
//! rejected before any run starts. The loader never drops rows: unparseable
//! dates become `None` and unknown categories are kept verbatim.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

use herald_common::error::AppError;
use herald_common::types::{Category, RecipientRecord};

/// Column positions resolved from a header row.
struct ColumnIndex([usize; 6]);

impl ColumnIndex {
    fn resolve(headers: &StringRecord) -> Result<Self, AppError> {
        let names: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();

        let mut positions = [0usize; 6];
        let mut missing = Vec::new();
        for (slot, column) in RecipientRecord::COLUMNS.iter().enumerate() {
            match names.iter().position(|name| name == column) {
                Some(pos) => positions[slot] = pos,
                None => missing.push(*column),
            }
        }

        if !missing.is_empty() {
            return Err(AppError::Schema(format!(
                "CSV must contain columns: {} (missing: {})",
                RecipientRecord::COLUMNS.join(", "),
                missing.join(", ")
            )));
        }

        Ok(Self(positions))
    }

    fn get<'r>(&self, row: &'r StringRecord, slot: usize) -> &'r str {
        row.get(self.0[slot]).unwrap_or_default()
    }
}

/// Remove every whitespace character from a contact number.
pub fn normalize_contact(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parse a hearing date. Accepts `YYYY-MM-DD`, optionally followed by a time
/// part (`2026-10-23 10:30:00`, `2026-10-23T10:30:00`). Anything else is `None`.
pub fn parse_hearing_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    let (date_part, _time) = raw.split_once([' ', 'T'])?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(source)
}

/// Check the header row of a recipient source and count its data rows.
pub fn inspect<R: Read>(source: R) -> Result<usize, AppError> {
    let mut rdr = reader(source);
    ColumnIndex::resolve(rdr.headers()?)?;

    let mut rows = 0;
    for row in rdr.records() {
        row?;
        rows += 1;
    }
    Ok(rows)
}

/// Parse every row of a recipient source.
pub fn read_recipients<R: Read>(source: R) -> Result<Vec<RecipientRecord>, AppError> {
    let mut rdr = reader(source);
    let columns = ColumnIndex::resolve(rdr.headers()?)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        records.push(RecipientRecord {
            client: columns.get(&row, 0).to_string(),
            contact: normalize_contact(columns.get(&row, 1)),
            next_hearing_date: parse_hearing_date(columns.get(&row, 2)),
            category: Category::parse(columns.get(&row, 3)),
            typ_rn_ry: columns.get(&row, 4).to_string(),
            parties: columns.get(&row, 5).to_string(),
        });
    }
    Ok(records)
}

/// Load recipients from a file on disk.
pub async fn load_recipients(path: &Path) -> Result<Vec<RecipientRecord>, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let records = read_recipients(bytes.as_slice())?;
    tracing::debug!(path = %path.display(), rows = records.len(), "Loaded recipients");
    Ok(records)
}
