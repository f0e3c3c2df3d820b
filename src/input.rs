//! CSV input table to job descriptors.
//!
//! The table must carry the five columns named in [`InputConfig`]. A missing
//! column fails the whole batch before anything is scheduled; a bad value in
//! a single row only produces a warning.

use crate::config::InputConfig;
use crate::error::{Error, Result};
use crate::job::{JobDescriptor, TagAttributes};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Non-fatal problem found in one row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputWarning {
    /// Row (sequence) index
    pub sequence: usize,
    /// What was wrong
    pub message: String,
}

/// Parsed input table
#[derive(Clone, Debug, Default)]
pub struct InputBatch {
    /// One descriptor per data row, in table order
    pub jobs: Vec<JobDescriptor>,
    /// Row-level problems that did not stop the row
    pub warnings: Vec<InputWarning>,
}

struct ColumnIndexes {
    title: usize,
    date: usize,
    speaker: usize,
    series: usize,
    url: usize,
}

fn resolve_columns(headers: &[String], columns: &InputConfig) -> Result<ColumnIndexes> {
    let position = |name: &str| headers.iter().position(|h| h == name);
    let missing: Vec<String> = columns
        .required_columns()
        .iter()
        .filter(|name| position(name).is_none())
        .map(|name| name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(Error::Validation {
            message: format!("missing required columns: {}", missing.join(", ")),
            missing_columns: missing,
            detected_columns: headers.to_vec(),
        });
    }

    let index = |name: &str| position(name).unwrap_or_default();
    Ok(ColumnIndexes {
        title: index(&columns.title_column),
        date: index(&columns.date_column),
        speaker: index(&columns.speaker_column),
        series: index(&columns.series_column),
        url: index(&columns.url_column),
    })
}

/// Year of an ISO date
///
/// `Ok(None)` for an empty cell, `Err` for a value that is not a valid date.
/// A trailing time part (`2024-03-10 09:30:00`) is ignored.
pub fn parse_year(value: &str) -> std::result::Result<Option<i32>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let date_part = value
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(value);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map(|date| Some(date.year()))
        .map_err(|e| format!("invalid date {:?}: {}", value, e))
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse a CSV table into job descriptors targeting `destination`
pub fn parse_jobs<R: std::io::Read>(
    reader: R,
    destination: &Path,
    columns: &InputConfig,
) -> Result<InputBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let idx = resolve_columns(&headers, columns)?;

    let mut batch = InputBatch::default();
    for (sequence, record) in reader.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");

        let year = match parse_year(field(idx.date)) {
            Ok(year) => year,
            Err(message) => {
                tracing::warn!(sequence, %message, "Ignoring unparsable date");
                batch.warnings.push(InputWarning { sequence, message });
                None
            }
        };

        let job = JobDescriptor::new(
            sequence,
            field(idx.url).trim(),
            destination,
            field(idx.title).trim(),
        )
        .with_attributes(TagAttributes {
            speaker: optional(field(idx.speaker)),
            series: optional(field(idx.series)),
            year,
        });
        batch.jobs.push(job);
    }

    tracing::info!(
        rows = batch.jobs.len(),
        warnings = batch.warnings.len(),
        "Parsed input table"
    );
    Ok(batch)
}

/// Read and parse the CSV file at `path`
pub async fn load_jobs(path: &Path, destination: &Path, columns: &InputConfig) -> Result<InputBatch> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!(
                "input file '{}' does not exist",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    parse_jobs(data.as_slice(), destination, columns)
}

/// Fail with [`Error::NotFound`] unless `path` is an existing directory
pub async fn ensure_directory(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::NotFound(format!(
            "'{}' is not a directory",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
            "directory '{}' does not exist",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}
