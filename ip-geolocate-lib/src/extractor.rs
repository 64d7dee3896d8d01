//! Address extraction from spreadsheet and CSV sources.
//!
//! Reads one column of a table, starting at a 1-based row, and returns the
//! non-empty cell values in row order. No IP validation happens here; a cell
//! is an address if it has text in it.

use crate::error::GeoEnrichError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Tabular formats we know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Excel workbook, first worksheet
    Spreadsheet,

    /// Comma-delimited text
    DelimitedText,
}

impl SourceFormat {
    /// Pick a format from the file suffix (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, GeoEnrichError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") => Ok(Self::Spreadsheet),
            Some("csv") => Ok(Self::DelimitedText),
            _ => Err(GeoEnrichError::unsupported_format(path.to_string_lossy())),
        }
    }
}

/// Map a column letter to a zero-based index ('A' → 0, 'b' → 1, ...).
///
/// Only single letters are accepted; columns past 'Z' are not supported.
pub fn column_index(column: &str) -> Result<usize, GeoEnrichError> {
    let trimmed = column.trim();
    let mut chars = trimmed.chars();

    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            Ok((letter.to_ascii_uppercase() as u8 - b'A') as usize)
        }
        (None, _) => Err(GeoEnrichError::invalid_column(
            column,
            "column letter cannot be empty",
        )),
        (Some(_), None) => Err(GeoEnrichError::invalid_column(
            column,
            "column must be a letter from A to Z",
        )),
        (Some(_), Some(_)) => Err(GeoEnrichError::invalid_column(
            column,
            "only single-letter columns (A-Z) are supported",
        )),
    }
}

/// Read the addresses in `column` from `start_row` (1-based) onwards.
///
/// # Errors
///
/// - `UnsupportedFormat` if the suffix is not .xlsx, .xlsm or .csv
/// - `InvalidColumn` if `column` is not a single letter
/// - `ConfigError` if `start_row` is 0
/// - `MissingColumn` if a CSV row is too short for the column
/// - `FileError` if the source cannot be opened or parsed
pub fn extract_addresses<P: AsRef<Path>>(
    source: P,
    column: &str,
    start_row: usize,
) -> Result<Vec<String>, GeoEnrichError> {
    let source = source.as_ref();
    let format = SourceFormat::from_path(source)?;
    let col_idx = column_index(column)?;

    if start_row == 0 {
        return Err(GeoEnrichError::config("start row is 1-based and must be at least 1"));
    }

    let label = column.trim().to_ascii_uppercase();
    let addresses = match format {
        SourceFormat::Spreadsheet => read_spreadsheet(source, col_idx, start_row)?,
        SourceFormat::DelimitedText => read_delimited(source, col_idx, &label, start_row)?,
    };

    info!(
        source = %source.display(),
        column = %label,
        start_row,
        count = addresses.len(),
        "extracted addresses"
    );

    Ok(addresses)
}

fn read_spreadsheet(
    source: &Path,
    col_idx: usize,
    start_row: usize,
) -> Result<Vec<String>, GeoEnrichError> {
    let path_str = source.to_string_lossy();

    let mut workbook: Xlsx<_> = open_workbook(source).map_err(|e| {
        GeoEnrichError::file_error(path_str.as_ref(), format!("Failed to open workbook: {}", e))
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| {
            GeoEnrichError::file_error(path_str.as_ref(), format!("Failed to read worksheet: {}", e))
        })?,
        None => {
            return Err(GeoEnrichError::file_error(
                path_str.as_ref(),
                "Workbook contains no worksheets",
            ))
        }
    };

    // Positions are absolute; the range itself starts at the first used cell.
    let last_row = match range.end() {
        Some((row, _)) => row as usize,
        None => {
            debug!(source = %source.display(), "worksheet is empty");
            return Ok(Vec::new());
        }
    };

    let mut addresses = Vec::new();
    for row in (start_row - 1)..=last_row {
        if let Some(text) = range
            .get_value((row as u32, col_idx as u32))
            .and_then(cell_text)
        {
            addresses.push(text);
        }
    }

    Ok(addresses)
}

fn read_delimited(
    source: &Path,
    col_idx: usize,
    label: &str,
    start_row: usize,
) -> Result<Vec<String>, GeoEnrichError> {
    let path_str = source.to_string_lossy();

    let content = fs::read(source).map_err(|e| {
        GeoEnrichError::file_error(path_str.as_ref(), format!("Failed to open CSV: {}", e))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_slice());

    let mut addresses = Vec::new();
    let mut record = csv::StringRecord::new();
    let mut row = 0;

    loop {
        let offset = reader.position().byte() as usize;
        let more = reader.read_record(&mut record).map_err(|e| {
            GeoEnrichError::file_error(
                path_str.as_ref(),
                format!("Failed to parse row {}: {}", row + 1, e),
            )
        })?;

        // The reader skips empty lines, but they are still rows without cells.
        for _ in 0..blank_lines_at(&content, offset) {
            row += 1;
            if row >= start_row {
                return Err(GeoEnrichError::missing_column(row, label));
            }
        }

        if !more {
            break;
        }

        row += 1;
        if row < start_row {
            continue;
        }

        let value = record
            .get(col_idx)
            .ok_or_else(|| GeoEnrichError::missing_column(row, label))?
            .trim();

        if !value.is_empty() {
            addresses.push(value.to_string());
        }
    }

    Ok(addresses)
}

/// Number of empty lines starting at byte `offset`.
///
/// `\n`, `\r\n` and a lone `\r` each end one line. A `\n` completing the
/// previous record's `\r\n` is not a line of its own.
fn blank_lines_at(content: &[u8], offset: usize) -> usize {
    let mut pos = offset;
    if pos > 0 && content.get(pos - 1) == Some(&b'\r') && content.get(pos) == Some(&b'\n') {
        pos += 1;
    }

    let mut count = 0;
    while let Some(&byte) = content.get(pos) {
        match byte {
            b'\n' => pos += 1,
            b'\r' if content.get(pos + 1) == Some(&b'\n') => pos += 2,
            b'\r' => pos += 1,
            _ => break,
        }
        count += 1;
    }
    count
}

/// Text of a spreadsheet cell, or None when it holds nothing.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
