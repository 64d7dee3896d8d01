//! Output table serialization.
//!
//! Writes a header row followed by one row per record, in the order given.
//! The destination is replaced, never appended to.

use crate::error::GeoEnrichError;
use crate::types::{GeoRecord, OUTPUT_HEADERS};
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::path::Path;
use tracing::info;

/// Worksheet name used for workbook output.
pub const SHEET_NAME: &str = "IP Geolocation";

/// Column width for the ISP column; organization names run long.
const ISP_COLUMN_WIDTH: f64 = 50.0;

/// Output formats, chosen by destination suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Workbook,
    Csv,
}

impl OutputFormat {
    /// Pick a format from the destination suffix (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, GeoEnrichError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("xlsx") => Ok(Self::Workbook),
            Some("csv") => Ok(Self::Csv),
            _ => Err(GeoEnrichError::unsupported_format(path.to_string_lossy())),
        }
    }
}

/// Write `records` to `destination`, creating parent directories as needed.
///
/// # Errors
///
/// `UnsupportedFormat` for suffixes other than .xlsx and .csv, `IoFailure`
/// if the directory or file cannot be created or written.
pub fn write_records<P: AsRef<Path>>(
    records: &[GeoRecord],
    destination: P,
) -> Result<(), GeoEnrichError> {
    let destination = destination.as_ref();
    let format = OutputFormat::from_path(destination)?;
    let path_str = destination.to_string_lossy();

    if let Some(parent) = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent).map_err(|e| {
            GeoEnrichError::io_failure(
                path_str.as_ref(),
                format!("Failed to create directory '{}': {}", parent.display(), e),
            )
        })?;
    }

    let written = match format {
        OutputFormat::Workbook => write_workbook(records, destination),
        OutputFormat::Csv => write_csv(records, destination),
    };
    written.map_err(|message| GeoEnrichError::io_failure(path_str.as_ref(), message))?;

    info!(
        destination = %destination.display(),
        rows = records.len(),
        "wrote output table"
    );

    Ok(())
}

fn write_workbook(records: &[GeoRecord], destination: &Path) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();

    worksheet.set_name(SHEET_NAME).map_err(|e| e.to_string())?;

    for (col, header) in OUTPUT_HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .map_err(|e| e.to_string())?;
    }

    for (idx, record) in records.iter().enumerate() {
        let row = (idx + 1) as u32;
        for (col, value) in record.as_row().iter().enumerate() {
            worksheet
                .write_string(row, col as u16, *value)
                .map_err(|e| e.to_string())?;
        }
    }

    worksheet
        .set_column_width(1, ISP_COLUMN_WIDTH)
        .map_err(|e| e.to_string())?;

    workbook.save(destination).map_err(|e| e.to_string())
}

fn write_csv(records: &[GeoRecord], destination: &Path) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(destination).map_err(|e| e.to_string())?;

    writer
        .write_record(OUTPUT_HEADERS)
        .map_err(|e| e.to_string())?;
    for record in records {
        writer
            .write_record(record.as_row())
            .map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())
}
