//! Result sheet writer
//!
//! Persists the clustered table as a single-sheet workbook (or CSV) whose
//! file name carries the write time.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use rust_xlsxwriter::{Workbook, XlsxError};
use tracing::info;

use crate::config::{OutputConfig, SheetFormat};
use crate::error::ComputeError;
use crate::types::{ClusteredRow, MobilityMetrics};

/// Timestamp layout embedded in output file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Worksheet name of the workbook output
pub const SHEET_NAME: &str = "clusters";

/// Column headers of the result sheet
pub fn sheet_headers() -> Vec<&'static str> {
    let mut headers = vec!["country", "bucket", "stringency_value"];
    headers.extend(MobilityMetrics::NAMES);
    headers.push("group");
    headers
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.<xlsx|csv>`
pub fn sheet_file_name(prefix: &str, format: SheetFormat, at: NaiveDateTime) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        at.format(TIMESTAMP_FORMAT),
        format.extension()
    )
}

/// Write the sheet as CSV to any writer
pub fn write_rows<W: Write>(rows: &[ClusteredRow], sink: W) -> Result<(), ComputeError> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(sheet_headers())?;

    for clustered in rows {
        let row = &clustered.row;
        let mut record = vec![
            row.country.clone(),
            row.bucket.label(),
            row.stringency_value.to_string(),
        ];
        record.extend(row.metrics.iter().map(|m| m.to_string()));
        record.push(clustered.group.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the sheet as a single-worksheet workbook
pub fn write_workbook(rows: &[ClusteredRow], path: &Path) -> Result<(), ComputeError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(workbook_error)?;

    for (col, header) in sheet_headers().into_iter().enumerate() {
        sheet.write_string(0, col as u16, header).map_err(workbook_error)?;
    }

    for (i, clustered) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        let row = &clustered.row;
        sheet.write_string(r, 0, &row.country).map_err(workbook_error)?;
        sheet.write_string(r, 1, row.bucket.label()).map_err(workbook_error)?;
        sheet.write_number(r, 2, row.stringency_value).map_err(workbook_error)?;
        for (j, value) in row.metrics.iter().enumerate() {
            sheet.write_number(r, 3 + j as u16, *value).map_err(workbook_error)?;
        }
        sheet
            .write_number(r, 3 + row.metrics.len() as u16, clustered.group)
            .map_err(workbook_error)?;
    }

    workbook.save(path).map_err(workbook_error)
}

fn workbook_error(e: XlsxError) -> ComputeError {
    ComputeError::WorkbookError(e.to_string())
}

/// Write the sheet into the configured directory, stamped with the current local time
pub fn write_sheet(rows: &[ClusteredRow], output: &OutputConfig) -> Result<PathBuf, ComputeError> {
    write_sheet_at(
        rows,
        &output.directory,
        &output.file_prefix,
        output.format,
        Local::now().naive_local(),
    )
}

pub fn write_sheet_at(
    rows: &[ClusteredRow],
    directory: &Path,
    prefix: &str,
    format: SheetFormat,
    at: NaiveDateTime,
) -> Result<PathBuf, ComputeError> {
    fs::create_dir_all(directory)?;
    let path = directory.join(sheet_file_name(prefix, format, at));
    match format {
        SheetFormat::Xlsx => write_workbook(rows, &path)?,
        SheetFormat::Csv => write_rows(rows, fs::File::create(&path)?)?,
    }

    info!(path = %path.display(), rows = rows.len(), "wrote result sheet");
    Ok(path)
}
