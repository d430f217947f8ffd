//! Dataset readers
//!
//! Reads the daily mobility report (CSV) and the stringency time series
//! (CSV or the first sheet of a workbook). The mobility report is
//! deserialized row by row; the stringency report is kept as an untyped
//! [`RawTable`] since its columns are dates.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use serde::Deserialize;
use tracing::info;

use crate::calendar::{format_date, parse_date};
use crate::error::ComputeError;
use crate::types::{DateRange, MobilityMetrics, MobilityRecord, RawTable};

/// Row layout of the mobility report; unknown columns are ignored
#[derive(Debug, Deserialize)]
struct MobilityCsvRow {
    country_region: String,
    #[serde(default)]
    sub_region_1: Option<String>,
    #[serde(default)]
    sub_region_2: Option<String>,
    #[serde(default)]
    metro_area: Option<String>,
    date: String,
    retail_and_recreation_percent_change_from_baseline: Option<f64>,
    grocery_and_pharmacy_percent_change_from_baseline: Option<f64>,
    parks_percent_change_from_baseline: Option<f64>,
    transit_stations_percent_change_from_baseline: Option<f64>,
    workplaces_percent_change_from_baseline: Option<f64>,
    residential_percent_change_from_baseline: Option<f64>,
}

impl From<MobilityCsvRow> for MobilityRecord {
    fn from(row: MobilityCsvRow) -> Self {
        MobilityRecord {
            country: row.country_region,
            sub_region: [row.sub_region_1, row.sub_region_2, row.metro_area]
                .into_iter()
                .flatten()
                .find(|s| !s.trim().is_empty()),
            date: row.date,
            metrics: MobilityMetrics {
                retail_recreation: row.retail_and_recreation_percent_change_from_baseline,
                grocery_pharmacy: row.grocery_and_pharmacy_percent_change_from_baseline,
                parks: row.parks_percent_change_from_baseline,
                transit: row.transit_stations_percent_change_from_baseline,
                workplaces: row.workplaces_percent_change_from_baseline,
                residential: row.residential_percent_change_from_baseline,
            },
        }
    }
}

/// Columns the mobility report must carry
pub const MOBILITY_REQUIRED_COLUMNS: [&str; 8] = [
    "country_region",
    "date",
    "retail_and_recreation_percent_change_from_baseline",
    "grocery_and_pharmacy_percent_change_from_baseline",
    "parks_percent_change_from_baseline",
    "transit_stations_percent_change_from_baseline",
    "workplaces_percent_change_from_baseline",
    "residential_percent_change_from_baseline",
];

/// Read mobility records from any CSV source
pub fn read_mobility_csv<R: Read>(source: R) -> Result<Vec<MobilityRecord>, ComputeError> {
    let mut reader = csv::Reader::from_reader(source);

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = MOBILITY_REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();
    if !missing.is_empty() {
        return Err(ComputeError::SchemaError(format!(
            "mobility report is missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<MobilityCsvRow>().enumerate() {
        let row = row.map_err(|e| {
            ComputeError::ParseError(format!("mobility row {}: {}", i + 1, e))
        })?;
        records.push(MobilityRecord::from(row));
    }
    Ok(records)
}

/// Read the stringency report as an untyped table
pub fn read_stringency_csv<R: Read>(source: R) -> Result<RawTable, ComputeError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable::new(headers, rows))
}

pub fn read_mobility_file(path: &Path) -> Result<Vec<MobilityRecord>, ComputeError> {
    let records = read_mobility_csv(File::open(path)?)?;
    info!(path = %path.display(), rows = records.len(), "read mobility report");
    Ok(records)
}

/// Workbook extensions read through the spreadsheet reader
pub const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// Whether a path names a spreadsheet workbook rather than a CSV file
pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Read the first sheet of a workbook as an untyped table
pub fn read_stringency_workbook(path: &Path) -> Result<RawTable, ComputeError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ComputeError::WorkbookError(format!("{}: {}", path.display(), e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            ComputeError::WorkbookError(format!("{} has no worksheets", path.display()))
        })?
        .map_err(|e| ComputeError::WorkbookError(format!("{}: {}", path.display(), e)))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    Ok(RawTable::new(headers, rows.collect()))
}

/// Text form of a workbook cell; date cells use `YYYY-MM-DD`, errors read as empty
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(format_date)
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

/// Read the stringency report, choosing the reader by file extension
pub fn read_stringency_file(path: &Path) -> Result<RawTable, ComputeError> {
    let table = if is_workbook(path) {
        read_stringency_workbook(path)?
    } else {
        read_stringency_csv(File::open(path)?)?
    };
    info!(
        path = %path.display(),
        rows = table.rows.len(),
        columns = table.headers.len(),
        "read stringency report"
    );
    Ok(table)
}

/// First and last date present in the mobility data
pub fn available_span(records: &[MobilityRecord]) -> Result<Option<DateRange>, ComputeError> {
    let mut span: Option<DateRange> = None;
    for record in records {
        let date = parse_date(&record.date)?;
        span = Some(match span {
            Some(s) => DateRange {
                from: s.from.min(date),
                to: s.to.max(date),
            },
            None => DateRange { from: date, to: date },
        });
    }
    Ok(span)
}
