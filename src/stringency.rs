//! Stringency table reshaping
//!
//! The stringency report stores one column per date. This module validates
//! the header layout, moves the date columns into bucket space, transposes
//! the table so buckets become rows, and reduces every bucket to its peak
//! value and the country holding it.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::calendar::parse_date;
use crate::error::ComputeError;
use crate::period::PeriodContext;
use crate::types::{Bucket, PeakStringency, RawTable};

/// Canonical label of the country-code column
pub const CODE_LABEL: &str = "Code";

/// Canonical label of the country-name column
pub const COUNTRY_LABEL: &str = "Country";

/// Role of a stringency column, decided from its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Code,
    Country,
    Date(NaiveDate),
}

impl ColumnKind {
    /// Classify a header: `*code*` and `*name*` (case-insensitive) are metadata,
    /// everything else must parse as a date.
    pub fn classify(header: &str) -> Result<Self, ComputeError> {
        let lowered = header.to_lowercase();
        if lowered.contains("code") {
            return Ok(ColumnKind::Code);
        }
        if lowered.contains("name") {
            return Ok(ColumnKind::Country);
        }
        parse_date(header)
            .map(ColumnKind::Date)
            .map_err(|_| ComputeError::ColumnFormatError(header.to_string()))
    }
}

/// Validated stringency report
#[derive(Debug, Clone, PartialEq)]
pub struct StringencyTable {
    codes: Vec<String>,
    countries: Vec<String>,
    dates: Vec<NaiveDate>,
    /// `values[row][date_column]`
    values: Vec<Vec<Option<f64>>>,
}

impl StringencyTable {
    /// Validate a raw table against the stringency layout
    pub fn from_raw(raw: &RawTable) -> Result<Self, ComputeError> {
        let kinds: Vec<ColumnKind> = raw
            .headers
            .iter()
            .map(|h| ColumnKind::classify(h))
            .collect::<Result<_, _>>()?;

        let code_idx = single_column(&kinds, ColumnKind::Code, CODE_LABEL)?;
        let country_idx = single_column(&kinds, ColumnKind::Country, COUNTRY_LABEL)?;

        let date_columns: Vec<(usize, NaiveDate)> = kinds
            .iter()
            .enumerate()
            .filter_map(|(idx, kind)| match kind {
                ColumnKind::Date(date) => Some((idx, *date)),
                _ => None,
            })
            .collect();

        let mut codes = Vec::with_capacity(raw.rows.len());
        let mut countries = Vec::with_capacity(raw.rows.len());
        let mut values = Vec::with_capacity(raw.rows.len());

        for row in 0..raw.rows.len() {
            codes.push(raw.cell(row, code_idx).trim().to_string());
            countries.push(raw.cell(row, country_idx).trim().to_string());
            let row_values = date_columns
                .iter()
                .map(|(col, _)| parse_index(raw.cell(row, *col), &raw.headers[*col]))
                .collect::<Result<Vec<_>, _>>()?;
            values.push(row_values);
        }

        debug!(
            countries = countries.len(),
            date_columns = date_columns.len(),
            "validated stringency table"
        );

        Ok(Self {
            codes,
            countries,
            dates: date_columns.into_iter().map(|(_, date)| date).collect(),
            values,
        })
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn value(&self, row: usize, date_column: usize) -> Option<f64> {
        self.values.get(row)?.get(date_column).copied().flatten()
    }

    /// Build a bucket-labelled table from the date columns inside the context's range.
    ///
    /// Out-of-range columns are left out entirely, as are in-range columns
    /// whose week has no bucket. The code column is not carried over.
    pub fn relabel(&self, context: &PeriodContext) -> BucketedStringency {
        let mut columns = Vec::new();
        let mut out_of_range = 0usize;
        let mut unmapped = Vec::new();

        for (col, date) in self.dates.iter().enumerate() {
            if !context.range().contains(*date) {
                out_of_range += 1;
                continue;
            }
            match context.bucket_for_date(*date) {
                Some(bucket) => {
                    let values = (0..self.countries.len())
                        .map(|row| self.value(row, col))
                        .collect();
                    columns.push(BucketedColumn {
                        date: *date,
                        bucket,
                        values,
                    });
                }
                None => unmapped.push(*date),
            }
        }

        if !unmapped.is_empty() {
            warn!(
                count = unmapped.len(),
                first = %unmapped[0],
                "stringency dates inside the range have no mobility bucket; dropped"
            );
        }
        debug!(
            kept = columns.len(),
            out_of_range, "relabelled stringency columns"
        );

        BucketedStringency {
            countries: self.countries.clone(),
            columns,
        }
    }
}

fn single_column(kinds: &[ColumnKind], wanted: ColumnKind, label: &str) -> Result<usize, ComputeError> {
    let matches: Vec<usize> = kinds
        .iter()
        .enumerate()
        .filter(|(_, kind)| **kind == wanted)
        .map(|(idx, _)| idx)
        .collect();
    match matches.as_slice() {
        [idx] => Ok(*idx),
        [] => Err(ComputeError::SchemaError(format!(
            "stringency table has no {label} column"
        ))),
        _ => Err(ComputeError::SchemaError(format!(
            "stringency table has {} {label} columns",
            matches.len()
        ))),
    }
}

/// Parse a stringency cell; empty and NA markers are missing values
fn parse_index(cell: &str, header: &str) -> Result<Option<f64>, ComputeError> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    trimmed.parse::<f64>().map(Some).map_err(|_| {
        ComputeError::ParseError(format!("stringency value '{trimmed}' in column {header}"))
    })
}

/// One retained date column, relabelled with its bucket
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedColumn {
    pub date: NaiveDate,
    pub bucket: Bucket,
    /// One value per country, in table row order
    pub values: Vec<Option<f64>>,
}

/// Stringency table after relabelling: `Country` plus bucket-labelled columns
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedStringency {
    pub countries: Vec<String>,
    pub columns: Vec<BucketedColumn>,
}

impl BucketedStringency {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.countries.is_empty()
    }

    /// Buckets become rows, countries become columns; missing values become 0
    pub fn transpose(&self) -> TransposedStringency {
        let rows = self
            .columns
            .iter()
            .map(|column| StringencyRow {
                bucket: column.bucket,
                values: column.values.iter().map(|v| v.unwrap_or(0.0)).collect(),
            })
            .collect();

        TransposedStringency {
            countries: self.countries.clone(),
            rows,
        }
    }
}

/// One transposed row: a raw date's values across all countries
#[derive(Debug, Clone, PartialEq)]
pub struct StringencyRow {
    pub bucket: Bucket,
    pub values: Vec<f64>,
}

/// Transposed stringency table: one row per retained date, one column per country
#[derive(Debug, Clone, PartialEq)]
pub struct TransposedStringency {
    pub countries: Vec<String>,
    pub rows: Vec<StringencyRow>,
}

impl TransposedStringency {
    /// Mean per bucket and country, rounded to the nearest integer (ties to even).
    /// Buckets are returned in chronological order.
    pub fn bucket_means(&self) -> Vec<StringencyRow> {
        let mut buckets: Vec<Bucket> = self.rows.iter().map(|r| r.bucket).collect();
        buckets.sort();
        buckets.dedup();

        buckets
            .into_iter()
            .map(|bucket| {
                let mut sums = vec![0.0; self.countries.len()];
                let mut count = 0usize;
                for row in self.rows.iter().filter(|r| r.bucket == bucket) {
                    for (sum, value) in sums.iter_mut().zip(&row.values) {
                        *sum += value;
                    }
                    count += 1;
                }
                let values = sums
                    .into_iter()
                    .map(|sum| (sum / count as f64).round_ties_even())
                    .collect();
                StringencyRow { bucket, values }
            })
            .collect()
    }

    /// Peak value per bucket and the first country (in column order) attaining it
    pub fn peaks(&self) -> Vec<PeakStringency> {
        let peaks: Vec<PeakStringency> = self
            .bucket_means()
            .into_iter()
            .filter_map(|row| {
                let (idx, value) = first_max(&row.values)?;
                Some(PeakStringency {
                    bucket: row.bucket,
                    country: self.countries[idx].clone(),
                    value,
                })
            })
            .collect();

        info!(buckets = peaks.len(), "computed peak stringency per bucket");
        peaks
    }
}

/// Index and value of the first maximum
fn first_max(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (idx, value)| match best {
            Some((_, best_value)) if value <= best_value => best,
            _ => Some((idx, value)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodMapper;
    use crate::types::{DateRange, MobilityMetrics, MobilityRecord, WeekYear};
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn context_for(from: NaiveDate, to: NaiveDate) -> PeriodContext {
        let records: Vec<MobilityRecord> = from
            .iter_days()
            .take_while(|date| *date <= to)
            .map(|date| MobilityRecord {
                country: "Chile".to_string(),
                sub_region: None,
                date: date.to_string(),
                metrics: MobilityMetrics::default(),
            })
            .collect();
        PeriodMapper::map(&records, DateRange::new(from, to))
            .unwrap()
            .context
    }

    #[test]
    fn test_classify_headers() {
        assert_eq!(ColumnKind::classify("country_code").unwrap(), ColumnKind::Code);
        assert_eq!(ColumnKind::classify("CountryName").unwrap(), ColumnKind::Country);
        assert_eq!(
            ColumnKind::classify("15Mar2021").unwrap(),
            ColumnKind::Date(d(2021, 3, 15))
        );
        assert!(matches!(
            ColumnKind::classify("region").unwrap_err(),
            ComputeError::ColumnFormatError(_)
        ));
    }

    #[test]
    fn test_from_raw_splits_metadata_and_dates() {
        let table = raw(
            &["country_code", "country_name", "04Jan2021", "2021-01-05"],
            &[&["CHL", " Chile ", "50", "NA"]],
        );
        let table = StringencyTable::from_raw(&table).unwrap();
        assert_eq!(table.codes(), ["CHL"]);
        assert_eq!(table.countries(), ["Chile"]);
        assert_eq!(table.dates(), [d(2021, 1, 4), d(2021, 1, 5)]);
        assert_eq!(table.value(0, 0), Some(50.0));
        assert_eq!(table.value(0, 1), None);
    }

    #[test]
    fn test_missing_metadata_is_schema_error() {
        let table = raw(&["country_name", "01Apr2021"], &[&["Chile", "50"]]);
        let err = StringencyTable::from_raw(&table).unwrap_err();
        assert!(matches!(err, ComputeError::SchemaError(_)));
    }

    #[test]
    fn test_duplicate_metadata_is_schema_error() {
        let table = raw(
            &["country_code", "region_code", "country_name", "04Jan2021"],
            &[&["CHL", "RM", "Chile", "50"]],
        );
        match StringencyTable::from_raw(&table).unwrap_err() {
            ComputeError::SchemaError(msg) => assert!(msg.contains("2 Code columns")),
            other => panic!("unexpected error: {other:?}"),
        }

        let table = raw(
            &["country_code", "country_name", "region_name", "04Jan2021"],
            &[&["CHL", "Chile", "Santiago", "50"]],
        );
        assert!(matches!(
            StringencyTable::from_raw(&table).unwrap_err(),
            ComputeError::SchemaError(_)
        ));
    }

    #[test]
    fn test_non_numeric_cell_is_parse_error() {
        let table = raw(
            &["country_code", "country_name", "01Apr2021"],
            &[&["CHL", "Chile", "high"]],
        );
        let err = StringencyTable::from_raw(&table).unwrap_err();
        assert!(matches!(err, ComputeError::ParseError(_)));
    }

    #[test]
    fn test_out_of_range_column_dropped() {
        let table = raw(
            &["country_code", "country_name", "15Mar2021", "05Apr2021"],
            &[&["CHL", "Chile", "40", "60"]],
        );
        let table = StringencyTable::from_raw(&table).unwrap();
        let context = context_for(d(2021, 4, 1), d(2021, 4, 30));

        let bucketed = table.relabel(&context);
        assert_eq!(bucketed.columns.len(), 1);
        assert_eq!(bucketed.columns[0].date, d(2021, 4, 5));
        assert!(bucketed.columns.iter().all(|c| c.date != d(2021, 3, 15)));
    }

    #[test]
    fn test_bucket_mean_fills_missing_with_zero_and_rounds() {
        let table = raw(
            &["country_code", "country_name", "04Jan2021", "05Jan2021", "06Jan2021"],
            &[
                &["CHL", "Chile", "50", "", "51"],
                &["PER", "Peru", "10", "11", "12"],
            ],
        );
        let table = StringencyTable::from_raw(&table).unwrap();
        let context = context_for(d(2021, 1, 4), d(2021, 1, 17));

        let means = table.relabel(&context).transpose().bucket_means();
        assert_eq!(means.len(), 1);
        assert_eq!(
            means[0].bucket,
            Bucket::pair(WeekYear::new(1, 2021), WeekYear::new(2, 2021))
        );
        // Chile: (50 + 0 + 51) / 3 = 33.67, Peru: 11
        assert_eq!(means[0].values, vec![34.0, 11.0]);
    }

    #[test]
    fn test_rounding_ties_to_even() {
        let table = raw(
            &["country_code", "country_name", "04Jan2021", "05Jan2021"],
            &[&["CHL", "Chile", "40", "41"], &["PER", "Peru", "41", "42"]],
        );
        let table = StringencyTable::from_raw(&table).unwrap();
        let context = context_for(d(2021, 1, 4), d(2021, 1, 17));

        let means = table.relabel(&context).transpose().bucket_means();
        // 40.5 → 40, 41.5 → 42
        assert_eq!(means[0].values, vec![40.0, 42.0]);
    }

    #[test]
    fn test_peak_tie_resolves_to_first_country() {
        let table = raw(
            &["country_code", "country_name", "04Jan2021"],
            &[
                &["CHL", "Chile", "30"],
                &["PER", "Peru", "70"],
                &["ARG", "Argentina", "70"],
            ],
        );
        let table = StringencyTable::from_raw(&table).unwrap();
        let context = context_for(d(2021, 1, 4), d(2021, 1, 17));

        let peaks = table.relabel(&context).transpose().peaks();
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].country, "Peru");
        assert_eq!(peaks[0].value, 70.0);
    }

    #[test]
    fn test_sunday_column_joins_its_week() {
        let table = raw(
            &["country_code", "country_name", "10Jan2021"],
            &[&["CHL", "Chile", "80"]],
        );
        let table = StringencyTable::from_raw(&table).unwrap();
        let context = context_for(d(2021, 1, 4), d(2021, 1, 17));

        let bucketed = table.relabel(&context);
        assert_eq!(bucketed.columns.len(), 1);
        assert_eq!(
            bucketed.columns[0].bucket,
            Bucket::pair(WeekYear::new(1, 2021), WeekYear::new(2, 2021))
        );
    }

    #[test]
    fn test_no_columns_in_range_is_empty() {
        let table = raw(
            &["country_code", "country_name", "04Jan2021"],
            &[&["CHL", "Chile", "30"]],
        );
        let table = StringencyTable::from_raw(&table).unwrap();
        let context = context_for(d(2021, 6, 1), d(2021, 6, 30));

        let bucketed = table.relabel(&context);
        assert!(bucketed.is_empty());
        assert!(bucketed.transpose().peaks().is_empty());
    }

    #[test]
    fn test_first_max() {
        assert_eq!(first_max(&[]), None);
        assert_eq!(first_max(&[1.0, 3.0, 3.0, 2.0]), Some((1, 3.0)));
        assert_eq!(first_max(&[0.0, 0.0]), Some((0, 0.0)));
    }
}
