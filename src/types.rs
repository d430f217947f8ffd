//! Core types for the Mobility Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw mobility records, ISO week keys and biweekly buckets, the
//! aggregated feature rows and their clustered form.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of mobility metrics carried per row
pub const METRIC_COUNT: usize = 6;

/// Percent-change-from-baseline mobility metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MobilityMetrics {
    /// Retail and recreation (%)
    pub retail_recreation: Option<f64>,
    /// Grocery and pharmacy (%)
    pub grocery_pharmacy: Option<f64>,
    /// Parks (%)
    pub parks: Option<f64>,
    /// Transit stations (%)
    pub transit: Option<f64>,
    /// Workplaces (%)
    pub workplaces: Option<f64>,
    /// Residential (%)
    pub residential: Option<f64>,
}

impl MobilityMetrics {
    /// Output column names, in feature order
    pub const NAMES: [&'static str; METRIC_COUNT] = [
        "retail_recreation",
        "grocery_pharmacy",
        "parks",
        "transit",
        "workplaces",
        "residential",
    ];

    pub fn to_array(&self) -> [Option<f64>; METRIC_COUNT] {
        [
            self.retail_recreation,
            self.grocery_pharmacy,
            self.parks,
            self.transit,
            self.workplaces,
            self.residential,
        ]
    }
}

/// One row of the daily mobility report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityRecord {
    /// Country name (normalized after the normalizer stage)
    pub country: String,
    /// First non-empty of sub-region 1, sub-region 2 and metro area; `None` for national rows
    pub sub_region: Option<String>,
    /// Date as it appears in the source (YYYY-MM-DD)
    pub date: String,
    pub metrics: MobilityMetrics,
}

/// Untyped table as handed over by the reader: a header row plus string cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Cell at (row, column); short rows read as empty cells
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// ISO-8601 (week, week-year) key
///
/// Ordering is chronological: week-year first, then week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekYear {
    pub year: i32,
    pub week: u32,
}

impl WeekYear {
    pub fn new(week: u32, year: i32) -> Self {
        Self { year, week }
    }
}

impl fmt::Display for WeekYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Biweekly aggregation period: two consecutive week keys, or a trailing single week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bucket {
    pub first: WeekYear,
    pub second: Option<WeekYear>,
}

impl Bucket {
    pub fn pair(first: WeekYear, second: WeekYear) -> Self {
        Self {
            first,
            second: Some(second),
        }
    }

    pub fn single(first: WeekYear) -> Self {
        Self {
            first,
            second: None,
        }
    }

    /// Week keys covered by this bucket
    pub fn weeks(&self) -> impl Iterator<Item = WeekYear> {
        std::iter::once(self.first).chain(self.second)
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.second {
            Some(second) => write!(f, "{}/{}", self.first, second),
            None => write!(f, "{}", self.first),
        }
    }
}

/// Inclusive calendar range selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Create a range; bounds given in reverse order are swapped.
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { from: a, to: b }
        } else {
            Self { from: b, to: a }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Intersection with another range, `None` when disjoint
    pub fn clamp_to(&self, span: &DateRange) -> Option<DateRange> {
        let from = self.from.max(span.from);
        let to = self.to.min(span.to);
        (from <= to).then_some(DateRange { from, to })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// Mobility row after date filtering and bucket annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketedRecord {
    pub country: String,
    pub date: NaiveDate,
    pub week_year: WeekYear,
    pub bucket: Bucket,
    pub metrics: MobilityMetrics,
}

/// Highest stringency value within a bucket and the country that attained it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakStringency {
    pub bucket: Bucket,
    pub country: String,
    pub value: f64,
}

/// Aggregated (country, bucket) row, ready for clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub country: String,
    pub bucket: Bucket,
    pub stringency_value: f64,
    pub metrics: [f64; METRIC_COUNT],
}

impl FeatureRow {
    /// Numeric feature vector: stringency value followed by the six metrics
    pub fn features(&self) -> Vec<f32> {
        std::iter::once(self.stringency_value)
            .chain(self.metrics.iter().copied())
            .map(|v| v as f32)
            .collect()
    }
}

/// Feature row with its assigned cluster group (-1 for noise)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteredRow {
    #[serde(flatten)]
    pub row: FeatureRow,
    pub group: i32,
}
