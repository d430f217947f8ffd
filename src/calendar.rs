//! Calendar helpers
//!
//! Date parsing for the two accepted source formats and ISO-8601 week stamps.

use chrono::{Datelike, NaiveDate};

use crate::error::ComputeError;
use crate::types::WeekYear;

/// Primary date format (`2021-01-04`)
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Fallback date format used by stringency column headers (`04Dec2020`)
pub const COMPACT_DATE_FORMAT: &str = "%d%b%Y";

/// Parse a date in `YYYY-MM-DD`, falling back to `DDMmmYYYY`.
pub fn parse_date(input: &str) -> Result<NaiveDate, ComputeError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, ISO_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, COMPACT_DATE_FORMAT))
        .map_err(|_| ComputeError::DateFormatError(input.to_string()))
}

/// Format a date back to `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

/// ISO-8601 calendar values of a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsoStamp {
    pub week: u32,
    /// 1 = Monday .. 7 = Sunday
    pub weekday: u32,
    /// ISO week-year, may differ from the calendar year around New Year
    pub year: i32,
}

impl IsoStamp {
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            week: iso.week(),
            weekday: date.weekday().number_from_monday(),
            year: iso.year(),
        }
    }

    pub fn is_sunday(&self) -> bool {
        self.weekday == 7
    }

    pub fn week_year(&self) -> WeekYear {
        WeekYear::new(self.week, self.year)
    }
}
