//! Biweekly period mapping
//!
//! Derives a bucket for every mobility row inside the selected range:
//! dates are stamped with their ISO week, Sundays are dropped, and the
//! distinct (week, week-year) keys are paired positionally in order of
//! first appearance. The resulting lookups are frozen in a [`PeriodContext`]
//! that later stages read from.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::calendar::{parse_date, IsoStamp};
use crate::error::ComputeError;
use crate::types::{Bucket, BucketedRecord, DateRange, MobilityRecord, WeekYear};

/// Immutable date/bucket lookups produced by one mapping run
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodContext {
    range: DateRange,
    buckets: Vec<Bucket>,
    week_to_bucket: HashMap<WeekYear, Bucket>,
    date_to_week: HashMap<NaiveDate, WeekYear>,
}

impl PeriodContext {
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Buckets in order of first appearance
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn week_to_bucket(&self) -> &HashMap<WeekYear, Bucket> {
        &self.week_to_bucket
    }

    pub fn date_to_week(&self) -> &HashMap<NaiveDate, WeekYear> {
        &self.date_to_week
    }

    pub fn bucket_for_week(&self, week_year: WeekYear) -> Option<Bucket> {
        self.week_to_bucket.get(&week_year).copied()
    }

    /// Bucket a calendar date falls into.
    ///
    /// Dates outside the range never map. Dates inside the range that were
    /// not retained from the mobility data (Sundays, missing days) map
    /// through their own ISO week.
    pub fn bucket_for_date(&self, date: NaiveDate) -> Option<Bucket> {
        if !self.range.contains(date) {
            return None;
        }
        let week_year = self
            .date_to_week
            .get(&date)
            .copied()
            .unwrap_or_else(|| IsoStamp::of(date).week_year());
        self.bucket_for_week(week_year)
    }

    /// `week_year → bucket` with string keys, sorted chronologically
    pub fn bucket_labels(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(&WeekYear, &Bucket)> = self.week_to_bucket.iter().collect();
        entries.sort_by_key(|(week, _)| **week);
        entries
            .into_iter()
            .map(|(week, bucket)| (week.to_string(), bucket.label()))
            .collect()
    }

    /// [`Self::bucket_labels`] as a pretty-printed JSON object
    pub fn bucket_labels_json(&self) -> Result<String, ComputeError> {
        let dictionary: serde_json::Map<String, serde_json::Value> = self
            .bucket_labels()
            .into_iter()
            .map(|(week, bucket)| (week, serde_json::Value::String(bucket)))
            .collect();
        Ok(serde_json::to_string_pretty(&dictionary)?)
    }
}

/// Output of the period mapper
#[derive(Debug, Clone)]
pub struct PeriodMapping {
    pub records: Vec<BucketedRecord>,
    pub context: PeriodContext,
}

/// Mapper from daily mobility rows onto biweekly buckets
pub struct PeriodMapper;

impl PeriodMapper {
    /// Map records inside `range` onto biweekly buckets
    pub fn map(records: &[MobilityRecord], range: DateRange) -> Result<PeriodMapping, ComputeError> {
        let mut stamped: Vec<(&MobilityRecord, NaiveDate, WeekYear)> = Vec::new();
        let mut sundays = 0usize;

        for record in records {
            let date = parse_date(&record.date)?;
            if !range.contains(date) {
                continue;
            }
            let stamp = IsoStamp::of(date);
            if stamp.is_sunday() {
                sundays += 1;
                continue;
            }
            stamped.push((record, date, stamp.week_year()));
        }

        let ordered_weeks = first_seen_unique(stamped.iter().map(|(_, _, week)| *week));
        let buckets = pair_weeks(&ordered_weeks);

        let week_to_bucket: HashMap<WeekYear, Bucket> = buckets
            .iter()
            .flat_map(|bucket| bucket.weeks().map(move |week| (week, *bucket)))
            .collect();

        let mut date_to_week = HashMap::new();
        let mut bucketed = Vec::with_capacity(stamped.len());
        for (record, date, week_year) in stamped {
            date_to_week.insert(date, week_year);
            let Some(bucket) = week_to_bucket.get(&week_year).copied() else {
                continue;
            };
            bucketed.push(BucketedRecord {
                country: record.country.clone(),
                date,
                week_year,
                bucket,
                metrics: record.metrics,
            });
        }

        debug!(sundays_dropped = sundays, "stamped mobility rows");
        info!(
            range = %range,
            rows = bucketed.len(),
            weeks = ordered_weeks.len(),
            buckets = buckets.len(),
            "mapped mobility rows onto biweekly buckets"
        );

        Ok(PeriodMapping {
            records: bucketed,
            context: PeriodContext {
                range,
                buckets,
                week_to_bucket,
                date_to_week,
            },
        })
    }
}

/// Distinct values in order of first appearance
fn first_seen_unique<I>(weeks: I) -> Vec<WeekYear>
where
    I: IntoIterator<Item = WeekYear>,
{
    let mut seen = HashSet::new();
    weeks.into_iter().filter(|week| seen.insert(*week)).collect()
}

/// Pair keys positionally (0 with 1, 2 with 3, ...); a trailing key stands alone
pub fn pair_weeks(weeks: &[WeekYear]) -> Vec<Bucket> {
    weeks
        .chunks(2)
        .map(|chunk| match *chunk {
            [first, second] => Bucket::pair(first, second),
            [first] => Bucket::single(first),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}
