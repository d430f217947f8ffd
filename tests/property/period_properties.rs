use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use mobility_flux::aggregator::{Aggregator, MobilityAggregate};
use mobility_flux::calendar::{format_date, parse_date};
use mobility_flux::types::{MobilityMetrics, PeakStringency};
use mobility_flux::{Bucket, DateRange, MobilityRecord, PeriodMapper, WeekYear};
use proptest::prelude::*;

fn origin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 12, 1).unwrap()
}

/// Daily rows starting at `start`, keeping day `i` when `keep[i]` is set
fn daily_rows(start: i64, keep: &[bool]) -> Vec<MobilityRecord> {
    keep.iter()
        .enumerate()
        .filter(|(_, kept)| **kept)
        .map(|(i, _)| MobilityRecord {
            country: "Chile".to_string(),
            sub_region: None,
            date: format_date(origin() + Duration::days(start + i as i64)),
            metrics: MobilityMetrics {
                parks: Some(i as f64),
                ..Default::default()
            },
        })
        .collect()
}

fn range(from: i64, len: i64) -> DateRange {
    DateRange::new(origin() + Duration::days(from), origin() + Duration::days(from + len))
}

proptest! {
    #[test]
    fn buckets_hold_two_weeks_except_the_last(
        start in 0i64..800,
        keep in prop::collection::vec(any::<bool>(), 0..120),
        from in 0i64..900,
        len in 0i64..150,
    ) {
        let mapping = PeriodMapper::map(&daily_rows(start, &keep), range(from, len)).unwrap();
        let buckets = mapping.context.buckets();
        for (i, bucket) in buckets.iter().enumerate() {
            if i + 1 < buckets.len() {
                prop_assert!(bucket.second.is_some(), "bucket {} is a single", bucket);
            }
        }
    }

    #[test]
    fn every_week_belongs_to_exactly_one_bucket(
        start in 0i64..800,
        keep in prop::collection::vec(any::<bool>(), 0..120),
        from in 0i64..900,
        len in 0i64..150,
    ) {
        let mapping = PeriodMapper::map(&daily_rows(start, &keep), range(from, len)).unwrap();
        let mut seen: HashMap<WeekYear, usize> = HashMap::new();
        for bucket in mapping.context.buckets() {
            for week in bucket.weeks() {
                *seen.entry(week).or_default() += 1;
            }
        }
        prop_assert!(seen.values().all(|count| *count == 1));

        for record in &mapping.records {
            prop_assert_eq!(mapping.context.bucket_for_week(record.week_year), Some(record.bucket));
            prop_assert_eq!(mapping.context.bucket_for_date(record.date), Some(record.bucket));
        }
    }

    #[test]
    fn retained_rows_are_in_range_and_never_sundays(
        start in 0i64..800,
        keep in prop::collection::vec(any::<bool>(), 0..120),
        from in 0i64..900,
        len in 0i64..150,
    ) {
        let selected = range(from, len);
        let rows = daily_rows(start, &keep);
        let mapping = PeriodMapper::map(&rows, selected).unwrap();

        for record in &mapping.records {
            prop_assert!(selected.contains(record.date));
            prop_assert_ne!(record.date.weekday(), Weekday::Sun);
        }

        let expected = rows
            .iter()
            .map(|r| parse_date(&r.date).unwrap())
            .filter(|d| selected.contains(*d) && d.weekday() != Weekday::Sun)
            .count();
        prop_assert_eq!(mapping.records.len(), expected);
    }

    #[test]
    fn mapping_is_deterministic(
        start in 0i64..800,
        keep in prop::collection::vec(any::<bool>(), 0..60),
        from in 0i64..900,
        len in 0i64..90,
    ) {
        let rows = daily_rows(start, &keep);
        let first = PeriodMapper::map(&rows, range(from, len)).unwrap();
        let second = PeriodMapper::map(&rows, range(from, len)).unwrap();
        prop_assert_eq!(first.records, second.records);
        prop_assert_eq!(first.context, second.context);
    }

    #[test]
    fn iso_dates_round_trip(offset in 0i64..20_000) {
        let date = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + Duration::days(offset);
        let text = format_date(date);
        prop_assert_eq!(parse_date(&text).unwrap(), date);
        prop_assert_eq!(format_date(parse_date(&text).unwrap()), text);
    }

    #[test]
    fn merge_is_an_inner_join(
        mobility_keys in prop::collection::btree_set((0u8..5, 1u32..20), 0..30),
        peak_buckets in prop::collection::btree_map(1u32..20, 0u8..5, 0..15),
    ) {
        let country = |c: u8| format!("country-{c}");
        let bucket = |w: u32| Bucket::single(WeekYear::new(w, 2021));

        let aggregates: Vec<MobilityAggregate> = mobility_keys
            .iter()
            .map(|(c, w)| MobilityAggregate {
                country: country(*c),
                bucket: bucket(*w),
                metrics: [Some(1.0), None, Some(2.0), None, Some(3.0), None],
                days: 1,
            })
            .collect();
        let peaks: Vec<PeakStringency> = peak_buckets
            .iter()
            .map(|(w, c)| PeakStringency {
                bucket: bucket(*w),
                country: country(*c),
                value: f64::from(*w),
            })
            .collect();

        let merged = Aggregator::merge(&aggregates, &peaks);

        let expected: BTreeSet<(String, u32)> = mobility_keys
            .iter()
            .filter(|(c, w)| peak_buckets.get(w) == Some(c))
            .map(|(c, w)| (country(*c), *w))
            .collect();
        let actual: BTreeSet<(String, u32)> = merged
            .iter()
            .map(|row| (row.country.clone(), row.bucket.first.week))
            .collect();

        prop_assert_eq!(merged.len(), expected.len());
        prop_assert_eq!(actual, expected);
        for row in &merged {
            prop_assert_eq!(row.stringency_value, f64::from(row.bucket.first.week));
            prop_assert_eq!(row.metrics, [1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        }
    }
}
