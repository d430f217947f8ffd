//! Aggregation and merge
//!
//! Reduces the bucketed mobility rows to one row per (country, bucket) and
//! joins them with the per-bucket peak stringency. The join is an inner join
//! on (country, bucket): a mobility row only survives when its country is the
//! one holding the peak in that bucket.

use std::collections::HashMap;

use tracing::info;

use crate::types::{Bucket, BucketedRecord, FeatureRow, PeakStringency, METRIC_COUNT};

/// Mean mobility metrics of one (country, bucket) group
#[derive(Debug, Clone, PartialEq)]
pub struct MobilityAggregate {
    pub country: String,
    pub bucket: Bucket,
    /// `None` when every value in the group was missing
    pub metrics: [Option<f64>; METRIC_COUNT],
    pub days: usize,
}

#[derive(Default)]
struct MetricAccumulator {
    sums: [f64; METRIC_COUNT],
    counts: [usize; METRIC_COUNT],
    days: usize,
}

impl MetricAccumulator {
    fn add(&mut self, values: [Option<f64>; METRIC_COUNT]) {
        for (i, value) in values.into_iter().enumerate() {
            if let Some(v) = value {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
        self.days += 1;
    }

    fn means(&self) -> [Option<f64>; METRIC_COUNT] {
        std::array::from_fn(|i| (self.counts[i] > 0).then(|| self.sums[i] / self.counts[i] as f64))
    }
}

/// Aggregator for merging mobility and stringency into feature rows
pub struct Aggregator;

impl Aggregator {
    /// Mean of each metric per (country, bucket), ordered by country then bucket
    pub fn aggregate_mobility(records: &[BucketedRecord]) -> Vec<MobilityAggregate> {
        let mut groups: HashMap<(String, Bucket), MetricAccumulator> = HashMap::new();

        for record in records {
            groups
                .entry((record.country.clone(), record.bucket))
                .or_default()
                .add(record.metrics.to_array());
        }

        let mut aggregates: Vec<MobilityAggregate> = groups
            .into_iter()
            .map(|((country, bucket), acc)| MobilityAggregate {
                country,
                bucket,
                metrics: acc.means(),
                days: acc.days,
            })
            .collect();
        aggregates.sort_by(|a, b| a.country.cmp(&b.country).then(a.bucket.cmp(&b.bucket)));
        aggregates
    }

    /// Inner join on (country, bucket); remaining missing values become 0
    pub fn merge(mobility: &[MobilityAggregate], peaks: &[PeakStringency]) -> Vec<FeatureRow> {
        let peak_index: HashMap<(&str, Bucket), f64> = peaks
            .iter()
            .map(|p| ((p.country.as_str(), p.bucket), p.value))
            .collect();

        let rows: Vec<FeatureRow> = mobility
            .iter()
            .filter_map(|agg| {
                let value = *peak_index.get(&(agg.country.as_str(), agg.bucket))?;
                Some(FeatureRow {
                    country: agg.country.clone(),
                    bucket: agg.bucket,
                    stringency_value: if value.is_nan() { 0.0 } else { value },
                    metrics: agg.metrics.map(|m| m.unwrap_or(0.0)),
                })
            })
            .collect();

        info!(
            mobility_groups = mobility.len(),
            peak_buckets = peaks.len(),
            merged = rows.len(),
            "merged mobility with peak stringency"
        );
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MobilityMetrics, WeekYear};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn bucket(first: u32) -> Bucket {
        Bucket::pair(WeekYear::new(first, 2021), WeekYear::new(first + 1, 2021))
    }

    fn make_bucketed(country: &str, b: Bucket, day: u32, retail: Option<f64>) -> BucketedRecord {
        BucketedRecord {
            country: country.to_string(),
            date: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            week_year: b.first,
            bucket: b,
            metrics: MobilityMetrics {
                retail_recreation: retail,
                parks: Some(day as f64),
                ..Default::default()
            },
        }
    }

    fn peak(country: &str, b: Bucket, value: f64) -> PeakStringency {
        PeakStringency {
            bucket: b,
            country: country.to_string(),
            value,
        }
    }

    #[test]
    fn test_mobility_mean_skips_missing_values() {
        let records = vec![
            make_bucketed("Chile", bucket(1), 4, Some(-10.0)),
            make_bucketed("Chile", bucket(1), 5, None),
            make_bucketed("Chile", bucket(1), 6, Some(-20.0)),
        ];

        let aggregates = Aggregator::aggregate_mobility(&records);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].days, 3);
        assert_eq!(aggregates[0].metrics[0], Some(-15.0));
        assert_eq!(aggregates[0].metrics[2], Some(5.0));
        assert_eq!(aggregates[0].metrics[1], None);
    }

    #[test]
    fn test_mobility_groups_ordered_by_country_then_bucket() {
        let records = vec![
            make_bucketed("Peru", bucket(3), 18, Some(1.0)),
            make_bucketed("Chile", bucket(3), 18, Some(1.0)),
            make_bucketed("Chile", bucket(1), 4, Some(1.0)),
        ];

        let keys: Vec<(String, Bucket)> = Aggregator::aggregate_mobility(&records)
            .into_iter()
            .map(|a| (a.country, a.bucket))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Chile".to_string(), bucket(1)),
                ("Chile".to_string(), bucket(3)),
                ("Peru".to_string(), bucket(3)),
            ]
        );
    }

    #[test]
    fn test_merge_keeps_only_peak_holders() {
        let records = vec![
            make_bucketed("Chile", bucket(1), 4, Some(-10.0)),
            make_bucketed("Peru", bucket(1), 4, Some(-30.0)),
            make_bucketed("Chile", bucket(3), 18, Some(-5.0)),
        ];
        let aggregates = Aggregator::aggregate_mobility(&records);
        let peaks = vec![peak("Peru", bucket(1), 80.0), peak("Chile", bucket(3), 60.0)];

        let rows = Aggregator::merge(&aggregates, &peaks);
        let keys: Vec<(&str, Bucket, f64)> = rows
            .iter()
            .map(|r| (r.country.as_str(), r.bucket, r.stringency_value))
            .collect();
        assert_eq!(
            keys,
            vec![("Chile", bucket(3), 60.0), ("Peru", bucket(1), 80.0)]
        );
    }

    #[test]
    fn test_merge_fills_missing_metrics_with_zero() {
        let records = vec![make_bucketed("Chile", bucket(1), 4, None)];
        let aggregates = Aggregator::aggregate_mobility(&records);
        let rows = Aggregator::merge(&aggregates, &[peak("Chile", bucket(1), 50.0)]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metrics, [0.0, 0.0, 4.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_merge_of_empty_inputs() {
        assert!(Aggregator::merge(&[], &[]).is_empty());
        let records = vec![make_bucketed("Chile", bucket(1), 4, Some(1.0))];
        let aggregates = Aggregator::aggregate_mobility(&records);
        assert!(Aggregator::merge(&aggregates, &[]).is_empty());
    }
}
