//! Pipeline orchestration
//!
//! This module provides the public API for Mobility Flux.
//! It orchestrates the full run from the two raw reports to clustered
//! country-period rows.

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::cluster::{assign_groups, Clusterer, HdbscanClusterer};
use crate::config::{ClusteringConfig, FluxConfig};
use crate::error::ComputeError;
use crate::normalizer::Normalizer;
use crate::period::PeriodMapper;
use crate::stringency::StringencyTable;
use crate::types::{Bucket, ClusteredRow, DateRange, MobilityRecord, RawTable};
use crate::PRODUCER_NAME;

/// Result of one pipeline run
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub range: DateRange,
    /// Buckets of the run in order of first appearance
    pub buckets: Vec<Bucket>,
    pub rows: Vec<ClusteredRow>,
    /// Set when the range produced no data; `rows` is then empty
    pub notice: Option<ComputeError>,
}

impl RunOutcome {
    fn empty(run_id: Uuid, range: DateRange, buckets: Vec<Bucket>) -> Self {
        warn!(%run_id, range = %range, "no stringency data for the selected period");
        Self {
            run_id,
            range,
            buckets,
            rows: Vec::new(),
            notice: Some(ComputeError::EmptyRangeError {
                from: range.from,
                to: range.to,
            }),
        }
    }
}

/// Convert the two raw reports into clustered rows with the default clusterer.
///
/// # Example
/// ```ignore
/// let outcome = mobility_to_clusters(records, &stringency, range)?;
/// for row in &outcome.rows {
///     println!("{} {} {}", row.row.country, row.row.bucket, row.group);
/// }
/// ```
pub fn mobility_to_clusters(
    records: Vec<MobilityRecord>,
    stringency: &RawTable,
    range: DateRange,
) -> Result<RunOutcome, ComputeError> {
    let pipeline = MobilityPipeline::default();
    let clusterer = HdbscanClusterer::from_config(pipeline.clustering());
    pipeline.run(records, stringency, range, &clusterer)
}

/// Config-driven pipeline.
///
/// Pipeline stages:
/// 1. Normalizer - Align country names, drop excluded countries
/// 2. PeriodMapper - Assign biweekly buckets, freeze the period context
/// 3. StringencyTable - Validate and relabel date columns into buckets
/// 4. Transpose + peaks - Peak stringency country per bucket
/// 5. Aggregator - Mobility means per (country, bucket), inner join with peaks
/// 6. Clusterer - One group label per row
#[derive(Debug, Clone)]
pub struct MobilityPipeline {
    normalizer: Normalizer,
    clustering: ClusteringConfig,
}

impl Default for MobilityPipeline {
    fn default() -> Self {
        Self::new(&FluxConfig::default())
    }
}

impl MobilityPipeline {
    pub fn new(config: &FluxConfig) -> Self {
        Self {
            normalizer: Normalizer::new(&config.normalization, config.mobility.national_only),
            clustering: config.clustering.clone(),
        }
    }

    pub fn clustering(&self) -> &ClusteringConfig {
        &self.clustering
    }

    /// Run every stage for the given range
    pub fn run(
        &self,
        records: Vec<MobilityRecord>,
        stringency: &RawTable,
        range: DateRange,
        clusterer: &dyn Clusterer,
    ) -> Result<RunOutcome, ComputeError> {
        let run_id = Uuid::new_v4();
        info!(
            producer = PRODUCER_NAME,
            %run_id,
            range = %range,
            mobility_rows = records.len(),
            "starting run"
        );

        // Stage 1: country alignment
        let normalized = self.normalizer.normalize(records);

        // Stage 2: period mapping
        let mapping = PeriodMapper::map(&normalized, range)?;
        let buckets = mapping.context.buckets().to_vec();

        // Stage 3: stringency validation and relabelling
        let table = StringencyTable::from_raw(stringency)?;
        let relabelled = table.relabel(&mapping.context);
        if mapping.context.is_empty() || relabelled.is_empty() {
            return Ok(RunOutcome::empty(run_id, range, buckets));
        }

        // Stage 4: peak stringency per bucket
        let peaks = relabelled.transpose().peaks();

        // Stage 5: mobility means and merge
        let aggregates = Aggregator::aggregate_mobility(&mapping.records);
        let merged = Aggregator::merge(&aggregates, &peaks);

        // Stage 6: clustering
        let rows = assign_groups(merged, clusterer)?;

        info!(%run_id, rows = rows.len(), buckets = buckets.len(), "run complete");
        Ok(RunOutcome {
            run_id,
            range,
            buckets,
            rows,
            notice: None,
        })
    }
}

/// Resolve the user's bounds against the span of available data.
///
/// Missing bounds default to the span ends, reversed bounds are swapped and
/// the result is clamped to the span.
pub fn resolve_range(
    span: DateRange,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DateRange, ComputeError> {
    let requested = DateRange::new(from.unwrap_or(span.from), to.unwrap_or(span.to));
    requested
        .clamp_to(&span)
        .ok_or(ComputeError::EmptyRangeError {
            from: requested.from,
            to: requested.to,
        })
}
