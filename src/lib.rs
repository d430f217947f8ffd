//! Mobility Flux - Biweekly mobility and stringency clustering
//!
//! Flux relates daily community-mobility reports to government-response
//! stringency through a deterministic pipeline: country normalization →
//! biweekly period mapping → stringency relabelling and peak reduction →
//! aggregation and merge → clustering → sheet output.
//!
//! ## Modules
//!
//! - **Inputs**: [`reader`] for the two CSV reports, [`normalizer`] for country names
//! - **Periods**: [`calendar`] and [`period`] for ISO-week biweekly buckets
//! - **Reduction**: [`stringency`] and [`aggregator`] for per-bucket tables
//! - **Output**: [`cluster`] for group labels, [`writer`] for the result sheet

pub mod aggregator;
pub mod calendar;
pub mod cluster;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod period;
pub mod pipeline;
pub mod reader;
pub mod stringency;
pub mod types;
pub mod writer;

pub use cluster::{Clusterer, HdbscanClusterer, NOISE_LABEL};
pub use config::FluxConfig;
pub use error::ComputeError;
pub use period::{PeriodContext, PeriodMapper};
pub use pipeline::{mobility_to_clusters, resolve_range, MobilityPipeline, RunOutcome};
pub use types::{Bucket, ClusteredRow, DateRange, FeatureRow, MobilityRecord, WeekYear};

/// Flux version reported by the CLI
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name logged at the start of every pipeline run
pub const PRODUCER_NAME: &str = "mobility-flux";
