//! Country-period clustering
//!
//! The clustering algorithm sits behind [`Clusterer`]; the pipeline only
//! hands over a numeric feature matrix and expects one integer label per
//! row back. [`HdbscanClusterer`] is the default implementation.
//!
//! Label -1 marks noise (a row not assigned to any group).

use hdbscan::{Hdbscan, HdbscanHyperParams};
use tracing::{debug, warn};

use crate::config::ClusteringConfig;
use crate::error::ComputeError;
use crate::types::{ClusteredRow, FeatureRow};

/// Label assigned to rows that belong to no cluster
pub const NOISE_LABEL: i32 = -1;

/// Trait for clustering collaborators
pub trait Clusterer {
    /// Assign one group label per feature row
    fn assign(&self, features: &[Vec<f32>]) -> Result<Vec<i32>, ComputeError>;
}

/// HDBSCAN over (optionally standardized) feature vectors
#[derive(Debug, Clone)]
pub struct HdbscanClusterer {
    min_cluster_size: usize,
    min_samples: usize,
    standardize: bool,
}

impl Default for HdbscanClusterer {
    fn default() -> Self {
        Self::from_config(&ClusteringConfig::default())
    }
}

impl HdbscanClusterer {
    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self {
            min_cluster_size: config.min_cluster_size,
            min_samples: config.min_samples,
            standardize: config.standardize,
        }
    }
}

impl Clusterer for HdbscanClusterer {
    fn assign(&self, features: &[Vec<f32>]) -> Result<Vec<i32>, ComputeError> {
        if features.len() < self.min_cluster_size {
            debug!(
                rows = features.len(),
                min_cluster_size = self.min_cluster_size,
                "too few rows to cluster; all rows are noise"
            );
            return Ok(vec![NOISE_LABEL; features.len()]);
        }

        let data = if self.standardize {
            standardize(features)
        } else {
            features.to_vec()
        };

        let hyper_params = HdbscanHyperParams::builder()
            .min_cluster_size(self.min_cluster_size)
            .min_samples(self.min_samples)
            .build();

        let clusterer = Hdbscan::new(&data, hyper_params);
        let labels = clusterer
            .cluster()
            .map_err(|e| ComputeError::ClusteringError(format!("{e:?}")))?;

        if labels.len() != features.len() {
            return Err(ComputeError::ClusteringError(format!(
                "expected {} labels, got {}",
                features.len(),
                labels.len()
            )));
        }
        Ok(labels)
    }
}

/// Z-score every feature column; constant columns become 0
pub fn standardize(features: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let Some(width) = features.first().map(Vec::len) else {
        return Vec::new();
    };
    let n = features.len() as f32;

    let stats: Vec<(f32, f32)> = (0..width)
        .map(|col| {
            let mean = features.iter().map(|row| row[col]).sum::<f32>() / n;
            let variance = features
                .iter()
                .map(|row| (row[col] - mean).powi(2))
                .sum::<f32>()
                / n;
            (mean, variance.sqrt())
        })
        .collect();

    features
        .iter()
        .map(|row| {
            row.iter()
                .zip(&stats)
                .map(|(value, (mean, std_dev))| {
                    if *std_dev > f32::EPSILON {
                        (value - mean) / std_dev
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Attach cluster labels to feature rows
pub fn assign_groups(
    rows: Vec<FeatureRow>,
    clusterer: &dyn Clusterer,
) -> Result<Vec<ClusteredRow>, ComputeError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let features: Vec<Vec<f32>> = rows.iter().map(FeatureRow::features).collect();
    let labels = clusterer.assign(&features)?;
    if labels.len() != rows.len() {
        return Err(ComputeError::ClusteringError(format!(
            "clusterer returned {} labels for {} rows",
            labels.len(),
            rows.len()
        )));
    }

    let noise = labels.iter().filter(|l| **l == NOISE_LABEL).count();
    if noise == labels.len() {
        warn!(rows = labels.len(), "no clusters found; every row is noise");
    }

    Ok(rows
        .into_iter()
        .zip(labels)
        .map(|(row, group)| ClusteredRow { row, group })
        .collect())
}
