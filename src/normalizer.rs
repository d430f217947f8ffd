//! Country normalization
//!
//! This module aligns mobility-report country names with the stringency report:
//! - Territories without comparable coverage are excluded
//! - Known spelling differences are mapped onto the stringency naming
//! - Optionally, sub-regional rows are dropped

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::NormalizationConfig;
use crate::types::MobilityRecord;

/// Countries dropped before any further processing
pub const EXCLUDED_COUNTRIES: [&str; 7] = [
    "Antigua and Barbuda",
    "Aruba",
    "Liechtenstein",
    "North Macedonia",
    "Puerto Rico",
    "Réunion",
    "Taiwan",
];

/// Mobility-report name → stringency-report name
pub const COUNTRY_ALIASES: [(&str, &str); 6] = [
    ("The Bahamas", "Bahamas"),
    ("Côte d'Ivoire", "Cote d'Ivoire"),
    ("Czechia", "Czech Republic"),
    ("Guinea-Bissau", "Guinea"),
    ("Kyrgyzstan", "Kyrgyz Republic"),
    ("Slovakia", "Slovak Republic"),
];

/// Normalizer for mobility country names
#[derive(Debug, Clone)]
pub struct Normalizer {
    excluded: HashSet<String>,
    aliases: HashMap<String, String>,
    national_only: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizationConfig::default(), false)
    }
}

impl Normalizer {
    /// Build a normalizer from the fixed tables plus configured additions
    pub fn new(config: &NormalizationConfig, national_only: bool) -> Self {
        let mut excluded: HashSet<String> =
            EXCLUDED_COUNTRIES.iter().map(|c| c.to_string()).collect();
        excluded.extend(config.extra_exclusions.iter().cloned());

        let mut aliases: HashMap<String, String> = COUNTRY_ALIASES
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        aliases.extend(
            config
                .extra_aliases
                .iter()
                .map(|(from, to)| (from.clone(), to.clone())),
        );

        Self {
            excluded,
            aliases,
            national_only,
        }
    }

    /// Canonical name for a country, `None` if it is excluded
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.excluded.contains(name) {
            return None;
        }
        Some(self.aliases.get(name).map(String::as_str).unwrap_or(name))
    }

    /// Normalize records, dropping excluded countries
    pub fn normalize(&self, records: Vec<MobilityRecord>) -> Vec<MobilityRecord> {
        let before = records.len();

        let normalized: Vec<MobilityRecord> = records
            .into_iter()
            .filter(|r| !(self.national_only && is_sub_regional(r)))
            .filter_map(|mut record| {
                let canonical = self.canonical_name(&record.country)?.to_string();
                record.country = canonical;
                Some(record)
            })
            .collect();

        debug!(
            kept = normalized.len(),
            dropped = before - normalized.len(),
            "normalized mobility countries"
        );
        normalized
    }
}

fn is_sub_regional(record: &MobilityRecord) -> bool {
    record
        .sub_region
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty())
}
