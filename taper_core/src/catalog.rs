//! Reference tables: potency ratios, tablet strengths and the Speed Ladder.
//!
//! The built-in tables are built once and shared. Callers needing different
//! strengths or speeds get an owned copy through [`Catalog::with_overrides`],
//! so one request's overrides never leak into another.

use crate::config::Config;
use crate::dose::Dose;
use crate::types::SpeedConfig;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Medication every plan is expressed in
pub const DIAZEPAM: &str = "diazepam";

/// Cached default catalog - built once and reused across all requests
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog_internal);

/// Immutable reference tables used by the taper engine
#[derive(Clone, Debug)]
pub struct Catalog {
    /// Milligrams of each medication equivalent to 10 mg diazepam, keyed lowercase
    pub potency: BTreeMap<String, Dose>,
    /// Available tablet strengths per medication, keyed lowercase
    pub strengths: BTreeMap<String, Vec<Dose>>,
    /// Speed Ladder, gentlest first
    pub speeds: Vec<SpeedConfig>,
}

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog
///
/// **Note**: prefer `get_default_catalog()` unless an owned copy is needed.
pub fn build_default_catalog() -> Catalog {
    build_default_catalog_internal()
}

fn build_default_catalog_internal() -> Catalog {
    let potency = [
        ("alprazolam", 0.5),
        ("clonazepam", 0.5),
        ("lorazepam", 1.0),
        ("temazepam", 10.0),
        ("oxazepam", 15.0),
        ("chlordiazepoxide", 25.0),
        (DIAZEPAM, 10.0),
    ]
    .into_iter()
    .map(|(name, mg)| (name.to_string(), Dose::from_mg(mg)))
    .collect();

    let strengths = [
        (DIAZEPAM, vec![10.0, 5.0, 2.0]),
        ("clonazepam", vec![2.0, 1.0, 0.5]),
        ("alprazolam", vec![2.0, 1.0, 0.5, 0.25]),
    ]
    .into_iter()
    .map(|(name, mgs)| {
        (
            name.to_string(),
            mgs.into_iter().map(Dose::from_mg).collect(),
        )
    })
    .collect();

    let speeds = vec![
        SpeedConfig::new("slow", 2.5, 28),
        SpeedConfig::new("standard", 5.0, 21),
        SpeedConfig::new("fast", 10.0, 14),
        SpeedConfig::new("very fast", 15.0, 14),
        SpeedConfig::new("ultra fast", 20.0, 7),
    ];

    Catalog {
        potency,
        strengths,
        speeds,
    }
}

impl Catalog {
    /// Copy of this catalog with the strength and ladder overrides from `config`
    pub fn with_overrides(&self, config: &Config) -> Catalog {
        let mut catalog = self.clone();

        for (med, strengths) in &config.strengths {
            tracing::debug!("Overriding {} strengths: {:?}", med, strengths);
            catalog
                .strengths
                .insert(med.to_lowercase(), strengths.clone());
        }

        if let Some(ref ladder) = config.speeds.ladder {
            tracing::debug!("Using configured speed ladder ({} speeds)", ladder.len());
            catalog.speeds = ladder.clone();
        }

        catalog
    }

    /// Potency entry for a medication (case-insensitive)
    pub fn potency_of(&self, medication: &str) -> Option<Dose> {
        self.potency.get(&medication.to_lowercase()).copied()
    }

    /// Medication names known to the potency table
    pub fn medications(&self) -> impl Iterator<Item = &str> {
        self.potency.keys().map(String::as_str)
    }

    /// Tablet strengths for a medication (case-insensitive)
    pub fn strengths_for(&self, medication: &str) -> Option<&[Dose]> {
        self.strengths
            .get(&medication.to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn speeds(&self) -> &[SpeedConfig] {
        &self.speeds
    }

    /// Position of a speed label in the ladder
    pub fn speed_index(&self, label: &str) -> Result<usize> {
        let wanted = label.trim().to_lowercase();
        self.speeds
            .iter()
            .position(|s| s.label == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = self.speeds.iter().map(|s| s.label.as_str()).collect();
                Error::InvalidInput(format!(
                    "Unknown taper speed '{}' (expected one of: {})",
                    label,
                    known.join(", ")
                ))
            })
    }

    /// Validate the catalog structure
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (med, mg) in &self.potency {
            if med.is_empty() {
                errors.push("Potency table has empty medication name".to_string());
            }
            if !mg.is_positive() {
                errors.push(format!("Potency for '{}' must be positive, got {}", med, mg));
            }
        }
        if !self.potency.contains_key(DIAZEPAM) {
            errors.push("Potency table has no diazepam entry".to_string());
        }

        for (med, strengths) in &self.strengths {
            if strengths.is_empty() {
                errors.push(format!("Medication '{}' has no tablet strengths", med));
            }
            for strength in strengths {
                if !strength.is_positive() {
                    errors.push(format!(
                        "Medication '{}' has non-positive strength {}",
                        med, strength
                    ));
                }
            }
        }
        if !self.strengths.contains_key(DIAZEPAM) {
            errors.push("No diazepam tablet strengths configured".to_string());
        }

        if self.speeds.is_empty() {
            errors.push("Speed ladder is empty".to_string());
        }
        for (i, speed) in self.speeds.iter().enumerate() {
            if speed.label.is_empty() {
                errors.push(format!("Speed #{} has empty label", i + 1));
            }
            if speed.label != speed.label.to_lowercase() {
                errors.push(format!("Speed label '{}' must be lowercase", speed.label));
            }
            if !(speed.percent_reduction > 0.0 && speed.percent_reduction <= 100.0) {
                errors.push(format!(
                    "Speed '{}': percent reduction {} outside (0, 100]",
                    speed.label, speed.percent_reduction
                ));
            }
            if speed.interval_days == 0 {
                errors.push(format!("Speed '{}': interval must be positive", speed.label));
            }
            if self.speeds[..i].iter().any(|s| s.label == speed.label) {
                errors.push(format!("Duplicate speed label '{}'", speed.label));
            }
        }

        errors
    }
}
