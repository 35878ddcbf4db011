//! Core domain types for the taper planner.
//!
//! This module defines the fundamental types used throughout the system:
//! - Taper speeds (the Speed Ladder entries)
//! - Dosing frequencies and administration times
//! - Pill combinations and daily dose splits
//! - Taper steps and the assembled plan

use crate::dose::{Dose, Tablets};
use crate::Error;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Speed Ladder
// ============================================================================

/// One rung of the Speed Ladder: cut `percent_reduction` every `interval_days`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeedConfig {
    pub label: String,
    pub percent_reduction: f64,
    pub interval_days: u32,
}

impl SpeedConfig {
    pub fn new(label: &str, percent_reduction: f64, interval_days: u32) -> Self {
        Self {
            label: label.into(),
            percent_reduction,
            interval_days,
        }
    }
}

// ============================================================================
// Frequency Types
// ============================================================================

/// How many times per day the dose is taken
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Once,
    Bid,
    Tid,
}

impl Frequency {
    pub const fn parts(self) -> u32 {
        match self {
            Frequency::Once => 1,
            Frequency::Bid => 2,
            Frequency::Tid => 3,
        }
    }

    /// Administration times used at this frequency, in fixed order
    pub fn times(self) -> &'static [AdminTime] {
        match self {
            Frequency::Once => &[AdminTime::Am],
            Frequency::Bid => &[AdminTime::Am, AdminTime::Pm],
            Frequency::Tid => &[AdminTime::Am, AdminTime::Pm, AdminTime::Hs],
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Bid => "bid",
            Frequency::Tid => "tid",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller preference for the dosing frequency
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum FrequencyPreference {
    /// Pick the fewest daily administrations that reproduce the dose exactly
    #[default]
    Auto,
    Fixed(Frequency),
}

impl FromStr for FrequencyPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(FrequencyPreference::Auto),
            "once" | "qd" => Ok(FrequencyPreference::Fixed(Frequency::Once)),
            "bid" => Ok(FrequencyPreference::Fixed(Frequency::Bid)),
            "tid" => Ok(FrequencyPreference::Fixed(Frequency::Tid)),
            other => Err(Error::InvalidInput(format!(
                "Unknown dosing frequency '{}' (expected auto, once, bid or tid)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for FrequencyPreference {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrequencyPreference> for String {
    fn from(pref: FrequencyPreference) -> Self {
        match pref {
            FrequencyPreference::Auto => "auto".into(),
            FrequencyPreference::Fixed(freq) => freq.as_str().into(),
        }
    }
}

/// Daily administration time slot
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminTime {
    Am,
    Pm,
    Hs,
}

impl AdminTime {
    pub const fn as_str(self) -> &'static str {
        match self {
            AdminTime::Am => "AM",
            AdminTime::Pm => "PM",
            AdminTime::Hs => "HS",
        }
    }
}

impl fmt::Display for AdminTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Pill Combinations
// ============================================================================

/// Tablets of a single strength
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PillEntry {
    pub strength: Dose,
    pub tablets: Tablets,
}

/// Tablet counts per strength, strongest first
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PillCombination {
    pub entries: Vec<PillEntry>,
}

impl PillCombination {
    /// Add tablets of `strength`, merging with an existing entry
    pub fn add(&mut self, strength: Dose, tablets: Tablets) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.strength == strength) {
            entry.tablets = entry.tablets + tablets;
        } else {
            self.entries.push(PillEntry { strength, tablets });
            self.entries.sort_by(|a, b| b.strength.cmp(&a.strength));
        }
    }

    pub fn tablets_of(&self, strength: Dose) -> Option<Tablets> {
        self.entries
            .iter()
            .find(|e| e.strength == strength)
            .map(|e| e.tablets)
    }

    /// Total in half-hundredths of a milligram (exact even with half tablets)
    fn total_half_hundredths(&self) -> i64 {
        self.entries
            .iter()
            .map(|e| e.strength.hundredths() * i64::from(e.tablets.halves()))
            .sum()
    }

    /// Total rounded to the 0.01 mg grid, an exact half-hundredth going to
    /// the even neighbour
    fn total_hundredths(&self) -> i64 {
        let halves = self.total_half_hundredths();
        let hundredths = halves.div_euclid(2);
        if halves % 2 != 0 && hundredths % 2 != 0 {
            hundredths + 1
        } else {
            hundredths
        }
    }

    /// Whether the combination reproduces `dose` once its total is rounded
    /// to the 0.01 mg grid
    pub fn reconstructs(&self, dose: Dose) -> bool {
        self.total_hundredths() == dose.hundredths()
    }

    /// Reconstructed milligram total
    pub fn total_mg(&self) -> f64 {
        self.total_half_hundredths() as f64 / 200.0
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The part of a daily dose taken at one administration time
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TimedDose {
    pub time: AdminTime,
    pub dose: Dose,
    pub combination: PillCombination,
}

/// A daily dose split across administration times (AM, PM, HS order)
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DoseSplit {
    pub doses: Vec<TimedDose>,
}

impl DoseSplit {
    pub fn total(&self) -> Dose {
        self.doses.iter().map(|d| d.dose).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedDose> {
        self.doses.iter()
    }
}

// ============================================================================
// Plan Types
// ============================================================================

/// Optional trailing period at the minimum dose, taken every N days
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalHold {
    pub hold_days: u32,
    pub every_n_days: u32,
}

/// One contiguous block of days at a fixed daily dose
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TaperStep {
    pub number: usize,
    pub dose: Dose,
    pub duration_days: u32,
    pub start_day: u32,
    pub end_day: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub frequency: Frequency,
    pub dose_split: DoseSplit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Set on the final hold step: dose is taken every N days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every_n_days: Option<u32>,
}

/// The assembled taper schedule
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TaperPlan {
    pub steps: Vec<TaperStep>,
    pub total_days: u32,
    /// Speed that produced the steps (absent when no speed succeeded)
    pub speed: Option<SpeedConfig>,
    pub warning: Option<String>,
}

impl TaperPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn final_dose(&self) -> Option<Dose> {
        self.steps.last().map(|s| s.dose)
    }
}
