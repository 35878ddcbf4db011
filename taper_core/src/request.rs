//! Taper requests and raw input parsing.

use crate::dose::Dose;
use crate::types::{FinalHold, FrequencyPreference};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Everything needed to plan one taper
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaperRequest {
    /// Starting medication (case-insensitive)
    pub medication: String,
    /// Starting daily dose of `medication` in mg
    pub dose_mg: f64,
    /// Speed Ladder label to start from
    pub speed: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub frequency: FrequencyPreference,
    #[serde(default)]
    pub final_hold: Option<FinalHold>,
    /// Diazepam tablet strengths to use instead of the catalog's
    #[serde(default)]
    pub strengths: Option<Vec<Dose>>,
}

impl TaperRequest {
    pub fn new(medication: &str, dose_mg: f64, speed: &str, start_date: NaiveDate) -> Self {
        Self {
            medication: medication.into(),
            dose_mg,
            speed: speed.into(),
            start_date,
            frequency: FrequencyPreference::Auto,
            final_hold: None,
            strengths: None,
        }
    }

    pub fn with_frequency(mut self, frequency: FrequencyPreference) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_final_hold(mut self, hold_days: u32, every_n_days: u32) -> Self {
        self.final_hold = Some(FinalHold {
            hold_days,
            every_n_days,
        });
        self
    }

    pub fn with_strengths(mut self, strengths: Vec<Dose>) -> Self {
        self.strengths = Some(strengths);
        self
    }

    /// Reject malformed input before any computation
    pub fn validate(&self) -> Result<()> {
        if self.medication.trim().is_empty() {
            return Err(Error::InvalidInput("Medication name is empty".into()));
        }

        if !self.dose_mg.is_finite() || self.dose_mg <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Starting dose must be a positive number of mg, got {}",
                self.dose_mg
            )));
        }
        if self.dose_mg > Dose::MAX.mg() {
            return Err(Error::InvalidInput(format!(
                "Starting dose {} mg exceeds the {} mg limit",
                self.dose_mg,
                Dose::MAX
            )));
        }

        if let Some(hold) = self.final_hold {
            if hold.hold_days == 0 || hold.every_n_days == 0 {
                return Err(Error::InvalidInput(format!(
                    "Final hold needs positive days and cadence, got {} days every {} days",
                    hold.hold_days, hold.every_n_days
                )));
            }
        }

        if let Some(ref strengths) = self.strengths {
            if strengths.is_empty() {
                return Err(Error::InvalidInput("Tablet strength list is empty".into()));
            }
            if let Some(bad) = strengths.iter().find(|s| !s.is_positive()) {
                return Err(Error::InvalidInput(format!(
                    "Tablet strengths must be positive, got {} mg",
                    bad
                )));
            }
        }

        Ok(())
    }
}

/// Parse a `YYYY-MM-DD` start date
pub fn parse_start_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        Error::InvalidInput(format!(
            "Invalid date format: {}. Use YYYY-MM-DD format.",
            input
        ))
    })
}
