//! Taper engine: dose trajectory generation over the Speed Ladder.
//!
//! This module implements the schedule-generation logic:
//! - Convert the starting dose to diazepam equivalents
//! - Reduce by the speed's percentage every interval, snapped to the tablet grid
//! - Escalate to the next faster speed when a schedule needs too many steps
//!   or runs off the calendar
//! - Close with a plateau at the minimum dose and an optional final hold

use crate::catalog::{get_default_catalog, Catalog, DIAZEPAM};
use crate::config::{Config, EngineSettings};
use crate::dose::Dose;
use crate::equivalency::convert_to_diazepam;
use crate::pills::split_dose;
use crate::request::TaperRequest;
use crate::schedule::{assemble_plan, ScheduleBuilder, StepEntry};
use crate::types::{FinalHold, FrequencyPreference, SpeedConfig, TaperPlan, TaperStep};
use crate::{Error, Result};
use chrono::NaiveDate;
use std::fmt;

/// Why a single attempt at one speed was abandoned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryReason {
    /// More reduction steps than `max_steps`
    TooManySteps,
    /// A step would end past `max_year` or outside the calendar
    DateRangeExceeded,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::TooManySteps => f.write_str("too many steps"),
            RetryReason::DateRangeExceeded => f.write_str("date range exceeded"),
        }
    }
}

/// Result of trying one rung of the Speed Ladder
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Vec<TaperStep>),
    Retryable(RetryReason),
    /// No rung left to try
    Exhausted,
}

/// Everything about a schedule except the starting dose and speed
#[derive(Clone, Debug)]
pub struct ScheduleOptions {
    pub start_date: NaiveDate,
    pub frequency: FrequencyPreference,
    pub final_hold: Option<FinalHold>,
    /// Tablet strengths the dose is built from
    pub strengths: Vec<Dose>,
}

/// Generates taper plans from injected reference tables and settings
#[derive(Clone, Debug)]
pub struct TaperEngine {
    catalog: Catalog,
    settings: EngineSettings,
}

impl Default for TaperEngine {
    fn default() -> Self {
        Self {
            catalog: get_default_catalog().clone(),
            settings: EngineSettings::default(),
        }
    }
}

impl TaperEngine {
    /// Create an engine, rejecting an invalid catalog
    pub fn new(catalog: Catalog, settings: EngineSettings) -> Result<Self> {
        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::CatalogValidation(errors.join("; ")));
        }
        Ok(Self { catalog, settings })
    }

    /// Engine over the default tables with `config` overrides applied
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = get_default_catalog().with_overrides(config);
        let settings = config.engine_settings()?;
        Self::new(catalog, settings)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Build the taper plan for a request
    ///
    /// Input problems fail immediately. Running out of speeds is not an
    /// error: the plan comes back empty with a warning.
    pub fn plan(&self, request: &TaperRequest) -> Result<TaperPlan> {
        request.validate()?;

        let start_dose = convert_to_diazepam(request.dose_mg, &request.medication, &self.catalog)?;
        let speed_index = self.catalog.speed_index(&request.speed)?;

        let strengths = match request.strengths {
            Some(ref strengths) => strengths.clone(),
            None => self
                .catalog
                .strengths_for(DIAZEPAM)
                .map(<[Dose]>::to_vec)
                .ok_or_else(|| Error::CatalogValidation("No diazepam tablet strengths".into()))?,
        };

        tracing::info!(
            "Planning taper: {} mg {} = {} mg diazepam at '{}' speed",
            request.dose_mg,
            request.medication,
            start_dose,
            request.speed
        );

        let options = ScheduleOptions {
            start_date: request.start_date,
            frequency: request.frequency,
            final_hold: request.final_hold,
            strengths,
        };
        self.generate_schedule(start_dose, speed_index, &options)
    }

    /// Run the Speed Ladder from `speed_index` for a diazepam-equivalent dose
    pub fn generate_schedule(
        &self,
        start_dose: Dose,
        speed_index: usize,
        options: &ScheduleOptions,
    ) -> Result<TaperPlan> {
        if !start_dose.is_positive() {
            return Err(Error::InvalidInput(format!(
                "Starting dose must be positive, got {} mg",
                start_dose
            )));
        }
        if start_dose > Dose::MAX {
            return Err(Error::InvalidInput(format!(
                "Starting dose {} mg exceeds the {} mg limit",
                start_dose,
                Dose::MAX
            )));
        }
        if start_dose < self.settings.min_dose {
            return Err(Error::InvalidInput(format!(
                "Starting dose {} mg is below the minimum dose {} mg",
                start_dose, self.settings.min_dose
            )));
        }
        if speed_index >= self.catalog.speeds.len() {
            return Err(Error::InvalidInput(format!(
                "Speed index {} outside ladder of {} speeds",
                speed_index,
                self.catalog.speeds.len()
            )));
        }

        let mut index = speed_index;
        let mut warning = None;

        loop {
            match self.attempt(start_dose, index, options) {
                AttemptOutcome::Success(steps) => {
                    let speed = self.catalog.speeds[index].clone();
                    tracing::info!(
                        "Generated {} steps at '{}' speed",
                        steps.len(),
                        speed.label
                    );
                    return Ok(assemble_plan(steps, Some(speed), warning));
                }
                AttemptOutcome::Retryable(reason) => {
                    tracing::debug!(
                        "Speed '{}' abandoned: {}",
                        self.catalog.speeds[index].label,
                        reason
                    );
                    index += 1;
                    if let Some(next) = self.catalog.speeds.get(index) {
                        let message = self.escalation_warning(next, reason);
                        tracing::warn!("{}", message);
                        warning = Some(message);
                    }
                }
                AttemptOutcome::Exhausted => {
                    let message = self.exhausted_warning();
                    tracing::warn!("{}", message);
                    return Ok(assemble_plan(Vec::new(), None, Some(message)));
                }
            }
        }
    }

    /// Try one rung of the ladder
    fn attempt(&self, start_dose: Dose, index: usize, options: &ScheduleOptions) -> AttemptOutcome {
        let Some(speed) = self.catalog.speeds.get(index) else {
            return AttemptOutcome::Exhausted;
        };

        match self.trajectory(start_dose, speed, options) {
            Ok(steps) => AttemptOutcome::Success(steps),
            Err(reason) => AttemptOutcome::Retryable(reason),
        }
    }

    fn trajectory(
        &self,
        start_dose: Dose,
        speed: &SpeedConfig,
        options: &ScheduleOptions,
    ) -> std::result::Result<Vec<TaperStep>, RetryReason> {
        let min_dose = self.settings.min_dose;
        let mut builder = ScheduleBuilder::new(options.start_date, self.settings.max_year);
        let mut dose = start_dose;
        let mut step_count = 0;

        while dose > min_dose {
            step_count += 1;
            if step_count > self.settings.max_steps {
                return Err(RetryReason::TooManySteps);
            }

            builder.push(self.entry(dose, speed.interval_days, options))?;
            dose = self.next_dose(dose, speed.percent_reduction);
        }

        if builder.last_dose() != Some(min_dose) {
            builder.push(
                self.entry(min_dose, speed.interval_days, options)
                    .with_note("final daily dose"),
            )?;
        }

        if let Some(hold) = options.final_hold {
            let mut entry = self
                .entry(min_dose, hold.hold_days, options)
                .with_note(format!("final hold every {} days", hold.every_n_days));
            entry.every_n_days = Some(hold.every_n_days);
            builder.push(entry)?;
        }

        Ok(builder.into_steps())
    }

    /// Next dose on the rounding grid, always strictly below `dose`
    fn next_dose(&self, dose: Dose, percent: f64) -> Dose {
        let EngineSettings {
            min_dose, round_to, ..
        } = self.settings;

        let reduced = dose.reduce_by_percent(percent, round_to).max(min_dose);
        if reduced < dose {
            return reduced;
        }

        // Percentage cut smaller than half a grid unit: step down one unit
        let below = dose.grid_below(round_to);
        if below > min_dose {
            below
        } else {
            min_dose
        }
    }

    fn entry(&self, dose: Dose, duration_days: u32, options: &ScheduleOptions) -> StepEntry {
        let (dose_split, frequency) = split_dose(dose, &options.strengths, options.frequency);
        StepEntry {
            dose,
            duration_days,
            frequency,
            dose_split,
            note: None,
            every_n_days: None,
        }
    }

    fn escalation_warning(&self, next: &SpeedConfig, reason: RetryReason) -> String {
        match reason {
            RetryReason::TooManySteps => format!(
                "Auto-accelerated taper to '{}' to remain ≤ {} steps.",
                next.label, self.settings.max_steps
            ),
            RetryReason::DateRangeExceeded => format!(
                "Auto-accelerated taper to '{}' to finish by the end of {}.",
                next.label, self.settings.max_year
            ),
        }
    }

    fn exhausted_warning(&self) -> String {
        let fastest = self
            .catalog
            .speeds
            .last()
            .map(|s| s.label.as_str())
            .unwrap_or("fastest");
        format!(
            "Used fastest speed ('{}') but the schedule still exceeds {} steps or runs past {}; no schedule generated.",
            fastest, self.settings.max_steps, self.settings.max_year
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dose::Tablets;
    use crate::types::Frequency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(med: &str, dose_mg: f64, speed: &str) -> TaperRequest {
        TaperRequest::new(med, dose_mg, speed, date(2025, 7, 15))
    }

    fn assert_well_formed(plan: &TaperPlan) {
        for step in &plan.steps {
            assert_eq!(step.end_day - step.start_day + 1, step.duration_days);
            assert_eq!(
                (step.end_date - step.start_date).num_days() + 1,
                i64::from(step.duration_days)
            );
            assert_eq!(step.dose_split.total(), step.dose);
        }
        for pair in plan.steps.windows(2) {
            assert!(pair[1].dose <= pair[0].dose);
            assert_eq!(pair[1].start_day, pair[0].end_day + 1);
            assert_eq!(pair[1].start_date, pair[0].end_date.succ_opt().unwrap());
        }
        if let Some(last) = plan.steps.last() {
            assert_eq!(plan.total_days, last.end_day);
        }
    }

    #[test]
    fn test_slow_taper_from_twenty_mg() {
        let engine = TaperEngine::default();
        let plan = engine.plan(&request("diazepam", 20.0, "slow")).unwrap();

        assert!(plan.warning.is_none());
        assert_eq!(plan.speed.as_ref().unwrap().label, "slow");
        assert_well_formed(&plan);

        for pair in plan.steps.windows(2) {
            assert!(pair[1].dose < pair[0].dose, "doses must strictly decrease");
        }
        for step in &plan.steps {
            assert_eq!(step.dose.hundredths() % 50, 0, "{} not on 0.5 grid", step.dose);
            assert_eq!(step.duration_days, 28);
        }
        assert_eq!(plan.final_dose(), Some(Dose::from_mg(0.5)));
        assert_eq!(plan.steps[0].dose, Dose::from_mg(20.0));
        assert_eq!(plan.steps[1].dose, Dose::from_mg(19.5));
    }

    #[test]
    fn test_clonazepam_request_converts_first() {
        let engine = TaperEngine::default();
        let plan = engine.plan(&request("Clonazepam", 1.0, "fast")).unwrap();
        assert_eq!(plan.steps[0].dose, Dose::from_mg(20.0));
        assert_well_formed(&plan);
    }

    #[test]
    fn test_escalates_when_too_many_steps() {
        crate::logging::init_test();
        let engine = TaperEngine::default();
        let plan = engine.plan(&request("diazepam", 200.0, "standard")).unwrap();

        let speed = plan.speed.as_ref().unwrap();
        assert_ne!(speed.label, "standard");
        let warning = plan.warning.as_deref().unwrap();
        assert!(warning.contains(&format!("'{}'", speed.label)));
        assert!(plan.steps.len() <= 52);
        assert_eq!(plan.final_dose(), Some(Dose::from_mg(0.5)));
        assert_well_formed(&plan);
    }

    #[test]
    fn test_escalates_when_past_max_year() {
        let engine = TaperEngine::default();
        let req = TaperRequest::new("diazepam", 20.0, "slow", date(2099, 6, 1));
        let plan = engine.plan(&req).unwrap();

        assert_ne!(plan.speed.as_ref().unwrap().label, "slow");
        assert!(plan.warning.as_deref().unwrap().contains("2100"));
        assert!(plan.steps.last().unwrap().end_date <= date(2100, 12, 31));
        assert_well_formed(&plan);
    }

    #[test]
    fn test_ladder_exhausted_returns_empty_plan() {
        let engine = TaperEngine::default();
        let req = TaperRequest::new("diazepam", 20.0, "slow", date(2100, 12, 1));
        let plan = engine.plan(&req).unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.total_days, 0);
        assert!(plan.speed.is_none());
        assert!(plan.warning.as_deref().unwrap().contains("ultra fast"));
    }

    #[test]
    fn test_final_hold_appended() {
        let engine = TaperEngine::default();
        let req = request("diazepam", 10.0, "fast").with_final_hold(6, 3);
        let plan = engine.plan(&req).unwrap();
        assert_well_formed(&plan);

        let n = plan.steps.len();
        let plateau = &plan.steps[n - 2];
        let hold = &plan.steps[n - 1];
        assert_eq!(plateau.dose, Dose::from_mg(0.5));
        assert_eq!(hold.dose, Dose::from_mg(0.5));
        assert_eq!(hold.duration_days, 6);
        assert_eq!(hold.every_n_days, Some(3));
        assert!(hold.note.as_deref().unwrap().contains("every 3 days"));
        assert_eq!(plan.total_days, hold.end_day);
    }

    #[test]
    fn test_plateau_not_duplicated() {
        let engine = TaperEngine::default();
        let plan = engine.plan(&request("diazepam", 2.0, "ultra fast")).unwrap();
        let at_min = plan
            .steps
            .iter()
            .filter(|s| s.dose == Dose::from_mg(0.5))
            .count();
        assert_eq!(at_min, 1);
        assert_eq!(plan.steps.last().unwrap().note.as_deref(), Some("final daily dose"));
    }

    #[test]
    fn test_start_at_min_dose_is_single_plateau() {
        let engine = TaperEngine::default();
        let plan = engine.plan(&request("diazepam", 0.5, "standard")).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.total_days, 21);
    }

    #[test]
    fn test_small_dose_slow_speed_terminates() {
        // 2.5% of a few mg rounds back to the same dose; must still step down
        let engine = TaperEngine::default();
        let plan = engine.plan(&request("diazepam", 4.0, "slow")).unwrap();
        let doses: Vec<f64> = plan.steps.iter().map(|s| s.dose.mg()).collect();
        assert_eq!(doses, vec![4.0, 3.5, 3.0, 2.5, 2.0, 1.5, 1.0, 0.5]);
    }

    #[test]
    fn test_off_grid_start_never_rises() {
        let engine = TaperEngine::default();
        // 7.45 * 0.975 = 7.26 rounds up to 7.5; must go down to 7.0 instead
        let plan = engine.plan(&request("diazepam", 7.45, "slow")).unwrap();
        assert_eq!(plan.steps[1].dose, Dose::from_mg(7.0));
        assert_well_formed(&plan);
    }

    #[test]
    fn test_strength_override() {
        let engine = TaperEngine::default();
        let req = request("diazepam", 7.0, "fast").with_strengths(vec![Dose::from_mg(1.0)]);
        let plan = engine.plan(&req).unwrap();
        let first = &plan.steps[0].dose_split.doses[0].combination;
        assert_eq!(first.tablets_of(Dose::from_mg(1.0)), Some(Tablets::whole(7)));
    }

    #[test]
    fn test_fixed_frequency_applies_to_every_step() {
        let engine = TaperEngine::default();
        let req = request("diazepam", 10.0, "fast")
            .with_frequency(FrequencyPreference::Fixed(Frequency::Bid));
        let plan = engine.plan(&req).unwrap();
        assert!(plan.steps.iter().all(|s| s.frequency == Frequency::Bid));
        assert!(plan.steps.iter().all(|s| s.dose_split.doses.len() == 2));
    }

    #[test]
    fn test_identical_inputs_identical_plans() {
        let engine = TaperEngine::default();
        let req = request("alprazolam", 3.0, "standard").with_final_hold(6, 3);
        let a = serde_json::to_string(&engine.plan(&req).unwrap()).unwrap();
        let b = serde_json::to_string(&engine.plan(&req).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_input_errors() {
        let engine = TaperEngine::default();
        assert!(matches!(
            engine.plan(&request("zolpidem", 10.0, "slow")),
            Err(Error::UnknownMedication(_))
        ));
        assert!(matches!(
            engine.plan(&request("diazepam", -1.0, "slow")),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            engine.plan(&request("diazepam", 10.0, "warp")),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            engine.plan(&request("diazepam", 0.25, "slow")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_oversized_doses_rejected() {
        let engine = TaperEngine::default();
        assert!(matches!(
            engine.plan(&request("diazepam", 3.0e10, "ultra fast")),
            Err(Error::InvalidInput(_))
        ));
        // within the raw bound, but not once converted
        assert!(matches!(
            engine.plan(&request("alprazolam", 9000.0, "ultra fast")),
            Err(Error::InvalidInput(_))
        ));

        let options = ScheduleOptions {
            start_date: date(2025, 7, 15),
            frequency: FrequencyPreference::Auto,
            final_hold: None,
            strengths: vec![Dose::from_mg(10.0)],
        };
        assert!(matches!(
            engine.generate_schedule(Dose::from_hundredths(i64::MAX), 4, &options),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_largest_accepted_dose_plans() {
        let engine = TaperEngine::default();
        let plan = engine
            .plan(&request("diazepam", Dose::MAX.mg(), "ultra fast"))
            .unwrap();
        assert_eq!(plan.steps[0].dose, Dose::MAX);
        assert_well_formed(&plan);
    }

    #[test]
    fn test_halfway_reduction_rounds_to_even() {
        let engine = TaperEngine::default();
        let plan = engine.plan(&request("diazepam", 15.0, "standard")).unwrap();
        let doses: Vec<f64> = plan.steps.iter().take(4).map(|s| s.dose.mg()).collect();
        assert_eq!(doses, vec![15.0, 14.0, 13.5, 13.0]);
        assert_well_formed(&plan);
    }

    #[test]
    fn test_engine_rejects_invalid_catalog() {
        let mut catalog = get_default_catalog().clone();
        catalog.speeds.clear();
        assert!(matches!(
            TaperEngine::new(catalog, EngineSettings::default()),
            Err(Error::CatalogValidation(_))
        ));
    }

    #[test]
    fn test_custom_ladder_from_config() {
        let mut config = Config::default();
        config.speeds.ladder = Some(vec![SpeedConfig::new("halving", 50.0, 7)]);
        let engine = TaperEngine::from_config(&config).unwrap();

        let plan = engine.plan(&request("diazepam", 8.0, "halving")).unwrap();
        let doses: Vec<f64> = plan.steps.iter().map(|s| s.dose.mg()).collect();
        assert_eq!(doses, vec![8.0, 4.0, 2.0, 1.0, 0.5]);
        assert_eq!(plan.total_days, 35);
    }
}
