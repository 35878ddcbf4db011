//! Schedule assembly: day and date bookkeeping for taper steps.
//!
//! The builder keeps a cursor (next day index and calendar date) and turns
//! each dose the engine emits into a numbered, dated [`TaperStep`] that
//! starts the day after the previous one ends.

use crate::dose::Dose;
use crate::engine::RetryReason;
use crate::types::{DoseSplit, Frequency, SpeedConfig, TaperPlan, TaperStep};
use chrono::{Datelike, Days, NaiveDate};

/// A step before it is placed on the calendar
#[derive(Clone, Debug)]
pub struct StepEntry {
    pub dose: Dose,
    pub duration_days: u32,
    pub frequency: Frequency,
    pub dose_split: DoseSplit,
    pub note: Option<String>,
    pub every_n_days: Option<u32>,
}

impl StepEntry {
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Places steps back to back starting from day 1 / the start date
#[derive(Debug)]
pub struct ScheduleBuilder {
    steps: Vec<TaperStep>,
    day: u32,
    date: NaiveDate,
    max_year: i32,
}

impl ScheduleBuilder {
    pub fn new(start_date: NaiveDate, max_year: i32) -> Self {
        Self {
            steps: Vec::new(),
            day: 1,
            date: start_date,
            max_year,
        }
    }

    /// Append a step at the cursor and advance it by the step's duration
    ///
    /// Fails with `DateRangeExceeded` when the step would end after
    /// `max_year` or the following step could not be dated.
    pub fn push(&mut self, entry: StepEntry) -> Result<&TaperStep, RetryReason> {
        let duration = entry.duration_days.max(1);

        let end_date = self
            .date
            .checked_add_days(Days::new(u64::from(duration - 1)))
            .ok_or(RetryReason::DateRangeExceeded)?;
        let next_date = self
            .date
            .checked_add_days(Days::new(u64::from(duration)))
            .ok_or(RetryReason::DateRangeExceeded)?;
        if end_date.year() > self.max_year {
            return Err(RetryReason::DateRangeExceeded);
        }
        let next_day = self
            .day
            .checked_add(duration)
            .ok_or(RetryReason::DateRangeExceeded)?;

        let step = TaperStep {
            number: self.steps.len() + 1,
            dose: entry.dose,
            duration_days: duration,
            start_day: self.day,
            end_day: next_day - 1,
            start_date: self.date,
            end_date,
            frequency: entry.frequency,
            dose_split: entry.dose_split,
            note: entry.note,
            every_n_days: entry.every_n_days,
        };

        tracing::trace!("Step {}: {} mg, {}", step.number, step.dose, step.label());

        self.day = next_day;
        self.date = next_date;
        self.steps.push(step);
        Ok(&self.steps[self.steps.len() - 1])
    }

    pub fn last_dose(&self) -> Option<Dose> {
        self.steps.last().map(|s| s.dose)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<TaperStep> {
        self.steps
    }
}

/// Wrap emitted steps into the immutable plan
pub fn assemble_plan(
    steps: Vec<TaperStep>,
    speed: Option<SpeedConfig>,
    warning: Option<String>,
) -> TaperPlan {
    let total_days = steps.last().map(|s| s.end_day).unwrap_or(0);
    TaperPlan {
        steps,
        total_days,
        speed,
        warning,
    }
}

impl TaperStep {
    /// Day range label, e.g. `Days 1–28`
    pub fn label(&self) -> String {
        if self.start_day == self.end_day {
            format!("Day {}", self.start_day)
        } else {
            format!("Days {}–{}", self.start_day, self.end_day)
        }
    }

    /// Week range label, e.g. `Weeks 1–4` or `Week 3`
    pub fn week_label(&self) -> String {
        let start_week = (self.start_day - 1) / 7 + 1;
        let end_week = (self.end_day - 1) / 7 + 1;
        if start_week == end_week {
            format!("Week {}", start_week)
        } else {
            format!("Weeks {}–{}", start_week, end_week)
        }
    }

    /// Days on which a dose is actually taken during this step
    pub fn dosing_days(&self) -> u32 {
        match self.every_n_days {
            Some(n) if n > 1 => self.duration_days.div_ceil(n),
            _ => self.duration_days,
        }
    }
}
