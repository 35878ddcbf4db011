//! Text and record views of a taper plan.
//!
//! Patient instructions, the EHR summary line, pharmacy orders (with CSV
//! export) and tablet totals. All of these only read the plan.

use crate::dose::Dose;
use crate::types::{AdminTime, TaperPlan, TaperStep};
use crate::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// ASAM 2025 benzodiazepine tapering guideline
pub const GUIDELINE_URL: &str = "https://downloads.asam.org/sitefinity-production-blobs/docs/default-source/guidelines/benzodiazepine-tapering-2025/bzd-tapering-document---final-approved-version-for-distribution-02-28-25.pdf?sfvrsn=5bdf9c81_4";

/// One dispensing line for the pharmacy
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PharmacyOrder {
    pub date: String,
    pub product: String,
    pub sig: String,
    pub dispense_quantity: u32,
    pub days: u32,
}

impl PharmacyOrder {
    pub fn dispense_line(&self) -> String {
        format!(
            "Disp: {} tablets for {} days",
            self.dispense_quantity, self.days
        )
    }
}

fn time_phrase(time: AdminTime) -> &'static str {
    match time {
        AdminTime::Am => "in the morning",
        AdminTime::Pm => "in the afternoon",
        AdminTime::Hs => "in the evening",
    }
}

/// Line-oriented instructions for the patient
pub fn patient_instructions(plan: &TaperPlan) -> Vec<String> {
    let mut lines = vec![
        "⚠️  Do not alter this schedule without prescriber approval.".to_string(),
        "📆  Benzodiazepine taper plan".to_string(),
        String::new(),
        format!("Guideline reference: {}", GUIDELINE_URL),
    ];

    for step in &plan.steps {
        lines.push(format!(
            "{} ({} → {}):",
            step.label(),
            step.start_date.format("%b %d %Y"),
            step.end_date.format("%b %d %Y")
        ));
        for timed in step.dose_split.iter() {
            let tablets: Vec<String> = timed
                .combination
                .entries
                .iter()
                .map(|e| format!("{} × {} mg", e.tablets, e.strength))
                .collect();
            lines.push(format!("  • {}: {}", timed.time, tablets.join(" + ")));
        }
        if let Some(ref note) = step.note {
            lines.push(format!("  → {}", note));
        }
    }

    lines.push(String::new());
    lines.push("Report withdrawal symptoms to your provider immediately.".to_string());
    lines
}

/// One-sentence summary for the EHR
pub fn ehr_summary(plan: &TaperPlan) -> String {
    let (Some(last), Some(speed)) = (plan.steps.last(), plan.speed.as_ref()) else {
        return format!(
            "No diazepam taper generated: {}",
            plan.warning.as_deref().unwrap_or("no steps")
        );
    };

    format!(
        "Diazepam taper: {} steps over {} days at '{}' speed ({}% every {} days), \
         ending at {} mg daily (Feb 28 2025 guideline). Ref: {}",
        plan.steps.len(),
        plan.total_days,
        speed.label,
        speed.percent_reduction,
        speed.interval_days,
        last.dose,
        GUIDELINE_URL
    )
}

fn step_orders(step: &TaperStep) -> impl Iterator<Item = PharmacyOrder> + '_ {
    let date = step.start_date.format("%B %d %Y").to_string();
    let dosing_days = step.dosing_days();

    step.dose_split.iter().flat_map(move |timed| {
        let date = date.clone();
        timed.combination.entries.iter().map(move |entry| {
            let mut sig = format!(
                "Take {} tablet{} by mouth {}",
                entry.tablets,
                if entry.tablets.is_single() { "" } else { "s" },
                time_phrase(timed.time)
            );
            if let Some(n) = step.every_n_days {
                sig.push_str(&format!(" every {} days", n));
            }

            PharmacyOrder {
                date: date.clone(),
                product: format!("Diazepam {} mg tablet", entry.strength),
                sig: format!("Sig: {}", sig),
                dispense_quantity: entry.tablets.dispensed() * dosing_days,
                days: step.duration_days,
            }
        })
    })
}

/// Pharmacy orders, one per step, administration time and strength
pub fn pharmacy_orders(plan: &TaperPlan) -> Vec<PharmacyOrder> {
    plan.steps.iter().flat_map(step_orders).collect()
}

/// Whole tablets needed per strength across the plan
///
/// Half tablets count as a whole tablet dispensed.
pub fn pill_totals(plan: &TaperPlan) -> BTreeMap<Dose, u32> {
    let mut totals = BTreeMap::new();
    for step in &plan.steps {
        let dosing_days = step.dosing_days();
        for timed in step.dose_split.iter() {
            for entry in &timed.combination.entries {
                *totals.entry(entry.strength).or_insert(0) +=
                    entry.tablets.dispensed() * dosing_days;
            }
        }
    }
    totals
}

/// Write pharmacy orders to a CSV file with headers
///
/// Returns the number of orders written.
pub fn write_pharmacy_orders_csv(orders: &[PharmacyOrder], path: &Path) -> Result<usize> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    for order in orders {
        writer.serialize(order)?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} pharmacy orders to {:?}", orders.len(), path);
    Ok(orders.len())
}
