#![forbid(unsafe_code)]

//! Core domain model and schedule engine for the benzodiazepine taper planner.
//!
//! This crate provides:
//! - Fixed-point dose and tablet quantities
//! - Reference tables (potency ratios, tablet strengths, Speed Ladder)
//! - Diazepam-equivalent conversion
//! - Pill combination and dosing frequency solver
//! - Taper engine with automatic speed escalation
//! - Schedule assembly and plan formatters

pub mod dose;
pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod equivalency;
pub mod pills;
pub mod request;
pub mod schedule;
pub mod engine;
pub mod present;

// Re-export commonly used types
pub use error::{Error, Result};
pub use dose::{Dose, Tablets};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, Catalog};
pub use config::{Config, EngineSettings};
pub use equivalency::convert_to_diazepam;
pub use pills::{can_achieve, even_split, get_combination, split_dose};
pub use request::{parse_start_date, TaperRequest};
pub use engine::{ScheduleOptions, TaperEngine};
pub use present::{
    ehr_summary, patient_instructions, pharmacy_orders, pill_totals, write_pharmacy_orders_csv,
    PharmacyOrder,
};
