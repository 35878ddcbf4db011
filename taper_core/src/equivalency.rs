//! Diazepam-equivalent dose conversion.

use crate::catalog::{Catalog, DIAZEPAM};
use crate::dose::Dose;
use crate::{Error, Result};

/// Convert a dose of `medication` into diazepam-equivalent milligrams
///
/// The potency table stores the milligrams of each drug equivalent to 10 mg
/// diazepam, so the result is `dose_mg * 10 / table_value`, rounded to 0.01 mg.
/// Diazepam itself bypasses the table.
pub fn convert_to_diazepam(dose_mg: f64, medication: &str, catalog: &Catalog) -> Result<Dose> {
    if !dose_mg.is_finite() || dose_mg <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "Starting dose must be a positive number of mg, got {}",
            dose_mg
        )));
    }

    let medication = medication.trim().to_lowercase();
    let diazepam_mg = if medication == DIAZEPAM {
        dose_mg
    } else {
        let equivalent = catalog
            .potency_of(&medication)
            .ok_or_else(|| Error::UnknownMedication(medication.clone()))?;
        dose_mg * 10.0 / equivalent.mg()
    };

    // Dose::from_mg saturates, so the bound is checked before converting
    if diazepam_mg > Dose::MAX.mg() {
        return Err(Error::InvalidInput(format!(
            "{} mg {} is {} mg diazepam, above the {} mg limit",
            dose_mg,
            medication,
            diazepam_mg,
            Dose::MAX
        )));
    }

    let diazepam = Dose::from_mg(diazepam_mg);
    tracing::debug!(
        "Converted {} mg {} to {} mg diazepam",
        dose_mg,
        medication,
        diazepam
    );
    Ok(diazepam)
}
