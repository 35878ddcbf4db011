//! Error types for the taper_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for taper_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reference table validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Medication name not present in the potency table
    #[error("Medication '{0}' not in equivalency table")]
    UnknownMedication(String),

    /// Malformed request input (dose, speed label, date, frequency, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
