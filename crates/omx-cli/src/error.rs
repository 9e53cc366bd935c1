//! Error types for the CLI application.

use crate::document::DocumentReadError;
use omx_extractor::ExtractorError;
use omx_geocoder::GeocodeError;
use omx_llm::LlmError;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document could not be turned into text
    #[error("Document error: {0}")]
    Document(#[from] DocumentReadError),

    /// Invalid extractor settings
    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    /// Model provider could not be set up
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    /// Geocoder could not be set up
    #[error("Geocoder error: {0}")]
    Geocoder(#[from] GeocodeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
