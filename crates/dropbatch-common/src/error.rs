//! Error types for dropbatch

use thiserror::Error;

/// Result type alias for dropbatch operations
pub type Result<T> = std::result::Result<T, DropbatchError>;

/// Main error type for dropbatch
#[derive(Error, Debug)]
pub enum DropbatchError {
    #[error("Invalid percentage '{value}' for '{name}': {source}")]
    InvalidPercentage {
        name: String,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}
