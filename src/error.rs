//! Error taxonomy shared by every pipeline stage.
//!
//! Row-level and group-level variants are recoverable: the stage that
//! raises them counts them and keeps going unless strict mode asks
//! otherwise. `MissingRequiredColumn`, `SumOverflow` and
//! `EncodingDecodeFailure` abort the stage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Required column '{field}' not found (accepted: {accepted}; found: {found})")]
    MissingRequiredColumn {
        field: &'static str,
        accepted: String,
        found: String,
    },

    #[error("Unparseable number '{token}'")]
    UnparseableNumber { token: String },

    #[error("Classification id '{id}' not found in sector lookup")]
    LookupKeyNotFound { id: String },

    #[error("No unemployment rate for year {year}")]
    MissingRateForYear { year: i32 },

    #[error("Invalid unemployment rate {rate} for year {year}")]
    InvalidRate { year: i32, rate: f64 },

    #[error("Group ({year}, {sector}) has no employment to rate")]
    NoEmployment { year: i32, sector: String },

    #[error("Sum of {column} overflowed")]
    SumOverflow { column: &'static str },

    #[error("Unable to decode {path:?} as UTF-8 or Latin-1")]
    EncodingDecodeFailure { path: PathBuf },

    #[error("Invalid index weights: {0}")]
    InvalidWeights(String),
}

impl PipelineError {
    pub fn unparseable(token: impl Into<String>) -> Self {
        PipelineError::UnparseableNumber {
            token: token.into(),
        }
    }

    /// Row- and group-level conditions that a stage may count and skip.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::UnparseableNumber { .. }
                | PipelineError::LookupKeyNotFound { .. }
                | PipelineError::MissingRateForYear { .. }
                | PipelineError::InvalidRate { .. }
                | PipelineError::NoEmployment { .. }
        )
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
