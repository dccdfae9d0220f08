//! Error taxonomy for the prediction pipeline.
//!
//! Propagation rules:
//! - `AccountNotFound` / `PredictionNotFound` surface to the caller, never retried.
//! - Database failures propagate unmodified via `Db`.
//! - External-predictor failures are absorbed inside the engine (heuristic
//!   fallback) and never appear here; see `engine::external::PredictorError`.
//! - A skipped CTA is a normal outcome (`policy::CtaOutcome::Skipped`), not
//!   an error.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Prediction not found: {0}")]
    PredictionNotFound(String),

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl PipelineError {
    /// True for absent-record errors the caller should map to a 404-style
    /// outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PipelineError::AccountNotFound(_) | PipelineError::PredictionNotFound(_)
        )
    }
}
