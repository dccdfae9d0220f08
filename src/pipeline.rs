//! The churn pipeline facade: one struct wiring the assembler, engine,
//! store, policy, validator, and ranker behind caller-facing operations.

use serde::Serialize;

use crate::config::MlConfig;
use crate::context;
use crate::db::CrmDb;
use crate::engine::PredictionEngine;
use crate::error::PipelineError;
use crate::policy::{self, CtaOutcome};
use crate::ranker;
use crate::types::{
    AccuracyReport, HealthAnalysis, HighRiskAccount, Prediction, PredictionType,
};
use crate::validator::{self, ValidationOutcome};

/// Tagged result for latest-prediction lookups, shaped for direct
/// serialization to callers. "No current prediction" is a distinct state,
/// not an error.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LatestPredictionResult {
    Found { data: Prediction },
    Empty { message: String },
    Error { message: String },
}

pub struct ChurnPipeline {
    db: CrmDb,
    engine: PredictionEngine,
    config: MlConfig,
}

impl ChurnPipeline {
    pub fn new(db: CrmDb, engine: PredictionEngine, config: MlConfig) -> Self {
        ChurnPipeline { db, engine, config }
    }

    pub fn db(&self) -> &CrmDb {
        &self.db
    }

    /// Assemble the account's context, produce a churn prediction, and
    /// persist it. Returns the stored prediction with identity and
    /// lifecycle fields assigned.
    pub async fn predict_churn(
        &self,
        tenant_id: &str,
        account_id: &str,
        window_days: Option<u32>,
    ) -> Result<Prediction, PipelineError> {
        let snapshot = context::assemble(&self.db, tenant_id, account_id, &self.config)?;
        let window = window_days.unwrap_or(self.config.prediction_window_days);

        let draft = self.engine.predict_churn(&snapshot, window).await;
        let stored = self.db.insert_prediction(
            tenant_id,
            account_id,
            &draft,
            self.config.prediction_validity_days,
        )?;

        log::info!(
            "Stored churn prediction {} for account {}: p={:.2} ({}) via {}",
            stored.id,
            account_id,
            stored.probability,
            stored.risk_category.as_str(),
            stored.provenance.model
        );
        Ok(stored)
    }

    /// Read-only health trajectory analysis. Nothing is persisted.
    pub fn analyze_health(
        &self,
        tenant_id: &str,
        account_id: &str,
    ) -> Result<HealthAnalysis, PipelineError> {
        let snapshot = context::assemble(&self.db, tenant_id, account_id, &self.config)?;
        Ok(self.engine.analyze_health(&snapshot))
    }

    /// Run the CTA gates for a stored prediction by id.
    pub fn generate_action_from_prediction(
        &self,
        tenant_id: &str,
        prediction_id: &str,
        user_id: Option<&str>,
    ) -> Result<CtaOutcome, PipelineError> {
        let prediction = self
            .db
            .get_prediction(tenant_id, prediction_id)?
            .ok_or_else(|| PipelineError::PredictionNotFound(prediction_id.to_string()))?;
        policy::generate_action_from_prediction(
            &self.db,
            tenant_id,
            &prediction.account_id,
            &prediction,
            user_id,
            &self.config,
        )
    }

    /// Validate every expired, still-active prediction for the tenant.
    pub fn validate_expired(&self, tenant_id: &str) -> Result<ValidationOutcome, PipelineError> {
        validator::validate_expired(&self.db, tenant_id, &self.config)
    }

    pub fn prediction_accuracy(&self, tenant_id: &str) -> Result<AccuracyReport, PipelineError> {
        Ok(self.db.prediction_accuracy(tenant_id)?)
    }

    pub fn high_risk_accounts(
        &self,
        tenant_id: &str,
        min_probability: f64,
        limit: u32,
    ) -> Result<Vec<HighRiskAccount>, PipelineError> {
        ranker::high_risk_accounts(&self.db, tenant_id, min_probability, limit)
    }

    /// Latest non-expired churn prediction for an account, shaped as a
    /// tagged result rather than an error on absence.
    pub fn latest_churn_prediction(
        &self,
        tenant_id: &str,
        account_id: &str,
    ) -> LatestPredictionResult {
        match self
            .db
            .get_latest_prediction(tenant_id, account_id, PredictionType::Churn)
        {
            Ok(Some(prediction)) => LatestPredictionResult::Found { data: prediction },
            Ok(None) => LatestPredictionResult::Empty {
                message: format!("No current churn prediction for account {}", account_id),
            },
            Err(e) => {
                log::error!(
                    "Failed to load latest prediction for account {}: {}",
                    account_id,
                    e
                );
                LatestPredictionResult::Error {
                    message: e.to_string(),
                }
            }
        }
    }
}
