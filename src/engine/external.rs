//! HTTP client for the external prediction service.
//!
//! The service is optional. Availability is probed with a short-deadline
//! health check before every call, and every error variant here is treated
//! as recoverable by the engine, which falls back to the rule-based scorer.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::MlConfig;
use crate::types::{
    AccountSnapshot, ModelProvenance, PredictionDraft, PredictionType, Recommendation,
    RiskFactor, SuggestedAction,
};

const HEALTH_CHECK_TIMEOUT_SECS: u64 = 2;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("failed to build prediction client: {0}")]
    Client(String),
    #[error("prediction service is not reachable")]
    Unavailable,
    #[error("prediction request timed out after {0}s")]
    Timeout(u64),
    #[error("prediction service error: {0}")]
    Http(String),
    #[error("failed to parse prediction response: {0}")]
    Parse(String),
}

/// Connection settings for the external service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

pub struct ExternalPredictor {
    client: reqwest::Client,
    config: PredictorConfig,
}

// Request/response wire shapes for POST /v1/predict.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest<'a> {
    model: &'a str,
    prediction_type: PredictionType,
    window_days: u32,
    snapshot: SnapshotPayload<'a>,
}

/// The snapshot stripped to what the service needs. Tenant and account ids
/// stay local.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotPayload<'a> {
    name: &'a str,
    account_type: &'a Option<String>,
    health_score: Option<f64>,
    engagement_score: Option<f64>,
    history: &'a [crate::types::HealthSample],
    activities: &'a [crate::types::ActivityRecord],
    open_follow_ups: &'a [crate::types::OpenFollowUp],
    open_opportunities: &'a [crate::types::OpenOpportunity],
    days_since_last_activity: Option<i64>,
    activity_count30d: u32,
    meeting_count30d: u32,
    email_count30d: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    probability: f64,
    confidence: f64,
    #[serde(default)]
    risk_factors: Vec<RiskFactor>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    recommendations: Vec<Recommendation>,
    suggested_action: Option<SuggestedAction>,
    usage: Option<UsagePayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsagePayload {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cost_usd: Option<f64>,
}

impl ExternalPredictor {
    /// Build the client with the configured request deadline. Fails rather
    /// than falling back to an unbounded client.
    pub fn new(config: PredictorConfig) -> Result<Self, PredictorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PredictorError::Client(e.to_string()))?;
        Ok(ExternalPredictor { client, config })
    }
}

#[async_trait]
impl super::Predictor for ExternalPredictor {
    /// Cheap availability probe against the service's health endpoint.
    async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn predict(
        &self,
        snapshot: &AccountSnapshot,
        prediction_type: PredictionType,
        window_days: u32,
        config: &MlConfig,
    ) -> Result<PredictionDraft, PredictorError> {
        let url = format!("{}/v1/predict", self.config.base_url.trim_end_matches('/'));
        let body = PredictRequest {
            model: &self.config.model,
            prediction_type,
            window_days,
            snapshot: SnapshotPayload {
                name: &snapshot.name,
                account_type: &snapshot.account_type,
                health_score: snapshot.health_score,
                engagement_score: snapshot.engagement_score,
                history: &snapshot.history,
                activities: &snapshot.activities,
                open_follow_ups: &snapshot.open_follow_ups,
                open_opportunities: &snapshot.open_opportunities,
                days_since_last_activity: snapshot.days_since_last_activity,
                activity_count30d: snapshot.activity_count_30d,
                meeting_count30d: snapshot.meeting_count_30d,
                email_count30d: snapshot.email_count_30d,
            },
        };

        let started = Instant::now();
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PredictorError::Timeout(self.config.timeout_secs)
            } else if e.is_connect() {
                PredictorError::Unavailable
            } else {
                PredictorError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PredictorError::Http(format!("{}: {}", status, detail)));
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| PredictorError::Parse(e.to_string()))?;

        let probability = parsed.probability.clamp(0.0, 1.0);
        let confidence = parsed.confidence.clamp(0.0, 1.0);
        let usage = parsed.usage;

        Ok(PredictionDraft {
            prediction_type,
            probability,
            confidence,
            window_days,
            risk_category: config.churn_risk_thresholds.category(probability),
            risk_factors: parsed.risk_factors,
            explanation: parsed.explanation,
            recommendations: parsed.recommendations,
            suggested_action: parsed.suggested_action,
            provenance: ModelProvenance {
                model: self.config.model.clone(),
                input_tokens: usage.as_ref().and_then(|u| u.input_tokens),
                output_tokens: usage.as_ref().and_then(|u| u.output_tokens),
                latency_ms: Some(latency_ms),
                cost_usd: usage.as_ref().and_then(|u| u.cost_usd),
            },
        })
    }
}
