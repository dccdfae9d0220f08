//! Prediction engine: rule-based scoring with an optional external service.
//!
//! `predict_churn` is infallible by construction. If an external predictor
//! is configured it gets first shot; any unavailability, timeout, or parse
//! failure is logged and the rule-based scorer answers instead.

pub mod external;
pub mod health;
pub mod heuristic;

use async_trait::async_trait;

use crate::config::MlConfig;
use crate::types::{AccountSnapshot, HealthAnalysis, PredictionDraft, PredictionType};

use external::{ExternalPredictor, PredictorError};

/// A source of predictions. `ExternalPredictor` and `RuleBasedPredictor`
/// both implement it; the engine dispatches through it so either strategy
/// (or a caller-supplied one) can sit in the primary slot.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn predict(
        &self,
        snapshot: &AccountSnapshot,
        prediction_type: PredictionType,
        window_days: u32,
        config: &MlConfig,
    ) -> Result<PredictionDraft, PredictorError>;
}

/// The always-available fallback predictor.
pub struct RuleBasedPredictor;

#[async_trait]
impl Predictor for RuleBasedPredictor {
    async fn is_available(&self) -> bool {
        true
    }

    async fn predict(
        &self,
        snapshot: &AccountSnapshot,
        prediction_type: PredictionType,
        window_days: u32,
        config: &MlConfig,
    ) -> Result<PredictionDraft, PredictorError> {
        Ok(heuristic::predict(snapshot, prediction_type, window_days, config))
    }
}

pub struct PredictionEngine {
    primary: Option<Box<dyn Predictor>>,
    config: MlConfig,
}

impl PredictionEngine {
    /// Engine with no primary predictor; every prediction is rule-based.
    pub fn rule_based(config: MlConfig) -> Self {
        PredictionEngine {
            primary: None,
            config,
        }
    }

    pub fn new(config: MlConfig, external: Option<ExternalPredictor>) -> Self {
        PredictionEngine {
            primary: external.map(|e| Box::new(e) as Box<dyn Predictor>),
            config,
        }
    }

    /// Engine with an explicit primary predictor.
    pub fn with_predictor(config: MlConfig, predictor: Box<dyn Predictor>) -> Self {
        PredictionEngine {
            primary: Some(predictor),
            config,
        }
    }

    /// Produce a churn prediction for the snapshot. Never fails: primary
    /// predictor problems degrade to the rule-based scorer.
    pub async fn predict_churn(
        &self,
        snapshot: &AccountSnapshot,
        window_days: u32,
    ) -> PredictionDraft {
        if let Some(primary) = &self.primary {
            if primary.is_available().await {
                match primary
                    .predict(snapshot, PredictionType::Churn, window_days, &self.config)
                    .await
                {
                    Ok(draft) => return draft,
                    Err(e) => {
                        log::warn!(
                            "Primary predictor failed for account {}, falling back to rule-based: {}",
                            snapshot.account_id,
                            e
                        );
                    }
                }
            } else {
                log::info!(
                    "Primary predictor unavailable, using rule-based scoring for account {}",
                    snapshot.account_id
                );
            }
        }

        heuristic::predict(snapshot, PredictionType::Churn, window_days, &self.config)
    }

    /// Read-only health trajectory analysis. No persistence, no network.
    pub fn analyze_health(&self, snapshot: &AccountSnapshot) -> HealthAnalysis {
        health::analyze(snapshot)
    }

    pub fn config(&self) -> &MlConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use external::PredictorConfig;
    use heuristic::test_fixtures::{risk_follow_up, snapshot, with_trend};

    struct FixedPredictor {
        available: bool,
        result: Result<(), PredictorError>,
    }

    #[async_trait]
    impl Predictor for FixedPredictor {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn predict(
            &self,
            snapshot: &AccountSnapshot,
            prediction_type: PredictionType,
            window_days: u32,
            config: &MlConfig,
        ) -> Result<PredictionDraft, PredictorError> {
            match &self.result {
                Ok(()) => {
                    let mut draft =
                        heuristic::predict(snapshot, prediction_type, window_days, config);
                    draft.provenance.model = "fixed-model".to_string();
                    Ok(draft)
                }
                Err(_) => Err(PredictorError::Unavailable),
            }
        }
    }

    #[tokio::test]
    async fn test_rule_based_engine_always_answers() {
        let engine = PredictionEngine::rule_based(MlConfig::default());
        let draft = engine.predict_churn(&snapshot(50.0), 90).await;
        assert_eq!(draft.prediction_type, PredictionType::Churn);
        assert_eq!(draft.window_days, 90);
        assert_eq!(draft.provenance.model, heuristic::RULE_BASED_MODEL);
    }

    #[tokio::test]
    async fn test_available_primary_answers() {
        let engine = PredictionEngine::with_predictor(
            MlConfig::default(),
            Box::new(FixedPredictor {
                available: true,
                result: Ok(()),
            }),
        );
        let draft = engine.predict_churn(&snapshot(50.0), 90).await;
        assert_eq!(draft.provenance.model, "fixed-model");
    }

    #[tokio::test]
    async fn test_unavailable_primary_falls_back() {
        let engine = PredictionEngine::with_predictor(
            MlConfig::default(),
            Box::new(FixedPredictor {
                available: false,
                result: Ok(()),
            }),
        );
        let draft = engine.predict_churn(&snapshot(50.0), 90).await;
        assert_eq!(draft.provenance.model, heuristic::RULE_BASED_MODEL);
    }

    #[tokio::test]
    async fn test_failing_primary_falls_back() {
        let engine = PredictionEngine::with_predictor(
            MlConfig::default(),
            Box::new(FixedPredictor {
                available: true,
                result: Err(PredictorError::Unavailable),
            }),
        );
        let draft = engine.predict_churn(&snapshot(50.0), 90).await;
        assert_eq!(draft.provenance.model, heuristic::RULE_BASED_MODEL);
    }

    #[tokio::test]
    async fn test_unreachable_external_falls_back() {
        let external = ExternalPredictor::new(PredictorConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            model: "churn-v2".to_string(),
            timeout_secs: 1,
        })
        .expect("build client");
        let engine = PredictionEngine::new(MlConfig::default(), Some(external));

        let mut s = with_trend(snapshot(35.0), "declining");
        s.open_follow_ups.push(risk_follow_up());

        let draft = engine.predict_churn(&s, 90).await;
        assert_eq!(draft.provenance.model, heuristic::RULE_BASED_MODEL);
        assert!(draft.probability > 0.5);
    }

    #[tokio::test]
    async fn test_predictor_trait_rule_based() {
        let predictor = RuleBasedPredictor;
        assert!(predictor.is_available().await);
        let draft = predictor
            .predict(&snapshot(50.0), PredictionType::Churn, 60, &MlConfig::default())
            .await
            .unwrap();
        assert_eq!(draft.window_days, 60);
    }
}
