//! Business-tunable prediction configuration.
//!
//! These are policy knobs, not environment plumbing: the prediction window,
//! validity period, CTA gates, and the churn-risk category breakpoints. The
//! defaults are the platform-wide contract; dashboards and the validator
//! both key off `critical = 0.8`.

use serde::{Deserialize, Serialize};

use crate::types::RiskCategory;

/// Probability breakpoints for churn-risk categorization.
///
/// Below `medium` is low risk. `critical` is fixed at 0.8 by default and is
/// the same threshold the validator uses to decide whether churn was observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChurnRiskThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for ChurnRiskThresholds {
    fn default() -> Self {
        ChurnRiskThresholds {
            medium: 0.4,
            high: 0.6,
            critical: 0.8,
        }
    }
}

impl ChurnRiskThresholds {
    /// Classify a churn probability into a risk category.
    pub fn category(&self, probability: f64) -> RiskCategory {
        if probability >= self.critical {
            RiskCategory::Critical
        } else if probability >= self.high {
            RiskCategory::High
        } else if probability >= self.medium {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }
}

/// Configuration for the prediction pipeline.
///
/// Deserializable so the embedding app can override individual fields from
/// its own config file; every field falls back to the platform default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MlConfig {
    /// Business horizon a churn prediction forecasts, in days.
    pub prediction_window_days: u32,
    /// How long a prediction stays ACTIVE before the validator picks it up.
    /// Independent of the prediction window.
    pub prediction_validity_days: i64,
    /// Minimum confidence before the Action Policy will auto-create a CTA.
    pub cta_confidence_threshold: f64,
    /// Minimum elapsed days after a same-type follow-up before another may
    /// be auto-created for the same account.
    pub cta_cooldown_days: i64,
    /// Most recent health-history samples the assembler loads.
    pub history_sample_limit: u32,
    /// Activity lookback window for the assembler, in days.
    pub activity_lookback_days: i64,
    pub churn_risk_thresholds: ChurnRiskThresholds,
}

impl Default for MlConfig {
    fn default() -> Self {
        MlConfig {
            prediction_window_days: 90,
            prediction_validity_days: 30,
            cta_confidence_threshold: 0.6,
            cta_cooldown_days: 14,
            history_sample_limit: 12,
            activity_lookback_days: 90,
            churn_risk_thresholds: ChurnRiskThresholds::default(),
        }
    }
}
