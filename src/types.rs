//! Shared domain types for the prediction pipeline.
//!
//! Everything here is the in-memory shape consumed by the engine, policy, and
//! the UI-facing result structs. Persisted row types live in `db::types`.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────

/// What a prediction claims about an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionType {
    #[serde(rename = "CHURN")]
    Churn,
    #[serde(rename = "HEALTH_TREND")]
    HealthTrend,
}

impl PredictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::Churn => "CHURN",
            PredictionType::HealthTrend => "HEALTH_TREND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CHURN" => Some(PredictionType::Churn),
            "HEALTH_TREND" => Some(PredictionType::HealthTrend),
            _ => None,
        }
    }
}

/// Lifecycle status of a stored prediction. ACTIVE → VALIDATED, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "VALIDATED")]
    Validated,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Active => "ACTIVE",
            PredictionStatus::Validated => "VALIDATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(PredictionStatus::Active),
            "VALIDATED" => Some(PredictionStatus::Validated),
            _ => None,
        }
    }
}

/// Churn-risk category derived from probability breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
            RiskCategory::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskCategory::Low),
            "medium" => Some(RiskCategory::Medium),
            "high" => Some(RiskCategory::High),
            "critical" => Some(RiskCategory::Critical),
            _ => None,
        }
    }
}

/// Relative weight of a risk factor or effort of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// Direction a single factor is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorTrend {
    Improving,
    Stable,
    Worsening,
}

/// Overall health trajectory classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trajectory {
    Improving,
    Stable,
    Declining,
}

// ─────────────────────────────────────────────────────────────────────
// Snapshot (assembled per request, never persisted)
// ─────────────────────────────────────────────────────────────────────

/// One health-score-history sample, newest first in `AccountSnapshot::history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSample {
    pub overall_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_scores: Option<serde_json::Value>,
    pub trend: Option<String>,
    pub churn_risk: Option<f64>,
    pub recorded_at: String,
}

/// A recent activity record (meeting, email, call, note).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub activity_type: String,
    pub occurred_at: String,
    pub sentiment: Option<f64>,
}

/// An open follow-up action as seen by the assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenFollowUp {
    pub action_type: String,
    pub priority: String,
    pub status: String,
    pub due_date: Option<String>,
}

/// An open pipeline opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOpportunity {
    pub stage: String,
    pub value: Option<f64>,
    pub probability: Option<f64>,
}

/// Immutable per-request view of everything known about one account.
///
/// Built by the Context Assembler, consumed by the Prediction Engine.
/// Derived metrics are computed once at assembly time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub tenant_id: String,
    pub account_id: String,
    pub name: String,
    pub account_type: Option<String>,
    pub health_score: Option<f64>,
    pub engagement_score: Option<f64>,
    pub churn_risk: Option<f64>,
    pub archived: bool,
    /// Health-history samples, descending by recorded_at.
    pub history: Vec<HealthSample>,
    /// Activities within the lookback window, descending by occurred_at.
    pub activities: Vec<ActivityRecord>,
    pub open_follow_ups: Vec<OpenFollowUp>,
    pub open_opportunities: Vec<OpenOpportunity>,
    /// None when the account has no recorded activity at all.
    pub days_since_last_activity: Option<i64>,
    pub activity_count_30d: u32,
    pub meeting_count_30d: u32,
    pub email_count_30d: u32,
}

// ─────────────────────────────────────────────────────────────────────
// Prediction content
// ─────────────────────────────────────────────────────────────────────

/// A single driver behind a prediction, most significant first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub factor: String,
    pub impact: Impact,
    pub current_value: f64,
    pub trend: FactorTrend,
    pub description: String,
}

/// A recommended intervention attached to a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action: String,
    pub priority: String,
    pub timeframe: String,
    pub expected_impact: String,
    pub rationale: String,
    pub effort: Impact,
}

/// The stub the Action Policy turns into a concrete follow-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedAction {
    pub action_type: String,
    pub priority: String,
    pub title: String,
    pub reason: String,
    /// Due date offset from creation time, in days.
    pub due_in_days: i64,
}

/// Where a prediction came from. Token/latency/cost are only present for
/// the external predictor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProvenance {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl ModelProvenance {
    pub fn rule_based() -> Self {
        ModelProvenance {
            model: crate::engine::heuristic::RULE_BASED_MODEL.to_string(),
            input_tokens: None,
            output_tokens: None,
            latency_ms: None,
            cost_usd: None,
        }
    }
}

/// Engine output before the store assigns identity and lifecycle fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionDraft {
    pub prediction_type: PredictionType,
    /// Predicted likelihood of the outcome, in [0, 1].
    pub probability: f64,
    /// The predictor's self-assessed reliability, in [0, 1]. A distinct
    /// axis from probability.
    pub confidence: f64,
    /// Business horizon being forecast, in days.
    pub window_days: u32,
    pub risk_category: RiskCategory,
    pub risk_factors: Vec<RiskFactor>,
    pub explanation: String,
    pub recommendations: Vec<Recommendation>,
    pub suggested_action: Option<SuggestedAction>,
    pub provenance: ModelProvenance,
}

/// A stored prediction: the draft content plus identity, lifecycle, and
/// audit fields assigned by the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: String,
    pub tenant_id: String,
    pub account_id: String,
    pub prediction_type: PredictionType,
    pub probability: f64,
    pub confidence: f64,
    pub window_days: u32,
    pub risk_category: RiskCategory,
    pub risk_factors: Vec<RiskFactor>,
    pub explanation: String,
    pub recommendations: Vec<Recommendation>,
    pub suggested_action: Option<SuggestedAction>,
    pub provenance: ModelProvenance,
    pub created_at: String,
    /// End of the validation window. Distinct from `window_days`, which is
    /// the business horizon being forecast.
    pub valid_until: String,
    pub status: PredictionStatus,
    /// Set only by the Validator.
    pub was_accurate: Option<bool>,
    /// Set only by the Action Policy when a CTA is generated.
    pub follow_up_id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────
// Analysis & reporting shapes
// ─────────────────────────────────────────────────────────────────────

/// Read-only health analysis: trajectory plus qualitative insights.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAnalysis {
    pub current_score: Option<f64>,
    pub trajectory: Trajectory,
    pub insights: Vec<String>,
}

/// Accuracy triple for one prediction type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAccuracy {
    pub prediction_type: PredictionType,
    pub total: u64,
    pub validated: u64,
    pub accurate: u64,
}

/// Aggregate prediction accuracy for a tenant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyReport {
    pub total: u64,
    pub validated: u64,
    pub accurate: u64,
    /// accurate / validated; 0.0 when nothing has been validated yet.
    pub accuracy: f64,
    pub by_type: Vec<TypeAccuracy>,
}

/// Live account summary joined onto a ranked prediction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub account_type: Option<String>,
    pub health_score: Option<f64>,
}

/// One entry in the high-risk ranking.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskAccount {
    pub account: AccountSummary,
    pub prediction: Prediction,
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_type_round_trip() {
        assert_eq!(PredictionType::parse("CHURN"), Some(PredictionType::Churn));
        assert_eq!(
            PredictionType::parse(PredictionType::HealthTrend.as_str()),
            Some(PredictionType::HealthTrend)
        );
        assert_eq!(PredictionType::parse("bogus"), None);
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            PredictionStatus::parse(PredictionStatus::Active.as_str()),
            Some(PredictionStatus::Active)
        );
        assert_eq!(
            PredictionStatus::parse("VALIDATED"),
            Some(PredictionStatus::Validated)
        );
    }

    #[test]
    fn test_risk_category_ordering() {
        assert!(RiskCategory::Low < RiskCategory::Medium);
        assert!(RiskCategory::High < RiskCategory::Critical);
    }

    #[test]
    fn test_serde_camel_case() {
        let factor = RiskFactor {
            factor: "Health score".to_string(),
            impact: Impact::High,
            current_value: 35.0,
            trend: FactorTrend::Worsening,
            description: "Health score is 35".to_string(),
        };
        let json = serde_json::to_value(&factor).unwrap();
        assert_eq!(json["currentValue"], 35.0);
        assert_eq!(json["impact"], "high");
        assert_eq!(json["trend"], "worsening");
    }
}
