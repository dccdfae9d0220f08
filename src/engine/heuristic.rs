//! Rule-based churn scoring: the always-available predictor.
//!
//! A pure, deterministic function of the snapshot. The base probability is
//! inverse to the current health score, pushed up by a declining trend, open
//! risk-type follow-ups, and long activity silence, and pulled down by recent
//! multi-channel engagement and open high-probability opportunities.

use crate::config::MlConfig;
use crate::types::{
    AccountSnapshot, FactorTrend, Impact, ModelProvenance, OpenFollowUp, PredictionDraft,
    PredictionType, Recommendation, RiskCategory, RiskFactor, SuggestedAction, Trajectory,
};

use super::health;

/// Provenance name recorded on every rule-based prediction.
pub const RULE_BASED_MODEL: &str = "rule-based-fallback";

/// Health score is weighted so that score alone never saturates the scale;
/// the remaining headroom belongs to the behavioral adjustments.
const HEALTH_WEIGHT: f64 = 0.7;
/// Score assumed when an account carries no health data at all.
const DEFAULT_HEALTH_SCORE: f64 = 50.0;

const DECLINING_TREND_BOOST: f64 = 0.15;
const IMPROVING_TREND_DISCOUNT: f64 = 0.12;

/// Per open risk-type follow-up, capped.
const RISK_FOLLOW_UP_BOOST: f64 = 0.06;
const RISK_FOLLOW_UP_CAP: f64 = 0.15;
const HIGH_PRIORITY_RISK_BOOST: f64 = 0.04;

const SILENCE_THRESHOLD_DAYS: i64 = 21;
const LONG_SILENCE_DAYS: i64 = 45;
const SILENCE_BOOST: f64 = 0.10;
const LONG_SILENCE_BOOST: f64 = 0.18;

/// Meetings + emails in the trailing 30 days counted as engaged.
const ENGAGED_TOUCHES: u32 = 4;
const ENGAGEMENT_DISCOUNT: f64 = 0.06;

/// Opportunities at or above this close probability count as buying intent.
const HOT_OPPORTUNITY_PROBABILITY: f64 = 0.6;
const OPPORTUNITY_DISCOUNT: f64 = 0.05;

const CONFIDENCE_BASE: f64 = 0.5;
const CONFIDENCE_PER_SAMPLE: f64 = 0.04;
const CONFIDENCE_SAMPLE_CAP: u32 = 8;

const LOW_HEALTH_FACTOR_CEILING: f64 = 60.0;

/// Score a snapshot into a prediction draft.
pub fn predict(
    snapshot: &AccountSnapshot,
    prediction_type: PredictionType,
    window_days: u32,
    config: &MlConfig,
) -> PredictionDraft {
    let health = snapshot
        .health_score
        .or_else(|| snapshot.history.first().map(|h| h.overall_score))
        .unwrap_or(DEFAULT_HEALTH_SCORE)
        .clamp(0.0, 100.0);

    let trajectory = effective_trajectory(snapshot);
    let risk_follow_ups: Vec<&OpenFollowUp> = snapshot
        .open_follow_ups
        .iter()
        .filter(|f| is_risk_follow_up(f))
        .collect();
    let silence_days = snapshot.days_since_last_activity;
    let engaged_touches = snapshot.meeting_count_30d + snapshot.email_count_30d;
    let hot_opportunity = snapshot
        .open_opportunities
        .iter()
        .any(|o| o.probability.unwrap_or(0.0) >= HOT_OPPORTUNITY_PROBABILITY);

    let mut probability = (100.0 - health) / 100.0 * HEALTH_WEIGHT;

    match trajectory {
        Trajectory::Declining => probability += DECLINING_TREND_BOOST,
        Trajectory::Improving => probability -= IMPROVING_TREND_DISCOUNT,
        Trajectory::Stable => {}
    }

    if !risk_follow_ups.is_empty() {
        probability +=
            (RISK_FOLLOW_UP_BOOST * risk_follow_ups.len() as f64).min(RISK_FOLLOW_UP_CAP);
        if risk_follow_ups
            .iter()
            .any(|f| matches!(f.priority.as_str(), "high" | "urgent"))
        {
            probability += HIGH_PRIORITY_RISK_BOOST;
        }
    }

    match silence_days {
        Some(days) if days >= LONG_SILENCE_DAYS => probability += LONG_SILENCE_BOOST,
        Some(days) if days >= SILENCE_THRESHOLD_DAYS => probability += SILENCE_BOOST,
        _ => {}
    }

    if engaged_touches >= ENGAGED_TOUCHES {
        probability -= ENGAGEMENT_DISCOUNT;
    }
    if hot_opportunity {
        probability -= OPPORTUNITY_DISCOUNT;
    }

    let probability = probability.clamp(0.0, 1.0);
    let confidence = CONFIDENCE_BASE
        + CONFIDENCE_PER_SAMPLE * (snapshot.history.len() as u32).min(CONFIDENCE_SAMPLE_CAP) as f64;
    let risk_category = config.churn_risk_thresholds.category(probability);

    let mut risk_factors = Vec::new();

    if health < LOW_HEALTH_FACTOR_CEILING {
        risk_factors.push(RiskFactor {
            factor: "Health score".to_string(),
            impact: if health < 40.0 { Impact::High } else { Impact::Medium },
            current_value: health,
            trend: trajectory_to_factor_trend(trajectory),
            description: format!("Health score is {:.0} of 100", health),
        });
    }

    if trajectory == Trajectory::Declining {
        let delta = health::score_delta(snapshot).unwrap_or(0.0);
        risk_factors.push(RiskFactor {
            factor: "Health trend".to_string(),
            impact: Impact::High,
            current_value: delta.abs(),
            trend: FactorTrend::Worsening,
            description: "Health score is declining across recent samples".to_string(),
        });
    }

    if !risk_follow_ups.is_empty() {
        let high_priority = risk_follow_ups
            .iter()
            .any(|f| matches!(f.priority.as_str(), "high" | "urgent"));
        risk_factors.push(RiskFactor {
            factor: "Open risk follow-ups".to_string(),
            impact: if high_priority { Impact::High } else { Impact::Medium },
            current_value: risk_follow_ups.len() as f64,
            trend: FactorTrend::Worsening,
            description: format!(
                "{} open risk-type follow-up(s) outstanding",
                risk_follow_ups.len()
            ),
        });
    }

    if let Some(days) = silence_days {
        if days >= SILENCE_THRESHOLD_DAYS {
            risk_factors.push(RiskFactor {
                factor: "Activity silence".to_string(),
                impact: if days >= LONG_SILENCE_DAYS { Impact::High } else { Impact::Medium },
                current_value: days as f64,
                trend: FactorTrend::Worsening,
                description: format!("No recorded activity in {} days", days),
            });
        }
    }

    // A notable probability must always carry at least one explaining factor.
    if risk_factors.is_empty() && probability >= config.churn_risk_thresholds.medium {
        risk_factors.push(RiskFactor {
            factor: "Overall account health".to_string(),
            impact: Impact::Medium,
            current_value: probability,
            trend: trajectory_to_factor_trend(trajectory),
            description: "Combined account signals place this account at elevated risk"
                .to_string(),
        });
    }

    let explanation = build_explanation(&snapshot.name, probability, &risk_factors);
    let recommendations = build_recommendations(risk_category, silence_days, hot_opportunity);
    let suggested_action = build_suggested_action(snapshot, risk_category);

    PredictionDraft {
        prediction_type,
        probability,
        confidence,
        window_days,
        risk_category,
        risk_factors,
        explanation,
        recommendations,
        suggested_action,
        provenance: ModelProvenance::rule_based(),
    }
}

/// A follow-up counts as risk-type when it targets retention rather than
/// routine account work.
pub(crate) fn is_risk_follow_up(follow_up: &OpenFollowUp) -> bool {
    matches!(
        follow_up.action_type.as_str(),
        "risk_mitigation" | "retention_call" | "escalation"
    ) || follow_up.action_type.contains("risk")
}

/// Trend from the newest history sample's label when present, otherwise
/// computed from the sample scores.
fn effective_trajectory(snapshot: &AccountSnapshot) -> Trajectory {
    if let Some(label) = snapshot.history.first().and_then(|h| h.trend.as_deref()) {
        match label {
            "declining" => return Trajectory::Declining,
            "improving" => return Trajectory::Improving,
            "stable" => return Trajectory::Stable,
            _ => {}
        }
    }
    health::trajectory_from_history(snapshot)
}

fn trajectory_to_factor_trend(trajectory: Trajectory) -> FactorTrend {
    match trajectory {
        Trajectory::Improving => FactorTrend::Improving,
        Trajectory::Stable => FactorTrend::Stable,
        Trajectory::Declining => FactorTrend::Worsening,
    }
}

fn build_explanation(name: &str, probability: f64, factors: &[RiskFactor]) -> String {
    match factors.first() {
        Some(dominant) => format!(
            "{} has an estimated churn probability of {:.0}%. Dominant driver: {}.",
            name,
            probability * 100.0,
            dominant.description
        ),
        None => format!(
            "{} has an estimated churn probability of {:.0}% with no elevated risk drivers.",
            name,
            probability * 100.0
        ),
    }
}

fn build_recommendations(
    category: RiskCategory,
    silence_days: Option<i64>,
    hot_opportunity: bool,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if category >= RiskCategory::High {
        recommendations.push(Recommendation {
            action: "Schedule an executive retention call".to_string(),
            priority: if category == RiskCategory::Critical { "urgent" } else { "high" }
                .to_string(),
            timeframe: "within 1 week".to_string(),
            expected_impact: "Reopens the dialogue before renewal risk hardens".to_string(),
            rationale: "Churn probability is in the elevated band".to_string(),
            effort: Impact::Medium,
        });
    }

    if silence_days.map(|d| d >= SILENCE_THRESHOLD_DAYS).unwrap_or(false) {
        recommendations.push(Recommendation {
            action: "Re-engage through the account champion".to_string(),
            priority: "medium".to_string(),
            timeframe: "this week".to_string(),
            expected_impact: "Restores a regular touchpoint cadence".to_string(),
            rationale: "Extended activity silence is compounding the risk score".to_string(),
            effort: Impact::Low,
        });
    }

    if hot_opportunity && category >= RiskCategory::Medium {
        recommendations.push(Recommendation {
            action: "Protect the open opportunity with a joint success plan".to_string(),
            priority: "medium".to_string(),
            timeframe: "within 2 weeks".to_string(),
            expected_impact: "Ties the expansion to a retention commitment".to_string(),
            rationale: "An open high-probability opportunity is at stake".to_string(),
            effort: Impact::Medium,
        });
    }

    recommendations
}

fn build_suggested_action(
    snapshot: &AccountSnapshot,
    category: RiskCategory,
) -> Option<SuggestedAction> {
    if category < RiskCategory::High {
        return None;
    }
    let critical = category == RiskCategory::Critical;
    Some(SuggestedAction {
        action_type: "retention_call".to_string(),
        priority: if critical { "urgent" } else { "high" }.to_string(),
        title: format!("Schedule retention call with {}", snapshot.name),
        reason: format!(
            "Churn risk is {} for {}",
            category.as_str(),
            snapshot.name
        ),
        due_in_days: if critical { 3 } else { 7 },
    })
}
