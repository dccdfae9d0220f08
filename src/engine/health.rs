//! Health-insight analysis: trajectory classification plus qualitative
//! insights. A read-only analytical sibling to churn prediction: it shares
//! the assembler's snapshot but none of the churn-specific shapes.

use crate::types::{AccountSnapshot, HealthAnalysis, Trajectory};

/// Score movement below this magnitude counts as stable.
const TREND_DEADBAND: f64 = 3.0;

/// Days of silence before it becomes an insight.
const SILENCE_INSIGHT_DAYS: i64 = 21;

/// Compute the health analysis for one snapshot.
pub fn analyze(snapshot: &AccountSnapshot) -> HealthAnalysis {
    let trajectory = trajectory_from_history(snapshot);
    let current_score = snapshot
        .health_score
        .or_else(|| snapshot.history.first().map(|h| h.overall_score));

    let mut insights = Vec::new();

    match trajectory {
        Trajectory::Declining => {
            if let Some(delta) = score_delta(snapshot) {
                insights.push(format!(
                    "Health score has dropped {:.0} points against the trailing average",
                    delta.abs()
                ));
            } else {
                insights.push("Health score is trending downward".to_string());
            }
        }
        Trajectory::Improving => {
            insights.push("Health score is recovering against the trailing average".to_string());
        }
        Trajectory::Stable => {}
    }

    match snapshot.days_since_last_activity {
        None => insights.push("No activity on record for this account".to_string()),
        Some(days) if days >= SILENCE_INSIGHT_DAYS => {
            insights.push(format!("No touchpoint in {} days", days));
        }
        _ => {}
    }

    if snapshot.meeting_count_30d == 0 && snapshot.activity_count_30d > 0 {
        insights.push("Recent contact is one-channel only, with no meetings in 30 days".to_string());
    }

    let risk_follow_ups = snapshot
        .open_follow_ups
        .iter()
        .filter(|f| super::heuristic::is_risk_follow_up(f))
        .count();
    if risk_follow_ups > 0 {
        insights.push(format!(
            "{} open risk follow-up{} outstanding",
            risk_follow_ups,
            if risk_follow_ups == 1 { "" } else { "s" }
        ));
    }

    if let Some(opp) = snapshot
        .open_opportunities
        .iter()
        .find(|o| o.probability.unwrap_or(0.0) >= 0.6)
    {
        insights.push(format!(
            "Open opportunity in {} stage signals continued investment",
            opp.stage
        ));
    }

    if insights.is_empty() {
        insights.push("Account signals are steady; no notable movement".to_string());
    }

    HealthAnalysis {
        current_score,
        trajectory,
        insights,
    }
}

/// Classify the trajectory from the ordered history samples: most recent
/// score against the average of the older ones, with a deadband.
pub(crate) fn trajectory_from_history(snapshot: &AccountSnapshot) -> Trajectory {
    match score_delta(snapshot) {
        Some(delta) if delta > TREND_DEADBAND => Trajectory::Improving,
        Some(delta) if delta < -TREND_DEADBAND => Trajectory::Declining,
        _ => Trajectory::Stable,
    }
}

/// Most recent score minus the average of the older samples. None with
/// fewer than two samples.
pub(crate) fn score_delta(snapshot: &AccountSnapshot) -> Option<f64> {
    if snapshot.history.len() < 2 {
        return None;
    }
    let recent = snapshot.history[0].overall_score;
    let older = &snapshot.history[1..];
    let older_avg = older.iter().map(|h| h.overall_score).sum::<f64>() / older.len() as f64;
    Some(recent - older_avg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HealthSample;

    fn snapshot_with_scores(scores: &[f64]) -> AccountSnapshot {
        let history = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| HealthSample {
                overall_score: score,
                component_scores: None,
                trend: None,
                churn_risk: None,
                recorded_at: format!("2026-0{}-01T00:00:00+00:00", 8 - i),
            })
            .collect();
        AccountSnapshot {
            tenant_id: "t1".to_string(),
            account_id: "acme".to_string(),
            name: "Acme Corp".to_string(),
            account_type: None,
            health_score: scores.first().copied(),
            engagement_score: None,
            churn_risk: None,
            archived: false,
            history,
            activities: vec![],
            open_follow_ups: vec![],
            open_opportunities: vec![],
            days_since_last_activity: Some(5),
            activity_count_30d: 2,
            meeting_count_30d: 1,
            email_count_30d: 1,
        }
    }

    #[test]
    fn test_declining_trajectory() {
        let snapshot = snapshot_with_scores(&[40.0, 55.0, 60.0, 65.0]);
        assert_eq!(trajectory_from_history(&snapshot), Trajectory::Declining);

        let analysis = analyze(&snapshot);
        assert_eq!(analysis.trajectory, Trajectory::Declining);
        assert!(analysis.insights.iter().any(|i| i.contains("dropped")));
    }

    #[test]
    fn test_improving_trajectory() {
        let snapshot = snapshot_with_scores(&[80.0, 65.0, 60.0]);
        assert_eq!(trajectory_from_history(&snapshot), Trajectory::Improving);
    }

    #[test]
    fn test_stable_within_deadband() {
        let snapshot = snapshot_with_scores(&[62.0, 60.0, 61.0]);
        assert_eq!(trajectory_from_history(&snapshot), Trajectory::Stable);
    }

    #[test]
    fn test_single_sample_is_stable() {
        let snapshot = snapshot_with_scores(&[50.0]);
        assert_eq!(trajectory_from_history(&snapshot), Trajectory::Stable);
        let analysis = analyze(&snapshot);
        assert_eq!(analysis.current_score, Some(50.0));
        assert!(!analysis.insights.is_empty());
    }

    #[test]
    fn test_silence_insight() {
        let mut snapshot = snapshot_with_scores(&[60.0, 61.0]);
        snapshot.days_since_last_activity = Some(40);
        let analysis = analyze(&snapshot);
        assert!(analysis.insights.iter().any(|i| i.contains("40 days")));
    }

    #[test]
    fn test_no_activity_insight() {
        let mut snapshot = snapshot_with_scores(&[60.0, 61.0]);
        snapshot.days_since_last_activity = None;
        snapshot.activity_count_30d = 0;
        let analysis = analyze(&snapshot);
        assert!(analysis
            .insights
            .iter()
            .any(|i| i.contains("No activity on record")));
    }
}
