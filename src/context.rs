//! Context Assembler: everything known about one account, gathered into a
//! single immutable `AccountSnapshot`.
//!
//! Only the account record is mandatory; its absence is fatal and checked
//! first. The secondary reads (history, activities, follow-ups,
//! opportunities) are independent of each other and all tolerate being
//! empty; over the single SQLite connection they run back-to-back as indexed
//! point queries. No side effects.

use chrono::{Duration, Utc};

use crate::config::MlConfig;
use crate::db::CrmDb;
use crate::error::PipelineError;
use crate::types::{
    AccountSnapshot, ActivityRecord, HealthSample, OpenFollowUp, OpenOpportunity,
};

/// Trailing window for the derived engagement counts.
const ENGAGEMENT_WINDOW_DAYS: i64 = 30;

/// Build a snapshot for one account, or fail with `AccountNotFound`.
pub fn assemble(
    db: &CrmDb,
    tenant_id: &str,
    account_id: &str,
    config: &MlConfig,
) -> Result<AccountSnapshot, PipelineError> {
    let account = db
        .get_account(tenant_id, account_id)?
        .ok_or_else(|| PipelineError::AccountNotFound(account_id.to_string()))?;

    let history = db.get_recent_health_history(tenant_id, account_id, config.history_sample_limit)?;

    let activity_cutoff = (Utc::now() - Duration::days(config.activity_lookback_days)).to_rfc3339();
    let activities = db.get_recent_activities(tenant_id, account_id, &activity_cutoff)?;

    let open_follow_ups = db.get_open_follow_ups(tenant_id, account_id)?;
    let open_opportunities = db.get_open_opportunities(tenant_id, account_id)?;

    let history: Vec<HealthSample> = history
        .into_iter()
        .map(|h| HealthSample {
            overall_score: h.overall_score,
            component_scores: h
                .component_scores
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            trend: h.trend,
            churn_risk: h.churn_risk,
            recorded_at: h.recorded_at,
        })
        .collect();

    let activities: Vec<ActivityRecord> = activities
        .into_iter()
        .map(|a| ActivityRecord {
            activity_type: a.activity_type,
            occurred_at: a.occurred_at,
            sentiment: a.sentiment,
        })
        .collect();

    // Derived metrics, computed once at assembly time. Activities arrive
    // newest first, so the first entry is the most recent touch.
    let days_since_last_activity = activities.first().map(|a| days_since(&a.occurred_at));

    let engagement_cutoff = (Utc::now() - Duration::days(ENGAGEMENT_WINDOW_DAYS)).to_rfc3339();
    let recent: Vec<&ActivityRecord> = activities
        .iter()
        .filter(|a| a.occurred_at >= engagement_cutoff)
        .collect();
    let activity_count_30d = recent.len() as u32;
    let meeting_count_30d = recent
        .iter()
        .filter(|a| a.activity_type == "meeting")
        .count() as u32;
    let email_count_30d = recent
        .iter()
        .filter(|a| a.activity_type == "email")
        .count() as u32;

    Ok(AccountSnapshot {
        tenant_id: tenant_id.to_string(),
        account_id: account_id.to_string(),
        name: account.name,
        account_type: account.account_type,
        health_score: account.health_score,
        engagement_score: account.engagement_score,
        churn_risk: account.churn_risk,
        archived: account.archived,
        history,
        activities,
        open_follow_ups: open_follow_ups
            .into_iter()
            .map(|f| OpenFollowUp {
                action_type: f.action_type,
                priority: f.priority,
                status: f.status,
                due_date: f.due_date,
            })
            .collect(),
        open_opportunities: open_opportunities
            .into_iter()
            .map(|o| OpenOpportunity {
                stage: o.stage,
                value: o.value,
                probability: o.probability,
            })
            .collect(),
        days_since_last_activity,
        activity_count_30d,
        meeting_count_30d,
        email_count_30d,
    })
}

/// Days elapsed since a given RFC 3339 timestamp; 0 on parse failure.
pub(crate) fn days_since(date_str: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(date_str)
        .map(|dt| (Utc::now() - dt.with_timezone(&Utc)).num_days())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{seed_account, test_db};
    use crate::db::{DbActivity, DbHealthSnapshot};

    fn days_ago(days: i64) -> String {
        (Utc::now() - Duration::days(days)).to_rfc3339()
    }

    #[test]
    fn test_unknown_account_is_not_found() {
        let db = test_db();
        let err = assemble(&db, "t1", "missing", &MlConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::AccountNotFound(_)));
    }

    #[test]
    fn test_account_only_snapshot_tolerates_empty_reads() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");

        let snapshot = assemble(&db, "t1", "acme", &MlConfig::default()).expect("assemble");
        assert_eq!(snapshot.name, "Acme Corp");
        assert!(snapshot.history.is_empty());
        assert!(snapshot.activities.is_empty());
        assert!(snapshot.open_follow_ups.is_empty());
        assert!(snapshot.open_opportunities.is_empty());
        assert_eq!(snapshot.days_since_last_activity, None);
        assert_eq!(snapshot.activity_count_30d, 0);
    }

    #[test]
    fn test_derived_engagement_counts() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");

        let entries = [
            ("a1", "meeting", 3),
            ("a2", "meeting", 10),
            ("a3", "email", 5),
            ("a4", "call", 12),
            // Outside the 30-day engagement window, inside the lookback.
            ("a5", "email", 45),
        ];
        for (id, kind, age) in entries {
            db.insert_activity(&DbActivity {
                id: id.to_string(),
                tenant_id: "t1".to_string(),
                account_id: "acme".to_string(),
                activity_type: kind.to_string(),
                occurred_at: days_ago(age),
                sentiment: None,
            })
            .unwrap();
        }

        let snapshot = assemble(&db, "t1", "acme", &MlConfig::default()).expect("assemble");
        assert_eq!(snapshot.activities.len(), 5);
        assert_eq!(snapshot.activity_count_30d, 4);
        assert_eq!(snapshot.meeting_count_30d, 2);
        assert_eq!(snapshot.email_count_30d, 1);
        assert_eq!(snapshot.days_since_last_activity, Some(3));
    }

    #[test]
    fn test_history_respects_sample_limit() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");

        for i in 0..20 {
            db.insert_health_snapshot(&DbHealthSnapshot {
                id: format!("h{}", i),
                tenant_id: "t1".to_string(),
                account_id: "acme".to_string(),
                overall_score: 50.0 + i as f64,
                component_scores: None,
                trend: None,
                churn_risk: None,
                recorded_at: days_ago(i),
            })
            .unwrap();
        }

        let config = MlConfig::default();
        let snapshot = assemble(&db, "t1", "acme", &config).expect("assemble");
        assert_eq!(snapshot.history.len(), config.history_sample_limit as usize);
        // Newest first: the most recent sample was recorded today.
        assert_eq!(snapshot.history[0].overall_score, 50.0);
    }
}
