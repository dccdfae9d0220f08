//! Post-hoc validation of expired predictions.
//!
//! Once a prediction's validity window closes, the account's observed state
//! decides whether the prediction was accurate. A prediction is accurate
//! when it agreed with reality in either direction: it flagged an account
//! that did deteriorate, or it cleared an account that stayed healthy.

use serde::Serialize;

use crate::config::MlConfig;
use crate::db::CrmDb;
use crate::error::PipelineError;

/// Predictions at or above this probability claimed the adverse outcome.
const PREDICTED_ADVERSE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub validated_count: u64,
}

/// Validate every expired, still-active prediction for a tenant.
///
/// Records that cannot be validated (account deleted, read failure) are
/// logged and skipped; the rest of the batch proceeds.
pub fn validate_expired(
    db: &CrmDb,
    tenant_id: &str,
    config: &MlConfig,
) -> Result<ValidationOutcome, PipelineError> {
    let expired = db.list_expired_unvalidated(tenant_id)?;
    if expired.is_empty() {
        return Ok(ValidationOutcome { validated_count: 0 });
    }

    log::info!(
        "Validating {} expired prediction(s) for tenant {}",
        expired.len(),
        tenant_id
    );

    let mut validated_count = 0u64;
    for prediction in &expired {
        let account = match db.get_account(tenant_id, &prediction.account_id) {
            Ok(Some(account)) => account,
            Ok(None) => {
                log::warn!(
                    "Skipping validation of {}: account {} no longer exists",
                    prediction.id,
                    prediction.account_id
                );
                continue;
            }
            Err(e) => {
                log::warn!(
                    "Skipping validation of {}: failed to load account {}: {}",
                    prediction.id,
                    prediction.account_id,
                    e
                );
                continue;
            }
        };

        let observed_adverse = account.archived
            || account
                .churn_risk
                .map(|r| r >= config.churn_risk_thresholds.critical)
                .unwrap_or(false);
        let predicted_adverse = prediction.probability >= PREDICTED_ADVERSE_THRESHOLD;
        let was_accurate = observed_adverse == predicted_adverse;

        if db.mark_validated(tenant_id, &prediction.id, was_accurate)? {
            validated_count += 1;
        }
    }

    Ok(ValidationOutcome { validated_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::predictions::sample_draft;
    use crate::db::test_utils::{seed_account, test_db};
    use crate::types::PredictionStatus;

    fn expired_prediction(db: &CrmDb, account_id: &str, probability: f64) -> String {
        let stored = db
            .insert_prediction("t1", account_id, &sample_draft(probability, 0.7), 30)
            .expect("insert");
        db.expire_prediction("t1", &stored.id).expect("expire");
        stored.id
    }

    #[test]
    fn test_validates_all_expired() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");

        let ids = [
            expired_prediction(&db, "acme", 0.3),
            expired_prediction(&db, "acme", 0.6),
            expired_prediction(&db, "acme", 0.9),
        ];

        let outcome = validate_expired(&db, "t1", &MlConfig::default()).expect("validate");
        assert_eq!(outcome.validated_count, 3);

        for id in &ids {
            let p = db.get_prediction("t1", id).expect("query").expect("row");
            assert_eq!(p.status, PredictionStatus::Validated);
            assert!(p.was_accurate.is_some());
        }
    }

    #[test]
    fn test_accurate_when_churn_predicted_and_account_archived() {
        let db = test_db();
        let mut account = seed_account(&db, "t1", "acme", "Acme Corp");
        let id = expired_prediction(&db, "acme", 0.75);

        account.health_score = Some(35.0);
        account.churn_risk = Some(0.8);
        account.archived = true;
        db.upsert_account(&account).expect("update");

        validate_expired(&db, "t1", &MlConfig::default()).expect("validate");
        let p = db.get_prediction("t1", &id).expect("query").expect("row");
        assert_eq!(p.was_accurate, Some(true));
    }

    #[test]
    fn test_accurate_when_no_churn_predicted_and_account_healthy() {
        let db = test_db();
        let mut account = seed_account(&db, "t1", "acme", "Acme Corp");
        let id = expired_prediction(&db, "acme", 0.3);

        account.health_score = Some(80.0);
        account.churn_risk = Some(0.1);
        account.archived = false;
        db.upsert_account(&account).expect("update");

        validate_expired(&db, "t1", &MlConfig::default()).expect("validate");
        let p = db.get_prediction("t1", &id).expect("query").expect("row");
        assert_eq!(p.was_accurate, Some(true));
    }

    #[test]
    fn test_inaccurate_when_prediction_missed() {
        let db = test_db();
        let mut account = seed_account(&db, "t1", "acme", "Acme Corp");
        let id = expired_prediction(&db, "acme", 0.8);

        // Account stayed healthy despite the churn call.
        account.churn_risk = Some(0.1);
        db.upsert_account(&account).expect("update");

        validate_expired(&db, "t1", &MlConfig::default()).expect("validate");
        let p = db.get_prediction("t1", &id).expect("query").expect("row");
        assert_eq!(p.was_accurate, Some(false));
    }

    #[test]
    fn test_missing_account_skipped_batch_continues() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");

        // Prediction for an account that was never created.
        let orphan = expired_prediction(&db, "ghost", 0.7);
        let valid = expired_prediction(&db, "acme", 0.7);

        let outcome = validate_expired(&db, "t1", &MlConfig::default()).expect("validate");
        assert_eq!(outcome.validated_count, 1);

        let skipped = db
            .get_prediction("t1", &orphan)
            .expect("query")
            .expect("row");
        assert_eq!(skipped.status, PredictionStatus::Active);
        assert!(skipped.was_accurate.is_none());

        let done = db.get_prediction("t1", &valid).expect("query").expect("row");
        assert_eq!(done.status, PredictionStatus::Validated);
    }

    #[test]
    fn test_nothing_expired_is_a_noop() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");
        db.insert_prediction("t1", "acme", &sample_draft(0.7, 0.7), 30)
            .expect("insert");

        let outcome = validate_expired(&db, "t1", &MlConfig::default()).expect("validate");
        assert_eq!(outcome.validated_count, 0);
    }
}
