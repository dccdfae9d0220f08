//! Risk ranking: active churn predictions joined onto live accounts.

use rusqlite::params;

use crate::db::CrmDb;
use crate::error::PipelineError;
use crate::types::{AccountSummary, HighRiskAccount};

/// Accounts whose latest active churn prediction meets `min_probability`,
/// highest risk first. Archived accounts never rank.
pub fn high_risk_accounts(
    db: &CrmDb,
    tenant_id: &str,
    min_probability: f64,
    limit: u32,
) -> Result<Vec<HighRiskAccount>, PipelineError> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut stmt = db.conn_ref().prepare(
        "SELECT p.id, p.tenant_id, p.account_id, p.prediction_type, p.probability,
                p.confidence, p.window_days, p.risk_category, p.risk_factors, p.explanation,
                p.recommendations, p.suggested_action, p.model, p.input_tokens, p.output_tokens,
                p.latency_ms, p.cost_usd, p.created_at, p.valid_until, p.status, p.was_accurate,
                p.follow_up_id,
                a.id, a.name, a.account_type, a.health_score
         FROM predictions p
         JOIN accounts a ON a.tenant_id = p.tenant_id AND a.id = p.account_id
         WHERE p.tenant_id = ?1
           AND p.prediction_type = 'CHURN'
           AND p.status = 'ACTIVE'
           AND p.valid_until > ?2
           AND p.probability >= ?3
           AND a.archived = 0
           AND p.created_at = (
               SELECT MAX(p2.created_at) FROM predictions p2
               WHERE p2.tenant_id = p.tenant_id AND p2.account_id = p.account_id
                 AND p2.prediction_type = 'CHURN' AND p2.status = 'ACTIVE'
                 AND p2.valid_until > ?2
           )
         ORDER BY p.probability DESC
         LIMIT ?4",
    ).map_err(crate::db::DbError::from)?;

    let rows = stmt
        .query_map(params![tenant_id, now, min_probability, limit], |row| {
            let prediction = CrmDb::map_prediction_row(row)?;
            Ok(HighRiskAccount {
                account: AccountSummary {
                    id: row.get(22)?,
                    name: row.get(23)?,
                    account_type: row.get(24)?,
                    health_score: row.get(25)?,
                },
                prediction,
            })
        })
        .map_err(crate::db::DbError::from)?;

    let ranked = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(crate::db::DbError::from)?;
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::predictions::sample_draft;
    use crate::db::test_utils::{seed_account, test_db};

    fn predict(db: &CrmDb, account_id: &str, probability: f64) {
        db.insert_prediction("t1", account_id, &sample_draft(probability, 0.7), 30)
            .expect("insert");
    }

    #[test]
    fn test_ranked_by_probability_descending() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");
        seed_account(&db, "t1", "globex", "Globex");
        seed_account(&db, "t1", "initech", "Initech");

        predict(&db, "acme", 0.65);
        predict(&db, "globex", 0.9);
        predict(&db, "initech", 0.72);

        let ranked = high_risk_accounts(&db, "t1", 0.5, 10).expect("rank");
        let ids: Vec<&str> = ranked.iter().map(|r| r.account.id.as_str()).collect();
        assert_eq!(ids, vec!["globex", "initech", "acme"]);
    }

    #[test]
    fn test_threshold_filters() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");
        seed_account(&db, "t1", "globex", "Globex");
        predict(&db, "acme", 0.3);
        predict(&db, "globex", 0.7);

        let ranked = high_risk_accounts(&db, "t1", 0.5, 10).expect("rank");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].account.id, "globex");
    }

    #[test]
    fn test_archived_accounts_never_rank() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");
        predict(&db, "acme", 0.9);
        assert!(db.archive_account("t1", "acme").expect("archive"));

        let ranked = high_risk_accounts(&db, "t1", 0.5, 10).expect("rank");
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_only_latest_prediction_per_account() {
        let db = test_db();
        seed_account(&db, "t1", "acme", "Acme Corp");
        predict(&db, "acme", 0.95);
        std::thread::sleep(std::time::Duration::from_millis(5));
        predict(&db, "acme", 0.62);

        let ranked = high_risk_accounts(&db, "t1", 0.5, 10).expect("rank");
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].prediction.probability - 0.62).abs() < f64::EPSILON);
    }

    #[test]
    fn test_limit_and_tenant_isolation() {
        let db = test_db();
        for (tenant, id) in [("t1", "a"), ("t1", "b"), ("t1", "c"), ("t2", "d")] {
            seed_account(&db, tenant, id, id);
            db.insert_prediction(tenant, id, &sample_draft(0.8, 0.7), 30)
                .expect("insert");
        }

        let ranked = high_risk_accounts(&db, "t1", 0.5, 2).expect("rank");
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.prediction.tenant_id == "t1"));
    }
}
