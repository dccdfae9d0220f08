//! Prediction Store: the append-only `predictions` table.
//!
//! Rows are created here with status ACTIVE and a validity end computed from
//! the configured validity period. They are mutated in exactly two ways
//! afterwards: the Validator sets status/correctness, and the Action Policy
//! attaches a follow-up link. Never deleted: history stays for audit and
//! accuracy trending, and "latest" queries always take the most recent row.

use chrono::{Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::*;
use crate::types::{
    AccuracyReport, ModelProvenance, Prediction, PredictionDraft, PredictionStatus,
    PredictionType, RiskCategory, TypeAccuracy,
};

const PREDICTION_COLUMNS: &str = "id, tenant_id, account_id, prediction_type, probability, \
     confidence, window_days, risk_category, risk_factors, explanation, recommendations, \
     suggested_action, model, input_tokens, output_tokens, latency_ms, cost_usd, \
     created_at, valid_until, status, was_accurate, follow_up_id";

fn column_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn enum_error(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    column_error(
        idx,
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unknown {}: {}", what, value),
        ),
    )
}

impl CrmDb {
    /// Persist an engine draft: assigns an id, sets status ACTIVE, and sets
    /// validity end = now + `validity_days`. Returns the stored prediction.
    pub fn insert_prediction(
        &self,
        tenant_id: &str,
        account_id: &str,
        draft: &PredictionDraft,
        validity_days: i64,
    ) -> Result<Prediction, DbError> {
        let id = format!("pred-{}", Uuid::new_v4());
        let now = Utc::now();
        let created_at = now.to_rfc3339();
        let valid_until = (now + Duration::days(validity_days)).to_rfc3339();

        let risk_factors = serde_json::to_string(&draft.risk_factors)?;
        let recommendations = serde_json::to_string(&draft.recommendations)?;
        let suggested_action = draft
            .suggested_action
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            &format!(
                "INSERT INTO predictions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                PREDICTION_COLUMNS
            ),
            params![
                id,
                tenant_id,
                account_id,
                draft.prediction_type.as_str(),
                draft.probability,
                draft.confidence,
                draft.window_days,
                draft.risk_category.as_str(),
                risk_factors,
                draft.explanation,
                recommendations,
                suggested_action,
                draft.provenance.model,
                draft.provenance.input_tokens,
                draft.provenance.output_tokens,
                draft.provenance.latency_ms,
                draft.provenance.cost_usd,
                created_at,
                valid_until,
                PredictionStatus::Active.as_str(),
                Option::<i32>::None,
                Option::<String>::None,
            ],
        )?;

        Ok(Prediction {
            id,
            tenant_id: tenant_id.to_string(),
            account_id: account_id.to_string(),
            prediction_type: draft.prediction_type,
            probability: draft.probability,
            confidence: draft.confidence,
            window_days: draft.window_days,
            risk_category: draft.risk_category,
            risk_factors: draft.risk_factors.clone(),
            explanation: draft.explanation.clone(),
            recommendations: draft.recommendations.clone(),
            suggested_action: draft.suggested_action.clone(),
            provenance: draft.provenance.clone(),
            created_at,
            valid_until,
            status: PredictionStatus::Active,
            was_accurate: None,
            follow_up_id: None,
        })
    }

    /// Most recent ACTIVE, non-expired prediction for an account/type, or none.
    pub fn get_latest_prediction(
        &self,
        tenant_id: &str,
        account_id: &str,
        prediction_type: PredictionType,
    ) -> Result<Option<Prediction>, DbError> {
        let now = Utc::now().to_rfc3339();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM predictions
             WHERE tenant_id = ?1 AND account_id = ?2 AND prediction_type = ?3
               AND status = 'ACTIVE' AND valid_until > ?4
             ORDER BY created_at DESC
             LIMIT 1",
            PREDICTION_COLUMNS
        ))?;
        let mut rows = stmt.query_map(
            params![tenant_id, account_id, prediction_type.as_str(), now],
            Self::map_prediction_row,
        )?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Fetch a prediction by id within a tenant.
    pub fn get_prediction(&self, tenant_id: &str, id: &str) -> Result<Option<Prediction>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM predictions WHERE tenant_id = ?1 AND id = ?2",
            PREDICTION_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![tenant_id, id], Self::map_prediction_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All ACTIVE predictions whose validity end has passed, oldest first.
    /// These are the validator's batch candidates.
    pub fn list_expired_unvalidated(&self, tenant_id: &str) -> Result<Vec<Prediction>, DbError> {
        let now = Utc::now().to_rfc3339();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM predictions
             WHERE tenant_id = ?1 AND status = 'ACTIVE' AND valid_until <= ?2
             ORDER BY valid_until ASC",
            PREDICTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![tenant_id, now], Self::map_prediction_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Attach a generated follow-up reference. Idempotent per prediction:
    /// re-linking the same follow-up succeeds, linking a different one to an
    /// already-linked prediction is a no-op.
    pub fn link_follow_up(
        &self,
        tenant_id: &str,
        prediction_id: &str,
        follow_up_id: &str,
    ) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "UPDATE predictions SET follow_up_id = ?3
             WHERE tenant_id = ?1 AND id = ?2
               AND (follow_up_id IS NULL OR follow_up_id = ?3)",
            params![tenant_id, prediction_id, follow_up_id],
        )?;
        Ok(rows > 0)
    }

    /// Transition ACTIVE → VALIDATED with the computed correctness flag.
    /// Single-row UPDATE so concurrent latest-prediction reads observe either
    /// the old or the new row, never a partial one.
    pub fn mark_validated(
        &self,
        tenant_id: &str,
        prediction_id: &str,
        was_accurate: bool,
    ) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE predictions
             SET status = 'VALIDATED', was_accurate = ?3, validated_at = ?4
             WHERE tenant_id = ?1 AND id = ?2 AND status = 'ACTIVE'",
            params![tenant_id, prediction_id, was_accurate as i32, now],
        )?;
        Ok(rows > 0)
    }

    /// Aggregate accuracy for a tenant: overall triple plus per-type breakdown.
    pub fn prediction_accuracy(&self, tenant_id: &str) -> Result<AccuracyReport, DbError> {
        let (total, validated, accurate): (u64, u64, u64) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'VALIDATED'), 0),
                    COALESCE(SUM(was_accurate = 1), 0)
             FROM predictions WHERE tenant_id = ?1",
            params![tenant_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT prediction_type, COUNT(*),
                    COALESCE(SUM(status = 'VALIDATED'), 0),
                    COALESCE(SUM(was_accurate = 1), 0)
             FROM predictions WHERE tenant_id = ?1
             GROUP BY prediction_type
             ORDER BY prediction_type",
        )?;
        let rows = stmt.query_map(params![tenant_id], |row| {
            let type_str: String = row.get(0)?;
            let prediction_type = PredictionType::parse(&type_str)
                .ok_or_else(|| enum_error(0, "prediction type", &type_str))?;
            Ok(TypeAccuracy {
                prediction_type,
                total: row.get(1)?,
                validated: row.get(2)?,
                accurate: row.get(3)?,
            })
        })?;
        let by_type = rows.collect::<Result<Vec<_>, _>>()?;

        let accuracy = if validated > 0 {
            accurate as f64 / validated as f64
        } else {
            0.0
        };

        Ok(AccuracyReport {
            total,
            validated,
            accurate,
            accuracy,
            by_type,
        })
    }

    pub(crate) fn map_prediction_row(row: &Row<'_>) -> rusqlite::Result<Prediction> {
        let type_str: String = row.get(3)?;
        let prediction_type = PredictionType::parse(&type_str)
            .ok_or_else(|| enum_error(3, "prediction type", &type_str))?;

        let category_str: String = row.get(7)?;
        let risk_category = RiskCategory::parse(&category_str)
            .ok_or_else(|| enum_error(7, "risk category", &category_str))?;

        let factors_json: String = row.get(8)?;
        let risk_factors = serde_json::from_str(&factors_json).map_err(|e| column_error(8, e))?;

        let recs_json: String = row.get(10)?;
        let recommendations = serde_json::from_str(&recs_json).map_err(|e| column_error(10, e))?;

        let suggested_json: Option<String> = row.get(11)?;
        let suggested_action = suggested_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| column_error(11, e))?;

        let status_str: String = row.get(19)?;
        let status = PredictionStatus::parse(&status_str)
            .ok_or_else(|| enum_error(19, "prediction status", &status_str))?;

        Ok(Prediction {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            account_id: row.get(2)?,
            prediction_type,
            probability: row.get(4)?,
            confidence: row.get(5)?,
            window_days: row.get(6)?,
            risk_category,
            risk_factors,
            explanation: row.get(9)?,
            recommendations,
            suggested_action,
            provenance: ModelProvenance {
                model: row.get(12)?,
                input_tokens: row.get(13)?,
                output_tokens: row.get(14)?,
                latency_ms: row.get(15)?,
                cost_usd: row.get(16)?,
            },
            created_at: row.get(17)?,
            valid_until: row.get(18)?,
            status,
            was_accurate: row.get::<_, Option<i32>>(20)?.map(|v| v != 0),
            follow_up_id: row.get(21)?,
        })
    }

    /// Force a prediction's validity end into the past. Test-only hook for
    /// exercising the validator without waiting out the validity period.
    #[cfg(test)]
    pub(crate) fn expire_prediction(&self, tenant_id: &str, id: &str) -> Result<(), DbError> {
        let past = (Utc::now() - Duration::days(1)).to_rfc3339();
        self.conn.execute(
            "UPDATE predictions SET valid_until = ?3 WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id, past],
        )?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_draft(probability: f64, confidence: f64) -> PredictionDraft {
    use crate::types::{FactorTrend, Impact, RiskFactor};

    PredictionDraft {
        prediction_type: PredictionType::Churn,
        probability,
        confidence,
        window_days: 90,
        risk_category: crate::config::ChurnRiskThresholds::default().category(probability),
        risk_factors: vec![RiskFactor {
            factor: "Health score".to_string(),
            impact: Impact::High,
            current_value: 35.0,
            trend: FactorTrend::Worsening,
            description: "Health score is 35 of 100".to_string(),
        }],
        explanation: "Low health score with declining trend".to_string(),
        recommendations: vec![],
        suggested_action: None,
        provenance: ModelProvenance::rule_based(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_store_then_get_latest_round_trip() {
        let db = test_db();
        let draft = sample_draft(0.72, 0.65);
        let stored = db
            .insert_prediction("t1", "acme", &draft, 30)
            .expect("insert");
        assert!(stored.id.starts_with("pred-"));
        assert_eq!(stored.status, PredictionStatus::Active);

        let latest = db
            .get_latest_prediction("t1", "acme", PredictionType::Churn)
            .expect("query")
            .expect("row");
        assert_eq!(latest.id, stored.id);
        assert_eq!(latest.probability, 0.72);
        assert_eq!(latest.confidence, 0.65);
        assert_eq!(latest.risk_factors.len(), 1);
        assert_eq!(latest.risk_factors[0].factor, "Health score");
        assert_eq!(latest.provenance.model, "rule-based-fallback");
    }

    #[test]
    fn test_latest_takes_most_recent() {
        let db = test_db();
        db.insert_prediction("t1", "acme", &sample_draft(0.3, 0.6), 30)
            .expect("first");
        let second = db
            .insert_prediction("t1", "acme", &sample_draft(0.8, 0.7), 30)
            .expect("second");

        let latest = db
            .get_latest_prediction("t1", "acme", PredictionType::Churn)
            .expect("query")
            .expect("row");
        assert_eq!(latest.id, second.id);
    }

    #[test]
    fn test_expired_predictions_not_latest() {
        let db = test_db();
        let stored = db
            .insert_prediction("t1", "acme", &sample_draft(0.7, 0.6), 30)
            .expect("insert");
        db.expire_prediction("t1", &stored.id).expect("expire");

        let latest = db
            .get_latest_prediction("t1", "acme", PredictionType::Churn)
            .expect("query");
        assert!(latest.is_none());

        let expired = db.list_expired_unvalidated("t1").expect("list");
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stored.id);
    }

    #[test]
    fn test_mark_validated_is_terminal() {
        let db = test_db();
        let stored = db
            .insert_prediction("t1", "acme", &sample_draft(0.7, 0.6), 30)
            .expect("insert");
        db.expire_prediction("t1", &stored.id).expect("expire");

        assert!(db.mark_validated("t1", &stored.id, true).expect("validate"));
        // Already terminal; second transition is a no-op.
        assert!(!db.mark_validated("t1", &stored.id, false).expect("revalidate"));

        let row = db
            .get_prediction("t1", &stored.id)
            .expect("query")
            .expect("row");
        assert_eq!(row.status, PredictionStatus::Validated);
        assert_eq!(row.was_accurate, Some(true));
    }

    #[test]
    fn test_link_follow_up_idempotent() {
        let db = test_db();
        let stored = db
            .insert_prediction("t1", "acme", &sample_draft(0.7, 0.6), 30)
            .expect("insert");

        assert!(db.link_follow_up("t1", &stored.id, "cta-1").expect("link"));
        assert!(db.link_follow_up("t1", &stored.id, "cta-1").expect("relink"));
        // A different follow-up does not overwrite the existing link.
        assert!(!db.link_follow_up("t1", &stored.id, "cta-2").expect("other"));

        let row = db
            .get_prediction("t1", &stored.id)
            .expect("query")
            .expect("row");
        assert_eq!(row.follow_up_id.as_deref(), Some("cta-1"));
    }

    #[test]
    fn test_accuracy_report() {
        let db = test_db();
        let p1 = db
            .insert_prediction("t1", "acme", &sample_draft(0.8, 0.6), 30)
            .unwrap();
        let p2 = db
            .insert_prediction("t1", "globex", &sample_draft(0.3, 0.6), 30)
            .unwrap();
        db.insert_prediction("t1", "initech", &sample_draft(0.5, 0.6), 30)
            .unwrap();

        db.mark_validated("t1", &p1.id, true).unwrap();
        db.mark_validated("t1", &p2.id, false).unwrap();

        let report = db.prediction_accuracy("t1").expect("report");
        assert_eq!(report.total, 3);
        assert_eq!(report.validated, 2);
        assert_eq!(report.accurate, 1);
        assert!((report.accuracy - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.by_type.len(), 1);
        assert_eq!(report.by_type[0].prediction_type, PredictionType::Churn);
        assert_eq!(report.by_type[0].total, 3);
    }

    #[test]
    fn test_accuracy_empty_tenant() {
        let db = test_db();
        let report = db.prediction_accuracy("t-empty").expect("report");
        assert_eq!(report.total, 0);
        assert_eq!(report.accuracy, 0.0);
        assert!(report.by_type.is_empty());
    }
}
