//! Action policy: decides whether a prediction earns a concrete CTA.
//!
//! Gates run in a fixed order (confidence, suggestion presence, cooldown,
//! risk category). A skip is a normal outcome, not an error, and every skip
//! carries a human-readable reason.

use std::fmt;

use chrono::{Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::MlConfig;
use crate::db::{CrmDb, DbFollowUp};
use crate::error::PipelineError;
use crate::types::{Prediction, PredictionType, RiskCategory};

/// Why the policy declined to create a follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    LowConfidence,
    NoSuggestion,
    CooldownActive,
    RiskTooLow,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::LowConfidence => "confidence below threshold",
            SkipReason::NoSuggestion => "prediction did not include a CTA suggestion",
            SkipReason::CooldownActive => "cooldown active",
            SkipReason::RiskTooLow => "risk does not warrant CTA",
        };
        f.write_str(s)
    }
}

/// Outcome of running the policy against one prediction.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CtaOutcome {
    Created { follow_up: DbFollowUp },
    Skipped { reason: SkipReason },
}

impl CtaOutcome {
    pub fn created(&self) -> Option<&DbFollowUp> {
        match self {
            CtaOutcome::Created { follow_up } => Some(follow_up),
            CtaOutcome::Skipped { .. } => None,
        }
    }
}

/// Deterministic key over the inputs that define "the same CTA".
fn idempotency_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Run the CTA gates for a stored prediction and, if all pass, create the
/// follow-up and link it back onto the prediction.
pub fn generate_action_from_prediction(
    db: &CrmDb,
    tenant_id: &str,
    account_id: &str,
    prediction: &Prediction,
    user_id: Option<&str>,
    config: &MlConfig,
) -> Result<CtaOutcome, PipelineError> {
    if prediction.confidence < config.cta_confidence_threshold {
        log::info!(
            "Skipping CTA for prediction {}: confidence {:.2} below threshold {:.2}",
            prediction.id,
            prediction.confidence,
            config.cta_confidence_threshold
        );
        return Ok(CtaOutcome::Skipped {
            reason: SkipReason::LowConfidence,
        });
    }

    let suggestion = match &prediction.suggested_action {
        Some(s) => s,
        None => {
            return Ok(CtaOutcome::Skipped {
                reason: SkipReason::NoSuggestion,
            })
        }
    };

    let cooldown_start = Utc::now() - Duration::days(config.cta_cooldown_days);
    if let Some(recent) =
        db.get_latest_follow_up_of_type(tenant_id, account_id, &suggestion.action_type)?
    {
        if recent.created_at > cooldown_start.to_rfc3339() {
            log::info!(
                "Skipping CTA for prediction {}: {} created {} is inside the {}-day cooldown",
                prediction.id,
                suggestion.action_type,
                recent.created_at,
                config.cta_cooldown_days
            );
            return Ok(CtaOutcome::Skipped {
                reason: SkipReason::CooldownActive,
            });
        }
    }

    if prediction.prediction_type == PredictionType::Churn
        && prediction.risk_category == RiskCategory::Low
    {
        return Ok(CtaOutcome::Skipped {
            reason: SkipReason::RiskTooLow,
        });
    }

    // Playbook enrichment is best effort; the suggestion stands on its own.
    let playbook = db.get_playbook(tenant_id, &suggestion.action_type)?;
    let title = playbook
        .as_ref()
        .filter(|p| !p.title.is_empty())
        .map(|p| p.title.clone())
        .unwrap_or_else(|| suggestion.title.clone());
    let priority = playbook
        .as_ref()
        .and_then(|p| p.default_priority.clone())
        .unwrap_or_else(|| suggestion.priority.clone());
    let due_in_days = playbook
        .as_ref()
        .and_then(|p| p.default_due_days)
        .unwrap_or(suggestion.due_in_days);

    let now = Utc::now();
    let follow_up = DbFollowUp {
        id: format!("cta-{}", Uuid::new_v4()),
        tenant_id: tenant_id.to_string(),
        account_id: account_id.to_string(),
        action_type: suggestion.action_type.clone(),
        priority,
        title,
        status: "OPEN".to_string(),
        reason: Some(suggestion.reason.clone()),
        due_date: Some((now + Duration::days(due_in_days)).to_rfc3339()),
        assigned_to: user_id.map(str::to_string),
        prediction_id: Some(prediction.id.clone()),
        idempotency_key: Some(idempotency_key(&[
            tenant_id,
            account_id,
            &prediction.id,
            &suggestion.action_type,
        ])),
        created_at: now.to_rfc3339(),
    };

    let inserted = db.with_transaction(|db| {
        let inserted = db.create_follow_up(&follow_up)?;
        if inserted {
            db.link_follow_up(tenant_id, &prediction.id, &follow_up.id)?;
        }
        Ok(inserted)
    })?;

    if !inserted {
        // A concurrent call already created this exact CTA.
        return Ok(CtaOutcome::Skipped {
            reason: SkipReason::CooldownActive,
        });
    }

    log::info!(
        "Created CTA {} ({}) for account {} from prediction {}",
        follow_up.id,
        follow_up.action_type,
        account_id,
        prediction.id
    );
    Ok(CtaOutcome::Created { follow_up })
}
