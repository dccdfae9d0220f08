//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A row from the `accounts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAccount {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub account_type: Option<String>,
    pub health_score: Option<f64>,
    pub engagement_score: Option<f64>,
    pub churn_risk: Option<f64>,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `health_history` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbHealthSnapshot {
    pub id: String,
    pub tenant_id: String,
    pub account_id: String,
    pub overall_score: f64,
    /// JSON object of component scores, stored verbatim.
    pub component_scores: Option<String>,
    pub trend: Option<String>,
    pub churn_risk: Option<f64>,
    pub recorded_at: String,
}

/// A row from the `activities` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbActivity {
    pub id: String,
    pub tenant_id: String,
    pub account_id: String,
    pub activity_type: String,
    pub occurred_at: String,
    pub sentiment: Option<f64>,
}

/// A row from the `follow_ups` table. Owned by the CRM follow-up subsystem;
/// this crate creates and queries rows but never transitions their status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFollowUp {
    pub id: String,
    pub tenant_id: String,
    pub account_id: String,
    pub action_type: String,
    pub priority: String,
    pub title: String,
    pub status: String,
    pub reason: Option<String>,
    pub due_date: Option<String>,
    pub assigned_to: Option<String>,
    /// Back-reference to the prediction that spawned this CTA, if any.
    pub prediction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: String,
}

/// A row from the `opportunities` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbOpportunity {
    pub id: String,
    pub tenant_id: String,
    pub account_id: String,
    pub stage: String,
    pub value: Option<f64>,
    pub probability: Option<f64>,
    pub status: String,
}

/// A row from the `playbooks` table. `tenant_id = NULL` marks a global
/// playbook available to every tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPlaybook {
    pub id: String,
    pub tenant_id: Option<String>,
    pub action_type: String,
    pub title: String,
    pub guidance: Option<String>,
    pub default_priority: Option<String>,
    pub default_due_days: Option<i64>,
}
