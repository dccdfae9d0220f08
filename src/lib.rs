//! AccountPulse: churn prediction pipeline for CRM accounts.
//!
//! Six cooperating pieces behind one facade:
//!
//! - **Context assembler** (`context`): reads an account and its signals
//!   into an immutable [`types::AccountSnapshot`].
//! - **Prediction engine** (`engine`): scores the snapshot, preferring an
//!   optional external service and always falling back to a deterministic
//!   rule-based heuristic.
//! - **Prediction store** (`db`): append-only SQLite persistence with
//!   lifecycle tracking.
//! - **Action policy** (`policy`): gates predictions into concrete
//!   follow-up CTAs.
//! - **Validator** (`validator`): scores expired predictions against the
//!   observed account outcome.
//! - **Risk ranker** (`ranker`): surfaces a tenant's highest-risk accounts.
//!
//! [`pipeline::ChurnPipeline`] wires them together for callers.

pub mod config;
pub mod context;
pub mod db;
pub mod engine;
pub mod error;
pub(crate) mod migrations;
pub mod pipeline;
pub mod policy;
pub mod ranker;
pub mod types;
pub mod validator;

pub use config::MlConfig;
pub use db::CrmDb;
pub use engine::PredictionEngine;
pub use error::PipelineError;
pub use pipeline::{ChurnPipeline, LatestPredictionResult};
pub use policy::CtaOutcome;
