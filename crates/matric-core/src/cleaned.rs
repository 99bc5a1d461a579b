//! Cleaned-layer record types — the normalized output of the upstream
//! ingestion/cleansing stage.
//!
//! Records here are read-only from the sync pipeline's perspective. Every
//! record carries a stable UUID identity and an `updated_at` timestamp set
//! by the cleaning stage; incremental runs filter on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── College ─────────────────────────────────────────────────────────────────

/// A college as produced by the cleaning stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct College {
  pub college_id:            Uuid,
  pub name:                  String,
  pub province:              String,
  pub city:                  Option<String>,
  pub is_985:                bool,
  pub is_211:                bool,
  pub is_double_first_class: bool,
  pub updated_at:            DateTime<Utc>,
}

// ─── Major ───────────────────────────────────────────────────────────────────

/// A major (field of study). Referenced by admission scores and plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Major {
  pub major_id:   Uuid,
  pub name:       String,
  /// Broad discipline bucket, e.g. "engineering", "medicine".
  pub category:   Option<String>,
  pub updated_at: DateTime<Utc>,
}

// ─── AdmissionScore ──────────────────────────────────────────────────────────

/// One year of admission-score history for a (college, major, province)
/// combination. Score and rank columns are nullable — historical coverage
/// is uneven.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionScore {
  pub score_id:   Uuid,
  pub college_id: Uuid,
  pub major_id:   Option<Uuid>,
  pub province:   String,
  pub year:       i32,
  /// Admission batch label, e.g. "first batch".
  pub batch:      Option<String>,
  pub min_score:  Option<f64>,
  pub avg_score:  Option<f64>,
  pub min_rank:   Option<i64>,
  pub plan_count: Option<i64>,
  pub updated_at: DateTime<Utc>,
}

// ─── EnrollmentPlan ──────────────────────────────────────────────────────────

/// Planned enrollment seats for a (college, major, province, year).
/// Consulted when an admission-score row lacks its own `plan_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentPlan {
  pub plan_id:    Uuid,
  pub college_id: Uuid,
  pub major_id:   Option<Uuid>,
  pub province:   String,
  pub year:       i32,
  pub plan_count: i64,
  pub updated_at: DateTime<Utc>,
}

// ─── CampusLife ──────────────────────────────────────────────────────────────

/// Campus-life survey sub-scores for a college. Each sub-score is on a
/// 0–100 scale; any of them may be missing for a given survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampusLife {
  pub life_id:           Uuid,
  pub college_id:        Uuid,
  pub survey_year:       Option<i32>,
  pub dorm_score:        Option<f64>,
  pub food_score:        Option<f64>,
  pub environment_score: Option<f64>,
  pub facility_score:    Option<f64>,
  pub updated_at:        DateTime<Utc>,
}

impl CampusLife {
  /// The sub-scores that are actually present, in declaration order.
  pub fn present_subscores(&self) -> Vec<f64> {
    [
      self.dorm_score,
      self.food_score,
      self.environment_score,
      self.facility_score,
    ]
    .into_iter()
    .flatten()
    .collect()
  }
}
