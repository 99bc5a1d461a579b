//! Core-layer record types — the denormalized, read-optimized materialization
//! of the cleaned layer.
//!
//! Each core record keeps the *same* UUID as its cleaned counterpart
//! (identity is never regenerated), embeds redundant snapshot fields copied
//! from directly related records at sync time, embeds computed statistic
//! fields, and carries [`SyncMeta`]. Snapshot fields reflect the referenced
//! record as of the last sync — staleness between syncs is expected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stats::DifficultyLevel;

// ─── Sync metadata ───────────────────────────────────────────────────────────

/// Bookkeeping attached to every core record by the store on upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMeta {
  /// Starts at 1 on first sync; incremented by exactly 1 per successful
  /// write. Monotonic, never reset.
  pub data_version:   i64,
  /// Wall-clock time of the write; never copied from the source record.
  pub last_synced_at: DateTime<Utc>,
  pub sync_source:    String,
}

// ─── CoreCollege ─────────────────────────────────────────────────────────────

/// Denormalized college record: business copy plus roll-ups, windowed
/// admission statistics, and computed indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreCollege {
  pub college_id:            Uuid,
  pub name:                  String,
  pub province:              String,
  pub city:                  Option<String>,
  pub is_985:                bool,
  pub is_211:                bool,
  pub is_double_first_class: bool,

  // Roll-ups over related cleaned records.
  pub major_count:               i64,
  pub enrollment_province_count: i64,

  // Windowed admission statistics. The 3-year window is
  // [reference_year - 3, reference_year]; the "latest year" statistics
  // cover reference_year - 1 only.
  pub avg_score_recent3:     Option<f64>,
  pub min_rank_recent3:      Option<i64>,
  pub latest_year_min_score: Option<f64>,
  pub latest_year_min_rank:  Option<i64>,

  // Computed statistic fields.
  pub hot_level:          u8,
  pub difficulty:         DifficultyLevel,
  pub score_volatility:   Option<f64>,
  pub overall_life_score: Option<f64>,

  pub meta: SyncMeta,
}

/// Input to `CoreStore::upsert_college`. Identical to [`CoreCollege`] minus
/// [`SyncMeta`], which the store assigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoreCollege {
  pub college_id:            Uuid,
  pub name:                  String,
  pub province:              String,
  pub city:                  Option<String>,
  pub is_985:                bool,
  pub is_211:                bool,
  pub is_double_first_class: bool,

  pub major_count:               i64,
  pub enrollment_province_count: i64,

  pub avg_score_recent3:     Option<f64>,
  pub min_rank_recent3:      Option<i64>,
  pub latest_year_min_score: Option<f64>,
  pub latest_year_min_rank:  Option<i64>,

  pub hot_level:          u8,
  pub difficulty:         DifficultyLevel,
  pub score_volatility:   Option<f64>,
  pub overall_life_score: Option<f64>,
}

impl NewCoreCollege {
  /// Attach store-assigned metadata, producing the persisted form.
  pub fn into_core(self, meta: SyncMeta) -> CoreCollege {
    CoreCollege {
      college_id: self.college_id,
      name: self.name,
      province: self.province,
      city: self.city,
      is_985: self.is_985,
      is_211: self.is_211,
      is_double_first_class: self.is_double_first_class,
      major_count: self.major_count,
      enrollment_province_count: self.enrollment_province_count,
      avg_score_recent3: self.avg_score_recent3,
      min_rank_recent3: self.min_rank_recent3,
      latest_year_min_score: self.latest_year_min_score,
      latest_year_min_rank: self.latest_year_min_rank,
      hot_level: self.hot_level,
      difficulty: self.difficulty,
      score_volatility: self.score_volatility,
      overall_life_score: self.overall_life_score,
      meta,
    }
  }
}

// ─── CoreAdmissionScore ──────────────────────────────────────────────────────

/// Denormalized admission-score record: business copy plus college/major
/// snapshots and the competitiveness index.
///
/// `college_id` / `major_id` are either NULL or reference an existing core
/// record of that kind; snapshot columns are NULL when the relation was
/// absent at sync time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreAdmissionScore {
  pub score_id:   Uuid,
  pub college_id: Option<Uuid>,
  pub major_id:   Option<Uuid>,
  pub province:   String,
  pub year:       i32,
  pub batch:      Option<String>,
  pub min_score:  Option<f64>,
  pub avg_score:  Option<f64>,
  pub min_rank:   Option<i64>,
  /// Row value if present, otherwise resolved from the matching
  /// enrollment plan.
  pub plan_count: Option<i64>,

  // College snapshot.
  pub college_name:     Option<String>,
  pub college_province: Option<String>,
  pub college_is_985:   Option<bool>,

  // Major snapshot.
  pub major_name:     Option<String>,
  pub major_category: Option<String>,

  pub competitiveness: u8,

  pub meta: SyncMeta,
}

/// Input to `CoreStore::upsert_admission_score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoreAdmissionScore {
  pub score_id:   Uuid,
  pub college_id: Option<Uuid>,
  pub major_id:   Option<Uuid>,
  pub province:   String,
  pub year:       i32,
  pub batch:      Option<String>,
  pub min_score:  Option<f64>,
  pub avg_score:  Option<f64>,
  pub min_rank:   Option<i64>,
  pub plan_count: Option<i64>,

  pub college_name:     Option<String>,
  pub college_province: Option<String>,
  pub college_is_985:   Option<bool>,

  pub major_name:     Option<String>,
  pub major_category: Option<String>,

  pub competitiveness: u8,
}

impl NewCoreAdmissionScore {
  /// Attach store-assigned metadata, producing the persisted form.
  pub fn into_core(self, meta: SyncMeta) -> CoreAdmissionScore {
    CoreAdmissionScore {
      score_id: self.score_id,
      college_id: self.college_id,
      major_id: self.major_id,
      province: self.province,
      year: self.year,
      batch: self.batch,
      min_score: self.min_score,
      avg_score: self.avg_score,
      min_rank: self.min_rank,
      plan_count: self.plan_count,
      college_name: self.college_name,
      college_province: self.college_province,
      college_is_985: self.college_is_985,
      major_name: self.major_name,
      major_category: self.major_category,
      competitiveness: self.competitiveness,
      meta,
    }
  }
}

// ─── CoreCampusLife ──────────────────────────────────────────────────────────

/// Denormalized campus-life record with the aggregate life score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreCampusLife {
  pub life_id:           Uuid,
  pub college_id:        Option<Uuid>,
  pub survey_year:       Option<i32>,
  pub dorm_score:        Option<f64>,
  pub food_score:        Option<f64>,
  pub environment_score: Option<f64>,
  pub facility_score:    Option<f64>,

  pub college_name: Option<String>,

  pub overall_life_score: Option<f64>,

  pub meta: SyncMeta,
}

/// Input to `CoreStore::upsert_campus_life`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoreCampusLife {
  pub life_id:           Uuid,
  pub college_id:        Option<Uuid>,
  pub survey_year:       Option<i32>,
  pub dorm_score:        Option<f64>,
  pub food_score:        Option<f64>,
  pub environment_score: Option<f64>,
  pub facility_score:    Option<f64>,

  pub college_name: Option<String>,

  pub overall_life_score: Option<f64>,
}

impl NewCoreCampusLife {
  /// Attach store-assigned metadata, producing the persisted form.
  pub fn into_core(self, meta: SyncMeta) -> CoreCampusLife {
    CoreCampusLife {
      life_id: self.life_id,
      college_id: self.college_id,
      survey_year: self.survey_year,
      dorm_score: self.dorm_score,
      food_score: self.food_score,
      environment_score: self.environment_score,
      facility_score: self.facility_score,
      college_name: self.college_name,
      overall_life_score: self.overall_life_score,
      meta,
    }
  }
}
