//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Enums are stored as their snake_case
//! discriminants.

use chrono::{DateTime, Utc};
use matric_core::{
  audit::{EntityKind, SyncRun, SyncStats, SyncStatus, SyncType},
  cleaned::{AdmissionScore, CampusLife, College, EnrollmentPlan, Major},
  core_layer::{
    CoreAdmissionScore, CoreCampusLife, CoreCollege, SyncMeta,
  },
  stats::DifficultyLevel,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_opt_uuid(id: Option<Uuid>) -> Option<String> {
  id.map(encode_uuid)
}

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── DifficultyLevel ─────────────────────────────────────────────────────────

pub fn encode_difficulty(d: DifficultyLevel) -> &'static str { d.as_str() }

pub fn decode_difficulty(s: &str) -> Result<DifficultyLevel> {
  match s {
    "very_hard" => Ok(DifficultyLevel::VeryHard),
    "hard" => Ok(DifficultyLevel::Hard),
    "medium" => Ok(DifficultyLevel::Medium),
    "easy" => Ok(DifficultyLevel::Easy),
    other => Err(Error::Decode(format!("unknown difficulty: {other:?}"))),
  }
}

// ─── EntityKind ──────────────────────────────────────────────────────────────

pub fn encode_entity_kind(k: EntityKind) -> &'static str {
  match k {
    EntityKind::College => "college",
    EntityKind::AdmissionScore => "admission_score",
    EntityKind::CampusLife => "campus_life",
    EntityKind::Major => "major",
    EntityKind::EnrollmentPlan => "enrollment_plan",
  }
}

pub fn decode_entity_kind(s: &str) -> Result<EntityKind> {
  match s {
    "college" => Ok(EntityKind::College),
    "admission_score" => Ok(EntityKind::AdmissionScore),
    "campus_life" => Ok(EntityKind::CampusLife),
    "major" => Ok(EntityKind::Major),
    "enrollment_plan" => Ok(EntityKind::EnrollmentPlan),
    other => Err(Error::Decode(format!("unknown entity kind: {other:?}"))),
  }
}

// ─── SyncType / SyncStatus ───────────────────────────────────────────────────

pub fn encode_sync_type(t: SyncType) -> &'static str {
  match t {
    SyncType::Full => "full",
    SyncType::Incremental => "incremental",
  }
}

pub fn decode_sync_type(s: &str) -> Result<SyncType> {
  match s {
    "full" => Ok(SyncType::Full),
    "incremental" => Ok(SyncType::Incremental),
    other => Err(Error::Decode(format!("unknown sync type: {other:?}"))),
  }
}

pub fn encode_sync_status(s: SyncStatus) -> &'static str {
  match s {
    SyncStatus::Pending => "pending",
    SyncStatus::Running => "running",
    SyncStatus::Completed => "completed",
    SyncStatus::CompletedWithErrors => "completed_with_errors",
    SyncStatus::Failed => "failed",
  }
}

pub fn decode_sync_status(s: &str) -> Result<SyncStatus> {
  match s {
    "pending" => Ok(SyncStatus::Pending),
    "running" => Ok(SyncStatus::Running),
    "completed" => Ok(SyncStatus::Completed),
    "completed_with_errors" => Ok(SyncStatus::CompletedWithErrors),
    "failed" => Ok(SyncStatus::Failed),
    other => Err(Error::Decode(format!("unknown sync status: {other:?}"))),
  }
}

// ─── Row types — cleaned layer ───────────────────────────────────────────────

/// Raw strings read directly from a `colleges` row.
pub struct RawCollege {
  pub college_id:            String,
  pub name:                  String,
  pub province:              String,
  pub city:                  Option<String>,
  pub is_985:                bool,
  pub is_211:                bool,
  pub is_double_first_class: bool,
  pub updated_at:            String,
}

impl RawCollege {
  pub fn into_college(self) -> Result<College> {
    Ok(College {
      college_id: decode_uuid(&self.college_id)?,
      name: self.name,
      province: self.province,
      city: self.city,
      is_985: self.is_985,
      is_211: self.is_211,
      is_double_first_class: self.is_double_first_class,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawMajor {
  pub major_id:   String,
  pub name:       String,
  pub category:   Option<String>,
  pub updated_at: String,
}

impl RawMajor {
  pub fn into_major(self) -> Result<Major> {
    Ok(Major {
      major_id: decode_uuid(&self.major_id)?,
      name: self.name,
      category: self.category,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawAdmissionScore {
  pub score_id:   String,
  pub college_id: String,
  pub major_id:   Option<String>,
  pub province:   String,
  pub year:       i32,
  pub batch:      Option<String>,
  pub min_score:  Option<f64>,
  pub avg_score:  Option<f64>,
  pub min_rank:   Option<i64>,
  pub plan_count: Option<i64>,
  pub updated_at: String,
}

impl RawAdmissionScore {
  pub fn into_score(self) -> Result<AdmissionScore> {
    Ok(AdmissionScore {
      score_id: decode_uuid(&self.score_id)?,
      college_id: decode_uuid(&self.college_id)?,
      major_id: decode_opt_uuid(self.major_id.as_deref())?,
      province: self.province,
      year: self.year,
      batch: self.batch,
      min_score: self.min_score,
      avg_score: self.avg_score,
      min_rank: self.min_rank,
      plan_count: self.plan_count,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawEnrollmentPlan {
  pub plan_id:    String,
  pub college_id: String,
  pub major_id:   Option<String>,
  pub province:   String,
  pub year:       i32,
  pub plan_count: i64,
  pub updated_at: String,
}

impl RawEnrollmentPlan {
  pub fn into_plan(self) -> Result<EnrollmentPlan> {
    Ok(EnrollmentPlan {
      plan_id: decode_uuid(&self.plan_id)?,
      college_id: decode_uuid(&self.college_id)?,
      major_id: decode_opt_uuid(self.major_id.as_deref())?,
      province: self.province,
      year: self.year,
      plan_count: self.plan_count,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawCampusLife {
  pub life_id:           String,
  pub college_id:        String,
  pub survey_year:       Option<i32>,
  pub dorm_score:        Option<f64>,
  pub food_score:        Option<f64>,
  pub environment_score: Option<f64>,
  pub facility_score:    Option<f64>,
  pub updated_at:        String,
}

impl RawCampusLife {
  pub fn into_life(self) -> Result<CampusLife> {
    Ok(CampusLife {
      life_id: decode_uuid(&self.life_id)?,
      college_id: decode_uuid(&self.college_id)?,
      survey_year: self.survey_year,
      dorm_score: self.dorm_score,
      food_score: self.food_score,
      environment_score: self.environment_score,
      facility_score: self.facility_score,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Row types — core layer ──────────────────────────────────────────────────

/// Sync-metadata columns shared by every core table.
pub struct RawSyncMeta {
  pub data_version:   i64,
  pub last_synced_at: String,
  pub sync_source:    String,
}

impl RawSyncMeta {
  pub fn into_meta(self) -> Result<SyncMeta> {
    Ok(SyncMeta {
      data_version: self.data_version,
      last_synced_at: decode_dt(&self.last_synced_at)?,
      sync_source: self.sync_source,
    })
  }
}

pub struct RawCoreCollege {
  pub college_id:                String,
  pub name:                      String,
  pub province:                  String,
  pub city:                      Option<String>,
  pub is_985:                    bool,
  pub is_211:                    bool,
  pub is_double_first_class:     bool,
  pub major_count:               i64,
  pub enrollment_province_count: i64,
  pub avg_score_recent3:         Option<f64>,
  pub min_rank_recent3:          Option<i64>,
  pub latest_year_min_score:     Option<f64>,
  pub latest_year_min_rank:      Option<i64>,
  pub hot_level:                 i64,
  pub difficulty:                String,
  pub score_volatility:          Option<f64>,
  pub overall_life_score:        Option<f64>,
  pub meta:                      RawSyncMeta,
}

impl RawCoreCollege {
  pub fn into_core(self) -> Result<CoreCollege> {
    Ok(CoreCollege {
      college_id: decode_uuid(&self.college_id)?,
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
      hot_level: decode_u8(self.hot_level, "hot_level")?,
      difficulty: decode_difficulty(&self.difficulty)?,
      score_volatility: self.score_volatility,
      overall_life_score: self.overall_life_score,
      meta: self.meta.into_meta()?,
    })
  }
}

pub struct RawCoreAdmissionScore {
  pub score_id:         String,
  pub college_id:       Option<String>,
  pub major_id:         Option<String>,
  pub province:         String,
  pub year:             i32,
  pub batch:            Option<String>,
  pub min_score:        Option<f64>,
  pub avg_score:        Option<f64>,
  pub min_rank:         Option<i64>,
  pub plan_count:       Option<i64>,
  pub college_name:     Option<String>,
  pub college_province: Option<String>,
  pub college_is_985:   Option<bool>,
  pub major_name:       Option<String>,
  pub major_category:   Option<String>,
  pub competitiveness:  i64,
  pub meta:             RawSyncMeta,
}

impl RawCoreAdmissionScore {
  pub fn into_core(self) -> Result<CoreAdmissionScore> {
    Ok(CoreAdmissionScore {
      score_id: decode_uuid(&self.score_id)?,
      college_id: decode_opt_uuid(self.college_id.as_deref())?,
      major_id: decode_opt_uuid(self.major_id.as_deref())?,
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
      competitiveness: decode_u8(self.competitiveness, "competitiveness")?,
      meta: self.meta.into_meta()?,
    })
  }
}

pub struct RawCoreCampusLife {
  pub life_id:            String,
  pub college_id:         Option<String>,
  pub survey_year:        Option<i32>,
  pub dorm_score:         Option<f64>,
  pub food_score:         Option<f64>,
  pub environment_score:  Option<f64>,
  pub facility_score:     Option<f64>,
  pub college_name:       Option<String>,
  pub overall_life_score: Option<f64>,
  pub meta:               RawSyncMeta,
}

impl RawCoreCampusLife {
  pub fn into_core(self) -> Result<CoreCampusLife> {
    Ok(CoreCampusLife {
      life_id: decode_uuid(&self.life_id)?,
      college_id: decode_opt_uuid(self.college_id.as_deref())?,
      survey_year: self.survey_year,
      dorm_score: self.dorm_score,
      food_score: self.food_score,
      environment_score: self.environment_score,
      facility_score: self.facility_score,
      college_name: self.college_name,
      overall_life_score: self.overall_life_score,
      meta: self.meta.into_meta()?,
    })
  }
}

// ─── Row types — audit log ───────────────────────────────────────────────────

pub struct RawSyncRun {
  pub run_id:       String,
  pub sync_type:    String,
  pub entity:       String,
  pub source_layer: String,
  pub target_layer: String,
  pub total:        i64,
  pub synced:       i64,
  pub failed:       i64,
  pub skipped:      i64,
  pub started_at:   String,
  pub finished_at:  Option<String>,
  pub status:       String,
}

impl RawSyncRun {
  pub fn into_run(self) -> Result<SyncRun> {
    Ok(SyncRun {
      run_id: decode_uuid(&self.run_id)?,
      sync_type: decode_sync_type(&self.sync_type)?,
      entity: decode_entity_kind(&self.entity)?,
      source_layer: self.source_layer,
      target_layer: self.target_layer,
      stats: SyncStats {
        total: self.total as u64,
        synced: self.synced as u64,
        failed: self.failed as u64,
        skipped: self.skipped as u64,
      },
      started_at: decode_dt(&self.started_at)?,
      finished_at: self
        .finished_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      status: decode_sync_status(&self.status)?,
    })
  }
}

// ─── Small decoders ──────────────────────────────────────────────────────────

fn decode_u8(v: i64, column: &str) -> Result<u8> {
  u8::try_from(v)
    .map_err(|_| Error::Decode(format!("{column} out of range: {v}")))
}
