//! [`SqliteStore`] — the SQLite implementation of `CleanedStore` and
//! `CoreStore`.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use matric_core::{
  audit::{EntityKind, SyncRun, SyncStats, SyncStatus},
  cleaned::{AdmissionScore, CampusLife, College, EnrollmentPlan, Major},
  core_layer::{
    CoreAdmissionScore, CoreCampusLife, CoreCollege, NewCoreAdmissionScore,
    NewCoreCampusLife, NewCoreCollege, SyncMeta,
  },
  store::{CleanedStore, CoreStore},
};

use crate::{
  encode::{
    encode_difficulty, encode_dt, encode_entity_kind, encode_opt_uuid,
    encode_sync_status, encode_sync_type, encode_uuid, RawAdmissionScore,
    RawCampusLife, RawCollege, RawCoreAdmissionScore, RawCoreCampusLife,
    RawCoreCollege, RawEnrollmentPlan, RawMajor, RawSyncMeta, RawSyncRun,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Both Matric layers backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Cleaned-layer writes ──────────────────────────────────────────────────
  // Used by the ingestion boundary and test fixtures; the sync pipeline
  // itself never calls these.

  pub async fn insert_college(&self, college: &College) -> Result<()> {
    let c = college.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO colleges (
             college_id, name, province, city,
             is_985, is_211, is_double_first_class, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            encode_uuid(c.college_id),
            c.name,
            c.province,
            c.city,
            c.is_985,
            c.is_211,
            c.is_double_first_class,
            encode_dt(c.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_major(&self, major: &Major) -> Result<()> {
    let m = major.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO majors (major_id, name, category, updated_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            encode_uuid(m.major_id),
            m.name,
            m.category,
            encode_dt(m.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_admission_score(
    &self,
    score: &AdmissionScore,
  ) -> Result<()> {
    let s = score.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO admission_scores (
             score_id, college_id, major_id, province, year, batch,
             min_score, avg_score, min_rank, plan_count, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            encode_uuid(s.score_id),
            encode_uuid(s.college_id),
            encode_opt_uuid(s.major_id),
            s.province,
            s.year,
            s.batch,
            s.min_score,
            s.avg_score,
            s.min_rank,
            s.plan_count,
            encode_dt(s.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_enrollment_plan(
    &self,
    plan: &EnrollmentPlan,
  ) -> Result<()> {
    let p = plan.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO enrollment_plans (
             plan_id, college_id, major_id, province, year,
             plan_count, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            encode_uuid(p.plan_id),
            encode_uuid(p.college_id),
            encode_opt_uuid(p.major_id),
            p.province,
            p.year,
            p.plan_count,
            encode_dt(p.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_campus_life(&self, life: &CampusLife) -> Result<()> {
    let l = life.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO campus_life (
             life_id, college_id, survey_year, dorm_score, food_score,
             environment_score, facility_score, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            encode_uuid(l.life_id),
            encode_uuid(l.college_id),
            l.survey_year,
            l.dorm_score,
            l.food_score,
            l.environment_score,
            l.facility_score,
            encode_dt(l.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Overwrite a cleaned record's `updated_at`, for incremental-sync
  /// fixtures.
  pub async fn touch_college(
    &self,
    id: Uuid,
    updated_at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(updated_at);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE colleges SET updated_at = ?2 WHERE college_id = ?1",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Enumeration helpers ─────────────────────────────────────────────────────

fn cleaned_table(kind: EntityKind) -> (&'static str, &'static str) {
  match kind {
    EntityKind::College => ("colleges", "college_id"),
    EntityKind::AdmissionScore => ("admission_scores", "score_id"),
    EntityKind::CampusLife => ("campus_life", "life_id"),
    EntityKind::Major => ("majors", "major_id"),
    EntityKind::EnrollmentPlan => ("enrollment_plans", "plan_id"),
  }
}

fn core_table(kind: EntityKind) -> Option<(&'static str, &'static str)> {
  match kind {
    EntityKind::College => Some(("core_colleges", "college_id")),
    EntityKind::AdmissionScore => Some(("core_admission_scores", "score_id")),
    EntityKind::CampusLife => Some(("core_campus_life", "life_id")),
    EntityKind::Major | EntityKind::EnrollmentPlan => None,
  }
}

// ─── CleanedStore impl ───────────────────────────────────────────────────────

impl CleanedStore for SqliteStore {
  type Error = Error;

  async fn get_college(&self, id: Uuid) -> Result<Option<College>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawCollege> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT college_id, name, province, city,
                      is_985, is_211, is_double_first_class, updated_at
               FROM colleges WHERE college_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawCollege {
                  college_id:            row.get(0)?,
                  name:                  row.get(1)?,
                  province:              row.get(2)?,
                  city:                  row.get(3)?,
                  is_985:                row.get(4)?,
                  is_211:                row.get(5)?,
                  is_double_first_class: row.get(6)?,
                  updated_at:            row.get(7)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCollege::into_college).transpose()
  }

  async fn get_major(&self, id: Uuid) -> Result<Option<Major>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawMajor> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT major_id, name, category, updated_at
               FROM majors WHERE major_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawMajor {
                  major_id:   row.get(0)?,
                  name:       row.get(1)?,
                  category:   row.get(2)?,
                  updated_at: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMajor::into_major).transpose()
  }

  async fn get_admission_score(
    &self,
    id: Uuid,
  ) -> Result<Option<AdmissionScore>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawAdmissionScore> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT score_id, college_id, major_id, province, year, batch,
                      min_score, avg_score, min_rank, plan_count, updated_at
               FROM admission_scores WHERE score_id = ?1",
              rusqlite::params![id_str],
              map_raw_admission_score,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAdmissionScore::into_score).transpose()
  }

  async fn get_campus_life(&self, id: Uuid) -> Result<Option<CampusLife>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawCampusLife> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT life_id, college_id, survey_year, dorm_score,
                      food_score, environment_score, facility_score,
                      updated_at
               FROM campus_life WHERE life_id = ?1",
              rusqlite::params![id_str],
              map_raw_campus_life,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCampusLife::into_life).transpose()
  }

  async fn campus_life_for_college(
    &self,
    college_id: Uuid,
  ) -> Result<Option<CampusLife>> {
    let id_str = encode_uuid(college_id);
    let raw: Option<RawCampusLife> = self
      .conn
      .call(move |conn| {
        // Latest survey wins when several exist.
        Ok(
          conn
            .query_row(
              "SELECT life_id, college_id, survey_year, dorm_score,
                      food_score, environment_score, facility_score,
                      updated_at
               FROM campus_life WHERE college_id = ?1
               ORDER BY updated_at DESC LIMIT 1",
              rusqlite::params![id_str],
              map_raw_campus_life,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCampusLife::into_life).transpose()
  }

  async fn admission_scores_for_college(
    &self,
    college_id: Uuid,
  ) -> Result<Vec<AdmissionScore>> {
    let id_str = encode_uuid(college_id);
    let raws: Vec<RawAdmissionScore> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT score_id, college_id, major_id, province, year, batch,
                  min_score, avg_score, min_rank, plan_count, updated_at
           FROM admission_scores WHERE college_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], map_raw_admission_score)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawAdmissionScore::into_score)
      .collect()
  }

  async fn enrollment_plan_for(
    &self,
    college_id: Uuid,
    major_id: Option<Uuid>,
    province: &str,
    year: i32,
  ) -> Result<Option<EnrollmentPlan>> {
    let college_str = encode_uuid(college_id);
    let major_str = encode_opt_uuid(major_id);
    let province = province.to_owned();

    let raw: Option<RawEnrollmentPlan> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT plan_id, college_id, major_id, province, year,
                      plan_count, updated_at
               FROM enrollment_plans
               WHERE college_id = ?1
                 AND ((?2 IS NULL AND major_id IS NULL) OR major_id = ?2)
                 AND province = ?3
                 AND year = ?4
               ORDER BY updated_at DESC LIMIT 1",
              rusqlite::params![college_str, major_str, province, year],
              |row| {
                Ok(RawEnrollmentPlan {
                  plan_id:    row.get(0)?,
                  college_id: row.get(1)?,
                  major_id:   row.get(2)?,
                  province:   row.get(3)?,
                  year:       row.get(4)?,
                  plan_count: row.get(5)?,
                  updated_at: row.get(6)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEnrollmentPlan::into_plan).transpose()
  }

  async fn major_count_for_college(&self, college_id: Uuid) -> Result<i64> {
    let id_str = encode_uuid(college_id);
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM (
             SELECT major_id FROM admission_scores
              WHERE college_id = ?1 AND major_id IS NOT NULL
             UNION
             SELECT major_id FROM enrollment_plans
              WHERE college_id = ?1 AND major_id IS NOT NULL
           )",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count)
  }

  async fn enrollment_province_count_for_college(
    &self,
    college_id: Uuid,
  ) -> Result<i64> {
    let id_str = encode_uuid(college_id);
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(DISTINCT province) FROM enrollment_plans
           WHERE college_id = ?1",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count)
  }

  async fn list_ids(&self, kind: EntityKind) -> Result<Vec<Uuid>> {
    let (table, pk) = cleaned_table(kind);
    let id_strs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {pk} FROM {table} ORDER BY {pk}"))?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    id_strs
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  async fn list_ids_updated_since(
    &self,
    kind: EntityKind,
    since: DateTime<Utc>,
  ) -> Result<Vec<Uuid>> {
    let (table, pk) = cleaned_table(kind);
    let since_str = encode_dt(since);
    let id_strs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {pk} FROM {table} WHERE updated_at > ?1 ORDER BY {pk}"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![since_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    id_strs
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }
}

// ─── CoreStore impl ──────────────────────────────────────────────────────────

impl CoreStore for SqliteStore {
  type Error = Error;

  // ── Upserts ───────────────────────────────────────────────────────────────
  // Insert with data_version = 1, or overwrite with a compare-and-swap on
  // the previous version. A CAS miss rolls back and surfaces as
  // `VersionConflict` (transient) so the caller retries the whole upsert.

  async fn upsert_college(
    &self,
    record: NewCoreCollege,
    sync_source: &str,
  ) -> Result<CoreCollege> {
    let now = Utc::now();
    let now_str = encode_dt(now);
    let source = sync_source.to_owned();
    let rec = record.clone();

    let outcome: std::result::Result<i64, i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(rec.college_id);

        let existing: Option<i64> = tx
          .query_row(
            "SELECT data_version FROM core_colleges WHERE college_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        let version = match existing {
          None => {
            tx.execute(
              "INSERT INTO core_colleges (
                 college_id, name, province, city,
                 is_985, is_211, is_double_first_class,
                 major_count, enrollment_province_count,
                 avg_score_recent3, min_rank_recent3,
                 latest_year_min_score, latest_year_min_rank,
                 hot_level, difficulty, score_volatility,
                 overall_life_score,
                 data_version, last_synced_at, sync_source
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                         ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
              rusqlite::params![
                id_str,
                rec.name,
                rec.province,
                rec.city,
                rec.is_985,
                rec.is_211,
                rec.is_double_first_class,
                rec.major_count,
                rec.enrollment_province_count,
                rec.avg_score_recent3,
                rec.min_rank_recent3,
                rec.latest_year_min_score,
                rec.latest_year_min_rank,
                rec.hot_level,
                encode_difficulty(rec.difficulty),
                rec.score_volatility,
                rec.overall_life_score,
                1_i64,
                now_str,
                source,
              ],
            )?;
            1
          }
          Some(prev) => {
            let changed = tx.execute(
              "UPDATE core_colleges SET
                 name = ?2, province = ?3, city = ?4,
                 is_985 = ?5, is_211 = ?6, is_double_first_class = ?7,
                 major_count = ?8, enrollment_province_count = ?9,
                 avg_score_recent3 = ?10, min_rank_recent3 = ?11,
                 latest_year_min_score = ?12, latest_year_min_rank = ?13,
                 hot_level = ?14, difficulty = ?15,
                 score_volatility = ?16, overall_life_score = ?17,
                 data_version = ?18, last_synced_at = ?19, sync_source = ?20
               WHERE college_id = ?1 AND data_version = ?21",
              rusqlite::params![
                id_str,
                rec.name,
                rec.province,
                rec.city,
                rec.is_985,
                rec.is_211,
                rec.is_double_first_class,
                rec.major_count,
                rec.enrollment_province_count,
                rec.avg_score_recent3,
                rec.min_rank_recent3,
                rec.latest_year_min_score,
                rec.latest_year_min_rank,
                rec.hot_level,
                encode_difficulty(rec.difficulty),
                rec.score_volatility,
                rec.overall_life_score,
                prev + 1,
                now_str,
                source,
                prev,
              ],
            )?;
            if changed == 0 {
              return Ok(Err(prev));
            }
            prev + 1
          }
        };

        tx.commit()?;
        Ok(Ok(version))
      })
      .await?;

    let data_version = outcome.map_err(|expected| Error::VersionConflict {
      kind: EntityKind::College,
      id: record.college_id,
      expected,
    })?;

    Ok(record.into_core(SyncMeta {
      data_version,
      last_synced_at: now,
      sync_source: sync_source.to_owned(),
    }))
  }

  async fn upsert_admission_score(
    &self,
    record: NewCoreAdmissionScore,
    sync_source: &str,
  ) -> Result<CoreAdmissionScore> {
    let now = Utc::now();
    let now_str = encode_dt(now);
    let source = sync_source.to_owned();
    let rec = record.clone();

    let outcome: std::result::Result<i64, i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(rec.score_id);

        let existing: Option<i64> = tx
          .query_row(
            "SELECT data_version FROM core_admission_scores
             WHERE score_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        let version = match existing {
          None => {
            tx.execute(
              "INSERT INTO core_admission_scores (
                 score_id, college_id, major_id, province, year, batch,
                 min_score, avg_score, min_rank, plan_count,
                 college_name, college_province, college_is_985,
                 major_name, major_category, competitiveness,
                 data_version, last_synced_at, sync_source
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                         ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
              rusqlite::params![
                id_str,
                encode_opt_uuid(rec.college_id),
                encode_opt_uuid(rec.major_id),
                rec.province,
                rec.year,
                rec.batch,
                rec.min_score,
                rec.avg_score,
                rec.min_rank,
                rec.plan_count,
                rec.college_name,
                rec.college_province,
                rec.college_is_985,
                rec.major_name,
                rec.major_category,
                rec.competitiveness,
                1_i64,
                now_str,
                source,
              ],
            )?;
            1
          }
          Some(prev) => {
            let changed = tx.execute(
              "UPDATE core_admission_scores SET
                 college_id = ?2, major_id = ?3, province = ?4,
                 year = ?5, batch = ?6, min_score = ?7, avg_score = ?8,
                 min_rank = ?9, plan_count = ?10,
                 college_name = ?11, college_province = ?12,
                 college_is_985 = ?13, major_name = ?14,
                 major_category = ?15, competitiveness = ?16,
                 data_version = ?17, last_synced_at = ?18, sync_source = ?19
               WHERE score_id = ?1 AND data_version = ?20",
              rusqlite::params![
                id_str,
                encode_opt_uuid(rec.college_id),
                encode_opt_uuid(rec.major_id),
                rec.province,
                rec.year,
                rec.batch,
                rec.min_score,
                rec.avg_score,
                rec.min_rank,
                rec.plan_count,
                rec.college_name,
                rec.college_province,
                rec.college_is_985,
                rec.major_name,
                rec.major_category,
                rec.competitiveness,
                prev + 1,
                now_str,
                source,
                prev,
              ],
            )?;
            if changed == 0 {
              return Ok(Err(prev));
            }
            prev + 1
          }
        };

        tx.commit()?;
        Ok(Ok(version))
      })
      .await?;

    let data_version = outcome.map_err(|expected| Error::VersionConflict {
      kind: EntityKind::AdmissionScore,
      id: record.score_id,
      expected,
    })?;

    Ok(record.into_core(SyncMeta {
      data_version,
      last_synced_at: now,
      sync_source: sync_source.to_owned(),
    }))
  }

  async fn upsert_campus_life(
    &self,
    record: NewCoreCampusLife,
    sync_source: &str,
  ) -> Result<CoreCampusLife> {
    let now = Utc::now();
    let now_str = encode_dt(now);
    let source = sync_source.to_owned();
    let rec = record.clone();

    let outcome: std::result::Result<i64, i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(rec.life_id);

        let existing: Option<i64> = tx
          .query_row(
            "SELECT data_version FROM core_campus_life WHERE life_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        let version = match existing {
          None => {
            tx.execute(
              "INSERT INTO core_campus_life (
                 life_id, college_id, survey_year, dorm_score, food_score,
                 environment_score, facility_score, college_name,
                 overall_life_score,
                 data_version, last_synced_at, sync_source
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
              rusqlite::params![
                id_str,
                encode_opt_uuid(rec.college_id),
                rec.survey_year,
                rec.dorm_score,
                rec.food_score,
                rec.environment_score,
                rec.facility_score,
                rec.college_name,
                rec.overall_life_score,
                1_i64,
                now_str,
                source,
              ],
            )?;
            1
          }
          Some(prev) => {
            let changed = tx.execute(
              "UPDATE core_campus_life SET
                 college_id = ?2, survey_year = ?3, dorm_score = ?4,
                 food_score = ?5, environment_score = ?6,
                 facility_score = ?7, college_name = ?8,
                 overall_life_score = ?9,
                 data_version = ?10, last_synced_at = ?11, sync_source = ?12
               WHERE life_id = ?1 AND data_version = ?13",
              rusqlite::params![
                id_str,
                encode_opt_uuid(rec.college_id),
                rec.survey_year,
                rec.dorm_score,
                rec.food_score,
                rec.environment_score,
                rec.facility_score,
                rec.college_name,
                rec.overall_life_score,
                prev + 1,
                now_str,
                source,
                prev,
              ],
            )?;
            if changed == 0 {
              return Ok(Err(prev));
            }
            prev + 1
          }
        };

        tx.commit()?;
        Ok(Ok(version))
      })
      .await?;

    let data_version = outcome.map_err(|expected| Error::VersionConflict {
      kind: EntityKind::CampusLife,
      id: record.life_id,
      expected,
    })?;

    Ok(record.into_core(SyncMeta {
      data_version,
      last_synced_at: now,
      sync_source: sync_source.to_owned(),
    }))
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_core_college(&self, id: Uuid) -> Result<Option<CoreCollege>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawCoreCollege> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT college_id, name, province, city,
                      is_985, is_211, is_double_first_class,
                      major_count, enrollment_province_count,
                      avg_score_recent3, min_rank_recent3,
                      latest_year_min_score, latest_year_min_rank,
                      hot_level, difficulty, score_volatility,
                      overall_life_score,
                      data_version, last_synced_at, sync_source
               FROM core_colleges WHERE college_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawCoreCollege {
                  college_id:                row.get(0)?,
                  name:                      row.get(1)?,
                  province:                  row.get(2)?,
                  city:                      row.get(3)?,
                  is_985:                    row.get(4)?,
                  is_211:                    row.get(5)?,
                  is_double_first_class:     row.get(6)?,
                  major_count:               row.get(7)?,
                  enrollment_province_count: row.get(8)?,
                  avg_score_recent3:         row.get(9)?,
                  min_rank_recent3:          row.get(10)?,
                  latest_year_min_score:     row.get(11)?,
                  latest_year_min_rank:      row.get(12)?,
                  hot_level:                 row.get(13)?,
                  difficulty:                row.get(14)?,
                  score_volatility:          row.get(15)?,
                  overall_life_score:        row.get(16)?,
                  meta:                      RawSyncMeta {
                    data_version:   row.get(17)?,
                    last_synced_at: row.get(18)?,
                    sync_source:    row.get(19)?,
                  },
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCoreCollege::into_core).transpose()
  }

  async fn get_core_admission_score(
    &self,
    id: Uuid,
  ) -> Result<Option<CoreAdmissionScore>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawCoreAdmissionScore> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT score_id, college_id, major_id, province, year, batch,
                      min_score, avg_score, min_rank, plan_count,
                      college_name, college_province, college_is_985,
                      major_name, major_category, competitiveness,
                      data_version, last_synced_at, sync_source
               FROM core_admission_scores WHERE score_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawCoreAdmissionScore {
                  score_id:         row.get(0)?,
                  college_id:       row.get(1)?,
                  major_id:         row.get(2)?,
                  province:         row.get(3)?,
                  year:             row.get(4)?,
                  batch:            row.get(5)?,
                  min_score:        row.get(6)?,
                  avg_score:        row.get(7)?,
                  min_rank:         row.get(8)?,
                  plan_count:       row.get(9)?,
                  college_name:     row.get(10)?,
                  college_province: row.get(11)?,
                  college_is_985:   row.get(12)?,
                  major_name:       row.get(13)?,
                  major_category:   row.get(14)?,
                  competitiveness:  row.get(15)?,
                  meta:             RawSyncMeta {
                    data_version:   row.get(16)?,
                    last_synced_at: row.get(17)?,
                    sync_source:    row.get(18)?,
                  },
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCoreAdmissionScore::into_core).transpose()
  }

  async fn get_core_campus_life(
    &self,
    id: Uuid,
  ) -> Result<Option<CoreCampusLife>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawCoreCampusLife> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT life_id, college_id, survey_year, dorm_score,
                      food_score, environment_score, facility_score,
                      college_name, overall_life_score,
                      data_version, last_synced_at, sync_source
               FROM core_campus_life WHERE life_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawCoreCampusLife {
                  life_id:            row.get(0)?,
                  college_id:         row.get(1)?,
                  survey_year:        row.get(2)?,
                  dorm_score:         row.get(3)?,
                  food_score:         row.get(4)?,
                  environment_score:  row.get(5)?,
                  facility_score:     row.get(6)?,
                  college_name:       row.get(7)?,
                  overall_life_score: row.get(8)?,
                  meta:               RawSyncMeta {
                    data_version:   row.get(9)?,
                    last_synced_at: row.get(10)?,
                    sync_source:    row.get(11)?,
                  },
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCoreCampusLife::into_core).transpose()
  }

  async fn list_core_ids(&self, kind: EntityKind) -> Result<Vec<Uuid>> {
    // Majors and enrollment plans have no core-layer counterpart.
    let Some((table, pk)) = core_table(kind) else {
      return Ok(Vec::new());
    };

    let id_strs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {pk} FROM {table} ORDER BY {pk}"))?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    id_strs
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  // ── Referential-integrity reports ─────────────────────────────────────────

  async fn orphan_admission_college_refs(&self) -> Result<Vec<Uuid>> {
    let id_strs: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT s.score_id FROM core_admission_scores s
           WHERE s.college_id IS NOT NULL
             AND NOT EXISTS (
               SELECT 1 FROM core_colleges c
               WHERE c.college_id = s.college_id
             )",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    id_strs
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  async fn orphan_admission_major_refs(&self) -> Result<Vec<Uuid>> {
    let id_strs: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT s.score_id FROM core_admission_scores s
           WHERE s.major_id IS NOT NULL
             AND NOT EXISTS (
               SELECT 1 FROM majors m WHERE m.major_id = s.major_id
             )",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    id_strs
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  // ── Audit log ─────────────────────────────────────────────────────────────

  async fn insert_sync_run(&self, run: SyncRun) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sync_runs (
             run_id, sync_type, entity, source_layer, target_layer,
             total, synced, failed, skipped,
             started_at, finished_at, status
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            encode_uuid(run.run_id),
            encode_sync_type(run.sync_type),
            encode_entity_kind(run.entity),
            run.source_layer,
            run.target_layer,
            run.stats.total as i64,
            run.stats.synced as i64,
            run.stats.failed as i64,
            run.stats.skipped as i64,
            encode_dt(run.started_at),
            run.finished_at.map(encode_dt),
            encode_sync_status(run.status),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn finalize_sync_run(
    &self,
    run_id: Uuid,
    stats: SyncStats,
    status: SyncStatus,
    finished_at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str = encode_uuid(run_id);

    let current: Option<String> = {
      let id_str = id_str.clone();
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT status FROM sync_runs WHERE run_id = ?1",
                rusqlite::params![id_str],
                |row| row.get(0),
              )
              .optional()?,
          )
        })
        .await?
    };

    match current.as_deref() {
      None => return Err(Error::RunNotFound(run_id)),
      Some("pending" | "running") => {}
      Some(_) => return Err(Error::RunAlreadyFinalized(run_id)),
    }

    let at_str = encode_dt(finished_at);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE sync_runs SET
             total = ?2, synced = ?3, failed = ?4, skipped = ?5,
             finished_at = ?6, status = ?7
           WHERE run_id = ?1",
          rusqlite::params![
            id_str,
            stats.total as i64,
            stats.synced as i64,
            stats.failed as i64,
            stats.skipped as i64,
            at_str,
            encode_sync_status(status),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_sync_runs(
    &self,
    entity: Option<EntityKind>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
  ) -> Result<Vec<SyncRun>> {
    let entity_str = entity.map(encode_entity_kind).map(str::to_owned);
    let from_str = from.map(encode_dt);
    let to_str = to.map(encode_dt);

    let raws: Vec<RawSyncRun> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT run_id, sync_type, entity, source_layer, target_layer,
                  total, synced, failed, skipped,
                  started_at, finished_at, status
           FROM sync_runs
           WHERE (?1 IS NULL OR entity = ?1)
             AND (?2 IS NULL OR started_at >= ?2)
             AND (?3 IS NULL OR started_at <= ?3)
           ORDER BY started_at DESC",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              entity_str.as_deref(),
              from_str.as_deref(),
              to_str.as_deref(),
            ],
            |row| {
              Ok(RawSyncRun {
                run_id:       row.get(0)?,
                sync_type:    row.get(1)?,
                entity:       row.get(2)?,
                source_layer: row.get(3)?,
                target_layer: row.get(4)?,
                total:        row.get(5)?,
                synced:       row.get(6)?,
                failed:       row.get(7)?,
                skipped:      row.get(8)?,
                started_at:   row.get(9)?,
                finished_at:  row.get(10)?,
                status:       row.get(11)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSyncRun::into_run).collect()
  }

  async fn prune_sync_runs(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);
    let removed = self
      .conn
      .call(move |conn| {
        let removed = conn.execute(
          "DELETE FROM sync_runs
           WHERE started_at < ?1
             AND status IN ('completed', 'completed_with_errors', 'failed')",
          rusqlite::params![cutoff_str],
        )?;
        Ok(removed as u64)
      })
      .await?;
    Ok(removed)
  }
}

// ─── Row mappers ─────────────────────────────────────────────────────────────

fn map_raw_admission_score(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawAdmissionScore> {
  Ok(RawAdmissionScore {
    score_id:   row.get(0)?,
    college_id: row.get(1)?,
    major_id:   row.get(2)?,
    province:   row.get(3)?,
    year:       row.get(4)?,
    batch:      row.get(5)?,
    min_score:  row.get(6)?,
    avg_score:  row.get(7)?,
    min_rank:   row.get(8)?,
    plan_count: row.get(9)?,
    updated_at: row.get(10)?,
  })
}

fn map_raw_campus_life(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawCampusLife> {
  Ok(RawCampusLife {
    life_id:           row.get(0)?,
    college_id:        row.get(1)?,
    survey_year:       row.get(2)?,
    dorm_score:        row.get(3)?,
    food_score:        row.get(4)?,
    environment_score: row.get(5)?,
    facility_score:    row.get(6)?,
    updated_at:        row.get(7)?,
  })
}
