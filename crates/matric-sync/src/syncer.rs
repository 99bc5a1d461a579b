//! [`EntitySyncer`] — materializes one cleaned record into the core layer.
//!
//! One sync call performs: fetch source record → fetch direct relations →
//! validate statistic inputs → compute statistics → one atomic upsert. The
//! core record is constructed fully in memory before the upsert; no partial
//! writes are ever observable. A missing *relation* is tolerated (the
//! snapshot columns are written NULL and the unit still counts as synced);
//! a missing *source record* fails the unit.

use std::{collections::HashMap, sync::Arc};

use matric_core::{
  audit::EntityKind,
  cleaned::{AdmissionScore, College, Major},
  core_layer::{
    NewCoreAdmissionScore, NewCoreCampusLife, NewCoreCollege,
  },
  stats,
  store::{CleanedStore, CoreStore, StoreError},
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{config::SyncConfig, error::SyncError};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// The result of one unit sync, as aggregated into
/// [`SyncStats`](matric_core::audit::SyncStats).
#[derive(Debug)]
pub enum SyncOutcome {
  Synced,
  Skipped(SkipReason),
  Failed(SyncError),
}

/// Why a unit was skipped rather than synced or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// The run was cancelled before this unit was dispatched.
  Cancelled,
}

impl std::fmt::Display for SkipReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Cancelled => f.write_str("run cancelled"),
    }
  }
}

// ─── Per-college serialization ───────────────────────────────────────────────

/// Async locks keyed by college id.
///
/// A college sync and an admission-score sync can both recompute aggregates
/// for the same college; holding the college's lock across compute + upsert
/// serializes them. Disjoint colleges proceed fully in parallel.
#[derive(Default)]
pub struct CollegeLocks {
  inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CollegeLocks {
  pub async fn acquire(&self, college_id: Uuid) -> OwnedMutexGuard<()> {
    let lock = {
      let mut map = self.inner.lock().await;
      map
        .entry(college_id)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
    };
    lock.lock_owned().await
  }
}

// ─── Syncer ──────────────────────────────────────────────────────────────────

/// Syncs single records of every syncable kind from `Cl` into `Co`.
pub struct EntitySyncer<Cl, Co> {
  cleaned:        Arc<Cl>,
  core:           Arc<Co>,
  config:         SyncConfig,
  reference_year: i32,
  locks:          CollegeLocks,
}

impl<Cl, Co> EntitySyncer<Cl, Co>
where
  Cl: CleanedStore,
  Co: CoreStore,
{
  pub fn new(
    cleaned: Arc<Cl>,
    core: Arc<Co>,
    config: SyncConfig,
    reference_year: i32,
  ) -> Self {
    Self {
      cleaned,
      core,
      config,
      reference_year,
      locks: CollegeLocks::default(),
    }
  }

  /// Sync one record, applying the per-attempt timeout and the bounded
  /// retry policy for transient store errors. Never panics or escapes an
  /// error; every path folds into a [`SyncOutcome`].
  pub async fn sync(&self, kind: EntityKind, id: Uuid) -> SyncOutcome {
    let mut attempt: u32 = 0;
    loop {
      attempt += 1;

      let result = match tokio::time::timeout(
        self.config.unit_timeout,
        self.sync_once(kind, id),
      )
      .await
      {
        Ok(result) => result,
        Err(_) => {
          return SyncOutcome::Failed(SyncError::Timeout {
            kind,
            id,
            timeout: self.config.unit_timeout,
          });
        }
      };

      match result {
        Ok(()) => return SyncOutcome::Synced,
        Err(err)
          if err.is_transient() && attempt < self.config.retry_attempts =>
        {
          tracing::debug!(
            entity = %kind, %id, attempt, error = %err,
            "transient store error, retrying"
          );
          tokio::time::sleep(self.config.retry_backoff * attempt).await;
        }
        Err(mut err) => {
          if let SyncError::Store { attempts, .. } = &mut err {
            *attempts = attempt;
          }
          return SyncOutcome::Failed(err);
        }
      }
    }
  }

  /// A single sync attempt with no retry or timeout wrapping.
  pub async fn sync_once(
    &self,
    kind: EntityKind,
    id: Uuid,
  ) -> Result<(), SyncError> {
    match kind {
      EntityKind::College => self.sync_college(id).await,
      EntityKind::AdmissionScore => self.sync_admission_score(id).await,
      EntityKind::CampusLife => self.sync_campus_life(id).await,
      other => Err(SyncError::Validation {
        kind: other,
        id,
        reason: "entity kind has no core-layer counterpart".to_owned(),
      }),
    }
  }

  // ── College ───────────────────────────────────────────────────────────────

  async fn sync_college(&self, id: Uuid) -> Result<(), SyncError> {
    let college = self
      .cleaned
      .get_college(id)
      .await
      .map_err(store_err)?
      .ok_or(SyncError::NotFound { kind: EntityKind::College, id })?;

    let _guard = self.locks.acquire(id).await;

    let scores = self
      .cleaned
      .admission_scores_for_college(id)
      .await
      .map_err(store_err)?;
    let life = self
      .cleaned
      .campus_life_for_college(id)
      .await
      .map_err(store_err)?;
    let major_count = self
      .cleaned
      .major_count_for_college(id)
      .await
      .map_err(store_err)?;
    let province_count = self
      .cleaned
      .enrollment_province_count_for_college(id)
      .await
      .map_err(store_err)?;

    validate_score_rows(EntityKind::College, id, &scores)?;

    let subscores = match &life {
      Some(l) => {
        let s = l.present_subscores();
        validate_subscores(EntityKind::College, id, &s)?;
        s
      }
      None => {
        tracing::debug!(
          college_id = %id,
          "no campus-life survey; overall_life_score will be NULL"
        );
        Vec::new()
      }
    };

    let ry = self.reference_year;

    // 3-year window: [ry - 3, ry], inclusive.
    let windowed: Vec<&AdmissionScore> = scores
      .iter()
      .filter(|s| s.year >= ry - 3 && s.year <= ry)
      .collect();

    let window_min_scores: Vec<f64> =
      windowed.iter().filter_map(|s| s.min_score).collect();
    let avg_score_recent3 = if window_min_scores.is_empty() {
      None
    } else {
      Some(
        window_min_scores.iter().sum::<f64>()
          / window_min_scores.len() as f64,
      )
    };
    let min_rank_recent3 =
      windowed.iter().filter_map(|s| s.min_rank).min();

    // Most-recent complete year: ry - 1 only.
    let latest: Vec<&AdmissionScore> =
      scores.iter().filter(|s| s.year == ry - 1).collect();
    let latest_year_min_score = latest
      .iter()
      .filter_map(|s| s.min_score)
      .min_by(|a, b| a.total_cmp(b));
    let latest_year_min_rank =
      latest.iter().filter_map(|s| s.min_rank).min();

    let volatility_points: Vec<(i32, f64)> = scores
      .iter()
      .filter_map(|s| s.min_score.map(|m| (s.year, m)))
      .collect();

    let record = NewCoreCollege {
      college_id: college.college_id,
      name: college.name,
      province: college.province,
      city: college.city,
      is_985: college.is_985,
      is_211: college.is_211,
      is_double_first_class: college.is_double_first_class,
      major_count,
      enrollment_province_count: province_count,
      avg_score_recent3,
      min_rank_recent3,
      latest_year_min_score,
      latest_year_min_rank,
      hot_level: stats::hot_level(
        min_rank_recent3,
        major_count,
        province_count,
      ),
      difficulty: stats::difficulty_level(
        avg_score_recent3,
        min_rank_recent3,
      ),
      score_volatility: stats::score_volatility(&volatility_points, ry),
      overall_life_score: stats::overall_life_score(&subscores),
    };

    self
      .core
      .upsert_college(record, &self.config.sync_source)
      .await
      .map_err(store_err)?;
    Ok(())
  }

  // ── AdmissionScore ────────────────────────────────────────────────────────

  async fn sync_admission_score(&self, id: Uuid) -> Result<(), SyncError> {
    let row = self
      .cleaned
      .get_admission_score(id)
      .await
      .map_err(store_err)?
      .ok_or(SyncError::NotFound {
        kind: EntityKind::AdmissionScore,
        id,
      })?;

    validate_score_rows(
      EntityKind::AdmissionScore,
      id,
      std::slice::from_ref(&row),
    )?;

    // Serialize against college syncs recomputing the same aggregates.
    let _guard = self.locks.acquire(row.college_id).await;

    let college: Option<College> = self
      .cleaned
      .get_college(row.college_id)
      .await
      .map_err(store_err)?;
    if college.is_none() {
      tracing::warn!(
        score_id = %id, college_id = %row.college_id,
        "admission score references a missing college; writing NULL refs"
      );
    }

    let major: Option<Major> = match row.major_id {
      Some(major_id) => {
        let found =
          self.cleaned.get_major(major_id).await.map_err(store_err)?;
        if found.is_none() {
          tracing::warn!(
            score_id = %id, %major_id,
            "admission score references a missing major; writing NULL refs"
          );
        }
        found
      }
      None => None,
    };

    let plan_count = match row.plan_count {
      Some(count) => Some(count),
      None => self
        .cleaned
        .enrollment_plan_for(
          row.college_id,
          row.major_id,
          &row.province,
          row.year,
        )
        .await
        .map_err(store_err)?
        .map(|plan| plan.plan_count),
    };

    let record = NewCoreAdmissionScore {
      score_id: row.score_id,
      college_id: college.as_ref().map(|c| c.college_id),
      major_id: major.as_ref().map(|m| m.major_id),
      province: row.province,
      year: row.year,
      batch: row.batch,
      min_score: row.min_score,
      avg_score: row.avg_score,
      min_rank: row.min_rank,
      plan_count,
      college_name: college.as_ref().map(|c| c.name.clone()),
      college_province: college.as_ref().map(|c| c.province.clone()),
      college_is_985: college.as_ref().map(|c| c.is_985),
      major_name: major.as_ref().map(|m| m.name.clone()),
      major_category: major.as_ref().and_then(|m| m.category.clone()),
      competitiveness: stats::competitiveness(row.min_rank, plan_count),
    };

    self
      .core
      .upsert_admission_score(record, &self.config.sync_source)
      .await
      .map_err(store_err)?;
    Ok(())
  }

  // ── CampusLife ────────────────────────────────────────────────────────────

  async fn sync_campus_life(&self, id: Uuid) -> Result<(), SyncError> {
    let row = self
      .cleaned
      .get_campus_life(id)
      .await
      .map_err(store_err)?
      .ok_or(SyncError::NotFound { kind: EntityKind::CampusLife, id })?;

    let subscores = row.present_subscores();
    validate_subscores(EntityKind::CampusLife, id, &subscores)?;

    let college = self
      .cleaned
      .get_college(row.college_id)
      .await
      .map_err(store_err)?;
    if college.is_none() {
      tracing::warn!(
        life_id = %id, college_id = %row.college_id,
        "campus-life survey references a missing college; writing NULL refs"
      );
    }

    let record = NewCoreCampusLife {
      life_id: row.life_id,
      college_id: college.as_ref().map(|c| c.college_id),
      survey_year: row.survey_year,
      dorm_score: row.dorm_score,
      food_score: row.food_score,
      environment_score: row.environment_score,
      facility_score: row.facility_score,
      college_name: college.map(|c| c.name),
      overall_life_score: stats::overall_life_score(&subscores),
    };

    self
      .core
      .upsert_campus_life(record, &self.config.sync_source)
      .await
      .map_err(store_err)?;
    Ok(())
  }
}

// ─── Input validation ────────────────────────────────────────────────────────
// The statistics engine is total over its documented domains; malformed
// values are rejected here so a bad row fails its own unit instead of
// poisoning a computed field.

fn validate_score_rows(
  kind: EntityKind,
  id: Uuid,
  rows: &[AdmissionScore],
) -> Result<(), SyncError> {
  for row in rows {
    for (column, value) in [
      ("min_score", row.min_score),
      ("avg_score", row.avg_score),
    ] {
      if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
          return Err(SyncError::Validation {
            kind,
            id,
            reason: format!("{column} is malformed: {v}"),
          });
        }
      }
    }
    if let Some(rank) = row.min_rank {
      if rank < 1 {
        return Err(SyncError::Validation {
          kind,
          id,
          reason: format!("min_rank must be positive, got {rank}"),
        });
      }
    }
    if let Some(count) = row.plan_count {
      if count < 0 {
        return Err(SyncError::Validation {
          kind,
          id,
          reason: format!("plan_count must be non-negative, got {count}"),
        });
      }
    }
  }
  Ok(())
}

fn validate_subscores(
  kind: EntityKind,
  id: Uuid,
  subscores: &[f64],
) -> Result<(), SyncError> {
  for &score in subscores {
    if !score.is_finite() || score < 0.0 {
      return Err(SyncError::Validation {
        kind,
        id,
        reason: format!("campus-life sub-score is malformed: {score}"),
      });
    }
  }
  Ok(())
}

fn store_err<E: StoreError>(err: E) -> SyncError {
  SyncError::Store {
    attempts:  1,
    transient: err.is_transient(),
    source:    Box::new(err),
  }
}
