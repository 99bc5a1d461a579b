//! End-to-end pipeline tests over an in-memory SQLite backend.

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use matric_core::{
  audit::{EntityKind, SyncRun, SyncStats, SyncStatus},
  cleaned::{AdmissionScore, CampusLife, College, EnrollmentPlan, Major},
  core_layer::{
    NewCoreAdmissionScore, NewCoreCampusLife, NewCoreCollege,
  },
  stats::DifficultyLevel,
  store::{CleanedStore, CoreStore},
};
use matric_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{
  config::SyncConfig,
  error::SyncError,
  orchestrator::SyncOrchestrator,
  syncer::{EntitySyncer, SyncOutcome},
};

const REF_YEAR: i32 = 2025;

async fn store() -> Arc<SqliteStore> {
  Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

fn config() -> SyncConfig {
  SyncConfig {
    retry_backoff: Duration::from_millis(1),
    reference_year: Some(REF_YEAR),
    ..SyncConfig::default()
  }
}

fn orchestrator(
  store: &Arc<SqliteStore>,
) -> SyncOrchestrator<SqliteStore, SqliteStore> {
  SyncOrchestrator::new(store.clone(), store.clone(), config())
}

fn syncer(
  store: &Arc<SqliteStore>,
) -> EntitySyncer<SqliteStore, SqliteStore> {
  EntitySyncer::new(store.clone(), store.clone(), config(), REF_YEAR)
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn college(name: &str) -> College {
  College {
    college_id:            Uuid::new_v4(),
    name:                  name.to_owned(),
    province:              "Zhejiang".to_owned(),
    city:                  Some("Hangzhou".to_owned()),
    is_985:                true,
    is_211:                true,
    is_double_first_class: true,
    updated_at:            Utc::now(),
  }
}

fn score(
  college_id: Uuid,
  year: i32,
  min_score: f64,
  min_rank: i64,
) -> AdmissionScore {
  AdmissionScore {
    score_id: Uuid::new_v4(),
    college_id,
    major_id: None,
    province: "Zhejiang".to_owned(),
    year,
    batch: Some("first".to_owned()),
    min_score: Some(min_score),
    avg_score: Some(min_score + 15.0),
    min_rank: Some(min_rank),
    plan_count: None,
    updated_at: Utc::now(),
  }
}

fn life(college_id: Uuid) -> CampusLife {
  CampusLife {
    life_id: Uuid::new_v4(),
    college_id,
    survey_year: Some(2024),
    dorm_score: Some(80.0),
    food_score: Some(90.0),
    environment_score: Some(70.0),
    facility_score: Some(60.0),
    updated_at: Utc::now(),
  }
}

fn plan(college_id: Uuid, major_id: Option<Uuid>, year: i32) -> EnrollmentPlan {
  EnrollmentPlan {
    plan_id: Uuid::new_v4(),
    college_id,
    major_id,
    province: "Zhejiang".to_owned(),
    year,
    plan_count: 42,
    updated_at: Utc::now(),
  }
}

/// A college with two in-window score years, one major, one enrollment
/// province, and a full campus-life survey.
async fn seed_college(s: &SqliteStore) -> College {
  let c = college("Seeded University");
  s.insert_college(&c).await.unwrap();

  let m = Major {
    major_id:   Uuid::new_v4(),
    name:       "Computer Science".to_owned(),
    category:   Some("engineering".to_owned()),
    updated_at: Utc::now(),
  };
  s.insert_major(&m).await.unwrap();

  let mut s2023 = score(c.college_id, 2023, 600.0, 1_200);
  s2023.major_id = Some(m.major_id);
  s.insert_admission_score(&s2023).await.unwrap();
  let mut s2024 = score(c.college_id, 2024, 610.0, 900);
  s2024.major_id = Some(m.major_id);
  s.insert_admission_score(&s2024).await.unwrap();

  s.insert_enrollment_plan(&plan(c.college_id, Some(m.major_id), 2024))
    .await
    .unwrap();
  s.insert_campus_life(&life(c.college_id)).await.unwrap();
  c
}

// ─── College sync ────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_materializes_college_with_statistics() {
  let s = store().await;
  let c = seed_college(&s).await;

  let stats = orchestrator(&s)
    .run_full(EntityKind::College)
    .await
    .unwrap();
  assert_eq!(
    stats,
    SyncStats {
      total:   1,
      synced:  1,
      failed:  0,
      skipped: 0,
    }
  );

  let core = s.get_core_college(c.college_id).await.unwrap().unwrap();
  assert_eq!(core.college_id, c.college_id);
  assert_eq!(core.name, c.name);
  assert_eq!(core.meta.data_version, 1);
  assert_eq!(core.meta.sync_source, "cleaned");

  assert_eq!(core.major_count, 1);
  assert_eq!(core.enrollment_province_count, 1);
  assert_eq!(core.avg_score_recent3, Some(605.0));
  assert_eq!(core.min_rank_recent3, Some(900));
  // 2024 is the most recent complete year relative to 2025.
  assert_eq!(core.latest_year_min_score, Some(610.0));
  assert_eq!(core.latest_year_min_rank, Some(900));

  // rank 900 => +30 tier; counts too small for bonuses.
  assert_eq!(core.hot_level, 80);
  assert_eq!(core.difficulty, DifficultyLevel::VeryHard);
  assert_eq!(core.score_volatility, Some(5.0));
  assert_eq!(core.overall_life_score, Some(75.0));
}

#[tokio::test]
async fn syncing_twice_is_idempotent_except_version() {
  let s = store().await;
  let c = seed_college(&s).await;
  let sync = syncer(&s);

  assert!(matches!(
    sync.sync(EntityKind::College, c.college_id).await,
    SyncOutcome::Synced
  ));
  let first = s.get_core_college(c.college_id).await.unwrap().unwrap();

  assert!(matches!(
    sync.sync(EntityKind::College, c.college_id).await,
    SyncOutcome::Synced
  ));
  let second = s.get_core_college(c.college_id).await.unwrap().unwrap();

  assert_eq!(first.meta.data_version, 1);
  assert_eq!(second.meta.data_version, 2);
  assert_eq!(second.name, first.name);
  assert_eq!(second.hot_level, first.hot_level);
  assert_eq!(second.difficulty, first.difficulty);
  assert_eq!(second.avg_score_recent3, first.avg_score_recent3);
  assert_eq!(second.score_volatility, first.score_volatility);
  assert_eq!(second.overall_life_score, first.overall_life_score);
}

#[tokio::test]
async fn college_without_survey_syncs_with_null_life_score() {
  let s = store().await;
  let c = college("Spartan College");
  s.insert_college(&c).await.unwrap();

  let stats = orchestrator(&s)
    .run_full(EntityKind::College)
    .await
    .unwrap();
  assert_eq!(stats.synced, 1);

  let core = s.get_core_college(c.college_id).await.unwrap().unwrap();
  assert_eq!(core.overall_life_score, None);
  assert_eq!(core.avg_score_recent3, None);
  assert_eq!(core.hot_level, 50);
  assert_eq!(core.difficulty, DifficultyLevel::Medium);
}

#[tokio::test]
async fn missing_source_record_fails_not_found() {
  let s = store().await;
  let outcome = syncer(&s).sync(EntityKind::College, Uuid::new_v4()).await;
  assert!(matches!(
    outcome,
    SyncOutcome::Failed(SyncError::NotFound {
      kind: EntityKind::College,
      ..
    })
  ));
}

#[tokio::test]
async fn malformed_score_row_fails_validation() {
  let s = store().await;
  let c = college("Bad Data U");
  s.insert_college(&c).await.unwrap();
  let mut bad = score(c.college_id, 2024, 600.0, 1_000);
  bad.min_score = Some(-5.0);
  s.insert_admission_score(&bad).await.unwrap();

  let outcome = syncer(&s)
    .sync(EntityKind::AdmissionScore, bad.score_id)
    .await;
  assert!(matches!(
    outcome,
    SyncOutcome::Failed(SyncError::Validation { .. })
  ));
}

// ─── AdmissionScore sync ─────────────────────────────────────────────────────

#[tokio::test]
async fn admission_score_snapshots_and_plan_fallback() {
  let s = store().await;
  let c = seed_college(&s).await;
  let rows = s
    .admission_scores_for_college(c.college_id)
    .await
    .unwrap();
  let row = rows.iter().find(|r| r.year == 2024).unwrap();

  let stats = orchestrator(&s)
    .run_full(EntityKind::AdmissionScore)
    .await
    .unwrap();
  assert_eq!(stats.failed, 0);

  let core = s
    .get_core_admission_score(row.score_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(core.college_id, Some(c.college_id));
  assert_eq!(core.college_name.as_deref(), Some("Seeded University"));
  assert_eq!(core.college_is_985, Some(true));
  assert_eq!(core.major_name.as_deref(), Some("Computer Science"));
  assert_eq!(core.major_category.as_deref(), Some("engineering"));
  // plan_count was NULL on the row and resolved from the matching plan.
  assert_eq!(core.plan_count, Some(42));
  // rank 900 => 50, 42 plans => 20.
  assert_eq!(core.competitiveness, 70);
}

#[tokio::test]
async fn admission_score_with_missing_college_writes_null_refs() {
  let s = store().await;
  let row = score(Uuid::new_v4(), 2024, 620.0, 4_000);
  s.insert_admission_score(&row).await.unwrap();

  let outcome = syncer(&s)
    .sync(EntityKind::AdmissionScore, row.score_id)
    .await;
  assert!(matches!(outcome, SyncOutcome::Synced));

  let core = s
    .get_core_admission_score(row.score_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(core.college_id, None);
  assert_eq!(core.college_name, None);
  assert_eq!(core.college_is_985, None);
  assert_eq!(core.min_score, Some(620.0));
  // No plan either, so competitiveness stays at the neutral default.
  assert_eq!(core.competitiveness, 50);
}

#[tokio::test]
async fn orphan_report_heals_after_college_sync() {
  let s = store().await;
  seed_college(&s).await;

  // Scores first: their college exists in the cleaned layer but not yet in
  // the core layer, so the references are orphaned.
  orchestrator(&s)
    .run_full(EntityKind::AdmissionScore)
    .await
    .unwrap();
  let orphans = s.orphan_admission_college_refs().await.unwrap();
  assert_eq!(orphans.len(), 2);

  orchestrator(&s).run_full(EntityKind::College).await.unwrap();
  assert!(s.orphan_admission_college_refs().await.unwrap().is_empty());
}

// ─── CampusLife sync ─────────────────────────────────────────────────────────

#[tokio::test]
async fn campus_life_sync_computes_overall_score() {
  let s = store().await;
  let c = college("Lively U");
  s.insert_college(&c).await.unwrap();
  let survey = life(c.college_id);
  s.insert_campus_life(&survey).await.unwrap();

  let stats = orchestrator(&s)
    .run_full(EntityKind::CampusLife)
    .await
    .unwrap();
  assert_eq!(stats.synced, 1);

  let core = s
    .get_core_campus_life(survey.life_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(core.college_name.as_deref(), Some("Lively U"));
  assert_eq!(core.overall_life_score, Some(75.0));
  assert_eq!(core.meta.data_version, 1);
}

// ─── Orchestration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn non_syncable_kind_is_run_level_error() {
  let s = store().await;
  let err = orchestrator(&s)
    .run_full(EntityKind::Major)
    .await
    .unwrap_err();
  assert!(matches!(err, SyncError::RunLevel(_)));
}

#[tokio::test]
async fn incremental_run_filters_by_updated_at() {
  let s = store().await;
  let stale_a = college("Stale A");
  let stale_b = college("Stale B");
  let fresh = college("Fresh");
  for c in [&stale_a, &stale_b, &fresh] {
    s.insert_college(c).await.unwrap();
  }

  let cutoff = Utc::now() - chrono::Duration::hours(1);
  s.touch_college(stale_a.college_id, cutoff - chrono::Duration::hours(2))
    .await
    .unwrap();
  s.touch_college(stale_b.college_id, cutoff - chrono::Duration::hours(2))
    .await
    .unwrap();

  let stats = orchestrator(&s)
    .run_incremental(EntityKind::College, cutoff)
    .await
    .unwrap();
  assert_eq!(stats.total, 1);
  assert_eq!(stats.synced, 1);

  assert!(s
    .get_core_college(fresh.college_id)
    .await
    .unwrap()
    .is_some());
  assert!(s
    .get_core_college(stale_a.college_id)
    .await
    .unwrap()
    .is_none());
}

#[tokio::test]
async fn cancelled_run_skips_every_unit() {
  let s = store().await;
  for i in 0..3 {
    s.insert_college(&college(&format!("College {i}")))
      .await
      .unwrap();
  }

  let orch = orchestrator(&s);
  orch.cancel_handle().cancel();

  let stats = orch.run_full(EntityKind::College).await.unwrap();
  assert_eq!(
    stats,
    SyncStats {
      total:   3,
      synced:  0,
      failed:  0,
      skipped: 3,
    }
  );

  let runs = s
    .list_sync_runs(Some(EntityKind::College), None, None)
    .await
    .unwrap();
  assert_eq!(runs[0].status, SyncStatus::Completed);
}

#[tokio::test]
async fn batch_run_isolates_persistent_failures() {
  let s = store().await;

  let mut ids = Vec::new();
  for i in 0..100 {
    let c = college(&format!("College {i:03}"));
    s.insert_college(&c).await.unwrap();
    // Three colleges never filed a survey; they must still sync.
    if i >= 3 {
      s.insert_campus_life(&life(c.college_id)).await.unwrap();
    }
    ids.push(c.college_id);
  }

  let faulty = Arc::new(FaultStore {
    inner:        s.clone(),
    fail_upserts: ids[10..12].iter().copied().collect(),
    stall_reads:  HashSet::new(),
  });
  let orch =
    SyncOrchestrator::new(faulty.clone(), faulty.clone(), config());

  let stats = orch.run_full(EntityKind::College).await.unwrap();
  assert_eq!(
    stats,
    SyncStats {
      total:   100,
      synced:  98,
      failed:  2,
      skipped: 0,
    }
  );

  let runs = s
    .list_sync_runs(Some(EntityKind::College), None, None)
    .await
    .unwrap();
  assert_eq!(runs[0].status, SyncStatus::CompletedWithErrors);
  assert_eq!(runs[0].stats, stats);

  // The failed units wrote nothing; everyone else is materialized.
  assert!(s.get_core_college(ids[10]).await.unwrap().is_none());
  assert!(s.get_core_college(ids[50]).await.unwrap().is_some());
}

#[tokio::test]
async fn stalled_read_times_out_the_unit_only() {
  let s = store().await;
  let slow = college("Slow");
  let fast = college("Fast");
  s.insert_college(&slow).await.unwrap();
  s.insert_college(&fast).await.unwrap();

  let faulty = Arc::new(FaultStore {
    inner:        s.clone(),
    fail_upserts: HashSet::new(),
    stall_reads:  [slow.college_id].into_iter().collect(),
  });
  let cfg = SyncConfig {
    unit_timeout: Duration::from_millis(50),
    ..config()
  };
  let orch = SyncOrchestrator::new(faulty.clone(), faulty.clone(), cfg);

  let stats = orch.run_full(EntityKind::College).await.unwrap();
  assert_eq!(stats.total, 2);
  assert_eq!(stats.failed, 1);
  assert_eq!(stats.synced, 1);
  assert!(s.get_core_college(fast.college_id).await.unwrap().is_some());
}

// ─── Fault injection ─────────────────────────────────────────────────────────

/// Delegates to a real [`SqliteStore`], with injectable faults: ids whose
/// college upsert always fails with a transient error, and ids whose
/// college read never completes.
struct FaultStore {
  inner:        Arc<SqliteStore>,
  fail_upserts: HashSet<Uuid>,
  stall_reads:  HashSet<Uuid>,
}

impl CleanedStore for FaultStore {
  type Error = matric_store_sqlite::Error;

  async fn get_college(
    &self,
    id: Uuid,
  ) -> Result<Option<College>, Self::Error> {
    if self.stall_reads.contains(&id) {
      tokio::time::sleep(Duration::from_secs(3_600)).await;
    }
    self.inner.get_college(id).await
  }

  async fn get_major(&self, id: Uuid) -> Result<Option<Major>, Self::Error> {
    self.inner.get_major(id).await
  }

  async fn get_admission_score(
    &self,
    id: Uuid,
  ) -> Result<Option<AdmissionScore>, Self::Error> {
    self.inner.get_admission_score(id).await
  }

  async fn get_campus_life(
    &self,
    id: Uuid,
  ) -> Result<Option<CampusLife>, Self::Error> {
    self.inner.get_campus_life(id).await
  }

  async fn campus_life_for_college(
    &self,
    college_id: Uuid,
  ) -> Result<Option<CampusLife>, Self::Error> {
    self.inner.campus_life_for_college(college_id).await
  }

  async fn admission_scores_for_college(
    &self,
    college_id: Uuid,
  ) -> Result<Vec<AdmissionScore>, Self::Error> {
    self.inner.admission_scores_for_college(college_id).await
  }

  async fn enrollment_plan_for(
    &self,
    college_id: Uuid,
    major_id: Option<Uuid>,
    province: &str,
    year: i32,
  ) -> Result<Option<EnrollmentPlan>, Self::Error> {
    self
      .inner
      .enrollment_plan_for(college_id, major_id, province, year)
      .await
  }

  async fn major_count_for_college(
    &self,
    college_id: Uuid,
  ) -> Result<i64, Self::Error> {
    self.inner.major_count_for_college(college_id).await
  }

  async fn enrollment_province_count_for_college(
    &self,
    college_id: Uuid,
  ) -> Result<i64, Self::Error> {
    self
      .inner
      .enrollment_province_count_for_college(college_id)
      .await
  }

  async fn list_ids(
    &self,
    kind: EntityKind,
  ) -> Result<Vec<Uuid>, Self::Error> {
    self.inner.list_ids(kind).await
  }

  async fn list_ids_updated_since(
    &self,
    kind: EntityKind,
    since: DateTime<Utc>,
  ) -> Result<Vec<Uuid>, Self::Error> {
    self.inner.list_ids_updated_since(kind, since).await
  }
}

impl CoreStore for FaultStore {
  type Error = matric_store_sqlite::Error;

  async fn upsert_college(
    &self,
    record: NewCoreCollege,
    sync_source: &str,
  ) -> Result<matric_core::core_layer::CoreCollege, Self::Error> {
    if self.fail_upserts.contains(&record.college_id) {
      return Err(matric_store_sqlite::Error::VersionConflict {
        kind:     EntityKind::College,
        id:       record.college_id,
        expected: 0,
      });
    }
    self.inner.upsert_college(record, sync_source).await
  }

  async fn upsert_admission_score(
    &self,
    record: NewCoreAdmissionScore,
    sync_source: &str,
  ) -> Result<matric_core::core_layer::CoreAdmissionScore, Self::Error> {
    self.inner.upsert_admission_score(record, sync_source).await
  }

  async fn upsert_campus_life(
    &self,
    record: NewCoreCampusLife,
    sync_source: &str,
  ) -> Result<matric_core::core_layer::CoreCampusLife, Self::Error> {
    self.inner.upsert_campus_life(record, sync_source).await
  }

  async fn get_core_college(
    &self,
    id: Uuid,
  ) -> Result<Option<matric_core::core_layer::CoreCollege>, Self::Error> {
    self.inner.get_core_college(id).await
  }

  async fn get_core_admission_score(
    &self,
    id: Uuid,
  ) -> Result<Option<matric_core::core_layer::CoreAdmissionScore>, Self::Error>
  {
    self.inner.get_core_admission_score(id).await
  }

  async fn get_core_campus_life(
    &self,
    id: Uuid,
  ) -> Result<Option<matric_core::core_layer::CoreCampusLife>, Self::Error>
  {
    self.inner.get_core_campus_life(id).await
  }

  async fn list_core_ids(
    &self,
    kind: EntityKind,
  ) -> Result<Vec<Uuid>, Self::Error> {
    self.inner.list_core_ids(kind).await
  }

  async fn orphan_admission_college_refs(
    &self,
  ) -> Result<Vec<Uuid>, Self::Error> {
    self.inner.orphan_admission_college_refs().await
  }

  async fn orphan_admission_major_refs(
    &self,
  ) -> Result<Vec<Uuid>, Self::Error> {
    self.inner.orphan_admission_major_refs().await
  }

  async fn insert_sync_run(&self, run: SyncRun) -> Result<(), Self::Error> {
    self.inner.insert_sync_run(run).await
  }

  async fn finalize_sync_run(
    &self,
    run_id: Uuid,
    stats: SyncStats,
    status: SyncStatus,
    finished_at: DateTime<Utc>,
  ) -> Result<(), Self::Error> {
    self
      .inner
      .finalize_sync_run(run_id, stats, status, finished_at)
      .await
  }

  async fn list_sync_runs(
    &self,
    entity: Option<EntityKind>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
  ) -> Result<Vec<SyncRun>, Self::Error> {
    self.inner.list_sync_runs(entity, from, to).await
  }

  async fn prune_sync_runs(
    &self,
    cutoff: DateTime<Utc>,
  ) -> Result<u64, Self::Error> {
    self.inner.prune_sync_runs(cutoff).await
  }
}
