//! The `CleanedStore` / `CoreStore` traits and the `StoreError` bound.
//!
//! The traits are implemented by storage backends (e.g.
//! `matric-store-sqlite`). The sync pipeline (`matric-sync`) depends on
//! these abstractions, not on any concrete backend. The cleaned layer is
//! read-only through [`CleanedStore`]; all core-layer mutation goes through
//! the [`CoreStore`] upsert contract, which is the single discipline point
//! for conflict resolution.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  audit::{EntityKind, SyncRun, SyncStats, SyncStatus},
  cleaned::{AdmissionScore, CampusLife, College, EnrollmentPlan, Major},
  core_layer::{
    CoreAdmissionScore, CoreCampusLife, CoreCollege, NewCoreAdmissionScore,
    NewCoreCampusLife, NewCoreCollege,
  },
};

// ─── Error bound ─────────────────────────────────────────────────────────────

/// Backend error bound. `is_transient` drives the unit-level retry policy:
/// transient failures (lock contention, version conflicts, connection
/// hiccups) are retried a bounded number of times; anything else fails the
/// unit immediately.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn is_transient(&self) -> bool;
}

// ─── Cleaned layer (read-only) ───────────────────────────────────────────────

/// Read access to the normalized cleaned layer.
///
/// All methods return `Send` futures so the traits can be used from a
/// multi-threaded tokio runtime.
pub trait CleanedStore: Send + Sync {
  type Error: StoreError;

  // ── Point reads ───────────────────────────────────────────────────────

  fn get_college(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<College>, Self::Error>> + Send + '_;

  fn get_major(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Major>, Self::Error>> + Send + '_;

  fn get_admission_score(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<AdmissionScore>, Self::Error>> + Send + '_;

  fn get_campus_life(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CampusLife>, Self::Error>> + Send + '_;

  // ── Relations ─────────────────────────────────────────────────────────

  /// The campus-life survey for a college, if one exists.
  fn campus_life_for_college(
    &self,
    college_id: Uuid,
  ) -> impl Future<Output = Result<Option<CampusLife>, Self::Error>> + Send + '_;

  /// Full admission-score history for a college (the caller windows it).
  fn admission_scores_for_college(
    &self,
    college_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AdmissionScore>, Self::Error>> + Send + '_;

  /// The enrollment plan matching an admission-score row, if any.
  fn enrollment_plan_for<'a>(
    &'a self,
    college_id: Uuid,
    major_id: Option<Uuid>,
    province: &'a str,
    year: i32,
  ) -> impl Future<Output = Result<Option<EnrollmentPlan>, Self::Error>> + Send + 'a;

  // ── Roll-up counts ────────────────────────────────────────────────────

  /// Distinct majors a college admits for (over scores and plans).
  fn major_count_for_college(
    &self,
    college_id: Uuid,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Distinct provinces a college enrolls in.
  fn enrollment_province_count_for_college(
    &self,
    college_id: Uuid,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  // ── Enumeration ───────────────────────────────────────────────────────

  fn list_ids(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  fn list_ids_updated_since(
    &self,
    kind: EntityKind,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;
}

// ─── Core layer ──────────────────────────────────────────────────────────────

/// Read/write access to the denormalized core layer and the append-only
/// sync-run audit log.
///
/// Upsert contract: insert with `data_version = 1` when no record with the
/// id exists, otherwise overwrite every business/snapshot/statistic field
/// and increment `data_version` by exactly 1 via compare-and-swap on the
/// previous version. `last_synced_at` is always the store's wall clock. A
/// CAS miss must surface as a transient error so the caller can retry.
pub trait CoreStore: Send + Sync {
  type Error: StoreError;

  // ── Upserts ───────────────────────────────────────────────────────────

  fn upsert_college<'a>(
    &'a self,
    record: NewCoreCollege,
    sync_source: &'a str,
  ) -> impl Future<Output = Result<CoreCollege, Self::Error>> + Send + 'a;

  fn upsert_admission_score<'a>(
    &'a self,
    record: NewCoreAdmissionScore,
    sync_source: &'a str,
  ) -> impl Future<Output = Result<CoreAdmissionScore, Self::Error>> + Send + 'a;

  fn upsert_campus_life<'a>(
    &'a self,
    record: NewCoreCampusLife,
    sync_source: &'a str,
  ) -> impl Future<Output = Result<CoreCampusLife, Self::Error>> + Send + 'a;

  // ── Reads (verification, diagnostics) ─────────────────────────────────

  fn get_core_college(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CoreCollege>, Self::Error>> + Send + '_;

  fn get_core_admission_score(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CoreAdmissionScore>, Self::Error>> + Send + '_;

  fn get_core_campus_life(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CoreCampusLife>, Self::Error>> + Send + '_;

  fn list_core_ids(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Referential-integrity reports ─────────────────────────────────────

  /// Core admission scores whose `college_id` has no core college.
  /// Violations are reported, never silently dropped or repaired.
  fn orphan_admission_college_refs(
    &self,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Core admission scores whose `major_id` has no core major snapshot
  /// source (i.e. the cleaned major no longer exists).
  fn orphan_admission_major_refs(
    &self,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Audit log ─────────────────────────────────────────────────────────

  fn insert_sync_run(
    &self,
    run: SyncRun,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Set the terminal status and counters for a run. A run may be
  /// finalized at most once.
  fn finalize_sync_run(
    &self,
    run_id: Uuid,
    stats: SyncStats,
    status: SyncStatus,
    finished_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_sync_runs(
    &self,
    entity: Option<EntityKind>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<SyncRun>, Self::Error>> + Send + '_;

  /// Delete terminal runs started before `cutoff`, returning how many were
  /// removed. Open (pending/running) runs are never pruned.
  fn prune_sync_runs(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
