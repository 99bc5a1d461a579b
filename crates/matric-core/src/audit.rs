//! Sync auditing — run records, outcome counters, and the enums that key
//! them.
//!
//! A [`SyncRun`] is created when orchestration starts and finalized exactly
//! once when it ends; it is immutable thereafter. The audit log is
//! append-only and queryable by entity kind and time range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Entity kinds ────────────────────────────────────────────────────────────

/// The kinds of record the pipeline synchronizes (plus the two relation-only
/// kinds it reads but never materializes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  College,
  AdmissionScore,
  CampusLife,
  Major,
  EnrollmentPlan,
}

impl EntityKind {
  /// Kinds that have a core-layer counterpart and can be batch-synced.
  pub fn is_syncable(self) -> bool {
    matches!(
      self,
      Self::College | Self::AdmissionScore | Self::CampusLife
    )
  }
}

impl std::fmt::Display for EntityKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::College => "college",
      Self::AdmissionScore => "admission_score",
      Self::CampusLife => "campus_life",
      Self::Major => "major",
      Self::EnrollmentPlan => "enrollment_plan",
    };
    f.write_str(s)
  }
}

// ─── Run type & status ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
  Full,
  Incremental,
}

/// State machine: `pending → running → {completed | completed_with_errors |
/// failed}`. Terminal states are final; a new run is a new [`SyncRun`], never
/// a resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
  Pending,
  Running,
  Completed,
  CompletedWithErrors,
  Failed,
}

impl SyncStatus {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      Self::Completed | Self::CompletedWithErrors | Self::Failed
    )
  }
}

// ─── Counters ────────────────────────────────────────────────────────────────

/// Per-run outcome counters. `total == synced + failed + skipped` once a run
/// has finished.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct SyncStats {
  pub total:   u64,
  pub synced:  u64,
  pub failed:  u64,
  pub skipped: u64,
}

impl SyncStats {
  /// The terminal status a finished run with these counters should carry.
  pub fn final_status(&self) -> SyncStatus {
    if self.failed == 0 {
      SyncStatus::Completed
    } else {
      SyncStatus::CompletedWithErrors
    }
  }
}

// ─── SyncRun ─────────────────────────────────────────────────────────────────

/// The audit record of one batch synchronization execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
  pub run_id:       Uuid,
  pub sync_type:    SyncType,
  pub entity:       EntityKind,
  pub source_layer: String,
  pub target_layer: String,
  pub stats:        SyncStats,
  pub started_at:   DateTime<Utc>,
  /// Set when the run reaches a terminal status.
  pub finished_at:  Option<DateTime<Utc>>,
  pub status:       SyncStatus,
}

impl SyncRun {
  /// A fresh run record in the `Running` state, counters zeroed.
  pub fn begin(sync_type: SyncType, entity: EntityKind) -> Self {
    Self {
      run_id: Uuid::new_v4(),
      sync_type,
      entity,
      source_layer: "cleaned".to_owned(),
      target_layer: "core".to_owned(),
      stats: SyncStats::default(),
      started_at: Utc::now(),
      finished_at: None,
      status: SyncStatus::Running,
    }
  }
}
