//! The sync-pipeline error taxonomy.
//!
//! Unit-level errors (`NotFound`, `Validation`, `Store`, `Timeout`) are
//! caught at the syncer/orchestrator boundary and surface only as `failed`
//! counts in the run's stats. `RunLevel` is the single aborting class:
//! enumeration or audit-log persistence failed, so no further units are
//! attempted.

use std::time::Duration;

use matric_core::audit::EntityKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SyncError {
  #[error("{kind} not found: {id}")]
  NotFound { kind: EntityKind, id: Uuid },

  #[error("invalid input for {kind} {id}: {reason}")]
  Validation {
    kind:   EntityKind,
    id:     Uuid,
    reason: String,
  },

  #[error("store error after {attempts} attempt(s): {source}")]
  Store {
    attempts:  u32,
    transient: bool,
    #[source]
    source:    Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("sync of {kind} {id} timed out after {timeout:?}")]
  Timeout {
    kind:    EntityKind,
    id:      Uuid,
    timeout: Duration,
  },

  #[error("run-level failure: {0}")]
  RunLevel(String),
}

impl SyncError {
  /// Whether another attempt at the same unit could reasonably succeed.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Store { transient: true, .. })
  }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
