//! Error type for `matric-store-sqlite`.

use matric_core::{audit::EntityKind, store::StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),

  /// The compare-and-swap on `data_version` missed — another writer got
  /// there first. Transient; callers retry the whole upsert.
  #[error("version conflict on {kind} {id} (expected data_version {expected})")]
  VersionConflict {
    kind:     EntityKind,
    id:       Uuid,
    expected: i64,
  },

  /// A sync run may be finalized at most once.
  #[error("sync run {0} is already finalized")]
  RunAlreadyFinalized(Uuid),

  #[error("sync run not found: {0}")]
  RunNotFound(Uuid),
}

impl StoreError for Error {
  fn is_transient(&self) -> bool {
    matches!(self, Self::Database(_) | Self::VersionConflict { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
