//! Pipeline tuning knobs.

use std::time::Duration;

/// Configuration shared by the syncers and the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
  /// Worker-pool size for batch runs.
  pub workers:        usize,
  /// Per-attempt timeout for a single unit sync. A timeout fails the unit,
  /// never the run.
  pub unit_timeout:   Duration,
  /// Maximum attempts per unit for transient store errors.
  pub retry_attempts: u32,
  /// Base backoff between attempts; multiplied by the attempt number.
  pub retry_backoff:  Duration,
  /// Written into `sync_source` on every core record.
  pub sync_source:    String,
  /// Pin the statistics reference year; `None` takes the wall-clock year
  /// at run start.
  pub reference_year: Option<i32>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      workers:        4,
      unit_timeout:   Duration::from_secs(30),
      retry_attempts: 3,
      retry_backoff:  Duration::from_millis(200),
      sync_source:    "cleaned".to_owned(),
      reference_year: None,
    }
  }
}
