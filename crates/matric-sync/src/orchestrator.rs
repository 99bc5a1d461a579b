//! [`SyncOrchestrator`] — drives a full or incremental batch run.
//!
//! The orchestrator enumerates source ids, dispatches them to an
//! [`EntitySyncer`] over a bounded worker pool, isolates per-unit failures,
//! aggregates [`SyncStats`], and persists a [`SyncRun`] audit record. A
//! single bad record never aborts a run; only a `RunLevel` failure
//! (enumeration or audit persistence) does.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use chrono::{Datelike as _, Utc};
use matric_core::{
  audit::{EntityKind, SyncRun, SyncStats, SyncStatus, SyncType},
  store::{CleanedStore, CoreStore},
};
use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use crate::{
  config::SyncConfig,
  error::SyncError,
  syncer::{EntitySyncer, SkipReason, SyncOutcome},
};

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Cooperative cancellation for a running batch.
///
/// Cancelling stops dispatching new units; in-flight units finish and the
/// run is finalized normally with undispatched units counted as skipped.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
  pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed); }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct SyncOrchestrator<Cl, Co> {
  cleaned: Arc<Cl>,
  core:    Arc<Co>,
  config:  SyncConfig,
  cancel:  CancelHandle,
}

impl<Cl, Co> SyncOrchestrator<Cl, Co>
where
  Cl: CleanedStore + 'static,
  Co: CoreStore + 'static,
{
  pub fn new(cleaned: Arc<Cl>, core: Arc<Co>, config: SyncConfig) -> Self {
    Self {
      cleaned,
      core,
      config,
      cancel: CancelHandle::default(),
    }
  }

  /// A handle that can cancel this orchestrator's runs from another task.
  pub fn cancel_handle(&self) -> CancelHandle { self.cancel.clone() }

  /// Sync every source record of `entity`.
  pub async fn run_full(
    &self,
    entity: EntityKind,
  ) -> Result<SyncStats, SyncError> {
    self.run(SyncType::Full, entity, None).await
  }

  /// Sync only source records with `updated_at > since`.
  pub async fn run_incremental(
    &self,
    entity: EntityKind,
    since: chrono::DateTime<Utc>,
  ) -> Result<SyncStats, SyncError> {
    self.run(SyncType::Incremental, entity, Some(since)).await
  }

  async fn run(
    &self,
    sync_type: SyncType,
    entity: EntityKind,
    since: Option<chrono::DateTime<Utc>>,
  ) -> Result<SyncStats, SyncError> {
    if !entity.is_syncable() {
      return Err(SyncError::RunLevel(format!(
        "{entity} has no core-layer counterpart"
      )));
    }

    let run = SyncRun::begin(sync_type, entity);
    tracing::info!(
      run_id = %run.run_id, %entity, sync_type = ?sync_type,
      "sync run starting"
    );

    // Enumeration failure is run-level: record the run as failed (best
    // effort) and attempt no units.
    let ids = match self.enumerate(entity, since).await {
      Ok(ids) => ids,
      Err(err) => {
        tracing::error!(
          run_id = %run.run_id, %entity, error = %err,
          "id enumeration failed; aborting run"
        );
        let mut failed = run;
        failed.status = SyncStatus::Failed;
        failed.finished_at = Some(Utc::now());
        if let Err(audit_err) = self.core.insert_sync_run(failed).await {
          tracing::error!(
            error = %audit_err,
            "could not record failed sync run"
          );
        }
        return Err(err);
      }
    };

    let run_id = run.run_id;
    self
      .core
      .insert_sync_run(run)
      .await
      .map_err(|e| SyncError::RunLevel(format!("audit insert failed: {e}")))?;

    let reference_year = self
      .config
      .reference_year
      .unwrap_or_else(|| Utc::now().year());
    let syncer = Arc::new(EntitySyncer::new(
      self.cleaned.clone(),
      self.core.clone(),
      self.config.clone(),
      reference_year,
    ));

    let mut stats = SyncStats {
      total: ids.len() as u64,
      ..SyncStats::default()
    };

    let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
    let mut tasks: JoinSet<(Uuid, SyncOutcome)> = JoinSet::new();

    for id in ids {
      if self.cancel.is_cancelled() {
        tracing::info!(%id, %entity, reason = %SkipReason::Cancelled, "unit skipped");
        stats.skipped += 1;
        continue;
      }

      // Acquiring before spawning bounds in-flight units to the pool size.
      let permit = semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| SyncError::RunLevel(format!("worker pool closed: {e}")))?;
      let syncer = Arc::clone(&syncer);

      tasks.spawn(async move {
        let _permit = permit;
        let outcome = syncer.sync(entity, id).await;
        (id, outcome)
      });
    }

    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((id, SyncOutcome::Synced)) => {
          tracing::debug!(%id, %entity, "unit synced");
          stats.synced += 1;
        }
        Ok((id, SyncOutcome::Skipped(reason))) => {
          tracing::info!(%id, %entity, %reason, "unit skipped");
          stats.skipped += 1;
        }
        Ok((id, SyncOutcome::Failed(err))) => {
          tracing::warn!(%id, %entity, error = %err, "unit sync failed");
          stats.failed += 1;
        }
        Err(join_err) => {
          tracing::warn!(%entity, error = %join_err, "sync task aborted");
          stats.failed += 1;
        }
      }
    }

    let status = stats.final_status();
    self
      .core
      .finalize_sync_run(run_id, stats, status, Utc::now())
      .await
      .map_err(|e| {
        SyncError::RunLevel(format!("audit finalize failed: {e}"))
      })?;

    tracing::info!(
      %run_id, %entity, ?status,
      total = stats.total, synced = stats.synced,
      failed = stats.failed, skipped = stats.skipped,
      "sync run finished"
    );
    Ok(stats)
  }

  async fn enumerate(
    &self,
    entity: EntityKind,
    since: Option<chrono::DateTime<Utc>>,
  ) -> Result<Vec<Uuid>, SyncError> {
    let result = match since {
      None => self.cleaned.list_ids(entity).await,
      Some(since) => {
        self.cleaned.list_ids_updated_since(entity, since).await
      }
    };
    result.map_err(|e| {
      SyncError::RunLevel(format!("failed to enumerate {entity} ids: {e}"))
    })
  }
}
