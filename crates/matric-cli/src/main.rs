//! `matric` — drives cleaned→core synchronization runs from the command
//! line.
//!
//! Reads `matric.toml` (or the path given with `--config`), opens the
//! SQLite store, and runs the requested sync or prints the audit log.
//!
//! # Usage
//!
//! ```
//! matric sync full
//! matric sync full --entity college
//! matric sync incremental --since 2026-08-01T00:00:00Z
//! matric runs --entity college
//! ```

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use matric_core::{audit::EntityKind, store::CoreStore as _};
use matric_store_sqlite::SqliteStore;
use matric_sync::{SyncConfig, SyncOrchestrator};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Cleaned→core sync pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "matric.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run a synchronization batch.
  #[command(subcommand)]
  Sync(SyncCommand),

  /// List recorded sync runs, most recent first.
  Runs {
    /// Only runs for this entity.
    #[arg(long)]
    entity: Option<Entity>,

    /// Only runs started at or after this instant (RFC 3339).
    #[arg(long)]
    from: Option<DateTime<Utc>>,

    /// Only runs started at or before this instant (RFC 3339).
    #[arg(long)]
    to: Option<DateTime<Utc>>,
  },

  /// Delete finished runs started before a cutoff.
  Prune {
    /// Retention cutoff (RFC 3339).
    #[arg(long)]
    before: DateTime<Utc>,
  },
}

#[derive(Subcommand)]
enum SyncCommand {
  /// Sync every source record.
  Full {
    /// Sync a single entity instead of all three.
    #[arg(long)]
    entity: Option<Entity>,
  },

  /// Sync only records updated after a cutoff.
  Incremental {
    /// Cutoff instant (RFC 3339); records with `updated_at > since` sync.
    #[arg(long)]
    since: DateTime<Utc>,

    /// Sync a single entity instead of all three.
    #[arg(long)]
    entity: Option<Entity>,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum Entity {
  College,
  AdmissionScore,
  CampusLife,
}

impl From<Entity> for EntityKind {
  fn from(entity: Entity) -> Self {
    match entity {
      Entity::College => Self::College,
      Entity::AdmissionScore => Self::AdmissionScore,
      Entity::CampusLife => Self::CampusLife,
    }
  }
}

/// Colleges sync first so score/life snapshots never race their parent.
fn entities(selected: Option<Entity>) -> Vec<EntityKind> {
  match selected {
    Some(entity) => vec![entity.into()],
    None => vec![
      EntityKind::College,
      EntityKind::AdmissionScore,
      EntityKind::CampusLife,
    ],
  }
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AppConfig {
  /// SQLite database path holding both layers.
  store_path:       PathBuf,
  #[serde(default = "defaults::workers")]
  workers:          usize,
  #[serde(default = "defaults::unit_timeout_secs")]
  unit_timeout_secs: u64,
  #[serde(default = "defaults::retry_attempts")]
  retry_attempts:   u32,
  #[serde(default = "defaults::retry_backoff_ms")]
  retry_backoff_ms: u64,
  #[serde(default = "defaults::sync_source")]
  sync_source:      String,
}

mod defaults {
  pub fn workers() -> usize { 4 }
  pub fn unit_timeout_secs() -> u64 { 30 }
  pub fn retry_attempts() -> u32 { 3 }
  pub fn retry_backoff_ms() -> u64 { 200 }
  pub fn sync_source() -> String { "cleaned".to_owned() }
}

impl AppConfig {
  fn sync_config(&self) -> SyncConfig {
    SyncConfig {
      workers:        self.workers,
      unit_timeout:   Duration::from_secs(self.unit_timeout_secs),
      retry_attempts: self.retry_attempts,
      retry_backoff:  Duration::from_millis(self.retry_backoff_ms),
      sync_source:    self.sync_source.clone(),
      reference_year: None,
    }
  }
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("MATRIC"))
    .build()
    .context("failed to read config file")?;
  let app_cfg: AppConfig = settings
    .try_deserialize()
    .context("failed to deserialise AppConfig")?;

  let store_path = expand_tilde(&app_cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  match cli.command {
    Command::Sync(sync) => {
      let orchestrator = SyncOrchestrator::new(
        store.clone(),
        store.clone(),
        app_cfg.sync_config(),
      );

      let mut any_failed = false;
      let (since, selected) = match sync {
        SyncCommand::Full { entity } => (None, entity),
        SyncCommand::Incremental { since, entity } => (Some(since), entity),
      };

      for entity in entities(selected) {
        let stats = match since {
          None => orchestrator.run_full(entity).await,
          Some(since) => orchestrator.run_incremental(entity, since).await,
        }
        .with_context(|| format!("{entity} sync run aborted"))?;

        println!(
          "{entity}: total {} synced {} failed {} skipped {}",
          stats.total, stats.synced, stats.failed, stats.skipped
        );
        any_failed |= stats.failed > 0;
      }

      if any_failed {
        return Ok(ExitCode::FAILURE);
      }
    }

    Command::Runs { entity, from, to } => {
      let runs = store
        .list_sync_runs(entity.map(Into::into), from, to)
        .await
        .context("failed to query sync runs")?;

      for run in runs {
        let finished = run
          .finished_at
          .map(|at| at.to_rfc3339())
          .unwrap_or_else(|| "-".to_owned());
        println!(
          "{} {:?} {} {:?} started {} finished {} \
           total {} synced {} failed {} skipped {}",
          run.run_id,
          run.sync_type,
          run.entity,
          run.status,
          run.started_at.to_rfc3339(),
          finished,
          run.stats.total,
          run.stats.synced,
          run.stats.failed,
          run.stats.skipped,
        );
      }
    }

    Command::Prune { before } => {
      let removed = store
        .prune_sync_runs(before)
        .await
        .context("failed to prune sync runs")?;
      println!("removed {removed} run(s)");
    }
  }

  Ok(ExitCode::SUCCESS)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
