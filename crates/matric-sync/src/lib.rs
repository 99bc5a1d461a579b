//! The cleaned→core synchronization pipeline.
//!
//! [`EntitySyncer`] materializes one record at a time: it reads a cleaned
//! record plus its direct relations, computes the derived statistics, and
//! performs exactly one upsert against the core layer.
//! [`SyncOrchestrator`] drives full or incremental batch runs over a
//! bounded worker pool, isolates per-unit failures, and persists an
//! auditable [`SyncRun`](matric_core::audit::SyncRun) per execution.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod syncer;

pub use config::SyncConfig;
pub use error::SyncError;
pub use orchestrator::{CancelHandle, SyncOrchestrator};
pub use syncer::{EntitySyncer, SkipReason, SyncOutcome};

#[cfg(test)]
mod tests;
