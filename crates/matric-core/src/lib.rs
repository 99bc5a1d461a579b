//! Core types and trait definitions for the Matric cleaned→core sync engine.
//!
//! This crate is deliberately free of database and CLI dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod audit;
pub mod cleaned;
pub mod core_layer;
pub mod stats;
pub mod store;
