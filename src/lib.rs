//! # Alertlog
//!
//! Ingests a newline-delimited JSON log of paired lifecycle events
//! (`STARTED`/`FINISHED` markers sharing an identifier), computes the elapsed
//! duration between the two markers of each pair, and raises an alert when
//! that duration exceeds a configured threshold.
//!
//! The two markers for an identifier can be arbitrarily far apart in a
//! multi-hundred-thousand-line file, so pairing happens in two passes: a
//! parallel batch pass that pairs whatever lands in the same batch and defers
//! the rest into hash buckets, and a sequential reconciliation pass that
//! re-attempts pairing bucket by bucket once every batch has finished.
//!
//! ## Modules
//!
//! - `config` - Run configuration with builder-style setters
//! - `event` - Record model, bucket assignment, and the correlation algorithm
//! - `ingest` - Line-oriented JSONL reading with per-line decode recovery
//! - `orchestrator` - Batch sealing, the bounded worker pool, and the barrier
//! - `reconcile` - Sequential post-barrier pairing over deferred buckets
//! - `storage` - Deferred-record and alert persistence behind an async trait

pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod orchestrator;
pub mod reconcile;
pub mod storage;

pub use error::{Error, Result};
