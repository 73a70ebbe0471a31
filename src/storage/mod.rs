//! Persistence for deferred records and alert rows.
//!
//! The pipeline only ever needs append, read-all-in-bucket, and count, so the
//! gateway exposes exactly that. Appends must be safe under concurrent calls
//! from batch workers; reads happen only after the barrier, when no writer is
//! left. One-time structural setup is guarded so that exactly one caller runs
//! it while concurrent callers block until it completes.

pub mod backends;
mod error;


pub use backends::{JsonlStore, MemoryStore};
pub use error::{StorageError, StorageResult};

use async_trait::async_trait;

use crate::event::{AlertRecord, RawEventState};

/// Gateway over the per-bucket deferred-record sets and the alert set.
#[async_trait]
pub trait DeferredStore: Send + Sync {
    /// Idempotent structural setup. Must complete exactly once before any
    /// append or read; concurrent callers block until the first caller's
    /// initialization finishes.
    async fn ensure_initialized(&self) -> StorageResult<()>;

    /// Force re-initialization, wiping all stored records. For re-runs.
    async fn recreate(&self) -> StorageResult<()>;

    /// Persist unmatched records under a bucket, stamping each with the
    /// bucket number. Concurrent-safe.
    async fn append_unmatched(
        &self,
        bucket: u32,
        records: Vec<RawEventState>,
    ) -> StorageResult<()>;

    /// Persist alert rows. Concurrent-safe.
    async fn append_alerts(&self, records: Vec<AlertRecord>) -> StorageResult<()>;

    /// All records persisted under a bucket. Only called after the batch
    /// phase barrier.
    async fn read_bucket(&self, bucket: u32) -> StorageResult<Vec<RawEventState>>;

    /// Total alert rows persisted so far.
    async fn count_alerts(&self) -> StorageResult<u64>;

    /// Records currently persisted under a bucket.
    async fn count_bucket(&self, bucket: u32) -> StorageResult<u64>;
}
