//! Sequential post-barrier reconciliation.
//!
//! After every batch has finished (or been cancelled), each bucket holds all
//! records that went unmatched batch-locally, reunited by the deterministic
//! bucket assignment. This pass walks the buckets in ascending order, one at
//! a time, and gives every identifier its second and final pairing attempt.
//! Records still unmatched afterwards are dropped — there is no third tier.

use tracing::{debug, error};

use crate::event::correlate::correlate;
use crate::storage::{DeferredStore, StorageResult};

/// Drives the reconciliation pass. Deliberately single-threaded: buckets are
/// read and processed one at a time, so storage sees no concurrent access
/// during this phase.
pub struct ReconciliationDriver {
    threshold: i64,
    num_buckets: u32,
}

impl ReconciliationDriver {
    pub fn new(threshold: i64, num_buckets: u32) -> Self {
        Self {
            threshold,
            num_buckets,
        }
    }

    /// Run the pass. A storage failure aborts the remainder of the pass and
    /// is logged; the run as a whole carries on with whatever was persisted.
    pub async fn run(&self, store: &dyn DeferredStore) {
        if let Err(err) = self.try_run(store).await {
            error!(%err, "reconciliation aborted");
        }
    }

    async fn try_run(&self, store: &dyn DeferredStore) -> StorageResult<()> {
        for bucket in 0..self.num_buckets {
            let records = store.read_bucket(bucket).await?;
            debug!(bucket, size = records.len(), "reconciling bucket");
            let outcome = correlate(records, self.threshold);
            if !outcome.alerts.is_empty() {
                store.append_alerts(outcome.alerts).await?;
            }
            for record in &outcome.unmatched {
                debug!(id = %record.id, bucket, "record unresolved after reconciliation");
            }
        }
        Ok(())
    }
}
