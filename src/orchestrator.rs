//! Batch orchestration: sealing, dispatch, and the barrier.
//!
//! The run moves through loading, dispatching, awaiting the barrier,
//! reconciling, and done. Loading and dispatching interleave: a batch is
//! sealed and handed to the worker pool the moment the raw line count hits a
//! multiple of `batch_size`. A trailing partial batch is never dispatched.
//!
//! Batches carry no ordering guarantee relative to each other — a later
//! batch's alerts may land in storage before an earlier batch's. The only
//! hard ordering is the barrier: reconciliation starts strictly after every
//! batch task has finished or been aborted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::event::bucket::bucket_of;
use crate::event::correlate::correlate;
use crate::event::RawEventState;
use crate::ingest::{EventReader, IngestItem};
use crate::reconcile::ReconciliationDriver;
use crate::storage::{DeferredStore, StorageResult};
use crate::Result;

/// What a completed run reports.
#[derive(Debug)]
pub struct RunSummary {
    /// Raw input lines consumed, malformed ones included.
    pub records: u64,
    pub elapsed: Duration,
}

/// One correlation unit of work: a sealed batch bound for the worker pool.
struct BatchTask {
    partition: u64,
    threshold: i64,
    num_buckets: u32,
    store: Arc<dyn DeferredStore>,
}

impl BatchTask {
    /// Correlate the batch, persist its alerts, and defer its unmatched
    /// records by bucket. Any storage failure aborts this task only; the
    /// error is surfaced to the barrier, logged there, and dropped.
    async fn run(self, records: Vec<RawEventState>) -> StorageResult<u64> {
        self.store.ensure_initialized().await?;

        debug!(
            partition = self.partition,
            size = records.len(),
            "analyzing partition"
        );
        let outcome = correlate(records, self.threshold);

        let alerts = outcome.alerts.len() as u64;
        self.store.append_alerts(outcome.alerts).await?;
        let total_alerts = self.store.count_alerts().await?;
        debug!(
            partition = self.partition,
            total_alerts,
            "finished inserting alerts"
        );

        if !outcome.unmatched.is_empty() {
            debug!(
                partition = self.partition,
                pending = outcome.unmatched.len(),
                "deferring unmatched records"
            );
            let mut by_bucket: HashMap<u32, Vec<RawEventState>> = HashMap::new();
            for record in outcome.unmatched {
                by_bucket
                    .entry(bucket_of(&record.id, self.num_buckets))
                    .or_default()
                    .push(record);
            }
            for (bucket, records) in by_bucket {
                self.store.append_unmatched(bucket, records).await?;
                let pending = self.store.count_bucket(bucket).await?;
                debug!(
                    partition = self.partition,
                    bucket,
                    pending,
                    "finished inserting to bucket"
                );
            }
        }

        Ok(alerts)
    }
}

/// Runs the whole pipeline over one input file.
pub struct BatchOrchestrator {
    config: RunConfig,
    store: Arc<dyn DeferredStore>,
}

impl BatchOrchestrator {
    pub fn new(config: RunConfig, store: Arc<dyn DeferredStore>) -> Self {
        Self { config, store }
    }

    /// Load, dispatch, await the barrier, reconcile, and report.
    ///
    /// Only a failure to open or read the input stream is fatal. A batch
    /// task that fails loses its in-flight results: no retry, no
    /// propagation — the fire-and-forget policy the barrier applies when it
    /// collects task outcomes.
    pub async fn run(&self) -> Result<RunSummary> {
        debug!(
            file = %self.config.file_name.display(),
            batch_size = self.config.batch_size,
            buckets = self.config.num_buckets,
            threshold = self.config.threshold,
            pool = self.config.thread_pool_size,
            max_length = self.config.max_length,
            "reading input file"
        );
        if self.config.batch_size == 0 {
            return Err(crate::Error::Config("batch_size must be positive".into()));
        }
        let start = Instant::now();

        let mut reader =
            EventReader::open(&self.config.file_name, self.config.max_length).await?;

        let semaphore = Arc::new(Semaphore::new(self.config.thread_pool_size));
        let mut tasks = FuturesUnordered::new();
        let mut abort_handles: Vec<AbortHandle> = Vec::new();
        let mut batch: Vec<RawEventState> = Vec::new();
        let mut partition = 0u64;

        while let Some(item) = reader.next().await? {
            if let IngestItem::Record(record) = item {
                batch.push(record);
            }
            if reader.consumed() % self.config.batch_size == 0 {
                partition += 1;
                debug!(partition, "starting analyzing partition");
                let task = BatchTask {
                    partition,
                    threshold: self.config.threshold,
                    num_buckets: self.config.num_buckets,
                    store: self.store.clone(),
                };
                let records = std::mem::take(&mut batch);
                let permit = semaphore.clone().acquire_owned().await.unwrap();
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    task.run(records).await
                });
                abort_handles.push(handle.abort_handle());
                tasks.push(handle);
            }
        }
        // A trailing partial batch is deliberately left undispatched.
        if !batch.is_empty() {
            debug!(
                remainder = batch.len(),
                "trailing partial batch not dispatched"
            );
        }

        self.await_barrier(&mut tasks, &abort_handles).await;

        let records = reader.consumed();
        if records > 0 {
            ReconciliationDriver::new(self.config.threshold, self.config.num_buckets)
                .run(self.store.as_ref())
                .await;
        }

        let elapsed = start.elapsed();
        info!(
            "Processed {} records in {}ms",
            records,
            elapsed.as_millis()
        );
        Ok(RunSummary { records, elapsed })
    }

    /// Wait for every dispatched batch to finish, within a bound. On timeout
    /// the stragglers are aborted and given a second, shorter window to wind
    /// down; either way this returns and never hangs the run.
    async fn await_barrier(
        &self,
        tasks: &mut FuturesUnordered<tokio::task::JoinHandle<StorageResult<u64>>>,
        abort_handles: &[AbortHandle],
    ) {
        let drain = async {
            while let Some(joined) = tasks.next().await {
                match joined {
                    Ok(Ok(alerts)) => debug!(alerts, "batch task finished"),
                    // Fire-and-forget: the failure is logged here and the
                    // task's in-flight results are lost. No retry.
                    Ok(Err(err)) => error!(%err, "batch task failed, its results are lost"),
                    Err(err) => error!(%err, "batch task aborted"),
                }
            }
        };
        if timeout(self.config.drain_timeout, drain).await.is_err() {
            warn!("batch pool did not drain in time, cancelling outstanding work");
            for handle in abort_handles {
                handle.abort();
            }
            let winding_down = async {
                while tasks.next().await.is_some() {}
            };
            if timeout(self.config.cancel_timeout, winding_down)
                .await
                .is_err()
            {
                error!("batch pool did not terminate");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tempfile::NamedTempFile;

    use crate::event::AlertRecord;
    use crate::storage::{MemoryStore, StorageError};

    fn event_line(id: &str, state: &str, timestamp: i64) -> String {
        format!(
            r#"{{"id":"{id}","state":"{state}","timestamp":{timestamp},"type":"t","host":"h"}}"#
        )
    }

    fn write_input(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    /// Store whose alert appends outlast any barrier the tests configure.
    /// Bucket reads are counted so reconciliation stays observable.
    struct StalledStore {
        inner: MemoryStore,
        bucket_reads: AtomicU32,
    }

    impl StalledStore {
        fn new(num_buckets: u32) -> Self {
            Self {
                inner: MemoryStore::new(num_buckets).unwrap(),
                bucket_reads: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DeferredStore for StalledStore {
        async fn ensure_initialized(&self) -> StorageResult<()> {
            self.inner.ensure_initialized().await
        }

        async fn recreate(&self) -> StorageResult<()> {
            self.inner.recreate().await
        }

        async fn append_unmatched(
            &self,
            bucket: u32,
            records: Vec<RawEventState>,
        ) -> StorageResult<()> {
            self.inner.append_unmatched(bucket, records).await
        }

        async fn append_alerts(&self, records: Vec<AlertRecord>) -> StorageResult<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            self.inner.append_alerts(records).await
        }

        async fn read_bucket(&self, bucket: u32) -> StorageResult<Vec<RawEventState>> {
            self.bucket_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_bucket(bucket).await
        }

        async fn count_alerts(&self) -> StorageResult<u64> {
            self.inner.count_alerts().await
        }

        async fn count_bucket(&self, bucket: u32) -> StorageResult<u64> {
            self.inner.count_bucket(bucket).await
        }
    }

    /// Store that refuses every deferral, making any batch with unmatched
    /// records fail after its alerts went through.
    struct DeferFailingStore {
        inner: MemoryStore,
        bucket_reads: AtomicU32,
    }

    impl DeferFailingStore {
        fn new(num_buckets: u32) -> Self {
            Self {
                inner: MemoryStore::new(num_buckets).unwrap(),
                bucket_reads: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DeferredStore for DeferFailingStore {
        async fn ensure_initialized(&self) -> StorageResult<()> {
            self.inner.ensure_initialized().await
        }

        async fn recreate(&self) -> StorageResult<()> {
            self.inner.recreate().await
        }

        async fn append_unmatched(
            &self,
            _bucket: u32,
            _records: Vec<RawEventState>,
        ) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }

        async fn append_alerts(&self, records: Vec<AlertRecord>) -> StorageResult<()> {
            self.inner.append_alerts(records).await
        }

        async fn read_bucket(&self, bucket: u32) -> StorageResult<Vec<RawEventState>> {
            self.bucket_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_bucket(bucket).await
        }

        async fn count_alerts(&self) -> StorageResult<u64> {
            self.inner.count_alerts().await
        }

        async fn count_bucket(&self, bucket: u32) -> StorageResult<u64> {
            self.inner.count_bucket(bucket).await
        }
    }

    // The barrier must not hang on a stalled batch: after the drain bound the
    // task is aborted, the second wait is bounded too, and reconciliation
    // still walks every bucket over whatever was persisted.
    #[tokio::test]
    async fn barrier_timeout_aborts_stalled_batches_and_still_reconciles() {
        let num_buckets = 4;
        let file = write_input(&[
            event_line("a", "STARTED", 0),
            event_line("a", "FINISHED", 100),
        ]);
        let store = Arc::new(StalledStore::new(num_buckets));
        let config = RunConfig::new(file.path())
            .with_batch_size(2)
            .with_buckets(num_buckets)
            .with_threshold(1)
            .with_drain_timeout(Duration::from_millis(100))
            .with_cancel_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let summary = BatchOrchestrator::new(config, store.clone())
            .run()
            .await
            .unwrap();

        // Nowhere near the 30s the store would stall for.
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(summary.records, 2);
        // The batch was cancelled mid-append; its results are gone.
        assert_eq!(store.inner.count_alerts().await.unwrap(), 0);
        // Reconciliation ran regardless, one read per bucket.
        assert_eq!(store.bucket_reads.load(Ordering::SeqCst), num_buckets);
    }

    // A batch that hits a storage error loses its in-flight results and is
    // neither retried nor propagated: the run returns Ok, the surviving
    // batches' alerts stay persisted, and reconciliation still happens.
    #[tokio::test]
    async fn failed_batch_loses_its_results_but_the_run_proceeds() {
        let num_buckets = 4;
        let file = write_input(&[
            event_line("pair", "STARTED", 0),
            event_line("pair", "FINISHED", 100),
            event_line("solo-1", "STARTED", 0),
            event_line("solo-2", "STARTED", 0),
        ]);
        let store = Arc::new(DeferFailingStore::new(num_buckets));
        let config = RunConfig::new(file.path())
            .with_batch_size(2)
            .with_buckets(num_buckets)
            .with_threshold(1);

        let summary = BatchOrchestrator::new(config, store.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.records, 4);
        // First batch paired and persisted its alert before any deferral.
        assert_eq!(store.inner.count_alerts().await.unwrap(), 1);
        // The second batch's singletons were lost with the failed deferral.
        let mut deferred = 0;
        for bucket in 0..num_buckets {
            deferred += store.inner.count_bucket(bucket).await.unwrap();
        }
        assert_eq!(deferred, 0);
        // Reconciliation still walked every bucket.
        assert_eq!(store.bucket_reads.load(Ordering::SeqCst), num_buckets);
    }
}
