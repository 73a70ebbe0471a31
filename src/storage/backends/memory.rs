//! In-memory storage backend for testing.

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::event::{AlertRecord, RawEventState};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::DeferredStore;

/// In-memory [`DeferredStore`] used by unit tests.
#[derive(Debug)]
pub struct MemoryStore {
    num_buckets: u32,
    initialized: Mutex<bool>,
    buckets: RwLock<Vec<Vec<RawEventState>>>,
    alerts: RwLock<Vec<AlertRecord>>,
}

impl MemoryStore {
    pub fn new(num_buckets: u32) -> StorageResult<Self> {
        if num_buckets == 0 {
            return Err(StorageError::configuration(
                "at least one bucket is required",
            ));
        }
        Ok(Self {
            num_buckets,
            initialized: Mutex::new(false),
            buckets: RwLock::new(vec![Vec::new(); num_buckets as usize]),
            alerts: RwLock::new(Vec::new()),
        })
    }

    fn check_bucket(&self, bucket: u32) -> StorageResult<()> {
        if bucket >= self.num_buckets {
            return Err(StorageError::UnknownBucket(bucket));
        }
        Ok(())
    }

    async fn reset(&self) {
        let mut buckets = self.buckets.write().await;
        *buckets = vec![Vec::new(); self.num_buckets as usize];
        self.alerts.write().await.clear();
    }
}

#[async_trait]
impl DeferredStore for MemoryStore {
    async fn ensure_initialized(&self) -> StorageResult<()> {
        let mut initialized = self.initialized.lock().await;
        if !*initialized {
            self.reset().await;
            *initialized = true;
        }
        Ok(())
    }

    async fn recreate(&self) -> StorageResult<()> {
        let mut initialized = self.initialized.lock().await;
        self.reset().await;
        *initialized = true;
        Ok(())
    }

    async fn append_unmatched(
        &self,
        bucket: u32,
        records: Vec<RawEventState>,
    ) -> StorageResult<()> {
        self.check_bucket(bucket)?;
        let mut buckets = self.buckets.write().await;
        buckets[bucket as usize].extend(records.into_iter().map(|r| r.with_bucket(bucket)));
        Ok(())
    }

    async fn append_alerts(&self, records: Vec<AlertRecord>) -> StorageResult<()> {
        self.alerts.write().await.extend(records);
        Ok(())
    }

    async fn read_bucket(&self, bucket: u32) -> StorageResult<Vec<RawEventState>> {
        self.check_bucket(bucket)?;
        Ok(self.buckets.read().await[bucket as usize].clone())
    }

    async fn count_alerts(&self) -> StorageResult<u64> {
        Ok(self.alerts.read().await.len() as u64)
    }

    async fn count_bucket(&self, bucket: u32) -> StorageResult<u64> {
        self.check_bucket(bucket)?;
        Ok(self.buckets.read().await[bucket as usize].len() as u64)
    }
}
