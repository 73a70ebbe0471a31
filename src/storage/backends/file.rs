//! JSONL file-backed storage.
//!
//! One append-only JSONL file per bucket plus one for alert rows, all under a
//! base directory. Initialization truncates and recreates the files, which is
//! what lets a re-run start from zero. Appends from concurrent batch workers
//! are serialized per file with async locks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::event::{AlertRecord, RawEventState};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::DeferredStore;

/// File-backed [`DeferredStore`].
#[derive(Debug)]
pub struct JsonlStore {
    base_dir: PathBuf,
    num_buckets: u32,
    initialized: Mutex<bool>,
    bucket_locks: Vec<Mutex<()>>,
    alert_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(base_dir: impl Into<PathBuf>, num_buckets: u32) -> StorageResult<Self> {
        if num_buckets == 0 {
            return Err(StorageError::configuration(
                "at least one bucket is required",
            ));
        }
        Ok(Self {
            base_dir: base_dir.into(),
            num_buckets,
            initialized: Mutex::new(false),
            bucket_locks: (0..num_buckets).map(|_| Mutex::new(())).collect(),
            alert_lock: Mutex::new(()),
        })
    }

    fn bucket_path(&self, bucket: u32) -> PathBuf {
        self.base_dir.join(format!("event_state_{bucket}.jsonl"))
    }

    fn alerts_path(&self) -> PathBuf {
        self.base_dir.join("alerts.jsonl")
    }

    fn check_bucket(&self, bucket: u32) -> StorageResult<()> {
        if bucket >= self.num_buckets {
            return Err(StorageError::UnknownBucket(bucket));
        }
        Ok(())
    }

    /// Truncate and recreate every storage file. Caller holds the init lock.
    async fn create_layout(&self) -> StorageResult<()> {
        debug!(dir = %self.base_dir.display(), "recreating storage layout");
        fs::create_dir_all(&self.base_dir).await?;
        for bucket in 0..self.num_buckets {
            fs::write(self.bucket_path(bucket), b"").await?;
        }
        fs::write(self.alerts_path(), b"").await?;
        Ok(())
    }

    async fn append_lines<T: Serialize>(&self, path: &Path, records: &[T]) -> StorageResult<()> {
        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record).map_err(StorageError::serialization)?);
            buf.push('\n');
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_lines<T: DeserializeOwned>(&self, path: &Path) -> StorageResult<Vec<T>> {
        let content = fs::read_to_string(path).await?;
        content
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::serialization))
            .collect()
    }

    async fn count_lines(&self, path: &Path) -> StorageResult<u64> {
        let content = fs::read_to_string(path).await?;
        Ok(content.lines().filter(|line| !line.is_empty()).count() as u64)
    }
}

#[async_trait]
impl DeferredStore for JsonlStore {
    async fn ensure_initialized(&self) -> StorageResult<()> {
        // Checked-then-set under the lock: the first caller runs the layout
        // setup while every concurrent caller blocks on the mutex.
        let mut initialized = self.initialized.lock().await;
        if !*initialized {
            self.create_layout().await?;
            *initialized = true;
        }
        Ok(())
    }

    async fn recreate(&self) -> StorageResult<()> {
        let mut initialized = self.initialized.lock().await;
        self.create_layout().await?;
        *initialized = true;
        Ok(())
    }

    async fn append_unmatched(
        &self,
        bucket: u32,
        records: Vec<RawEventState>,
    ) -> StorageResult<()> {
        self.check_bucket(bucket)?;
        if records.is_empty() {
            return Ok(());
        }
        let stamped: Vec<RawEventState> = records
            .into_iter()
            .map(|record| record.with_bucket(bucket))
            .collect();
        let _guard = self.bucket_locks[bucket as usize].lock().await;
        self.append_lines(&self.bucket_path(bucket), &stamped).await
    }

    async fn append_alerts(&self, records: Vec<AlertRecord>) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self.alert_lock.lock().await;
        self.append_lines(&self.alerts_path(), &records).await
    }

    async fn read_bucket(&self, bucket: u32) -> StorageResult<Vec<RawEventState>> {
        self.check_bucket(bucket)?;
        self.read_lines(&self.bucket_path(bucket)).await
    }

    async fn count_alerts(&self) -> StorageResult<u64> {
        self.count_lines(&self.alerts_path()).await
    }

    async fn count_bucket(&self, bucket: u32) -> StorageResult<u64> {
        self.check_bucket(bucket)?;
        self.count_lines(&self.bucket_path(bucket)).await
    }
}
