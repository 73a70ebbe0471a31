//! Run configuration.
//!
//! All knobs recognized by the pipeline live here, with defaults for each
//! recognized option: small worker pool, ten deferral buckets, and a generous
//! drain window so a slow storage backend does not trip the barrier.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a single correlation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Path to the newline-delimited JSON input file.
    pub file_name: PathBuf,
    /// Raw lines per dispatched batch.
    pub batch_size: u64,
    /// Number of deferral buckets for unmatched records.
    pub num_buckets: u32,
    /// Alert when a pair's duration strictly exceeds this (epoch millis).
    pub threshold: i64,
    /// Parallel batch workers.
    pub thread_pool_size: usize,
    /// Cap on raw lines consumed; zero or negative means unbounded.
    pub max_length: i64,
    /// How long the barrier waits for in-flight batches before cancelling.
    #[serde(skip, default = "default_drain_timeout")]
    pub drain_timeout: Duration,
    /// How long cancelled batches get to wind down before we give up on them.
    #[serde(skip, default = "default_cancel_timeout")]
    pub cancel_timeout: Duration,
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_cancel_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            file_name: PathBuf::new(),
            batch_size: 100_000,
            num_buckets: 10,
            threshold: 4,
            thread_pool_size: 2,
            max_length: 0,
            drain_timeout: default_drain_timeout(),
            cancel_timeout: default_cancel_timeout(),
        }
    }
}

impl RunConfig {
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_buckets(mut self, num_buckets: u32) -> Self {
        self.num_buckets = num_buckets;
        self
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_thread_pool(mut self, size: usize) -> Self {
        self.thread_pool_size = size;
        self
    }

    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = timeout;
        self
    }

    /// True when `max_length` caps the number of raw lines consumed.
    pub fn is_bounded(&self) -> bool {
        self.max_length > 0
    }
}
