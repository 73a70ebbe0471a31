//! Record model for the correlation pipeline.
//!
//! `RawEventState` is one decoded input line; `AlertRecord` is the derived
//! row produced when the two markers of an identifier are paired. Both are
//! plain serde value types — persistence and transport live elsewhere.

pub mod bucket;
pub mod correlate;

use serde::{Deserialize, Serialize};

/// Which end of the lifecycle a raw record marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPhase {
    Started,
    Finished,
}

/// One decoded lifecycle marker.
///
/// `bucket` stays unset until the record is deferred; once the record is
/// stamped and persisted the bucket is fixed for its stored lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventState {
    pub id: String,
    pub state: EventPhase,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<u32>,
}

impl RawEventState {
    /// Copy of this record stamped with its deferral bucket.
    pub fn with_bucket(mut self, bucket: u32) -> Self {
        self.bucket = Some(bucket);
        self
    }
}

/// The paired outcome for one identifier. Created exactly once per
/// identifier across the whole run, in either the batch phase or the
/// reconciliation phase — never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    /// Absolute difference of the pair's timestamps, in milliseconds.
    pub duration: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    /// True iff `duration` strictly exceeds the configured threshold.
    pub alert: bool,
}
