//! Line-oriented ingestion of the JSONL event log.
//!
//! Each line is one JSON-encoded [`RawEventState`]. A line that fails to
//! decode is logged and skipped; ingestion keeps going. Reading stops at end
//! of file or once `max_length` raw lines have been consumed, whichever
//! comes first. Malformed lines still count toward the raw line tally — batch
//! sealing downstream is driven by lines consumed, not records decoded.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::error;

use crate::event::RawEventState;
use crate::Result;

/// One consumed input line.
#[derive(Debug)]
pub enum IngestItem {
    /// The line decoded into a record.
    Record(RawEventState),
    /// The line was malformed and has been skipped.
    Skipped,
}

/// Reads and decodes the input file one line at a time.
pub struct EventReader {
    lines: Lines<BufReader<File>>,
    max_length: i64,
    consumed: u64,
}

impl EventReader {
    /// Open the input file. A failure here is fatal to the whole run.
    pub async fn open(path: impl AsRef<Path>, max_length: i64) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            max_length,
            consumed: 0,
        })
    }

    /// Raw lines consumed so far, malformed ones included.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Consume the next line. `None` means end of input (EOF or the
    /// `max_length` cap).
    pub async fn next(&mut self) -> Result<Option<IngestItem>> {
        if self.max_length > 0 && self.consumed >= self.max_length as u64 {
            return Ok(None);
        }
        let Some(line) = self.lines.next_line().await? else {
            return Ok(None);
        };
        self.consumed += 1;
        match serde_json::from_str(&line) {
            Ok(record) => Ok(Some(IngestItem::Record(record))),
            Err(err) => {
                error!(line = self.consumed, %err, "failed to decode line, skipping");
                Ok(Some(IngestItem::Skipped))
            }
        }
    }
}
