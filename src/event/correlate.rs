//! The pairing algorithm shared by the batch phase and the reconciliation
//! phase.
//!
//! Correlation is pure: it takes a collection of raw records (a batch, or the
//! full contents of one bucket) and splits it into alert rows and unmatched
//! leftovers. Callers decide where each side goes — the batch phase defers
//! unmatched records into buckets, the reconciliation phase drops them.

use std::collections::HashMap;

use tracing::debug;

use crate::event::{AlertRecord, RawEventState};

/// Output of one correlation pass.
#[derive(Debug, Default)]
pub struct Correlation {
    pub alerts: Vec<AlertRecord>,
    pub unmatched: Vec<RawEventState>,
}

/// Pair records by identifier and derive alert rows.
///
/// Grouping compares the raw identifier string for exact equality — no
/// normalization. For each identifier group:
///
/// - exactly two records: one [`AlertRecord`] with the absolute timestamp
///   difference as its duration, flagged iff the duration strictly exceeds
///   `threshold`. The row is emitted whether or not it is flagged. The first
///   record of the group supplies the representative id/type/host fields.
/// - exactly one record: carried over as unmatched.
/// - three or more records: only the first record observed is kept as the
///   unmatched candidate; the rest are discarded. Known limitation, kept
///   deliberately.
pub fn correlate(records: Vec<RawEventState>, threshold: i64) -> Correlation {
    let mut by_id: HashMap<String, Vec<RawEventState>> = HashMap::new();
    for record in records {
        by_id.entry(record.id.clone()).or_default().push(record);
    }

    let mut outcome = Correlation::default();
    for (id, mut group) in by_id {
        if group.len() == 2 {
            let duration = (group[0].timestamp - group[1].timestamp).abs();
            let first = group.swap_remove(0);
            outcome.alerts.push(AlertRecord {
                id: first.id,
                duration,
                kind: first.kind,
                host: first.host,
                alert: duration > threshold,
            });
        } else {
            if group.len() > 2 {
                debug!(
                    %id,
                    count = group.len(),
                    "more than two records share an identifier, keeping the first"
                );
            } else {
                debug!(%id, "record not combined in current pass");
            }
            if let Some(first) = group.into_iter().next() {
                outcome.unmatched.push(first);
            }
        }
    }
    outcome
}
