use metrics::counter;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::constants::{FILETYPE, PID};
use crate::error::Result;
use crate::types::RecordTable;

/// Output of a deduplication pass
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated {
    pub table: RecordTable,
    pub dropped: usize,
}

/// Trait for collapsing fan-out duplicates. Implementations only remove
/// records; surviving records are returned unchanged and in order.
pub trait Deduplicator {
    fn deduplicate(&self, table: RecordTable) -> Result<Deduplicated>;
}

/// Keeps the first record seen for each PID and drops any later record for
/// that PID whose `filetype` is empty.
///
/// The rule is positional: a later record is only ever compared against the
/// fact that its PID has been seen before, never against the content of the
/// earlier record. So an empty first record followed by a file-bearing one
/// keeps both, and two file-bearing records for one PID also both survive.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSeenDeduplicator;

impl Deduplicator for FirstSeenDeduplicator {
    #[instrument(skip_all, fields(rows = table.len()))]
    fn deduplicate(&self, table: RecordTable) -> Result<Deduplicated> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut kept = RecordTable::with_capacity(table.len());
        let mut dropped = 0usize;

        for (row, record) in table.into_iter().enumerate() {
            let pid = record.require(PID, row)?;
            let filetype_empty = record.require(FILETYPE, row)?.is_empty();

            if seen.contains(pid) && filetype_empty {
                debug!(pid = %pid, origin = ?record.origin(), "Dropping duplicate without filetype");
                dropped += 1;
                continue;
            }

            if !seen.contains(pid) {
                seen.insert(pid.to_string());
            }
            kept.push(record);
        }

        counter!("pid_reconciler_duplicates_dropped_total").increment(dropped as u64);
        info!("Dropped {} duplicate rows, {} rows remain", dropped, kept.len());
        Ok(Deduplicated {
            table: kept,
            dropped,
        })
    }
}
