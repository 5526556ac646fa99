use metrics::counter;
use tracing::{debug, info, instrument};

use crate::constants::PID;
use crate::error::Result;
use crate::pipeline::processing::lookup::LookupIndex;
use crate::types::{Origin, RecordTable};

/// Fan-out join of the master table against datastream lookup indexes.
///
/// Master order is the primary iteration order; within one master row the
/// indexes are consulted in the order they were configured. Every matching
/// index emits its own copy of the master row with that index's overlay
/// applied. A master row with no match is passed through unchanged, so no
/// master row is ever dropped and PIDs that only appear in an index are
/// never emitted.
#[derive(Debug, Default)]
pub struct Expander {
    indexes: Vec<LookupIndex>,
}

impl Expander {
    pub fn new(indexes: Vec<LookupIndex>) -> Self {
        Self { indexes }
    }

    pub fn indexes(&self) -> &[LookupIndex] {
        &self.indexes
    }

    #[instrument(skip_all, fields(master_rows = master.len(), indexes = self.indexes.len()))]
    pub fn expand(&self, master: RecordTable) -> Result<RecordTable> {
        let mut expanded = RecordTable::with_capacity(master.len());
        let mut unmatched = 0usize;

        for (row, record) in master.into_iter().enumerate() {
            let pid = record.require(PID, row)?.to_string();

            let mut matches = 0usize;
            for index in &self.indexes {
                if let Some(overlay) = index.get(&pid) {
                    let mut emitted = record
                        .clone()
                        .with_origin(Origin::Datastream(index.name().to_string()));
                    emitted.overlay(overlay);
                    expanded.push(emitted);
                    matches += 1;
                    counter!("pid_reconciler_datastream_matches_total", "source" => index.name().to_string())
                        .increment(1);
                }
            }

            if matches == 0 {
                expanded.push(record);
                unmatched += 1;
            } else if matches > 1 {
                debug!(pid = %pid, matches, "PID fanned out across datastreams");
            }
        }

        counter!("pid_reconciler_rows_expanded_total").increment(expanded.len() as u64);
        info!(
            "Expanded to {} rows ({} master rows without a datastream match)",
            expanded.len(),
            unmatched
        );
        Ok(expanded)
    }
}
