use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::HeaderMode;
use crate::constants::{DATASTREAM_ATTRIBUTES, PID};
use crate::error::{ReconcileError, Result};

/// Attribute overlay for one PID, keyed by attribute name in export order.
pub type Overlay = IndexMap<String, String>;

/// PID-keyed overlays for a single datastream extract.
///
/// Built once per run and read-only afterwards. When an extract lists the
/// same PID more than once, the later row replaces the earlier one. Rows with
/// a blank PID are skipped, so they never match a master row.
#[derive(Debug, Clone)]
pub struct LookupIndex {
    name: String,
    entries: HashMap<String, Overlay>,
}

impl LookupIndex {
    /// Build an index from a header and its data rows.
    ///
    /// `Named` mode requires the header to name `PID` and every datastream
    /// attribute exactly once. `Positional` mode ignores header text and reads
    /// `PID` from the first column followed by the attributes in export order.
    /// Both modes fail with a schema error when the column count is wrong.
    pub fn from_rows<I>(
        name: impl Into<String>,
        header: &[String],
        rows: I,
        mode: HeaderMode,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let name = name.into();
        let expected = DATASTREAM_ATTRIBUTES.len();
        let attribute_columns = header.len().saturating_sub(1);
        if header.is_empty() || attribute_columns != expected {
            return Err(ReconcileError::schema(
                &name,
                format!(
                    "expected PID plus {} attribute columns, found {} columns",
                    expected,
                    header.len()
                ),
            ));
        }

        let layout = ColumnLayout::resolve(&name, header, mode)?;
        let mut entries: HashMap<String, Overlay> = HashMap::new();

        for (row_number, row) in rows.into_iter().enumerate() {
            if row.len() != header.len() {
                return Err(ReconcileError::schema(
                    &name,
                    format!(
                        "row {} has {} columns, header has {}",
                        row_number + 1,
                        row.len(),
                        header.len()
                    ),
                ));
            }

            let pid = row[layout.pid].clone();
            if pid.trim().is_empty() {
                warn!(source = %name, row = row_number + 1, "Skipping datastream row with blank PID");
                continue;
            }
            let overlay: Overlay = DATASTREAM_ATTRIBUTES
                .iter()
                .zip(&layout.attributes)
                .map(|(attr, &col)| (attr.to_string(), row[col].clone()))
                .collect();

            if entries.insert(pid.clone(), overlay).is_some() {
                debug!(source = %name, pid = %pid, "Duplicate PID in datastream extract, later row wins");
            }
        }

        debug!(source = %name, entries = entries.len(), "Built lookup index");
        Ok(Self { name, entries })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, pid: &str) -> Option<&Overlay> {
        self.entries.get(pid)
    }

    pub fn contains(&self, pid: &str) -> bool {
        self.entries.contains_key(pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Column positions of the PID and of each attribute (in export order).
struct ColumnLayout {
    pid: usize,
    attributes: Vec<usize>,
}

impl ColumnLayout {
    fn resolve(name: &str, header: &[String], mode: HeaderMode) -> Result<Self> {
        match mode {
            HeaderMode::Positional => Ok(Self {
                pid: 0,
                attributes: (1..header.len()).collect(),
            }),
            HeaderMode::Named => {
                let position = |column: &str| -> Result<usize> {
                    let mut hits = header
                        .iter()
                        .enumerate()
                        .filter(|(_, h)| h.trim() == column)
                        .map(|(i, _)| i);
                    match (hits.next(), hits.next()) {
                        (Some(i), None) => Ok(i),
                        (None, _) => Err(ReconcileError::schema(
                            name,
                            format!("missing column '{column}'"),
                        )),
                        (Some(_), Some(_)) => Err(ReconcileError::schema(
                            name,
                            format!("column '{column}' appears more than once"),
                        )),
                    }
                };

                let pid = position(PID)?;
                let attributes = DATASTREAM_ATTRIBUTES
                    .iter()
                    .map(|&attr| position(attr))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self { pid, attributes })
            }
        }
    }
}
