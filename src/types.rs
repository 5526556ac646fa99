use crate::constants;
use crate::error::{ReconcileError, Result};
use indexmap::{IndexMap, IndexSet};

/// Where a record in the table came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Origin {
    /// Read from a master or intermediate table as-is.
    #[default]
    Master,
    /// Master row overlaid with the named datastream's attributes.
    Datastream(String),
}

/// A single row: ordered field name to value. An empty string is the
/// empty marker; a field that was never set is absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: IndexMap<String, String>,
    origin: Origin,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            origin: Origin::Master,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// PID for diagnostics; never fails.
    pub fn pid_or_unknown(&self) -> &str {
        self.get(constants::PID).unwrap_or("<unknown>")
    }

    /// Fetch a field a stage cannot run without. `row` is the zero-based
    /// position of the record in its table, reported in the error.
    pub fn require(&self, field: &str, row: usize) -> Result<&str> {
        self.get(field).ok_or_else(|| ReconcileError::MissingField {
            field: field.to_string(),
            pid: self.pid_or_unknown().to_string(),
            row,
        })
    }

    /// Apply `overlay`: its fields replace identically named fields, every
    /// other field is preserved.
    pub fn overlay(&mut self, overlay: &IndexMap<String, String>) {
        for (field, value) in overlay {
            self.fields.insert(field.clone(), value.clone());
        }
    }
}

/// Ordered collection of records passed between pipeline stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordTable {
    records: Vec<Record>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Union of every field set on any record, in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = IndexSet::new();
        for record in &self.records {
            for (field, _) in record.fields() {
                if !columns.contains(field) {
                    columns.insert(field.to_string());
                }
            }
        }
        columns.into_iter().collect()
    }

    /// Make the table rectangular: every record gets every column, empty
    /// where it was never set.
    pub fn fill_missing_columns(&mut self) {
        let columns = self.columns();
        for record in &mut self.records {
            for column in &columns {
                if !record.contains(column) {
                    record.set(column.as_str(), "");
                }
            }
        }
    }

    /// Records whose PID equals `pid`, in table order.
    pub fn find_by_pid<'a>(&'a self, pid: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .iter()
            .filter(move |r| r.get(constants::PID) == Some(pid))
    }
}

impl FromIterator<Record> for RecordTable {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RecordTable {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordTable {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_replaces_and_preserves() {
        let mut record = Record::from_pairs([
            ("PID", "LIB-x:1"),
            ("filetype", "old"),
            ("title", "Map"),
        ]);
        let overlay: IndexMap<String, String> =
            [("filetype".to_string(), "pdf".to_string())].into_iter().collect();

        record.overlay(&overlay);

        assert_eq!(record.get("filetype"), Some("pdf"));
        assert_eq!(record.get("title"), Some("Map"));
    }

    #[test]
    fn test_require_reports_missing_field() {
        let record = Record::from_pairs([("PID", "LIB-x:1")]);
        let err = record.require("content_model", 4).unwrap_err();
        match err {
            ReconcileError::MissingField { field, pid, row } => {
                assert_eq!(field, "content_model");
                assert_eq!(pid, "LIB-x:1");
                assert_eq!(row, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let table: RecordTable = vec![
            Record::from_pairs([("PID", "a"), ("title", "t")]),
            Record::from_pairs([("PID", "b"), ("filetype", "pdf"), ("title", "u")]),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.columns(), vec!["PID", "title", "filetype"]);
    }

    #[test]
    fn test_fill_missing_columns() {
        let mut table: RecordTable = vec![
            Record::from_pairs([("PID", "a")]),
            Record::from_pairs([("PID", "b"), ("filetype", "pdf")]),
        ]
        .into_iter()
        .collect();

        table.fill_missing_columns();

        assert_eq!(table.records()[0].get("filetype"), Some(""));
        assert_eq!(table.records()[1].get("filetype"), Some("pdf"));
    }
}
