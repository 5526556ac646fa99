use crate::config::{DatastreamSource, HeaderMode};
use crate::constants::PID;
use crate::error::{ReconcileError, Result};
use crate::pipeline::processing::LookupIndex;
use crate::types::{Record, RecordTable};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a written table ended up
#[derive(Debug, Clone, PartialEq)]
pub struct SinkReceipt {
    pub location: String,
    pub rows: usize,
    /// Hex SHA-256 of the encoded table
    pub sha256: String,
}

/// Sink for finished tables
pub trait TableSink {
    fn write_table(&mut self, name: &str, table: &RecordTable) -> Result<SinkReceipt>;
}

/// Writes tables as CSV files under an output directory
pub struct CsvTableSink {
    output_dir: PathBuf,
}

impl CsvTableSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

impl TableSink for CsvTableSink {
    fn write_table(&mut self, name: &str, table: &RecordTable) -> Result<SinkReceipt> {
        fs::create_dir_all(&self.output_dir)?;

        let bytes = encode_csv(table)?;
        let path = self.path_for(name);
        fs::write(&path, &bytes)?;

        info!("💾 Saved {} rows to {}", table.len(), path.display());
        Ok(SinkReceipt {
            location: path.to_string_lossy().to_string(),
            rows: table.len(),
            sha256: sha256_hex(&bytes),
        })
    }
}

/// In-memory sink for development/testing
#[derive(Default)]
pub struct MemorySink {
    tables: IndexMap<String, RecordTable>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&RecordTable> {
        self.tables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl TableSink for MemorySink {
    fn write_table(&mut self, name: &str, table: &RecordTable) -> Result<SinkReceipt> {
        let bytes = encode_csv(table)?;
        self.tables.insert(name.to_string(), table.clone());
        debug!("Captured table {} with {} rows", name, table.len());
        Ok(SinkReceipt {
            location: name.to_string(),
            rows: table.len(),
            sha256: sha256_hex(&bytes),
        })
    }
}

/// Encode a table as CSV: a header of the union of all columns, then one line
/// per record with absent fields written as empty cells.
pub fn encode_csv(table: &RecordTable) -> Result<Vec<u8>> {
    let columns = table.columns();
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(&columns)?;
    for record in table {
        writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or("")))?;
    }

    writer
        .into_inner()
        .map_err(|e| ReconcileError::Io(e.into_error()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Read a header and all data rows from CSV input.
fn read_rows<R: Read>(reader: R) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // row width is checked by the callers
        .from_reader(reader);

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}

/// Parse a table with a `PID` column from CSV input. Every column becomes a field.
pub fn decode_table<R: Read>(name: &str, reader: R) -> Result<RecordTable> {
    let (header, rows) = read_rows(reader)?;
    if !header.iter().any(|h| h == PID) {
        return Err(ReconcileError::schema(name, "missing PID column"));
    }
    let mut seen = HashSet::with_capacity(header.len());
    if let Some(column) = header.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(ReconcileError::schema(
            name,
            format!("column '{column}' appears more than once"),
        ));
    }

    let mut table = RecordTable::with_capacity(rows.len());
    for (row_number, row) in rows.into_iter().enumerate() {
        if row.len() != header.len() {
            return Err(ReconcileError::schema(
                name,
                format!(
                    "row {} has {} columns, header has {}",
                    row_number + 1,
                    row.len(),
                    header.len()
                ),
            ));
        }
        table.push(Record::from_pairs(header.iter().cloned().zip(row)));
    }
    Ok(table)
}

/// Read a master or intermediate table from a CSV file.
pub fn read_table(path: impl AsRef<Path>) -> Result<RecordTable> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| {
        ReconcileError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open '{}': {}", path.display(), e),
        ))
    })?;
    let table = decode_table(&path.to_string_lossy(), file)?;
    info!("📥 Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Build the lookup index for one datastream extract from CSV input.
pub fn decode_lookup_source<R: Read>(name: &str, reader: R, mode: HeaderMode) -> Result<LookupIndex> {
    let (header, rows) = read_rows(reader)?;
    LookupIndex::from_rows(name, &header, rows, mode)
}

/// Build the lookup index for a configured datastream extract.
pub fn read_lookup_source(source: &DatastreamSource, mode: HeaderMode) -> Result<LookupIndex> {
    let file = fs::File::open(&source.path).map_err(|e| {
        ReconcileError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open '{}': {}", source.path.display(), e),
        ))
    })?;
    let index = decode_lookup_source(&source.name, file, mode)?;
    info!(
        "📥 Indexed {} PIDs from {} datastream ({})",
        index.len(),
        source.name,
        source.path.display()
    );
    Ok(index)
}
