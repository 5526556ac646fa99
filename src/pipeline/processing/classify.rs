use metrics::counter;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::constants::{self, CONTENT_MODEL, FILE_FIELDS, FILE_SIZE, PARENT_PID, PID};
use crate::error::{ReconcileError, Result};
use crate::types::{Record, RecordTable};

/// Counts of the rewrites a classification pass performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationSummary {
    /// Records whose file fields were blanked
    pub blanked: usize,
    /// Records whose byte count was rescaled to a display string
    pub rescaled: usize,
    /// Collection-level records that had their paths and provenance derived
    pub collections: usize,
}

/// Trait for rewriting file and provenance fields of expanded records
pub trait Classifier {
    /// Rewrite every record in place. Never adds, removes or reorders records.
    fn classify(&self, table: &mut RecordTable) -> Result<ClassificationSummary>;
}

/// Configuration for classification rules
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Content models whose records keep file metadata
    pub content_model_allowlist: HashSet<String>,
    /// Divisor applied to raw byte counts
    pub file_size_divisor: f64,
    /// Suffix appended to the scaled size
    pub file_size_unit_label: String,
    /// Repository base URL used for collection download links
    pub collection_url_base: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ClassifierConfig {
    fn from(config: &Config) -> Self {
        Self {
            content_model_allowlist: config.content_model_allowlist.iter().cloned().collect(),
            file_size_divisor: config.file_size_divisor,
            file_size_unit_label: config.file_size_unit_label.clone(),
            collection_url_base: config.collection_url_base.clone(),
        }
    }
}

/// Default classifier: the content-model rule followed by the
/// collection-derivation rule.
///
/// Blanking is idempotent. Size rescaling is not: a rescaled value is no
/// longer numeric, so classifying the same table twice fails with a
/// data-format error on any allow-listed record that still carries a size.
pub struct DefaultClassifier {
    pub config: ClassifierConfig,
}

impl DefaultClassifier {
    pub fn new() -> Self {
        Self {
            config: ClassifierConfig::default(),
        }
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Download URL for a datastream of `pid` in the repository.
    pub fn datastream_url(&self, pid: &str, stream: &str) -> String {
        format!(
            "{}/islandora/object/{}/datastream/{}/download",
            self.config.collection_url_base.trim_end_matches('/'),
            pid,
            stream
        )
    }

    /// Render a raw byte count as a scaled display string, e.g. `5000` as `5Kb`.
    /// Counts that are not finite or carry a minus sign (`-0` included) are
    /// malformed.
    pub fn format_file_size(&self, raw: &str, pid: &str) -> Result<String> {
        let bytes: f64 = raw
            .trim()
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite() && v.is_sign_positive())
            .ok_or_else(|| ReconcileError::DataFormat {
                field: FILE_SIZE.to_string(),
                value: raw.to_string(),
                pid: pid.to_string(),
            })?;

        Ok(format!(
            "{}{}",
            bytes / self.config.file_size_divisor,
            self.config.file_size_unit_label
        ))
    }

    /// Returns true when the record's file fields were blanked.
    fn apply_content_model_rule(&self, record: &mut Record, row: usize) -> Result<bool> {
        let content_model = record.require(CONTENT_MODEL, row)?;

        if !self.config.content_model_allowlist.contains(content_model) {
            for field in FILE_FIELDS {
                record.set(field, "");
            }
            return Ok(true);
        }

        // An allow-listed record without a size has nothing to rescale.
        let raw = match record.get(FILE_SIZE) {
            Some(raw) if !raw.trim().is_empty() => raw.to_string(),
            _ => return Ok(false),
        };
        let display = self.format_file_size(&raw, record.pid_or_unknown())?;
        record.set(FILE_SIZE, display);
        Ok(false)
    }

    /// Returns true when the record describes a collection.
    fn apply_collection_rule(&self, record: &mut Record, row: usize) -> Result<bool> {
        let parent = record.require(PARENT_PID, row)?;
        if !parent.contains(constants::COLLECTION_MARKER) {
            return Ok(false);
        }

        let pid = record.require(PID, row)?.to_string();
        record.set(
            constants::MODS_PATH,
            self.datastream_url(&pid, constants::MODS_STREAM),
        );
        record.set(
            constants::RDF_PATH,
            self.datastream_url(&pid, constants::RELS_EXT_STREAM),
        );
        record.set(constants::INSTITUTION, constants::institution_of(&pid));
        record.set(
            constants::COLLECTION_NAME,
            format!("{}:collection", constants::dataset_prefix(&pid)),
        );
        debug!(pid = %pid, "Derived collection metadata");
        Ok(true)
    }
}

impl Default for DefaultClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for DefaultClassifier {
    #[instrument(skip_all, fields(rows = table.len()))]
    fn classify(&self, table: &mut RecordTable) -> Result<ClassificationSummary> {
        let mut summary = ClassificationSummary::default();

        for (row, record) in table.records_mut().iter_mut().enumerate() {
            if self.apply_content_model_rule(record, row)? {
                summary.blanked += 1;
            } else if record.get(FILE_SIZE).is_some_and(|s| !s.is_empty()) {
                summary.rescaled += 1;
            }
            if self.apply_collection_rule(record, row)? {
                summary.collections += 1;
            }
        }

        counter!("pid_reconciler_rows_blanked_total").increment(summary.blanked as u64);
        counter!("pid_reconciler_collection_rows_total").increment(summary.collections as u64);
        info!(
            "Classified {} rows ({} blanked, {} rescaled, {} collections)",
            table.len(),
            summary.blanked,
            summary.rescaled,
            summary.collections
        );
        Ok(summary)
    }
}
