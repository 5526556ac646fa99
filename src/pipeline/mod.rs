// Reconciliation pipeline: expand → classify → deduplicate, plus the
// file-facing phases that wrap it.

pub mod processing;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument};

use crate::config::Config;
use crate::constants;
use crate::error::{ReconcileError, Result};
use crate::storage::{self, TableSink};
use crate::types::RecordTable;
use processing::{
    Classifier, ClassifierConfig, ClassificationSummary, DefaultClassifier, Deduplicator,
    Expander, FirstSeenDeduplicator,
};

/// Which part of the run produced a result
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Expansion only; writes the pre-processed table
    Merge,
    /// Classification and deduplication of a pre-processed table
    PostProcess,
    /// Both phases in one process
    Full,
}

/// In-memory outcome of the pipeline stages
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub table: RecordTable,
    pub expanded_rows: usize,
    pub classification: ClassificationSummary,
    pub dropped_duplicates: usize,
}

/// Result of a pipeline phase
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub phase: Phase,
    pub dataset: String,
    pub input_rows: usize,
    pub expanded_rows: usize,
    pub blanked_rows: usize,
    pub rescaled_rows: usize,
    pub collection_rows: usize,
    pub dropped_duplicates: usize,
    pub output_rows: usize,
    pub output_file: String,
    pub output_sha256: String,
    pub finished_at: DateTime<Utc>,
}

impl PipelineResult {
    /// Write the result as pretty JSON
    pub fn write_report(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub struct Pipeline {
    config: Config,
    classifier: Box<dyn Classifier>,
    deduplicator: Box<dyn Deduplicator>,
}

impl Pipeline {
    /// Create a pipeline with the default classifier and deduplicator
    pub fn new(config: Config) -> Result<Self> {
        let classifier = DefaultClassifier::with_config(ClassifierConfig::from(&config));
        Self::with_stages(config, Box::new(classifier), Box::new(FirstSeenDeduplicator))
    }

    pub fn with_stages(
        config: Config,
        classifier: Box<dyn Classifier>,
        deduplicator: Box<dyn Deduplicator>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            classifier,
            deduplicator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Dataset name used for output files: the namespace of the first PID.
    pub fn dataset_name(master: &RecordTable) -> Result<String> {
        let first = master.records().first().ok_or_else(|| {
            ReconcileError::Config("master table is empty; cannot name output files".to_string())
        })?;
        let pid = first.require(constants::PID, 0)?;
        Ok(constants::dataset_prefix(pid).to_string())
    }

    /// Load every configured datastream extract, in configured order. Runs
    /// before anything is written so a malformed extract aborts the run early.
    #[instrument(skip(self))]
    pub fn load_expander(&self) -> Result<Expander> {
        let indexes = self
            .config
            .datastream_sources
            .iter()
            .map(|source| storage::read_lookup_source(source, self.config.lookup_header_mode))
            .collect::<Result<Vec<_>>>()?;
        Ok(Expander::new(indexes))
    }

    /// Expand the master table and materialize the result as a rectangular
    /// table, the shape the pre-processed file is written in.
    pub fn merge_table(&self, master: RecordTable, expander: &Expander) -> Result<RecordTable> {
        let mut expanded = expander.expand(master)?;
        expanded.fill_missing_columns();
        Ok(expanded)
    }

    /// Classify then deduplicate a pre-processed table.
    pub fn post_process_table(&self, mut table: RecordTable) -> Result<Reconciled> {
        let expanded_rows = table.len();
        let classification = self.classifier.classify(&mut table)?;
        let deduplicated = self.deduplicator.deduplicate(table)?;
        Ok(Reconciled {
            table: deduplicated.table,
            expanded_rows,
            classification,
            dropped_duplicates: deduplicated.dropped,
        })
    }

    /// All three stages in memory.
    pub fn reconcile(&self, master: RecordTable, expander: &Expander) -> Result<Reconciled> {
        let expanded = self.merge_table(master, expander)?;
        self.post_process_table(expanded)
    }

    /// Expand the configured master table and write the pre-processed table.
    #[instrument(skip_all, fields(phase = "merge"))]
    pub fn run_merge(&self, sink: &mut dyn TableSink) -> Result<PipelineResult> {
        let started = Instant::now();
        info!("🚀 Starting merge phase");

        let expander = self.load_expander()?;
        let master = storage::read_table(&self.config.master_path)?;
        let dataset = Self::dataset_name(&master)?;
        let input_rows = master.len();

        let expanded = self.merge_table(master, &expander)?;
        let receipt = sink.write_table(&pre_processed_name(&dataset), &expanded)?;

        Ok(self.finish(started, PipelineResult {
            phase: Phase::Merge,
            dataset,
            input_rows,
            expanded_rows: expanded.len(),
            blanked_rows: 0,
            rescaled_rows: 0,
            collection_rows: 0,
            dropped_duplicates: 0,
            output_rows: receipt.rows,
            output_file: receipt.location,
            output_sha256: receipt.sha256,
            finished_at: Utc::now(),
        }))
    }

    /// Read the pre-processed table from the output directory, classify and
    /// deduplicate it, and write the processed table.
    #[instrument(skip_all, fields(phase = "post_process"))]
    pub fn run_post_process(&self, sink: &mut dyn TableSink) -> Result<PipelineResult> {
        let started = Instant::now();
        info!("🚀 Starting post-process phase");

        let master = storage::read_table(&self.config.master_path)?;
        let dataset = Self::dataset_name(&master)?;
        let input_path = self.config.output_dir.join(pre_processed_name(&dataset));
        let pre_processed = storage::read_table(&input_path)?;
        let input_rows = pre_processed.len();

        let reconciled = self.post_process_table(pre_processed)?;
        let receipt = sink.write_table(&processed_name(&dataset), &reconciled.table)?;

        Ok(self.finish(started, PipelineResult {
            phase: Phase::PostProcess,
            dataset,
            input_rows,
            expanded_rows: reconciled.expanded_rows,
            blanked_rows: reconciled.classification.blanked,
            rescaled_rows: reconciled.classification.rescaled,
            collection_rows: reconciled.classification.collections,
            dropped_duplicates: reconciled.dropped_duplicates,
            output_rows: receipt.rows,
            output_file: receipt.location,
            output_sha256: receipt.sha256,
            finished_at: Utc::now(),
        }))
    }

    /// Run both phases, writing the pre-processed table along the way.
    #[instrument(skip_all, fields(phase = "full"))]
    pub fn run(&self, sink: &mut dyn TableSink) -> Result<PipelineResult> {
        let started = Instant::now();
        info!("🚀 Starting full reconciliation run");

        let expander = self.load_expander()?;
        let master = storage::read_table(&self.config.master_path)?;
        let dataset = Self::dataset_name(&master)?;
        let input_rows = master.len();

        let expanded = self.merge_table(master, &expander)?;
        sink.write_table(&pre_processed_name(&dataset), &expanded)?;

        let reconciled = self.post_process_table(expanded)?;
        let receipt = sink.write_table(&processed_name(&dataset), &reconciled.table)?;

        Ok(self.finish(started, PipelineResult {
            phase: Phase::Full,
            dataset,
            input_rows,
            expanded_rows: reconciled.expanded_rows,
            blanked_rows: reconciled.classification.blanked,
            rescaled_rows: reconciled.classification.rescaled,
            collection_rows: reconciled.classification.collections,
            dropped_duplicates: reconciled.dropped_duplicates,
            output_rows: receipt.rows,
            output_file: receipt.location,
            output_sha256: receipt.sha256,
            finished_at: Utc::now(),
        }))
    }

    fn finish(&self, started: Instant, result: PipelineResult) -> PipelineResult {
        let phase_label = match result.phase {
            Phase::Merge => "merge",
            Phase::PostProcess => "post_process",
            Phase::Full => "full",
        };
        counter!("pid_reconciler_runs_total", "phase" => phase_label).increment(1);
        histogram!("pid_reconciler_phase_duration_seconds", "phase" => phase_label)
            .record(started.elapsed().as_secs_f64());
        info!(
            "✅ {} phase finished: {} rows in, {} rows out ({})",
            phase_label, result.input_rows, result.output_rows, result.output_file
        );
        result
    }
}

pub fn pre_processed_name(dataset: &str) -> String {
    format!(
        "{}{}",
        constants::PRE_PROCESSED_PREFIX,
        constants::output_file_name(dataset)
    )
}

pub fn processed_name(dataset: &str) -> String {
    format!(
        "{}{}",
        constants::PROCESSED_PREFIX,
        constants::output_file_name(dataset)
    )
}
