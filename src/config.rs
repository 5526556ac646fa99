use crate::constants;
use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// How the columns of a datastream extract are matched to overlay attributes.
///
/// The default, `Named`, expects the export's header to use the attribute
/// names verbatim. Legacy inventory exports often carry different header text
/// and were only ever mapped by column position; `Named` rejects those with a
/// schema error, so set `lookup_header_mode = "positional"` for them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Header must name `PID` and every overlay attribute, in any order.
    /// Any other header text fails the run with a schema error.
    #[default]
    Named,
    /// Header text is ignored; columns are taken in export order: `PID`,
    /// then `filetype, file_size, institution, Collection_name, file_path,
    /// mods_path, rdf_path`.
    Positional,
}

/// One datastream extract joined against the master table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatastreamSource {
    pub name: String,
    pub path: PathBuf,
}

impl DatastreamSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub master_path: PathBuf,
    pub output_dir: PathBuf,
    /// Join order matters: it decides which duplicate survives deduplication.
    pub datastream_sources: Vec<DatastreamSource>,
    pub lookup_header_mode: HeaderMode,
    pub content_model_allowlist: Vec<String>,
    pub file_size_divisor: f64,
    pub file_size_unit_label: String,
    pub collection_url_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master_path: PathBuf::from(constants::MASTER_FILE),
            output_dir: PathBuf::from("."),
            datastream_sources: vec![
                DatastreamSource::new(constants::PDF_SOURCE, constants::PDF_DATASTREAM_FILE),
                DatastreamSource::new(constants::OBJ_SOURCE, constants::OBJ_DATASTREAM_FILE),
                DatastreamSource::new(constants::MODS_SOURCE, constants::MODS_DATASTREAM_FILE),
            ],
            lookup_header_mode: HeaderMode::Named,
            content_model_allowlist: constants::default_content_models(),
            file_size_divisor: 1000.0,
            file_size_unit_label: "Kb".to_string(),
            collection_url_base: "https://islandora.example.org".to_string(),
        }
    }
}

impl Config {
    /// Load and validate a TOML config file. Relative data paths are resolved
    /// against the config file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config: Config = toml::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.master_path);
        resolve(&mut self.output_dir);
        for source in &mut self.datastream_sources {
            resolve(&mut source.path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.file_size_divisor.is_finite() || self.file_size_divisor <= 0.0 {
            return Err(ReconcileError::Config(format!(
                "file_size_divisor must be a positive number, got {}",
                self.file_size_divisor
            )));
        }

        let mut names = HashSet::new();
        for source in &self.datastream_sources {
            if source.name.trim().is_empty() {
                return Err(ReconcileError::Config(
                    "datastream source names must not be empty".to_string(),
                ));
            }
            if !names.insert(source.name.as_str()) {
                return Err(ReconcileError::Config(format!(
                    "duplicate datastream source '{}'",
                    source.name
                )));
            }
        }

        if self.collection_url_base.trim().is_empty() {
            return Err(ReconcileError::Config(
                "collection_url_base must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
