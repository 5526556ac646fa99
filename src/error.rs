use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Schema error in '{source_name}': {message}")]
    Schema { source_name: String, message: String },

    #[error("Missing required field '{field}' on row {row} (PID: {pid})")]
    MissingField {
        field: String,
        pid: String,
        row: usize,
    },

    #[error("Malformed value '{value}' for field '{field}' (PID: {pid})")]
    DataFormat {
        field: String,
        value: String,
        pid: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconcileError {
    pub fn schema(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
