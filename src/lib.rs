pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use config::{Config, DatastreamSource, HeaderMode};
pub use error::{ReconcileError, Result};
pub use pipeline::{Phase, Pipeline, PipelineResult, Reconciled};
pub use types::{Origin, Record, RecordTable};
