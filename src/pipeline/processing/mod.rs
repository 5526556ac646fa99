// Pipeline processing: lookup indexes, expansion, classification, deduplication

pub mod classify;
pub mod dedup;
pub mod expand;
pub mod lookup;

pub use classify::{Classifier, ClassifierConfig, ClassificationSummary, DefaultClassifier};
pub use dedup::{Deduplicated, Deduplicator, FirstSeenDeduplicator};
pub use expand::Expander;
pub use lookup::{LookupIndex, Overlay};
