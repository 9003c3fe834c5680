pub mod orchestrator;
pub mod processor;
pub mod reader;
pub mod rules;

pub use crate::domain::model::{Batch, BatchResult, Record, RunSummary, ValidationOutcome};
pub use crate::domain::ports::{ProgressReporter, RecordSink};
pub use crate::utils::error::Result;
