pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{DiscardSink, LogProgress, SqlSink};
pub use config::{DispatchMode, RunConfig};
pub use core::{orchestrator::Orchestrator, reader::BatchReader};
pub use domain::model::{Batch, BatchResult, Record, RunSummary};
pub use domain::ports::{ProgressReporter, RecordSink};
pub use utils::error::{EtlError, Result};
