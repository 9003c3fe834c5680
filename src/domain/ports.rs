use crate::domain::model::{Record, RunSummary};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Persistent keyed store for transformed records.
///
/// `upsert_batch` writes the whole slice as one unit: insert-or-update keyed
/// by the record's `id`. On error, callers must not assume nothing was written
/// unless the backing store enforces batch atomicity.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn upsert_batch(&self, records: &[Record]) -> Result<usize>;
}

/// Observer for run progress. Advisory only.
pub trait ProgressReporter: Send + Sync {
    fn on_start(&self, _batches_total: usize) {}

    /// Called once per finished batch; `completed` increases by one each call.
    fn on_batch_complete(&self, completed: usize, total: usize);

    fn on_finish(&self, _summary: &RunSummary) {}
}
