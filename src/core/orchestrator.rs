use crate::config::{DispatchMode, RunConfig};
use crate::core::processor::BatchProcessor;
use crate::core::reader::BatchReader;
use crate::domain::model::{Batch, BatchResult, RunSummary};
use crate::domain::ports::{ProgressReporter, RecordSink};
use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::task::{Id, JoinError, JoinSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initialized,
    Reading,
    Dispatching,
    Aggregating,
    Completed,
}

/// Drives batches through the processor and folds the results into a
/// [`RunSummary`]. Only setup errors (bad config, unreadable source) are
/// returned as `Err`; batch-level failures end up in the summary.
pub struct Orchestrator {
    processor: Arc<BatchProcessor>,
    progress: Arc<dyn ProgressReporter>,
    batch_size: usize,
    max_workers: usize,
    mode: DispatchMode,
    state: RunState,
}

impl Orchestrator {
    pub fn new(
        sink: Arc<dyn RecordSink>,
        progress: Arc<dyn ProgressReporter>,
        config: &RunConfig,
    ) -> Self {
        tracing::info!(
            "Orchestrator initialized (batch_size={}, workers={}, mode={})",
            config.batch_size,
            config.max_workers,
            config.mode
        );
        Self {
            processor: Arc::new(BatchProcessor::new(sink)),
            progress,
            batch_size: config.batch_size,
            max_workers: config.max_workers.max(1),
            mode: config.mode,
            state: RunState::Initialized,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self, input: &Path) -> Result<RunSummary> {
        let reader = BatchReader::open(input, self.batch_size)?;
        self.run_reader(reader).await
    }

    pub async fn run_reader<R: Read>(&mut self, reader: BatchReader<R>) -> Result<RunSummary> {
        self.transition(RunState::Reading);
        // Drained up front so progress has a known total.
        let batches = reader.collect::<Result<Vec<Batch>>>()?;
        Ok(self.run_batches(batches).await)
    }

    pub async fn run_batches(&mut self, batches: Vec<Batch>) -> RunSummary {
        let total = batches.len();
        let records: usize = batches.iter().map(Batch::len).sum();
        tracing::info!(
            "🚀 Processing {} records in {} batches ({})",
            records,
            total,
            self.mode
        );

        let mut summary = RunSummary::new(total);
        self.progress.on_start(total);
        self.transition(RunState::Dispatching);

        match self.mode {
            DispatchMode::Sequential => self.dispatch_sequential(batches, &mut summary).await,
            DispatchMode::Parallel => self.dispatch_parallel(batches, &mut summary).await,
        }

        if self.state == RunState::Dispatching {
            // nothing was dispatched
            self.transition(RunState::Aggregating);
        }
        summary.finish();
        tracing::info!(
            "Processing complete: {} processed, {} failed",
            summary.processed,
            summary.failed
        );
        self.progress.on_finish(&summary);
        self.transition(RunState::Completed);
        summary
    }

    async fn dispatch_sequential(&mut self, batches: Vec<Batch>, summary: &mut RunSummary) {
        for batch in batches {
            let (index, len) = (batch.index, batch.len());
            let processor = Arc::clone(&self.processor);
            let result = match tokio::spawn(async move { processor.process(batch).await }).await {
                Ok(result) => result,
                Err(e) => worker_failure(index, len, e),
            };
            self.merge(summary, result);
        }
    }

    async fn dispatch_parallel(&mut self, batches: Vec<Batch>, summary: &mut RunSummary) {
        let mut workers: JoinSet<BatchResult> = JoinSet::new();
        let mut in_flight: HashMap<Id, (usize, usize)> = HashMap::new();
        let mut pending = batches.into_iter();

        loop {
            while workers.len() < self.max_workers {
                let Some(batch) = pending.next() else { break };
                let meta = (batch.index, batch.len());
                let processor = Arc::clone(&self.processor);
                let handle = workers.spawn(async move { processor.process(batch).await });
                in_flight.insert(handle.id(), meta);
            }

            // Completion order, not submission order.
            let result = match workers.join_next_with_id().await {
                Some(Ok((id, result))) => {
                    in_flight.remove(&id);
                    result
                }
                Some(Err(e)) => {
                    let (index, len) = in_flight.remove(&e.id()).unwrap_or_default();
                    worker_failure(index, len, e)
                }
                None => break,
            };
            self.merge(summary, result);
        }
    }

    /// Folds one batch result in. The first merge moves the run to `Aggregating`;
    /// later batches may still be in flight.
    fn merge(&mut self, summary: &mut RunSummary, result: BatchResult) {
        if self.state == RunState::Dispatching {
            self.transition(RunState::Aggregating);
        }
        if !result.success() {
            tracing::warn!(
                "⚠️ Batch {} finished with {} failed records",
                result.batch_index,
                result.failed
            );
        }
        summary.merge(result);
        self.progress
            .on_batch_complete(summary.batches_completed, summary.batches_total);
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn worker_failure(index: usize, len: usize, err: JoinError) -> BatchResult {
    let error = EtlError::WorkerFailure {
        batch: index,
        message: if err.is_panic() {
            "worker panicked".to_string()
        } else {
            err.to_string()
        },
    };
    tracing::error!("❌ {}", error);
    BatchResult::worker_failure(index, len, &error)
}
