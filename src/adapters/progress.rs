use crate::domain::model::RunSummary;
use crate::domain::ports::ProgressReporter;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reports progress through tracing: every batch at debug level, every
/// tenth of the run (and the last batch) at info level.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_decile: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for LogProgress {
    fn on_start(&self, batches_total: usize) {
        self.last_decile.store(0, Ordering::Relaxed);
        tracing::info!("Processing batches: 0/{}", batches_total);
    }

    fn on_batch_complete(&self, completed: usize, total: usize) {
        let decile = if total == 0 { 10 } else { completed * 10 / total };
        let previous = self.last_decile.fetch_max(decile, Ordering::Relaxed);

        if decile > previous || completed == total {
            tracing::info!(
                "Processing batches: {}/{} ({}%)",
                completed,
                total,
                completed * 100 / total.max(1)
            );
        } else {
            tracing::debug!("Processing batches: {}/{}", completed, total);
        }
    }

    fn on_finish(&self, summary: &RunSummary) {
        tracing::debug!(
            "Finished {} batches in {:?}",
            summary.batches_completed,
            summary.duration()
        );
    }
}
