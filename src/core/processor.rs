use crate::core::rules;
use crate::domain::model::{Batch, BatchResult, Record};
use crate::domain::ports::RecordSink;
use std::sync::Arc;

/// Validates, transforms and stores one batch at a time.
pub struct BatchProcessor {
    sink: Arc<dyn RecordSink>,
}

impl BatchProcessor {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }

    pub async fn process(&self, batch: Batch) -> BatchResult {
        let mut errors = Vec::new();
        let mut invalid = 0usize;
        let mut valid_records: Vec<Record> = Vec::with_capacity(batch.len());

        for (i, record) in batch.records.iter().enumerate() {
            let outcome = rules::check(record);
            if !outcome.valid {
                invalid += 1;
                errors.push(format!(
                    "Validation failed for record {}: {}",
                    batch.offset + i,
                    outcome.reason.unwrap_or_default()
                ));
                continue;
            }
            valid_records.push(rules::transform(record));
        }

        let valid = valid_records.len();
        let mut stored = 0usize;

        if !valid_records.is_empty() {
            match self.sink.upsert_batch(&valid_records).await {
                Ok(_) => stored = valid,
                Err(e) => {
                    tracing::error!("❌ Batch {} storage failed: {}", batch.index, e);
                    errors.push(format!("Database storage failed: {}", e));
                }
            }
        }

        // Valid records that were not stored are reclassified as failed.
        let result = BatchResult {
            batch_index: batch.index,
            processed: stored,
            failed: invalid + (valid - stored),
            errors,
        };

        tracing::debug!(
            "Batch {} done: {} processed, {} failed",
            result.batch_index,
            result.processed,
            result.failed
        );
        result
    }
}
