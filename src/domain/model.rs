use crate::utils::error::EtlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One input row: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(field.to_string(), value.into());
        self
    }

    /// Null values are treated as missing.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.data.get(field).filter(|v| !v.is_null())
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

/// An ordered slice of the input. `offset` is the position of the first
/// record among all data rows of the source.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub index: usize,
    pub offset: usize,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub batch_index: usize,
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BatchResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.processed + self.failed
    }

    /// Result for a batch whose worker never produced one: every record fails.
    pub fn worker_failure(batch_index: usize, record_count: usize, error: &EtlError) -> Self {
        Self {
            batch_index,
            processed: 0,
            failed: record_count,
            errors: vec![error.to_string()],
        }
    }
}

/// Run-level accumulator. Only the orchestrating task mutates it.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub batches_total: usize,
    pub batches_completed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(batches_total: usize) -> Self {
        Self {
            processed: 0,
            failed: 0,
            errors: Vec::new(),
            batches_total,
            batches_completed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn merge(&mut self, result: BatchResult) {
        self.processed += result.processed;
        self.failed += result.failed;
        self.errors.extend(result.errors);
        self.batches_completed += 1;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn total_records(&self) -> usize {
        self.processed + self.failed
    }

    pub fn duration(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    /// First `limit` error messages plus how many were left out.
    pub fn error_sample(&self, limit: usize) -> (&[String], usize) {
        let shown = self.errors.len().min(limit);
        (&self.errors[..shown], self.errors.len() - shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_fields_count_as_missing() {
        let record = Record::new()
            .with("id", 1)
            .with("name", serde_json::Value::Null);
        assert!(record.has("id"));
        assert!(!record.has("name"));
        assert!(!record.has("value"));
    }

    #[test]
    fn test_summary_merge_is_additive() {
        let mut summary = RunSummary::new(2);
        summary.merge(BatchResult {
            batch_index: 1,
            processed: 3,
            failed: 1,
            errors: vec!["Validation failed for record 4".to_string()],
        });
        let error = EtlError::WorkerFailure {
            batch: 0,
            message: "boom".to_string(),
        };
        summary.merge(BatchResult::worker_failure(0, 5, &error));

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failed, 6);
        assert_eq!(summary.total_records(), 9);
        assert_eq!(summary.batches_completed, 2);
        assert!(!summary.success());
        assert_eq!(summary.errors[1], "Batch 0 error: boom");
    }

    #[test]
    fn test_error_sample() {
        let mut summary = RunSummary::new(1);
        summary.errors = (0..15).map(|i| format!("e{}", i)).collect();

        let (shown, omitted) = summary.error_sample(10);
        assert_eq!(shown.len(), 10);
        assert_eq!(omitted, 5);

        let (shown, omitted) = summary.error_sample(100);
        assert_eq!(shown.len(), 15);
        assert_eq!(omitted, 0);
    }
}
