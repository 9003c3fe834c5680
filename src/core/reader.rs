use crate::domain::model::{Batch, Record};
use crate::utils::error::{EtlError, Result};
use csv::{ReaderBuilder, StringRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Lazily splits a headered CSV source into batches of at most `batch_size`
/// records. Finite and not restartable; after the first error it yields nothing.
pub struct BatchReader<R: Read> {
    reader: csv::Reader<R>,
    headers: StringRecord,
    batch_size: usize,
    next_index: usize,
    next_offset: usize,
    finished: bool,
}

impl BatchReader<File> {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        if !path.exists() {
            return Err(EtlError::SourceNotFound {
                path: path.display().to_string(),
            });
        }

        tracing::info!("📁 Reading CSV file: {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(file, batch_size)
    }
}

impl<R: Read> BatchReader<R> {
    pub fn from_reader(source: R, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(EtlError::ConfigError {
                message: "batch_size must be positive".to_string(),
            });
        }

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(source);
        let headers = reader.headers()?.clone();

        Ok(Self {
            reader,
            headers,
            batch_size,
            next_index: 0,
            next_offset: 0,
            finished: false,
        })
    }

    fn to_record(&self, row: &StringRecord) -> Record {
        let data: HashMap<String, Value> = self
            .headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| (name.to_string(), cell_value(cell)))
            .collect();
        Record { data }
    }

    fn read_batch(&mut self) -> Result<Option<Batch>> {
        let mut records = Vec::with_capacity(self.batch_size);
        let mut row = StringRecord::new();

        while records.len() < self.batch_size {
            if !self.reader.read_record(&mut row)? {
                break;
            }
            records.push(self.to_record(&row));
        }

        if records.is_empty() {
            return Ok(None);
        }

        let batch = Batch {
            index: self.next_index,
            offset: self.next_offset,
            records,
        };
        self.next_index += 1;
        self.next_offset += batch.len();

        tracing::debug!(
            "Read batch {} ({} records, offset {})",
            batch.index,
            batch.len(),
            batch.offset
        );
        Ok(Some(batch))
    }
}

impl<R: Read> Iterator for BatchReader<R> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Cells stay text; typing is left to the record rules. Empty cells become null.
fn cell_value(cell: &str) -> Value {
    if cell.trim().is_empty() {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_with_rows(rows: usize) -> String {
        let mut data = String::from("id,name,value\n");
        for i in 0..rows {
            data.push_str(&format!("{},name{},{}.5\n", i, i, i));
        }
        data
    }

    #[test]
    fn test_exact_batch_size_gives_one_batch() {
        let data = csv_with_rows(4);
        let batches: Vec<Batch> = BatchReader::from_reader(data.as_bytes(), 4)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 4);
    }

    #[test]
    fn test_one_over_batch_size_gives_trailing_single_batch() {
        let data = csv_with_rows(5);
        let batches: Vec<Batch> = BatchReader::from_reader(data.as_bytes(), 4)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1].index, 1);
        assert_eq!(batches[1].offset, 4);
    }

    #[test]
    fn test_header_only_input_has_no_batches() {
        let mut reader = BatchReader::from_reader("id,name,value\n".as_bytes(), 10).unwrap();
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_cells_are_kept_as_text() {
        let data = "id,name,value,flag,note\n0012, 007 ,1.50,TRUE,\n";
        let batch = BatchReader::from_reader(data.as_bytes(), 10)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        let record = &batch.records[0];

        assert_eq!(record.get("id"), Some(&Value::from("0012")));
        assert_eq!(record.get("name"), Some(&Value::from(" 007 ")));
        assert_eq!(record.get("value"), Some(&Value::from("1.50")));
        assert_eq!(record.get("flag"), Some(&Value::from("TRUE")));
        assert!(!record.has("note"));
    }

    #[test]
    fn test_inconsistent_columns_are_malformed_and_stop_iteration() {
        let data = "id,name,value\n1,a,1\n2,b\n3,c,3\n";
        let mut reader = BatchReader::from_reader(data.as_bytes(), 10).unwrap();

        assert!(matches!(
            reader.next(),
            Some(Err(EtlError::MalformedInput { .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_missing_file_is_source_not_found() {
        let result = BatchReader::open(Path::new("/definitely/not/here.csv"), 10);
        assert!(matches!(result, Err(EtlError::SourceNotFound { .. })));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let result = BatchReader::from_reader("id\n1\n".as_bytes(), 0);
        assert!(matches!(result, Err(EtlError::ConfigError { .. })));
    }
}
