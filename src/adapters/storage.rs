use crate::config::RunConfig;
use crate::domain::model::Record;
use crate::domain::ports::RecordSink;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Database, Encode, Postgres, QueryBuilder, Sqlite, Type};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

// SQLite's default SQLITE_MAX_VARIABLE_NUMBER, the lower of the two backends.
const BIND_LIMIT: usize = 32766;
const COLUMNS: [&str; 4] = ["id", "name", "value", "processed"];
const ROWS_PER_STATEMENT: usize = BIND_LIMIT / COLUMNS.len();

#[derive(Debug, Clone)]
pub enum DatabasePool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

/// The stored shape of a transformed record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRow {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub processed: bool,
}

impl TryFrom<&Record> for UpsertRow {
    type Error = EtlError;

    fn try_from(record: &Record) -> Result<Self> {
        let id = text_field(record, "id")?;
        let name = text_field(record, "name")?;
        let value = record
            .get("value")
            .and_then(Value::as_f64)
            .ok_or_else(|| EtlError::ProcessingError {
                message: format!("record {} has no numeric 'value'", id),
            })?;
        let processed = record
            .get("processed")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            id,
            name,
            value,
            processed,
        })
    }
}

fn text_field(record: &Record, field: &str) -> Result<String> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(EtlError::ProcessingError {
            message: format!("record has no '{}' field", field),
        }),
    }
}

/// Repeated ids inside one batch keep their first position and their last values.
fn last_wins(rows: Vec<UpsertRow>) -> Vec<UpsertRow> {
    let mut position: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut unique: Vec<UpsertRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match position.get(&row.id) {
            Some(&i) => unique[i] = row,
            None => {
                position.insert(row.id.clone(), unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

fn upsert_query<'a, DB>(table: &str, rows: &'a [UpsertRow]) -> QueryBuilder<'a, DB>
where
    DB: Database,
    <DB as Database>::Arguments<'a>: Default,
    &'a str: Encode<'a, DB> + Type<DB>,
    f64: Encode<'a, DB> + Type<DB>,
    bool: Encode<'a, DB> + Type<DB>,
{
    let mut query = QueryBuilder::new("INSERT INTO ");
    query.push(table);
    query.push(" (");
    query.push(COLUMNS.join(", "));
    query.push(") ");
    query.push_values(rows, |mut b, row| {
        b.push_bind(row.id.as_str())
            .push_bind(row.name.as_str())
            .push_bind(row.value)
            .push_bind(row.processed);
    });
    query.push(
        " ON CONFLICT (id) DO UPDATE SET \
         name = excluded.name, value = excluded.value, processed = excluded.processed",
    );
    query
}

/// Upserts batches into a SQLite or PostgreSQL table, one transaction per batch.
pub struct SqlSink {
    pool: DatabasePool,
    table: String,
    timeout: Duration,
}

impl SqlSink {
    /// Builds the pool without connecting; connection problems show up on
    /// the first query.
    pub fn connect_lazy(config: &RunConfig) -> Result<Self> {
        let url = config.database_url.as_str();
        let max_connections = config.max_workers.max(1) as u32;

        let pool = if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
            let in_memory = url.contains(":memory:") || url.contains("mode=memory");
            let pool = if in_memory {
                // every connection would see its own empty database
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .acquire_timeout(config.storage_timeout)
                    .connect_lazy_with(options)
            } else {
                SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(config.storage_timeout)
                    .connect_lazy_with(options.journal_mode(SqliteJournalMode::Wal))
            };
            DatabasePool::Sqlite(pool)
        } else {
            DatabasePool::Postgres(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(config.storage_timeout)
                    .connect_lazy(url)?,
            )
        };

        tracing::debug!(
            "SQL sink ready (table={}, max_connections={})",
            config.table,
            max_connections
        );
        Ok(Self {
            pool,
            table: config.table.clone(),
            timeout: config.storage_timeout,
        })
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id TEXT PRIMARY KEY, \
             name TEXT NOT NULL, \
             value DOUBLE PRECISION NOT NULL, \
             processed BOOLEAN NOT NULL)",
            self.table
        );
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query(&ddl).execute(pool).await?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query(&ddl).execute(pool).await?;
            }
        }
        tracing::info!("✅ Table '{}' is ready", self.table);
        Ok(())
    }

    pub async fn close(&self) {
        match &self.pool {
            DatabasePool::Sqlite(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
        }
        tracing::debug!("SQL sink closed");
    }

    async fn write(&self, rows: &[UpsertRow]) -> Result<()> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                for chunk in rows.chunks(ROWS_PER_STATEMENT) {
                    let mut query = upsert_query::<Sqlite>(&self.table, chunk);
                    query.build().execute(&mut *tx).await?;
                }
                tx.commit().await?;
            }
            DatabasePool::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                for chunk in rows.chunks(ROWS_PER_STATEMENT) {
                    let mut query = upsert_query::<Postgres>(&self.table, chunk);
                    query.build().execute(&mut *tx).await?;
                }
                tx.commit().await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSink for SqlSink {
    async fn upsert_batch(&self, records: &[Record]) -> Result<usize> {
        let rows = records
            .iter()
            .map(UpsertRow::try_from)
            .collect::<Result<Vec<_>>>()?;
        let rows = last_wins(rows);

        // A timed-out transaction is dropped, which rolls it back.
        match tokio::time::timeout(self.timeout, self.write(&rows)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EtlError::StorageTimeout {
                    seconds: self.timeout.as_secs(),
                })
            }
        }

        tracing::debug!("Upserted {} rows into {}", rows.len(), self.table);
        Ok(records.len())
    }
}

/// Accepts every batch and stores nothing. Used for dry runs.
#[derive(Debug, Default)]
pub struct DiscardSink;

#[async_trait]
impl RecordSink for DiscardSink {
    async fn upsert_batch(&self, records: &[Record]) -> Result<usize> {
        tracing::debug!("Dry run: discarding {} records", records.len());
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    fn row_record(id: i64, name: &str, value: f64) -> Record {
        Record::new()
            .with("id", id)
            .with("name", name)
            .with("value", value)
            .with("processed", true)
    }

    async fn memory_sink() -> SqlSink {
        let config = RunConfig {
            database_url: "sqlite::memory:".to_string(),
            ..RunConfig::default()
        };
        let sink = SqlSink::connect_lazy(&config).unwrap();
        sink.ensure_schema().await.unwrap();
        sink
    }

    async fn stored(sink: &SqlSink) -> Vec<(String, String, f64, bool)> {
        let DatabasePool::Sqlite(pool) = sink.pool() else {
            panic!("expected sqlite pool");
        };
        sqlx::query("SELECT id, name, value, processed FROM processed_data ORDER BY id")
            .fetch_all(pool)
            .await
            .unwrap()
            .iter()
            .map(|r| (r.get("id"), r.get("name"), r.get("value"), r.get("processed")))
            .collect()
    }

    #[test]
    fn test_row_from_record() {
        let row = UpsertRow::try_from(&row_record(7, "Bob", 3.14)).unwrap();
        assert_eq!(
            row,
            UpsertRow {
                id: "7".to_string(),
                name: "Bob".to_string(),
                value: 3.14,
                processed: true,
            }
        );
        assert!(UpsertRow::try_from(&Record::new().with("name", "x")).is_err());
    }

    #[test]
    fn test_last_wins_keeps_first_position() {
        let rows = vec![
            UpsertRow::try_from(&row_record(1, "a", 1.0)).unwrap(),
            UpsertRow::try_from(&row_record(2, "b", 2.0)).unwrap(),
            UpsertRow::try_from(&row_record(1, "c", 3.0)).unwrap(),
        ];
        let unique = last_wins(rows);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "c");
        assert_eq!(unique[1].name, "b");
    }

    #[test]
    fn test_text_ids_are_not_normalized() {
        let record = |id: &str| {
            Record::new()
                .with("id", id)
                .with("name", "x")
                .with("value", 1.0)
        };
        let rows = vec![
            UpsertRow::try_from(&record("0012")).unwrap(),
            UpsertRow::try_from(&record("12")).unwrap(),
        ];
        let unique = last_wins(rows);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].id, "0012");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let sink = memory_sink().await;

        sink.upsert_batch(&[row_record(1, "Alice", 1.0), row_record(2, "Bob", 2.0)])
            .await
            .unwrap();
        let written = sink
            .upsert_batch(&[row_record(2, "Robert", 2.5), row_record(2, "Rob", 9.0)])
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            stored(&sink).await,
            vec![
                ("1".to_string(), "Alice".to_string(), 1.0, true),
                ("2".to_string(), "Rob".to_string(), 9.0, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_table_is_a_storage_error() {
        let config = RunConfig {
            database_url: "sqlite::memory:".to_string(),
            table: "not_created".to_string(),
            ..RunConfig::default()
        };
        let sink = SqlSink::connect_lazy(&config).unwrap();

        let err = sink
            .upsert_batch(&[row_record(1, "a", 1.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_discard_sink_accepts_everything() {
        let count = DiscardSink
            .upsert_batch(&[row_record(1, "a", 1.0)])
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
