#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::validation::{
    validate_database_url, validate_identifier, validate_positive_number, Validate,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use toml_config::FileConfig;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_TABLE: &str = "processed_data";
pub const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ERROR_LINES: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Sequential,
    #[default]
    Parallel,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Sequential => write!(f, "sequential"),
            DispatchMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub database_url: String,
    pub batch_size: usize,
    pub max_workers: usize,
    pub mode: DispatchMode,
    pub table: String,
    pub storage_timeout: Duration,
    pub create_table: bool,
    pub max_error_lines: usize,
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            mode: DispatchMode::default(),
            table: DEFAULT_TABLE.to_string(),
            storage_timeout: Duration::from_secs(DEFAULT_STORAGE_TIMEOUT_SECS),
            create_table: true,
            max_error_lines: DEFAULT_MAX_ERROR_LINES,
            dry_run: false,
        }
    }
}

impl RunConfig {
    /// Overlays values present in a config file.
    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(url) = &file.database_url {
            self.database_url = url.clone();
        }
        if let Some(batch_size) = file.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(max_workers) = file.max_workers {
            self.max_workers = max_workers;
        }
        if let Some(mode) = file.mode {
            self.mode = mode;
        }
        if let Some(table) = &file.table {
            self.table = table.clone();
        }
        if let Some(secs) = file.storage_timeout_secs {
            self.storage_timeout = Duration::from_secs(secs);
        }
        if let Some(create_table) = file.create_table {
            self.create_table = create_table;
        }
        if let Some(lines) = file.max_error_lines {
            self.max_error_lines = lines;
        }
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        // dry runs never open the store
        if !self.dry_run {
            validate_database_url("database_url", &self.database_url)?;
        }
        validate_positive_number("batch_size", self.batch_size, 1)?;
        validate_positive_number("max_workers", self.max_workers, 1)?;
        validate_positive_number(
            "storage_timeout_secs",
            self.storage_timeout.as_secs() as usize,
            1,
        )?;
        validate_identifier("table", &self.table)?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
