use crate::config::DispatchMode;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional defaults read from a TOML file. Every key may be omitted;
/// command line flags and environment variables take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub batch_size: Option<usize>,
    pub max_workers: Option<usize>,
    pub mode: Option<DispatchMode>,
    pub table: Option<String>,
    pub storage_timeout_secs: Option<u64>,
    pub create_table: Option<bool>,
    pub max_error_lines: Option<usize>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded config file {}", path.as_ref().display());
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
