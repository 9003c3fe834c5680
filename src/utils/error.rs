use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Input file not found: {path}")]
    SourceNotFound { path: String },

    #[error("Malformed input{}: {message}", .line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    MalformedInput { line: Option<u64>, message: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] sqlx::Error),

    #[error("Storage request timed out after {seconds}s")]
    StorageTimeout { seconds: u64 },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Batch {batch} error: {message}")]
    WorkerFailure { batch: usize, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl From<csv::Error> for EtlError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        match err.into_kind() {
            csv::ErrorKind::Io(io) => EtlError::IoError(io),
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => EtlError::MalformedInput {
                line,
                message: format!("expected {} fields, found {}", expected_len, len),
            },
            csv::ErrorKind::Utf8 { err, .. } => EtlError::MalformedInput {
                line,
                message: format!("invalid UTF-8: {}", err),
            },
            other => EtlError::MalformedInput {
                line,
                message: format!("{:?}", other),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Storage,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::TomlError(_) => ErrorCategory::Configuration,
            EtlError::SourceNotFound { .. } | EtlError::MalformedInput { .. } => {
                ErrorCategory::Source
            }
            EtlError::StorageError(_) | EtlError::StorageTimeout { .. } => ErrorCategory::Storage,
            EtlError::ProcessingError { .. } | EtlError::WorkerFailure { .. } => {
                ErrorCategory::Processing
            }
            EtlError::IoError(_) | EtlError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Processing => ErrorSeverity::Medium,
            ErrorCategory::Storage => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Source => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Errors that abort a run. Everything else is absorbed into the run summary.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Source | ErrorCategory::System
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::MissingConfigError { field } => {
                format!("Required setting '{}' is not set", field)
            }
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            EtlError::SourceNotFound { path } => format!("Cannot find input file {}", path),
            EtlError::MalformedInput { .. } => format!("Input file could not be parsed ({})", self),
            EtlError::StorageError(_) | EtlError::StorageTimeout { .. } => {
                format!("Database operation failed ({})", self)
            }
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::MissingConfigError { .. } => {
                "Set the missing value via command line flag or environment variable, e.g. DATABASE_URL=sqlite://data.db"
            }
            EtlError::ConfigError { .. } | EtlError::InvalidConfigValueError { .. } => {
                "Check --batch-size, --max-workers and --database-url values"
            }
            EtlError::TomlError(_) => "Check the syntax of the --config file",
            EtlError::SourceNotFound { .. } => "Make sure the input path exists and is readable",
            EtlError::MalformedInput { .. } => {
                "Every data row must have the same number of columns as the header row"
            }
            EtlError::StorageError(_) | EtlError::StorageTimeout { .. } => {
                "Verify the database is reachable and the target table exists"
            }
            EtlError::ProcessingError { .. } | EtlError::WorkerFailure { .. } => {
                "Re-run with --verbose to see per-batch details"
            }
            EtlError::IoError(_) | EtlError::SerializationError(_) => {
                "Check file permissions and available disk space"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unequal_lengths_become_malformed_input() {
        let data = "id,name,value\n1,a,2\n2,b\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let err = reader
            .records()
            .find_map(|r| r.err())
            .expect("second row is short");

        let err = EtlError::from(err);
        assert!(matches!(err, EtlError::MalformedInput { line: Some(3), .. }));
        assert!(err.to_string().contains("at line 3"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_storage_errors_are_not_fatal() {
        let err = EtlError::StorageTimeout { seconds: 5 };
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let err = EtlError::MissingConfigError {
            field: "database_url".to_string(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("database_url"));
    }
}
