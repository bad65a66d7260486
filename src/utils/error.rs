use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Validation error at line {line}: {message}")]
    Validation { line: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Unknown job: {name}")]
    UnknownJob { name: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfig { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, BatchError>;

/// 錯誤種類，記錄在失敗的 run 上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Io,
    Persistence,
    UnknownJob,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Io => "IO",
            ErrorKind::Persistence => "PERSISTENCE",
            ErrorKind::UnknownJob => "UNKNOWN_JOB",
            ErrorKind::Config => "CONFIG",
        };
        f.write_str(name)
    }
}

impl ErrorKind {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 外部暫時性故障，重新執行新的 run 可能成功
            ErrorKind::Persistence => ErrorSeverity::Medium,
            ErrorKind::NotFound | ErrorKind::Validation => ErrorSeverity::High,
            ErrorKind::Io | ErrorKind::UnknownJob | ErrorKind::Config => ErrorSeverity::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Storage,
    Database,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 依錯誤嚴重程度決定程序退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl BatchError {
    pub fn validation(line: u64, message: impl Into<String>) -> Self {
        BatchError::Validation {
            line,
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        BatchError::Persistence {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BatchError::NotFound { .. } => ErrorKind::NotFound,
            BatchError::Validation { .. } => ErrorKind::Validation,
            BatchError::Io(_) => ErrorKind::Io,
            BatchError::Persistence { .. } => ErrorKind::Persistence,
            BatchError::UnknownJob { .. } => ErrorKind::UnknownJob,
            BatchError::Config { .. }
            | BatchError::MissingConfig { .. }
            | BatchError::InvalidConfigValue { .. } => ErrorKind::Config,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::Validation => ErrorCategory::Input,
            ErrorKind::Io => ErrorCategory::Storage,
            ErrorKind::Persistence => ErrorCategory::Database,
            ErrorKind::UnknownJob | ErrorKind::Config => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.kind().severity()
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            BatchError::NotFound { path } => {
                format!("Check that the input file exists at '{}'", path)
            }
            BatchError::Validation { line, .. } => format!(
                "Fix line {} of the CSV file; no rows were inserted, the whole file can be rerun",
                line
            ),
            BatchError::Io(_) => {
                "Check file permissions and free disk space, then start a new run".to_string()
            }
            BatchError::Persistence { .. } => {
                "Check database connectivity and constraints, then start a new run".to_string()
            }
            BatchError::UnknownJob { .. } => {
                "Use one of the registered job names: CSV_TO_DB, DB_TO_CSV".to_string()
            }
            BatchError::Config { .. }
            | BatchError::MissingConfig { .. }
            | BatchError::InvalidConfigValue { .. } => {
                "Review the batch configuration file and command line arguments".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BatchError::NotFound { path } => format!("Input file '{}' does not exist", path),
            BatchError::Validation { line, message } => {
                format!("Invalid data on line {}: {}", line, message)
            }
            BatchError::Io(e) => format!("File access failed: {}", e),
            BatchError::Persistence { message } => format!("Database operation failed: {}", message),
            BatchError::UnknownJob { name } => format!("No job named '{}' is registered", name),
            BatchError::Config { message } => format!("Configuration problem: {}", message),
            BatchError::MissingConfig { field } => format!("Missing required setting '{}'", field),
            BatchError::InvalidConfigValue { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
        }
    }
}

impl From<csv::Error> for BatchError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|pos| pos.line())
            .unwrap_or_default();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => BatchError::Io(io),
            csv::ErrorKind::Utf8 { err, .. } => {
                BatchError::validation(line, format!("invalid UTF-8: {}", err))
            }
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => BatchError::validation(
                line,
                format!("expected {} fields, found {}", expected_len, len),
            ),
            other => BatchError::validation(line, format!("{:?}", other)),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for BatchError {
    fn from(err: sqlx::Error) -> Self {
        BatchError::persistence(err.to_string())
    }
}
