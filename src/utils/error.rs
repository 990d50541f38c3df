use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Fetch failed for {url}: {message}")]
    FetchError { url: String, message: String },

    #[error("Image decode failed: {message}")]
    DecodeError { message: String },

    #[error("Translation to '{target}' failed after {attempts} attempts: {message}")]
    TranslationError {
        target: String,
        attempts: u32,
        message: String,
    },

    #[error("Malformed record at line {line}: {message}")]
    MalformedRecordError { line: usize, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, PrepError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    External,
    Io,
    Config,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PrepError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PrepError::FetchError { .. } | PrepError::ApiError(_) => ErrorCategory::Network,
            PrepError::DecodeError { .. }
            | PrepError::MalformedRecordError { .. }
            | PrepError::CsvError(_)
            | PrepError::SerializationError(_) => ErrorCategory::Data,
            PrepError::TranslationError { .. } | PrepError::StorageError { .. } => {
                ErrorCategory::External
            }
            PrepError::IoError(_) => ErrorCategory::Io,
            PrepError::ConfigError { .. }
            | PrepError::ConfigValidationError { .. }
            | PrepError::InvalidConfigValueError { .. }
            | PrepError::MissingConfigError { .. } => ErrorCategory::Config,
            PrepError::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    /// Per-record errors are recoverable by resuming; sink and config errors are not.
    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::External => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Config | ErrorCategory::Internal => {
                ErrorSeverity::High
            }
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PrepError::FetchError { .. } | PrepError::ApiError(_) => {
                "Check network connectivity, then re-run the same command to resume"
            }
            PrepError::DecodeError { .. } => {
                "The source image is corrupt or unsupported; it will be retried on the next run"
            }
            PrepError::TranslationError { .. } => {
                "Re-run the translate command later to fill the missing languages"
            }
            PrepError::MalformedRecordError { .. } => {
                "Fix or remove the reported line, or run with --malformed skip"
            }
            PrepError::IoError(_) => "Check disk space and permissions of the output paths",
            PrepError::CsvError(_) => "Make sure the input is a headerless two-column TSV file",
            PrepError::SerializationError(_) => "Make sure every input line is a JSON object",
            PrepError::StorageError { .. } => {
                "Check bucket name, credentials and region of the upload target"
            }
            PrepError::ConfigError { .. }
            | PrepError::ConfigValidationError { .. }
            | PrepError::InvalidConfigValueError { .. }
            | PrepError::MissingConfigError { .. } => {
                "Review the configuration file and command line flags"
            }
            PrepError::ProcessingError { .. } => "Re-run with --verbose for more details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PrepError::MissingConfigError { field } => {
                format!("缺少必要設定: {}", field)
            }
            PrepError::InvalidConfigValueError { field, reason, .. } => {
                format!("設定值錯誤 ({}): {}", field, reason)
            }
            PrepError::MalformedRecordError { line, .. } => {
                format!("輸入檔第 {} 行格式錯誤", line)
            }
            PrepError::IoError(e) => format!("檔案讀寫失敗: {}", e),
            other => other.to_string(),
        }
    }
}
