use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExhibitError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("PDF error: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

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

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Security: {message}")]
    SecurityError { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Compression failed ({method}): {message}")]
    CompressionError { method: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Processing,
    External,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ExhibitError {
    pub fn processing(message: impl Into<String>) -> Self {
        ExhibitError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ExhibitError::ValidationError {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ExhibitError::NotFound {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ExhibitError::ConfigError { .. }
            | ExhibitError::ConfigValidationError { .. }
            | ExhibitError::InvalidConfigValueError { .. }
            | ExhibitError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ExhibitError::ZipError(_)
            | ExhibitError::ValidationError { .. }
            | ExhibitError::SecurityError { .. }
            | ExhibitError::NotFound { .. } => ErrorCategory::Input,
            ExhibitError::PdfError(_)
            | ExhibitError::CsvError(_)
            | ExhibitError::SerializationError(_)
            | ExhibitError::ProcessingError { .. } => ErrorCategory::Processing,
            ExhibitError::ApiError(_) | ExhibitError::CompressionError { .. } => {
                ErrorCategory::External
            }
            ExhibitError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ExhibitError::CompressionError { .. } => ErrorSeverity::Low,
            ExhibitError::ApiError(_) => ErrorSeverity::Medium,
            ExhibitError::IoError(_) => ErrorSeverity::Critical,
            ExhibitError::ConfigError { .. }
            | ExhibitError::ConfigValidationError { .. }
            | ExhibitError::InvalidConfigValueError { .. }
            | ExhibitError::MissingConfigError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ExhibitError::ZipError(_) => "Re-create the ZIP archive and upload it again",
            ExhibitError::ApiError(_) => "Check network access or disable the remote compression tier",
            ExhibitError::PdfError(_) => "Open the document in a PDF viewer and re-save it",
            ExhibitError::CsvError(_) | ExhibitError::SerializationError(_) => {
                "Check free disk space in the output directory"
            }
            ExhibitError::IoError(_) => "Check that the upload and output directories are writable",
            ExhibitError::ConfigError { .. }
            | ExhibitError::ConfigValidationError { .. }
            | ExhibitError::InvalidConfigValueError { .. }
            | ExhibitError::MissingConfigError { .. } => {
                "Review the configuration file and environment variables"
            }
            ExhibitError::ProcessingError { .. } => "Upload at least one readable, unencrypted PDF",
            ExhibitError::ValidationError { .. } => "Correct the request fields and try again",
            ExhibitError::SecurityError { .. } => "Remove absolute or parent-relative paths from the archive",
            ExhibitError::NotFound { .. } => "Check the file or package id",
            ExhibitError::CompressionError { .. } => "Install Ghostscript or disable compression",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ExhibitError::ZipError(_) => "The ZIP archive could not be read".to_string(),
            ExhibitError::ApiError(_) => "A remote service did not respond correctly".to_string(),
            ExhibitError::PdfError(_) => "A PDF document could not be processed".to_string(),
            ExhibitError::IoError(e) => format!("File system error: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExhibitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_critical() {
        let err = ExhibitError::MissingConfigError {
            field: "server.port".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_security_error_message() {
        let err = ExhibitError::SecurityError {
            message: "Path traversal in ZIP: ../etc/passwd".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Input);
        assert!(err.to_string().starts_with("Security:"));
        assert!(err.user_friendly_message().contains("../etc/passwd"));
    }

    #[test]
    fn test_compression_error_is_low_severity() {
        let err = ExhibitError::CompressionError {
            method: "ghostscript".to_string(),
            message: "exit status 1".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }
}
