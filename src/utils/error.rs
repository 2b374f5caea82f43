use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Fetch failed for '{term}' in '{location}': {message}")]
    SourceFetch {
        term: String,
        location: String,
        message: String,
    },

    #[error("Repository read failed: {message}")]
    RepositoryRead { message: String },

    #[error("Repository write failed for {target}: {message}")]
    RepositoryWrite { target: String, message: String },

    #[error("Scoring error: {message}")]
    Scoring { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Rule '{label}' does not compile: {message}")]
    InvalidRule { label: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Repository,
    Network,
    System,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit status for a run that failed with this severity. A
    /// cancelled run is not an error and exits with 0.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl TrackerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackerError::SourceFetch { .. } => ErrorCategory::Source,
            TrackerError::RepositoryRead { .. } | TrackerError::RepositoryWrite { .. } => {
                ErrorCategory::Repository
            }
            TrackerError::ApiError(_) => ErrorCategory::Network,
            TrackerError::IoError(_) => ErrorCategory::System,
            TrackerError::ConfigValidationError { .. }
            | TrackerError::InvalidConfigValueError { .. }
            | TrackerError::MissingConfigError { .. }
            | TrackerError::InvalidRule { .. } => ErrorCategory::Configuration,
            TrackerError::Scoring { .. } | TrackerError::SerializationError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrackerError::SourceFetch { .. }
            | TrackerError::RepositoryWrite { .. }
            | TrackerError::ApiError(_) => ErrorSeverity::Medium,
            TrackerError::RepositoryRead { .. }
            | TrackerError::Scoring { .. }
            | TrackerError::SerializationError(_)
            | TrackerError::ConfigValidationError { .. }
            | TrackerError::InvalidConfigValueError { .. }
            | TrackerError::MissingConfigError { .. }
            | TrackerError::InvalidRule { .. } => ErrorSeverity::High,
            TrackerError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// Per-item errors are contained by the pipeline; everything else aborts a run.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            TrackerError::SourceFetch { .. } | TrackerError::RepositoryWrite { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the TOML configuration file and the environment variables it references"
            }
            ErrorCategory::Source => "Check the listing feed endpoint and try again later",
            ErrorCategory::Repository => {
                "Verify the repository is reachable and its credentials are valid, then rerun"
            }
            ErrorCategory::Network => "Check network connectivity and retry",
            ErrorCategory::System => "Check file permissions and available disk space",
            ErrorCategory::Internal => "Rerun with --verbose and report the log output",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TrackerError::RepositoryRead { .. } => format!(
                "Could not read the full listing store, run aborted to avoid duplicates: {}",
                self
            ),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_level_errors_are_medium() {
        let err = TrackerError::SourceFetch {
            term: "react".to_string(),
            location: "remote".to_string(),
            message: "timeout".to_string(),
        };
        assert!(err.is_item_level());
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert_eq!(err.category(), ErrorCategory::Source);
    }

    #[test]
    fn test_repository_read_escalates() {
        let err = TrackerError::RepositoryRead {
            message: "cursor expired".to_string(),
        };
        assert!(!err.is_item_level());
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("cursor expired"));
    }

    #[test]
    fn test_every_failed_run_exits_non_zero() {
        let errors = [
            TrackerError::RepositoryWrite {
                target: "A".to_string(),
                message: "409".to_string(),
            },
            TrackerError::MissingConfigError {
                field: "repository.token".to_string(),
            },
            TrackerError::IoError(std::io::Error::other("disk full")),
        ];
        let codes: Vec<i32> = errors.iter().map(|e| e.severity().exit_code()).collect();
        assert_eq!(codes, vec![2, 1, 3]);
    }
}
