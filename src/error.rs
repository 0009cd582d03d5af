use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IncbakError {
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("A backup schedule is already running")]
    AlreadyRunning,

    #[error("Could not create directory {path}: {source}")]
    DirectoryCreateFailed { path: PathBuf, source: io::Error },

    #[error("Could not copy {path}: {source}")]
    FileCopyFailed { path: PathBuf, source: io::Error },

    #[error("Source directory is unreadable: {path}: {source}")]
    SourceRootUnreadable { path: PathBuf, source: io::Error },

    #[error("Settings error: {message}")]
    Settings { message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl IncbakError {
    /// Create a configuration validation error with a custom message
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Create a settings file error with a custom message
    pub fn settings(message: impl Into<String>) -> Self {
        Self::Settings {
            message: message.into(),
        }
    }

    /// Per-file failures are recorded in the run result and the walk goes on
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IncbakError::DirectoryCreateFailed { .. } | IncbakError::FileCopyFailed { .. }
        )
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            IncbakError::ConfigInvalid { .. } => 2,
            IncbakError::Settings { .. } => 2,
            _ => 1,
        }
    }

    /// Provide helpful suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            IncbakError::ConfigInvalid { .. } => vec![
                "Check that the source and backup folders exist".to_string(),
                "Keep the backup folder outside of the source folder".to_string(),
                "Use an interval between 10 and 3600 seconds".to_string(),
            ],
            IncbakError::SourceRootUnreadable { .. } => vec![
                "Check that the source folder still exists".to_string(),
                "Check the permissions of the source folder".to_string(),
            ],
            IncbakError::DirectoryCreateFailed { .. } | IncbakError::FileCopyFailed { .. } => vec![
                "Check the permissions of the backup folder".to_string(),
                "Make sure the backup drive has free space".to_string(),
            ],
            IncbakError::Settings { .. } => vec![
                "Fix or delete the settings file; defaults are used when it is missing".to_string(),
            ],
            _ => vec![],
        }
    }
}
