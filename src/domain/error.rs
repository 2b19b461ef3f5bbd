use super::invocation::Step;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by environment operations.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid environment name '{0}': use only letters, digits and underscores")]
    InvalidName(String),

    #[error("no valid packages specified")]
    EmptyPackageList,

    #[error("virtual environment '{name}' already exists at {}", .path.display())]
    AlreadyExists { name: String, path: PathBuf },

    #[error("virtual environment '{name}' does not exist at {}", .path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("{step} failed: {detail}")]
    Tool { step: Step, detail: String },

    #[error("{step} timed out after {after:?}")]
    TimedOut { step: Step, after: Duration },

    #[error("{step} was cancelled")]
    Cancelled { step: Step },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    ExternalTool,
    Io,
}

impl EnvError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName(_) | Self::EmptyPackageList => ErrorKind::Validation,
            Self::AlreadyExists { .. } | Self::NotFound { .. } => ErrorKind::State,
            Self::Tool { .. } | Self::TimedOut { .. } | Self::Cancelled { .. } => {
                ErrorKind::ExternalTool
            }
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// The external step this error came from, if any.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Tool { step, .. } | Self::TimedOut { step, .. } | Self::Cancelled { step } => {
                Some(*step)
            }
            _ => None,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
