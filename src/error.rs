//! Crate-level error type.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;

/// Errors that stop a run.
#[derive(Debug)]
pub enum MembenchError {
    /// Wrong command-line usage.
    Usage(String),
    /// Invalid configuration.
    Config(ConfigError),
    /// The output file could not be created.
    Output { path: PathBuf, source: io::Error },
    /// Writing or flushing a sample failed mid-run.
    Sink(io::Error),
}

impl fmt::Display for MembenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembenchError::Usage(msg) => write!(f, "usage: {}", msg),
            MembenchError::Config(err) => write!(f, "invalid configuration: {}", err),
            MembenchError::Output { path, source } => {
                write!(f, "cannot create output file {}: {}", path.display(), source)
            }
            MembenchError::Sink(err) => write!(f, "failed to write sample: {}", err),
        }
    }
}

impl std::error::Error for MembenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MembenchError::Usage(_) => None,
            MembenchError::Config(err) => Some(err),
            MembenchError::Output { source, .. } => Some(source),
            MembenchError::Sink(err) => Some(err),
        }
    }
}

impl From<ConfigError> for MembenchError {
    fn from(err: ConfigError) -> Self {
        MembenchError::Config(err)
    }
}

impl From<io::Error> for MembenchError {
    fn from(err: io::Error) -> Self {
        MembenchError::Sink(err)
    }
}
