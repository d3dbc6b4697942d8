use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("cannot sample {requested} transitions from a buffer holding {available}")]
    InsufficientSamples { requested: usize, available: usize },

    #[error("state batch has {got} features per row, expected {expected}")]
    StateDimension { expected: usize, got: usize },

    #[error("target batch has shape {got:?}, expected {expected:?}")]
    TargetShape { expected: (usize, usize), got: (usize, usize) },

    #[error("action index {0} is out of range (expected 0..4)")]
    InvalidAction(usize),

    #[error("model architecture mismatch: {0}")]
    Architecture(String),

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("failed to {operation} '{}': {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error
    },

    #[error("model serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error)
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            operation,
            path: path.into(),
            source
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into()
        }
    }
}
