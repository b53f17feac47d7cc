use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Custom Result type for log operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateDir,
    Open,
    Write,
    Sync,
    Close,
    Remove,
    Scan,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CreateDir => "create directory",
            Operation::Open => "open",
            Operation::Write => "write",
            Operation::Sync => "sync",
            Operation::Close => "close",
            Operation::Remove => "remove",
            Operation::Scan => "scan",
        };
        f.write_str(name)
    }
}

/// Errors produced by [`SegmentedLog`](crate::SegmentedLog).
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction parameters, or an exhausted sequence space.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A filesystem operation failed.
    #[error("I/O error during {op} of {}: {source}", .path.display())]
    Io {
        op: Operation,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(op: Operation, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Returns the failed operation for I/O errors.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::Io { op, .. } => Some(*op),
            Error::Config(_) => None,
        }
    }

    /// Returns the underlying `io::ErrorKind` for I/O errors.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::Io { source, .. } => Some(source.kind()),
            Error::Config(_) => None,
        }
    }
}
