//! Error types for Sponge.

use std::fmt;

/// The main error type for Sponge operations.
#[derive(Debug)]
pub enum Error {
    /// A lock was poisoned (internal error)
    LockPoisoned,

    /// I/O error
    Io(std::io::Error),

    /// Missing or invalid construction parameter
    Config(String),

    /// A frame on disk or in memory failed validation
    Corrupt(String),

    /// Storage backend error
    Storage(String),

    /// The log backend was torn down
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LockPoisoned => write!(f, "Lock poisoned"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Corrupt(msg) => write!(f, "Corrupt frame: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Closed => write!(f, "Log backend is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::LockPoisoned
    }
}

/// A specialized `Result` type for Sponge operations.
pub type Result<T> = std::result::Result<T, Error>;
