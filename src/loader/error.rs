//! Loader error types
//!
//! Open-time failures are reported once and no loader is created. Failures
//! while loading a row stay local to that load; only index build failures are
//! sticky, and those live in the loader state rather than in these types.

use std::io;

pub use crate::util::FileOpenError as OpenError;

/// Why a single row could not be loaded
#[derive(Debug)]
pub enum LoadError {
    /// Row lies past the end of a fully indexed file
    OutOfRange { row: usize, rows: usize },
    /// Index building failed before reaching this row
    IndexFailed(String),
    /// Reading the row's bytes failed
    Io(io::Error),
    /// The loader shut down while the load was in flight
    Closed,
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::OutOfRange { row, rows } => {
                write!(f, "row {} out of range ({} rows)", row, rows)
            }
            LoadError::IndexFailed(msg) => write!(f, "index build failed: {}", msg),
            LoadError::Io(err) => write!(f, "I/O error: {}", err),
            LoadError::Closed => write!(f, "loader closed"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(err) => Some(err),
            _ => None,
        }
    }
}
