//! csvview - windowed row access for large delimited files
//!
//! Opening a file returns immediately. A background builder records where each
//! row starts, rows are parsed on demand into a bounded cache, and edits live
//! in an overlay that always wins over file contents.

pub mod cli;
pub mod config;
pub mod config_paths;
pub mod csv;
pub mod loader;
pub mod tracing;
pub mod util;

// Re-export commonly used types
pub use config::LoaderConfig;
pub use loader::{Loader, LoaderEvent, LoaderStatus, RowStatus};
