//! Command-line argument parsing
//!
//! Supports:
//! - Printing a range of rows
//! - Choosing the cache discipline and its limits
//! - Applying cell edits before printing
//! - Dumping loader status as JSON

use clap::Parser;
use std::path::PathBuf;

use crate::config::{CacheMode, LoaderConfig};
use crate::csv::Delimiter;

/// Browse large delimited files without loading them whole
#[derive(Parser, Debug)]
#[command(name = "csvview", version, about = "Browse large CSV files row by row")]
pub struct CliArgs {
    /// File to open
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// First row to print (0-based)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub from: i64,

    /// Number of rows to print
    #[arg(short = 'n', long, value_name = "M", default_value_t = 20)]
    pub count: usize,

    /// Cache discipline
    #[arg(long, value_enum)]
    pub mode: Option<CacheMode>,

    /// Maximum cached rows in capacity mode
    #[arg(long, value_name = "N")]
    pub capacity: Option<usize>,

    /// Memory budget in bytes for window mode
    #[arg(long, value_name = "BYTES")]
    pub budget: Option<usize>,

    /// Field delimiter: comma, tab, pipe, semicolon or a single character
    #[arg(short = 'd', long, value_parser = parse_delimiter)]
    pub delimiter: Option<Delimiter>,

    /// Override a cell before printing, as ROW:COL=VALUE
    #[arg(long = "edit", value_name = "ROW:COL=VALUE", value_parser = parse_edit)]
    pub edits: Vec<CellEdit>,

    /// Print loader status as JSON after the rows
    #[arg(long)]
    pub status: bool,

    /// Wait for the full index before printing
    #[arg(long)]
    pub wait_index: bool,

    /// Give up on rows that are still loading after this many milliseconds
    #[arg(long, value_name = "MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Index on demand instead of in the background
    #[arg(long)]
    pub lazy_index: bool,

    /// Persist the effective settings to the config file
    #[arg(long)]
    pub save_config: bool,
}

/// A cell override given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

fn parse_delimiter(s: &str) -> Result<Delimiter, String> {
    Delimiter::from_name(s).ok_or_else(|| format!("unknown delimiter '{}'", s))
}

/// Parse `ROW:COL=VALUE`; the value may itself contain `=` or `:`
pub fn parse_edit(s: &str) -> Result<CellEdit, String> {
    let (cell, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ROW:COL=VALUE, got '{}'", s))?;
    let (row, col) = cell
        .split_once(':')
        .ok_or_else(|| format!("expected ROW:COL before '=', got '{}'", cell))?;
    let row = row
        .trim()
        .parse()
        .map_err(|_| format!("invalid row '{}'", row))?;
    let col = col
        .trim()
        .parse()
        .map_err(|_| format!("invalid column '{}'", col))?;
    Ok(CellEdit {
        row,
        col,
        value: value.to_string(),
    })
}

impl CliArgs {
    /// Layer command-line overrides on top of loaded settings
    pub fn apply(&self, config: &mut LoaderConfig) {
        if let Some(mode) = self.mode {
            config.cache.mode = mode;
        }
        if let Some(capacity) = self.capacity {
            config.cache.capacity = capacity;
        }
        if let Some(budget) = self.budget {
            config.cache.budget.max_bytes = budget;
        }
        if self.delimiter.is_some() {
            config.delimiter = self.delimiter;
        }
        if self.lazy_index {
            config.index.eager = false;
        }
    }
}
