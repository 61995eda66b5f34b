//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use csvview::config::{CacheMode, LoaderConfig};
use csvview::loader::{Loader, MemoryBudget, RowStatus};
use tempfile::TempDir;

/// How long a test waits for a background load before giving up
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// A file on disk that lives as long as the returned directory
pub struct TestFile {
    pub dir: TempDir,
    pub path: PathBuf,
}

/// Write `content` to a temporary file named `name`
pub fn write_file(name: &str, content: &str) -> TestFile {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    TestFile { dir, path }
}

/// `rows` lines of `columns` cells, each cell named `r{row}c{col}`
pub fn grid_csv(rows: usize, columns: usize) -> String {
    let mut text = String::new();
    for row in 0..rows {
        let line: Vec<String> = (0..columns).map(|col| format!("r{}c{}", row, col)).collect();
        text.push_str(&line.join(","));
        text.push('\n');
    }
    text
}

pub fn grid_fields(row: usize, columns: usize) -> Vec<String> {
    (0..columns).map(|col| format!("r{}c{}", row, col)).collect()
}

pub fn capacity_config(capacity: usize) -> LoaderConfig {
    let mut config = LoaderConfig::default();
    config.cache.mode = CacheMode::Capacity;
    config.cache.capacity = capacity;
    config
}

pub fn window_config(max_bytes: usize) -> LoaderConfig {
    let mut config = LoaderConfig::default();
    config.cache.mode = CacheMode::Window;
    config.cache.budget = MemoryBudget {
        max_bytes,
        ..MemoryBudget::default()
    };
    config
}

pub fn open(file: &TestFile, config: &LoaderConfig) -> Loader {
    Loader::open(&file.path, config).unwrap()
}

/// Poll `get_row` until it stops reporting `Loading`
pub fn wait_for_row(loader: &Loader, row: i64) -> RowStatus {
    let deadline = Instant::now() + LOAD_TIMEOUT;
    loop {
        let status = loader.get_row(row);
        if status != RowStatus::Loading || Instant::now() >= deadline {
            return status;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Poll until the row is ready and return its fields
pub fn ready_fields(loader: &Loader, row: i64) -> Vec<String> {
    match wait_for_row(loader, row) {
        RowStatus::Ready { fields, .. } => fields,
        other => panic!("row {} not ready: {:?}", row, other),
    }
}

/// Poll `condition` until it holds or the timeout passes
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + LOAD_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
