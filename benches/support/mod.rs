//! Shared helpers for benchmarks

use std::path::PathBuf;

use tempfile::TempDir;

/// `rows` lines of `columns` short cells
pub fn make_csv(rows: usize, columns: usize) -> String {
    let mut text = String::with_capacity(rows * columns * 8);
    for row in 0..rows {
        for col in 0..columns {
            if col > 0 {
                text.push(',');
            }
            text.push_str(&format!("r{}c{}", row, col));
        }
        text.push('\n');
    }
    text
}

/// Parsed fields of one row of [`make_csv`]
#[allow(dead_code)]
pub fn make_fields(row: usize, columns: usize) -> Vec<String> {
    (0..columns).map(|col| format!("r{}c{}", row, col)).collect()
}

/// Write a generated file to a temporary directory
#[allow(dead_code)]
pub fn write_csv(rows: usize, columns: usize) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("bench.csv");
    std::fs::write(&path, make_csv(rows, columns)).expect("Failed to write bench file");
    (dir, path)
}
