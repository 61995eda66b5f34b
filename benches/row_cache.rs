//! Benchmarks for the row loader hot paths
//!
//! Run with: cargo bench row_cache

mod support;

use std::io::Cursor;
use std::time::Duration;

use csvview::config::CacheMode;
use csvview::csv::{parse_row, Delimiter};
use csvview::loader::{
    scan_line_ends, CachePolicy, EditOverlay, Loader, MemoryBudget, RowCache, RowStatus,
};
use csvview::LoaderConfig;
use support::{make_csv, make_fields, write_csv};

#[global_allocator]
static ALLOC: divan::AllocProfiler = divan::AllocProfiler::system();

fn main() {
    divan::main();
}

// ============================================================================
// Parsing and scanning
// ============================================================================

#[divan::bench(args = [4, 16, 64])]
fn parse_plain_row(columns: usize) {
    let line = make_csv(1, columns);
    divan::black_box(parse_row(line.as_bytes(), Delimiter::Comma));
}

#[divan::bench]
fn parse_quoted_row() {
    let line = b"\"Smith, John\",\"said \"\"hi\"\"\",42,\"multi word value\"\n";
    divan::black_box(parse_row(line, Delimiter::Comma));
}

#[divan::bench(args = [1_000, 10_000, 100_000])]
fn scan_line_ends_full(bencher: divan::Bencher, rows: usize) {
    let text = make_csv(rows, 4);
    bencher.bench_local(|| {
        let mut reader = Cursor::new(text.as_bytes());
        divan::black_box(scan_line_ends(&mut reader, 0, usize::MAX).ok())
    });
}

// ============================================================================
// Cache
// ============================================================================

#[divan::bench(args = [64, 1024])]
fn capacity_insert_with_eviction(bencher: divan::Bencher, capacity: usize) {
    let rows: Vec<Vec<String>> = (0..capacity * 4).map(|r| make_fields(r, 4)).collect();
    bencher.bench_local(|| {
        let mut cache = RowCache::new(CachePolicy::Capacity {
            max_entries: capacity,
        });
        for (row, fields) in rows.iter().enumerate() {
            cache.insert(row, fields.clone());
        }
        divan::black_box(cache.len())
    });
}

#[divan::bench(args = [1_000, 10_000])]
fn window_fill_and_trim(bencher: divan::Bencher, rows: usize) {
    let fields: Vec<Vec<String>> = (0..rows).map(|r| make_fields(r, 4)).collect();
    bencher.bench_local(|| {
        let mut cache = RowCache::new(CachePolicy::Window(MemoryBudget {
            max_bytes: 64 * 1024,
            ..MemoryBudget::default()
        }));
        for (row, f) in fields.iter().enumerate() {
            cache.set_active(row);
            cache.insert(row, f.clone());
            cache.trim();
        }
        divan::black_box(cache.memory_bytes())
    });
}

#[divan::bench]
fn overlay_compose() {
    let mut overlay = EditOverlay::new();
    overlay.set(3, 1, "edited".to_string());
    overlay.set(3, 9, "far".to_string());
    let fields = make_fields(3, 6);
    divan::black_box(overlay.compose(3, &fields));
}

// ============================================================================
// Loader
// ============================================================================

fn warm_loader(mode: CacheMode) -> (tempfile::TempDir, Loader) {
    let (dir, path) = write_csv(10_000, 6);
    let mut config = LoaderConfig::default();
    config.cache.mode = mode;
    let loader = Loader::open(&path, &config).expect("Failed to open bench file");
    loader.wait_for_index(Duration::from_secs(30));
    while loader.get_row(100) == RowStatus::Loading {
        std::thread::sleep(Duration::from_millis(1));
    }
    (dir, loader)
}

#[divan::bench]
fn get_row_hit_capacity(bencher: divan::Bencher) {
    let (_dir, loader) = warm_loader(CacheMode::Capacity);
    bencher.bench_local(|| divan::black_box(loader.get_row(100)));
}

#[divan::bench]
fn get_row_hit_window(bencher: divan::Bencher) {
    let (_dir, loader) = warm_loader(CacheMode::Window);
    bencher.bench_local(|| divan::black_box(loader.get_row(100)));
}

#[divan::bench(args = [10_000, 100_000], sample_count = 10)]
fn open_and_build_index(bencher: divan::Bencher, rows: usize) {
    let (_dir, path) = write_csv(rows, 6);
    bencher.bench_local(|| {
        let loader = Loader::open(&path, &LoaderConfig::default()).expect("open");
        divan::black_box(loader.wait_for_index(Duration::from_secs(30)));
        loader.close();
    });
}
