//! Lazily indexed row loader
//!
//! Turns a delimited file into a random-access table of parsed rows without
//! reading the whole file up front.
//!
//! # Architecture
//!
//! ```text
//! Loader (owned by one caller)
//! └── Arc<Shared>
//!     ├── Mutex<RowSource>        file handle + read cursor
//!     ├── RwLock<LoaderState>
//!     │     ├── OffsetIndex       row → byte offset
//!     │     ├── RowCache          row → fields (capacity or window policy)
//!     │     └── EditOverlay       row → col → value
//!     ├── PrefetchQueue           bounded request queue
//!     └── EventHub                refresh signal
//!
//! threads: index builder (eager mode), prefetch consumer
//! ```
//!
//! Lock order is always source → state. The state lock is never held across
//! file I/O, so `get_row` never waits on disk.

mod cache;
mod error;
mod index;
mod overlay;
mod prefetch;
mod source;
mod status;

pub use cache::{
    row_bytes, trim_action, CachePolicy, Direction, MemoryBudget, RowCache, TrimAction,
    WindowBounds,
};
pub use error::{LoadError, OpenError};
pub use index::{scan_line_ends, BuildState, LineScan, OffsetIndex, RowSpan};
pub use overlay::EditOverlay;
pub use prefetch::{PrefetchQueue, PrefetchRequest};
pub use source::{ByteSource, RowSource};
pub use status::{LoaderEvent, LoaderPhase, LoaderStatus, RowStatus};

use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::LoaderConfig;
use crate::csv::{detect_delimiter, parse_row, Delimiter};
use crate::util::{is_likely_binary, read_prefix, validate_file_for_opening};
use prefetch::{LoadedRange, RowLoader};
use status::EventHub;

/// Bytes sniffed from the start of the file to guess the delimiter
const SNIFF_BYTES: usize = 8 * 1024;

/// Everything guarded by the loader lock
struct LoaderState {
    index: OffsetIndex,
    cache: RowCache,
    overlay: EditOverlay,
}

impl LoaderState {
    /// Direction to grow the window after a hit on `row`, if growing is
    /// possible there
    fn wanted_extension(&self, row: usize) -> Option<Direction> {
        let direction = self.cache.extension_hint(row)?;
        let window = self.cache.window()?;
        match (direction, self.index.row_count()) {
            (Direction::Forward, Some(rows)) if window.end >= rows => None,
            _ => Some(direction),
        }
    }
}

struct Shared {
    path: PathBuf,
    delimiter: Delimiter,
    pass_rows: usize,
    source: Mutex<RowSource>,
    state: RwLock<LoaderState>,
    queue: PrefetchQueue,
    events: EventHub,
    closed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Shared {
    /// Grow the offset index by one pass, or until `until_row` is readable
    ///
    /// Returns the build state afterwards. Read failures become the sticky
    /// index error and are returned to the caller that hit them. Each pass
    /// checks the closed flag so shutdown never waits on a far scan.
    fn extend_index(&self, until_row: Option<usize>) -> Result<BuildState, LoadError> {
        let mut source = self.source.lock();

        loop {
            if self.closed.load(Ordering::Relaxed) {
                return Err(LoadError::Closed);
            }
            let (start, wanted, row0_end) = {
                let state = self.state.read();
                let index = &state.index;
                if let Some(message) = index.error() {
                    return Err(LoadError::IndexFailed(message.to_string()));
                }
                if !index.can_grow() {
                    return Ok(index.state());
                }
                let wanted = match until_row {
                    Some(row) if !index.needs_row(row) => return Ok(index.state()),
                    Some(row) => (row + 1 - index.indexed_rows()).min(self.pass_rows),
                    None => self.pass_rows,
                };
                (index.end_offset(), wanted, index.offsets().get(1).copied())
            };

            let scanned = source.scan(start, wanted).and_then(|scan| {
                if !scan.eof {
                    return Ok((scan, 0));
                }
                let columns = match row0_end.or_else(|| scan.ends.first().copied()) {
                    Some(end) => parse_row(&source.read_span(0, end)?, self.delimiter).len(),
                    None => 0,
                };
                Ok((scan, columns))
            });

            let (scan, columns) = match scanned {
                Ok(result) => result,
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!(
                        "Index build failed for {} at byte {}: {}",
                        self.path.display(),
                        start,
                        message
                    );
                    self.state.write().index.fail(message.clone());
                    self.events.emit(LoaderEvent::IndexFailed {
                        message: message.clone(),
                    });
                    return Err(LoadError::IndexFailed(message));
                }
            };

            let (state, rows) = {
                let mut state = self.state.write();
                state.index.append(&scan.ends);
                if scan.eof {
                    state.index.complete(columns);
                }
                (state.index.state(), state.index.indexed_rows())
            };

            if state == BuildState::Complete {
                tracing::info!(
                    "Indexed {}: {} rows, {} columns",
                    self.path.display(),
                    rows,
                    columns
                );
                self.events
                    .emit(LoaderEvent::IndexComplete { rows, columns });
                return Ok(state);
            }

            tracing::trace!("Index pass reached {} rows", rows);
            self.events.emit(LoaderEvent::IndexProgress { rows });
            if until_row.is_none() {
                return Ok(state);
            }
        }
    }

    /// Index the whole file, pacing passes by `delay` and stopping as soon as
    /// the control channel closes
    fn build_fully(&self, control: &Receiver<()>, delay: Duration) {
        self.state.write().index.begin();
        tracing::info!("Building row index for {}", self.path.display());

        loop {
            match self.extend_index(None) {
                Ok(BuildState::Complete) | Err(_) => return,
                Ok(_) => {}
            }

            let stopped = if delay.is_zero() {
                matches!(control.try_recv(), Err(TryRecvError::Disconnected))
            } else {
                matches!(
                    control.recv_timeout(delay),
                    Err(RecvTimeoutError::Disconnected)
                )
            };
            if stopped {
                tracing::debug!("Index builder stopped before completion");
                return;
            }
        }
    }
}

impl RowLoader for Shared {
    fn load_row(&self, row: usize) -> Result<bool, LoadError> {
        {
            let state = self.state.read();
            if state.index.is_out_of_range(row) {
                return Err(LoadError::OutOfRange {
                    row,
                    rows: state.index.indexed_rows(),
                });
            }
            if state.cache.contains(row) {
                return Ok(false);
            }
        }

        let extended = self.extend_index(Some(row));
        if let Err(LoadError::Closed) = extended {
            return Err(LoadError::Closed);
        }

        let bytes = {
            let mut source = self.source.lock();
            let span = {
                let state = self.state.read();
                if state.index.is_out_of_range(row) {
                    return Err(LoadError::OutOfRange {
                        row,
                        rows: state.index.indexed_rows(),
                    });
                }
                if state.cache.contains(row) {
                    return Ok(false);
                }
                if let Some(message) = state.index.error() {
                    if row >= state.index.indexed_rows() {
                        return Err(LoadError::IndexFailed(message.to_string()));
                    }
                }
                state.index.span(row)
            };
            let Some(span) = span else {
                return Err(match extended {
                    Err(e) => e,
                    Ok(_) => LoadError::IndexFailed(format!("no offset for row {}", row)),
                });
            };
            match span.end {
                Some(end) => source.read_span(span.start, end)?,
                None => source.read_line_at(span.start)?,
            }
        };

        let fields = parse_row(&bytes, self.delimiter);
        let evicted = self.state.write().cache.insert(row, fields);
        if evicted > 0 {
            tracing::trace!("Evicted {} rows to cache row {}", evicted, row);
        }
        Ok(true)
    }

    fn extend_window(&self, direction: Direction) -> Option<LoadedRange> {
        let budget = match self.state.read().cache.policy() {
            CachePolicy::Window(budget) => budget,
            CachePolicy::Capacity { .. } => return None,
        };
        let pass_bytes = budget.pass_bytes();

        let mut added = 0;
        let mut range: Option<LoadedRange> = None;
        while added <= pass_bytes && !self.closed.load(Ordering::Relaxed) {
            let Some(row) = self.state.read().cache.extension_start(direction) else {
                break;
            };
            match self.load_row(row) {
                Ok(_) => {}
                Err(LoadError::OutOfRange { .. } | LoadError::Closed) => break,
                Err(e) => {
                    tracing::warn!("Window extension stopped at row {}: {}", row, e);
                    break;
                }
            }
            added += self
                .state
                .read()
                .cache
                .get(row)
                .map(row_bytes)
                .unwrap_or(0)
                .max(1);
            range = Some(match range {
                None => LoadedRange {
                    first: row,
                    last: row,
                },
                Some(r) => LoadedRange {
                    first: r.first.min(row),
                    last: r.last.max(row),
                },
            });
        }

        let evicted = self.state.write().cache.trim();
        tracing::debug!(
            "Window extension {:?} loaded {:?}, trimmed {} rows",
            direction,
            range,
            evicted
        );
        range
    }

    fn is_windowed(&self) -> bool {
        self.state.read().cache.is_window()
    }

    fn row_limit(&self) -> Option<usize> {
        self.state.read().index.row_count()
    }

    fn rows_loaded(&self, range: LoadedRange) {
        self.events.emit(LoaderEvent::RowsLoaded {
            first: range.first,
            last: range.last,
        });
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Handle to an open file
///
/// Owned by a single caller; `close` consumes it, so a loader can only be
/// closed once. Dropping a loader closes it as well.
pub struct Loader {
    shared: Arc<Shared>,
    control: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
    eager: bool,
}

impl Loader {
    /// Open a file for browsing
    ///
    /// Validates the path, picks the delimiter (config, then extension, then
    /// sniffing the first lines) and starts the background threads.
    pub fn open(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Self, OpenError> {
        let path = path.as_ref();
        validate_file_for_opening(path)?;
        if is_likely_binary(path) {
            return Err(OpenError::BinaryFile);
        }

        let delimiter = config.delimiter.unwrap_or_else(|| guess_delimiter(path));
        let source = RowSource::open(path)?;
        tracing::info!(
            "Opened {} ({} delimited)",
            path.display(),
            delimiter
        );
        Self::start(path.to_path_buf(), source, delimiter, config)
    }

    /// Start a loader over an already opened source
    pub fn from_source(
        name: impl Into<PathBuf>,
        source: RowSource,
        delimiter: Delimiter,
        config: &LoaderConfig,
    ) -> Result<Self, OpenError> {
        Self::start(name.into(), source, delimiter, config)
    }

    fn start(
        path: PathBuf,
        source: RowSource,
        delimiter: Delimiter,
        config: &LoaderConfig,
    ) -> Result<Self, OpenError> {
        let config = config.clone().validated();
        let (queue, requests) = PrefetchQueue::new(config.prefetch.queue_depth);
        let shared = Arc::new(Shared {
            path,
            delimiter,
            pass_rows: config.index.pass_rows,
            source: Mutex::new(source),
            state: RwLock::new(LoaderState {
                index: OffsetIndex::new(),
                cache: RowCache::new(config.cache.policy()),
                overlay: EditOverlay::new(),
            }),
            queue,
            events: EventHub::default(),
            closed: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        });

        let (control, control_rx) = mpsc::channel::<()>();
        let mut loader = Self {
            shared: Arc::clone(&shared),
            control: Some(control),
            workers: Vec::new(),
            eager: config.index.eager,
        };

        let lookahead = config.prefetch.lookahead;
        let consumer = Arc::clone(&shared);
        loader.workers.push(
            std::thread::Builder::new()
                .name("csvview-prefetch".to_string())
                .spawn(move || {
                    prefetch::run_consumer(&*consumer, &consumer.queue, requests, lookahead)
                })?,
        );

        if config.index.eager {
            let builder = Arc::clone(&shared);
            let delay = Duration::from_millis(config.index.pass_delay_ms);
            loader.workers.push(
                std::thread::Builder::new()
                    .name("csvview-index".to_string())
                    .spawn(move || builder.build_fully(&control_rx, delay))?,
            );
        }

        Ok(loader)
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn delimiter(&self) -> Delimiter {
        self.shared.delimiter
    }

    /// Read a row without blocking on file I/O
    ///
    /// A hit returns the cached fields with pending edits applied. A miss
    /// schedules a background load and returns `Loading`; call again once a
    /// `RowsLoaded` event arrives or after a short delay.
    pub fn get_row(&self, row: i64) -> RowStatus {
        let Ok(row) = usize::try_from(row) else {
            return RowStatus::OutOfRange;
        };

        let hit = {
            let state = self.shared.state.read();
            if state.index.is_out_of_range(row) {
                return RowStatus::OutOfRange;
            }
            state.cache.set_active(row);

            match state.cache.get(row) {
                Some(fields) => {
                    let fields = state.overlay.compose(row, fields);
                    let extension = state.wanted_extension(row);
                    self.shared.hits.fetch_add(1, Ordering::Relaxed);
                    Some((fields, extension))
                }
                None => {
                    if let Some(message) = state.index.error() {
                        if row >= state.index.indexed_rows() {
                            return RowStatus::Fatal(message.to_string());
                        }
                    }
                    None
                }
            }
        };

        match hit {
            Some((fields, direction)) => {
                let refresh_pending =
                    direction.is_some_and(|d| self.shared.queue.request_extension(d));
                RowStatus::Ready {
                    fields,
                    refresh_pending,
                }
            }
            None => {
                self.shared.misses.fetch_add(1, Ordering::Relaxed);
                self.shared.queue.request(PrefetchRequest::Row(row));
                RowStatus::Loading
            }
        }
    }

    /// Record a cell override; visible to every later read
    pub fn set_edit(&self, row: usize, col: usize, value: impl Into<String>) {
        self.shared
            .state
            .write()
            .overlay
            .set(row, col, value.into());
        tracing::debug!("Edit recorded at row {}, column {}", row, col);
        self.shared
            .events
            .emit(LoaderEvent::RowEdited { row, col });
    }

    /// Current overrides for a row, ordered by column
    pub fn edits_for(&self, row: usize) -> Vec<(usize, String)> {
        self.shared
            .state
            .read()
            .overlay
            .edits_for(row)
            .map(|edits| edits.iter().map(|(&c, v)| (c, v.clone())).collect())
            .unwrap_or_default()
    }

    /// Snapshot for diagnostic displays
    pub fn status(&self) -> LoaderStatus {
        let state = self.shared.state.read();
        let index = &state.index;
        LoaderStatus {
            path: self.shared.path.clone(),
            delimiter: self.shared.delimiter.to_string(),
            phase: LoaderPhase::derive(index.state(), index.indexed_rows()),
            built: index.is_built(),
            error: index.error().map(str::to_string),
            row_count: index.row_count(),
            column_count: index.column_count(),
            indexed_rows: index.indexed_rows(),
            cached_rows: state.cache.len(),
            memory_bytes: state.cache.memory_bytes(),
            window: state.cache.window(),
            edited_rows: state.overlay.edited_rows(),
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            dropped_requests: self.shared.queue.dropped(),
        }
    }

    /// Byte offsets discovered so far
    pub fn offsets(&self) -> Vec<u64> {
        self.shared.state.read().index.offsets().to_vec()
    }

    /// Rows currently resident in the cache, ascending
    pub fn cached_rows(&self) -> Vec<usize> {
        self.shared.state.read().cache.resident_rows()
    }

    /// Subscribe to refresh events
    pub fn subscribe(&self) -> Receiver<LoaderEvent> {
        self.shared.events.subscribe()
    }

    /// Block until the index is complete or has failed
    ///
    /// Without a background builder the index is driven on this thread.
    /// Returns `true` once the index is complete.
    pub fn wait_for_index(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let events = self.subscribe();

        loop {
            {
                let state = self.shared.state.read();
                if state.index.is_built() {
                    return true;
                }
                if state.index.error().is_some() {
                    return false;
                }
            }

            if !self.eager {
                if self.shared.extend_index(None).is_err() {
                    return false;
                }
                if Instant::now() >= deadline {
                    return self.shared.state.read().index.is_built();
                }
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match events.recv_timeout(remaining) {
                Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    /// Stop background work and release the file
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.control.is_none() {
            return;
        }
        self.shared.closed.store(true, Ordering::Relaxed);
        self.control.take();
        self.shared.queue.close();

        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                tracing::warn!("{} thread panicked", name);
            }
        }
        tracing::info!("Closed {}", self.shared.path.display());
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("path", &self.shared.path)
            .field("delimiter", &self.shared.delimiter)
            .finish_non_exhaustive()
    }
}

/// Pick a delimiter from the extension, else from the first lines
fn guess_delimiter(path: &Path) -> Delimiter {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(Delimiter::from_extension);
    if let Some(delimiter) = by_extension.filter(|d| *d != Delimiter::Comma) {
        return delimiter;
    }

    match read_prefix(path, SNIFF_BYTES) {
        Ok(sample) => detect_delimiter(&sample),
        Err(e) => {
            tracing::debug!("Could not sniff delimiter of {}: {}", path.display(), e);
            Delimiter::default()
        }
    }
}
