//! Background row prefetching
//!
//! Foreground readers never touch the file. A miss drops a request into a
//! bounded queue and returns; one consumer thread serves requests in order,
//! then reads ahead so forward scrolling finds rows already cached.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use super::cache::Direction;
use super::error::LoadError;

/// Work item for the prefetch consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchRequest {
    /// Load this row, then read ahead
    Row(usize),
    /// Grow the resident window in this direction
    Extend(Direction),
}

/// Rows loaded by one served request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedRange {
    pub first: usize,
    pub last: usize,
}

/// What the consumer needs from the loader
pub trait RowLoader: Sync {
    /// Load and cache a row; `Ok(false)` when it was already resident
    fn load_row(&self, row: usize) -> Result<bool, LoadError>;

    /// Run one window extension pass, returning the rows it added
    fn extend_window(&self, direction: Direction) -> Option<LoadedRange>;

    /// Whether the cache is window-bounded
    fn is_windowed(&self) -> bool;

    /// Final row count, once known
    fn row_limit(&self) -> Option<usize>;

    /// Called after each served request that loaded something
    fn rows_loaded(&self, range: LoadedRange);

    /// Whether the consumer should exit without draining the queue
    fn is_closed(&self) -> bool;
}

/// Bounded, best-effort request queue
pub struct PrefetchQueue {
    tx: Mutex<Option<SyncSender<PrefetchRequest>>>,
    dropped: AtomicU64,
    extend_pending: AtomicBool,
}

impl PrefetchQueue {
    /// Create a queue holding at most `depth` pending requests
    pub fn new(depth: usize) -> (Self, Receiver<PrefetchRequest>) {
        let (tx, rx) = mpsc::sync_channel(depth.max(1));
        let queue = Self {
            tx: Mutex::new(Some(tx)),
            dropped: AtomicU64::new(0),
            extend_pending: AtomicBool::new(false),
        };
        (queue, rx)
    }

    /// Enqueue without blocking
    ///
    /// Returns `false` when the request was dropped because the queue is full
    /// or closed. Dropping is not an error.
    pub fn request(&self, request: PrefetchRequest) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        match tx.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Prefetch queue full, dropping {:?}", request);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Ask for a window extension unless one is already queued or running
    ///
    /// Returns `true` when an extension is pending after the call.
    pub fn request_extension(&self, direction: Direction) -> bool {
        if self
            .extend_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return true;
        }
        if self.request(PrefetchRequest::Extend(direction)) {
            true
        } else {
            self.extend_pending.store(false, Ordering::Release);
            false
        }
    }

    fn extension_done(&self) {
        self.extend_pending.store(false, Ordering::Release);
    }

    /// Requests dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the queue; the consumer exits once it notices
    pub fn close(&self) {
        self.tx.lock().take();
    }
}

/// Serve requests until the queue closes
pub fn run_consumer<L: RowLoader>(
    loader: &L,
    queue: &PrefetchQueue,
    rx: Receiver<PrefetchRequest>,
    lookahead: usize,
) {
    while let Ok(request) = rx.recv() {
        if loader.is_closed() {
            break;
        }
        match request {
            PrefetchRequest::Row(row) => {
                if let Some(range) = serve_row(loader, row, lookahead) {
                    loader.rows_loaded(range);
                }
            }
            PrefetchRequest::Extend(direction) => {
                let range = loader.extend_window(direction);
                queue.extension_done();
                if let Some(range) = range {
                    loader.rows_loaded(range);
                }
            }
        }
    }
    tracing::debug!("Prefetch consumer exiting");
}

fn serve_row<L: RowLoader>(loader: &L, row: usize, lookahead: usize) -> Option<LoadedRange> {
    match loader.load_row(row) {
        Ok(_) => {}
        Err(LoadError::OutOfRange { .. }) => {
            tracing::debug!("Prefetch of row {} is past the end of the file", row);
            return None;
        }
        Err(LoadError::Closed) => return None,
        Err(e) => {
            tracing::warn!("Failed to load row {}: {}", row, e);
            return None;
        }
    }

    let mut range = LoadedRange {
        first: row,
        last: row,
    };

    if loader.is_windowed() {
        // Window inserts must stay contiguous, so read ahead in order
        if let Some(extended) = loader.extend_window(Direction::Forward) {
            range.last = range.last.max(extended.last);
        }
        return Some(range);
    }

    let ahead: Vec<usize> = (row + 1..=row.saturating_add(lookahead))
        .take_while(|r| loader.row_limit().map_or(true, |limit| *r < limit))
        .collect();
    if let Some(&last) = ahead.last() {
        range.last = last;
    }

    std::thread::scope(|scope| {
        for next in ahead {
            scope.spawn(move || {
                if let Err(e) = loader.load_row(next) {
                    tracing::debug!("Lookahead load of row {} skipped: {}", next, e);
                }
            });
        }
    });

    Some(range)
}
