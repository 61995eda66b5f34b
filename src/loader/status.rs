//! Read results, status snapshots and refresh events
//!
//! Diagnostic surfaces pull a [`LoaderStatus`] whenever they redraw; views
//! that want to avoid polling subscribe to [`LoaderEvent`]s instead.

use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use super::cache::WindowBounds;
use super::index::BuildState;

/// Outcome of a foreground row read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    /// Row is cached; fields include pending edits
    Ready {
        fields: Vec<String>,
        /// A window extension was scheduled; re-read shortly
        refresh_pending: bool,
    },
    /// Row is being fetched in the background
    Loading,
    /// Negative, or past the end of a fully indexed file
    OutOfRange,
    /// Index building failed before this row was reached
    Fatal(String),
}

impl RowStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, RowStatus::Ready { .. })
    }

    /// Fields of a ready row
    pub fn fields(&self) -> Option<&[String]> {
        match self {
            RowStatus::Ready { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn into_fields(self) -> Option<Vec<String>> {
        match self {
            RowStatus::Ready { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

/// Lifecycle of the loader as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderPhase {
    /// Nothing indexed and no build running
    Empty,
    /// Builder running, no complete row yet
    Building,
    /// Rows served from a growing index
    Partial,
    /// Row and column counts are final
    Built,
}

impl LoaderPhase {
    pub(crate) fn derive(state: BuildState, indexed_rows: usize) -> Self {
        match state {
            BuildState::Complete => LoaderPhase::Built,
            BuildState::NotStarted if indexed_rows == 0 => LoaderPhase::Empty,
            BuildState::InProgress if indexed_rows == 0 => LoaderPhase::Building,
            _ => LoaderPhase::Partial,
        }
    }
}

/// Point-in-time view of the loader for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderStatus {
    pub path: PathBuf,
    pub delimiter: String,
    pub phase: LoaderPhase,
    pub built: bool,
    pub error: Option<String>,
    /// Valid once built
    pub row_count: Option<usize>,
    /// Valid once built
    pub column_count: Option<usize>,
    pub indexed_rows: usize,
    pub cached_rows: usize,
    pub memory_bytes: usize,
    /// Window discipline only
    pub window: Option<WindowBounds>,
    pub edited_rows: usize,
    pub hits: u64,
    pub misses: u64,
    pub dropped_requests: u64,
}

/// Refresh signal for views
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderEvent {
    /// Rows in `first..=last` may have become available
    RowsLoaded { first: usize, last: usize },
    /// A cell override was recorded
    RowEdited { row: usize, col: usize },
    /// The index grew to `rows` complete rows
    IndexProgress { rows: usize },
    IndexComplete { rows: usize, columns: usize },
    IndexFailed { message: String },
}

/// Fan-out of events to subscribers; disconnected receivers are pruned
#[derive(Default)]
pub(crate) struct EventHub {
    subscribers: Mutex<Vec<Sender<LoaderEvent>>>,
}

impl EventHub {
    pub fn subscribe(&self) -> Receiver<LoaderEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: LoaderEvent) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_derivation() {
        assert_eq!(
            LoaderPhase::derive(BuildState::NotStarted, 0),
            LoaderPhase::Empty
        );
        assert_eq!(
            LoaderPhase::derive(BuildState::InProgress, 0),
            LoaderPhase::Building
        );
        assert_eq!(
            LoaderPhase::derive(BuildState::InProgress, 12),
            LoaderPhase::Partial
        );
        assert_eq!(
            LoaderPhase::derive(BuildState::Complete, 0),
            LoaderPhase::Built
        );
    }

    #[test]
    fn test_row_status_fields() {
        let ready = RowStatus::Ready {
            fields: vec!["a".to_string()],
            refresh_pending: false,
        };
        assert!(ready.is_ready());
        assert_eq!(ready.fields(), Some(&["a".to_string()][..]));
        assert_eq!(RowStatus::Loading.fields(), None);
        assert_eq!(RowStatus::OutOfRange.into_fields(), None);
    }

    #[test]
    fn test_event_hub_prunes_dropped_subscribers() {
        let hub = EventHub::default();
        let kept = hub.subscribe();
        let dropped = hub.subscribe();
        drop(dropped);

        hub.emit(LoaderEvent::IndexProgress { rows: 3 });
        assert_eq!(hub.subscribers.lock().len(), 1);
        assert_eq!(
            kept.try_recv().ok(),
            Some(LoaderEvent::IndexProgress { rows: 3 })
        );
    }
}
