//! Parsed row cache with pluggable eviction
//!
//! Two disciplines share one store:
//!
//! - **Capacity**: at most `max_entries` rows; inserting into a full cache
//!   first evicts one resident row other than the active one.
//! - **Window**: the resident rows are exactly the contiguous range
//!   `[start, end)`. The window grows at either edge, resets when a
//!   non-adjacent row is inserted, and shrinks through `trim()` according to
//!   estimated memory use against a [`MemoryBudget`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed per-row bookkeeping cost: the field vector plus its map key
const ROW_OVERHEAD: usize = std::mem::size_of::<Vec<String>>() + std::mem::size_of::<usize>();

/// Memory target for the window discipline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryBudget {
    /// Target ceiling for resident row memory, in bytes
    pub max_bytes: usize,
    /// Fraction of the budget to fill per extension pass
    pub load_ratio: f64,
    /// Fraction of the window to evict per trim pass
    pub clean_ratio: f64,
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            load_ratio: 0.3,
            clean_ratio: 0.5,
        }
    }
}

impl MemoryBudget {
    /// Bytes one extension pass may add before stopping
    pub fn pass_bytes(&self) -> usize {
        ((self.max_bytes as f64) * self.load_ratio).ceil() as usize
    }
}

/// Eviction discipline, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachePolicy {
    Capacity { max_entries: usize },
    Window(MemoryBudget),
}

/// What a trim pass should do at the current memory use
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrimAction {
    /// Well under budget; the window may grow
    Grow,
    /// Comfortable; leave the window alone
    Hold,
    /// Evict this fraction of the window
    Evict(f64),
}

/// Staged trim decision from memory use relative to budget
///
/// | usage                 | action                       |
/// |-----------------------|------------------------------|
/// | `< load_ratio`        | grow                         |
/// | `< 1 - load_ratio`    | hold                         |
/// | `<= 1.0`              | evict `clean_ratio / 2`      |
/// | `<= 2.0`              | evict `clean_ratio`          |
/// | `> 2.0`               | evict `clean_ratio * 2` (≤ 1)|
pub fn trim_action(memory: usize, budget: &MemoryBudget) -> TrimAction {
    let usage = if budget.max_bytes == 0 {
        f64::INFINITY
    } else {
        memory as f64 / budget.max_bytes as f64
    };

    if usage < budget.load_ratio {
        TrimAction::Grow
    } else if usage < 1.0 - budget.load_ratio {
        TrimAction::Hold
    } else if usage <= 1.0 {
        TrimAction::Evict(budget.clean_ratio / 2.0)
    } else if usage <= 2.0 {
        TrimAction::Evict(budget.clean_ratio)
    } else {
        TrimAction::Evict((budget.clean_ratio * 2.0).min(1.0))
    }
}

/// Estimated resident size of one parsed row
pub fn row_bytes(fields: &[String]) -> usize {
    ROW_OVERHEAD
        + fields
            .iter()
            .map(|f| f.len() + std::mem::size_of::<String>())
            .sum::<usize>()
}

/// Direction of a window extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// Resident range of the window discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowBounds {
    pub start: usize,
    pub end: usize,
    pub active: usize,
}

impl WindowBounds {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row < self.end
    }
}

/// Row number → parsed fields
#[derive(Debug)]
pub struct RowCache {
    policy: CachePolicy,
    rows: HashMap<usize, Vec<String>>,
    memory: usize,
    start: usize,
    end: usize,
    /// Last row observed by a reader; readers only hold the shared lock
    active: AtomicUsize,
}

impl RowCache {
    pub fn new(policy: CachePolicy) -> Self {
        let policy = match policy {
            CachePolicy::Capacity { max_entries } => CachePolicy::Capacity {
                max_entries: max_entries.max(1),
            },
            window => window,
        };
        Self {
            policy,
            rows: HashMap::new(),
            memory: 0,
            start: 0,
            end: 0,
            active: AtomicUsize::new(0),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn is_window(&self) -> bool {
        matches!(self.policy, CachePolicy::Window(_))
    }

    pub fn get(&self, row: usize) -> Option<&[String]> {
        self.rows.get(&row).map(Vec::as_slice)
    }

    pub fn contains(&self, row: usize) -> bool {
        self.rows.contains_key(&row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Estimated bytes held by resident rows
    pub fn memory_bytes(&self) -> usize {
        self.memory
    }

    /// Resident row numbers in ascending order
    pub fn resident_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.rows.keys().copied().collect();
        rows.sort_unstable();
        rows
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, row: usize) {
        self.active.store(row, Ordering::Relaxed);
    }

    /// Current window, for the window discipline only
    pub fn window(&self) -> Option<WindowBounds> {
        self.is_window().then(|| WindowBounds {
            start: self.start,
            end: self.end,
            active: self.active(),
        })
    }

    /// Insert or wholesale-replace a row, returning how many other rows were
    /// evicted to make room
    pub fn insert(&mut self, row: usize, fields: Vec<String>) -> usize {
        match self.policy {
            CachePolicy::Capacity { max_entries } => self.insert_bounded(row, fields, max_entries),
            CachePolicy::Window(_) => self.insert_windowed(row, fields),
        }
    }

    /// Insert into a fixed-size cache
    ///
    /// A full cache evicts the first resident row in map order that is not
    /// the active row. The active row goes only when it is the sole resident,
    /// so with a capacity of one the new row replaces it.
    fn insert_bounded(&mut self, row: usize, fields: Vec<String>, max_entries: usize) -> usize {
        let mut evicted = 0;
        if !self.rows.contains_key(&row) && self.rows.len() >= max_entries {
            let active = self.active();
            let victim = self
                .rows
                .keys()
                .copied()
                .find(|&r| r != active)
                .or_else(|| self.rows.keys().next().copied());
            if let Some(victim) = victim {
                self.remove(victim);
                evicted = 1;
            }
        }
        self.store(row, fields);
        evicted
    }

    fn insert_windowed(&mut self, row: usize, fields: Vec<String>) -> usize {
        let mut evicted = 0;
        if self.start == self.end {
            self.start = row;
            self.end = row + 1;
        } else if row >= self.start && row < self.end {
            // replacement, bounds unchanged
        } else if row == self.end {
            self.end += 1;
        } else if row + 1 == self.start {
            self.start -= 1;
        } else {
            evicted = self.rows.len();
            tracing::debug!(
                "Window jump to row {} (was {}..{}), dropping {} rows",
                row,
                self.start,
                self.end,
                evicted
            );
            self.rows.clear();
            self.memory = 0;
            self.start = row;
            self.end = row + 1;
        }
        self.store(row, fields);
        evicted
    }

    fn store(&mut self, row: usize, fields: Vec<String>) {
        self.memory += row_bytes(&fields);
        if let Some(old) = self.rows.insert(row, fields) {
            self.memory -= row_bytes(&old);
        }
    }

    fn remove(&mut self, row: usize) {
        if let Some(old) = self.rows.remove(&row) {
            self.memory -= row_bytes(&old);
        }
    }

    /// Trim decision at the current memory use; `Hold` for the capacity
    /// discipline, which bounds entries instead
    pub fn trim_action(&self) -> TrimAction {
        match self.policy {
            CachePolicy::Window(budget) => trim_action(self.memory, &budget),
            CachePolicy::Capacity { .. } => TrimAction::Hold,
        }
    }

    /// Shrink the window from the end farther from the active row
    ///
    /// Returns the number of rows evicted. The active row is never evicted,
    /// and any trim that evicts leaves a strictly smaller window.
    pub fn trim(&mut self) -> usize {
        let len = self.end - self.start;
        if len == 0 {
            return 0;
        }
        let fraction = match self.trim_action() {
            TrimAction::Evict(fraction) => fraction,
            TrimAction::Grow | TrimAction::Hold => return 0,
        };

        let active = self.active();
        let (front_room, back_room) = if active < self.start {
            (0, len)
        } else if active >= self.end {
            (len, 0)
        } else {
            (active - self.start, self.end - 1 - active)
        };

        let wanted = (((len as f64) * fraction).ceil() as usize).clamp(1, len);
        let cut = if front_room >= back_room {
            let cut = wanted.min(front_room);
            for row in self.start..self.start + cut {
                self.remove(row);
            }
            self.start += cut;
            cut
        } else {
            let cut = wanted.min(back_room);
            for row in self.end - cut..self.end {
                self.remove(row);
            }
            self.end -= cut;
            cut
        };

        if cut > 0 {
            tracing::debug!(
                "Trimmed {} rows, window now {}..{} (active {})",
                cut,
                self.start,
                self.end,
                active
            );
        }
        cut
    }

    /// Which way the window should grow after a read of `row`, if any
    ///
    /// Forward once the row reaches 80% of the window, backward at or before
    /// 20% unless the window already starts at row 0.
    pub fn extension_hint(&self, row: usize) -> Option<Direction> {
        if !self.is_window() || row < self.start || row >= self.end {
            return None;
        }
        let len = self.end - self.start;
        let pos = row - self.start;
        if (pos + 1) * 5 >= len * 4 {
            Some(Direction::Forward)
        } else if pos * 5 <= len && self.start > 0 {
            Some(Direction::Backward)
        } else {
            None
        }
    }

    /// Next row an extension in `direction` would load
    pub fn extension_start(&self, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Forward => Some(self.end),
            Direction::Backward => self.start.checked_sub(1),
        }
    }
}
