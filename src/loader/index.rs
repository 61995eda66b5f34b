//! Row offset index
//!
//! `offsets[i]` is the byte where row `i` starts and `offsets[i + 1]` where it
//! ends. The table always holds one more entry than the rows discovered so
//! far, and only ever grows at the tail.

use serde::Serialize;
use std::io::{self, BufRead};

/// Progress of index construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

/// Where a row lives in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub start: u64,
    /// `None` while the row is the unterminated tail of a partial index
    pub end: Option<u64>,
}

/// Result of one sequential scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineScan {
    /// Absolute end offset of every line read, in order
    pub ends: Vec<u64>,
    /// Whether the scan hit end-of-file
    pub eof: bool,
}

/// Read up to `max_rows` lines from `reader`, which must be positioned at
/// absolute offset `start`
///
/// A final line without a trailing newline still counts as a line.
pub fn scan_line_ends<R: BufRead>(
    reader: &mut R,
    start: u64,
    max_rows: usize,
) -> io::Result<LineScan> {
    let mut ends = Vec::new();
    let mut pos = start;
    let mut line = Vec::new();

    while ends.len() < max_rows {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(LineScan { ends, eof: true });
        }
        pos += n as u64;
        ends.push(pos);
        if line.last() != Some(&b'\n') {
            return Ok(LineScan { ends, eof: true });
        }
    }

    Ok(LineScan { ends, eof: false })
}

/// Incrementally built table of row boundaries
#[derive(Debug, Clone)]
pub struct OffsetIndex {
    offsets: Vec<u64>,
    state: BuildState,
    columns: usize,
    error: Option<String>,
}

impl Default for OffsetIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl OffsetIndex {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            state: BuildState::NotStarted,
            columns: 0,
            error: None,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        self.state == BuildState::Complete
    }

    /// Sticky build failure, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether more rows may still be discovered
    pub fn can_grow(&self) -> bool {
        !self.is_built() && self.error.is_none()
    }

    /// Rows whose start and end offsets are both known
    pub fn indexed_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total row count, fixed once the index is complete
    pub fn row_count(&self) -> Option<usize> {
        self.is_built().then(|| self.indexed_rows())
    }

    /// Column count probed from row 0, fixed once the index is complete
    pub fn column_count(&self) -> Option<usize> {
        self.is_built().then_some(self.columns)
    }

    /// Offset where the next unscanned line starts
    pub fn end_offset(&self) -> u64 {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Whether `row` lies past the end of a complete index
    pub fn is_out_of_range(&self, row: usize) -> bool {
        self.is_built() && row >= self.indexed_rows()
    }

    /// Whether the index must grow before `row` can be read
    pub fn needs_row(&self, row: usize) -> bool {
        self.can_grow() && row >= self.indexed_rows()
    }

    /// Byte span of `row`, if its start is known
    ///
    /// The open-ended tail span is only offered while the build can still
    /// grow. After completion or failure every readable row has both ends.
    pub fn span(&self, row: usize) -> Option<RowSpan> {
        let start = *self.offsets.get(row)?;
        match self.offsets.get(row + 1) {
            Some(&end) => Some(RowSpan {
                start,
                end: Some(end),
            }),
            None if !self.can_grow() => None,
            None => Some(RowSpan { start, end: None }),
        }
    }

    /// Mark the build as running
    pub fn begin(&mut self) {
        if self.state == BuildState::NotStarted {
            self.state = BuildState::InProgress;
        }
    }

    /// Append the end offsets produced by a scan that started at
    /// `end_offset()`
    pub fn append(&mut self, ends: &[u64]) {
        if !self.can_grow() {
            return;
        }
        self.begin();
        for &end in ends {
            debug_assert!(end > self.end_offset(), "offsets must strictly increase");
            if end > self.end_offset() {
                self.offsets.push(end);
            }
        }
    }

    /// Fix the row and column counts
    pub fn complete(&mut self, columns: usize) {
        if !self.can_grow() {
            return;
        }
        self.state = BuildState::Complete;
        self.columns = columns;
    }

    /// Record a terminal build error; further growth stops
    pub fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan_all(text: &str) -> LineScan {
        scan_line_ends(&mut Cursor::new(text.as_bytes()), 0, usize::MAX).unwrap()
    }

    #[test]
    fn test_scan_terminated_lines() {
        let scan = scan_all("a,b\ncc,d\n");
        assert_eq!(scan.ends, vec![4, 9]);
        assert!(scan.eof);
    }

    #[test]
    fn test_scan_unterminated_tail_is_a_row() {
        let scan = scan_all("a\nbc");
        assert_eq!(scan.ends, vec![2, 4]);
        assert!(scan.eof);
    }

    #[test]
    fn test_scan_empty_input() {
        let scan = scan_all("");
        assert!(scan.ends.is_empty());
        assert!(scan.eof);
    }

    #[test]
    fn test_scan_respects_budget_and_start() {
        let text = "x\nyy\nzzz\n";
        let mut cursor = Cursor::new(text.as_bytes());
        cursor.set_position(2);
        let scan = scan_line_ends(&mut cursor, 2, 1).unwrap();
        assert_eq!(scan.ends, vec![5]);
        assert!(!scan.eof);
    }

    #[test]
    fn test_new_index_has_single_offset() {
        let index = OffsetIndex::new();
        assert_eq!(index.offsets(), &[0]);
        assert_eq!(index.indexed_rows(), 0);
        assert_eq!(index.state(), BuildState::NotStarted);
        assert_eq!(index.row_count(), None);
    }

    #[test]
    fn test_span_of_partial_tail() {
        let mut index = OffsetIndex::new();
        index.append(&[4, 9]);

        assert_eq!(index.state(), BuildState::InProgress);
        assert_eq!(
            index.span(1),
            Some(RowSpan {
                start: 4,
                end: Some(9)
            })
        );
        assert_eq!(
            index.span(2),
            Some(RowSpan {
                start: 9,
                end: None
            })
        );
        assert_eq!(index.span(3), None);
    }

    #[test]
    fn test_complete_fixes_counts() {
        let mut index = OffsetIndex::new();
        index.append(&[4, 9, 12]);
        index.complete(2);

        assert_eq!(index.row_count(), Some(3));
        assert_eq!(index.column_count(), Some(2));
        assert_eq!(index.offsets().len(), 4);
        assert_eq!(index.span(3), None);
        assert!(index.is_out_of_range(3));
        assert!(!index.is_out_of_range(2));

        // Counts never change once complete
        index.append(&[20]);
        index.complete(7);
        assert_eq!(index.row_count(), Some(3));
        assert_eq!(index.column_count(), Some(2));
    }

    #[test]
    fn test_failure_is_sticky_and_halts_growth() {
        let mut index = OffsetIndex::new();
        index.append(&[4]);
        index.fail("disk gone".to_string());
        index.fail("second error".to_string());
        index.append(&[9]);

        assert_eq!(index.error(), Some("disk gone"));
        assert_eq!(index.indexed_rows(), 1);
        assert!(!index.can_grow());
        assert!(!index.needs_row(5));
    }

    #[test]
    fn test_failed_index_has_no_tail_span() {
        let mut index = OffsetIndex::new();
        index.append(&[4, 9]);
        assert!(index.span(2).is_some());

        index.fail("disk gone".to_string());
        assert_eq!(
            index.span(1),
            Some(RowSpan {
                start: 4,
                end: Some(9)
            })
        );
        assert_eq!(index.span(2), None);
    }

    #[test]
    fn test_needs_row() {
        let mut index = OffsetIndex::new();
        index.append(&[4, 9]);
        assert!(!index.needs_row(1));
        assert!(index.needs_row(2));
    }
}
