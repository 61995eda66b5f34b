//! Pending cell edits layered over cached rows
//!
//! Edits live apart from the cache so that eviction never loses them, and are
//! never written back to the file.

use std::collections::{BTreeMap, HashMap};

/// Sparse row → column → value overrides
#[derive(Debug, Clone, Default)]
pub struct EditOverlay {
    edits: HashMap<usize, BTreeMap<usize, String>>,
}

impl EditOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an override, replacing any earlier one for the same cell
    pub fn set(&mut self, row: usize, col: usize, value: String) {
        self.edits.entry(row).or_default().insert(col, value);
    }

    /// Overrides for one row, ordered by column
    pub fn edits_for(&self, row: usize) -> Option<&BTreeMap<usize, String>> {
        self.edits.get(&row)
    }

    /// Number of rows carrying at least one edit
    pub fn edited_rows(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Compose cached fields with this row's overrides
    ///
    /// Columns past the end of the cached row are padded with empty fields.
    pub fn compose(&self, row: usize, fields: &[String]) -> Vec<String> {
        let mut composed = fields.to_vec();
        let Some(row_edits) = self.edits.get(&row) else {
            return composed;
        };

        for (&col, value) in row_edits {
            if col >= composed.len() {
                composed.resize(col + 1, String::new());
            }
            composed[col] = value.clone();
        }
        composed
    }
}
