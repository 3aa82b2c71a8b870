//! Index deltas: which list positions a newly merged page touches.
//!
//! Before the first page lands the surface shows `placeholder_cells` stand-in
//! rows. Positions that fall on a placeholder are redrawn in place (reload);
//! positions past the placeholders are genuinely new rows (insert).

use std::ops::Range;

/// Positions to redraw in place and positions to insert, both ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDelta {
    pub reload: Vec<usize>,
    pub insert: Vec<usize>,
}

impl IndexDelta {
    /// Split `positions` at the placeholder threshold.
    pub fn split(positions: Range<usize>, placeholder_cells: usize) -> Self {
        let boundary = placeholder_cells.clamp(positions.start, positions.end.max(positions.start));
        Self {
            reload: (positions.start..boundary).collect(),
            insert: (boundary..positions.end).collect(),
        }
    }

    /// Delta for `count` items appended after `existing` rows.
    pub fn for_append(existing: usize, count: usize, placeholder_cells: usize) -> Self {
        Self::split(existing..existing + count, placeholder_cells)
    }

    pub fn is_empty(&self) -> bool {
        self.reload.is_empty() && self.insert.is_empty()
    }

    /// Total number of positions touched.
    pub fn len(&self) -> usize {
        self.reload.len() + self.insert.len()
    }
}
