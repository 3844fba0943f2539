//! Compressed per-worker adjacency (CSR when keyed by source, CSC when keyed by destination)
//!
//! Based on `GraphBLAST` (Yang et al., ACM `ToMS` 2022) sparse layouts, restricted
//! to the major-vertex range one worker owns.
//!
//! # Layout
//!
//! ```text
//! Local range [3, 6), edges 3 → 5, 3 → 4, 5 → 0
//!
//!   offsets: [0, 2, 2, 3]   // row 0 (vertex 3): [0..2), row 1 (vertex 4): [2..2), row 2 (vertex 5): [2..3)
//!   indices: [4, 5, 0]      // sorted within each row
//! ```

use crate::types::IdType;
use std::ops::Range;

/// Offsets plus neighbor ids for a contiguous block of major vertices
///
/// Rows are local (0-based from the worker's first owned vertex); neighbor ids
/// are global internal ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedAdjacency<V> {
    /// Row `r`'s neighbors live at `indices[offsets[r]..offsets[r + 1]]`
    /// Length: rows + 1
    offsets: Vec<usize>,

    /// Neighbor ids, grouped by row
    /// Length: edges
    indices: Vec<V>,
}

impl<V: IdType> CompressedAdjacency<V> {
    /// Adjacency with `rows` rows and no edges
    #[must_use]
    pub fn empty(rows: usize) -> Self {
        Self {
            offsets: vec![0; rows + 1],
            indices: Vec::new(),
        }
    }

    /// Compress edges already sorted by row
    ///
    /// `rows_of[i]` is the local row of edge `i`; must be non-decreasing and
    /// `< rows`. `indices[i]` is its neighbor.
    #[must_use]
    pub fn from_sorted(rows_of: &[usize], indices: Vec<V>, rows: usize) -> Self {
        debug_assert_eq!(rows_of.len(), indices.len());
        debug_assert!(rows_of.windows(2).all(|w| w[0] <= w[1]));

        let mut counts = vec![0_usize; rows];
        for &row in rows_of {
            counts[row] += 1;
        }

        let mut offsets = Vec::with_capacity(rows + 1);
        let mut offset = 0_usize;
        offsets.push(offset);
        for count in counts {
            offset += count;
            offsets.push(offset);
        }

        Self { offsets, indices }
    }

    /// Unchecked construction for exercising the validation pass
    #[cfg(test)]
    pub(crate) fn from_raw_parts(offsets: Vec<usize>, indices: Vec<V>) -> Self {
        Self { offsets, indices }
    }

    /// Number of rows (locally owned major vertices)
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of stored edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.indices.len()
    }

    /// Edge positions of row `row`
    #[must_use]
    pub fn edge_range(&self, row: usize) -> Range<usize> {
        self.offsets[row]..self.offsets[row + 1]
    }

    /// Neighbors of row `row`
    #[must_use]
    pub fn row(&self, row: usize) -> &[V] {
        &self.indices[self.edge_range(row)]
    }

    /// Out-degree (or in-degree for CSC) of row `row`
    #[must_use]
    pub fn degree(&self, row: usize) -> usize {
        self.offsets[row + 1] - self.offsets[row]
    }

    /// Offsets array
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Neighbor array
    #[must_use]
    pub fn indices(&self) -> &[V] {
        &self.indices
    }

    /// Check that offsets are monotone and cover the neighbor array exactly
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation
    pub fn check_offsets(&self) -> Result<(), String> {
        if self.offsets.first() != Some(&0) {
            return Err("first offset is not 0".into());
        }
        if let Some(row) = self.offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(format!("offsets decrease at row {row}"));
        }
        let last = self.offsets.last().copied().unwrap_or(0);
        if last != self.indices.len() {
            return Err(format!(
                "last offset {last} does not match {} neighbors",
                self.indices.len()
            ));
        }
        Ok(())
    }
}
