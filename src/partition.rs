//! Vertex-to-worker ownership
//!
//! Two pure ownership functions:
//!
//! - [`PartitionRanges`] for internal (dense) ids: worker `i` owns
//!   `[boundary[i-1], boundary[i])`, looked up by binary search.
//! - [`HashPartition`] for external (sparse, arbitrary) ids before any
//!   numbering exists.
//!
//! ```text
//! boundaries = [3, 6]
//!   worker 0: [0, 3)   worker 1: [3, 6)
//! owner_of(2) = 0, owner_of(5) = 1, owner_of(6) -> VertexOutOfRange
//! ```

use crate::error::{ConfigError, GraphError, Result};
use crate::types::{IdType, Orientation};
use std::ops::Range;

/// Deterministic vertex ownership
pub trait VertexPartition<V: IdType> {
    /// Number of workers the ids are spread across
    fn worker_count(&self) -> usize;

    /// Worker owning `vertex`
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexOutOfRange`] if `vertex` is outside the
    /// universe the partition describes.
    fn owner_of(&self, vertex: V) -> Result<usize>;
}

/// Which endpoint of an edge decides its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRouting {
    /// Edge goes to the worker owning its source
    SourceOwner,
    /// Edge goes to the worker owning its destination
    DestinationOwner,
}

impl EdgeRouting {
    /// The endpoint this routing keys on
    #[inline]
    #[must_use]
    pub fn key<V: Copy>(self, src: V, dst: V) -> V {
        match self {
            Self::SourceOwner => src,
            Self::DestinationOwner => dst,
        }
    }

    /// `(designated, other)` endpoints of the edge `(src, dst)`
    #[inline]
    #[must_use]
    pub fn split<V: Copy>(self, src: V, dst: V) -> (V, V) {
        match self {
            Self::SourceOwner => (src, dst),
            Self::DestinationOwner => (dst, src),
        }
    }

    /// Owner of the edge `(src, dst)`
    ///
    /// # Errors
    ///
    /// Propagates the partition's out-of-range error
    #[inline]
    pub fn owner_of_edge<V: IdType, P: VertexPartition<V>>(
        self,
        partition: &P,
        src: V,
        dst: V,
    ) -> Result<usize> {
        partition.owner_of(self.key(src, dst))
    }
}

impl From<Orientation> for EdgeRouting {
    /// Edges live with the owner of the endpoint that keys their row
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::SourceMajor => Self::SourceOwner,
            Orientation::DestinationMajor => Self::DestinationOwner,
        }
    }
}

/// Contiguous internal-id ranges, one per worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRanges {
    /// Exclusive upper bound per worker; last entry is the vertex count
    boundaries: Vec<u64>,
}

impl PartitionRanges {
    /// Build from explicit boundaries
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Partition`] if the table is empty or decreasing
    pub fn from_boundaries(boundaries: Vec<u64>) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(ConfigError::Partition("no workers".into()).into());
        }
        if let Some(pos) = boundaries.windows(2).position(|w| w[0] > w[1]) {
            return Err(ConfigError::Partition(format!(
                "boundary[{}] = {} exceeds boundary[{}] = {}",
                pos,
                boundaries[pos],
                pos + 1,
                boundaries[pos + 1]
            ))
            .into());
        }
        Ok(Self { boundaries })
    }

    /// Build from per-worker vertex counts (prefix sum)
    #[must_use]
    pub fn from_counts(counts: &[u64]) -> Self {
        let boundaries = counts
            .iter()
            .scan(0_u64, |acc, &c| {
                *acc += c;
                Some(*acc)
            })
            .collect::<Vec<_>>();
        Self {
            boundaries: if boundaries.is_empty() { vec![0] } else { boundaries },
        }
    }

    /// Balanced split of `[0, total)` across `workers`
    ///
    /// The first `total % workers` workers get one extra vertex.
    #[must_use]
    pub fn even(total: u64, workers: usize) -> Self {
        let workers = workers.max(1) as u64;
        let base = total / workers;
        let extra = total % workers;
        let counts: Vec<u64> = (0..workers).map(|w| base + u64::from(w < extra)).collect();
        Self::from_counts(&counts)
    }

    /// Boundary table
    #[must_use]
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// Size of the vertex universe
    #[must_use]
    pub fn total_vertices(&self) -> u64 {
        self.boundaries.last().copied().unwrap_or(0)
    }

    /// Internal ids owned by `rank`
    #[must_use]
    pub fn local_range(&self, rank: usize) -> Range<u64> {
        let start = if rank == 0 { 0 } else { self.boundaries[rank - 1] };
        start..self.boundaries[rank]
    }

    /// Owner of an internal id given as `u64`
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexOutOfRange`] for ids `>= total_vertices()`
    pub fn owner_of_index(&self, vertex: u64) -> Result<usize> {
        if vertex >= self.total_vertices() {
            return Err(GraphError::VertexOutOfRange {
                vertex: i128::from(vertex),
                total: self.total_vertices(),
            });
        }
        // First boundary strictly greater than vertex; empty ranges are skipped
        Ok(self.boundaries.partition_point(|&b| b <= vertex))
    }
}

impl<V: IdType> VertexPartition<V> for PartitionRanges {
    fn worker_count(&self) -> usize {
        self.boundaries.len()
    }

    fn owner_of(&self, vertex: V) -> Result<usize> {
        let index = vertex.to_u64().ok_or(GraphError::VertexOutOfRange {
            vertex: vertex.widen(),
            total: self.total_vertices(),
        })?;
        self.owner_of_index(index)
    }
}

/// Hash ownership for external identifiers
///
/// Uses a fixed 64-bit finaliser (splitmix64) so the mapping is identical in
/// every process and every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPartition {
    workers: usize,
}

impl HashPartition {
    /// Spread ids over `workers` workers (at least one)
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    #[inline]
    fn mix(mut x: u64) -> u64 {
        x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
        x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        x ^ (x >> 31)
    }
}

impl<V: IdType> VertexPartition<V> for HashPartition {
    fn worker_count(&self) -> usize {
        self.workers
    }

    #[allow(clippy::cast_possible_truncation)]
    fn owner_of(&self, vertex: V) -> Result<usize> {
        Ok((Self::mix(vertex.bits()) % self.workers as u64) as usize)
    }
}
