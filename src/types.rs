//! Identifier, weight and graph-property types shared by every stage
//!
//! Vertex and edge identifiers are generic over [`IdType`] so a single
//! implementation covers 32/64-bit, signed/unsigned callers.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Edge type column element
pub type EdgeTypeId = i32;

/// Edge start/end time column element
pub type EdgeTime = i64;

/// Integer identifier usable for vertices or edge ids
///
/// Conversions are checked: negative or overflowing values come back as
/// `None` and are reported by the caller, never wrapped.
pub trait IdType: Copy + Ord + Hash + Debug + Default + Send + Sync + 'static {
    /// Value as an unsigned index, `None` when negative
    fn to_u64(self) -> Option<u64>;

    /// Narrow an unsigned index, `None` when it does not fit
    fn from_u64(value: u64) -> Option<Self>;

    /// Lossless widening for diagnostics
    fn widen(self) -> i128;

    /// Raw bit pattern used for hashing
    fn bits(self) -> u64;
}

macro_rules! impl_id_type {
    ($($t:ty),*) => {
        $(
            impl IdType for $t {
                #[inline]
                fn to_u64(self) -> Option<u64> {
                    u64::try_from(self).ok()
                }

                #[inline]
                fn from_u64(value: u64) -> Option<Self> {
                    Self::try_from(value).ok()
                }

                #[inline]
                fn widen(self) -> i128 {
                    i128::from(self)
                }

                #[inline]
                #[allow(clippy::cast_sign_loss, clippy::cast_lossless)]
                fn bits(self) -> u64 {
                    self as u64
                }
            }
        )*
    };
}

impl_id_type!(i32, i64, u32, u64);

/// Floating-point edge weight
pub trait Weight: Copy + PartialOrd + Debug + Default + Send + Sync + 'static {
    /// Arithmetic sum used by [`MergePolicy::Sum`]
    #[must_use]
    fn sum(self, other: Self) -> Self;

    /// Widen for reporting
    fn to_f64(self) -> f64;
}

impl Weight for f32 {
    #[inline]
    fn sum(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Weight for f64 {
    #[inline]
    fn sum(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// How parallel edges are collapsed in a simple (non-multigraph) build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Add weights; other attributes come from the first edge
    Sum,
    /// Keep the edge with the smallest weight
    Min,
    /// Keep the edge with the largest weight
    Max,
    /// Keep the first edge of each group
    First,
}

/// Which endpoint keys the compressed structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Offsets indexed by source, neighbors are destinations (CSR)
    #[default]
    SourceMajor,
    /// Offsets indexed by destination, neighbors are sources (CSC, "store transposed")
    DestinationMajor,
}

/// Graph model flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphProperties {
    /// Edges are one-directional
    pub is_directed: bool,
    /// Parallel edges between the same ordered pair are retained
    pub is_multigraph: bool,
}

impl GraphProperties {
    /// Directed simple graph
    #[must_use]
    pub const fn directed() -> Self {
        Self {
            is_directed: true,
            is_multigraph: false,
        }
    }

    /// Undirected simple graph
    #[must_use]
    pub const fn undirected() -> Self {
        Self {
            is_directed: false,
            is_multigraph: false,
        }
    }

    /// Toggle multigraph semantics
    #[must_use]
    pub const fn with_multigraph(mut self, is_multigraph: bool) -> Self {
        self.is_multigraph = is_multigraph;
        self
    }
}

impl Default for GraphProperties {
    fn default() -> Self {
        Self::directed()
    }
}
