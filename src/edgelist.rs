//! Columnar edge shard with parallel attribute columns
//!
//! Endpoints and every present attribute column always have the same length
//! and are reordered together: all row movement goes through
//! [`EdgeList::gather`] or [`EdgeList::split_by_owner`], which apply one
//! permutation to every column.

use crate::error::{ConfigError, Result};
use crate::types::{EdgeTime, EdgeTypeId, IdType, Weight};

/// Which optional columns a shard carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeSchema {
    /// `weight` column present
    pub weight: bool,
    /// `edge_id` column present
    pub edge_id: bool,
    /// `edge_type` column present
    pub edge_type: bool,
    /// `start_time` column present
    pub start_time: bool,
    /// `end_time` column present
    pub end_time: bool,
}

impl EdgeSchema {
    /// Every optional column
    #[must_use]
    pub const fn all() -> Self {
        Self {
            weight: true,
            edge_id: true,
            edge_type: true,
            start_time: true,
            end_time: true,
        }
    }

    /// Columns present in both schemas
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self {
            weight: self.weight && other.weight,
            edge_id: self.edge_id && other.edge_id,
            edge_type: self.edge_type && other.edge_type,
            start_time: self.start_time && other.start_time,
            end_time: self.end_time && other.end_time,
        }
    }
}

/// One shard of an edge list
///
/// # Example
///
/// ```
/// use trueno_graph_dist::EdgeList;
///
/// let edges: EdgeList<i32> = EdgeList::new(vec![0, 1], vec![1, 2])
///     .with_weights(vec![0.5, 1.5]);
/// assert_eq!(edges.len(), 2);
/// edges.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeList<V, E = V, W = f32> {
    /// Source endpoints
    pub src: Vec<V>,
    /// Destination endpoints
    pub dst: Vec<V>,
    /// Edge weights
    pub weight: Option<Vec<W>>,
    /// Edge ids
    pub edge_id: Option<Vec<E>>,
    /// Edge types
    pub edge_type: Option<Vec<EdgeTypeId>>,
    /// Edge start times
    pub start_time: Option<Vec<EdgeTime>>,
    /// Edge end times
    pub end_time: Option<Vec<EdgeTime>>,
}

impl<V: IdType, E: IdType, W: Weight> EdgeList<V, E, W> {
    /// Shard with endpoints only
    #[must_use]
    pub fn new(src: Vec<V>, dst: Vec<V>) -> Self {
        Self {
            src,
            dst,
            weight: None,
            edge_id: None,
            edge_type: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Empty shard carrying the columns named by `schema`
    #[must_use]
    pub fn empty(schema: EdgeSchema) -> Self {
        Self {
            src: Vec::new(),
            dst: Vec::new(),
            weight: schema.weight.then(Vec::new),
            edge_id: schema.edge_id.then(Vec::new),
            edge_type: schema.edge_type.then(Vec::new),
            start_time: schema.start_time.then(Vec::new),
            end_time: schema.end_time.then(Vec::new),
        }
    }

    /// Attach a weight column
    #[must_use]
    pub fn with_weights(mut self, weight: Vec<W>) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Attach an edge-id column
    #[must_use]
    pub fn with_edge_ids(mut self, edge_id: Vec<E>) -> Self {
        self.edge_id = Some(edge_id);
        self
    }

    /// Attach an edge-type column
    #[must_use]
    pub fn with_edge_types(mut self, edge_type: Vec<EdgeTypeId>) -> Self {
        self.edge_type = Some(edge_type);
        self
    }

    /// Attach start/end time columns
    #[must_use]
    pub fn with_times(mut self, start_time: Vec<EdgeTime>, end_time: Vec<EdgeTime>) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    /// Number of edges
    #[must_use]
    pub fn len(&self) -> usize {
        self.src.len()
    }

    /// Whether the shard holds no edges
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Columns present in this shard
    #[must_use]
    pub fn schema(&self) -> EdgeSchema {
        EdgeSchema {
            weight: self.weight.is_some(),
            edge_id: self.edge_id.is_some(),
            edge_type: self.edge_type.is_some(),
            start_time: self.start_time.is_some(),
            end_time: self.end_time.is_some(),
        }
    }

    /// Check every column against the endpoint count
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ColumnLength`] naming the first mismatched column
    pub fn validate(&self) -> Result<()> {
        let expected = self.src.len();
        let check = |column: &'static str, actual: Option<usize>| match actual {
            Some(actual) if actual != expected => Err(ConfigError::ColumnLength {
                column,
                expected,
                actual,
            }),
            _ => Ok(()),
        };
        check("dst", Some(self.dst.len()))?;
        check("weight", self.weight.as_ref().map(Vec::len))?;
        check("edge_id", self.edge_id.as_ref().map(Vec::len))?;
        check("edge_type", self.edge_type.as_ref().map(Vec::len))?;
        check("start_time", self.start_time.as_ref().map(Vec::len))?;
        check("end_time", self.end_time.as_ref().map(Vec::len))?;
        Ok(())
    }

    /// Drop the columns `keep` does not name
    #[must_use]
    pub fn project(mut self, keep: EdgeSchema) -> Self {
        if !keep.weight {
            self.weight = None;
        }
        if !keep.edge_id {
            self.edge_id = None;
        }
        if !keep.edge_type {
            self.edge_type = None;
        }
        if !keep.start_time {
            self.start_time = None;
        }
        if !keep.end_time {
            self.end_time = None;
        }
        self
    }

    /// New shard holding rows `indices`, in that order, from every column
    #[must_use]
    pub fn gather(&self, indices: &[usize]) -> Self {
        fn pick<T: Copy>(column: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().map(|&i| column[i]).collect()
        }
        Self {
            src: pick(&self.src, indices),
            dst: pick(&self.dst, indices),
            weight: self.weight.as_deref().map(|c| pick(c, indices)),
            edge_id: self.edge_id.as_deref().map(|c| pick(c, indices)),
            edge_type: self.edge_type.as_deref().map(|c| pick(c, indices)),
            start_time: self.start_time.as_deref().map(|c| pick(c, indices)),
            end_time: self.end_time.as_deref().map(|c| pick(c, indices)),
        }
    }

    /// Keep rows whose `keep` flag is set
    #[must_use]
    pub fn retain_rows(&self, keep: &[bool]) -> Self {
        let indices: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        self.gather(&indices)
    }

    /// Group rows by destination worker
    ///
    /// `owners[i]` is the worker row `i` goes to. Rows keep their relative
    /// order within each group (stable counting sort).
    #[must_use]
    pub fn split_by_owner(&self, owners: &[usize], workers: usize) -> Vec<Self> {
        let mut counts = vec![0_usize; workers];
        for &owner in owners {
            counts[owner] += 1;
        }
        let mut cursor: Vec<usize> = counts
            .iter()
            .scan(0, |acc, &c| {
                let start = *acc;
                *acc += c;
                Some(start)
            })
            .collect();
        let mut order = vec![0_usize; owners.len()];
        for (row, &owner) in owners.iter().enumerate() {
            order[cursor[owner]] = row;
            cursor[owner] += 1;
        }

        let mut start = 0;
        counts
            .iter()
            .map(|&count| {
                let part = self.gather(&order[start..start + count]);
                start += count;
                part
            })
            .collect()
    }

    /// Append `other`'s rows
    ///
    /// Columns missing from either side are dropped only if both sides lack
    /// them; callers agree on a schema before concatenating.
    pub fn append(&mut self, mut other: Self) {
        fn join<T>(left: &mut Option<Vec<T>>, right: Option<Vec<T>>) {
            if let (Some(l), Some(mut r)) = (left.as_mut(), right) {
                l.append(&mut r);
            }
        }
        self.src.append(&mut other.src);
        self.dst.append(&mut other.dst);
        join(&mut self.weight, other.weight);
        join(&mut self.edge_id, other.edge_id);
        join(&mut self.edge_type, other.edge_type);
        join(&mut self.start_time, other.start_time);
        join(&mut self.end_time, other.end_time);
    }

    /// Concatenate shards sharing `schema`
    #[must_use]
    pub fn concat(parts: Vec<Self>, schema: EdgeSchema) -> Self {
        let total = parts.iter().map(Self::len).sum();
        let mut out = Self::empty(schema);
        out.src.reserve(total);
        out.dst.reserve(total);
        for part in parts {
            out.append(part);
        }
        out
    }

    /// Append the mirror `(dst, src)` of every non-loop edge, attributes duplicated
    pub fn mirror(&mut self) {
        let rows: Vec<usize> = (0..self.len()).filter(|&i| self.src[i] != self.dst[i]).collect();
        let mut mirrored = self.gather(&rows);
        std::mem::swap(&mut mirrored.src, &mut mirrored.dst);
        self.append(mirrored);
    }
}
