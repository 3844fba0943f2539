//! Read-only handle over one worker's slice of a built graph

use super::csr::CompressedAdjacency;
use crate::comm::Communicator;
use crate::error::{GraphError, Result};
use crate::partition::PartitionRanges;
use crate::renumber::RenumberMap;
use crate::types::{EdgeTime, EdgeTypeId, GraphProperties, IdType, Orientation, Weight};
use std::ops::Range;
use std::sync::Arc;

/// Per-edge property columns, aligned with the adjacency's neighbor array
#[derive(Debug, Clone)]
pub(crate) struct EdgeColumns<E, W> {
    pub(crate) weight: Option<Arc<[W]>>,
    pub(crate) edge_id: Option<Arc<[E]>>,
    pub(crate) edge_type: Option<Arc<[EdgeTypeId]>>,
    pub(crate) start_time: Option<Arc<[EdgeTime]>>,
    pub(crate) end_time: Option<Arc<[EdgeTime]>>,
}

/// Immutable graph slice owned by one worker
///
/// Rows are the worker's owned major vertices (sources for
/// [`Orientation::SourceMajor`], destinations for
/// [`Orientation::DestinationMajor`]). Edge positions index the neighbor
/// array and every property column.
///
/// # Example
///
/// ```
/// use trueno_graph_dist::comm::SingleWorker;
/// use trueno_graph_dist::{EdgeList, GraphBuilder, GraphProperties, MergePolicy};
///
/// let edges: EdgeList<i32> = EdgeList::new(vec![0, 0, 1], vec![1, 2, 2]);
/// let out = GraphBuilder::new(GraphProperties::directed())
///     .merge_policy(MergePolicy::First)
///     .build(&SingleWorker, vec![edges], None)
///     .unwrap();
///
/// assert_eq!(out.graph.neighbors(0).unwrap(), &[1, 2]);
/// assert_eq!(out.graph.degree(2).unwrap(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct GraphView<V, E = V, W = f32> {
    properties: GraphProperties,
    orientation: Orientation,
    partition: PartitionRanges,
    rank: usize,
    /// Internal id of every local row, checked to fit `V` at build time
    major_ids: Vec<V>,
    adjacency: CompressedAdjacency<V>,
    columns: EdgeColumns<E, W>,
    renumber_map: Option<Arc<RenumberMap<V>>>,
}

impl<V: IdType, E: IdType, W: Weight> GraphView<V, E, W> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        properties: GraphProperties,
        orientation: Orientation,
        partition: PartitionRanges,
        rank: usize,
        major_ids: Vec<V>,
        adjacency: CompressedAdjacency<V>,
        columns: EdgeColumns<E, W>,
        renumber_map: Option<Arc<RenumberMap<V>>>,
    ) -> Self {
        debug_assert_eq!(major_ids.len(), adjacency.num_rows());
        Self {
            properties,
            orientation,
            partition,
            rank,
            major_ids,
            adjacency,
            columns,
            renumber_map,
        }
    }

    /// Directed/multigraph flags the graph was built with
    #[must_use]
    pub fn properties(&self) -> GraphProperties {
        self.properties
    }

    /// Which endpoint keys the rows
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Internal-id partition shared by every worker
    #[must_use]
    pub fn partition(&self) -> &PartitionRanges {
        &self.partition
    }

    /// Rank of the worker holding this slice
    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Internal ids owned by this worker
    #[must_use]
    pub fn local_vertex_range(&self) -> Range<u64> {
        self.partition.local_range(self.rank)
    }

    /// Vertex count across all workers
    #[must_use]
    pub fn total_vertices(&self) -> u64 {
        self.partition.total_vertices()
    }

    /// Number of locally owned vertices
    #[must_use]
    pub fn number_of_local_vertices(&self) -> usize {
        self.adjacency.num_rows()
    }

    /// Number of edges stored on this worker
    #[must_use]
    pub fn number_of_local_edges(&self) -> usize {
        self.adjacency.num_edges()
    }

    /// Number of stored edges across all workers (collective)
    ///
    /// An undirected graph stores both directions of every non-loop edge, so
    /// this counts each of them.
    ///
    /// # Errors
    ///
    /// Propagates exchange failures
    pub fn number_of_edges<C: Communicator>(&self, comm: &C) -> Result<u64> {
        comm.all_reduce_sum(self.number_of_local_edges() as u64)
    }

    /// Compressed structure backing this slice
    #[must_use]
    pub fn adjacency(&self) -> &CompressedAdjacency<V> {
        &self.adjacency
    }

    fn row_of(&self, vertex: V) -> Result<usize> {
        let total = self.total_vertices();
        let index = vertex
            .to_u64()
            .filter(|&v| v < total)
            .ok_or(GraphError::VertexOutOfRange {
                vertex: vertex.widen(),
                total,
            })?;
        let range = self.local_vertex_range();
        if !range.contains(&index) {
            return Err(GraphError::NotLocal {
                vertex: vertex.widen(),
                rank: self.rank,
            });
        }
        usize::try_from(index - range.start).map_err(|_| GraphError::NotLocal {
            vertex: vertex.widen(),
            rank: self.rank,
        })
    }

    /// Neighbors of a locally owned vertex, ascending
    ///
    /// Out-neighbors for source-major graphs, in-neighbors for
    /// destination-major graphs.
    ///
    /// # Errors
    ///
    /// [`GraphError::VertexOutOfRange`] outside the universe,
    /// [`GraphError::NotLocal`] for a vertex owned by another worker
    pub fn neighbors(&self, vertex: V) -> Result<&[V]> {
        Ok(self.adjacency.row(self.row_of(vertex)?))
    }

    /// Degree of a locally owned vertex
    ///
    /// # Errors
    ///
    /// As [`GraphView::neighbors`]
    pub fn degree(&self, vertex: V) -> Result<usize> {
        Ok(self.adjacency.degree(self.row_of(vertex)?))
    }

    /// Edge positions of a locally owned vertex
    ///
    /// # Errors
    ///
    /// As [`GraphView::neighbors`]
    pub fn edge_range(&self, vertex: V) -> Result<Range<usize>> {
        Ok(self.adjacency.edge_range(self.row_of(vertex)?))
    }

    /// Degrees of all local vertices, in internal-id order
    #[must_use]
    pub fn local_degrees(&self) -> Vec<usize> {
        (0..self.adjacency.num_rows())
            .map(|row| self.adjacency.degree(row))
            .collect()
    }

    /// Weight at edge position `position`
    #[must_use]
    pub fn weight(&self, position: usize) -> Option<W> {
        self.columns.weight.as_deref()?.get(position).copied()
    }

    /// Edge id at edge position `position`
    #[must_use]
    pub fn edge_id(&self, position: usize) -> Option<E> {
        self.columns.edge_id.as_deref()?.get(position).copied()
    }

    /// Edge type at edge position `position`
    #[must_use]
    pub fn edge_type(&self, position: usize) -> Option<EdgeTypeId> {
        self.columns.edge_type.as_deref()?.get(position).copied()
    }

    /// Start time at edge position `position`
    #[must_use]
    pub fn start_time(&self, position: usize) -> Option<EdgeTime> {
        self.columns.start_time.as_deref()?.get(position).copied()
    }

    /// End time at edge position `position`
    #[must_use]
    pub fn end_time(&self, position: usize) -> Option<EdgeTime> {
        self.columns.end_time.as_deref()?.get(position).copied()
    }

    /// Whole weight column, if retained
    #[must_use]
    pub fn weights(&self) -> Option<&[W]> {
        self.columns.weight.as_deref()
    }

    /// Every local edge as `(src, dst, position)`
    ///
    /// Endpoints are reported in edge direction whatever the orientation.
    pub fn edges(&self) -> impl Iterator<Item = (V, V, usize)> + '_ {
        let orientation = self.orientation;
        self.major_ids.iter().enumerate().flat_map(move |(row, &major)| {
            let range = self.adjacency.edge_range(row);
            let start = range.start;
            self.adjacency.row(row).iter().enumerate().map(move |(i, &minor)| {
                let (src, dst) = match orientation {
                    Orientation::SourceMajor => (major, minor),
                    Orientation::DestinationMajor => (minor, major),
                };
                (src, dst, start + i)
            })
        })
    }

    /// Renumber map shard, if the graph was renumbered
    #[must_use]
    pub fn renumber_map(&self) -> Option<&Arc<RenumberMap<V>>> {
        self.renumber_map.as_ref()
    }
}
