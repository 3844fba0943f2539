//! Graph construction pipeline
//!
//! ```text
//! shards ─► agree settings ─► validate ─► renumber ─► symmetrize ─► shuffle by major owner
//!        ─► sort (major, minor) ─► merge parallel edges ─► compress ─► GraphView
//! ```
//!
//! Every stage is collective. A local failure (bad column, missing merge
//! policy, duplicate declaration) is agreed across workers before the next
//! exchange, so either every worker returns a graph or none does.

use crate::comm::Communicator;
use crate::edgelist::{EdgeList, EdgeSchema};
use crate::error::{ConfigError, GraphError, Result, ValidationError};
use crate::partition::{EdgeRouting, PartitionRanges};
use crate::renumber::{renumber_edge_chunks, sorted_unique, RenumberMap};
use crate::shuffle::{agree_schema, shuffle_edge_chunks, shuffle_vertices};
use crate::storage::{CompressedAdjacency, EdgeColumns, GraphView};
use crate::types::{
    EdgeTime, EdgeTypeId, GraphProperties, IdType, MergePolicy, Orientation, Weight,
};
use rayon::prelude::*;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Construction flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Map external ids to a dense internal space; otherwise ids are used as-is
    pub renumber: bool,
    /// Add the mirror of every edge when the graph is undirected
    pub symmetrize: bool,
    /// Row key of the compressed structure
    pub orientation: Orientation,
    /// Parallel-edge policy; required for simple graphs
    pub merge_policy: Option<MergePolicy>,
    /// Run the collective validation pass after assembly
    pub do_expensive_check: bool,
    /// Vertex universe size, skipping the max-id reduction when not renumbering
    ///
    /// With renumbering the universe is only known once ids have been
    /// exchanged, so a mismatch is reported after the renumber collectives.
    pub known_vertex_count: Option<u64>,
    /// Input edge count across all workers, checked in expensive-check mode
    pub known_edge_count: Option<u64>,
    /// Remove `(v, v)` edges before assembly
    pub drop_self_loops: bool,
    /// Endpoints must appear in the explicit vertex list, which some worker
    /// must supply; `do_expensive_check` applies the same check whenever a
    /// list is supplied
    pub strict_vertices: bool,
    /// Attribute columns to keep; columns absent from the input stay absent
    pub retain: EdgeSchema,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            renumber: true,
            symmetrize: true,
            orientation: Orientation::SourceMajor,
            merge_policy: None,
            do_expensive_check: false,
            known_vertex_count: None,
            known_edge_count: None,
            drop_self_loops: false,
            strict_vertices: false,
            retain: EdgeSchema::all(),
        }
    }
}

/// Everything a build returns on one worker
///
/// Each optional column is present if and only if it was supplied and
/// retained. Columns are shared with [`BuildOutput::graph`], not copied.
#[derive(Debug, Clone)]
pub struct BuildOutput<V, E = V, W = f32> {
    /// Local slice of the built graph
    pub graph: GraphView<V, E, W>,
    /// Weights by local edge position
    pub edge_weight: Option<Arc<[W]>>,
    /// Edge ids by local edge position
    pub edge_id: Option<Arc<[E]>>,
    /// Edge types by local edge position
    pub edge_type: Option<Arc<[EdgeTypeId]>>,
    /// Start times by local edge position
    pub edge_start_time: Option<Arc<[EdgeTime]>>,
    /// End times by local edge position
    pub edge_end_time: Option<Arc<[EdgeTime]>>,
    /// This worker's renumber map shard, when renumbering was requested
    pub renumber_map: Option<Arc<RenumberMap<V>>>,
}

/// Builds a partitioned graph from per-worker edge shards
///
/// # Example
///
/// ```
/// use trueno_graph_dist::comm::LocalCluster;
/// use trueno_graph_dist::{EdgeList, GraphBuilder, GraphProperties, MergePolicy};
///
/// let builder = GraphBuilder::new(GraphProperties::undirected()).merge_policy(MergePolicy::Sum);
/// let degrees = LocalCluster::new(2)
///     .run(|comm| {
///         let shard: EdgeList<u64> = EdgeList::new(vec![10, 20], vec![20, 30]);
///         let out = builder.build(comm, vec![shard], None).unwrap();
///         out.graph.local_degrees()
///     })
///     .unwrap();
///
/// // path 10 - 20 - 30, both shards carry the same two edges
/// let total: usize = degrees.iter().flatten().sum();
/// assert_eq!(total, 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    properties: GraphProperties,
    options: BuildOptions,
}

impl GraphBuilder {
    /// Builder with default options
    #[must_use]
    pub fn new(properties: GraphProperties) -> Self {
        Self {
            properties,
            options: BuildOptions::default(),
        }
    }

    /// Replace every option at once
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Graph model flags
    #[must_use]
    pub fn properties(&self) -> GraphProperties {
        self.properties
    }

    /// Current options
    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Enable or disable renumbering
    #[must_use]
    pub fn renumber(mut self, renumber: bool) -> Self {
        self.options.renumber = renumber;
        self
    }

    /// Enable or disable symmetrization of undirected input
    #[must_use]
    pub fn symmetrize(mut self, symmetrize: bool) -> Self {
        self.options.symmetrize = symmetrize;
        self
    }

    /// Row key of the compressed structure
    #[must_use]
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.options.orientation = orientation;
        self
    }

    /// Policy for collapsing parallel edges
    #[must_use]
    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.options.merge_policy = Some(policy);
        self
    }

    /// Enable the collective validation pass
    #[must_use]
    pub fn expensive_check(mut self, enabled: bool) -> Self {
        self.options.do_expensive_check = enabled;
        self
    }

    /// Declare the vertex universe size
    #[must_use]
    pub fn known_vertex_count(mut self, count: u64) -> Self {
        self.options.known_vertex_count = Some(count);
        self
    }

    /// Declare the input edge count across all workers
    #[must_use]
    pub fn known_edge_count(mut self, count: u64) -> Self {
        self.options.known_edge_count = Some(count);
        self
    }

    /// Remove self loops before assembly
    #[must_use]
    pub fn drop_self_loops(mut self, drop: bool) -> Self {
        self.options.drop_self_loops = drop;
        self
    }

    /// Require every endpoint to be in the explicit vertex list
    #[must_use]
    pub fn strict_vertices(mut self, strict: bool) -> Self {
        self.options.strict_vertices = strict;
        self
    }

    /// Attribute columns to keep
    #[must_use]
    pub fn retain(mut self, columns: EdgeSchema) -> Self {
        self.options.retain = columns;
        self
    }

    /// Build this worker's slice of the graph (collective)
    ///
    /// `shards` may hold any number of chunks, including none. `vertices`
    /// optionally declares vertices explicitly; declared vertices without
    /// edges become isolated vertices.
    ///
    /// # Errors
    ///
    /// - [`GraphError::Config`] or [`GraphError::PeerRejected`] when any
    ///   worker's input or options are inconsistent, including workers
    ///   building with different properties or options. A
    ///   `known_vertex_count` that disagrees with the renumbered universe is
    ///   only detected after renumbering
    /// - [`GraphError::Validation`] from the expensive check, or when an
    ///   endpoint is missing from a supplied vertex list under
    ///   `strict_vertices` or `do_expensive_check`
    /// - [`GraphError::Collective`] when an exchange fails
    ///
    /// No graph is returned on any worker if one of them fails.
    pub fn build<V, E, W, C>(
        &self,
        comm: &C,
        shards: Vec<EdgeList<V, E, W>>,
        vertices: Option<Vec<V>>,
    ) -> Result<BuildOutput<V, E, W>>
    where
        V: IdType,
        E: IdType,
        W: Weight,
        C: Communicator,
    {
        let started = Instant::now();
        let options = &self.options;

        self.agree_settings(comm)?;
        let any_declared = comm.all_gather(vertices.is_some())?.contains(&true);
        comm.agree(self.check_input(&shards, any_declared))?;
        let schema =
            agree_schema(comm, shards.first().map(EdgeList::schema))?.intersect(options.retain);
        let mut chunks: Vec<EdgeList<V, E, W>> =
            shards.into_iter().map(|shard| shard.project(schema)).collect();
        let input_edges: usize = chunks.iter().map(EdgeList::len).sum();

        let (ranges, renumber_map) = if options.renumber {
            let check_declared = any_declared && self.checks_declared();
            let map = renumber_edge_chunks(comm, &mut chunks, vertices, check_declared)?;
            if let Some(known) = options.known_vertex_count {
                if known != map.total_vertices() {
                    return Err(ConfigError::InvalidOption {
                        option: "known_vertex_count",
                        reason: format!(
                            "declared {known} vertices, input has {}",
                            map.total_vertices()
                        ),
                    }
                    .into());
                }
            }
            (map.partition().clone(), Some(Arc::new(map)))
        } else {
            (self.vertex_universe(comm, &chunks, vertices, any_declared)?, None)
        };

        if !self.properties.is_directed && options.symmetrize {
            for chunk in &mut chunks {
                chunk.mirror();
            }
        }

        if options.drop_self_loops {
            let mut dropped = 0;
            for chunk in &mut chunks {
                let keep: Vec<bool> = chunk.src.iter().zip(&chunk.dst).map(|(s, d)| s != d).collect();
                let before = chunk.len();
                *chunk = chunk.retain_rows(&keep);
                dropped += before - chunk.len();
            }
            if dropped > 0 {
                warn!(rank = comm.rank(), dropped, "dropped self loops");
            }
        }

        let routing = EdgeRouting::from(options.orientation);
        let local = shuffle_edge_chunks(comm, chunks, &ranges, routing)?;

        let local_range = ranges.local_range(comm.rank());
        let assembled = comm.agree(assemble(local, routing, local_range, self.merge_rule()))?;

        let columns = assembled.columns;
        let graph = GraphView::new(
            self.properties,
            options.orientation,
            ranges,
            comm.rank(),
            assembled.major_ids,
            assembled.adjacency,
            columns.clone(),
            renumber_map.clone(),
        );

        if options.do_expensive_check {
            self.run_expensive_check(comm, &graph, input_edges)?;
        }

        info!(
            rank = comm.rank(),
            vertices = graph.total_vertices(),
            local_vertices = graph.number_of_local_vertices(),
            local_edges = graph.number_of_local_edges(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "graph built"
        );

        Ok(BuildOutput {
            graph,
            edge_weight: columns.weight,
            edge_id: columns.edge_id,
            edge_type: columns.edge_type,
            edge_start_time: columns.start_time,
            edge_end_time: columns.end_time,
            renumber_map,
        })
    }

    /// Merge rule actually applied: multigraphs keep every edge
    fn merge_rule(&self) -> Option<MergePolicy> {
        if self.properties.is_multigraph {
            None
        } else {
            self.options.merge_policy
        }
    }

    /// Endpoints are checked against a supplied vertex list
    fn checks_declared(&self) -> bool {
        self.options.strict_vertices || self.options.do_expensive_check
    }

    /// Every worker must build with the same properties and options
    fn agree_settings<C: Communicator>(&self, comm: &C) -> Result<()> {
        let settings = (
            self.properties,
            BuildOptions {
                merge_policy: self.merge_rule(),
                ..self.options
            },
        );
        let mismatch = comm
            .all_gather(settings)?
            .iter()
            .position(|other| *other != settings)
            .map_or(Ok(()), |rank| {
                Err(ConfigError::InvalidOption {
                    option: "properties",
                    reason: format!(
                        "worker {rank} builds with different graph properties or options"
                    ),
                }
                .into())
            });
        comm.agree(mismatch)
    }

    fn check_input<V, E, W>(&self, shards: &[EdgeList<V, E, W>], any_declared: bool) -> Result<()>
    where
        V: IdType,
        E: IdType,
        W: Weight,
    {
        if !self.properties.is_multigraph && self.options.merge_policy.is_none() {
            return Err(ConfigError::MissingMergePolicy.into());
        }
        if self.options.strict_vertices && !any_declared {
            return Err(ConfigError::InvalidOption {
                option: "strict_vertices",
                reason: "no worker supplied a vertex list".into(),
            }
            .into());
        }
        let first = shards.first().map(EdgeList::schema);
        for shard in shards {
            shard.validate()?;
            if Some(shard.schema()) != first {
                return Err(ConfigError::InvalidOption {
                    option: "chunks",
                    reason: "chunks carry different attribute columns".into(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Partition for ids used as-is: `even` split of `[0, n)` where `n` is
    /// the declared count or one past the largest id on any worker
    fn vertex_universe<V, E, W, C>(
        &self,
        comm: &C,
        chunks: &[EdgeList<V, E, W>],
        vertices: Option<Vec<V>>,
        any_declared: bool,
    ) -> Result<PartitionRanges>
    where
        V: IdType,
        E: IdType,
        W: Weight,
        C: Communicator,
    {
        let known = self.options.known_vertex_count;
        let bound = comm.agree(id_bound(chunks, vertices.as_deref(), known))?;
        let total = match known {
            Some(total) => total,
            None => comm.all_reduce_max(bound)?,
        };
        let ranges = PartitionRanges::even(total, comm.size());

        if any_declared {
            let declared = shuffle_vertices(comm, vertices.unwrap_or_default(), &ranges)?;
            let declared = comm.agree(sorted_unique(declared))?;
            if self.checks_declared() {
                let mut endpoints: Vec<V> = chunks
                    .iter()
                    .flat_map(|chunk| chunk.src.iter().chain(&chunk.dst))
                    .copied()
                    .collect();
                endpoints.sort_unstable();
                endpoints.dedup();
                let owned = shuffle_vertices(comm, endpoints, &ranges)?;
                let check = owned
                    .iter()
                    .find(|v| declared.binary_search(v).is_err())
                    .map_or(Ok(()), |v| {
                        Err(ValidationError::UndeclaredVertex { vertex: v.widen() }.into())
                    });
                comm.agree(check)?;
            }
        }

        debug!(rank = comm.rank(), total, "vertex universe");
        Ok(ranges)
    }

    fn run_expensive_check<V, E, W, C>(
        &self,
        comm: &C,
        graph: &GraphView<V, E, W>,
        input_edges: usize,
    ) -> Result<()>
    where
        V: IdType,
        E: IdType,
        W: Weight,
        C: Communicator,
    {
        comm.agree(check_local_invariants(graph, self.properties.is_multigraph))?;

        if !self.properties.is_directed {
            check_symmetry(comm, graph)?;
        }

        if let Some(declared) = self.options.known_edge_count {
            let actual = comm.all_reduce_sum(input_edges as u64)?;
            if declared != actual {
                return Err(ValidationError::EdgeCount { declared, actual }.into());
            }
        }

        debug!(rank = comm.rank(), "expensive check passed");
        Ok(())
    }
}

/// One past the largest id in the input, checked against `known`
fn id_bound<V: IdType, E: IdType, W: Weight>(
    chunks: &[EdgeList<V, E, W>],
    vertices: Option<&[V]>,
    known: Option<u64>,
) -> Result<u64> {
    let columns = chunks
        .iter()
        .flat_map(|chunk| [("src", &chunk.src), ("dst", &chunk.dst)]);
    let mut bound = 0_u64;
    let mut observe = |field: &'static str, v: V| -> Result<()> {
        let index = v.to_u64().ok_or(ConfigError::InvalidIdentifier {
            field,
            value: v.widen(),
        })?;
        if let Some(total) = known {
            if index >= total {
                return Err(GraphError::VertexOutOfRange {
                    vertex: v.widen(),
                    total,
                });
            }
        }
        bound = bound.max(index + 1);
        Ok(())
    };
    for (field, column) in columns {
        for &v in column {
            observe(field, v)?;
        }
    }
    for &v in vertices.unwrap_or_default() {
        observe("vertices", v)?;
    }
    Ok(bound)
}

/// Sorted, merged and compressed local edges
struct Assembled<V, E, W> {
    major_ids: Vec<V>,
    adjacency: CompressedAdjacency<V>,
    columns: EdgeColumns<E, W>,
}

fn assemble<V, E, W>(
    edges: EdgeList<V, E, W>,
    routing: EdgeRouting,
    local_range: Range<u64>,
    merge: Option<MergePolicy>,
) -> Result<Assembled<V, E, W>>
where
    V: IdType,
    E: IdType,
    W: Weight,
{
    let keys = edges
        .src
        .iter()
        .zip(&edges.dst)
        .map(|(&s, &d)| {
            let (major, minor) = routing.split(s, d);
            Ok((internal_index(major)?, internal_index(minor)?))
        })
        .collect::<Result<Vec<(u64, u64)>>>()?;

    // Stable: parallel edges keep their arrival order
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.par_sort_by_key(|&i| keys[i]);
    let edges = edges.gather(&order);
    let keys: Vec<(u64, u64)> = order.iter().map(|&i| keys[i]).collect();

    let before = edges.len();
    let (edges, keys) = match merge {
        Some(policy) => merge_parallel_edges(edges, &keys, policy),
        None => (edges, keys),
    };
    if edges.len() != before {
        debug!(before, after = edges.len(), ?merge, "merged parallel edges");
    }

    let rows = usize::try_from(local_range.end - local_range.start)
        .map_err(|_| GraphError::collective("local vertex range exceeds usize"))?;
    let rows_of = keys
        .iter()
        .map(|&(major, _)| {
            if !local_range.contains(&major) {
                return Err(GraphError::collective(format!(
                    "edge keyed by vertex {major} delivered to the owner of {local_range:?}"
                )));
            }
            usize::try_from(major - local_range.start)
                .map_err(|_| GraphError::collective("row index exceeds usize"))
        })
        .collect::<Result<Vec<usize>>>()?;

    let major_ids = local_range
        .clone()
        .map(|v| {
            V::from_u64(v).ok_or_else(|| {
                ConfigError::InvalidIdentifier {
                    field: "internal vertex id",
                    value: i128::from(v),
                }
                .into()
            })
        })
        .collect::<Result<Vec<V>>>()?;

    let EdgeList {
        src,
        dst,
        weight,
        edge_id,
        edge_type,
        start_time,
        end_time,
    } = edges;
    let minors = match routing {
        EdgeRouting::SourceOwner => dst,
        EdgeRouting::DestinationOwner => src,
    };

    Ok(Assembled {
        major_ids,
        adjacency: CompressedAdjacency::from_sorted(&rows_of, minors, rows),
        columns: EdgeColumns {
            weight: weight.map(Arc::from),
            edge_id: edge_id.map(Arc::from),
            edge_type: edge_type.map(Arc::from),
            start_time: start_time.map(Arc::from),
            end_time: end_time.map(Arc::from),
        },
    })
}

fn internal_index<V: IdType>(v: V) -> Result<u64> {
    v.to_u64().ok_or_else(|| {
        ConfigError::InvalidIdentifier {
            field: "endpoint",
            value: v.widen(),
        }
        .into()
    })
}

/// Collapse runs of equal `(major, minor)` keys into one edge
///
/// Sum and First keep the first edge's other attributes; Min and Max keep
/// the selected edge's, the earliest winning ties. Without a weight column
/// every policy keeps the first edge.
fn merge_parallel_edges<V, E, W>(
    edges: EdgeList<V, E, W>,
    keys: &[(u64, u64)],
    policy: MergePolicy,
) -> (EdgeList<V, E, W>, Vec<(u64, u64)>)
where
    V: IdType,
    E: IdType,
    W: Weight,
{
    let weights = edges.weight.as_deref();
    let mut keep = Vec::with_capacity(keys.len());
    let mut sums = Vec::new();

    let mut start = 0;
    while start < keys.len() {
        let end = start + keys[start..].iter().take_while(|&&k| k == keys[start]).count();
        let chosen = match (policy, weights) {
            (MergePolicy::Min, Some(w)) => {
                (start + 1..end).fold(start, |best, i| if w[i] < w[best] { i } else { best })
            }
            (MergePolicy::Max, Some(w)) => {
                (start + 1..end).fold(start, |best, i| if w[i] > w[best] { i } else { best })
            }
            _ => start,
        };
        if let (MergePolicy::Sum, Some(w)) = (policy, weights) {
            sums.push(w[start + 1..end].iter().fold(w[start], |acc, &x| acc.sum(x)));
        }
        keep.push(chosen);
        start = end;
    }

    let mut merged = edges.gather(&keep);
    if policy == MergePolicy::Sum && merged.weight.is_some() {
        merged.weight = Some(sums);
    }
    let keys = keep.iter().map(|&i| keys[i]).collect();
    (merged, keys)
}

fn check_local_invariants<V, E, W>(graph: &GraphView<V, E, W>, is_multigraph: bool) -> Result<()>
where
    V: IdType,
    E: IdType,
    W: Weight,
{
    graph
        .adjacency()
        .check_offsets()
        .map_err(ValidationError::MalformedOffsets)?;

    let total = graph.total_vertices();
    let mut previous: Option<(V, V)> = None;
    for (src, dst, _) in graph.edges() {
        for v in [src, dst] {
            if v.to_u64().map_or(true, |i| i >= total) {
                return Err(ValidationError::EndpointOutOfRange {
                    vertex: v.bits(),
                    total,
                }
                .into());
            }
        }
        if !is_multigraph && previous == Some((src, dst)) {
            return Err(ValidationError::DuplicateEdge {
                src: src.bits(),
                dst: dst.bits(),
            }
            .into());
        }
        previous = Some((src, dst));
    }
    Ok(())
}

/// Every stored `(u, v)` must have `(v, u)` stored on the worker owning its row
fn check_symmetry<V, E, W, C>(comm: &C, graph: &GraphView<V, E, W>) -> Result<()>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
{
    let routing = EdgeRouting::from(graph.orientation());
    let edges: Vec<(V, V)> = graph.edges().map(|(s, d, _)| (s, d)).collect();

    let owners = comm.agree(
        edges
            .iter()
            .map(|&(s, d)| routing.owner_of_edge(graph.partition(), d, s))
            .collect::<Result<Vec<usize>>>(),
    )?;

    let mut questions: Vec<Vec<(V, V)>> = vec![Vec::new(); comm.size()];
    let mut asked: Vec<Vec<usize>> = vec![Vec::new(); comm.size()];
    for (i, (&(s, d), &owner)) in edges.iter().zip(&owners).enumerate() {
        questions[owner].push((d, s));
        asked[owner].push(i);
    }

    let replies: Vec<Vec<bool>> = comm
        .all_to_all(questions)?
        .into_iter()
        .map(|pairs| {
            pairs
                .into_iter()
                .map(|(s, d)| {
                    let (major, minor) = routing.split(s, d);
                    graph
                        .neighbors(major)
                        .is_ok_and(|row| row.binary_search(&minor).is_ok())
                })
                .collect()
        })
        .collect();

    let mut missing = None;
    for (answers, positions) in comm.all_to_all(replies)?.into_iter().zip(asked) {
        if answers.len() != positions.len() {
            return Err(GraphError::collective("symmetry reply length mismatch"));
        }
        if let Some((_, &i)) = answers.iter().zip(&positions).find(|(found, _)| !**found) {
            missing = Some(edges[i]);
            break;
        }
    }

    comm.agree(missing.map_or(Ok(()), |(src, dst)| {
        Err(ValidationError::MissingMirror {
            src: src.bits(),
            dst: dst.bits(),
        }
        .into())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalCluster, SingleWorker};

    fn scenario() -> EdgeList<i32> {
        EdgeList::new(vec![0, 1, 1, 2, 2, 2, 3, 4], vec![1, 3, 4, 0, 1, 3, 5, 5])
            .with_weights(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0])
    }

    fn neighbor_weights(out: &BuildOutput<i32>, v: i32) -> Vec<(i32, f32)> {
        let range = out.graph.edge_range(v).unwrap();
        let neighbors = out.graph.neighbors(v).unwrap();
        neighbors
            .iter()
            .zip(range)
            .map(|(&n, pos)| (n, out.graph.weight(pos).unwrap()))
            .collect()
    }

    #[test]
    fn test_missing_merge_policy_is_config_error() {
        let err = GraphBuilder::new(GraphProperties::directed())
            .build(&SingleWorker, vec![scenario()], None)
            .unwrap_err();
        assert!(matches!(err, GraphError::Config(ConfigError::MissingMergePolicy)));

        // multigraphs do not need one
        GraphBuilder::new(GraphProperties::directed().with_multigraph(true))
            .build(&SingleWorker, vec![scenario()], None)
            .unwrap();
    }

    #[test]
    fn test_directed_out_neighbors_with_weights() {
        let out = GraphBuilder::new(GraphProperties::directed())
            .merge_policy(MergePolicy::First)
            .expensive_check(true)
            .build(&SingleWorker, vec![scenario()], None)
            .unwrap();

        assert_eq!(neighbor_weights(&out, 2), vec![(0, 3.0), (1, 4.0), (3, 5.0)]);
        assert_eq!(out.graph.number_of_local_edges(), 8);
        let map = out.renumber_map.as_ref().unwrap();
        assert_eq!(map.local_external_ids(), &[0, 1, 2, 3, 4, 5]);
        assert!(out.edge_id.is_none());
        assert!(out.edge_weight.is_some());
    }

    #[test]
    fn test_undirected_symmetrizes() {
        let out = GraphBuilder::new(GraphProperties::undirected())
            .merge_policy(MergePolicy::First)
            .expensive_check(true)
            .build(&SingleWorker, vec![scenario()], None)
            .unwrap();
        // out-edges 3 and 4, mirrored in-edges from 0 and 2
        assert_eq!(out.graph.neighbors(1).unwrap(), &[0, 2, 3, 4]);
        assert_eq!(out.graph.number_of_local_edges(), 16);
    }

    #[test]
    fn test_merge_policies() {
        let parallel = || -> EdgeList<u32, u32, f64> {
            EdgeList::new(vec![0, 0, 0, 1], vec![1, 1, 1, 0])
                .with_weights(vec![2.0, 1.0, 5.0, 1.0])
                .with_edge_ids(vec![100, 101, 102, 103])
        };
        let build = |policy| {
            GraphBuilder::new(GraphProperties::directed())
                .renumber(false)
                .merge_policy(policy)
                .build(&SingleWorker, vec![parallel()], None)
                .unwrap()
        };

        let sum = build(MergePolicy::Sum);
        assert_eq!(sum.graph.number_of_local_edges(), 2);
        assert_eq!(sum.graph.weight(0), Some(8.0));
        assert_eq!(sum.graph.edge_id(0), Some(100));

        let min = build(MergePolicy::Min);
        assert_eq!(min.graph.weight(0), Some(1.0));
        assert_eq!(min.graph.edge_id(0), Some(101));

        let max = build(MergePolicy::Max);
        assert_eq!(max.graph.edge_id(0), Some(102));

        let first = build(MergePolicy::First);
        assert_eq!(first.graph.weight(0), Some(2.0));
    }

    #[test]
    fn test_destination_major_stores_in_neighbors() {
        let out = GraphBuilder::new(GraphProperties::directed())
            .orientation(Orientation::DestinationMajor)
            .merge_policy(MergePolicy::First)
            .build(&SingleWorker, vec![scenario()], None)
            .unwrap();
        // in-neighbors of 5 are 3 and 4 with weights 6 and 7
        assert_eq!(neighbor_weights(&out, 5), vec![(3, 6.0), (4, 7.0)]);
        assert!(out.graph.edges().any(|(s, d, _)| (s, d) == (2, 0)));
    }

    #[test]
    fn test_without_renumber_uses_known_vertex_count() {
        let edges: EdgeList<u64> = EdgeList::new(vec![0], vec![1]);
        let out = GraphBuilder::new(GraphProperties::directed())
            .renumber(false)
            .known_vertex_count(10)
            .merge_policy(MergePolicy::First)
            .build(&SingleWorker, vec![edges], None)
            .unwrap();
        assert_eq!(out.graph.total_vertices(), 10);
        assert!(out.renumber_map.is_none());
        assert_eq!(out.graph.degree(9).unwrap(), 0);

        let edges: EdgeList<u64> = EdgeList::new(vec![0], vec![12]);
        let err = GraphBuilder::new(GraphProperties::directed())
            .renumber(false)
            .known_vertex_count(10)
            .merge_policy(MergePolicy::First)
            .build(&SingleWorker, vec![edges], None)
            .unwrap_err();
        assert!(matches!(err, GraphError::VertexOutOfRange { vertex: 12, total: 10 }));
    }

    #[test]
    fn test_known_vertex_count_checked_after_renumbering() {
        let err = GraphBuilder::new(GraphProperties::directed())
            .known_vertex_count(5)
            .merge_policy(MergePolicy::First)
            .build(&SingleWorker, vec![scenario()], None)
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Config(ConfigError::InvalidOption { option: "known_vertex_count", .. })
        ));
    }

    #[test]
    fn test_negative_id_without_renumber() {
        let edges: EdgeList<i64> = EdgeList::new(vec![-1], vec![1]);
        let err = GraphBuilder::new(GraphProperties::directed().with_multigraph(true))
            .renumber(false)
            .build(&SingleWorker, vec![edges], None)
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_drop_self_loops_and_retain() {
        let edges: EdgeList<u32> = EdgeList::new(vec![0, 1, 1], vec![0, 2, 1])
            .with_weights(vec![1.0, 2.0, 3.0])
            .with_edge_ids(vec![7, 8, 9]);
        let out = GraphBuilder::new(GraphProperties::directed())
            .merge_policy(MergePolicy::First)
            .drop_self_loops(true)
            .retain(EdgeSchema {
                edge_id: true,
                ..EdgeSchema::default()
            })
            .build(&SingleWorker, vec![edges], None)
            .unwrap();
        assert_eq!(out.graph.number_of_local_edges(), 1);
        assert!(out.edge_weight.is_none());
        assert_eq!(out.edge_id.as_deref(), Some(&[8][..]));
    }

    #[test]
    fn test_known_edge_count_mismatch() {
        let err = GraphBuilder::new(GraphProperties::directed())
            .merge_policy(MergePolicy::First)
            .expensive_check(true)
            .known_edge_count(9)
            .build(&SingleWorker, vec![scenario()], None)
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::EdgeCount { declared: 9, actual: 8 })
        ));
    }

    #[test]
    fn test_undirected_without_symmetrize_fails_check() {
        let err = GraphBuilder::new(GraphProperties::undirected())
            .symmetrize(false)
            .merge_policy(MergePolicy::First)
            .expensive_check(true)
            .build(&SingleWorker, vec![scenario()], None)
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(ValidationError::MissingMirror { .. })));
    }

    #[test]
    fn test_symmetry_check_across_workers() {
        let results = LocalCluster::new(3)
            .run(|comm| {
                // ring 0 → 1 → ... → 8 → 0, split across workers
                let base = comm.rank() as u32 * 3;
                let src: Vec<u32> = (base..base + 3).collect();
                let dst: Vec<u32> = src.iter().map(|v| (v + 1) % 9).collect();
                GraphBuilder::new(GraphProperties::undirected())
                    .renumber(false)
                    .merge_policy(MergePolicy::First)
                    .expensive_check(true)
                    .build(comm, vec![EdgeList::<u32>::new(src, dst)], None)
                    .map(|out| out.graph.local_degrees())
            })
            .unwrap();
        for degrees in results {
            assert!(degrees.unwrap().iter().all(|&d| d == 2));
        }
    }

    #[test]
    fn test_config_error_on_one_worker_fails_all() {
        let results = LocalCluster::new(2)
            .run(|comm| {
                let shard: EdgeList<u32> = if comm.rank() == 0 {
                    EdgeList::new(vec![0, 1], vec![1])
                } else {
                    EdgeList::new(vec![2], vec![3])
                };
                GraphBuilder::new(GraphProperties::directed())
                    .merge_policy(MergePolicy::First)
                    .build(comm, vec![shard], None)
                    .map(|_| ())
            })
            .unwrap();
        assert!(results[0].as_ref().is_err_and(GraphError::is_config));
        assert!(matches!(results[1], Err(GraphError::PeerRejected { rank: 0, .. })));
    }

    #[test]
    fn test_workers_must_agree_on_properties() {
        let results = LocalCluster::new(2)
            .run(|comm| {
                let properties = if comm.rank() == 0 {
                    GraphProperties::directed()
                } else {
                    GraphProperties::undirected()
                };
                let shard: EdgeList<u32> = EdgeList::new(vec![comm.rank() as u32], vec![2]);
                GraphBuilder::new(properties)
                    .renumber(false)
                    .merge_policy(MergePolicy::First)
                    .expensive_check(true)
                    .build(comm, vec![shard], None)
                    .map(|_| ())
            })
            .unwrap();
        for result in results {
            assert!(matches!(
                result,
                Err(GraphError::Config(ConfigError::InvalidOption { option: "properties", .. }))
            ));
        }
    }

    #[test]
    fn test_options_differing_only_in_policy_of_a_multigraph_agree() {
        // the policy is unused for multigraphs, so it does not count as a difference
        let results = LocalCluster::new(2)
            .run(|comm| {
                let mut builder = GraphBuilder::new(GraphProperties::directed().with_multigraph(true));
                if comm.rank() == 0 {
                    builder = builder.merge_policy(MergePolicy::Sum);
                }
                let shard: EdgeList<u32> = EdgeList::new(vec![0], vec![1]);
                builder.build(comm, vec![shard], None).map(|out| out.graph.number_of_edges(comm))
            })
            .unwrap();
        for result in results {
            assert_eq!(result.unwrap().unwrap(), 2);
        }
    }

    #[test]
    fn test_expensive_check_rejects_undeclared_endpoint() {
        for renumber in [true, false] {
            let edges: EdgeList<u32> = EdgeList::new(vec![0], vec![7]);
            let err = GraphBuilder::new(GraphProperties::directed())
                .renumber(renumber)
                .merge_policy(MergePolicy::First)
                .expensive_check(true)
                .build(&SingleWorker, vec![edges], Some(vec![0, 1]))
                .unwrap_err();
            assert!(
                matches!(err, GraphError::Validation(ValidationError::UndeclaredVertex { vertex: 7 })),
                "renumber = {renumber}: {err}"
            );
        }

        // without the check, undeclared endpoints join the universe
        let edges: EdgeList<u32> = EdgeList::new(vec![0], vec![7]);
        let out = GraphBuilder::new(GraphProperties::directed())
            .merge_policy(MergePolicy::First)
            .build(&SingleWorker, vec![edges], Some(vec![0, 1]))
            .unwrap();
        assert_eq!(out.graph.total_vertices(), 3);
    }

    #[test]
    fn test_strict_vertices_requires_a_list() {
        for renumber in [true, false] {
            let edges: EdgeList<u32> = EdgeList::new(vec![0], vec![1]);
            let err = GraphBuilder::new(GraphProperties::directed())
                .renumber(renumber)
                .merge_policy(MergePolicy::First)
                .strict_vertices(true)
                .build(&SingleWorker, vec![edges], None)
                .unwrap_err();
            assert!(matches!(
                err,
                GraphError::Config(ConfigError::InvalidOption { option: "strict_vertices", .. })
            ));
        }
    }

    /// Single-worker view over `[0, total)` with rows `0..adjacency.num_rows()`
    fn hand_built(adjacency: CompressedAdjacency<u32>, total: u64) -> GraphView<u32> {
        let rows = u32::try_from(adjacency.num_rows()).unwrap();
        GraphView::new(
            GraphProperties::directed(),
            Orientation::SourceMajor,
            PartitionRanges::even(total, 1),
            0,
            (0..rows).collect(),
            adjacency,
            EdgeColumns {
                weight: None,
                edge_id: None,
                edge_type: None,
                start_time: None,
                end_time: None,
            },
            None,
        )
    }

    #[test]
    fn test_local_invariants_reject_duplicate_edge() {
        let graph = hand_built(CompressedAdjacency::from_sorted(&[0, 0], vec![1, 1], 2), 2);
        let err = check_local_invariants(&graph, false).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::DuplicateEdge { src: 0, dst: 1 })
        ));
        // parallel edges are legal in a multigraph
        check_local_invariants(&graph, true).unwrap();
    }

    #[test]
    fn test_local_invariants_reject_out_of_range_neighbor() {
        let graph = hand_built(CompressedAdjacency::from_sorted(&[0], vec![5], 2), 2);
        let err = check_local_invariants(&graph, false).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::EndpointOutOfRange { vertex: 5, total: 2 })
        ));
    }

    #[test]
    fn test_local_invariants_reject_malformed_offsets() {
        let graph = hand_built(CompressedAdjacency::from_raw_parts(vec![0, 2, 1], vec![1]), 2);
        let err = check_local_invariants(&graph, false).unwrap_err();
        match err {
            GraphError::Validation(ValidationError::MalformedOffsets(reason)) => {
                assert!(reason.contains("row 1"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }

        let well_formed = hand_built(CompressedAdjacency::from_sorted(&[0, 1], vec![1, 0], 2), 2);
        check_local_invariants(&well_formed, false).unwrap();
    }
}
