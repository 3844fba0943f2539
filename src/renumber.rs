//! Renumbering of external vertex ids into a dense, partitioned id space
//!
//! # Algorithm
//!
//! 1. Every worker collects the distinct endpoints of its shard (plus any
//!    explicitly declared vertices) and ships them to their hash owner.
//! 2. Each owner sorts and deduplicates what it received; its vertex count is
//!    all-gathered, and the prefix sum in rank order becomes the
//!    [`PartitionRanges`] table. Owner `r` numbers its ids
//!    `boundary[r-1]..boundary[r]` in ascending external order.
//! 3. The owner keeps both directions of the mapping for its ids.
//! 4. Workers look up the internal id of each distinct endpoint from its
//!    owner and rewrite `src`/`dst` in place.
//!
//! The hash owner of an external id is also the range owner of its internal
//! id, so a single [`RenumberMap`] shard answers both directions.

use crate::comm::Communicator;
use crate::edgelist::EdgeList;
use crate::error::{ConfigError, GraphError, Result, ValidationError};
use crate::partition::{HashPartition, PartitionRanges, VertexPartition};
use crate::shuffle::shuffle_vertices;
use crate::types::{IdType, Weight};
use fxhash::{FxHashMap, FxHashSet};
use std::ops::Range;
use tracing::debug;

/// One worker's shard of the external/internal vertex mapping
///
/// Immutable once built. Shared with graph views through an `Arc`.
#[derive(Debug, Clone)]
pub struct RenumberMap<V> {
    rank: usize,
    ranges: PartitionRanges,
    /// `internal - local_range.start` -> external
    local_external: Vec<V>,
    /// external -> internal, owned ids only
    external_to_internal: FxHashMap<V, u64>,
}

impl<V: IdType> RenumberMap<V> {
    /// Partition table of the internal id space
    #[must_use]
    pub fn partition(&self) -> &PartitionRanges {
        &self.ranges
    }

    /// Internal ids owned by this worker
    #[must_use]
    pub fn local_range(&self) -> Range<u64> {
        self.ranges.local_range(self.rank)
    }

    /// Vertices numbered by this worker
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.local_external.len()
    }

    /// Vertex count across all workers
    #[must_use]
    pub fn total_vertices(&self) -> u64 {
        self.ranges.total_vertices()
    }

    /// External ids of the local range, in internal-id order
    #[must_use]
    pub fn local_external_ids(&self) -> &[V] {
        &self.local_external
    }

    /// External id of a locally owned internal id
    #[must_use]
    pub fn local_to_external(&self, internal: u64) -> Option<V> {
        let start = self.local_range().start;
        let offset = usize::try_from(internal.checked_sub(start)?).ok()?;
        self.local_external.get(offset).copied()
    }

    /// Internal id of a locally owned external id
    #[must_use]
    pub fn external_to_internal_local(&self, external: V) -> Option<u64> {
        self.external_to_internal.get(&external).copied()
    }

    /// Translate internal ids to external ids (collective)
    ///
    /// # Errors
    ///
    /// Fails on every worker if any worker asks for an id outside
    /// `[0, total_vertices())`; exchange failures are collective errors.
    pub fn to_external<C: Communicator>(&self, comm: &C, internal: &[V]) -> Result<Vec<V>> {
        let owners = comm.agree(
            internal
                .iter()
                .map(|&v| VertexPartition::<V>::owner_of(&self.ranges, v))
                .collect::<Result<Vec<_>>>(),
        )?;
        let answers = self.query(comm, internal, &owners, |v| {
            v.to_u64().and_then(|i| self.local_to_external(i))
        })?;
        answers
            .into_iter()
            .zip(internal)
            .map(|(answer, &v)| answer.ok_or(GraphError::UnknownVertex { vertex: v.widen() }))
            .collect()
    }

    /// Translate external ids to internal ids (collective)
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownVertex`] on the asking worker for ids
    /// that were never numbered.
    pub fn to_internal<C: Communicator>(&self, comm: &C, external: &[V]) -> Result<Vec<u64>> {
        self.lookup_internal(comm, external)?
            .into_iter()
            .zip(external)
            .map(|(answer, &v)| answer.ok_or(GraphError::UnknownVertex { vertex: v.widen() }))
            .collect()
    }

    /// Full internal -> external table, replicated on every worker (collective)
    ///
    /// Intended for result reporting and tests; the table is `O(V)` per worker.
    ///
    /// # Errors
    ///
    /// Propagates exchange failures
    pub fn gather<C: Communicator>(&self, comm: &C) -> Result<Vec<V>> {
        Ok(comm
            .all_gather(self.local_external.clone())?
            .into_iter()
            .flatten()
            .collect())
    }

    fn lookup_internal<C: Communicator>(&self, comm: &C, external: &[V]) -> Result<Vec<Option<u64>>> {
        let hash = HashPartition::new(comm.size());
        let owners = external
            .iter()
            .map(|&v| hash.owner_of(v))
            .collect::<Result<Vec<_>>>()?;
        self.query(comm, external, &owners, |v| self.external_to_internal_local(v))
    }

    /// Ask each id's owner to answer `answer(id)`; results come back aligned with `ids`
    fn query<T, F, C: Communicator>(
        &self,
        comm: &C,
        ids: &[V],
        owners: &[usize],
        answer: F,
    ) -> Result<Vec<Option<T>>>
    where
        T: Send + 'static,
        F: Fn(V) -> Option<T>,
    {
        let workers = comm.size();
        let mut questions: Vec<Vec<V>> = vec![Vec::new(); workers];
        let mut positions: Vec<Vec<usize>> = vec![Vec::new(); workers];
        for (pos, (&id, &owner)) in ids.iter().zip(owners).enumerate() {
            questions[owner].push(id);
            positions[owner].push(pos);
        }

        let received = comm.all_to_all(questions)?;
        let replies: Vec<Vec<Option<T>>> = received
            .into_iter()
            .map(|asked| asked.into_iter().map(&answer).collect())
            .collect();
        let answers = comm.all_to_all(replies)?;

        let mut out: Vec<Option<T>> = (0..ids.len()).map(|_| None).collect();
        for (owner_answers, owner_positions) in answers.into_iter().zip(positions) {
            if owner_answers.len() != owner_positions.len() {
                return Err(GraphError::collective("lookup reply length mismatch"));
            }
            for (answer, pos) in owner_answers.into_iter().zip(owner_positions) {
                out[pos] = answer;
            }
        }
        Ok(out)
    }
}

/// Renumber a shard in place and return this worker's map shard (collective)
///
/// `vertices`, when given, declares vertices explicitly: each one receives an
/// internal id even without incident edges. A vertex declared twice,
/// on one worker or across workers, is a configuration error. With
/// `strict_vertices`, endpoints missing from the declared list are a
/// validation error, and a configuration error when no worker declares a
/// list at all.
///
/// # Errors
///
/// Configuration and validation errors fail the call on every worker;
/// exchange failures are collective errors.
///
/// # Example
///
/// ```
/// use trueno_graph_dist::comm::SingleWorker;
/// use trueno_graph_dist::{renumber_edgelist, EdgeList};
///
/// let mut edges: EdgeList<u64> = EdgeList::new(vec![900, 40], vec![40, 7]);
/// let map = renumber_edgelist(&SingleWorker, &mut edges, None, false).unwrap();
/// assert_eq!(map.total_vertices(), 3);
/// assert_eq!(edges.src, vec![2, 1]);
/// ```
pub fn renumber_edgelist<V, E, W, C>(
    comm: &C,
    edges: &mut EdgeList<V, E, W>,
    vertices: Option<Vec<V>>,
    strict_vertices: bool,
) -> Result<RenumberMap<V>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
{
    renumber_edge_chunks(comm, std::slice::from_mut(edges), vertices, strict_vertices)
}

/// Renumber every chunk of this worker's input in place (collective)
///
/// All chunks share one map; see [`renumber_edgelist`].
///
/// # Errors
///
/// As [`renumber_edgelist`]
pub fn renumber_edge_chunks<V, E, W, C>(
    comm: &C,
    chunks: &mut [EdgeList<V, E, W>],
    vertices: Option<Vec<V>>,
    strict_vertices: bool,
) -> Result<RenumberMap<V>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
{
    let hash = HashPartition::new(comm.size());

    let validated: Result<()> = chunks.iter().try_for_each(EdgeList::validate);
    let local_endpoints = comm.agree(validated.map(|()| distinct_endpoints(chunks)))?;

    // Workers without a list join the exchange with an empty one
    let any_declared = comm.all_gather(vertices.is_some())?.contains(&true);
    if strict_vertices && !any_declared {
        return Err(ConfigError::InvalidOption {
            option: "strict_vertices",
            reason: "no worker supplied a vertex list".into(),
        }
        .into());
    }
    let vertices = if any_declared {
        Some(vertices.unwrap_or_default())
    } else {
        None
    };

    let declared = match vertices {
        Some(declared) => {
            let declared = shuffle_vertices(comm, declared, &hash)?;
            Some(comm.agree(sorted_unique(declared))?)
        }
        None => None,
    };

    let mut owned = shuffle_vertices(comm, local_endpoints.clone(), &hash)?;
    owned.sort_unstable();
    owned.dedup();

    if let Some(declared) = declared {
        let check = if strict_vertices {
            owned
                .iter()
                .find(|v| declared.binary_search(v).is_err())
                .map_or(Ok(()), |v| {
                    Err(ValidationError::UndeclaredVertex { vertex: v.widen() }.into())
                })
        } else {
            Ok(())
        };
        comm.agree(check)?;
        owned.extend(declared);
        owned.sort_unstable();
        owned.dedup();
    }

    let counts = comm.all_gather(owned.len() as u64)?;
    let ranges = PartitionRanges::from_counts(&counts);
    let start = ranges.local_range(comm.rank()).start;

    let external_to_internal: FxHashMap<V, u64> = owned
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, start + i as u64))
        .collect();

    let map = RenumberMap {
        rank: comm.rank(),
        ranges,
        local_external: owned,
        external_to_internal,
    };

    let internal = map.to_internal(comm, &local_endpoints);
    let rewritten = comm.agree(internal.and_then(|internal| {
        let lookup: FxHashMap<V, u64> = local_endpoints.iter().copied().zip(internal).collect();
        chunks
            .iter()
            .map(|chunk| rewrite_endpoints(chunk, &lookup))
            .collect::<Result<Vec<_>>>()
    }))?;
    for (chunk, renumbered) in chunks.iter_mut().zip(rewritten) {
        *chunk = renumbered;
    }

    debug!(
        rank = comm.rank(),
        local_vertices = map.local_len(),
        total_vertices = map.total_vertices(),
        edges = chunks.iter().map(EdgeList::len).sum::<usize>(),
        "renumbered"
    );
    Ok(map)
}

fn distinct_endpoints<V: IdType, E: IdType, W: Weight>(chunks: &[EdgeList<V, E, W>]) -> Vec<V> {
    let set: FxHashSet<V> = chunks
        .iter()
        .flat_map(|chunk| chunk.src.iter().chain(&chunk.dst))
        .copied()
        .collect();
    let mut out: Vec<V> = set.into_iter().collect();
    out.sort_unstable();
    out
}

pub(crate) fn sorted_unique<V: IdType>(mut vertices: Vec<V>) -> Result<Vec<V>> {
    vertices.sort_unstable();
    if let Some(w) = vertices.windows(2).find(|w| w[0] == w[1]) {
        return Err(ConfigError::DuplicateVertex { vertex: w[0].widen() }.into());
    }
    Ok(vertices)
}

fn rewrite_endpoints<V: IdType, E: IdType, W: Weight>(
    edges: &EdgeList<V, E, W>,
    lookup: &FxHashMap<V, u64>,
) -> Result<EdgeList<V, E, W>> {
    let translate = |v: &V| -> Result<V> {
        let internal = *lookup
            .get(v)
            .ok_or(GraphError::UnknownVertex { vertex: v.widen() })?;
        V::from_u64(internal).ok_or_else(|| {
            ConfigError::InvalidIdentifier {
                field: "internal vertex id",
                value: i128::from(internal),
            }
            .into()
        })
    };
    let mut out = edges.clone();
    out.src = edges.src.iter().map(translate).collect::<Result<_>>()?;
    out.dst = edges.dst.iter().map(translate).collect::<Result<_>>()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalCluster, SingleWorker};

    #[test]
    fn test_dense_ids_map_to_identity() {
        let mut edges: EdgeList<i32> =
            EdgeList::new(vec![0, 1, 1, 2, 2, 2, 3, 4], vec![1, 3, 4, 0, 1, 3, 5, 5]);
        let original = edges.clone();
        let map = renumber_edgelist(&SingleWorker, &mut edges, None, false).unwrap();

        assert_eq!(map.total_vertices(), 6);
        assert_eq!(map.local_external_ids(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(edges, original);
    }

    #[test]
    fn test_sparse_ids_are_compacted() {
        let mut edges: EdgeList<u64> = EdgeList::new(vec![1_000, 7], vec![7, 42]);
        let map = renumber_edgelist(&SingleWorker, &mut edges, None, false).unwrap();

        assert_eq!(map.total_vertices(), 3);
        // ascending external order
        assert_eq!(map.local_external_ids(), &[7, 42, 1_000]);
        assert_eq!(edges.src, vec![2, 0]);
        assert_eq!(edges.dst, vec![0, 1]);
    }

    #[test]
    fn test_declared_isolated_vertex_gets_id() {
        let mut edges: EdgeList<i64> = EdgeList::new(vec![10], vec![20]);
        let map = renumber_edgelist(&SingleWorker, &mut edges, Some(vec![10, 20, 30]), true).unwrap();
        assert_eq!(map.total_vertices(), 3);
        assert_eq!(map.external_to_internal_local(30), Some(2));
    }

    #[test]
    fn test_duplicate_declaration_across_workers() {
        let results = LocalCluster::new(2)
            .run(|comm| {
                let mut edges: EdgeList<u32> = EdgeList::new(Vec::new(), Vec::new());
                // both workers claim vertex 5
                let declared = if comm.rank() == 0 { vec![1, 5] } else { vec![5, 9] };
                renumber_edgelist(comm, &mut edges, Some(declared), false).map(|_| ())
            })
            .unwrap();
        assert!(results.iter().all(Result::is_err));
        assert!(results.iter().any(|r| matches!(r, Err(e) if e.is_config())));
    }

    #[test]
    fn test_undeclared_endpoint_in_strict_mode() {
        let mut edges: EdgeList<u32> = EdgeList::new(vec![1], vec![2]);
        let err = renumber_edgelist(&SingleWorker, &mut edges, Some(vec![1]), true).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::UndeclaredVertex { vertex: 2 })
        ));
    }

    #[test]
    fn test_strict_mode_needs_a_vertex_list() {
        let mut edges: EdgeList<u32> = EdgeList::new(vec![1], vec![2]);
        let err = renumber_edgelist(&SingleWorker, &mut edges, None, true).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Config(ConfigError::InvalidOption { option: "strict_vertices", .. })
        ));
        // input untouched
        assert_eq!(edges.src, vec![1]);
    }

    #[test]
    fn test_chunks_share_one_numbering() {
        let mut chunks: Vec<EdgeList<u32>> = vec![
            EdgeList::new(vec![50, 10], vec![10, 30]),
            EdgeList::new(vec![30], vec![50]),
        ];
        let map = renumber_edge_chunks(&SingleWorker, &mut chunks, None, false).unwrap();
        assert_eq!(map.local_external_ids(), &[10, 30, 50]);
        assert_eq!(chunks[0].src, vec![2, 0]);
        assert_eq!(chunks[1].src, vec![1]);
        assert_eq!(chunks[1].dst, vec![2]);
    }

    #[test]
    fn test_multi_worker_bijection() {
        let results = LocalCluster::new(3)
            .run(|comm| {
                let base = comm.rank() as u64 * 1_000;
                let mut edges: EdgeList<u64> =
                    EdgeList::new(vec![base, base + 5, 17], vec![base + 5, 17, base]);
                let original = edges.clone();
                let map = renumber_edgelist(comm, &mut edges, None, false).unwrap();

                let back = map.to_external(comm, &edges.src).unwrap();
                assert_eq!(back, original.src);
                let forward = map.to_internal(comm, &original.dst).unwrap();
                assert_eq!(forward, edges.dst);
                map.gather(comm).unwrap()
            })
            .unwrap();

        let table = &results[0];
        assert!(results.iter().all(|t| t == table));
        // {0, 5, 1000, 1005, 2000, 2005} plus the shared 17
        assert_eq!(table.len(), 7);
        let distinct: FxHashSet<u64> = table.iter().copied().collect();
        assert_eq!(distinct.len(), table.len());
    }

    #[test]
    fn test_renumbering_is_idempotent() {
        let run = || {
            LocalCluster::new(2)
                .run(|comm| {
                    let mut edges: EdgeList<i64> =
                        EdgeList::new(vec![-4, 90, 3], vec![3, -4, 12 + comm.rank() as i64]);
                    renumber_edgelist(comm, &mut edges, None, false).unwrap();
                    edges
                })
                .unwrap()
        };
        assert_eq!(run(), run());
    }
}
