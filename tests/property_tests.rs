//! Property-based tests for trueno-graph-dist
//!
//! Verifies renumbering and construction invariants for arbitrary inputs and
//! worker counts

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use trueno_graph_dist::comm::{Communicator, LocalCluster};
use trueno_graph_dist::{
    renumber_edgelist, shuffle_edges, to_coo, EdgeList, EdgeRouting, GraphBuilder,
    GraphProperties, MergePolicy, PartitionRanges,
};

// Each case spawns a worker group; keep the case count modest
fn config() -> ProptestConfig {
    ProptestConfig::with_cases(48)
}

/// Split `edges` round-robin, tagging every edge with its global index as edge id
fn shard(edges: &[(u64, u64)], rank: usize, workers: usize) -> EdgeList<u64> {
    let rows: Vec<usize> = (rank..edges.len()).step_by(workers).collect();
    EdgeList::new(
        rows.iter().map(|&i| edges[i].0).collect(),
        rows.iter().map(|&i| edges[i].1).collect(),
    )
    .with_edge_ids(rows.iter().map(|&i| i as u64).collect())
}

// Property: renumbering is a bijection onto [0, n) and round-trips
proptest! {
    #![proptest_config(config())]
    #[test]
    fn prop_renumber_bijection(
        edges in prop_sparse_edges(0usize..60usize),
        workers in 1usize..5usize,
    ) {
        let results = LocalCluster::new(workers)
            .run(|comm| {
                let mut local = shard(&edges, comm.rank(), comm.size());
                let original = local.clone();
                let map = renumber_edgelist(comm, &mut local, None, false).unwrap();

                let back_src = map.to_external(comm, &local.src).unwrap();
                let back_dst = map.to_external(comm, &local.dst).unwrap();
                let forward = map.to_internal(comm, &original.src).unwrap();
                let internal_ok = forward.iter().zip(&local.src).all(|(&f, &s)| f == s);
                (
                    back_src == original.src && back_dst == original.dst && internal_ok,
                    map.gather(comm).unwrap(),
                )
            })
            .unwrap();

        let observed: BTreeSet<u64> = edges.iter().flat_map(|&(s, d)| [s, d]).collect();
        for (round_trip, table) in results {
            prop_assert!(round_trip);
            // table[i] is the external id of internal id i
            prop_assert_eq!(table.len(), observed.len());
            let distinct: BTreeSet<u64> = table.iter().copied().collect();
            prop_assert_eq!(distinct, observed.clone());
        }
    }
}

// Property: shuffled rows keep their attribute values
proptest! {
    #![proptest_config(config())]
    #[test]
    fn prop_shuffle_row_alignment(
        edges in prop_dense_edges(0usize..80usize, 1u64..30u64),
        workers in 1usize..5usize,
        by_destination in any::<bool>(),
    ) {
        let total = edges.iter().flat_map(|&(s, d)| [s, d]).max().map_or(0, |m| m + 1);
        let ranges = PartitionRanges::even(total, workers);
        let routing = if by_destination { EdgeRouting::DestinationOwner } else { EdgeRouting::SourceOwner };

        let results = LocalCluster::new(workers)
            .run(|comm| shuffle_edges(comm, shard(&edges, comm.rank(), comm.size()), &ranges, routing).unwrap())
            .unwrap();

        let mut received = 0;
        for (rank, local) in results.iter().enumerate() {
            let tags = local.edge_id.as_ref().unwrap();
            for ((&s, &d), &tag) in local.src.iter().zip(&local.dst).zip(tags) {
                prop_assert_eq!((s, d), edges[usize::try_from(tag).unwrap()]);
                let key = routing.key(s, d);
                prop_assert!(ranges.local_range(rank).contains(&key));
            }
            received += local.len();
        }
        prop_assert_eq!(received, edges.len());
    }
}

// Property: edge count is conserved (multigraph) or reduced to distinct pairs (simple)
proptest! {
    #![proptest_config(config())]
    #[test]
    fn prop_build_conserves_edges(
        edges in prop_sparse_edges(0usize..60usize),
        workers in 1usize..4usize,
        multigraph in any::<bool>(),
    ) {
        let properties = GraphProperties::directed().with_multigraph(multigraph);
        let results = LocalCluster::new(workers)
            .run(|comm| {
                let out = GraphBuilder::new(properties)
                    .merge_policy(MergePolicy::First)
                    .expensive_check(true)
                    .build(comm, vec![shard(&edges, comm.rank(), comm.size())], None)
                    .unwrap();
                out.graph.number_of_edges(comm).unwrap()
            })
            .unwrap();

        let expected = if multigraph {
            edges.len()
        } else {
            edges.iter().collect::<BTreeSet<_>>().len()
        };
        for count in results {
            prop_assert_eq!(count, expected as u64);
        }
    }
}

// Property: every input edge of an undirected build is reachable in both directions,
// carrying its tag
proptest! {
    #![proptest_config(config())]
    #[test]
    fn prop_symmetrization(
        edges in prop_sparse_edges(0usize..40usize),
        workers in 1usize..4usize,
    ) {
        let results = LocalCluster::new(workers)
            .run(|comm| {
                let out = GraphBuilder::new(GraphProperties::undirected().with_multigraph(true))
                    .expensive_check(true)
                    .build(comm, vec![shard(&edges, comm.rank(), comm.size())], None)
                    .unwrap();
                let map = out.renumber_map.as_deref().unwrap();
                let coo = to_coo(comm, &out.graph, None, Some(map)).unwrap();
                let tags: Vec<u64> = out
                    .graph
                    .edges()
                    .map(|(_, _, pos)| out.graph.edge_id(pos).unwrap())
                    .collect();
                (coo, local_external(comm, &out, map), tags)
            })
            .unwrap();

        for (coo, _, _) in &results {
            let present: BTreeSet<(u64, u64)> = coo.src.iter().copied().zip(coo.dst.iter().copied()).collect();
            for &(u, v) in &edges {
                prop_assert!(present.contains(&(u, v)));
                prop_assert!(present.contains(&(v, u)));
            }
        }

        // each stored edge carries the tag of the input edge it came from
        let mut tagged: BTreeMap<u64, Vec<(u64, u64)>> = BTreeMap::new();
        for (_, local, tags) in results {
            for (pair, tag) in local.into_iter().zip(tags) {
                tagged.entry(tag).or_default().push(pair);
            }
        }
        for (tag, pairs) in tagged {
            let (u, v) = edges[usize::try_from(tag).unwrap()];
            for (s, d) in pairs {
                prop_assert!((s, d) == (u, v) || (s, d) == (v, u));
            }
        }
    }
}

/// Local edges translated back to external ids, in local edge order
fn local_external<C: Communicator>(
    comm: &C,
    out: &trueno_graph_dist::BuildOutput<u64>,
    map: &trueno_graph_dist::RenumberMap<u64>,
) -> Vec<(u64, u64)> {
    let (src, dst): (Vec<u64>, Vec<u64>) = out.graph.edges().map(|(s, d, _)| (s, d)).unzip();
    let src = map.to_external(comm, &src).unwrap();
    let dst = map.to_external(comm, &dst).unwrap();
    src.into_iter().zip(dst).collect()
}

/// Sparse external ids drawn from a small pool so that endpoints repeat
fn prop_sparse_edges(num_edges: impl Strategy<Value = usize>) -> impl Strategy<Value = Vec<(u64, u64)>> {
    num_edges.prop_flat_map(|n| {
        let pool = prop::sample::select(vec![3_u64, 17, 256, 1_000, 65_537, 1 << 40, u64::MAX - 1]);
        prop::collection::vec((pool.clone(), pool), 0..=n)
    })
}

/// Dense ids in `[0, max_node)`
fn prop_dense_edges(
    num_edges: impl Strategy<Value = usize>,
    max_node: impl Strategy<Value = u64>,
) -> impl Strategy<Value = Vec<(u64, u64)>> {
    (num_edges, max_node).prop_flat_map(|(n, max_node)| {
        prop::collection::vec((0..max_node, 0..max_node), 0..=n)
    })
}
