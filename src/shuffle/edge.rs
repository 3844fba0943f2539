//! Edge shuffler

use super::owners_of;
use crate::comm::Communicator;
use crate::edgelist::{EdgeList, EdgeSchema};
use crate::error::{ConfigError, Result};
use crate::partition::{EdgeRouting, VertexPartition};
use crate::types::{IdType, Weight};
use tracing::debug;

/// Route every edge to the worker owning its designated endpoint
///
/// See [`shuffle_edge_chunks`].
///
/// # Errors
///
/// As [`shuffle_edge_chunks`]
pub fn shuffle_edges<V, E, W, C, P>(
    comm: &C,
    edges: EdgeList<V, E, W>,
    partition: &P,
    routing: EdgeRouting,
) -> Result<EdgeList<V, E, W>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
    P: VertexPartition<V>,
{
    shuffle_edge_chunks(comm, vec![edges], partition, routing)
}

/// Route edges held as several chunks, concatenating the result
///
/// The owner of each row is computed once from `(src, dst)` under `routing`
/// and every attribute column is moved with the same permutation. Parallel
/// edges are passed through untouched.
///
/// # Errors
///
/// Fails on every worker if any worker has a malformed chunk, chunks with
/// different columns, a schema that differs from its peers, or an endpoint
/// the partition cannot place. Exchange failures surface as
/// [`crate::GraphError::Collective`].
pub fn shuffle_edge_chunks<V, E, W, C, P>(
    comm: &C,
    chunks: Vec<EdgeList<V, E, W>>,
    partition: &P,
    routing: EdgeRouting,
) -> Result<EdgeList<V, E, W>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
    P: VertexPartition<V>,
{
    let local_schema = chunks.first().map(EdgeList::schema);
    let owners = comm.agree(route_chunks(comm, &chunks, partition, routing))?;
    let schema = agree_schema(comm, local_schema)?;

    let workers = comm.size();
    let mut outbound: Vec<EdgeList<V, E, W>> = (0..workers).map(|_| EdgeList::empty(schema)).collect();
    for (chunk, chunk_owners) in chunks.iter().zip(&owners) {
        for (dest, part) in chunk.split_by_owner(chunk_owners, workers).into_iter().enumerate() {
            outbound[dest].append(part);
        }
    }

    let sent: usize = chunks.iter().map(EdgeList::len).sum();
    let received = EdgeList::concat(comm.all_to_all(outbound)?, schema);
    debug!(
        rank = comm.rank(),
        chunks = chunks.len(),
        sent,
        received = received.len(),
        ?routing,
        "shuffled edges"
    );
    Ok(received)
}

fn route_chunks<V, E, W, C, P>(
    comm: &C,
    chunks: &[EdgeList<V, E, W>],
    partition: &P,
    routing: EdgeRouting,
) -> Result<Vec<Vec<usize>>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
    P: VertexPartition<V>,
{
    let first = chunks.first().map(EdgeList::schema);
    chunks
        .iter()
        .map(|chunk| {
            chunk.validate()?;
            if Some(chunk.schema()) != first {
                return Err(ConfigError::InvalidOption {
                    option: "chunks",
                    reason: "chunks carry different attribute columns".into(),
                }
                .into());
            }
            let keys: Vec<V> = chunk
                .src
                .iter()
                .zip(&chunk.dst)
                .map(|(&s, &d)| routing.key(s, d))
                .collect();
            owners_of(comm, partition, &keys)
        })
        .collect()
}

/// Collective check that every worker ships the same columns
///
/// Workers without chunks adopt the schema of their peers.
pub(crate) fn agree_schema<C: Communicator>(
    comm: &C,
    local: Option<EdgeSchema>,
) -> Result<EdgeSchema> {
    let schemas = comm.all_gather(local)?;
    let mut declared = schemas.iter().flatten();
    let Some(&schema) = declared.next() else {
        return Ok(EdgeSchema::default());
    };
    if declared.any(|s| *s != schema) {
        return Err(ConfigError::InvalidOption {
            option: "columns",
            reason: "workers supplied different attribute columns".into(),
        }
        .into());
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalCluster, SingleWorker};
    use crate::partition::PartitionRanges;

    #[test]
    fn test_destination_owner_routing() {
        // worker 0 owns {0,1,2}, worker 1 owns {3,4,5}
        let ranges = PartitionRanges::from_boundaries(vec![3, 6]).unwrap();
        let results = LocalCluster::new(2)
            .run(|comm| {
                let shard: EdgeList<i32> = if comm.rank() == 0 {
                    EdgeList::new(vec![2], vec![5]).with_weights(vec![4.5])
                } else {
                    EdgeList::new(Vec::new(), Vec::new()).with_weights(Vec::new())
                };
                shuffle_edges(comm, shard, &ranges, EdgeRouting::DestinationOwner).unwrap()
            })
            .unwrap();

        assert!(results[0].is_empty());
        assert_eq!(results[1].src, vec![2]);
        assert_eq!(results[1].dst, vec![5]);
        assert_eq!(results[1].weight, Some(vec![4.5]));
    }

    #[test]
    fn test_chunks_are_concatenated() {
        let ranges = PartitionRanges::from_boundaries(vec![10]).unwrap();
        let chunks: Vec<EdgeList<u32, u32, f32>> = vec![
            EdgeList::new(vec![0, 1], vec![1, 2]).with_edge_ids(vec![0, 1]),
            EdgeList::new(vec![2], vec![3]).with_edge_ids(vec![2]),
        ];
        let out = shuffle_edge_chunks(&SingleWorker, chunks, &ranges, EdgeRouting::SourceOwner)
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.edge_id, Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_mismatched_chunk_columns_rejected() {
        let ranges = PartitionRanges::from_boundaries(vec![10]).unwrap();
        let chunks: Vec<EdgeList<u32>> = vec![
            EdgeList::new(vec![0], vec![1]).with_weights(vec![1.0]),
            EdgeList::new(vec![2], vec![3]),
        ];
        let err = shuffle_edge_chunks(&SingleWorker, chunks, &ranges, EdgeRouting::SourceOwner)
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_peer_schema_mismatch_rejected() {
        let ranges = PartitionRanges::from_boundaries(vec![2, 4]).unwrap();
        let results = LocalCluster::new(2)
            .run(|comm| {
                let shard: EdgeList<u32> = if comm.rank() == 0 {
                    EdgeList::new(vec![0], vec![3]).with_weights(vec![1.0])
                } else {
                    EdgeList::new(vec![3], vec![0])
                };
                shuffle_edges(comm, shard, &ranges, EdgeRouting::SourceOwner)
            })
            .unwrap();
        assert!(results.iter().all(|r| matches!(r, Err(e) if e.is_config())));
    }
}
