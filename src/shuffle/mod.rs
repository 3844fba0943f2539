//! Ownership-driven redistribution of vertices and edges
//!
//! Both shufflers follow the same three steps: compute every record's owner
//! locally, agree collectively that every worker could do so, then run a
//! single all-to-all. Arrival order on the receiving side is unspecified.

mod edge;
mod vertex;

pub(crate) use edge::agree_schema;
pub use edge::{shuffle_edge_chunks, shuffle_edges};
pub use vertex::{shuffle_vertex_value_pairs, shuffle_vertices};

use crate::comm::Communicator;
use crate::error::{ConfigError, Result};
use crate::partition::VertexPartition;
use crate::types::IdType;

/// Owner of every id in `ids`, or a local error if the partition does not
/// match the worker group or an id is out of range
pub(crate) fn owners_of<V, C, P>(comm: &C, partition: &P, ids: &[V]) -> Result<Vec<usize>>
where
    V: IdType,
    C: Communicator,
    P: VertexPartition<V>,
{
    if partition.worker_count() != comm.size() {
        return Err(ConfigError::Partition(format!(
            "partition spans {} workers, group has {}",
            partition.worker_count(),
            comm.size()
        ))
        .into());
    }
    ids.iter().map(|&v| partition.owner_of(v)).collect()
}
