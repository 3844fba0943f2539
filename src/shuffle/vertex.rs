//! Vertex shuffler

use super::owners_of;
use crate::comm::Communicator;
use crate::error::{ConfigError, Result};
use crate::partition::VertexPartition;
use crate::types::IdType;
use tracing::debug;

/// Send every vertex to the worker that owns it
///
/// Duplicates are delivered as-is; the shuffle neither adds nor removes
/// entries. Collective: every worker must call it.
///
/// # Errors
///
/// - Any worker holding an out-of-range vertex or a partition that does not
///   match the group fails the call on every worker.
/// - [`crate::GraphError::Collective`] if the exchange cannot complete.
///
/// # Example
///
/// ```
/// use trueno_graph_dist::comm::SingleWorker;
/// use trueno_graph_dist::{shuffle_vertices, PartitionRanges};
///
/// let ranges = PartitionRanges::from_boundaries(vec![4]).unwrap();
/// let out = shuffle_vertices(&SingleWorker, vec![3_u32, 1, 3], &ranges).unwrap();
/// assert_eq!(out.len(), 3);
/// ```
pub fn shuffle_vertices<V, C, P>(comm: &C, vertices: Vec<V>, partition: &P) -> Result<Vec<V>>
where
    V: IdType,
    C: Communicator,
    P: VertexPartition<V>,
{
    let owners = comm.agree(owners_of(comm, partition, &vertices))?;

    let mut outbound: Vec<Vec<V>> = vec![Vec::new(); comm.size()];
    for (v, owner) in vertices.into_iter().zip(owners) {
        outbound[owner].push(v);
    }

    let sent: usize = outbound.iter().map(Vec::len).sum();
    let received: Vec<V> = comm.all_to_all(outbound)?.into_iter().flatten().collect();
    debug!(rank = comm.rank(), sent, received = received.len(), "shuffled vertices");
    Ok(received)
}

/// Send every `(vertex, value)` pair to the worker that owns the vertex
///
/// Values stay attached to the vertex they started with.
///
/// # Errors
///
/// As [`shuffle_vertices`], plus [`ConfigError::ColumnLength`] when the two
/// arrays differ in length.
pub fn shuffle_vertex_value_pairs<V, T, C, P>(
    comm: &C,
    vertices: Vec<V>,
    values: Vec<T>,
    partition: &P,
) -> Result<(Vec<V>, Vec<T>)>
where
    V: IdType,
    T: Send + 'static,
    C: Communicator,
    P: VertexPartition<V>,
{
    let local = if values.len() == vertices.len() {
        owners_of(comm, partition, &vertices)
    } else {
        Err(ConfigError::ColumnLength {
            column: "values",
            expected: vertices.len(),
            actual: values.len(),
        }
        .into())
    };
    let owners = comm.agree(local)?;

    let mut outbound: Vec<(Vec<V>, Vec<T>)> = (0..comm.size()).map(|_| (Vec::new(), Vec::new())).collect();
    for ((v, value), owner) in vertices.into_iter().zip(values).zip(owners) {
        outbound[owner].0.push(v);
        outbound[owner].1.push(value);
    }

    let inbound = comm.all_to_all(outbound)?;
    let total = inbound.iter().map(|(v, _)| v.len()).sum();
    let mut out_vertices = Vec::with_capacity(total);
    let mut out_values = Vec::with_capacity(total);
    for (mut v, mut values) in inbound {
        out_vertices.append(&mut v);
        out_values.append(&mut values);
    }
    debug!(rank = comm.rank(), received = total, "shuffled vertex/value pairs");
    Ok((out_vertices, out_values))
}
