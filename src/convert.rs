//! Host-side dumps of a distributed graph for validation
//!
//! Every function here is collective and replicates the whole graph on every
//! worker. Meant for tests and small-graph inspection, not the data path.

use crate::comm::Communicator;
use crate::error::{ConfigError, GraphError, Result};
use crate::renumber::RenumberMap;
use crate::storage::GraphView;
use crate::types::{IdType, Orientation, Weight};

/// Coordinate-format edge list, in worker-rank then local edge order
#[derive(Debug, Clone, PartialEq)]
pub struct HostCoo<V, W = f32> {
    /// Sources
    pub src: Vec<V>,
    /// Destinations
    pub dst: Vec<V>,
    /// Weights, when a weight view was supplied
    pub weight: Option<Vec<W>>,
}

/// Compressed rows (CSR) or columns (CSC) over the whole vertex universe
#[derive(Debug, Clone, PartialEq)]
pub struct HostCompressed<V, W = f32> {
    /// Row `r` spans `indices[offsets[r]..offsets[r + 1]]`
    pub offsets: Vec<u64>,
    /// Neighbor ids, ascending by internal id within each row
    pub indices: Vec<V>,
    /// Weights aligned with `indices`
    pub weight: Option<Vec<W>>,
    /// External id of each row, when translated through a renumber map
    pub row_ids: Option<Vec<V>>,
}

/// Gather every worker's edges as COO (collective)
///
/// `weights` is a view aligned with the local edge positions of `graph`
/// (typically [`crate::BuildOutput::edge_weight`]). With `renumber_map`, ids
/// are translated back to external ids.
///
/// # Errors
///
/// [`ConfigError::ColumnLength`] if the weight view does not match the local
/// edge count, or if workers disagree on which arguments they pass;
/// exchange failures are collective errors.
pub fn to_coo<V, E, W, C>(
    comm: &C,
    graph: &GraphView<V, E, W>,
    weights: Option<&[W]>,
    renumber_map: Option<&RenumberMap<V>>,
) -> Result<HostCoo<V, W>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
{
    let mut coo = gather_edges(comm, graph, weights, renumber_map.is_some())?;
    if let Some(map) = renumber_map {
        coo.src = map.to_external(comm, &coo.src)?;
        coo.dst = map.to_external(comm, &coo.dst)?;
    }
    Ok(coo)
}

/// Gather the graph as CSR, rows keyed by source (collective)
///
/// # Errors
///
/// As [`to_coo`]
pub fn to_csr<V, E, W, C>(
    comm: &C,
    graph: &GraphView<V, E, W>,
    weights: Option<&[W]>,
    renumber_map: Option<&RenumberMap<V>>,
) -> Result<HostCompressed<V, W>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
{
    compress(comm, graph, weights, renumber_map, Orientation::SourceMajor)
}

/// Gather the graph as CSC, rows keyed by destination (collective)
///
/// # Errors
///
/// As [`to_coo`]
pub fn to_csc<V, E, W, C>(
    comm: &C,
    graph: &GraphView<V, E, W>,
    weights: Option<&[W]>,
    renumber_map: Option<&RenumberMap<V>>,
) -> Result<HostCompressed<V, W>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
{
    compress(comm, graph, weights, renumber_map, Orientation::DestinationMajor)
}

fn compress<V, E, W, C>(
    comm: &C,
    graph: &GraphView<V, E, W>,
    weights: Option<&[W]>,
    renumber_map: Option<&RenumberMap<V>>,
    orientation: Orientation,
) -> Result<HostCompressed<V, W>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
{
    let coo = gather_edges(comm, graph, weights, renumber_map.is_some())?;
    let (majors, minors) = match orientation {
        Orientation::SourceMajor => (&coo.src, &coo.dst),
        Orientation::DestinationMajor => (&coo.dst, &coo.src),
    };

    let key = |v: V| v.to_u64().ok_or(GraphError::VertexOutOfRange {
        vertex: v.widen(),
        total: graph.total_vertices(),
    });
    let keys = majors
        .iter()
        .zip(minors)
        .map(|(&major, &minor)| Ok((key(major)?, key(minor)?)))
        .collect::<Result<Vec<(u64, u64)>>>()?;

    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);

    let total = graph.total_vertices();
    let rows = usize::try_from(total).map_err(|_| GraphError::VertexOutOfRange {
        vertex: i128::from(total),
        total,
    })?;
    let mut offsets = vec![0_u64; rows + 1];
    for &(major, _) in &keys {
        let row = usize::try_from(major)
            .ok()
            .filter(|&r| r < rows)
            .ok_or(GraphError::VertexOutOfRange {
                vertex: i128::from(major),
                total,
            })?;
        offsets[row + 1] += 1;
    }
    for r in 0..rows {
        offsets[r + 1] += offsets[r];
    }

    let mut indices: Vec<V> = order.iter().map(|&i| minors[i]).collect();
    let weight = coo
        .weight
        .as_ref()
        .map(|w| order.iter().map(|&i| w[i]).collect());

    let row_ids = match renumber_map {
        Some(map) => {
            indices = map.to_external(comm, &indices)?;
            let internal = (0..total)
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
            Some(map.to_external(comm, &internal)?)
        }
        None => None,
    };

    Ok(HostCompressed {
        offsets,
        indices,
        weight,
        row_ids,
    })
}

/// Local edges in internal ids, replicated to every worker in rank order
fn gather_edges<V, E, W, C>(
    comm: &C,
    graph: &GraphView<V, E, W>,
    weights: Option<&[W]>,
    translating: bool,
) -> Result<HostCoo<V, W>>
where
    V: IdType,
    E: IdType,
    W: Weight,
    C: Communicator,
{
    let local_edges = graph.number_of_local_edges();
    let local: Result<()> = match weights {
        Some(w) if w.len() != local_edges => Err(ConfigError::ColumnLength {
            column: "weight",
            expected: local_edges,
            actual: w.len(),
        }
        .into()),
        _ => Ok(()),
    };
    comm.agree(local)?;

    let shape = comm.all_gather((weights.is_some(), translating))?;
    if shape.iter().any(|s| *s != shape[0]) {
        return Err(ConfigError::InvalidOption {
            option: "weights/renumber_map",
            reason: "workers passed different arguments".into(),
        }
        .into());
    }

    let mut src = Vec::with_capacity(local_edges);
    let mut dst = Vec::with_capacity(local_edges);
    let mut weight = weights.map(|_| Vec::with_capacity(local_edges));
    for (s, d, position) in graph.edges() {
        src.push(s);
        dst.push(d);
        if let (Some(out), Some(w)) = (weight.as_mut(), weights) {
            out.push(w[position]);
        }
    }

    let mut coo = HostCoo {
        src: Vec::new(),
        dst: Vec::new(),
        weight: weights.map(|_| Vec::new()),
    };
    for (mut s, mut d, w) in comm.all_gather((src, dst, weight))? {
        coo.src.append(&mut s);
        coo.dst.append(&mut d);
        if let (Some(out), Some(mut w)) = (coo.weight.as_mut(), w) {
            out.append(&mut w);
        }
    }
    Ok(coo)
}

#[cfg(feature = "arrow")]
mod arrow_export {
    use super::HostCoo;
    use crate::types::{IdType, Weight};
    use anyhow::{Context, Result};
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    impl<V: IdType, W: Weight> HostCoo<V, W> {
        /// Columns `src`, `dst` (Int64) and `weight` (Float64, when present)
        ///
        /// # Errors
        ///
        /// Returns error if an id does not fit in `i64`
        pub fn to_record_batch(&self) -> Result<RecordBatch> {
            let ids = |column: &[V], name: &str| -> Result<ArrayRef> {
                let values = column
                    .iter()
                    .map(|v| i64::try_from(v.widen()).with_context(|| format!("{name} id {v:?} exceeds i64")))
                    .collect::<Result<Vec<i64>>>()?;
                Ok(Arc::new(Int64Array::from(values)))
            };

            let mut fields = vec![
                Field::new("src", DataType::Int64, false),
                Field::new("dst", DataType::Int64, false),
            ];
            let mut columns = vec![ids(&self.src, "src")?, ids(&self.dst, "dst")?];
            if let Some(weight) = &self.weight {
                fields.push(Field::new("weight", DataType::Float64, false));
                let values: Vec<f64> = weight.iter().map(|w| w.to_f64()).collect();
                columns.push(Arc::new(Float64Array::from(values)));
            }

            RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
                .context("Failed to create edge record batch")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_record_batch_columns() {
            let coo: HostCoo<u32, f32> = HostCoo {
                src: vec![0, 1],
                dst: vec![1, 2],
                weight: Some(vec![0.5, 1.5]),
            };
            let batch = coo.to_record_batch().unwrap();
            assert_eq!(batch.num_rows(), 2);
            assert_eq!(batch.num_columns(), 3);
            assert_eq!(batch.schema().field(2).name(), "weight");
        }
    }
}
