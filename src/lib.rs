//! trueno-graph-dist: partitioned graph construction across cooperating workers
//!
//! # Overview
//!
//! Turns unordered edge-list shards, one or more per worker, into a
//! renumbered, partitioned compressed adjacency (CSR or CSC) with
//! row-aligned edge properties. Every stage is a collective over an explicit
//! [`comm::Communicator`]; there is no coordinator and no global state.
//!
//! # Quick Start
//!
//! ```
//! use trueno_graph_dist::comm::{Communicator, LocalCluster};
//! use trueno_graph_dist::{EdgeList, GraphBuilder, GraphProperties, MergePolicy};
//!
//! let builder = GraphBuilder::new(GraphProperties::directed())
//!     .merge_policy(MergePolicy::Sum)
//!     .expensive_check(true);
//!
//! let edges = LocalCluster::new(2)
//!     .run(|comm| {
//!         // each worker ingests its own shard of external ids
//!         let shard: EdgeList<u64> = if comm.rank() == 0 {
//!             EdgeList::new(vec![100, 100], vec![200, 300]).with_weights(vec![1.0, 2.0])
//!         } else {
//!             EdgeList::new(vec![300], vec![100]).with_weights(vec![3.0])
//!         };
//!         let out = builder.build(comm, vec![shard], None).unwrap();
//!         out.graph.number_of_edges(comm).unwrap()
//!     })
//!     .unwrap();
//!
//! assert_eq!(edges, vec![3, 3]);
//! ```
//!
//! # Architecture
//!
//! - **Partitioning**: [`PartitionRanges`] (binary search over internal-id
//!   boundaries) and [`HashPartition`] (external ids)
//! - **Shuffling**: [`shuffle_vertices`], [`shuffle_edges`]; columns move
//!   together under one permutation
//! - **Renumbering**: [`renumber_edgelist`] into a dense, rank-ordered id space
//! - **Assembly**: [`GraphBuilder`] produces a [`GraphView`] per worker
//! - **Communication**: [`comm::SingleWorker`], [`comm::LocalCluster`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod comm;
pub mod config;
pub mod convert;
pub mod edgelist;
pub mod error;
pub mod logging;
pub mod partition;
pub mod renumber;
pub mod shuffle;
pub mod storage;
pub mod types;

// Re-export core types
pub use builder::{BuildOptions, BuildOutput, GraphBuilder};
pub use config::BuildConfig;
pub use convert::{to_coo, to_csc, to_csr, HostCompressed, HostCoo};
pub use edgelist::{EdgeList, EdgeSchema};
pub use partition::{EdgeRouting, HashPartition, PartitionRanges, VertexPartition};
pub use renumber::{renumber_edge_chunks, renumber_edgelist, RenumberMap};
pub use shuffle::{shuffle_edge_chunks, shuffle_edges, shuffle_vertex_value_pairs, shuffle_vertices};
pub use storage::{CompressedAdjacency, GraphView};
pub use types::{EdgeTime, EdgeTypeId, GraphProperties, IdType, MergePolicy, Orientation, Weight};

// Error type
pub use error::{ConfigError, GraphError, Result, ValidationError};
