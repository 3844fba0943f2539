//! Error taxonomy for graph construction
//!
//! Three families, matching where a failure can be detected:
//!
//! - [`ConfigError`]: caller input is inconsistent. Detected locally, before
//!   any data is exchanged, and names the offending field.
//! - [`ValidationError`]: raised by the expensive-check pass once the
//!   adjacency has been assembled. The partially built graph is discarded.
//! - [`GraphError::Collective`]: a peer vanished, timed out or answered out of
//!   protocol. Opaque and fatal for every participating worker.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, GraphError>;

/// Top-level construction error
#[derive(Debug, Error)]
pub enum GraphError {
    /// Inconsistent caller input
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invariant violated in the built graph (expensive-check mode only)
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Vertex identifier outside the partitioned universe
    #[error("vertex {vertex} outside [0, {total})")]
    VertexOutOfRange {
        /// Offending identifier, widened for display
        vertex: i128,
        /// Size of the vertex universe
        total: u64,
    },

    /// Vertex is valid but owned by another worker
    #[error("vertex {vertex} is not owned by worker {rank}")]
    NotLocal {
        /// Offending identifier, widened for display
        vertex: i128,
        /// Worker that was asked
        rank: usize,
    },

    /// External identifier absent from the renumber map
    #[error("vertex {vertex} is not in the renumber map")]
    UnknownVertex {
        /// Offending identifier, widened for display
        vertex: i128,
    },

    /// Another worker reported a configuration or validation failure
    #[error("worker {rank} rejected the build: {message}")]
    PeerRejected {
        /// Rank of the rejecting worker
        rank: usize,
        /// Rendered error from that worker
        message: String,
    },

    /// All-to-all exchange could not complete
    #[error("collective operation failed: {0}")]
    Collective(String),
}

/// Caller-side configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An attribute column does not match the endpoint count
    #[error("column `{column}` has {actual} rows, expected {expected}")]
    ColumnLength {
        /// Column name (`dst`, `weight`, `edge_id`, ...)
        column: &'static str,
        /// Endpoint count
        expected: usize,
        /// Column length found
        actual: usize,
    },

    /// A vertex was declared more than once in the explicit vertex list
    #[error("vertex {vertex} declared more than once")]
    DuplicateVertex {
        /// Offending identifier, widened for display
        vertex: i128,
    },

    /// Simple-graph build without an attribute merge policy
    #[error("`merge_policy` is required when `is_multigraph` is false")]
    MissingMergePolicy,

    /// Identifier cannot be represented (negative without renumbering, overflow)
    #[error("identifier {value} in `{field}` is not representable")]
    InvalidIdentifier {
        /// Field the value came from
        field: &'static str,
        /// Offending value, widened for display
        value: i128,
    },

    /// Partition boundaries are malformed
    #[error("invalid partition boundaries: {0}")]
    Partition(String),

    /// Conflicting option combination
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption {
        /// Option name
        option: &'static str,
        /// Why the combination is rejected
        reason: String,
    },
}

/// Expensive-check failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Edge endpoint outside the vertex universe
    #[error("edge endpoint {vertex} outside [0, {total})")]
    EndpointOutOfRange {
        /// Offending endpoint
        vertex: u64,
        /// Vertex universe size
        total: u64,
    },

    /// Edge endpoint missing from the explicit vertex list
    #[error("edge endpoint {vertex} is not in the declared vertex list")]
    UndeclaredVertex {
        /// Offending external identifier, widened for display
        vertex: i128,
    },

    /// Parallel edge survived in a simple graph
    #[error("duplicate edge ({src}, {dst}) in a simple graph")]
    DuplicateEdge {
        /// Source (internal id)
        src: u64,
        /// Destination (internal id)
        dst: u64,
    },

    /// Undirected graph is missing the mirror of an edge
    #[error("undirected graph has ({src}, {dst}) but not its mirror")]
    MissingMirror {
        /// Source (internal id)
        src: u64,
        /// Destination (internal id)
        dst: u64,
    },

    /// Compressed offsets are not monotone or do not cover the neighbor array
    #[error("malformed offsets: {0}")]
    MalformedOffsets(String),

    /// Declared edge count disagrees with the built graph
    #[error("declared {declared} edges, built {actual}")]
    EdgeCount {
        /// `known_edge_count` supplied by the caller
        declared: u64,
        /// Edges present after construction
        actual: u64,
    },
}

impl GraphError {
    /// Shorthand for a collective failure
    pub(crate) fn collective(message: impl Into<String>) -> Self {
        Self::Collective(message.into())
    }

    /// Whether this error was raised before any graph state existed
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
