//! Graph storage layer
//!
//! Per-worker compressed adjacency (CSR or CSC) and the read-only
//! [`GraphView`] handed to consumers.

pub mod csr;
mod view;

pub(crate) use view::EdgeColumns;

pub use csr::CompressedAdjacency;
pub use view::GraphView;
