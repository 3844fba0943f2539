//! Communication context for collective operations
//!
//! Every shuffle, renumber and validation step is a collective: all workers
//! call it together, with the same arguments shape, in the same order. The
//! context is passed explicitly; there is no process-wide state.
//!
//! - [`SingleWorker`]: one worker, every exchange is a local move
//! - [`ThreadComm`]: one OS thread per worker, channel lanes between them
//!   (see [`LocalCluster`])

mod thread;

pub use thread::{LocalCluster, ThreadComm};

use crate::error::{GraphError, Result};

/// Collective communication primitives
///
/// Implementors provide [`Communicator::all_to_all`]; the remaining
/// collectives are derived from it.
pub trait Communicator {
    /// Rank of this worker, `0..size()`
    fn rank(&self) -> usize;

    /// Number of participating workers
    fn size(&self) -> usize;

    /// Personalised all-to-all exchange
    ///
    /// `outbound[r]` is delivered to rank `r`; the result holds, at index
    /// `r`, what rank `r` sent to this worker. Messages between one pair of
    /// workers arrive in the order they were sent.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Collective`] if `outbound.len() != size()` or a
    /// peer cannot complete the exchange. No partial result is returned.
    fn all_to_all<T: Send + 'static>(&self, outbound: Vec<T>) -> Result<Vec<T>>;

    /// Every worker receives every worker's `value`, in rank order
    ///
    /// # Errors
    ///
    /// Propagates exchange failures
    fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Result<Vec<T>> {
        self.all_to_all(vec![value; self.size()])
    }

    /// Block until every worker reaches this point
    ///
    /// # Errors
    ///
    /// Propagates exchange failures
    fn barrier(&self) -> Result<()> {
        self.all_gather(()).map(|_| ())
    }

    /// Sum of `value` across workers
    ///
    /// # Errors
    ///
    /// Propagates exchange failures
    fn all_reduce_sum(&self, value: u64) -> Result<u64> {
        Ok(self.all_gather(value)?.into_iter().sum())
    }

    /// Maximum of `value` across workers
    ///
    /// # Errors
    ///
    /// Propagates exchange failures
    fn all_reduce_max(&self, value: u64) -> Result<u64> {
        Ok(self.all_gather(value)?.into_iter().max().unwrap_or(0))
    }

    /// Exclusive prefix sum of `value` in rank order, plus the grand total
    ///
    /// # Errors
    ///
    /// Propagates exchange failures
    fn exclusive_scan(&self, value: u64) -> Result<(u64, u64)> {
        let counts = self.all_gather(value)?;
        let offset = counts[..self.rank()].iter().sum();
        let total = counts.iter().sum();
        Ok((offset, total))
    }

    /// Collective agreement on a locally computed outcome
    ///
    /// A worker holding `Err` returns its own precise error; every other
    /// worker learns the first failing rank and returns
    /// [`GraphError::PeerRejected`]. Nobody proceeds with partial state.
    ///
    /// # Errors
    ///
    /// The local error, a peer's rejection, or an exchange failure
    fn agree<T>(&self, local: Result<T>) -> Result<T> {
        let status = local.as_ref().err().map(ToString::to_string);
        let statuses = self.all_gather(status)?;
        let value = local?;
        match statuses
            .into_iter()
            .enumerate()
            .find_map(|(rank, status)| status.map(|message| (rank, message)))
        {
            Some((rank, message)) => Err(GraphError::PeerRejected { rank, message }),
            None => Ok(value),
        }
    }
}

/// Communication context for a single worker
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleWorker;

impl Communicator for SingleWorker {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_to_all<T: Send + 'static>(&self, outbound: Vec<T>) -> Result<Vec<T>> {
        if outbound.len() != 1 {
            return Err(GraphError::collective(format!(
                "all_to_all: {} outbound lanes for 1 worker",
                outbound.len()
            )));
        }
        Ok(outbound)
    }
}
