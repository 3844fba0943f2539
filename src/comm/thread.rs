//! In-process worker group: one thread per rank, channel lanes between them

use super::Communicator;
use crate::error::{GraphError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// One message on a worker-to-worker lane
struct Envelope {
    /// Collective sequence number of the sender
    seq: u64,
    payload: Box<dyn Any + Send>,
}

/// Communication context for one worker of a [`LocalCluster`]
///
/// Holds a sender to, and a receiver from, every rank. Lanes are unbounded so
/// the send half of an exchange never blocks; only the receive half waits.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    senders: Vec<Sender<Envelope>>,
    receivers: Vec<Receiver<Envelope>>,
    seq: AtomicU64,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("seq", &self.seq.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ThreadComm {
    fn recv_from(&self, peer: usize) -> Result<Envelope> {
        let lane = &self.receivers[peer];
        match self.timeout {
            Some(timeout) => lane.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => GraphError::collective(format!(
                    "worker {} timed out waiting for worker {peer}",
                    self.rank
                )),
                RecvTimeoutError::Disconnected => {
                    GraphError::collective(format!("worker {peer} disconnected"))
                }
            }),
            None => lane
                .recv()
                .map_err(|_| GraphError::collective(format!("worker {peer} disconnected"))),
        }
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_to_all<T: Send + 'static>(&self, outbound: Vec<T>) -> Result<Vec<T>> {
        if outbound.len() != self.size {
            return Err(GraphError::collective(format!(
                "all_to_all: {} outbound lanes for {} workers",
                outbound.len(),
                self.size
            )));
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        trace!(rank = self.rank, seq, "all_to_all");

        let mut inbound: Vec<Option<T>> = (0..self.size).map(|_| None).collect();

        for (peer, payload) in outbound.into_iter().enumerate() {
            if peer == self.rank {
                inbound[peer] = Some(payload);
                continue;
            }
            self.senders[peer]
                .send(Envelope {
                    seq,
                    payload: Box::new(payload),
                })
                .map_err(|_| GraphError::collective(format!("worker {peer} disconnected")))?;
        }

        for peer in (0..self.size).filter(|&peer| peer != self.rank) {
            let envelope = self.recv_from(peer)?;
            if envelope.seq != seq {
                return Err(GraphError::collective(format!(
                    "worker {peer} is at collective {}, worker {} at {seq}",
                    envelope.seq, self.rank
                )));
            }
            let payload = envelope.payload.downcast::<T>().map_err(|_| {
                GraphError::collective(format!(
                    "worker {peer} sent an unexpected payload type at collective {seq}"
                ))
            })?;
            inbound[peer] = Some(*payload);
        }

        inbound
            .into_iter()
            .enumerate()
            .map(|(peer, msg)| {
                msg.ok_or_else(|| GraphError::collective(format!("no message from worker {peer}")))
            })
            .collect()
    }
}

/// Factory and launcher for an in-process worker group
///
/// # Example
///
/// ```
/// use trueno_graph_dist::comm::{Communicator, LocalCluster};
///
/// let sums = LocalCluster::new(3)
///     .run(|comm| comm.all_reduce_sum(comm.rank() as u64))
///     .unwrap();
/// assert!(sums.into_iter().all(|s| s.unwrap() == 3));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LocalCluster {
    size: usize,
    timeout: Option<Duration>,
}

impl LocalCluster {
    /// Group of `size` workers (at least one)
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            timeout: None,
        }
    }

    /// Fail a collective when a peer is silent for longer than `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of workers
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Wire up one communicator per rank
    #[must_use]
    pub fn communicators(&self) -> Vec<ThreadComm> {
        let n = self.size;
        // lanes[from][to]
        let mut senders: Vec<Vec<Sender<Envelope>>> = (0..n).map(|_| Vec::with_capacity(n)).collect();
        let mut receivers: Vec<Vec<Receiver<Envelope>>> =
            (0..n).map(|_| Vec::with_capacity(n)).collect();

        for from in 0..n {
            for to_receivers in receivers.iter_mut() {
                let (tx, rx) = unbounded();
                senders[from].push(tx);
                to_receivers.push(rx);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadComm {
                rank,
                size: n,
                senders,
                receivers,
                seq: AtomicU64::new(0),
                timeout: self.timeout,
            })
            .collect()
    }

    /// Run `f` on every worker, each on its own thread, and collect results by rank
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Collective`] if a worker thread cannot be spawned
    /// or panics.
    pub fn run<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(&ThreadComm) -> R + Sync,
        R: Send,
    {
        let f = &f;
        std::thread::scope(|scope| {
            let handles = self
                .communicators()
                .into_iter()
                .map(|comm| {
                    std::thread::Builder::new()
                        .name(format!("graph-worker-{}", comm.rank))
                        .spawn_scoped(scope, move || f(&comm))
                        .map_err(|e| GraphError::collective(format!("spawn failed: {e}")))
                })
                .collect::<Result<Vec<_>>>()?;

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .map_err(|_| GraphError::collective(format!("worker {rank} panicked")))
                })
                .collect()
        })
    }

    /// Run `f` on every worker using tokio's blocking pool
    ///
    /// For callers already inside an async runtime; collectives still block,
    /// so they must not run on the async worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Collective`] if a worker task panics or is cancelled.
    pub async fn run_async<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(&ThreadComm) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        let f = Arc::new(f);
        let handles: Vec<_> = self
            .communicators()
            .into_iter()
            .map(|comm| {
                let f = Arc::clone(&f);
                tokio::task::spawn_blocking(move || f(&comm))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (rank, handle) in handles.into_iter().enumerate() {
            results.push(
                handle
                    .await
                    .map_err(|e| GraphError::collective(format!("worker {rank} aborted: {e}")))?,
            );
        }
        Ok(results)
    }
}
