//! Process-group handle: broadcast, all-to-all, barrier
//!
//! Bootstrap (rank discovery, network setup) happens outside this crate and
//! hands each rank a [`Collective`]. [`LocalProcessGroup`] is the loopback
//! implementation: one tokio task per rank, one FIFO channel per ordered pair
//! of ranks.
//!
//! Every primitive is collective: all ranks must call the same sequence of
//! primitives. Per-pair FIFO ordering is what keeps round `r + 1` traffic from
//! being consumed as round `r`.

use crate::error::{GraphError, Result};
use async_trait::async_trait;
use std::future::Future;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// Network handle exposing the three primitives the engines consume
///
/// Payloads are opaque byte buffers; framing lives in the exchange layer.
#[async_trait]
pub trait Collective: Send + Sync {
    /// This rank's id, `0..size()`
    fn rank(&self) -> usize;

    /// Number of ranks in the group
    fn size(&self) -> usize;

    /// Deliver `payload` from `root` to every rank (root included)
    ///
    /// Only the root's payload is read; other ranks pass `None`.
    async fn broadcast(&self, root: usize, payload: Option<Vec<u8>>) -> Result<Vec<u8>>;

    /// Send `outgoing[j]` to rank `j`; return the buffers received, indexed by
    /// sender rank
    async fn all_to_all(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>>;

    /// Block until every rank has reached the barrier
    async fn barrier(&self) -> Result<()>;
}

/// One rank's endpoint in a [`LocalProcessGroup`]
#[derive(Debug)]
pub struct LocalTransport {
    rank: usize,
    size: usize,
    /// `outbox[j]` delivers to rank `j`
    outbox: Vec<UnboundedSender<Vec<u8>>>,
    /// `inbox[j]` receives from rank `j`
    inbox: Mutex<Vec<UnboundedReceiver<Vec<u8>>>>,
}

impl LocalTransport {
    /// This rank's id
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the group
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    fn send_to(&self, to: usize, payload: Vec<u8>) -> Result<()> {
        self.outbox[to]
            .send(payload)
            .map_err(|_| GraphError::transport(format!("rank {to} disconnected")))
    }
}

#[async_trait]
impl Collective for LocalTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn broadcast(&self, root: usize, payload: Option<Vec<u8>>) -> Result<Vec<u8>> {
        if root >= self.size {
            return Err(GraphError::invalid_argument(format!(
                "broadcast root {root} outside group of size {}",
                self.size
            )));
        }

        if self.rank == root {
            let payload = payload.ok_or_else(|| {
                GraphError::invalid_argument("broadcast root must supply a payload")
            })?;
            for to in 0..self.size {
                self.send_to(to, payload.clone())?;
            }
        }

        let mut inbox = self.inbox.lock().await;
        inbox[root]
            .recv()
            .await
            .ok_or_else(|| GraphError::transport(format!("rank {root} disconnected")))
    }

    async fn all_to_all(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>> {
        if outgoing.len() != self.size {
            return Err(GraphError::invalid_argument(format!(
                "all_to_all needs {} buffers, got {}",
                self.size,
                outgoing.len()
            )));
        }

        for (to, payload) in outgoing.into_iter().enumerate() {
            self.send_to(to, payload)?;
        }

        let mut inbox = self.inbox.lock().await;
        let mut received = Vec::with_capacity(self.size);
        for (from, rx) in inbox.iter_mut().enumerate() {
            let payload = rx
                .recv()
                .await
                .ok_or_else(|| GraphError::transport(format!("rank {from} disconnected")))?;
            received.push(payload);
        }

        Ok(received)
    }

    async fn barrier(&self) -> Result<()> {
        // An exchange of empty tokens: nobody leaves before everybody arrived,
        // and a vanished peer surfaces as an error instead of a hang.
        self.all_to_all(vec![Vec::new(); self.size]).await?;
        Ok(())
    }
}

/// In-process process group (loopback bootstrap)
///
/// # Example
///
/// ```
/// use trueno_graph_dist::comm::{Collective, LocalProcessGroup};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> trueno_graph_dist::Result<()> {
/// let ranks = LocalProcessGroup::run(3, |comm| async move {
///     comm.barrier().await?;
///     Ok(comm.rank())
/// })
/// .await?;
/// assert_eq!(ranks, vec![0, 1, 2]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LocalProcessGroup;

impl LocalProcessGroup {
    /// Create `size` connected endpoints, indexed by rank
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty group.
    pub fn new(size: usize) -> Result<Vec<LocalTransport>> {
        if size == 0 {
            return Err(GraphError::invalid_argument(
                "process group needs at least one rank",
            ));
        }

        let mut outboxes: Vec<Vec<UnboundedSender<Vec<u8>>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut inboxes: Vec<Vec<UnboundedReceiver<Vec<u8>>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();

        for to in 0..size {
            for (from, outbox) in outboxes.iter_mut().enumerate() {
                let (tx, rx) = mpsc::unbounded_channel();
                outbox.push(tx);
                debug_assert_eq!(inboxes[to].len(), from);
                inboxes[to].push(rx);
            }
        }

        Ok(outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outbox, inbox))| LocalTransport {
                rank,
                size,
                outbox,
                inbox: Mutex::new(inbox),
            })
            .collect())
    }

    /// Spawn one task per rank and collect every rank's result, in rank order
    ///
    /// A rank that panics is reported as a `Transport` error. An empty group
    /// yields a single `InvalidArgument`.
    pub async fn run_each<F, Fut, T>(size: usize, f: F) -> Vec<Result<T>>
    where
        F: Fn(LocalTransport) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let transports = match Self::new(size) {
            Ok(transports) => transports,
            Err(e) => return vec![Err(e)],
        };

        let handles: Vec<_> = transports
            .into_iter()
            .map(|transport| tokio::spawn(f(transport)))
            .collect();

        let mut results = Vec::with_capacity(size);
        for (rank, handle) in handles.into_iter().enumerate() {
            results.push(handle.await.unwrap_or_else(|e| {
                Err(GraphError::transport(format!("rank {rank} failed: {e}")))
            }));
        }
        results
    }

    /// Spawn one task per rank and return the per-rank values, in rank order
    ///
    /// When ranks fail, the first non-transport error wins (the root cause;
    /// peers of a failed rank only see it disconnect).
    ///
    /// # Errors
    ///
    /// Returns the root-cause error of a failed rank, `InvalidArgument` for an
    /// empty group.
    pub async fn run<F, Fut, T>(size: usize, f: F) -> Result<Vec<T>>
    where
        F: Fn(LocalTransport) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if size == 0 {
            return Err(GraphError::invalid_argument(
                "process group needs at least one rank",
            ));
        }

        let results = Self::run_each(size, f).await;
        let (values, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);

        let mut errors = errors.into_iter().filter_map(Result::err).peekable();
        if errors.peek().is_some() {
            let errors: Vec<GraphError> = errors.collect();
            let root_cause = errors
                .iter()
                .find(|e| !matches!(e, GraphError::Transport(_)))
                .unwrap_or(&errors[0])
                .clone();
            return Err(root_cause);
        }

        Ok(values.into_iter().filter_map(Result::ok).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_to_all_routes_by_rank() {
        let received = LocalProcessGroup::run(3, |comm| async move {
            let outgoing = (0..comm.size())
                .map(|to| vec![u8::try_from(comm.rank() * 10 + to).unwrap_or(0)])
                .collect();
            comm.all_to_all(outgoing).await
        })
        .await
        .unwrap();

        // rank 1 receives rank*10 + 1 from every rank
        assert_eq!(received[1], vec![vec![1], vec![11], vec![21]]);
        assert_eq!(received[2], vec![vec![2], vec![12], vec![22]]);
    }

    #[tokio::test]
    async fn test_broadcast_from_root() {
        let received = LocalProcessGroup::run(4, |comm| async move {
            let payload = (comm.rank() == 2).then(|| b"partition".to_vec());
            comm.broadcast(2, payload).await
        })
        .await
        .unwrap();

        assert!(received.iter().all(|p| p == b"partition"));
    }

    #[tokio::test]
    async fn test_consecutive_rounds_stay_ordered() {
        let received = LocalProcessGroup::run(2, |comm| async move {
            let mut seen = Vec::new();
            for round in 0_u8..5 {
                let got = comm.all_to_all(vec![vec![round]; 2]).await?;
                seen.push(got.concat());
                comm.barrier().await?;
            }
            Ok(seen)
        })
        .await
        .unwrap();

        for per_rank in received {
            for (round, got) in per_rank.iter().enumerate() {
                assert_eq!(got, &vec![round as u8; 2]);
            }
        }
    }

    #[tokio::test]
    async fn test_dropped_peer_is_transport_error() {
        let results = LocalProcessGroup::run_each(2, |comm| async move {
            if comm.rank() == 1 {
                return Err(GraphError::invalid_argument("rank 1 gives up"));
            }
            comm.barrier().await
        })
        .await;

        assert!(matches!(results[0], Err(GraphError::Transport(_))));
        assert!(matches!(results[1], Err(GraphError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_run_reports_root_cause() {
        let err = LocalProcessGroup::run(3, |comm| async move {
            if comm.rank() == 2 {
                return Err(GraphError::invalid_argument("bad input on rank 2"));
            }
            comm.barrier().await
        })
        .await
        .unwrap_err();

        assert_eq!(
            err,
            GraphError::InvalidArgument("bad input on rank 2".to_string())
        );
    }

    #[tokio::test]
    async fn test_all_to_all_wrong_arity() {
        let transports = LocalProcessGroup::new(2).unwrap();
        let err = transports[0].all_to_all(vec![Vec::new()]).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(LocalProcessGroup::new(0).is_err());
    }
}
