//! Edge-frontier communicator
//!
//! Based on the push-based reduction of Gunrock's advance operator and the
//! "2D-less" 1D partitioning of multi-GPU `cuGraph`: every rank evaluates its
//! local edges, contributions are routed to the owner of their destination, and
//! the owner combines them with a commutative, associative reduce before the
//! algorithm sees them.
//!
//! # Round structure
//!
//! ```text
//!   transform (rayon, per edge)   src,dst,w  ->  Option<T>
//!   combine   (local, sorted)     (dst,T)*   ->  one (dst,T) per dst
//!   route     (all-to-all)        bucket by owner_of(dst)
//!   reduce    (owner, sorted)     rank order, stable
//!   update    (owner)             once per dst, ascending local offset
//! ```
//!
//! Every exchange returns only after all ranks contributed, so it doubles as
//! the round barrier. Buffers are reduced in rank order and the sort is stable,
//! which makes the result independent of delivery timing even for
//! floating-point sums.

use super::wire::{self, Frame};
use super::{all_gather_pod, Collective};
use crate::error::{GraphError, Result};
use crate::partition::VertexPartition;
use crate::storage::LocalGraph;
use crate::types::VertexId;
use bytemuck::Pod;
use rayon::prelude::*;
use std::ops::Add;
use tracing::{trace, warn};

/// Exchange layer bound to one rank's partition view
#[derive(Debug)]
pub struct EdgeFrontierCommunicator<'a, C: ?Sized, V: VertexId> {
    comm: &'a C,
    partition: &'a VertexPartition<V>,
}

impl<'a, C: Collective + ?Sized, V: VertexId> EdgeFrontierCommunicator<'a, C, V> {
    /// Bind a transport handle to a partition view
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the partition's rank or rank count does not
    /// match the transport's.
    pub fn new(comm: &'a C, partition: &'a VertexPartition<V>) -> Result<Self> {
        if partition.num_ranks() != comm.size() || partition.rank() != comm.rank() {
            return Err(GraphError::invalid_argument(format!(
                "partition is rank {}/{} but transport is rank {}/{}",
                partition.rank(),
                partition.num_ranks(),
                comm.rank(),
                comm.size()
            )));
        }
        Ok(Self { comm, partition })
    }

    /// Transport rank
    #[must_use]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Partition view
    #[must_use]
    pub const fn partition(&self) -> &'a VertexPartition<V> {
        self.partition
    }

    /// Check that every rank holds the same partition boundaries
    ///
    /// Views are compared against rank 0's; all ranks report the same lowest
    /// disagreeing rank.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationMismatch` naming the first boundary where a rank
    /// disagrees with rank 0.
    pub async fn verify_agreement(&self) -> Result<()> {
        let views = self.all_gather(self.partition.offsets()).await?;
        let reference = &views[0];

        for (rank, view) in views.iter().enumerate().skip(1) {
            if view == reference {
                continue;
            }
            let vertex = view
                .iter()
                .zip(reference)
                .find(|(a, b)| a != b)
                .map_or(u64::MAX, |(a, _)| a.as_u64());
            warn!(rank = self.rank(), disagreeing = rank, "partition views differ");
            return Err(GraphError::ConfigurationMismatch {
                vertex,
                detected_by: rank,
            });
        }
        Ok(())
    }

    /// All-gather a `Pod` slice, indexed by source rank
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn all_gather<T: Pod>(&self, local: &[T]) -> Result<Vec<Vec<T>>> {
        all_gather_pod(self.comm, local).await
    }

    /// All-gather a `Pod` slice and concatenate in rank order
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn all_gather_concat<T: Pod>(&self, local: &[T]) -> Result<Vec<T>> {
        Ok(self.all_gather(local).await?.concat())
    }

    /// Element-wise all-reduce, folded in rank order
    ///
    /// # Errors
    ///
    /// Returns a transport error if ranks contribute different lengths.
    pub async fn all_reduce<T, R>(&self, local: &[T], op: R) -> Result<Vec<T>>
    where
        T: Pod,
        R: Fn(T, T) -> T + Send,
    {
        let mut gathered = self.all_gather(local).await?.into_iter();
        let mut acc = gathered.next().unwrap_or_default();

        for (from, contribution) in gathered.enumerate() {
            if contribution.len() != acc.len() {
                return Err(GraphError::transport(format!(
                    "rank {} contributed {} elements to an all-reduce of {}",
                    from + 1,
                    contribution.len(),
                    acc.len()
                )));
            }
            for (a, b) in acc.iter_mut().zip(contribution) {
                *a = op(*a, b);
            }
        }
        Ok(acc)
    }

    /// Scalar all-reduce sum
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn all_reduce_sum<T>(&self, value: T) -> Result<T>
    where
        T: Pod + Add<Output = T>,
    {
        let reduced = self.all_reduce(&[value], |a, b| a + b).await?;
        Ok(reduced[0])
    }

    /// Scalar all-reduce max
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn all_reduce_max<T>(&self, value: T) -> Result<T>
    where
        T: Pod + PartialOrd,
    {
        let reduced = self
            .all_reduce(&[value], |a, b| if b > a { b } else { a })
            .await?;
        Ok(reduced[0])
    }

    /// Logical OR across ranks
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn all_reduce_any(&self, flag: bool) -> Result<bool> {
        Ok(self.all_reduce_max(u8::from(flag)).await? != 0)
    }

    /// Collective barrier
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn barrier(&self) -> Result<()> {
        self.comm.barrier().await
    }

    /// For each local out-edge of each vertex in `sources`, push
    /// `transform(src, dst, weight)` to the owner of `dst`
    ///
    /// `update(local_offset, value)` runs once per locally owned destination
    /// that received at least one contribution, with all contributions folded
    /// by `reduce`, in ascending local-offset order. Returns the number of
    /// destinations updated on this rank.
    ///
    /// `transform` and `reduce` run on the rayon pool and must be pure.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationMismatch` on every rank if any rank produced a
    /// contribution for an id outside the partition, or a transport error.
    pub async fn push_reduce<T, F, R, U>(
        &self,
        graph: &LocalGraph<V>,
        sources: &[V],
        transform: F,
        reduce: R,
        update: U,
    ) -> Result<usize>
    where
        T: Pod + Send,
        F: Fn(V, V, Option<f32>) -> Option<T> + Sync + Send,
        R: Fn(T, T) -> T + Sync + Send,
        U: FnMut(usize, T) + Send,
    {
        let transform = &transform;
        let contributions: Vec<(V, T)> = sources
            .par_iter()
            .flat_map_iter(|&src| {
                graph
                    .out_edges(src)
                    .filter_map(move |(dst, weight)| transform(src, dst, weight).map(|t| (dst, t)))
            })
            .collect();

        self.route_reduce(contributions, reduce, update).await
    }

    /// [`push_reduce`](Self::push_reduce) over every local edge
    ///
    /// # Errors
    ///
    /// Same as [`push_reduce`](Self::push_reduce).
    pub async fn push_all_reduce<T, F, R, U>(
        &self,
        graph: &LocalGraph<V>,
        transform: F,
        reduce: R,
        update: U,
    ) -> Result<usize>
    where
        T: Pod + Send,
        F: Fn(V, V, Option<f32>) -> Option<T> + Sync + Send,
        R: Fn(T, T) -> T + Sync + Send,
        U: FnMut(usize, T) + Send,
    {
        let contributions: Vec<(V, T)> = graph
            .par_edges()
            .filter_map(|(src, dst, weight)| transform(src, dst, weight).map(|t| (dst, t)))
            .collect();

        self.route_reduce(contributions, reduce, update).await
    }

    /// Route explicit `(vertex, value)` contributions to their owners and
    /// reduce them there
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationMismatch` on every rank if any rank produced a
    /// contribution for an id outside `[0, N)`, or received one it does not
    /// own (divergent partition views). No update runs in either case.
    /// Transport failures are returned as is.
    pub async fn route_reduce<T, R, U>(
        &self,
        mut contributions: Vec<(V, T)>,
        reduce: R,
        mut update: U,
    ) -> Result<usize>
    where
        T: Pod + Send,
        R: Fn(T, T) -> T + Sync + Send,
        U: FnMut(usize, T) + Send,
    {
        let num_ranks = self.comm.size();

        // Sender-side combine: one contribution per destination on the wire.
        contributions.par_sort_by_key(|&(dst, _)| dst);
        let combined = combine_sorted(contributions, &reduce);

        let mut ids: Vec<Vec<V>> = vec![Vec::new(); num_ranks];
        let mut values: Vec<Vec<T>> = vec![Vec::new(); num_ranks];
        let mut unowned = None;
        for (dst, value) in combined {
            if let Ok(owner) = self.partition.owner_of(dst) {
                ids[owner].push(dst);
                values[owner].push(value);
            } else {
                unowned.get_or_insert(dst.as_u64());
            }
        }

        let outgoing: Vec<Vec<u8>> = if let Some(vertex) = unowned {
            warn!(rank = self.rank(), vertex, "destination owned by no partition, aborting round");
            vec![wire::encode_abort(vertex); num_ranks]
        } else {
            ids.iter()
                .zip(&values)
                .map(|(i, v)| wire::encode_data(i, v))
                .collect()
        };
        let sent: usize = ids.iter().map(Vec::len).sum();

        let received = self.comm.all_to_all(outgoing).await?;

        let mut frames = Vec::with_capacity(num_ranks);
        for (from, buf) in received.iter().enumerate() {
            frames.push(wire::decode::<V, T>(buf, from)?);
        }
        if let Some((from, vertex)) = frames.iter().enumerate().find_map(|(from, f)| match f {
            Frame::Abort { vertex } => Some((from, *vertex)),
            Frame::Data { .. } => None,
        }) {
            warn!(rank = self.rank(), vertex, detected_by = from, "round aborted collectively");
            return Err(GraphError::ConfigurationMismatch {
                vertex,
                detected_by: from,
            });
        }

        let mut incoming: Vec<(V, T)> = Vec::new();
        for frame in frames {
            if let Frame::Data { ids, values } = frame {
                incoming.extend(ids.into_iter().zip(values));
            }
        }
        let received_count = incoming.len();
        incoming.par_sort_by_key(|&(dst, _)| dst);

        let mut resolved = Vec::with_capacity(received_count);
        let mut foreign = None;
        for (dst, value) in combine_sorted(incoming, &reduce) {
            match self.partition.local_offset(dst) {
                Ok(offset) => resolved.push((offset, value)),
                Err(_) => {
                    foreign.get_or_insert(dst.as_u64());
                }
            }
        }

        // Receivers agree that every id resolved before any update is applied.
        let status = foreign.map_or([0_u64, 0], |vertex| [1, vertex]);
        let statuses = self.all_gather(&status).await?;
        let failed = statuses
            .iter()
            .enumerate()
            .find_map(|(from, status)| match status.as_slice() {
                [1, vertex] => Some((from, *vertex)),
                _ => None,
            });
        if let Some((from, vertex)) = failed {
            warn!(rank = self.rank(), vertex, detected_by = from, "received id not owned here");
            return Err(GraphError::ConfigurationMismatch {
                vertex,
                detected_by: from,
            });
        }

        let delivered = resolved.len();
        for (offset, value) in resolved {
            update(offset, value);
        }

        trace!(
            rank = self.rank(),
            sent,
            received = received_count,
            delivered,
            "exchange complete"
        );
        Ok(delivered)
    }
}

/// Fold runs of equal ids in an id-sorted list, preserving first-seen order
/// within a run
fn combine_sorted<V, T, R>(pairs: Vec<(V, T)>, reduce: &R) -> Vec<(V, T)>
where
    V: VertexId,
    T: Copy,
    R: Fn(T, T) -> T,
{
    let mut out: Vec<(V, T)> = Vec::with_capacity(pairs.len());
    for (id, value) in pairs {
        match out.last_mut() {
            Some((last, acc)) if *last == id => *acc = reduce(*acc, value),
            _ => out.push((id, value)),
        }
    }
    out
}
