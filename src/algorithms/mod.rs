//! Distributed graph algorithms (BFS, `PageRank`)
//!
//! Both run as rounds over an [`EdgeFrontierCommunicator`]: local work on the
//! rank's edge slice, one collective exchange, local update. Every rank must
//! call the same entry point with the same arguments.

pub mod bfs;
pub mod pagerank;

pub use bfs::{bfs, multi_source_bfs, BfsResult, BfsState, FrontierBFSEngine};
pub use pagerank::{pagerank, PageRankResult, PageRankSolver};

use crate::comm::{Collective, EdgeFrontierCommunicator};
use crate::error::{GraphError, Result};
use crate::partition::VertexPartition;
use crate::storage::LocalGraph;
use crate::types::VertexId;
use tracing::warn;

const CHECK_OK: u64 = 0;
const CHECK_INVALID_VERTEX: u64 = 1;
const CHECK_MISPLACED_VERTEX: u64 = 2;

/// Expensive pre-run validation, agreed across ranks
///
/// Each rank checks its own edge slice against its partition view, then the
/// outcomes are exchanged so that every rank fails with the same error (the
/// one found by the lowest failing rank) instead of leaving peers blocked in
/// the first round. Partition views are compared afterwards.
pub(crate) async fn expensive_check<C, V>(
    exchange: &EdgeFrontierCommunicator<'_, C, V>,
    graph: &LocalGraph<V>,
) -> Result<()>
where
    C: Collective + ?Sized,
    V: VertexId,
{
    let partition: &VertexPartition<V> = exchange.partition();
    let local = match graph.validate(partition) {
        Ok(()) => [CHECK_OK, 0],
        Err(GraphError::InvalidVertexId { id, .. }) => [CHECK_INVALID_VERTEX, id],
        Err(GraphError::ConfigurationMismatch { vertex, .. }) => [CHECK_MISPLACED_VERTEX, vertex],
        Err(other) => return Err(other),
    };

    let outcomes = exchange.all_gather(&local).await?;
    for (rank, outcome) in outcomes.iter().enumerate() {
        match outcome.as_slice() {
            [CHECK_INVALID_VERTEX, id] => {
                warn!(rank = exchange.rank(), failing = rank, id, "edge outside id space");
                return Err(GraphError::InvalidVertexId {
                    id: *id,
                    global_vertex_count: partition.global_vertex_count().as_u64(),
                });
            }
            [CHECK_MISPLACED_VERTEX, vertex] => {
                warn!(rank = exchange.rank(), failing = rank, vertex, "edge stored off its owner");
                return Err(GraphError::ConfigurationMismatch {
                    vertex: *vertex,
                    detected_by: rank,
                });
            }
            _ => {}
        }
    }

    exchange.verify_agreement().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalProcessGroup;

    #[tokio::test]
    async fn test_expensive_check_fails_on_every_rank() {
        let results = LocalProcessGroup::run_each(2, |comm| async move {
            let partition = VertexPartition::<u32>::from_offsets(vec![0, 4, 8], comm.rank())?;
            let exchange = EdgeFrontierCommunicator::new(&comm, &partition)?;
            // Rank 1 holds an edge into vertex 2, which rank 0 owns.
            let graph = if comm.rank() == 0 {
                LocalGraph::from_edges(&[(5, 1)])?
            } else {
                LocalGraph::from_edges(&[(0, 6), (3, 2)])?
            };
            expensive_check(&exchange, &graph).await
        })
        .await;

        for result in results {
            assert_eq!(
                result.unwrap_err(),
                GraphError::ConfigurationMismatch {
                    vertex: 2,
                    detected_by: 1
                }
            );
        }
    }

    #[tokio::test]
    async fn test_expensive_check_passes_valid_placement() {
        LocalProcessGroup::run(2, |comm| async move {
            let partition = VertexPartition::<u64>::from_offsets(vec![0, 4, 8], comm.rank())?;
            let exchange = EdgeFrontierCommunicator::new(&comm, &partition)?;
            let graph = if comm.rank() == 0 {
                LocalGraph::from_edges(&[(5, 1), (7, 3)])?
            } else {
                LocalGraph::from_edges(&[(0, 6)])?
            };
            expensive_check(&exchange, &graph).await
        })
        .await
        .unwrap();
    }
}
