//! trueno-graph-dist: partitioned multi-rank graph analytics
//!
//! # Overview
//!
//! A graph too large for one process is split by vertex ownership across
//! cooperating ranks. Each rank stores the edges whose destination it owns and
//! runs the same round-based algorithm; rounds meet in one collective
//! exchange that routes per-edge contributions to their destination's owner.
//!
//! # Quick Start
//!
//! ```
//! use trueno_graph_dist::{
//!     bfs, pagerank, BfsConfig, LocalGraph, LocalProcessGroup, PageRankConfig, VertexPartition,
//! };
//!
//! # tokio_test::block_on(async {
//! let edges: Vec<(u32, u32)> = vec![(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)];
//!
//! // One tokio task per rank, wired through in-process channels
//! let results = LocalProcessGroup::run(2, move |comm| {
//!     let edges = edges.clone();
//!     async move {
//!         let partition = VertexPartition::uniform(4, comm.size(), comm.rank())?;
//!         let graph = LocalGraph::split_by_destination(&edges, &partition)?
//!             .swap_remove(comm.rank());
//!
//!         let traversal = bfs(&comm, &partition, &graph, 0, &BfsConfig::default()).await?;
//!         let ranks = pagerank::<_, _, f64>(
//!             &comm,
//!             &partition,
//!             &graph,
//!             &PageRankConfig::default(),
//!             None,
//!         )
//!         .await?;
//!         Ok((traversal.distances, ranks.scores))
//!     }
//! })
//! .await
//! .unwrap();
//!
//! assert_eq!(results[0].0, vec![0, 1]);
//! assert_eq!(results[1].0, vec![1, 2]);
//! let total: f64 = results.iter().flat_map(|(_, s)| s).sum();
//! assert!((total - 1.0).abs() < 1e-9);
//! # });
//! ```
//!
//! # Architecture
//!
//! - **Partition**: contiguous ownership ranges ([`VertexPartition`])
//! - **Transport**: [`Collective`] (broadcast, all-to-all, barrier), with an
//!   in-process [`LocalProcessGroup`]
//! - **Exchange**: [`EdgeFrontierCommunicator`], transform → route → reduce →
//!   update per round
//! - **Storage**: per-rank DCSR edge slice ([`LocalGraph`]), Parquet-backed
//!   with the `storage` feature
//! - **Algorithms**: [`FrontierBFSEngine`], [`PageRankSolver`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod comm;
pub mod config;
pub mod error;
pub mod partition;
pub mod storage;
pub mod types;

// Re-export core types
pub use algorithms::{
    bfs, multi_source_bfs, pagerank, BfsResult, BfsState, FrontierBFSEngine, PageRankResult,
    PageRankSolver,
};
pub use comm::{Collective, EdgeFrontierCommunicator, LocalProcessGroup, LocalTransport};
pub use config::{BfsConfig, PageRankConfig, Personalization};
pub use partition::VertexPartition;
pub use storage::LocalGraph;
pub use types::{Score, VertexId};

// Error type
pub use error::{GraphError, Result};
