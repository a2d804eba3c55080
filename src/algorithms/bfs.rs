//! Frontier-synchronous breadth-first search over partitioned edges
//!
//! Based on Ligra (Shun & Blelloch, `PPoPP` 2013) frontier-based traversal,
//! distributed the way multi-GPU `cuGraph` does it: one exchange per level.
//!
//! # Round structure
//!
//! ```text
//!   all-gather   owned bucket(depth)        -> global frontier
//!   push         frontier vertex -> local out-neighbor, candidate = its id
//!   reduce       min candidate per destination (first writer wins, deterministic)
//!   update       unreached destination: distance = depth + 1, joins bucket(depth + 1)
//!   all-reduce   new visits; zero ends the run
//! ```
//!
//! A vertex is written at most once: after its distance is finite it never
//! re-enters a bucket.

use super::expensive_check;
use crate::comm::{Collective, EdgeFrontierCommunicator};
use crate::config::BfsConfig;
use crate::error::{GraphError, Result};
use crate::partition::VertexPartition;
use crate::storage::LocalGraph;
use crate::types::VertexId;
use tracing::{debug, debug_span, info, Instrument};

/// Lifecycle of a [`FrontierBFSEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BfsState {
    /// Constructed, no sources yet
    Idle,
    /// Arrays reset and sources seeded
    Initialized,
    /// At least one round executed, more may follow
    Iterating,
    /// Terminated; the result can be taken
    Done,
}

/// Per-partition traversal output, indexed by local offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BfsResult<V: VertexId> {
    /// Hops from the nearest source, `V::INVALID` if unreached
    pub distances: Vec<V>,

    /// Neighbor that discovered the vertex, `V::INVALID` for sources and
    /// unreached vertices
    pub predecessors: Vec<V>,

    /// Expansion rounds executed
    pub rounds: usize,

    /// Vertices reached on all ranks, sources included
    pub reached: u64,
}

impl<V: VertexId> BfsResult<V> {
    /// Whether the local vertex at `offset` was reached
    #[must_use]
    pub fn is_reached(&self, offset: usize) -> bool {
        self.distances.get(offset).is_some_and(|&d| d != V::INVALID)
    }

    /// `(global id, distance, predecessor)` for every locally owned vertex
    ///
    /// `partition` must be the view the traversal ran with.
    pub fn iter_global<'a>(
        &'a self,
        partition: &'a VertexPartition<V>,
    ) -> impl Iterator<Item = (V, V, V)> + 'a {
        partition
            .local_ids()
            .zip(&self.distances)
            .zip(&self.predecessors)
            .map(|((id, &distance), &predecessor)| (id, distance, predecessor))
    }
}

/// Round-based traversal engine bound to one rank
///
/// # Example
///
/// ```
/// use trueno_graph_dist::{
///     BfsConfig, BfsState, FrontierBFSEngine, LocalGraph, LocalProcessGroup, VertexPartition,
/// };
///
/// # tokio_test::block_on(async {
/// // 0 → 1 → 2 → 3, vertices split [0, 2) and [2, 4); edges live with their destination
/// let results = LocalProcessGroup::run(2, |comm| async move {
///     let partition = VertexPartition::<u32>::uniform(4, 2, comm.rank())?;
///     let graph = if comm.rank() == 0 {
///         LocalGraph::from_edges(&[(0, 1)])?
///     } else {
///         LocalGraph::from_edges(&[(1, 2), (2, 3)])?
///     };
///     let mut engine = FrontierBFSEngine::new(&comm, &partition, &graph, BfsConfig::default())?;
///     engine.initialize(&[0]).await?;
///     while engine.step().await? != BfsState::Done {}
///     engine.into_result()
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(results[0].distances, vec![0, 1]);
/// assert_eq!(results[1].distances, vec![2, 3]);
/// assert_eq!(results[1].predecessors, vec![1, 2]);
/// # });
/// ```
#[derive(Debug)]
pub struct FrontierBFSEngine<'a, C: ?Sized, V: VertexId> {
    exchange: EdgeFrontierCommunicator<'a, C, V>,
    graph: &'a LocalGraph<V>,
    config: BfsConfig,
    state: BfsState,
    distances: Vec<V>,
    predecessors: Vec<V>,
    /// Locally owned global ids reached in the last round
    bucket: Vec<V>,
    depth: usize,
    reached: u64,
}

impl<'a, C: Collective + ?Sized, V: VertexId> FrontierBFSEngine<'a, C, V> {
    /// Bind an engine to this rank's transport, partition view and edge slice
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid config or a partition that does
    /// not match the transport.
    pub fn new(
        comm: &'a C,
        partition: &'a VertexPartition<V>,
        graph: &'a LocalGraph<V>,
        config: BfsConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            exchange: EdgeFrontierCommunicator::new(comm, partition)?,
            graph,
            config,
            state: BfsState::Idle,
            distances: Vec::new(),
            predecessors: Vec::new(),
            bucket: Vec::new(),
            depth: 0,
            reached: 0,
        })
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> BfsState {
        self.state
    }

    /// Rounds executed so far
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Reset the arrays and seed `sources`
    ///
    /// `sources` is the global source list, identical on every rank; each rank
    /// seeds the ones it owns. Duplicates are dropped. May be called again on
    /// a finished engine to start over.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty source list
    /// - `InvalidVertexId` for a source outside `[0, N)`
    /// - `PreconditionViolation` for direction-optimizing mode on a graph not
    ///   declared symmetric, `UnimplementedFeature` on a symmetric one
    /// - with `do_expensive_check`, the collective placement errors
    pub async fn initialize(&mut self, sources: &[V]) -> Result<()> {
        if sources.is_empty() {
            return Err(GraphError::invalid_argument("at least one source is required"));
        }
        if self.config.direction_optimizing {
            if !self.graph.is_symmetric() {
                return Err(GraphError::PreconditionViolation(
                    "direction-optimizing traversal requires a symmetric graph".into(),
                ));
            }
            return Err(GraphError::UnimplementedFeature(
                "direction-optimizing traversal",
            ));
        }

        let partition = self.exchange.partition();
        let mut sources = sources.to_vec();
        sources.sort_unstable();
        sources.dedup();
        for &source in &sources {
            partition.owner_of(source)?;
        }

        if self.config.do_expensive_check {
            expensive_check(&self.exchange, self.graph).await?;
        }

        let len = partition.local_len();
        self.distances = vec![V::INVALID; len];
        self.predecessors = vec![V::INVALID; len];
        self.bucket.clear();
        for &source in sources.iter().filter(|&&s| partition.is_local(s)) {
            let offset = partition.local_offset(source)?;
            self.distances[offset] = V::default();
            self.bucket.push(source);
        }
        self.depth = 0;
        self.reached = sources.len() as u64;
        self.state = BfsState::Initialized;

        debug!(
            rank = self.exchange.rank(),
            sources = sources.len(),
            seeded = self.bucket.len(),
            "bfs initialized"
        );
        Ok(())
    }

    /// Run one expansion round
    ///
    /// Collective: every rank must step together. Returns the state after the
    /// round; stepping a finished engine is a no-op.
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` before [`initialize`](Self::initialize),
    /// otherwise collective aborts and transport failures.
    pub async fn step(&mut self) -> Result<BfsState> {
        match self.state {
            BfsState::Idle => {
                return Err(GraphError::PreconditionViolation(
                    "bfs engine stepped before initialize".into(),
                ))
            }
            BfsState::Done => return Ok(BfsState::Done),
            BfsState::Initialized | BfsState::Iterating => {}
        }
        self.state = BfsState::Iterating;

        let next_distance = V::from_index(self.depth + 1).ok_or_else(|| {
            GraphError::invalid_argument("traversal depth overflows the vertex id type")
        })?;

        let frontier = self.exchange.all_gather_concat(&self.bucket).await?;
        let partition = self.exchange.partition();
        let distances = &mut self.distances;
        let predecessors = &mut self.predecessors;
        let mut next_bucket = Vec::new();

        self.exchange
            .push_reduce(
                self.graph,
                &frontier,
                |src, _, _| Some(src),
                |a: V, b: V| a.min(b),
                |offset, candidate| {
                    if distances[offset] == V::INVALID {
                        distances[offset] = next_distance;
                        predecessors[offset] = candidate;
                        next_bucket.push(offset);
                    }
                },
            )
            .await?;

        let new_visits = self
            .exchange
            .all_reduce_sum(next_bucket.len() as u64)
            .await?;
        self.bucket = next_bucket
            .into_iter()
            .map(|offset| partition.global_id(offset))
            .collect::<Result<_>>()?;
        self.depth += 1;
        self.reached += new_visits;

        debug!(
            rank = self.exchange.rank(),
            depth = self.depth,
            frontier = frontier.len(),
            new_visits,
            "bfs round"
        );

        let limit_hit = self.config.depth_limit.is_some_and(|limit| self.depth >= limit);
        if new_visits == 0 || limit_hit {
            self.state = BfsState::Done;
            info!(
                rank = self.exchange.rank(),
                rounds = self.depth,
                reached = self.reached,
                limit_hit,
                "bfs finished"
            );
        }
        Ok(self.state)
    }

    /// Step until done and return the result
    ///
    /// # Errors
    ///
    /// Same as [`step`](Self::step).
    pub async fn run(mut self) -> Result<BfsResult<V>> {
        while self.step().await? != BfsState::Done {}
        self.into_result()
    }

    /// Take the result of a finished traversal
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` if the engine is not [`BfsState::Done`].
    pub fn into_result(self) -> Result<BfsResult<V>> {
        if self.state != BfsState::Done {
            return Err(GraphError::PreconditionViolation(format!(
                "bfs result taken in state {:?}",
                self.state
            )));
        }
        Ok(BfsResult {
            distances: self.distances,
            predecessors: self.predecessors,
            rounds: self.depth,
            reached: self.reached,
        })
    }
}

/// Single-source BFS
///
/// Collective: every rank calls it with the same `source` and config.
///
/// # Errors
///
/// See [`FrontierBFSEngine::initialize`] and [`FrontierBFSEngine::step`].
pub async fn bfs<C, V>(
    comm: &C,
    partition: &VertexPartition<V>,
    graph: &LocalGraph<V>,
    source: V,
    config: &BfsConfig,
) -> Result<BfsResult<V>>
where
    C: Collective + ?Sized,
    V: VertexId,
{
    traverse(comm, partition, graph, &[source], config).await
}

/// Multi-source BFS: distances are hops to the nearest source
///
/// # Errors
///
/// `InvalidArgument` unless more than one source is given; otherwise as
/// [`bfs`].
pub async fn multi_source_bfs<C, V>(
    comm: &C,
    partition: &VertexPartition<V>,
    graph: &LocalGraph<V>,
    sources: &[V],
    config: &BfsConfig,
) -> Result<BfsResult<V>>
where
    C: Collective + ?Sized,
    V: VertexId,
{
    if sources.len() <= 1 {
        return Err(GraphError::invalid_argument(format!(
            "multi-source bfs needs more than one source, got {}",
            sources.len()
        )));
    }
    traverse(comm, partition, graph, sources, config).await
}

async fn traverse<C, V>(
    comm: &C,
    partition: &VertexPartition<V>,
    graph: &LocalGraph<V>,
    sources: &[V],
    config: &BfsConfig,
) -> Result<BfsResult<V>>
where
    C: Collective + ?Sized,
    V: VertexId,
{
    let span = debug_span!("bfs", rank = comm.rank(), sources = sources.len());
    async move {
        let mut engine = FrontierBFSEngine::new(comm, partition, graph, config.clone())?;
        engine.initialize(sources).await?;
        engine.run().await
    }
    .instrument(span)
    .await
}
