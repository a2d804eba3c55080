//! Distributed `PageRank` by power iteration
//!
//! Based on Page et al. (1999) "The `PageRank` Citation Ranking: Bringing Order to the Web",
//! with dangling-node mass redistributed along the personalization vector.
//!
//! # Algorithm
//!
//! ```text
//! D        = Σ score[v] over zero-out-degree v          (all-reduce)
//! agg[u]   = Σ score[v] / outdeg(v) over edges v → u     (push, summed at owner)
//! new[u]   = (1 - d)·p[u] + d·(agg[u] + D·p[u])
//! ```
//!
//! `outdeg` is the global out-degree: a source's edges are spread across every
//! rank owning one of its destinations, so degrees are summed once up front.
//! Source contributions are all-gathered each iteration because the source of
//! a local edge may be owned elsewhere.

use super::expensive_check;
use crate::comm::{Collective, EdgeFrontierCommunicator};
use crate::config::{PageRankConfig, Personalization};
use crate::error::{GraphError, Result};
use crate::partition::VertexPartition;
use crate::storage::LocalGraph;
use crate::types::{Score, VertexId};
use rayon::prelude::*;
use tracing::{debug, debug_span, info, Instrument};

/// Per-partition scores plus run statistics
#[derive(Debug, Clone, PartialEq)]
pub struct PageRankResult<S: Score> {
    /// Scores of the locally owned vertices, indexed by local offset
    pub scores: Vec<S>,

    /// Iterations executed
    pub iterations: usize,

    /// Whether the L1 change dropped below the configured tolerance
    pub converged: bool,

    /// Global L1 change of the last iteration
    pub last_l1_change: f64,

    /// Global score sum after each iteration
    pub mass_history: Vec<f64>,
}

impl<S: Score> PageRankResult<S> {
    /// `(global id, score)` for every locally owned vertex
    ///
    /// `partition` must be the view the solver ran with.
    pub fn iter_global<'a, V: VertexId>(
        &'a self,
        partition: &'a VertexPartition<V>,
    ) -> impl Iterator<Item = (V, S)> + 'a {
        partition.local_ids().zip(self.scores.iter().copied())
    }
}

/// Power-iteration solver bound to one rank
///
/// Holds no state between [`solve`](Self::solve) calls: solving twice with the
/// same inputs gives identical results.
#[derive(Debug)]
pub struct PageRankSolver<'a, C: ?Sized, V: VertexId, S: Score> {
    exchange: EdgeFrontierCommunicator<'a, C, V>,
    graph: &'a LocalGraph<V>,
    config: PageRankConfig,
    personalization: Option<Personalization<V, S>>,
}

impl<'a, C, V, S> PageRankSolver<'a, C, V, S>
where
    C: Collective + ?Sized,
    V: VertexId,
    S: Score,
{
    /// Bind a solver to this rank's transport, partition view and edge slice
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid config or a partition that does
    /// not match the transport.
    pub fn new(
        comm: &'a C,
        partition: &'a VertexPartition<V>,
        graph: &'a LocalGraph<V>,
        config: PageRankConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            exchange: EdgeFrontierCommunicator::new(comm, partition)?,
            graph,
            config,
            personalization: None,
        })
    }

    /// Restart along `personalization` instead of uniformly
    #[must_use]
    pub fn with_personalization(mut self, personalization: Personalization<V, S>) -> Self {
        self.personalization = Some(personalization);
        self
    }

    /// Run the power iteration
    ///
    /// Collective: every rank must call it.
    ///
    /// # Errors
    ///
    /// - `InvalidGraph` if the global graph has no edges
    /// - `InvalidVertexId` / `InvalidArgument` for a bad personalization
    ///   entry, `InvalidArgument` if the personalization sums to 0
    /// - with `do_expensive_check`, the collective placement errors
    /// - collective aborts and transport failures
    pub async fn solve(&self) -> Result<PageRankResult<S>> {
        let partition = self.exchange.partition();
        let n = partition.global_vertex_count().index();
        let local_len = partition.local_len();

        // Argument errors surface before the first exchange.
        let entries = self.personalization_entries()?;

        let total_edges = self
            .exchange
            .all_reduce_sum(self.graph.num_edges() as u64)
            .await?;
        if total_edges == 0 {
            return Err(GraphError::InvalidGraph(
                "pagerank needs at least one edge".into(),
            ));
        }

        if self.config.do_expensive_check {
            expensive_check(&self.exchange, self.graph).await?;
        }

        let out_degrees = self.global_out_degrees().await?;
        let restart = self.restart_distribution(entries).await?;

        let damping = S::from_f64_lossy(self.config.damping_factor);
        let teleport = S::one() - damping;
        let initial = S::from_usize(n)
            .map(S::recip)
            .ok_or_else(|| GraphError::invalid_argument("vertex count overflows the score type"))?;

        let mut scores = vec![initial; local_len];
        let mut next = vec![S::zero(); local_len];
        let mut aggregate = vec![S::zero(); local_len];
        let mut mass_history = Vec::with_capacity(self.config.max_iterations);
        let mut last_l1_change = f64::INFINITY;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            // Float reductions stay sequential so re-runs sum in the same order.
            let local_dangling: S = scores
                .iter()
                .zip(&out_degrees)
                .filter(|&(_, &degree)| degree == 0)
                .map(|(&score, _)| score)
                .sum();
            let dangling = self.exchange.all_reduce_sum(local_dangling).await?;

            let local_contributions: Vec<S> = scores
                .par_iter()
                .zip(&out_degrees)
                .map(|(&score, &degree)| match S::from_u64(degree) {
                    Some(d) if degree > 0 => score / d,
                    _ => S::zero(),
                })
                .collect();
            let contributions = self.exchange.all_gather_concat(&local_contributions).await?;

            aggregate.fill(S::zero());
            self.exchange
                .push_all_reduce(
                    self.graph,
                    |src, _, _| contributions.get(src.index()).copied(),
                    |a: S, b: S| a + b,
                    |offset, sum| aggregate[offset] = sum,
                )
                .await?;

            next.par_iter_mut()
                .zip(&aggregate)
                .zip(&restart)
                .for_each(|((out, &agg), &p)| {
                    *out = teleport * p + damping * (agg + dangling * p);
                });

            let (local_l1, local_mass) = next
                .iter()
                .zip(&scores)
                .fold((S::zero(), S::zero()), |(l1, mass), (&new, &old)| {
                    (l1 + (new - old).abs(), mass + new)
                });
            let totals = self
                .exchange
                .all_reduce(&[local_l1, local_mass], |a, b| a + b)
                .await?;

            std::mem::swap(&mut scores, &mut next);
            iterations += 1;
            last_l1_change = totals[0].to_f64_lossy();
            let mass = totals[1].to_f64_lossy();
            mass_history.push(mass);

            debug!(
                rank = self.exchange.rank(),
                iteration = iterations,
                dangling = dangling.to_f64_lossy(),
                l1_change = last_l1_change,
                mass,
                "pagerank iteration"
            );

            if self
                .config
                .tolerance
                .is_some_and(|tolerance| last_l1_change < tolerance)
            {
                converged = true;
                break;
            }
        }

        info!(
            rank = self.exchange.rank(),
            iterations,
            converged,
            l1_change = last_l1_change,
            "pagerank finished"
        );

        Ok(PageRankResult {
            scores,
            iterations,
            converged,
            last_l1_change,
            mass_history,
        })
    }

    /// Global out-degree of every locally owned vertex
    async fn global_out_degrees(&self) -> Result<Vec<u64>> {
        let mut degrees = vec![0_u64; self.exchange.partition().local_len()];
        let local: Vec<(V, u64)> = self
            .graph
            .local_out_degrees()
            .map(|(src, degree)| (src, degree as u64))
            .collect();
        self.exchange
            .route_reduce(local, |a, b| a + b, |offset, degree| degrees[offset] = degree)
            .await?;
        Ok(degrees)
    }

    /// This rank's personalization entries, checked against the partition
    fn personalization_entries(&self) -> Result<Option<Vec<(V, S)>>> {
        let Some(personalization) = &self.personalization else {
            return Ok(None);
        };
        let partition = self.exchange.partition();

        let mut entries = Vec::with_capacity(personalization.vertices.len());
        for (&vertex, &value) in personalization
            .vertices
            .iter()
            .zip(&personalization.values)
        {
            partition.owner_of(vertex)?;
            if !value.is_finite() || value < S::zero() {
                return Err(GraphError::invalid_argument(format!(
                    "personalization weight {value} for vertex {vertex} \
                     must be finite and non-negative"
                )));
            }
            entries.push((vertex, value));
        }
        Ok(Some(entries))
    }

    /// Normalized restart weights of the locally owned vertices
    async fn restart_distribution(&self, entries: Option<Vec<(V, S)>>) -> Result<Vec<S>> {
        let partition = self.exchange.partition();
        let Some(entries) = entries else {
            let uniform = S::from_usize(partition.global_vertex_count().index())
                .map(S::recip)
                .ok_or_else(|| {
                    GraphError::invalid_argument("vertex count overflows the score type")
                })?;
            return Ok(vec![uniform; partition.local_len()]);
        };

        let mut restart = vec![S::zero(); partition.local_len()];
        self.exchange
            .route_reduce(entries, |a, b| a + b, |offset, value| restart[offset] = value)
            .await?;

        let local_sum: S = restart.iter().copied().sum();
        let total = self.exchange.all_reduce_sum(local_sum).await?;
        if total <= S::zero() {
            return Err(GraphError::invalid_argument(
                "personalization values sum to zero",
            ));
        }
        restart.par_iter_mut().for_each(|p| *p = *p / total);
        Ok(restart)
    }
}

/// `PageRank` with an optional personalization vector
///
/// Collective: every rank calls it with the same config.
///
/// # Errors
///
/// See [`PageRankSolver::solve`].
pub async fn pagerank<C, V, S>(
    comm: &C,
    partition: &VertexPartition<V>,
    graph: &LocalGraph<V>,
    config: &PageRankConfig,
    personalization: Option<Personalization<V, S>>,
) -> Result<PageRankResult<S>>
where
    C: Collective + ?Sized,
    V: VertexId,
    S: Score,
{
    let span = debug_span!(
        "pagerank",
        rank = comm.rank(),
        damping = config.damping_factor,
        personalized = personalization.is_some()
    );
    async move {
        let mut solver = PageRankSolver::new(comm, partition, graph, config.clone())?;
        if let Some(personalization) = personalization {
            solver = solver.with_personalization(personalization);
        }
        solver.solve().await
    }
    .instrument(span)
    .await
}
