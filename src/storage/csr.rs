//! Local edge slice in doubly compressed sparse row (DCSR) form
//!
//! Based on `GraphBLAST` (Yang et al., ACM `ToMS` 2022) hypersparse storage: a
//! rank holds the edges whose destination it owns, so its sources are an
//! arbitrary sparse subset of the global id space. Only sources that actually
//! have local edges get a row.
//!
//! # DCSR Format
//!
//! ```text
//! Local edges (rank owning 5..8): 0 → 5, 0 → 7, 9 → 6
//!
//! DCSR:
//!   sources:     [0, 9]        // rows that exist, sorted
//!   row_offsets: [0, 2, 3]     // source 0: edges [0..2), source 9: [2..3)
//!   col_indices: [5, 7, 6]     // destinations
//!   edge_weights: None         // unweighted
//! ```
//!
//! The structure is two pointer-free id arrays plus offsets; cycles in the
//! graph never become cycles in memory.

use crate::error::{GraphError, Result};
use crate::partition::VertexPartition;
use crate::types::VertexId;
use rayon::prelude::*;

/// Edges stored on one rank
///
/// Optimized for:
/// - O(log S) lookup of a source's local out-edges (S = distinct sources)
/// - data-parallel iteration over all local edges (rayon)
///
/// # Example
///
/// ```
/// use trueno_graph_dist::LocalGraph;
///
/// let graph = LocalGraph::<u32>::from_parts(vec![0, 0, 9], vec![5, 7, 6], None).unwrap();
///
/// assert_eq!(graph.out_neighbors(0), &[5, 7]);
/// assert_eq!(graph.num_edges(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LocalGraph<V: VertexId> {
    /// Distinct source ids with at least one local edge, ascending
    sources: Vec<V>,

    /// `sources[i]`'s edges are `col_indices[row_offsets[i]..row_offsets[i + 1]]`
    /// Length: `sources.len()` + 1
    row_offsets: Vec<usize>,

    /// Destination ids, sorted within each row
    col_indices: Vec<V>,

    /// Optional per-edge weights, parallel to `col_indices`
    edge_weights: Option<Vec<f32>>,

    /// Caller-declared: every edge (u, v) has a reverse (v, u) in the global graph
    symmetric: bool,
}

impl<V: VertexId> Default for LocalGraph<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V: VertexId> LocalGraph<V> {
    /// Empty edge slice (a rank that owns no edges)
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            row_offsets: vec![0],
            col_indices: Vec::new(),
            edge_weights: None,
            symmetric: false,
        }
    }

    /// Build from the parallel arrays handed over by ingestion
    ///
    /// Edges are reordered by `(src, dst)`; duplicate edges are kept (multi-graph).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the arrays differ in length or an id is the
    /// reserved sentinel value.
    pub fn from_parts(src_ids: Vec<V>, dst_ids: Vec<V>, weights: Option<Vec<f32>>) -> Result<Self> {
        if src_ids.len() != dst_ids.len() {
            return Err(GraphError::invalid_argument(format!(
                "src_ids has {} entries but dst_ids has {}",
                src_ids.len(),
                dst_ids.len()
            )));
        }
        if let Some(w) = &weights {
            if w.len() != src_ids.len() {
                return Err(GraphError::invalid_argument(format!(
                    "weights has {} entries for {} edges",
                    w.len(),
                    src_ids.len()
                )));
            }
        }
        if let Some(bad) = src_ids
            .par_iter()
            .chain(dst_ids.par_iter())
            .find_any(|&&id| id == V::INVALID)
        {
            return Err(GraphError::invalid_argument(format!(
                "vertex id {bad} is reserved as the unreached sentinel"
            )));
        }

        // Stable sort of edge positions by (src, dst)
        let mut order: Vec<usize> = (0..src_ids.len()).collect();
        order.par_sort_by_key(|&e| (src_ids[e], dst_ids[e]));

        let mut sources = Vec::new();
        let mut row_offsets = vec![0];
        let mut col_indices = Vec::with_capacity(order.len());
        for &e in &order {
            let src = src_ids[e];
            if sources.last() != Some(&src) {
                if !sources.is_empty() {
                    row_offsets.push(col_indices.len());
                }
                sources.push(src);
            }
            col_indices.push(dst_ids[e]);
        }
        if !sources.is_empty() {
            row_offsets.push(col_indices.len());
        }

        let edge_weights = weights.map(|w| order.iter().map(|&e| w[e]).collect());

        Ok(Self {
            sources,
            row_offsets,
            col_indices,
            edge_weights,
            symmetric: false,
        })
    }

    /// Build from `(src, dst)` pairs
    ///
    /// # Errors
    ///
    /// Same as [`from_parts`](Self::from_parts).
    pub fn from_edges(edges: &[(V, V)]) -> Result<Self> {
        let (src, dst) = edges.iter().copied().unzip();
        Self::from_parts(src, dst, None)
    }

    /// Split a global edge list into one slice per rank, by destination owner
    ///
    /// This is the placement ingestion performs before handing slices to the
    /// ranks; `partition` may be any rank's view.
    ///
    /// # Errors
    ///
    /// Returns `InvalidVertexId` for an id outside the partition's id space.
    pub fn split_by_destination(
        edges: &[(V, V)],
        partition: &VertexPartition<V>,
    ) -> Result<Vec<Self>> {
        let mut src_ids = vec![Vec::new(); partition.num_ranks()];
        let mut dst_ids = vec![Vec::new(); partition.num_ranks()];
        for &(src, dst) in edges {
            partition.owner_of(src)?;
            let owner = partition.owner_of(dst)?;
            src_ids[owner].push(src);
            dst_ids[owner].push(dst);
        }

        src_ids
            .into_iter()
            .zip(dst_ids)
            .map(|(src, dst)| Self::from_parts(src, dst, None))
            .collect()
    }

    /// `[min dst, max dst + 1)` over local edges, `None` without edges
    ///
    /// With destination-sorted ingestion this is the rank's ownership range,
    /// suitable for [`VertexPartition::from_local_range`] together with
    /// [`Self::id_bound`].
    #[must_use]
    pub fn destination_span(&self) -> Option<(V, V)> {
        let min = self.col_indices.par_iter().min()?;
        let max = self.col_indices.par_iter().max()?;
        Some((*min, max.successor()))
    }

    /// One past the largest source or destination id, `None` without edges
    #[must_use]
    pub fn id_bound(&self) -> Option<V> {
        let max_dst = self.col_indices.par_iter().max()?;
        let max_src = self.sources.last().copied().unwrap_or_default();
        Some(max_src.max(*max_dst).successor())
    }

    /// Declare whether the global graph is symmetric
    #[must_use]
    pub const fn with_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    /// Caller-declared symmetry
    #[must_use]
    pub const fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Number of local edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.col_indices.len()
    }

    /// Distinct sources with local edges, ascending
    #[must_use]
    pub fn sources(&self) -> &[V] {
        &self.sources
    }

    /// Whether edges carry weights
    #[must_use]
    pub const fn is_weighted(&self) -> bool {
        self.edge_weights.is_some()
    }

    /// Local out-neighbors of `src` (empty if `src` has no local edges)
    #[must_use]
    pub fn out_neighbors(&self, src: V) -> &[V] {
        let range = self.row_range(src);
        &self.col_indices[range]
    }

    /// Local out-edges of `src` as `(dst, weight)`
    pub fn out_edges(&self, src: V) -> impl Iterator<Item = (V, Option<f32>)> + '_ {
        let range = self.row_range(src);
        let weights = self.edge_weights.as_deref();
        range.map(move |e| (self.col_indices[e], weights.map(|w| w[e])))
    }

    /// Number of local edges leaving `src`
    #[must_use]
    pub fn local_out_degree(&self, src: V) -> usize {
        self.row_range(src).len()
    }

    /// `(source, local out-degree)` for every source with local edges
    pub fn local_out_degrees(&self) -> impl Iterator<Item = (V, usize)> + '_ {
        self.sources
            .iter()
            .zip(self.row_offsets.windows(2))
            .map(|(&src, w)| (src, w[1] - w[0]))
    }

    /// All local edges as `(src, dst, weight)`, sequential
    pub fn iter_edges(&self) -> impl Iterator<Item = (V, V, Option<f32>)> + '_ {
        let weights = self.edge_weights.as_deref();
        self.local_out_degrees()
            .scan(0_usize, |start, (src, degree)| {
                let row = *start..*start + degree;
                *start += degree;
                Some((src, row))
            })
            .flat_map(move |(src, row)| {
                row.map(move |e| (src, self.col_indices[e], weights.map(|w| w[e])))
            })
    }

    /// All local edges as `(src, dst, weight)`, data parallel over rows
    pub fn par_edges(&self) -> impl ParallelIterator<Item = (V, V, Option<f32>)> + '_ {
        let weights = self.edge_weights.as_deref();
        self.sources
            .par_iter()
            .enumerate()
            .flat_map_iter(move |(row, &src)| {
                (self.row_offsets[row]..self.row_offsets[row + 1])
                    .map(move |e| (src, self.col_indices[e], weights.map(|w| w[e])))
            })
    }

    /// Check the ingestion contract against a partition view
    ///
    /// Every id must lie in `[0, N)` and every destination must be owned by
    /// this rank.
    ///
    /// # Errors
    ///
    /// `InvalidVertexId` for an id outside the id space, `ConfigurationMismatch`
    /// for a destination owned by another rank.
    pub fn validate(&self, partition: &VertexPartition<V>) -> Result<()> {
        if let Some(&bad) = self
            .sources
            .par_iter()
            .find_first(|&&src| src >= partition.global_vertex_count())
        {
            return Err(GraphError::InvalidVertexId {
                id: bad.as_u64(),
                global_vertex_count: partition.global_vertex_count().as_u64(),
            });
        }
        if let Some(&bad) = self
            .col_indices
            .par_iter()
            .find_first(|&&dst| !partition.is_local(dst))
        {
            // Distinguish "no such vertex" from "someone else's vertex".
            partition.local_offset(bad)?;
        }
        Ok(())
    }

    fn row_range(&self, src: V) -> std::ops::Range<usize> {
        match self.sources.binary_search(&src) {
            Ok(row) => self.row_offsets[row]..self.row_offsets[row + 1],
            Err(_) => 0..0,
        }
    }
}
