//! Vertex ownership: one contiguous global-id range per rank
//!
//! ```text
//! offsets: [0, 13, 32]   (2 ranks, 32 global vertices)
//!
//!   rank 0 owns [0, 13)    local offsets 0..13
//!   rank 1 owns [13, 32)   local offsets 0..19
//! ```
//!
//! The offsets vector is the agreed destination-range convention: ingestion
//! places every edge on the rank owning its destination, so a rank's range is
//! also the span of destination ids in its edge slice. The last range may
//! extend further, up to the highest id seen as a source.

use crate::comm::Collective;
use crate::error::{GraphError, Result};
use crate::types::VertexId;
use std::ops::Range;

/// Contiguous ownership ranges across ranks, seen from one rank
///
/// Immutable after construction. Every global id in `[0, global_vertex_count)`
/// belongs to exactly one rank; ranges may be empty when there are more ranks
/// than vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexPartition<V: VertexId> {
    /// Rank boundaries, length `num_ranks + 1`, `offsets[0] == 0`,
    /// `offsets[num_ranks] == global_vertex_count`, non-decreasing
    offsets: Vec<V>,

    /// Rank this view belongs to
    rank: usize,
}

impl<V: VertexId> VertexPartition<V> {
    /// Build from explicit rank boundaries `[0, o1, ..., N]`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the offsets do not start at 0, decrease,
    /// describe an empty id space, or `rank` is out of range.
    pub fn from_offsets(offsets: Vec<V>, rank: usize) -> Result<Self> {
        if offsets.len() < 2 {
            return Err(GraphError::invalid_argument(
                "partition offsets need at least two entries",
            ));
        }
        if offsets[0] != V::default() {
            return Err(GraphError::invalid_argument(format!(
                "partition offsets must start at 0, got {}",
                offsets[0]
            )));
        }
        if let Some(w) = offsets.windows(2).find(|w| w[0] > w[1]) {
            return Err(GraphError::invalid_argument(format!(
                "partition offsets must be non-decreasing ({} > {})",
                w[0], w[1]
            )));
        }
        let num_ranks = offsets.len() - 1;
        if offsets[num_ranks] == V::default() {
            return Err(GraphError::invalid_argument(
                "global_vertex_count must be positive",
            ));
        }
        if rank >= num_ranks {
            return Err(GraphError::invalid_argument(format!(
                "rank {rank} outside process group of size {num_ranks}"
            )));
        }

        Ok(Self { offsets, rank })
    }

    /// Balanced split of `global_vertex_count` ids over `num_ranks` ranks
    ///
    /// Earlier ranks take one extra vertex when the split is uneven.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for zero ranks or zero vertices, or if
    /// `global_vertex_count` does not fit `V`.
    pub fn uniform(global_vertex_count: usize, num_ranks: usize, rank: usize) -> Result<Self> {
        if num_ranks == 0 {
            return Err(GraphError::invalid_argument("num_ranks must be positive"));
        }
        let base = global_vertex_count / num_ranks;
        let extra = global_vertex_count % num_ranks;

        let mut offsets = Vec::with_capacity(num_ranks + 1);
        let mut boundary = 0_usize;
        offsets.push(V::default());
        for r in 0..num_ranks {
            boundary += base + usize::from(r < extra);
            offsets.push(V::from_index(boundary).ok_or_else(|| {
                GraphError::invalid_argument(format!(
                    "global_vertex_count {global_vertex_count} does not fit the vertex id type"
                ))
            })?);
        }

        Self::from_offsets(offsets, rank)
    }

    /// Collectively assemble the partition from each rank's own `[first, last)`
    ///
    /// Every rank contributes the range it derived from its local edge slice
    /// plus `id_bound`, one past the largest id (source or destination) it
    /// holds. Ranges are all-gathered in rank order and must tile from 0
    /// without gaps or overlap. The id space is `N = max(id_bound)` over all
    /// ranks: the last range is extended to `N` when the highest ids appear
    /// only as sources.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `first > last`, `ConfigurationMismatch` if
    /// the gathered ranges are not contiguous from 0, or a transport error.
    pub async fn from_local_range<C: Collective + ?Sized>(
        comm: &C,
        first: V,
        last: V,
        id_bound: V,
    ) -> Result<Self> {
        if first > last {
            return Err(GraphError::invalid_argument(format!(
                "local range [{first}, {last}) is inverted"
            )));
        }

        let gathered = crate::comm::all_gather_pod(comm, &[first, last, id_bound]).await?;

        let mut offsets = Vec::with_capacity(gathered.len() + 1);
        let mut global_bound = V::default();
        offsets.push(V::default());
        for (r, range) in gathered.iter().enumerate() {
            let [begin, end, bound] = range.as_slice() else {
                return Err(GraphError::transport(format!(
                    "rank {r} sent a malformed partition range"
                )));
            };
            let expected = offsets.last().copied().unwrap_or_default();
            if *begin != expected {
                return Err(GraphError::ConfigurationMismatch {
                    vertex: expected.as_u64(),
                    detected_by: r,
                });
            }
            offsets.push(*end);
            global_bound = global_bound.max(*bound);
        }
        if let Some(last_end) = offsets.last_mut() {
            *last_end = (*last_end).max(global_bound);
        }

        Self::from_offsets(offsets, comm.rank())
    }

    /// Rank this view belongs to
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the process group
    #[must_use]
    pub fn num_ranks(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Size of the global id space `N`
    #[must_use]
    pub fn global_vertex_count(&self) -> V {
        self.offsets[self.num_ranks()]
    }

    /// First global id owned locally
    #[must_use]
    pub fn first(&self) -> V {
        self.offsets[self.rank]
    }

    /// One past the last global id owned locally
    #[must_use]
    pub fn last(&self) -> V {
        self.offsets[self.rank + 1]
    }

    /// Number of locally owned vertices
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.last().index() - self.first().index()
    }

    /// Rank boundaries
    #[must_use]
    pub fn offsets(&self) -> &[V] {
        &self.offsets
    }

    /// Global id range owned by `rank`
    #[must_use]
    pub fn range_of(&self, rank: usize) -> Option<Range<V>> {
        (rank < self.num_ranks()).then(|| self.offsets[rank]..self.offsets[rank + 1])
    }

    /// Whether `global_id` is owned by this rank
    #[must_use]
    pub fn is_local(&self, global_id: V) -> bool {
        self.first() <= global_id && global_id < self.last()
    }

    /// Rank owning `global_id`
    ///
    /// # Errors
    ///
    /// Returns `InvalidVertexId` if the id is outside `[0, N)`.
    pub fn owner_of(&self, global_id: V) -> Result<usize> {
        self.check_id(global_id)?;
        // Last boundary <= id; empty ranges share a boundary and are skipped.
        Ok(self.offsets.partition_point(|&o| o <= global_id) - 1)
    }

    /// Local index of a locally owned `global_id`
    ///
    /// # Errors
    ///
    /// Returns `InvalidVertexId` if the id is outside `[0, N)` and
    /// `ConfigurationMismatch` if another rank owns it.
    pub fn local_offset(&self, global_id: V) -> Result<usize> {
        self.check_id(global_id)?;
        if !self.is_local(global_id) {
            return Err(GraphError::ConfigurationMismatch {
                vertex: global_id.as_u64(),
                detected_by: self.rank,
            });
        }
        Ok(global_id.index() - self.first().index())
    }

    /// Global id of local index `local_offset`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `local_offset >= local_len()`.
    pub fn global_id(&self, local_offset: usize) -> Result<V> {
        if local_offset >= self.local_len() {
            return Err(GraphError::invalid_argument(format!(
                "local offset {local_offset} outside local range of {} vertices",
                self.local_len()
            )));
        }
        V::from_index(self.first().index() + local_offset)
            .ok_or_else(|| GraphError::invalid_argument("local offset overflows vertex id type"))
    }

    /// Locally owned global ids in ascending order
    pub fn local_ids(&self) -> impl Iterator<Item = V> + '_ {
        (self.first().index()..self.last().index()).filter_map(V::from_index)
    }

    fn check_id(&self, global_id: V) -> Result<()> {
        if global_id >= self.global_vertex_count() {
            return Err(GraphError::InvalidVertexId {
                id: global_id.as_u64(),
                global_vertex_count: self.global_vertex_count().as_u64(),
            });
        }
        Ok(())
    }
}
