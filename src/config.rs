//! Algorithm configuration
//!
//! The global vertex count is carried by
//! [`VertexPartition`](crate::VertexPartition); everything else an invocation
//! needs is here. Configs are plain values: nothing persists between runs.

use crate::error::{GraphError, Result};

/// Damping factor for `PageRank` (Google standard)
pub const DEFAULT_DAMPING_FACTOR: f64 = 0.85;

/// Iteration cap when none is configured
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Breadth-first traversal options
///
/// # Example
///
/// ```
/// use trueno_graph_dist::BfsConfig;
///
/// let config = BfsConfig::default().with_depth_limit(3).with_expensive_check(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BfsConfig {
    /// Maximum number of expansion rounds; `None` is unbounded
    pub depth_limit: Option<usize>,

    /// Request direction-optimizing (push/pull) traversal
    pub direction_optimizing: bool,

    /// Validate sources and local edge placement before the first round
    pub do_expensive_check: bool,
}

impl BfsConfig {
    /// Bound the traversal to `depth_limit` rounds
    #[must_use]
    pub const fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = Some(depth_limit);
        self
    }

    /// Toggle direction-optimizing mode
    #[must_use]
    pub const fn with_direction_optimizing(mut self, enabled: bool) -> Self {
        self.direction_optimizing = enabled;
        self
    }

    /// Toggle expensive validation
    #[must_use]
    pub const fn with_expensive_check(mut self, enabled: bool) -> Self {
        self.do_expensive_check = enabled;
        self
    }

    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero depth limit.
    pub fn validate(&self) -> Result<()> {
        if self.depth_limit == Some(0) {
            return Err(GraphError::invalid_argument(
                "depth_limit must be positive (or unbounded)",
            ));
        }
        Ok(())
    }
}

/// Power-iteration options
///
/// # Example
///
/// ```
/// use trueno_graph_dist::PageRankConfig;
///
/// let config = PageRankConfig::default()
///     .with_max_iterations(30)
///     .with_tolerance(1e-9);
/// assert!(config.validate().is_ok());
/// assert!(PageRankConfig::default().with_damping_factor(1.0).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PageRankConfig {
    /// Probability of following an edge, in `(0, 1)`
    pub damping_factor: f64,

    /// Iteration cap, positive
    pub max_iterations: usize,

    /// Stop early once the global L1 change drops below this value
    pub tolerance: Option<f64>,

    /// Validate local edge placement and partition agreement before iterating
    pub do_expensive_check: bool,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping_factor: DEFAULT_DAMPING_FACTOR,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: None,
            do_expensive_check: false,
        }
    }
}

impl PageRankConfig {
    /// Set the damping factor
    #[must_use]
    pub const fn with_damping_factor(mut self, damping_factor: f64) -> Self {
        self.damping_factor = damping_factor;
        self
    }

    /// Set the iteration cap
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enable early exit on convergence
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Toggle expensive validation
    #[must_use]
    pub const fn with_expensive_check(mut self, enabled: bool) -> Self {
        self.do_expensive_check = enabled;
        self
    }

    /// # Errors
    ///
    /// Returns `InvalidArgument` for a damping factor outside `(0, 1)`, a zero
    /// iteration cap, or a tolerance that is not a positive finite number.
    pub fn validate(&self) -> Result<()> {
        if !(self.damping_factor > 0.0 && self.damping_factor < 1.0) {
            return Err(GraphError::invalid_argument(format!(
                "damping_factor must be in (0, 1), got {}",
                self.damping_factor
            )));
        }
        if self.max_iterations == 0 {
            return Err(GraphError::invalid_argument(
                "max_iterations must be positive",
            ));
        }
        if let Some(tolerance) = self.tolerance {
            if !(tolerance.is_finite() && tolerance > 0.0) {
                return Err(GraphError::invalid_argument(format!(
                    "tolerance must be a positive finite number, got {tolerance}"
                )));
            }
        }
        Ok(())
    }
}

/// Sparse restart distribution: `values[i]` is the weight of `vertices[i]`
///
/// Each rank may pass any subset of the entries; entries are routed to their
/// owners and summed, so an entry given on several ranks counts once per
/// rank. Vertices without an entry get weight 0. The whole vector is
/// normalized to sum 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Personalization<V, S> {
    /// Global ids
    pub vertices: Vec<V>,
    /// Non-negative weights, parallel to `vertices`
    pub values: Vec<S>,
}

impl<V, S> Personalization<V, S> {
    /// Pair up ids and weights
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the lengths differ.
    pub fn new(vertices: Vec<V>, values: Vec<S>) -> Result<Self> {
        if vertices.len() != values.len() {
            return Err(GraphError::invalid_argument(format!(
                "personalization has {} vertices but {} values",
                vertices.len(),
                values.len()
            )));
        }
        Ok(Self { vertices, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfs_defaults() {
        let config = BfsConfig::default();
        assert_eq!(config.depth_limit, None);
        assert!(!config.direction_optimizing);
        assert!(config.validate().is_ok());
        assert!(BfsConfig::default().with_depth_limit(0).validate().is_err());
    }

    #[test]
    fn test_pagerank_defaults() {
        let config = PageRankConfig::default();
        assert!((config.damping_factor - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.tolerance, None);
    }

    #[test]
    fn test_pagerank_rejects_bad_values() {
        for damping in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(
                PageRankConfig::default()
                    .with_damping_factor(damping)
                    .validate()
                    .is_err(),
                "damping {damping} accepted"
            );
        }
        assert!(PageRankConfig::default()
            .with_max_iterations(0)
            .validate()
            .is_err());
        assert!(PageRankConfig::default()
            .with_tolerance(-1.0)
            .validate()
            .is_err());
        assert!(PageRankConfig::default()
            .with_tolerance(f64::INFINITY)
            .validate()
            .is_err());
    }

    #[test]
    fn test_personalization_length_mismatch() {
        assert!(Personalization::<u32, f64>::new(vec![1, 2], vec![0.5]).is_err());
        assert!(Personalization::<u32, f64>::new(vec![1], vec![0.5]).is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_from_json() {
        let config: PageRankConfig =
            serde_json::from_str(r#"{"damping_factor": 0.9, "tolerance": 1e-8}"#).unwrap();
        assert!((config.damping_factor - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);

        let bfs: BfsConfig = serde_json::from_str(r#"{"depth_limit": 4}"#).unwrap();
        assert_eq!(bfs.depth_limit, Some(4));
    }
}
