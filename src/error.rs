//! Error taxonomy shared by the partition, exchange and algorithm layers

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Errors raised by partitioning, collective exchange and the algorithms
///
/// Argument and precondition variants are raised before the first exchange,
/// on the rank that detects them. `ConfigurationMismatch` raised inside a round
/// is agreed collectively: every rank returns it from the same round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Vertex id outside `[0, global_vertex_count)`
    #[error("vertex id {id} outside global id space [0, {global_vertex_count})")]
    InvalidVertexId {
        /// Offending id
        id: u64,
        /// Size of the global id space
        global_vertex_count: u64,
    },

    /// Caller supplied an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Graph property required by the requested mode does not hold
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// Graph cannot be processed (e.g. no edges)
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A vertex resolved to no partition, or to a partition other than the one
    /// holding it
    #[error("configuration mismatch: vertex {vertex} (detected on rank {detected_by})")]
    ConfigurationMismatch {
        /// Offending global id
        vertex: u64,
        /// Rank that raised the abort
        detected_by: usize,
    },

    /// Requested mode has no implementation
    #[error("unimplemented feature: {0}")]
    UnimplementedFeature(&'static str),

    /// Peer disconnected or sent a malformed frame
    #[error("transport failure: {0}")]
    Transport(String),
}

impl GraphError {
    /// Shorthand for [`GraphError::InvalidArgument`]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Shorthand for [`GraphError::Transport`]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}
