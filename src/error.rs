//! Error types for scene combining.

use thiserror::Error;

/// Domain errors of merge-ngin. GPU setup uses `anyhow` instead.
#[derive(Error, Debug)]
pub enum CombineError {
    /// A node lacks a metadata key that recombination depends on.
    #[error("node '{node}' has no '{key}' metadata")]
    MissingMetadata { node: String, key: &'static str },

    /// The metadata was written by an incompatible layout version.
    #[error("unsupported combine metadata version {0}")]
    UnsupportedVersion(u32),

    /// No node carries this instance index although the count says it should.
    #[error("no node carries instance index {0}")]
    InstanceIndexGap(u32),

    /// Two nodes claim the same index.
    #[error("{key} {index} is claimed by more than one node")]
    DuplicateIndex { key: &'static str, index: u32 },

    /// An index at or past the recorded count.
    #[error("{key} {index} is out of range for count {count}")]
    IndexOutOfRange {
        key: &'static str,
        index: u32,
        count: u32,
    },

    /// A recorded count larger than the subtree that should back it.
    #[error("{key} {count} exceeds the {nodes} nodes below the root")]
    CountExceedsNodes {
        key: &'static str,
        count: u32,
        nodes: usize,
    },

    /// Node id not part of the graph.
    #[error("unknown node {0}")]
    UnknownNode(usize),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for combine operations.
pub type Result<T> = std::result::Result<T, CombineError>;
