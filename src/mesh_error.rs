//! MeshError: unified error type for mesh-weave public APIs
//!
//! Every fallible construction, partition, and set-resolution step returns this
//! type. Errors raised inside collective steps carry the rank that detected them.

use crate::topology::entity::EntityKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for mesh-weave operations.
///
/// Serializable so that a failure detected on one rank can be replayed on all.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshError {
    /// File extension does not name a supported mesh format.
    #[error("unsupported mesh file format `{path}` (rank {rank})")]
    UnsupportedFormat { path: String, rank: usize },
    /// The mesh file could not be read or parsed.
    #[error("failed to load `{path}` on rank {rank}: {reason}")]
    ImportFailure {
        path: String,
        rank: usize,
        reason: String,
    },
    /// Ranks disagree on the topological cell dimension.
    #[error("rank {rank} inferred cell dimension {local} but the maximum over all ranks is {max}")]
    DimensionMismatch { rank: usize, local: usize, max: usize },
    /// Ownership, global-ID or orientation data is inconsistent across ranks.
    #[error("inconsistent topology (rank {rank}): {reason}")]
    InconsistentTopology { rank: usize, reason: String },
    /// Requested construction mode exists but is not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// Requested topology cannot be represented.
    #[error("unsupported topology: {0}")]
    UnsupportedTopology(String),
    /// No region with this name in the geometric model.
    #[error("geometric model has no region named `{0}`")]
    RegionNotFound(String),
    /// Logical region components resolve to sets of different entity kinds.
    #[error("components of logical region `{region}` resolve to different entity kinds")]
    InconsistentSetTypes { region: String },
    /// Both a material block and an element set carry this label.
    #[error("labeled set `{label}` exists both as a material block and as an element set")]
    AmbiguousLabeledSet { label: String },
    /// Labeled set region declares a different entity kind than requested.
    #[error("labeled set region `{region}` holds {declared} entities, {requested} requested")]
    LabeledSetKindMismatch {
        region: String,
        declared: EntityKind,
        requested: EntityKind,
    },
    /// Labeled set is absent from a serial mesh.
    #[error("could not find labeled set `{label}` for region `{region}`")]
    LabeledSetNotFound { region: String, label: String },
    /// Mesh is unusable (e.g. a degenerate edge could not be collapsed).
    #[error("fatal mesh error: {0}")]
    FatalError(String),
    /// No configured framework can perform the request.
    #[error("no mesh framework can {0}")]
    FrameworkUnavailable(String),
    /// Construction parameters are invalid.
    #[error("invalid mesh parameters: {0}")]
    InvalidParameters(String),
    /// Geometry is degenerate or malformed.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// Text mesh format could not be parsed.
    #[error("mesh I/O parse error: {0}")]
    MeshIoParse(String),
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
    /// Message exchange with a peer failed.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// Binary or JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Invalid configuration document.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MeshError {
    /// Shorthand for [`MeshError::InconsistentTopology`].
    pub fn inconsistent(rank: usize, reason: impl Into<String>) -> Self {
        MeshError::InconsistentTopology {
            rank,
            reason: reason.into(),
        }
    }

    /// True for failures that must abort every rank of a collective step.
    pub fn is_collective(&self) -> bool {
        matches!(
            self,
            MeshError::DimensionMismatch { .. }
                | MeshError::InconsistentTopology { .. }
                | MeshError::ImportFailure { .. }
        )
    }
}

impl From<std::io::Error> for MeshError {
    fn from(err: std::io::Error) -> Self {
        MeshError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for MeshError {
    fn from(err: bincode::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}
