//! Mesh file formats.
//!
//! `.exo` files hold a whole mesh in the exodus-style text format of
//! [`exodus`]; `.par` names a pre-partitioned mesh whose per-rank pieces are
//! described in [`partitioned`].

pub mod exodus;
pub mod partitioned;

use std::path::Path;

use crate::mesh_error::MeshError;

pub use exodus::{parse_exodus, read_exodus, write_exodus};
pub use partitioned::{read_piece, write_partitioned};

/// File format selected by extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeshFormat {
    Exodus,
    Partitioned,
}

impl MeshFormat {
    /// Format of `path`; `rank` is only used in the error.
    pub fn from_path(path: &Path, rank: usize) -> Result<Self, MeshError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("exo") => Ok(MeshFormat::Exodus),
            Some("par") => Ok(MeshFormat::Partitioned),
            _ => Err(MeshError::UnsupportedFormat {
                path: path.display().to_string(),
                rank,
            }),
        }
    }

    /// Whether every rank reads its own piece.
    pub fn is_parallel(self) -> bool {
        self == MeshFormat::Partitioned
    }
}
