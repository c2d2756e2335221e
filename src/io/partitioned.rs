//! Pre-partitioned mesh files.
//!
//! A partitioned mesh named `<prefix>.par` on `N` ranks is stored as one
//! exodus-style piece per rank, `<prefix>.par.N.r`, next to a JSON metadata file
//! `<prefix>.par.N.r.json` listing the owner of every node and element in file
//! order. File IDs are global IDs plus one, so pieces agree on shared entities.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::io::exodus::{parse_exodus, write_exodus};
use crate::kernel::piece::MeshPiece;
use crate::mesh::Mesh;
use crate::mesh_error::MeshError;
use crate::topology::entity::{EntityKind, ParallelType};

const PARTITIONED_METADATA_VERSION: u32 = 1;

/// Ownership metadata stored beside a piece.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionedMeshMetadata {
    pub version: u32,
    pub rank: usize,
    pub size: usize,
    /// Owner rank of each node, in the order nodes appear in the piece.
    pub node_owners: Vec<usize>,
    /// Owner rank of each element, in the order elements appear in the piece.
    pub element_owners: Vec<usize>,
}

impl PartitionedMeshMetadata {
    pub fn new(rank: usize, size: usize, node_owners: Vec<usize>, element_owners: Vec<usize>) -> Self {
        Self {
            version: PARTITIONED_METADATA_VERSION,
            rank,
            size,
            node_owners,
            element_owners,
        }
    }
}

/// Path of rank `rank`'s piece of `path` on `size` ranks.
pub fn piece_path(path: &Path, rank: usize, size: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{size}.{rank}"));
    PathBuf::from(name)
}

pub fn metadata_path(path: &Path, rank: usize, size: usize) -> PathBuf {
    let mut name = piece_path(path, rank, size).into_os_string();
    name.push(".json");
    PathBuf::from(name)
}

/// Writes this rank's piece of `mesh` (owned and ghost entities) with its
/// metadata. Every rank calls this with the same `path`.
pub fn write_partitioned(mesh: &Mesh, path: impl AsRef<Path>) -> Result<(), MeshError> {
    let path = path.as_ref();
    let (rank, size) = (mesh.rank(), mesh.size());
    let owners = |kind: EntityKind| {
        (0..mesh.num_entities(kind, ParallelType::Used))
            .map(|i| mesh.entity_get_owner(kind, i))
            .collect::<Vec<_>>()
    };
    let metadata = PartitionedMeshMetadata::new(rank, size, owners(EntityKind::Node), owners(EntityKind::Cell));

    let piece = piece_path(path, rank, size);
    let file = fs::File::create(&piece)?;
    write_exodus(mesh, BufWriter::new(file))?;
    fs::write(metadata_path(path, rank, size), serde_json::to_vec_pretty(&metadata)?)?;
    log::debug!("rank {rank}: wrote partitioned piece {}", piece.display());
    Ok(())
}

/// Reads rank `rank`'s piece of `path` on `size` ranks. Vertices and cells
/// carry the owners recorded in the metadata.
pub fn read_piece(path: impl AsRef<Path>, rank: usize, size: usize) -> Result<MeshPiece, MeshError> {
    let path = path.as_ref();
    let meta_bytes = fs::read(metadata_path(path, rank, size))?;
    let metadata: PartitionedMeshMetadata = serde_json::from_slice(&meta_bytes)?;
    if metadata.version != PARTITIONED_METADATA_VERSION {
        return Err(MeshError::MeshIoParse(format!(
            "unsupported partitioned metadata version {}",
            metadata.version
        )));
    }
    if metadata.rank != rank || metadata.size != size {
        return Err(MeshError::MeshIoParse(format!(
            "metadata describes rank {} of {}, expected rank {rank} of {size}",
            metadata.rank, metadata.size
        )));
    }
    if let Some(bad) = metadata
        .node_owners
        .iter()
        .chain(&metadata.element_owners)
        .find(|&&o| o >= size)
    {
        return Err(MeshError::MeshIoParse(format!("owner rank {bad} out of range for {size} ranks")));
    }
    let text = fs::read_to_string(piece_path(path, rank, size))?;
    parse_exodus(&text)?.to_piece(Some((&metadata.node_owners, &metadata.element_owners)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_paths_append_size_and_rank() {
        let p = Path::new("/tmp/wing.par");
        assert_eq!(piece_path(p, 2, 4), PathBuf::from("/tmp/wing.par.4.2"));
        assert_eq!(metadata_path(p, 0, 1), PathBuf::from("/tmp/wing.par.1.0.json"));
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let meta = PartitionedMeshMetadata::new(1, 2, vec![0, 1, 1], vec![1]);
        let bytes = serde_json::to_vec_pretty(&meta).unwrap();
        let back: PartitionedMeshMetadata = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, meta);
        assert_eq!(back.version, PARTITIONED_METADATA_VERSION);
    }
}
