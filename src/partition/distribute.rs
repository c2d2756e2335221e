//! Rank-0 distribution of a global mesh.
//!
//! Rank 0 holds the whole kernel. It assigns every cell to a rank, derives
//! vertex owners (smallest rank owning an incident cell), and cuts one
//! [`MeshPiece`] per rank made of the owned cells followed by exactly one
//! node-adjacent layer of ghost cells. Pieces are scattered as `bincode`
//! buffers and rebuilt on the receiving rank.

use serde::{Deserialize, Serialize};

use crate::algs::collective::{agree, scatter};
use crate::algs::communicator::{CommTag, Communicator};
use crate::kernel::NativeMesh;
use crate::kernel::piece::{MeshPiece, PieceBuild, extract_piece};
use crate::mesh_error::MeshError;
use crate::topology::entity::{GlobalId, MType};
use crate::topology::ownership::min_owner;
use crate::topology::point::PointId;

const TAG_SCATTER: CommTag = CommTag::new(0x2100);
const TAG_AGREE_CUT: CommTag = CommTag::new(0x2101);
const TAG_AGREE_BUILD: CommTag = CommTag::new(0x2102);

/// How rank 0 assigns cells to ranks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMethod {
    /// Contiguous blocks of cells in global-ID order.
    #[default]
    Block,
    /// `parts[cell global ID]` is the owning rank.
    Explicit { parts: Vec<usize> },
}

impl PartitionMethod {
    /// Owner rank of every cell of a mesh with `num_cells` cells.
    pub fn assign(&self, num_cells: usize, size: usize) -> Result<Vec<usize>, MeshError> {
        match self {
            PartitionMethod::Block => Ok((0..num_cells).map(|i| i * size / num_cells.max(1)).collect()),
            PartitionMethod::Explicit { parts } => {
                if parts.len() != num_cells {
                    return Err(MeshError::InvalidParameters(format!(
                        "explicit partition lists {} cells, mesh has {num_cells}",
                        parts.len()
                    )));
                }
                if let Some(bad) = parts.iter().find(|&&p| p >= size) {
                    return Err(MeshError::InvalidParameters(format!(
                        "explicit partition names rank {bad} of {size}"
                    )));
                }
                Ok(parts.clone())
            }
        }
    }
}

/// Cuts the global kernel into one piece per rank.
///
/// Vertex and cell global IDs are their positions in kernel traversal order.
pub fn cut_pieces(
    mesh: &mut NativeMesh,
    method: &PartitionMethod,
    size: usize,
) -> Result<Vec<MeshPiece>, MeshError> {
    let cell_dim = mesh.cell_dim();
    let cell_mtype = if cell_dim == 3 { MType::Region } else { MType::Face };
    mesh.build_upward();

    let cells = mesh.handles(cell_mtype);
    let verts = mesh.handles(MType::Vertex);
    let parts = method.assign(cells.len(), size)?;

    let dense = |hs: &[PointId]| -> hashbrown::HashMap<PointId, usize> {
        hs.iter().enumerate().map(|(i, &h)| (h, i)).collect()
    };
    let cell_index = dense(&cells);
    let vertex_index = dense(&verts);

    let vertex_owner: Vec<usize> = verts
        .iter()
        .map(|&v| {
            min_owner(mesh.vertex_cells(v, cell_mtype).iter().map(|c| parts[cell_index[c]])).unwrap_or(0)
        })
        .collect();

    let mut owned: Vec<Vec<PointId>> = vec![Vec::new(); size];
    for (i, &c) in cells.iter().enumerate() {
        owned[parts[i]].push(c);
    }

    let mut pieces = Vec::with_capacity(size);
    for (rank, mine) in owned.iter().enumerate() {
        let is_mine: hashbrown::HashSet<PointId> = mine.iter().copied().collect();
        let mut ghosts: Vec<PointId> = mine
            .iter()
            .flat_map(|&c| mesh.cell_vertices(c, cell_mtype))
            .flat_map(|v| mesh.vertex_cells(v, cell_mtype).iter().copied())
            .filter(|c| !is_mine.contains(c))
            .collect();
        ghosts.sort_unstable_by_key(|c| cell_index[c]);
        ghosts.dedup();

        let selection: Vec<PointId> = mine.iter().chain(&ghosts).copied().collect();
        let piece = extract_piece(
            mesh,
            &selection,
            |v| vertex_index[&v] as GlobalId,
            |v| vertex_owner[vertex_index[&v]],
            |c| cell_index[&c] as GlobalId,
            |c| parts[cell_index[&c]],
        );
        log::debug!(
            "piece for rank {rank}: {} owned cells, {} ghost cells, {} vertices",
            mine.len(),
            ghosts.len(),
            piece.vertices.len()
        );
        pieces.push(piece);
    }
    Ok(pieces)
}

/// Distributes `global` (read on rank 0 only) and returns this rank's kernel
/// with vertex and cell ownership and global IDs in place.
pub fn distribute_from_root<C: Communicator>(
    comm: &C,
    global: Option<NativeMesh>,
    method: &PartitionMethod,
) -> Result<NativeMesh, MeshError> {
    let rank = comm.rank();
    let cut = if rank == 0 {
        match global {
            Some(mut mesh) => cut_pieces(&mut mesh, method, comm.size()).and_then(|pieces| {
                pieces.iter().map(MeshPiece::to_bytes).collect::<Result<Vec<_>, _>>()
            }),
            None => Err(MeshError::InvalidParameters("rank 0 has no mesh to distribute".into())),
        }
    } else {
        Ok(Vec::new())
    };
    let buffers = agree(comm, TAG_AGREE_CUT, cut)?;
    let mine = scatter(comm, TAG_SCATTER, 0, buffers)?;
    let built = MeshPiece::from_bytes(&mine).and_then(|piece| {
        piece.build(PieceBuild {
            rank,
            keep_global_ids: true,
        })
    });
    agree(comm, TAG_AGREE_BUILD, built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::generate::{GenerateOptions, quad_grid};

    #[test]
    fn block_assignment_is_contiguous() {
        let parts = PartitionMethod::Block.assign(5, 2).unwrap();
        assert_eq!(parts, vec![0, 0, 0, 1, 1]);
        assert!(PartitionMethod::Explicit { parts: vec![0, 3] }.assign(2, 2).is_err());
    }

    #[test]
    fn pieces_carry_one_ghost_layer() {
        // 4x1 strip, two cells per rank.
        let mut m = quad_grid([0.0; 2], [4.0, 1.0], [4, 1], GenerateOptions::default()).unwrap();
        let pieces = cut_pieces(&mut m, &PartitionMethod::Block, 2).unwrap();
        let owners: Vec<Vec<usize>> = pieces
            .iter()
            .map(|p| p.cells.iter().map(|c| c.owner).collect())
            .collect();
        assert_eq!(owners[0], vec![0, 0, 1]);
        assert_eq!(owners[1], vec![1, 1, 0]);
        let gids: Vec<GlobalId> = pieces[1].cells.iter().map(|c| c.gid).collect();
        assert_eq!(gids, vec![2, 3, 1]);
        // The shared column of vertices belongs to rank 0.
        let shared: Vec<usize> = pieces[1]
            .vertices
            .iter()
            .filter(|v| v.coords[0] == 2.0)
            .map(|v| v.owner)
            .collect();
        assert_eq!(shared, vec![0, 0]);
    }
}
