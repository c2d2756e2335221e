//! Orientation flags of ghost faces and edges.
//!
//! A ghost copy of a face may have been built from a different cell than the
//! owner's copy and then runs the other way around. The owner publishes an
//! orientation attribute per entity; the ghost compares it with its own view.
//!
//! * cell sides (faces of a volume mesh, edges of a surface mesh):
//!   `[gid of the cell traversing it positively, gid of the cell traversing it negatively]`
//! * edges of a volume mesh: `[gid of first vertex, gid of second vertex]`
//!
//! Missing cells read as [`NO_ENTITY`].

use hashbrown::HashMap;

use crate::algs::collective::agree;
use crate::algs::communicator::{CommTag, Communicator};
use crate::kernel::NativeMesh;
use crate::mesh_error::MeshError;
use crate::partition::ghost_exchange::request_from_owners;
use crate::topology::entity::{GlobalId, MType, ParallelType};
use crate::topology::point::PointId;
use crate::topology::store::EntityTopologyStore;

pub const NO_ENTITY: GlobalId = GlobalId::MAX;

const TAG_FLIPS: CommTag = CommTag::new(0x2300);

/// `Some(false)` when `local` runs like `remote`, `Some(true)` when it runs
/// the other way. `None` when neither sense, or both, fit: a sense fits when
/// every slot present on both sides agrees and at least one slot is shared.
pub fn orientation(local: [GlobalId; 2], remote: [GlobalId; 2]) -> Option<bool> {
    let fits = |pairs: [(GlobalId, GlobalId); 2]| {
        let shared: Vec<bool> = pairs
            .iter()
            .filter(|(a, b)| *a != NO_ENTITY && *b != NO_ENTITY)
            .map(|(a, b)| a == b)
            .collect();
        !shared.is_empty() && shared.iter().all(|&same| same)
    };
    let straight = fits([(local[0], remote[0]), (local[1], remote[1])]);
    let swapped = fits([(local[0], remote[1]), (local[1], remote[0])]);
    match (straight, swapped) {
        (true, false) => Some(false),
        (false, true) => Some(true),
        _ => None,
    }
}

fn gid(mesh: &NativeMesh, mtype: MType, h: PointId) -> GlobalId {
    mesh.par(mtype, h).and_then(|p| p.global_id).unwrap_or(NO_ENTITY)
}

/// Orientation attribute of `h` as seen by this rank.
pub fn attribute(mesh: &NativeMesh, mtype: MType, h: PointId, cell_dim: usize) -> [GlobalId; 2] {
    let cell_mtype = if cell_dim == 3 { MType::Region } else { MType::Face };
    let side_mtype = if cell_dim == 3 { MType::Face } else { MType::Edge };
    if mtype != side_mtype {
        let [a, b] = mesh.edge_vertices(h);
        return [gid(mesh, MType::Vertex, a), gid(mesh, MType::Vertex, b)];
    }
    let mut attr = [NO_ENTITY; 2];
    for &c in mesh.side_cells(h, cell_mtype) {
        let Some(&(_, dir)) = mesh.cell_sides(c, cell_mtype).iter().find(|(s, _)| *s == h) else {
            continue;
        };
        let slot = if dir { 0 } else { 1 };
        if attr[slot] == NO_ENTITY {
            attr[slot] = gid(mesh, cell_mtype, c);
        }
    }
    attr
}

/// Sets the flip flag of every ghost edge and face in `store`.
///
/// Requires upward adjacency and final global IDs on `mesh`.
pub fn compute_flips<C: Communicator>(
    comm: &C,
    mesh: &NativeMesh,
    store: &mut EntityTopologyStore,
    cell_dim: usize,
) -> Result<(), MeshError> {
    let rank = comm.rank();
    let lower: &[MType] = if cell_dim == 3 { &[MType::Edge, MType::Face] } else { &[MType::Edge] };
    let mut flipped = 0usize;
    for &mtype in lower {
        let tag = TAG_FLIPS.offset(4 * mtype.dim() as u16);
        let table = store.table(mtype);
        let owned: HashMap<GlobalId, PointId> = table
            .range(ParallelType::Owned)
            .map(|id| (table.global_id(id), table.handle(id)))
            .collect();
        let ghosts: Vec<usize> = table.range(ParallelType::Ghost).collect();
        let requests: Vec<(usize, Vec<GlobalId>)> = ghosts
            .iter()
            .map(|&id| (table.owner(id), vec![table.global_id(id)]))
            .collect();

        let replies = request_from_owners(comm, tag, &requests, |_, key| {
            let h = key.first().and_then(|g| owned.get(g))?;
            Some(attribute(mesh, mtype, *h, cell_dim).to_vec())
        })?;
        let mut failure = replies.failure(rank, &requests, &format!("{mtype:?}"));

        let mut flips = Vec::new();
        for (&id, answer) in ghosts.iter().zip(&replies.answers) {
            let Some(&[r0, r1]) = answer.as_deref() else { continue };
            let local = attribute(mesh, mtype, store.table(mtype).handle(id), cell_dim);
            match orientation(local, [r0, r1]) {
                Some(flip) => flips.push((id, flip)),
                None => {
                    failure.get_or_insert_with(|| {
                        MeshError::inconsistent(
                            rank,
                            format!(
                                "ghost {mtype:?} {} sees {local:?}, owner rank {} sees {:?}",
                                store.table(mtype).global_id(id),
                                store.table(mtype).owner(id),
                                [r0, r1]
                            ),
                        )
                    });
                }
            }
        }
        let table = store.table_mut(mtype);
        for (id, flip) in flips {
            flipped += usize::from(flip);
            table.set_flip(id, flip);
        }
        let outcome = match failure {
            Some(err) => Err(err),
            None => Ok(()),
        };
        agree(comm, tag.offset(3), outcome)?;
    }
    log::debug!("rank {rank}: {flipped} ghost entities flipped");
    Ok(())
}
