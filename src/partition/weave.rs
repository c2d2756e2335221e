//! Ownership and global IDs for every entity kind of a distributed kernel.
//!
//! Vertices and cells arrive with owners and (source or parent) global IDs.
//! Edges and faces are owned by the owner of their minimum-global-ID vertex;
//! the one-layer node-adjacent ghost layer guarantees that rank holds them
//! with their complete cell adjacency. Owned entities are numbered by an
//! exclusive scan of owned counts; ghost copies ask the owner for their ID.

use hashbrown::HashMap;

use crate::algs::collective::{agree, exclusive_scan};
use crate::algs::communicator::{CommTag, Communicator};
use crate::kernel::NativeMesh;
use crate::mesh_error::MeshError;
use crate::partition::ghost_exchange::request_from_owners;
use crate::topology::entity::{GlobalId, MType, PType};
use crate::topology::ownership::ParallelInfo;
use crate::topology::point::PointId;

/// What to do with the global IDs already present on an entity kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GidMode {
    /// Keep them; ghosts only verify that their owner holds the same ID.
    Keep,
    /// Number owned entities contiguously; the old ID (if any) is only a key.
    Renumber,
}

/// Tag block of one kind: scan at `+0`, agreement at `+3`, lower owners at
/// `+4` and the owner requests at `+5..=7`.
fn kind_tag(base: u16, mtype: MType) -> CommTag {
    CommTag::new(base + 8 * mtype.dim() as u16)
}

fn vertex_gid(mesh: &NativeMesh, v: PointId) -> Option<GlobalId> {
    mesh.par(MType::Vertex, v).and_then(|p| p.global_id)
}

/// Sorted vertex global IDs of an entity.
pub fn vertex_key(mesh: &NativeMesh, mtype: MType, h: PointId) -> Option<Vec<GlobalId>> {
    let mut key: Vec<GlobalId> = mesh
        .entity_vertices(mtype, h)
        .into_iter()
        .map(|v| vertex_gid(mesh, v))
        .collect::<Option<_>>()?;
    key.sort_unstable();
    Some(key)
}

/// Assigns global IDs to all entities of `mtype`; owners must already be set.
///
/// `keys[i]` identifies `mesh.handles(mtype)[i]` identically on every rank.
/// Owned entities that some other rank asks about are marked
/// [`PType::Overlap`].
pub fn assign_global_ids<C: Communicator>(
    comm: &C,
    mesh: &mut NativeMesh,
    mtype: MType,
    keys: &[Vec<GlobalId>],
    mode: GidMode,
    tag: CommTag,
) -> Result<(), MeshError> {
    let rank = comm.rank();
    let handles = mesh.handles(mtype);
    let mut failure: Option<MeshError> = None;

    let mut infos: Vec<ParallelInfo> = handles
        .iter()
        .map(|&h| mesh.par(mtype, h).copied().unwrap_or_default())
        .collect();
    let num_owned = infos.iter().filter(|p| !p.is_ghost()).count() as u64;
    let (offset, _) = exclusive_scan(comm, tag, num_owned)?;

    let mut by_key: HashMap<&[GlobalId], usize> = HashMap::with_capacity(num_owned as usize);
    let mut next = offset;
    for (i, info) in infos.iter_mut().enumerate() {
        if info.is_ghost() {
            continue;
        }
        info.ptype = PType::Interior;
        match mode {
            GidMode::Renumber => {
                info.global_id = Some(next);
                next += 1;
            }
            GidMode::Keep if info.global_id.is_none() => {
                failure.get_or_insert_with(|| {
                    MeshError::inconsistent(rank, format!("owned {mtype:?} {} has no global ID", handles[i]))
                });
            }
            GidMode::Keep => {}
        }
        if by_key.insert(keys[i].as_slice(), i).is_some() {
            failure.get_or_insert_with(|| {
                MeshError::inconsistent(rank, format!("two owned {mtype:?} entities share key {:?}", keys[i]))
            });
        }
    }

    let ghosts: Vec<usize> = (0..infos.len()).filter(|&i| infos[i].is_ghost()).collect();
    let requests: Vec<(usize, Vec<GlobalId>)> =
        ghosts.iter().map(|&i| (infos[i].owner, keys[i].clone())).collect();

    let mut overlap = Vec::new();
    let replies = request_from_owners(comm, tag.offset(5), &requests, |_, key| {
        let &i = by_key.get(key)?;
        overlap.push(i);
        infos[i].global_id.map(|g| vec![g])
    })?;
    if let Some(err) = replies.failure(rank, &requests, &format!("{mtype:?}")) {
        failure.get_or_insert(err);
    }
    for i in overlap {
        infos[i].mark_overlap();
    }
    for (&i, answer) in ghosts.iter().zip(&replies.answers) {
        let Some(&[gid]) = answer.as_deref() else { continue };
        if mode == GidMode::Keep && infos[i].global_id != Some(gid) {
            failure.get_or_insert_with(|| {
                MeshError::inconsistent(
                    rank,
                    format!("ghost {mtype:?} carries ID {:?}, owner says {gid}", infos[i].global_id),
                )
            });
        }
        infos[i].global_id = Some(gid);
    }

    for (&h, info) in handles.iter().zip(infos) {
        if let Some(par) = mesh.par_mut(mtype, h) {
            *par = info;
        }
    }
    let outcome = match failure {
        Some(err) => Err(err),
        None => Ok(()),
    };
    agree(comm, tag.offset(3), outcome)
}

/// Sets owners of edges and faces below the cell dimension.
fn assign_lower_owners(mesh: &mut NativeMesh, mtype: MType, rank: usize) -> Result<(), MeshError> {
    for h in mesh.handles(mtype) {
        let owner = mesh
            .entity_vertices(mtype, h)
            .into_iter()
            .filter_map(|v| Some((vertex_gid(mesh, v)?, mesh.par(MType::Vertex, v)?.owner)))
            .min()
            .map(|(_, owner)| owner)
            .ok_or_else(|| MeshError::inconsistent(rank, format!("{mtype:?} {h} has no numbered vertex")))?;
        if let Some(par) = mesh.par_mut(mtype, h) {
            *par = ParallelInfo::from_owner(owner, rank, None);
        }
    }
    Ok(())
}

/// Completes ownership and global numbering of a distributed kernel.
///
/// With `renumber_primary`, vertex and cell global IDs are treated as keys
/// (parent IDs of an extracted mesh) and replaced by a fresh numbering.
pub fn weave<C: Communicator>(
    comm: &C,
    mesh: &mut NativeMesh,
    cell_dim: usize,
    renumber_primary: bool,
) -> Result<(), MeshError> {
    const BASE: u16 = 0x2200;
    let rank = comm.rank();
    let cell_mtype = if cell_dim == 3 { MType::Region } else { MType::Face };
    let mode = if renumber_primary { GidMode::Renumber } else { GidMode::Keep };

    for mtype in [MType::Vertex, cell_mtype] {
        let keys: Vec<Vec<GlobalId>> = mesh
            .handles(mtype)
            .iter()
            .map(|&h| mesh.par(mtype, h).and_then(|p| p.global_id).into_iter().collect())
            .collect();
        assign_global_ids(comm, mesh, mtype, &keys, mode, kind_tag(BASE, mtype))?;
    }

    let lower: &[MType] = if cell_dim == 3 { &[MType::Edge, MType::Face] } else { &[MType::Edge] };
    for &mtype in lower {
        let owners = assign_lower_owners(mesh, mtype, rank);
        let owners = agree(comm, kind_tag(BASE, mtype).offset(4), owners);
        owners?;
        let keys: Vec<Vec<GlobalId>> = mesh
            .handles(mtype)
            .iter()
            .map(|&h| vertex_key(mesh, mtype, h).unwrap_or_default())
            .collect();
        assign_global_ids(comm, mesh, mtype, &keys, GidMode::Renumber, kind_tag(BASE, mtype))?;
    }
    log::debug!(
        "rank {rank}: weave done, {} vertices, {} edges, {} faces, {} regions",
        mesh.num_live(MType::Vertex),
        mesh.num_live(MType::Edge),
        mesh.num_live(MType::Face),
        mesh.num_live(MType::Region)
    );
    Ok(())
}
