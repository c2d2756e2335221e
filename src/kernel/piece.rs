//! Serializable mesh pieces.
//!
//! A [`MeshPiece`] is the self-contained description of one rank's share of a
//! distributed mesh: vertices and cells keyed by global ID with their owners,
//! model classification of lower-dimensional entities keyed by sorted vertex
//! global IDs, and labeled-set memberships expressed with the same keys. Pieces
//! travel between ranks with `bincode` and are read from pre-partitioned files.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::kernel::NativeMesh;
use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use crate::topology::entity::{GlobalId, MType, ModelEntity};
use crate::topology::ownership::ParallelInfo;
use crate::topology::point::PointId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieceVertex {
    pub gid: GlobalId,
    pub owner: usize,
    pub coords: [f64; 3],
    pub class: ModelEntity,
}

/// Cell connectivity in vertex global IDs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellShape {
    /// 2D cell, counter-clockwise vertex cycle.
    Polygon(Vec<GlobalId>),
    /// Standard solid in Exodus vertex order.
    Solid {
        cell_type: CellType,
        vertices: Vec<GlobalId>,
    },
    /// General polyhedron, outward face cycles.
    Polyhedron(Vec<Vec<GlobalId>>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieceCell {
    pub gid: GlobalId,
    pub owner: usize,
    pub shape: CellShape,
    pub class: ModelEntity,
}

/// Classification of an edge or face, keyed by sorted vertex global IDs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceClass {
    pub mtype: MType,
    pub key: Vec<GlobalId>,
    pub class: ModelEntity,
}

/// Labeled set memberships. Vertices and cells are keyed by `[gid]`, other
/// entities by their sorted vertex global IDs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceSet {
    pub name: String,
    pub mtype: MType,
    pub members: Vec<Vec<GlobalId>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshPiece {
    pub space_dim: usize,
    pub cell_dim: usize,
    pub vertices: Vec<PieceVertex>,
    pub cells: Vec<PieceCell>,
    pub classes: Vec<PieceClass>,
    pub sets: Vec<PieceSet>,
}

/// Options for turning a piece into a kernel.
#[derive(Clone, Copy, Debug)]
pub struct PieceBuild {
    /// Rank building the kernel; decides ghost classification.
    pub rank: usize,
    /// Keep the piece's global IDs on vertices and cells (distributed meshes).
    pub keep_global_ids: bool,
}

fn sorted(mut key: Vec<GlobalId>) -> Vec<GlobalId> {
    key.sort_unstable();
    key
}

impl MeshPiece {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MeshError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MeshError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Builds the kernel described by this piece.
    pub fn build(&self, opts: PieceBuild) -> Result<NativeMesh, MeshError> {
        let cell_mtype = if self.cell_dim == 3 { MType::Region } else { MType::Face };
        let mut mesh = NativeMesh::new(self.space_dim);
        mesh.set_class_dim(self.cell_dim);

        let mut by_gid: HashMap<GlobalId, PointId> = HashMap::with_capacity(self.vertices.len());
        for v in &self.vertices {
            let h = mesh.add_vertex(v.coords, v.class);
            if by_gid.insert(v.gid, h).is_some() {
                return Err(MeshError::MeshIoParse(format!("duplicate vertex global ID {}", v.gid)));
            }
            if let Some(par) = mesh.par_mut(MType::Vertex, h) {
                *par = ParallelInfo::from_owner(v.owner, opts.rank, opts.keep_global_ids.then_some(v.gid));
            }
        }
        let lookup = |gid: &GlobalId| {
            by_gid
                .get(gid)
                .copied()
                .ok_or_else(|| MeshError::MeshIoParse(format!("cell references unknown vertex {gid}")))
        };

        let mut cells_by_gid: HashMap<GlobalId, PointId> = HashMap::with_capacity(self.cells.len());
        for cell in &self.cells {
            let h = match &cell.shape {
                CellShape::Polygon(vs) => {
                    let vs: Vec<PointId> = vs.iter().map(lookup).collect::<Result<_, _>>()?;
                    mesh.add_polygon(&vs, cell.class)?
                }
                CellShape::Solid { cell_type, vertices } => {
                    let vs: Vec<PointId> = vertices.iter().map(lookup).collect::<Result<_, _>>()?;
                    mesh.add_region_from_vertices(*cell_type, &vs, cell.class)?
                }
                CellShape::Polyhedron(faces) => {
                    let cycles: Vec<Vec<PointId>> = faces
                        .iter()
                        .map(|f| f.iter().map(lookup).collect::<Result<Vec<_>, _>>())
                        .collect::<Result<_, _>>()?;
                    mesh.add_region_from_faces(&cycles, cell.class)?
                }
            };
            cells_by_gid.insert(cell.gid, h);
            if let Some(par) = mesh.par_mut(cell_mtype, h) {
                *par = ParallelInfo::from_owner(cell.owner, opts.rank, opts.keep_global_ids.then_some(cell.gid));
            }
        }

        let find = |mesh: &NativeMesh, mtype: MType, key: &[GlobalId]| -> Option<PointId> {
            if mtype == MType::Vertex {
                return key.first().and_then(|g| by_gid.get(g).copied());
            }
            if mtype == cell_mtype {
                if let Some(h) = key.first().and_then(|g| cells_by_gid.get(g)) {
                    return Some(*h);
                }
            }
            let verts: Option<Vec<PointId>> = key.iter().map(|g| by_gid.get(g).copied()).collect();
            mesh.find_by_vertices(mtype, &verts?)
        };

        for c in &self.classes {
            if let Some(h) = find(&mesh, c.mtype, &c.key) {
                mesh.set_class(c.mtype, h, c.class);
            }
        }
        for set in &self.sets {
            mesh.labels.declare(&set.name, set.mtype);
            for key in &set.members {
                if let Some(h) = find(&mesh, set.mtype, key) {
                    mesh.labels.add(&set.name, set.mtype, h);
                }
            }
        }
        Ok(mesh)
    }
}

/// Key of an entity for piece transport: `[gid]` for vertices and cells,
/// sorted vertex global IDs otherwise.
pub fn entity_key(
    mesh: &NativeMesh,
    mtype: MType,
    h: PointId,
    cell_mtype: MType,
    vertex_gid: &impl Fn(PointId) -> GlobalId,
    cell_gid: &impl Fn(PointId) -> GlobalId,
) -> Vec<GlobalId> {
    if mtype == MType::Vertex {
        return vec![vertex_gid(h)];
    }
    if mtype == cell_mtype {
        return vec![cell_gid(h)];
    }
    sorted(mesh.entity_vertices(mtype, h).into_iter().map(vertex_gid).collect())
}

/// Connectivity of a kernel cell in vertex global IDs.
pub fn cell_shape(
    mesh: &NativeMesh,
    cell: PointId,
    cell_mtype: MType,
    vertex_gid: &impl Fn(PointId) -> GlobalId,
) -> CellShape {
    if cell_mtype == MType::Face {
        return CellShape::Polygon(mesh.face_vertices(cell).into_iter().map(vertex_gid).collect());
    }
    let ty = mesh.cell_type(MType::Region, cell);
    if let Some(order) = mesh.region(cell).and_then(|r| r.vertex_order.as_ref()) {
        if ty.is_standard_solid() && Some(order.len()) == ty.num_vertices() {
            return CellShape::Solid {
                cell_type: ty,
                vertices: order.iter().copied().map(vertex_gid).collect(),
            };
        }
    }
    CellShape::Polyhedron(
        mesh.region_faces(cell)
            .iter()
            .map(|&(f, outward)| {
                let mut cycle = mesh.face_vertices(f);
                if !outward {
                    cycle.reverse();
                }
                cycle.into_iter().map(vertex_gid).collect()
            })
            .collect(),
    )
}

/// Extracts the piece made of `cells` (kernel cells of `mesh`).
///
/// `vertex_gid`, `cell_gid` and the two owner functions describe the global
/// numbering and ownership the piece should carry.
pub fn extract_piece(
    mesh: &NativeMesh,
    cells: &[PointId],
    vertex_gid: impl Fn(PointId) -> GlobalId,
    vertex_owner: impl Fn(PointId) -> usize,
    cell_gid: impl Fn(PointId) -> GlobalId,
    cell_owner: impl Fn(PointId) -> usize,
) -> MeshPiece {
    let cell_dim = mesh.cell_dim();
    let cell_mtype = if cell_dim == 3 { MType::Region } else { MType::Face };

    let mut verts: Vec<PointId> = cells
        .iter()
        .flat_map(|&c| mesh.cell_vertices(c, cell_mtype))
        .collect();
    verts.sort_unstable();
    verts.dedup();
    let in_piece: hashbrown::HashSet<PointId> = verts.iter().copied().collect();

    let vertices = verts
        .iter()
        .map(|&v| PieceVertex {
            gid: vertex_gid(v),
            owner: vertex_owner(v),
            coords: mesh.coords(v),
            class: mesh.class(MType::Vertex, v).unwrap_or(ModelEntity::interior(cell_dim)),
        })
        .collect();
    let piece_cells = cells
        .iter()
        .map(|&c| PieceCell {
            gid: cell_gid(c),
            owner: cell_owner(c),
            shape: cell_shape(mesh, c, cell_mtype, &vertex_gid),
            class: mesh.class(cell_mtype, c).unwrap_or(ModelEntity::interior(cell_dim)),
        })
        .collect();

    // Lower-dimensional entities of the piece, found through its cells.
    let mut lower: Vec<(MType, PointId)> = Vec::new();
    {
        let mut seen = hashbrown::HashSet::new();
        for &c in cells {
            for &(side, _) in mesh.cell_sides(c, cell_mtype) {
                if cell_mtype == MType::Region && seen.insert((MType::Face, side)) {
                    lower.push((MType::Face, side));
                }
                let edges: Vec<PointId> = if cell_mtype == MType::Region {
                    mesh.face_edges(side).iter().map(|&(e, _)| e).collect()
                } else {
                    vec![side]
                };
                for e in edges {
                    if seen.insert((MType::Edge, e)) {
                        lower.push((MType::Edge, e));
                    }
                }
            }
        }
    }
    let classes = lower
        .iter()
        .filter_map(|&(mtype, h)| {
            let class = mesh.class(mtype, h)?;
            (class != ModelEntity::interior(cell_dim)).then(|| PieceClass {
                mtype,
                key: entity_key(mesh, mtype, h, cell_mtype, &vertex_gid, &cell_gid),
                class,
            })
        })
        .collect();

    let cell_set: hashbrown::HashSet<PointId> = cells.iter().copied().collect();
    let lower_set: hashbrown::HashSet<(MType, PointId)> = lower.iter().copied().collect();
    let sets = mesh
        .labels()
        .iter()
        .map(|(name, set)| PieceSet {
            name: name.to_string(),
            mtype: set.mtype,
            members: set
                .members()
                .iter()
                .filter(|&&h| match set.mtype {
                    MType::Vertex => in_piece.contains(&h),
                    t if t == cell_mtype => cell_set.contains(&h),
                    t => lower_set.contains(&(t, h)),
                })
                .map(|&h| entity_key(mesh, set.mtype, h, cell_mtype, &vertex_gid, &cell_gid))
                .collect(),
        })
        .collect();

    MeshPiece {
        space_dim: mesh.space_dim(),
        cell_dim,
        vertices,
        cells: piece_cells,
        classes,
        sets,
    }
}
