//! Sub-mesh extraction by closure.
//!
//! Selected faces or regions of a source kernel are copied together with their
//! closure into a fresh kernel. Each copied entity remembers the source entity
//! it came from, so the caller can build parent links.

use hashbrown::HashMap;

use crate::kernel::NativeMesh;
use crate::mesh_error::MeshError;
use crate::topology::entity::MType;
use crate::topology::point::PointId;

/// Kernel produced by [`extract_closure`].
#[derive(Debug)]
pub struct ExtractedKernel {
    pub mesh: NativeMesh,
    /// Child handle -> source handle, indexed by the child's kernel dimension.
    pub parents: [HashMap<PointId, PointId>; 4],
}

impl ExtractedKernel {
    pub fn parent(&self, mtype: MType, child: PointId) -> Option<PointId> {
        self.parents[mtype.dim()].get(&child).copied()
    }
}

/// Copies `entities` (faces or regions of `source`) and their closure.
///
/// Faces become the cells of a surface kernel; `flatten` drops the z
/// coordinate and makes the kernel planar. Regions become a volume kernel.
/// Vertex and cell parallel info is copied from the source.
pub fn extract_closure(
    source: &NativeMesh,
    mtype: MType,
    entities: &[PointId],
    flatten: bool,
) -> Result<ExtractedKernel, MeshError> {
    let (space_dim, cell_dim) = match mtype {
        MType::Face if flatten => (source.space_dim().min(2), 2),
        MType::Face => (source.space_dim(), 2),
        MType::Region => (source.space_dim(), 3),
        other => {
            return Err(MeshError::UnsupportedTopology(format!(
                "closure extraction of {other:?} entities"
            )));
        }
    };
    let mut mesh = NativeMesh::new(space_dim);
    mesh.set_class_dim(cell_dim);
    let mut vmap: HashMap<PointId, PointId> = HashMap::new();
    let mut parents: [HashMap<PointId, PointId>; 4] = Default::default();

    let mut copy_vertex = |mesh: &mut NativeMesh, v: PointId| -> Result<PointId, MeshError> {
        if let Some(&c) = vmap.get(&v) {
            return Ok(c);
        }
        let rec = source
            .vertex(v)
            .ok_or_else(|| MeshError::InvalidParameters(format!("unknown source vertex {v}")))?;
        let mut coords = rec.coords;
        if flatten {
            coords[2] = 0.0;
        }
        let c = mesh.add_vertex(coords, rec.class);
        if let Some(par) = mesh.par_mut(MType::Vertex, c) {
            *par = rec.par;
        }
        vmap.insert(v, c);
        Ok(c)
    };

    let mut selected = hashbrown::HashSet::new();
    for &e in entities {
        if !selected.insert(e) {
            return Err(MeshError::InvalidParameters(format!(
                "entity {e} selected twice for extraction"
            )));
        }
        let child = match mtype {
            MType::Face => {
                let rec = source
                    .face(e)
                    .ok_or_else(|| MeshError::InvalidParameters(format!("unknown source face {e}")))?;
                let mut cycle = Vec::new();
                for v in source.face_vertices(e) {
                    cycle.push(copy_vertex(&mut mesh, v)?);
                }
                // Planar cells run counter-clockwise.
                if flatten {
                    let pts: Vec<_> = cycle.iter().map(|&v| mesh.coords(v)).collect();
                    if crate::geometry::metrics::polygon_area_vector(&pts)[2] < 0.0 {
                        cycle.reverse();
                    }
                }
                let c = mesh.add_polygon(&cycle, rec.class)?;
                if let Some(par) = mesh.par_mut(MType::Face, c) {
                    *par = rec.par;
                }
                c
            }
            _ => {
                let rec = source
                    .region(e)
                    .ok_or_else(|| MeshError::InvalidParameters(format!("unknown source region {e}")))?;
                let c = match rec.vertex_order.as_ref() {
                    Some(order) if source.cell_type(MType::Region, e).is_standard_solid() => {
                        let mut verts = Vec::with_capacity(order.len());
                        for &v in order {
                            verts.push(copy_vertex(&mut mesh, v)?);
                        }
                        mesh.add_region_from_vertices(source.cell_type(MType::Region, e), &verts, rec.class)?
                    }
                    _ => {
                        let mut cycles = Vec::new();
                        for &(f, outward) in &rec.faces {
                            let mut cycle = Vec::new();
                            for v in source.face_vertices(f) {
                                cycle.push(copy_vertex(&mut mesh, v)?);
                            }
                            if !outward {
                                cycle.reverse();
                            }
                            cycles.push(cycle);
                        }
                        mesh.add_region_from_faces(&cycles, rec.class)?
                    }
                };
                if let Some(par) = mesh.par_mut(MType::Region, c) {
                    *par = rec.par;
                }
                c
            }
        };
        if parents[cell_dim].insert(child, e).is_some() {
            return Err(MeshError::InvalidParameters(format!(
                "entities selected for extraction share child {child}"
            )));
        }
    }

    for (&parent, &child) in &vmap {
        parents[MType::Vertex.dim()].insert(child, parent);
    }
    let reverse: HashMap<PointId, PointId> = vmap.iter().map(|(&p, &c)| (c, p)).collect();
    let lower: &[MType] = if cell_dim == 3 { &[MType::Edge, MType::Face] } else { &[MType::Edge] };
    for &m in lower {
        for child in mesh.handles(m) {
            let verts: Vec<PointId> = mesh
                .entity_vertices(m, child)
                .iter()
                .filter_map(|c| reverse.get(c).copied())
                .collect();
            if let Some(parent) = source.find_by_vertices(m, &verts) {
                parents[m.dim()].insert(child, parent);
                if let Some(class) = source.class(m, parent) {
                    mesh.set_class(m, child, class);
                }
            }
        }
    }

    // Inherit labeled sets through the parent links; a child entity has the
    // kernel dimension of its parent.
    for child_mtype in MType::ALL {
        let inverse: HashMap<PointId, PointId> = parents[child_mtype.dim()]
            .iter()
            .map(|(&c, &p)| (p, c))
            .collect();
        if inverse.is_empty() {
            continue;
        }
        for (name, set) in source.labels().iter() {
            if set.mtype != child_mtype {
                continue;
            }
            for p in set.members() {
                if let Some(&c) = inverse.get(p) {
                    mesh.labels.add(name, child_mtype, c);
                }
            }
        }
    }

    Ok(ExtractedKernel { mesh, parents })
}
