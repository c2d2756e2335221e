//! Degenerate-edge collapse.
//!
//! Edges whose squared length is at most [`DEGENERATE_EDGE_TOL2`] are collapsed
//! before any local or global IDs exist. The endpoint with the lower global ID
//! survives unless the model classification forbids it, in which case the
//! other endpoint survives. Edges, faces and regions that become degenerate are
//! removed, and entities that become duplicates are merged into the one with
//! the lower handle. A mesh without degenerate edges is left untouched, so the
//! pass is idempotent.

use hashbrown::{HashMap, HashSet};

use crate::kernel::{NativeMesh, same_rotation};
use crate::mesh_error::MeshError;
use crate::topology::entity::MType;
use crate::topology::point::PointId;

/// Squared edge length at or below which an edge is degenerate.
pub const DEGENERATE_EDGE_TOL2: f64 = 1e-32;

/// What a collapse pass removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollapseReport {
    /// Number of collapsed edges.
    pub collapsed: usize,
    /// Removed handles per kernel dimension.
    pub deleted: [Vec<PointId>; 4],
}

impl CollapseReport {
    pub fn is_noop(&self) -> bool {
        self.collapsed == 0
    }

    fn delete(&mut self, mtype: MType, h: PointId) {
        self.deleted[mtype.dim()].push(h);
    }
}

fn vertex_gid(mesh: &NativeMesh, v: PointId) -> u64 {
    mesh.vertex(v)
        .and_then(|rec| rec.par.global_id)
        .unwrap_or(v.index() as u64)
}

fn edge_length2(mesh: &NativeMesh, e: PointId) -> f64 {
    let [a, b] = mesh.edge_vertices(e);
    crate::geometry::metrics::dist2(mesh.coords(a), mesh.coords(b))
}

/// Keeping `keep` and deleting `del` must not move a vertex off a model entity
/// of lower dimension.
fn can_merge(mesh: &NativeMesh, keep: PointId, del: PointId) -> bool {
    match (mesh.class(MType::Vertex, keep), mesh.class(MType::Vertex, del)) {
        (Some(k), Some(d)) => d.dim > k.dim || d == k,
        _ => false,
    }
}

/// Collapses every degenerate edge of `mesh`.
pub fn collapse_degenerate_edges(mesh: &mut NativeMesh) -> Result<CollapseReport, MeshError> {
    let cell_dim = mesh.cell_dim();
    let mut report = CollapseReport::default();
    loop {
        let Some(e) = mesh
            .handles(MType::Edge)
            .into_iter()
            .find(|&e| edge_length2(mesh, e) <= DEGENERATE_EDGE_TOL2)
        else {
            break;
        };
        let [a, b] = mesh.edge_vertices(e);
        let (keep, del) = if vertex_gid(mesh, a) <= vertex_gid(mesh, b) {
            (a, b)
        } else {
            (b, a)
        };
        if can_merge(mesh, keep, del) {
            collapse_edge(mesh, e, keep, del, cell_dim, &mut report);
        } else if can_merge(mesh, del, keep) {
            collapse_edge(mesh, e, del, keep, cell_dim, &mut report);
        } else {
            return Err(MeshError::FatalError(format!(
                "could not collapse degenerate edge {e} between vertices {a} and {b}"
            )));
        }
        report.collapsed += 1;
    }
    if !report.is_noop() {
        for mtype in MType::ALL {
            let gone: HashSet<PointId> = report.deleted[mtype.dim()].iter().copied().collect();
            mesh.labels.retain(mtype, |p| !gone.contains(&p));
        }
        mesh.rebuild_lookups();
        log::debug!(
            "collapsed {} degenerate edges, removed {} vertices, {} edges, {} faces, {} regions",
            report.collapsed,
            report.deleted[0].len(),
            report.deleted[1].len(),
            report.deleted[2].len(),
            report.deleted[3].len()
        );
    }
    Ok(report)
}

fn collapse_edge(
    mesh: &mut NativeMesh,
    e: PointId,
    keep: PointId,
    del: PointId,
    cell_dim: usize,
    report: &mut CollapseReport,
) {
    let mut touched_faces: HashSet<PointId> = HashSet::new();

    // Drop the collapsed edge from every face cycle.
    for (i, slot) in mesh.faces.iter_mut().enumerate() {
        if let Some(rec) = slot {
            let before = rec.edges.len();
            rec.edges.retain(|&(x, _)| x != e);
            if rec.edges.len() != before {
                touched_faces.insert(PointId::from_index(i));
            }
        }
    }
    mesh.edges[e.index()] = None;
    report.delete(MType::Edge, e);

    // Reattach edges of the deleted vertex and merge duplicates.
    for rec in mesh.edges.iter_mut().flatten() {
        for v in rec.verts.iter_mut() {
            if *v == del {
                *v = keep;
            }
        }
    }
    let mut by_pair: HashMap<(PointId, PointId), PointId> = HashMap::new();
    let mut merged: Vec<(PointId, PointId)> = Vec::new();
    for x in mesh.handles(MType::Edge) {
        let [p, q] = mesh.edge_vertices(x);
        if p != keep && q != keep {
            continue;
        }
        let key = if p <= q { (p, q) } else { (q, p) };
        match by_pair.get(&key) {
            Some(&y) => merged.push((x, y)),
            None => {
                by_pair.insert(key, x);
            }
        }
    }
    for (x, y) in merged {
        let same = mesh.edge_vertices(x) == mesh.edge_vertices(y);
        for (i, slot) in mesh.faces.iter_mut().enumerate() {
            if let Some(rec) = slot {
                for entry in rec.edges.iter_mut().filter(|entry| entry.0 == x) {
                    *entry = (y, if same { entry.1 } else { !entry.1 });
                    touched_faces.insert(PointId::from_index(i));
                }
            }
        }
        mesh.edges[x.index()] = None;
        report.delete(MType::Edge, x);
    }

    mesh.vertices[del.index()] = None;
    report.delete(MType::Vertex, del);
    for rec in mesh.regions.iter_mut().flatten() {
        if let Some(order) = rec.vertex_order.as_mut() {
            for v in order.iter_mut().filter(|v| **v == del) {
                *v = keep;
            }
            let unique: HashSet<PointId> = order.iter().copied().collect();
            if unique.len() != order.len() {
                rec.vertex_order = None;
            }
        }
    }

    // Degenerate faces.
    let mut dead_faces: HashSet<PointId> = HashSet::new();
    let mut touched: Vec<PointId> = touched_faces.into_iter().collect();
    touched.sort_unstable();
    for &f in &touched {
        let degenerate = mesh.face(f).is_none_or(|rec| {
            let unique: HashSet<PointId> = rec.edges.iter().map(|&(x, _)| x).collect();
            rec.edges.len() < 3 || unique.len() != rec.edges.len()
        });
        if degenerate {
            dead_faces.insert(f);
        }
    }

    // Faces that now span the same vertices as another face.
    let mut face_merges: Vec<(PointId, PointId)> = Vec::new();
    if cell_dim == 3 {
        let mut by_key: HashMap<Vec<PointId>, PointId> = HashMap::new();
        for f in mesh.handles(MType::Face) {
            if dead_faces.contains(&f) {
                continue;
            }
            let mut key = mesh.face_vertices(f);
            key.sort_unstable();
            match by_key.get(&key) {
                Some(&s) => face_merges.push((f, s)),
                None => {
                    by_key.insert(key, f);
                }
            }
        }
    }
    for &(d, s) in &face_merges {
        let same = same_rotation(&mesh.face_vertices(s), &mesh.face_vertices(d)).unwrap_or(true);
        for rec in mesh.regions.iter_mut().flatten() {
            for entry in rec.faces.iter_mut().filter(|entry| entry.0 == d) {
                *entry = (s, if same { entry.1 } else { !entry.1 });
            }
        }
        dead_faces.insert(d);
    }

    if cell_dim == 2 {
        for &f in &dead_faces {
            remove_face(mesh, f, report);
        }
        sweep_orphan_edges(mesh, report);
        return;
    }

    // Regions losing faces or folding onto a repeated face.
    let mut orphan_candidates: HashSet<PointId> = HashSet::new();
    for (i, slot) in mesh.regions.iter_mut().enumerate() {
        let Some(rec) = slot else { continue };
        let before = rec.faces.len();
        rec.faces.retain(|(f, _)| !dead_faces.contains(f));
        let unique: HashSet<PointId> = rec.faces.iter().map(|&(f, _)| f).collect();
        let folded = unique.len() != rec.faces.len();
        if rec.faces.len() != before || folded {
            if rec.faces.len() < 4 || folded {
                orphan_candidates.extend(unique);
                *slot = None;
                report.delete(MType::Region, PointId::from_index(i));
            }
        }
    }
    for &f in &dead_faces {
        remove_face(mesh, f, report);
    }
    let used: HashSet<PointId> = mesh
        .regions
        .iter()
        .flatten()
        .flat_map(|rec| rec.faces.iter().map(|&(f, _)| f))
        .collect();
    let mut orphans: Vec<PointId> = orphan_candidates
        .into_iter()
        .filter(|f| !used.contains(f) && mesh.face(*f).is_some())
        .collect();
    orphans.sort_unstable();
    for f in orphans {
        remove_face(mesh, f, report);
    }
    sweep_orphan_edges(mesh, report);
}

fn remove_face(mesh: &mut NativeMesh, f: PointId, report: &mut CollapseReport) {
    if let Some(slot) = mesh.faces.get_mut(f.index()) {
        if slot.take().is_some() {
            report.delete(MType::Face, f);
        }
    }
}

fn sweep_orphan_edges(mesh: &mut NativeMesh, report: &mut CollapseReport) {
    let used: HashSet<PointId> = mesh
        .faces
        .iter()
        .flatten()
        .flat_map(|rec| rec.edges.iter().map(|&(x, _)| x))
        .collect();
    for (i, slot) in mesh.edges.iter_mut().enumerate() {
        let h = PointId::from_index(i);
        if slot.is_some() && !used.contains(&h) {
            *slot = None;
            report.delete(MType::Edge, h);
        }
    }
}
