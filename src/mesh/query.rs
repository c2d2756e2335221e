//! Query & Adjacency API.
//!
//! All queries take local IDs and return local IDs. Directions are `+1`/`-1`:
//! for a volume cell, `+1` means the face normal points out of the cell; for a
//! planar cell, `+1` means the edge runs in the cell's rotational sense.
//!
//! Ghost faces and edges whose local copy runs opposite to the owner's copy
//! carry a flip flag. Their node lists are reported reversed and every
//! direction involving them is negated, so normals and tangents agree with the
//! owning rank bit for bit.
//!
//! Every query panics when given an ID outside `0..num_entities(kind, Used)`.

use hashbrown::HashSet;

use super::Mesh;
use crate::geometry::metrics::{self, Point};
use crate::region;
use crate::topology::cell_type::CellType;
use crate::topology::entity::{EntityId, EntityKind, GlobalId, MType, ModelEntity, PType, ParallelType};
use crate::topology::point::PointId;

#[inline]
fn sign(positive: bool) -> i32 {
    if positive { 1 } else { -1 }
}

/// Keeps the first vertex and reverses the rest of a cycle.
fn reverse_cycle<T>(cycle: &mut [T]) {
    if cycle.len() > 1 {
        cycle[1..].reverse();
    }
}

impl Mesh {
    // ---------------------------------------------------------------------
    // Counts, IDs, classification
    // ---------------------------------------------------------------------

    pub fn num_entities(&self, kind: EntityKind, ptype: ParallelType) -> usize {
        self.table(kind).count(ptype)
    }

    pub fn global_id(&self, kind: EntityKind, id: EntityId) -> GlobalId {
        self.table(kind).global_id(id)
    }

    /// Local ID of the entity with global ID `gid`, when this rank holds it.
    pub fn local_id_of(&self, kind: EntityKind, gid: GlobalId) -> Option<EntityId> {
        self.map(kind, ParallelType::Used).local_id(gid)
    }

    pub fn entity_get_ptype(&self, kind: EntityKind, id: EntityId) -> PType {
        self.table(kind).ptype(id)
    }

    pub fn entity_get_owner(&self, kind: EntityKind, id: EntityId) -> usize {
        self.table(kind).owner(id)
    }

    /// Whether the local copy of a face or edge runs opposite to the owner's.
    pub fn entity_get_flip(&self, kind: EntityKind, id: EntityId) -> bool {
        kind != EntityKind::Node && kind != EntityKind::Cell && self.table(kind).flip(id)
    }

    /// Model entity `id` is classified on.
    pub fn model_entity(&self, kind: EntityKind, id: EntityId) -> ModelEntity {
        let mtype = self.mtype(kind);
        self.kernel
            .class(mtype, self.handle(kind, id))
            .unwrap_or(ModelEntity::interior(self.cell_dim))
    }

    pub fn cell_get_type(&self, c: EntityId) -> CellType {
        self.kernel.cell_type(self.cell_mtype(), self.handle(EntityKind::Cell, c))
    }

    // ---------------------------------------------------------------------
    // Downward adjacency
    // ---------------------------------------------------------------------

    /// Faces of cell `c` in native order, with directions.
    pub fn cell_get_faces_and_dirs(&self, c: EntityId) -> (Vec<EntityId>, Vec<i32>) {
        let cell = self.cell_mtype();
        let faces = self.table(EntityKind::Face);
        self.kernel
            .cell_sides(self.handle(EntityKind::Cell, c), cell)
            .iter()
            .filter_map(|&(side, dir)| {
                let f = faces.local_id(side)?;
                let d = sign(dir) * if faces.flip(f) { -1 } else { 1 };
                Some((f, d))
            })
            .unzip()
    }

    pub fn cell_get_faces(&self, c: EntityId) -> Vec<EntityId> {
        self.cell_get_faces_and_dirs(c).0
    }

    /// Edges of cell `c`. For a planar cell these are its faces.
    pub fn cell_get_edges(&self, c: EntityId) -> Vec<EntityId> {
        let h = self.handle(EntityKind::Cell, c);
        if self.cell_dim == 3 {
            self.local_ids(EntityKind::Edge, self.kernel.region_edges(h))
        } else {
            self.local_ids(EntityKind::Edge, self.kernel.face_edges(h).iter().map(|&(e, _)| e))
        }
    }

    /// Nodes of cell `c`: the template order for standard solids, the
    /// counter-clockwise cycle for planar cells.
    pub fn cell_get_nodes(&self, c: EntityId) -> Vec<EntityId> {
        let h = self.handle(EntityKind::Cell, c);
        self.local_ids(EntityKind::Node, self.kernel.cell_vertices(h, self.cell_mtype()))
    }

    /// Edges of face `f` with directions relative to the face's node cycle.
    /// A planar mesh's face is an edge and returns itself.
    pub fn face_get_edges_and_dirs(&self, f: EntityId) -> (Vec<EntityId>, Vec<i32>) {
        if self.cell_dim == 2 {
            return (vec![f], vec![1]);
        }
        let edges = self.table(EntityKind::Edge);
        let face_flip = self.table(EntityKind::Face).flip(f);
        let mut out: Vec<(EntityId, i32)> = self
            .kernel
            .face_edges(self.handle(EntityKind::Face, f))
            .iter()
            .filter_map(|&(e, dir)| {
                let id = edges.local_id(e)?;
                let d = sign(dir) * if edges.flip(id) { -1 } else { 1 };
                Some((id, d))
            })
            .collect();
        if face_flip {
            out.reverse();
            for (_, d) in &mut out {
                *d = -*d;
            }
        }
        out.into_iter().unzip()
    }

    /// Node cycle of face `f` (both nodes of a planar mesh's face).
    pub fn face_get_nodes(&self, f: EntityId) -> Vec<EntityId> {
        let mtype = self.mtype(EntityKind::Face);
        let h = self.handle(EntityKind::Face, f);
        let mut nodes = self.local_ids(EntityKind::Node, self.kernel.entity_vertices(mtype, h));
        if self.table(EntityKind::Face).flip(f) {
            if mtype == MType::Edge {
                nodes.reverse();
            } else {
                reverse_cycle(&mut nodes);
            }
        }
        nodes
    }

    pub fn edge_get_nodes(&self, e: EntityId) -> [EntityId; 2] {
        let [a, b] = self.kernel.edge_vertices(self.handle(EntityKind::Edge, e));
        let nodes = self.table(EntityKind::Node);
        let (a, b) = (nodes.local_id(a).unwrap_or(usize::MAX), nodes.local_id(b).unwrap_or(usize::MAX));
        if self.table(EntityKind::Edge).flip(e) { [b, a] } else { [a, b] }
    }

    // ---------------------------------------------------------------------
    // Upward adjacency
    // ---------------------------------------------------------------------

    fn filtered(&self, kind: EntityKind, handles: &[PointId], ptype: ParallelType) -> Vec<EntityId> {
        self.local_ids(kind, handles.iter().copied())
            .into_iter()
            .filter(|&id| self.admits(kind, id, ptype))
            .collect()
    }

    pub fn node_get_cells(&self, n: EntityId, ptype: ParallelType) -> Vec<EntityId> {
        let h = self.handle(EntityKind::Node, n);
        self.filtered(EntityKind::Cell, self.kernel.vertex_cells(h, self.cell_mtype()), ptype)
    }

    pub fn node_get_faces(&self, n: EntityId, ptype: ParallelType) -> Vec<EntityId> {
        let h = self.handle(EntityKind::Node, n);
        let up = if self.cell_dim == 3 {
            self.kernel.vertex_faces(h)
        } else {
            self.kernel.vertex_edges(h)
        };
        self.filtered(EntityKind::Face, up, ptype)
    }

    /// Faces of cell `c` that contain node `n`.
    pub fn node_get_cell_faces(&self, n: EntityId, c: EntityId) -> Vec<EntityId> {
        self.cell_get_faces(c)
            .into_iter()
            .filter(|&f| self.face_get_nodes(f).contains(&n))
            .collect()
    }

    /// Cells bounded by face `f`: one on the boundary, two inside.
    pub fn face_get_cells(&self, f: EntityId, ptype: ParallelType) -> Vec<EntityId> {
        let h = self.handle(EntityKind::Face, f);
        self.filtered(EntityKind::Cell, self.kernel.side_cells(h, self.cell_mtype()), ptype)
    }

    // ---------------------------------------------------------------------
    // Same-level adjacency
    // ---------------------------------------------------------------------

    /// Cells sharing a face with `c`, in face order.
    pub fn cell_get_face_adj_cells(&self, c: EntityId, ptype: ParallelType) -> Vec<EntityId> {
        let mut out = Vec::new();
        for f in self.cell_get_faces(c) {
            for other in self.face_get_cells(f, ptype) {
                if other != c && !out.contains(&other) {
                    out.push(other);
                }
            }
        }
        out
    }

    /// Cells sharing at least one node with `c`, each reported once.
    pub fn cell_get_node_adj_cells(&self, c: EntityId, ptype: ParallelType) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        seen.insert(c);
        let mut out = Vec::new();
        for n in self.cell_get_nodes(c) {
            for other in self.node_get_cells(n, ParallelType::Used) {
                if seen.insert(other) && self.admits(EntityKind::Cell, other, ptype) {
                    out.push(other);
                }
            }
        }
        out
    }

    // ---------------------------------------------------------------------
    // Coordinates
    // ---------------------------------------------------------------------

    pub fn node_get_coordinates(&self, n: EntityId) -> Point {
        self.kernel.coords(self.handle(EntityKind::Node, n))
    }

    /// Coordinates of the nodes of `f`, in [`Mesh::face_get_nodes`] order.
    pub fn face_get_coordinates(&self, f: EntityId) -> Vec<Point> {
        self.face_get_nodes(f).into_iter().map(|n| self.node_get_coordinates(n)).collect()
    }

    /// Coordinates of the nodes of `c`, in [`Mesh::cell_get_nodes`] order.
    pub fn cell_get_coordinates(&self, c: EntityId) -> Vec<Point> {
        self.cell_get_nodes(c).into_iter().map(|n| self.node_get_coordinates(n)).collect()
    }

    pub fn edge_vector(&self, e: EntityId) -> Point {
        let [a, b] = self.edge_get_nodes(e);
        metrics::sub(self.node_get_coordinates(b), self.node_get_coordinates(a))
    }

    pub fn edge_length(&self, e: EntityId) -> f64 {
        metrics::norm(self.edge_vector(e))
    }

    /// Whether `p` lies in cell `c` (boundary included).
    pub fn point_in_cell(&self, p: Point, c: EntityId) -> bool {
        if self.cell_dim == 3 {
            return metrics::point_in_polyhedron(p, &self.cell_face_cycles(c));
        }
        let pts = self.cell_get_coordinates(c);
        if self.space_dimension() == 2 {
            metrics::point_in_polygon_2d(p, &pts)
        } else {
            region::in_polygon(p, &pts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::config::MeshConfig;
    use crate::mesh::MeshFactory;
    use ParallelType::{Ghost, Owned, Used};

    fn cube(n: usize) -> Mesh {
        MeshFactory::new(&NoComm, MeshConfig::default())
            .create_box([0.0; 3], [1.0; 3], [n, n, n])
            .unwrap()
    }

    #[test]
    fn counts_partition_into_owned_and_ghost() {
        let m = cube(2);
        for kind in EntityKind::ALL {
            assert_eq!(m.num_entities(kind, Ghost), 0);
            assert_eq!(m.num_entities(kind, Owned), m.num_entities(kind, Used));
        }
        assert_eq!(m.num_entities(EntityKind::Node, Used), 27);
        assert_eq!(m.num_entities(EntityKind::Edge, Used), 54);
        assert_eq!(m.num_entities(EntityKind::Face, Used), 36);
        assert_eq!(m.num_entities(EntityKind::Cell, Used), 8);
        assert_eq!(m.global_id(EntityKind::Face, 7), 7);
    }

    #[test]
    fn face_to_cells_and_back() {
        let m = cube(2);
        for f in 0..m.num_entities(EntityKind::Face, Used) {
            let cells = m.face_get_cells(f, Used);
            assert!(matches!(cells.len(), 1 | 2));
            for c in cells {
                assert!(m.cell_get_faces(c).contains(&f));
            }
        }
    }

    #[test]
    fn node_adjacency_is_deduplicated() {
        let m = cube(2);
        for c in 0..8 {
            let adj = m.cell_get_node_adj_cells(c, Used);
            assert_eq!(adj.len(), 7);
            assert!(!adj.contains(&c));
            assert_eq!(m.cell_get_face_adj_cells(c, Used).len(), 3);
        }
    }

    #[test]
    fn hex_downward_counts() {
        let m = cube(1);
        assert_eq!(m.cell_get_type(0), CellType::Hexahedron);
        assert_eq!(m.cell_get_nodes(0).len(), 8);
        assert_eq!(m.cell_get_edges(0).len(), 12);
        let (faces, dirs) = m.cell_get_faces_and_dirs(0);
        assert_eq!(faces.len(), 6);
        assert!(dirs.iter().all(|&d| d == 1));
        for f in faces {
            let (edges, edirs) = m.face_get_edges_and_dirs(f);
            assert_eq!(edges.len(), 4);
            let nodes = m.face_get_nodes(f);
            // Each directed edge starts where the node cycle says.
            for (i, (&e, &d)) in edges.iter().zip(&edirs).enumerate() {
                let [a, b] = m.edge_get_nodes(e);
                let start = if d > 0 { a } else { b };
                assert_eq!(start, nodes[i]);
            }
        }
    }

    #[test]
    fn point_location() {
        let m = cube(2);
        let hits: Vec<_> = (0..8).filter(|&c| m.point_in_cell([0.25, 0.25, 0.75], c)).collect();
        assert_eq!(hits.len(), 1);
        assert!((m.cell_centroid(hits[0])[2] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn boundary_classification() {
        let m = cube(1);
        for f in 0..6 {
            let class = m.model_entity(EntityKind::Face, f);
            assert_eq!(class.dim, 2);
            assert!((1..=6).contains(&class.id));
        }
        assert_eq!(m.model_entity(EntityKind::Cell, 0), ModelEntity::new(3, 1));
    }
}
