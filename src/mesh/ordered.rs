//! Canonically ordered faces of standard solids.
//!
//! Start from a base face (face 0 of a tet or hex, the first triangle of a
//! prism, the quad of a pyramid) and walk its edges as seen from inside the
//! cell. Each edge contributes the lateral face across it, then come the base
//! and the face opposite to it, if any. A hex thus lists its four lateral
//! faces in rotational order followed by two opposite faces.

use super::Mesh;
use crate::topology::entity::EntityId;
use crate::topology::cell_type::CellType;

impl Mesh {
    /// Faces of cell `c` in canonical order with their directions. Planar
    /// cells and general polyhedra return the native order.
    pub fn cell_get_faces_and_dirs_ordered(&self, c: EntityId) -> (Vec<EntityId>, Vec<i32>) {
        let (faces, dirs) = self.cell_get_faces_and_dirs(c);
        if self.cell_dim != 3 {
            return (faces, dirs);
        }
        let cell_type = self.cell_get_type(c);
        if !cell_type.is_standard_solid() {
            return (faces, dirs);
        }
        let sizes: Vec<usize> = faces.iter().map(|&f| self.face_get_nodes(f).len()).collect();
        let base = match cell_type {
            CellType::Prism => sizes.iter().position(|&n| n == 3),
            CellType::Pyramid => sizes.iter().position(|&n| n == 4),
            _ => Some(0),
        };
        let Some(base) = base else {
            return (faces, dirs);
        };

        let (mut base_edges, _) = self.face_get_edges_and_dirs(faces[base]);
        if dirs[base] > 0 {
            base_edges.reverse();
        }
        let face_edges: Vec<Vec<EntityId>> = faces.iter().map(|&f| self.face_get_edges_and_dirs(f).0).collect();

        let mut taken = vec![false; faces.len()];
        taken[base] = true;
        let mut order = Vec::with_capacity(faces.len());
        for e in base_edges {
            for (j, edges) in face_edges.iter().enumerate() {
                if !taken[j] && edges.contains(&e) {
                    taken[j] = true;
                    order.push(j);
                }
            }
        }
        order.push(base);
        order.extend((0..faces.len()).filter(|&j| !taken[j]));
        if order.len() != faces.len() {
            log::debug!("cell {c}: inconsistent {cell_type:?} faces, keeping native order");
            return (faces, dirs);
        }
        order.into_iter().map(|j| (faces[j], dirs[j])).unzip()
    }

    /// Faces of cell `c` in canonical order.
    pub fn cell_get_faces_ordered(&self, c: EntityId) -> Vec<EntityId> {
        self.cell_get_faces_and_dirs_ordered(c).0
    }
}
