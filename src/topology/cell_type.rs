//! Cell shapes and their Exodus side templates.

use serde::{Deserialize, Serialize};

/// Cell shapes known to the mesh.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CellType {
    /// 2D simplex.
    Triangle,
    /// 2D tensor-product cell.
    Quadrilateral,
    /// 2D polygon with `n` vertices (`n > 4`).
    Polygon(u8),
    /// 3D simplex.
    Tetrahedron,
    /// 3D wedge.
    Prism,
    /// 3D pyramid.
    Pyramid,
    /// 3D tensor-product cell.
    Hexahedron,
    /// Generic polyhedron.
    Polyhedron,
}

const TET_SIDES: &[&[usize]] = &[&[0, 1, 3], &[1, 2, 3], &[0, 3, 2], &[0, 2, 1]];
const PRISM_SIDES: &[&[usize]] = &[
    &[0, 1, 4, 3],
    &[1, 2, 5, 4],
    &[0, 3, 5, 2],
    &[0, 2, 1],
    &[3, 4, 5],
];
const PYRAMID_SIDES: &[&[usize]] = &[
    &[0, 1, 4],
    &[1, 2, 4],
    &[2, 3, 4],
    &[3, 0, 4],
    &[0, 3, 2, 1],
];
const HEX_SIDES: &[&[usize]] = &[
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[0, 4, 7, 3],
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
];

impl CellType {
    /// Topological dimension.
    pub fn dimension(self) -> usize {
        match self {
            CellType::Triangle | CellType::Quadrilateral | CellType::Polygon(_) => 2,
            _ => 3,
        }
    }

    /// Vertex count of the standard shapes.
    pub fn num_vertices(self) -> Option<usize> {
        match self {
            CellType::Triangle => Some(3),
            CellType::Quadrilateral => Some(4),
            CellType::Polygon(n) => Some(n as usize),
            CellType::Tetrahedron => Some(4),
            CellType::Prism => Some(6),
            CellType::Pyramid => Some(5),
            CellType::Hexahedron => Some(8),
            CellType::Polyhedron => None,
        }
    }

    /// Whether the ordered face query has a canonical answer for this shape.
    pub fn is_standard_solid(self) -> bool {
        matches!(
            self,
            CellType::Tetrahedron | CellType::Prism | CellType::Pyramid | CellType::Hexahedron
        )
    }

    /// Side vertex templates in Exodus order; each side lists local vertices
    /// counter-clockwise seen from outside the cell.
    pub fn side_templates(self) -> Option<&'static [&'static [usize]]> {
        match self {
            CellType::Tetrahedron => Some(TET_SIDES),
            CellType::Prism => Some(PRISM_SIDES),
            CellType::Pyramid => Some(PYRAMID_SIDES),
            CellType::Hexahedron => Some(HEX_SIDES),
            _ => None,
        }
    }

    /// Local vertices of side `side` (0-based). For 2D shapes side `i` is the
    /// edge from vertex `i` to vertex `i + 1`.
    pub fn side_vertices(self, side: usize) -> Option<Vec<usize>> {
        if self.dimension() == 2 {
            let n = self.num_vertices()?;
            return (side < n).then(|| vec![side, (side + 1) % n]);
        }
        self.side_templates()?.get(side).map(|s| s.to_vec())
    }

    /// Polygon type from a vertex count.
    pub fn polygon(n: usize) -> CellType {
        match n {
            3 => CellType::Triangle,
            4 => CellType::Quadrilateral,
            n => CellType::Polygon(n.min(u8::MAX as usize) as u8),
        }
    }

    /// Solid type from the vertex counts of its faces.
    pub fn from_face_sizes(sizes: &[usize]) -> CellType {
        let tris = sizes.iter().filter(|&&n| n == 3).count();
        let quads = sizes.iter().filter(|&&n| n == 4).count();
        match (sizes.len(), tris, quads) {
            (4, 4, 0) => CellType::Tetrahedron,
            (5, 2, 3) => CellType::Prism,
            (5, 4, 1) => CellType::Pyramid,
            (6, 0, 6) => CellType::Hexahedron,
            _ => CellType::Polyhedron,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_size_inference() {
        assert_eq!(CellType::from_face_sizes(&[3, 3, 3, 3]), CellType::Tetrahedron);
        assert_eq!(CellType::from_face_sizes(&[4, 4, 4, 3, 3]), CellType::Prism);
        assert_eq!(CellType::from_face_sizes(&[3, 3, 3, 3, 4]), CellType::Pyramid);
        assert_eq!(CellType::from_face_sizes(&[4; 6]), CellType::Hexahedron);
        assert_eq!(CellType::from_face_sizes(&[4, 4, 4, 4, 4, 3, 3]), CellType::Polyhedron);
    }

    #[test]
    fn templates_cover_every_vertex() {
        for ty in [
            CellType::Tetrahedron,
            CellType::Prism,
            CellType::Pyramid,
            CellType::Hexahedron,
        ] {
            let n = ty.num_vertices().unwrap();
            let mut seen = vec![false; n];
            for side in ty.side_templates().unwrap() {
                for &v in *side {
                    seen[v] = true;
                }
            }
            assert!(seen.iter().all(|&s| s), "{ty:?}");
        }
    }

    #[test]
    fn polygon_sides_wrap() {
        assert_eq!(CellType::Quadrilateral.side_vertices(3), Some(vec![3, 0]));
        assert_eq!(CellType::Triangle.side_vertices(3), None);
        assert_eq!(CellType::Hexahedron.side_vertices(4), Some(vec![0, 3, 2, 1]));
    }
}
