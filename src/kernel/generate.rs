//! Regular grid generation with model classification.
//!
//! Vertices are numbered with `k` outermost and `i` innermost, cells likewise.
//! Every entity is classified onto the model entity of the bounding box it
//! lies on. For each axis the position code is 0 on the low side, 2 on the
//! high side and 1 strictly inside (or when the entity spans that axis); the
//! code triple indexes a fixed template, independent of the resolution.

use crate::kernel::NativeMesh;
use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use crate::topology::entity::{MType, ModelEntity};
use crate::topology::point::PointId;

/// Model entity IDs of a box, indexed by the per-axis position codes `[x][y][z]`.
const BOX_IDS: [[[u32; 3]; 3]; 3] = [
    [[1, 4, 5], [9, 6, 12], [3, 8, 7]],
    [[1, 1, 3], [3, 1, 4], [5, 2, 7]],
    [[2, 2, 6], [10, 5, 11], [4, 6, 8]],
];

/// Model entity dimensions matching [`BOX_IDS`].
const BOX_DIMS: [[[u8; 3]; 3]; 3] = [
    [[0, 1, 0], [1, 2, 1], [0, 1, 0]],
    [[1, 2, 1], [2, 3, 2], [1, 2, 1]],
    [[0, 1, 0], [1, 2, 1], [0, 1, 0]],
];

/// Model entity IDs of a rectangle, indexed by `[x][y]` codes.
const RECT_IDS: [[u32; 3]; 3] = [[1, 4, 4], [1, 1, 3], [2, 2, 3]];

/// Model entity dimensions matching [`RECT_IDS`].
const RECT_DIMS: [[u8; 3]; 3] = [[0, 1, 0], [1, 2, 1], [0, 1, 0]];

/// Options of the generator.
#[derive(Clone, Copy, Debug)]
pub struct GenerateOptions {
    /// Classify entities onto the bounding-box model; otherwise everything is interior.
    pub classify: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { classify: true }
    }
}

fn position_code(idx: usize, n: usize) -> usize {
    if idx == 0 {
        0
    } else if idx == n {
        2
    } else {
        1
    }
}

fn axis_code(indices: &[usize], n: usize) -> usize {
    match indices.split_first() {
        Some((&first, rest)) if rest.iter().all(|&i| i == first) => position_code(first, n),
        _ => 1,
    }
}

fn axis_coord(lo: f64, hi: f64, i: usize, n: usize) -> f64 {
    if i == n {
        hi
    } else {
        lo + (hi - lo) * i as f64 / n as f64
    }
}

fn check_box(lo: &[f64], hi: &[f64], counts: &[usize]) -> Result<(), MeshError> {
    for axis in 0..counts.len() {
        if counts[axis] == 0 {
            return Err(MeshError::InvalidParameters(format!(
                "cell count along axis {axis} must be positive"
            )));
        }
        if !(hi[axis] > lo[axis]) {
            return Err(MeshError::InvalidParameters(format!(
                "upper corner {} must exceed lower corner {} along axis {axis}",
                hi[axis], lo[axis]
            )));
        }
    }
    Ok(())
}

/// Classifies every edge and face from the lattice indices of its vertices.
fn classify_lattice<F>(mesh: &mut NativeMesh, lattice: &[[usize; 3]], mtypes: &[MType], lookup: F)
where
    F: Fn([usize; 3]) -> ModelEntity,
{
    for &mtype in mtypes {
        for h in mesh.handles(mtype) {
            let verts = mesh.entity_vertices(mtype, h);
            let mut codes = [0usize; 3];
            for (axis, code) in codes.iter_mut().enumerate() {
                let idx: Vec<usize> = verts.iter().map(|v| lattice[v.index()][axis]).collect();
                *code = axis_code(&idx, lattice_extent(lattice, axis));
            }
            mesh.set_class(mtype, h, lookup(codes));
        }
    }
}

fn lattice_extent(lattice: &[[usize; 3]], axis: usize) -> usize {
    lattice.last().map_or(0, |l| l[axis])
}

/// Hexahedral grid of `nx * ny * nz` cells spanning `[lo, hi]`.
pub fn hex_grid(
    lo: [f64; 3],
    hi: [f64; 3],
    counts: [usize; 3],
    options: GenerateOptions,
) -> Result<NativeMesh, MeshError> {
    check_box(&lo, &hi, &counts)?;
    let [nx, ny, nz] = counts;
    let box_class = |c: [usize; 3]| ModelEntity::new(BOX_DIMS[c[0]][c[1]][c[2]], BOX_IDS[c[0]][c[1]][c[2]]);
    let interior = ModelEntity::interior(3);

    let mut mesh = NativeMesh::new(3);
    mesh.set_class_dim(3);
    let mut lattice = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                let coords = [
                    axis_coord(lo[0], hi[0], i, nx),
                    axis_coord(lo[1], hi[1], j, ny),
                    axis_coord(lo[2], hi[2], k, nz),
                ];
                let class = if options.classify {
                    box_class([position_code(i, nx), position_code(j, ny), position_code(k, nz)])
                } else {
                    interior
                };
                mesh.add_vertex(coords, class);
                lattice.push([i, j, k]);
            }
        }
    }

    let vid = |i: usize, j: usize, k: usize| PointId::from_index(i + (nx + 1) * (j + (ny + 1) * k));
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let verts = [
                    vid(i, j, k),
                    vid(i + 1, j, k),
                    vid(i + 1, j + 1, k),
                    vid(i, j + 1, k),
                    vid(i, j, k + 1),
                    vid(i + 1, j, k + 1),
                    vid(i + 1, j + 1, k + 1),
                    vid(i, j + 1, k + 1),
                ];
                mesh.add_region_from_vertices(CellType::Hexahedron, &verts, interior)?;
            }
        }
    }

    if options.classify {
        classify_lattice(&mut mesh, &lattice, &[MType::Edge, MType::Face], box_class);
    }
    log::debug!(
        "generated {}x{}x{} hex grid: {} vertices, {} faces",
        nx,
        ny,
        nz,
        mesh.num_live(MType::Vertex),
        mesh.num_live(MType::Face)
    );
    Ok(mesh)
}

/// Quadrilateral grid of `nx * ny` cells spanning `[lo, hi]` in the xy-plane.
pub fn quad_grid(
    lo: [f64; 2],
    hi: [f64; 2],
    counts: [usize; 2],
    options: GenerateOptions,
) -> Result<NativeMesh, MeshError> {
    check_box(&lo, &hi, &counts)?;
    let [nx, ny] = counts;
    let rect_class = |c: [usize; 3]| ModelEntity::new(RECT_DIMS[c[0]][c[1]], RECT_IDS[c[0]][c[1]]);
    let interior = ModelEntity::interior(2);

    let mut mesh = NativeMesh::new(2);
    mesh.set_class_dim(2);
    let mut lattice = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            let coords = [axis_coord(lo[0], hi[0], i, nx), axis_coord(lo[1], hi[1], j, ny), 0.0];
            let class = if options.classify {
                rect_class([position_code(i, nx), position_code(j, ny), 0])
            } else {
                interior
            };
            mesh.add_vertex(coords, class);
            lattice.push([i, j, 0]);
        }
    }

    let vid = |i: usize, j: usize| PointId::from_index(i + (nx + 1) * j);
    for j in 0..ny {
        for i in 0..nx {
            let verts = [vid(i, j), vid(i + 1, j), vid(i + 1, j + 1), vid(i, j + 1)];
            mesh.add_polygon(&verts, interior)?;
        }
    }

    if options.classify {
        classify_lattice(&mut mesh, &lattice, &[MType::Edge], rect_class);
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_cube_counts() {
        let m = hex_grid([0.0; 3], [1.0; 3], [1, 1, 1], GenerateOptions::default()).unwrap();
        assert_eq!(m.num_live(MType::Vertex), 8);
        assert_eq!(m.num_live(MType::Edge), 12);
        assert_eq!(m.num_live(MType::Face), 6);
        assert_eq!(m.num_live(MType::Region), 1);
    }

    #[test]
    fn corners_are_model_vertices_one_to_eight() {
        let m = hex_grid([0.0; 3], [1.0; 3], [2, 2, 2], GenerateOptions::default()).unwrap();
        let mut ids: Vec<u32> = m
            .handles(MType::Vertex)
            .into_iter()
            .filter_map(|v| m.class(MType::Vertex, v))
            .filter(|c| c.dim == 0)
            .map(|c| c.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn boundary_faces_use_six_model_faces() {
        let m = hex_grid([0.0; 3], [1.0; 3], [2, 3, 2], GenerateOptions::default()).unwrap();
        let mut boundary = std::collections::BTreeMap::new();
        for f in m.handles(MType::Face) {
            let c = m.class(MType::Face, f).unwrap();
            if c.dim == 2 {
                *boundary.entry(c.id).or_insert(0usize) += 1;
            } else {
                assert_eq!(c, ModelEntity::interior(3));
            }
        }
        assert_eq!(boundary.len(), 6);
        assert_eq!(boundary.values().sum::<usize>(), 2 * (2 * 3 + 3 * 2 + 2 * 2));
        let mut edge_ids: Vec<u32> = m
            .handles(MType::Edge)
            .into_iter()
            .filter_map(|e| m.class(MType::Edge, e))
            .filter(|c| c.dim == 1)
            .map(|c| c.id)
            .collect();
        edge_ids.sort_unstable();
        edge_ids.dedup();
        assert_eq!(edge_ids, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn last_coordinate_is_exact() {
        let m = hex_grid([0.0; 3], [0.3, 0.7, 1.1], [3, 7, 11], GenerateOptions::default()).unwrap();
        let last = m.handles(MType::Vertex).last().copied().unwrap();
        assert_eq!(m.coords(last), [0.3, 0.7, 1.1]);
    }

    #[test]
    fn quad_grid_classification() {
        let m = quad_grid([0.0; 2], [2.0, 1.0], [2, 1], GenerateOptions::default()).unwrap();
        assert_eq!(m.num_live(MType::Face), 2);
        assert_eq!(m.num_live(MType::Edge), 7);
        let sides: Vec<ModelEntity> = m
            .handles(MType::Edge)
            .into_iter()
            .filter_map(|e| m.class(MType::Edge, e))
            .collect();
        assert_eq!(sides.iter().filter(|c| c.dim == 2).count(), 1);
        let corners: Vec<u32> = m
            .handles(MType::Vertex)
            .into_iter()
            .filter_map(|v| m.class(MType::Vertex, v))
            .filter(|c| c.dim == 0)
            .map(|c| c.id)
            .collect();
        assert_eq!(corners, vec![1, 2, 4, 3]);
    }

    #[test]
    fn unclassified_grid_is_interior() {
        let options = GenerateOptions { classify: false };
        let m = hex_grid([0.0; 3], [1.0; 3], [1, 1, 1], options).unwrap();
        for v in m.handles(MType::Vertex) {
            assert_eq!(m.class(MType::Vertex, v), Some(ModelEntity::interior(3)));
        }
    }

    #[test]
    fn rejects_empty_box() {
        assert!(hex_grid([0.0; 3], [1.0, 0.0, 1.0], [1, 1, 1], GenerateOptions::default()).is_err());
        assert!(quad_grid([0.0; 2], [1.0; 2], [0, 1], GenerateOptions::default()).is_err());
    }
}
