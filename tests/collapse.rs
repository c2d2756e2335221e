mod util;

use mesh_weave::prelude::*;
use util::scratch_dir;

use ParallelType::Used;

/// A prism whose top triangle has two coincident corners, next to a clean one.
const PINCHED: &str = "EXODUS
DIM 3
NODES 10
1 0 0 0
2 1 0 0
3 0 1 0
4 0 0 1
5 0 0 1
6 0 1 1
7 -1 0 0
8 -1 0 1
9 -1 1 0
10 -1 1 1
ELEMENTS 2
1 1 Prism 6 1 2 3 4 5 6
2 1 Prism 6 7 1 3 8 4 6
END
";

fn load(config: MeshConfig, tag: &str) -> Mesh {
    let path = scratch_dir(tag).join("pinched.exo");
    std::fs::write(&path, PINCHED).unwrap();
    MeshFactory::new(&NoComm, config).create_from_file(&path).unwrap()
}

#[test]
fn pinched_prism_is_collapsed_on_load() {
    let m = load(MeshConfig::default(), "collapse-on");
    assert_eq!(m.num_entities(EntityKind::Node, Used), 9);
    assert_eq!(m.num_entities(EntityKind::Cell, Used), 2);
    let types: Vec<CellType> = (0..2).map(|c| m.cell_get_type(c)).collect();
    assert!(types.contains(&CellType::Prism));
    assert!(types.contains(&CellType::Polyhedron));
    for c in 0..2 {
        assert!(m.cell_volume(c) > 0.0);
        // No edge of the result is degenerate.
        for e in m.cell_get_edges(c) {
            assert!(m.edge_length(e) > 0.0);
        }
    }
    // The collapsed cell keeps its neighbor across the shared quad.
    assert_eq!(m.cell_get_face_adj_cells(0, Used).len(), 1);
}

#[test]
fn collapse_can_be_disabled() {
    let config = MeshConfig {
        collapse_degenerate_edges: false,
        ..MeshConfig::default()
    };
    let m = load(config, "collapse-off");
    assert_eq!(m.num_entities(EntityKind::Node, Used), 10);
    let zero = (0..m.num_entities(EntityKind::Edge, Used)).filter(|&e| m.edge_length(e) == 0.0).count();
    assert_eq!(zero, 1);
}

#[test]
fn clean_meshes_are_untouched() {
    let off = MeshConfig {
        collapse_degenerate_edges: false,
        ..MeshConfig::default()
    };
    let a = util::unit_cube(2);
    let b = MeshFactory::new(&NoComm, off)
        .create_box([0.0; 3], [1.0; 3], [2, 2, 2])
        .unwrap();
    for kind in [EntityKind::Node, EntityKind::Edge, EntityKind::Face, EntityKind::Cell] {
        assert_eq!(a.num_entities(kind, Used), b.num_entities(kind, Used));
        for id in 0..a.num_entities(kind, Used) {
            assert_eq!(a.global_id(kind, id), b.global_id(kind, id));
        }
    }
}
