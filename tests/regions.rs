mod util;

use mesh_weave::prelude::*;
use util::{TWO_HEX, model, scratch_dir};

use ParallelType::{Owned, Used};

const CUBE_REGIONS: &str = r#"{"regions": [
    {"name": "West", "id": 1, "type": "box", "lo": [0, 0, 0], "hi": [0.5, 1, 1]},
    {"name": "South", "id": 2, "type": "box", "lo": [0, 0, 0], "hi": [1, 0.5, 1], "lifecycle": "temporary"},
    {"name": "SouthWest", "id": 3, "type": "logical", "operation": "intersect", "components": ["West", "South"]},
    {"name": "WestSouth", "id": 4, "type": "logical", "operation": "intersect", "components": ["South", "West"]},
    {"name": "Rest", "id": 5, "type": "logical", "operation": "complement", "components": ["West", "South"]},
    {"name": "MidPlane", "id": 6, "type": "plane", "point": [0.5, 0, 0], "normal": [1, 0, 0]},
    {"name": "Center", "id": 7, "type": "point", "point": [0.5, 0.5, 0.5]},
    {"name": "Floor", "id": 8, "type": "polygon", "points": [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]]},
    {"name": "Stripes", "id": 9, "type": "color_function", "value": 2,
     "grid": {"origin": [0, 0, 0], "spacing": [0.5, 1, 1], "counts": [2, 1, 1], "colors": [1, 2]}},
    {"name": "Loop", "id": 10, "type": "logical", "operation": "union", "components": ["West", "Loop"]}
]}"#;

fn cube() -> Mesh {
    MeshFactory::new(&NoComm, MeshConfig::default())
        .with_geometric_model(model(CUBE_REGIONS))
        .create_box([0.0; 3], [1.0; 3], [4, 4, 4])
        .unwrap()
}

#[test]
fn intersection_ignores_component_order() {
    let m = cube();
    let a = m.get_set_entities("SouthWest", EntityKind::Cell, Used).unwrap();
    let b = m.get_set_entities("WestSouth", EntityKind::Cell, Used).unwrap();
    assert_eq!(a.len(), 16);
    assert_eq!(a, b);
    for &c in &a {
        let x = m.cell_centroid(c);
        assert!(x[0] < 0.5 && x[1] < 0.5);
    }
    assert_eq!(m.get_set_size("Rest", EntityKind::Cell, Used).unwrap(), 16);
}

#[test]
fn regions_by_id_match_regions_by_name() {
    let m = cube();
    for (id, name) in [(1, "West"), (3, "SouthWest"), (6, "MidPlane")] {
        for kind in [EntityKind::Cell, EntityKind::Face, EntityKind::Node] {
            assert_eq!(
                m.get_set_entities_by_id(id, kind, Owned).unwrap(),
                m.get_set_entities(name, kind, Owned).unwrap()
            );
        }
    }
}

#[test]
fn geometric_regions_of_every_shape() {
    let m = cube();
    assert_eq!(m.get_set_size("MidPlane", EntityKind::Face, Used).unwrap(), 16);
    assert_eq!(m.get_set_size("MidPlane", EntityKind::Node, Used).unwrap(), 25);
    assert_eq!(m.get_set_size("Center", EntityKind::Cell, Used).unwrap(), 8);
    assert_eq!(m.get_set_size("Center", EntityKind::Node, Used).unwrap(), 1);
    assert_eq!(m.get_set_size("Floor", EntityKind::Face, Used).unwrap(), 16);
    assert_eq!(m.get_set_size("Floor", EntityKind::Node, Used).unwrap(), 25);
    let stripes = m.get_set_entities("Stripes", EntityKind::Cell, Used).unwrap();
    assert_eq!(stripes.len(), 32);
    assert!(stripes.iter().all(|&c| m.cell_centroid(c)[0] > 0.5));
    // A plane cannot select volume cells.
    assert!(m.get_set_entities("MidPlane", EntityKind::Cell, Used).unwrap().is_empty());
}

#[test]
fn self_referencing_logical_region_fails() {
    let m = cube();
    assert!(matches!(
        m.get_set_entities("Loop", EntityKind::Cell, Used),
        Err(MeshError::InvalidParameters(_))
    ));
}

const FILE_REGIONS: &str = r#"{"regions": [
    {"name": "Block10", "id": 1, "type": "labeled_set", "label": "10", "entity": "CELL"},
    {"name": "Block20", "id": 2, "type": "labeled_set", "label": "20", "entity": "CELL"},
    {"name": "Elems", "id": 3, "type": "labeled_set", "label": "5", "entity": "CELL"},
    {"name": "Ends", "id": 4, "type": "labeled_set", "label": "1", "entity": "FACE"},
    {"name": "Corners", "id": 5, "type": "labeled_set", "label": "7", "entity": "NODE"},
    {"name": "Missing", "id": 6, "type": "labeled_set", "label": "99", "entity": "CELL"},
    {"name": "Blocks", "id": 7, "type": "logical", "operation": "union", "components": ["Block10", "Block20"]},
    {"name": "Left", "id": 8, "type": "box", "lo": [0, 0, 0], "hi": [1, 1, 1]},
    {"name": "Mixed", "id": 9, "type": "logical", "operation": "union", "components": ["Block10", "Left"]}
]}"#;

fn two_hex(tag: &str) -> Mesh {
    let path = scratch_dir(tag).join("two_hex.exo");
    std::fs::write(&path, TWO_HEX).unwrap();
    MeshFactory::new(&NoComm, MeshConfig::default())
        .with_geometric_model(model(FILE_REGIONS))
        .create_from_file(&path)
        .unwrap()
}

#[test]
fn labeled_sets_from_file() {
    let m = two_hex("labeled-sets");
    let b10 = m.get_set_entities("Block10", EntityKind::Cell, Used).unwrap();
    let b20 = m.get_set_entities("Block20", EntityKind::Cell, Used).unwrap();
    assert_eq!(b10.len(), 1);
    assert_eq!(b20.len(), 1);
    assert!(m.cell_centroid(b10[0])[0] < 1.0);
    assert!(m.cell_centroid(b20[0])[0] > 1.0);
    assert_eq!(m.get_set_size("Elems", EntityKind::Cell, Used).unwrap(), 2);
    assert_eq!(m.get_set_size("Blocks", EntityKind::Cell, Used).unwrap(), 2);

    let ends = m.get_set_entities("Ends", EntityKind::Face, Used).unwrap();
    let mut xs: Vec<f64> = ends.iter().map(|&f| m.face_centroid(f)[0]).collect();
    xs.sort_by(f64::total_cmp);
    assert_eq!(xs.len(), 2);
    assert!(xs[0].abs() < 1e-12 && (xs[1] - 2.0).abs() < 1e-12);

    let corners = m.get_set_entities("Corners", EntityKind::Node, Used).unwrap();
    let mut pts: Vec<_> = corners.iter().map(|&n| m.node_get_coordinates(n)).collect();
    pts.sort_by(|a, b| a[0].total_cmp(&b[0]));
    assert_eq!(pts, vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);

    assert!(m.valid_set_name("Block10", EntityKind::Cell));
    assert!(m.valid_set_name("Ends", EntityKind::Face));
    assert!(!m.valid_set_name("Ends", EntityKind::Cell));
    assert!(!m.valid_set_name("Missing", EntityKind::Cell));
}

#[test]
fn labeled_set_errors() {
    let m = two_hex("labeled-errors");
    assert!(matches!(
        m.get_set_entities("Block10", EntityKind::Face, Used),
        Err(MeshError::LabeledSetKindMismatch { .. })
    ));
    assert!(matches!(
        m.get_set_entities("Missing", EntityKind::Cell, Used),
        Err(MeshError::LabeledSetNotFound { .. })
    ));
    assert!(matches!(
        m.get_set_entities("Mixed", EntityKind::Node, Used),
        Err(MeshError::InconsistentSetTypes { .. })
    ));
    // Block 10 is the hex inside the unit box.
    assert_eq!(m.get_set_size("Mixed", EntityKind::Cell, Used).unwrap(), 1);
}
