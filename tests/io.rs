mod util;

use mesh_weave::io::partitioned::{metadata_path, piece_path};
use mesh_weave::io::{parse_exodus, write_exodus, write_partitioned};
use mesh_weave::prelude::*;
use serial_test::serial;
use util::{TWO_HEX, model, scratch_dir, unit_cube};

use ParallelType::Used;

const REGIONS: &str = r#"{"regions": [
    {"name": "Block10", "id": 1, "type": "labeled_set", "label": "10", "entity": "CELL"},
    {"name": "Ends", "id": 2, "type": "labeled_set", "label": "1", "entity": "FACE"},
    {"name": "Corners", "id": 3, "type": "labeled_set", "label": "7", "entity": "NODE"}
]}"#;

fn sorted_coords(m: &Mesh) -> Vec<Point> {
    let mut pts: Vec<Point> = (0..m.num_entities(EntityKind::Node, Used))
        .map(|n| m.node_get_coordinates(n))
        .collect();
    pts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    pts
}

#[test]
#[serial]
fn generated_box_round_trips() {
    let m = unit_cube(2);
    let path = scratch_dir("io-box").join("box.exo");
    let file = std::fs::File::create(&path).unwrap();
    write_exodus(&m, file).unwrap();

    let back = MeshFactory::new(&NoComm, MeshConfig::default())
        .create_from_file(&path)
        .unwrap();
    for kind in [EntityKind::Node, EntityKind::Edge, EntityKind::Face, EntityKind::Cell] {
        assert_eq!(back.num_entities(kind, Used), m.num_entities(kind, Used));
    }
    assert_eq!(sorted_coords(&back), sorted_coords(&m));
    let volume: f64 = (0..8).map(|c| back.cell_volume(c)).sum();
    assert!((volume - 1.0).abs() < 1e-12);
}

#[test]
#[serial]
fn file_sets_survive_a_rewrite() {
    let dir = scratch_dir("io-sets");
    let first = dir.join("two_hex.exo");
    std::fs::write(&first, TWO_HEX).unwrap();
    let factory = MeshFactory::new(&NoComm, MeshConfig::default()).with_geometric_model(model(REGIONS));
    let m = factory.create_from_file(&first).unwrap();

    let mut text = Vec::new();
    write_exodus(&m, &mut text).unwrap();
    let doc = parse_exodus(std::str::from_utf8(&text).unwrap()).unwrap();
    assert_eq!(doc.nodes.len(), 12);
    assert_eq!(doc.elements.len(), 2);

    let second = dir.join("again.exo");
    std::fs::write(&second, &text).unwrap();
    let back = factory.create_from_file(&second).unwrap();
    assert_eq!(back.get_set_size("Block10", EntityKind::Cell, Used).unwrap(), 1);
    assert_eq!(back.get_set_size("Ends", EntityKind::Face, Used).unwrap(), 2);
    assert_eq!(back.get_set_size("Corners", EntityKind::Node, Used).unwrap(), 2);
    assert_eq!(sorted_coords(&back), sorted_coords(&m));
}

#[test]
#[serial]
fn serial_partitioned_round_trip() {
    let m = unit_cube(2);
    let path = scratch_dir("io-par").join("cube.par");
    write_partitioned(&m, &path).unwrap();
    assert!(piece_path(&path, 0, 1).exists());
    assert!(metadata_path(&path, 0, 1).exists());

    let back = MeshFactory::new(&NoComm, MeshConfig::default())
        .create_from_file(&path)
        .unwrap();
    assert_eq!(back.num_entities(EntityKind::Cell, Used), 8);
    assert_eq!(back.num_entities(EntityKind::Face, Used), 36);
    // File IDs carry global IDs, so numbering survives the round trip.
    for n in 0..27 {
        let gid = back.global_id(EntityKind::Node, n);
        let orig = m.local_id_of(EntityKind::Node, gid).unwrap();
        assert_eq!(back.node_get_coordinates(n), m.node_get_coordinates(orig));
    }
}

#[test]
#[serial]
fn malformed_files_fail_to_import() {
    let dir = scratch_dir("io-bad");
    let path = dir.join("bad.exo");
    std::fs::write(&path, "EXODUS\nDIM 3\nNODES 2\n1 0 0\n").unwrap();
    let err = MeshFactory::new(&NoComm, MeshConfig::default())
        .create_from_file(&path)
        .unwrap_err();
    match err {
        MeshError::ImportFailure { path: p, rank, .. } => {
            assert_eq!(rank, 0);
            assert!(p.ends_with("bad.exo"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    // A partitioned file with no piece for this rank count.
    let err = MeshFactory::new(&NoComm, MeshConfig::default())
        .create_from_file(dir.join("missing.par"))
        .unwrap_err();
    assert!(matches!(err, MeshError::ImportFailure { .. }));
}
