mod util;

use mesh_weave::geometry::metrics::{add, cross, dot, norm, scale, sub};
use mesh_weave::prelude::*;
use util::{assert_permutation, unit_cube};

use ParallelType::{Owned, Used};

#[test]
fn faces_and_cells_agree() {
    let m = unit_cube(3);
    for c in 0..m.num_entities(EntityKind::Cell, Used) {
        for f in m.cell_get_faces(c) {
            assert!(m.face_get_cells(f, Used).contains(&c));
        }
        for n in m.cell_get_nodes(c) {
            assert!(m.node_get_cells(n, Used).contains(&c));
        }
    }
    for f in 0..m.num_entities(EntityKind::Face, Used) {
        let cells = m.face_get_cells(f, Used);
        assert_eq!(cells.len() == 1, m.exterior_face_map().contains(f));
        for c in cells {
            assert!(m.cell_get_faces(c).contains(&f));
        }
    }
}

#[test]
fn face_adjacency_is_symmetric() {
    let m = unit_cube(3);
    for c in 0..27 {
        let adj = m.cell_get_face_adj_cells(c, Used);
        for &d in &adj {
            assert!(m.cell_get_face_adj_cells(d, Used).contains(&c));
        }
        // Corner cells touch 3 neighbors, the center cell 6.
        assert!((3..=6).contains(&adj.len()));
    }
    let center = (0..27)
        .find(|&c| util::near(m.cell_centroid(c), [0.5; 3]))
        .unwrap();
    assert_eq!(m.cell_get_face_adj_cells(center, Used).len(), 6);
    assert_eq!(m.cell_get_node_adj_cells(center, Used).len(), 26);
}

#[test]
fn cell_boundaries_close() {
    let m = unit_cube(2);
    for c in 0..8 {
        let (faces, dirs) = m.cell_get_faces_and_dirs(c);
        let mut sum = [0.0; 3];
        for (&f, &d) in faces.iter().zip(&dirs) {
            let n = m.face_normal(f);
            sum = add(sum, scale(n, f64::from(d)));
            // Outward normals point away from the cell centroid.
            let out = sub(m.face_centroid(f), m.cell_centroid(c));
            assert!(dot(scale(n, f64::from(d)), out) > 0.0);
        }
        assert!(norm(sum) < 1e-12);
    }
}

#[test]
fn planar_cells_run_counter_clockwise() {
    let m = MeshFactory::new(&NoComm, MeshConfig::default())
        .create_rectangle([0.0, 0.0], [3.0, 2.0], [3, 2])
        .unwrap();
    for c in 0..6 {
        let (faces, dirs) = m.cell_get_faces_and_dirs(c);
        assert_eq!(faces.len(), 4);
        let mut sum = [0.0; 3];
        for (&f, &d) in faces.iter().zip(&dirs) {
            sum = add(sum, scale(m.face_normal(f), f64::from(d)));
            let out = m.face_normal_outward(f, c).unwrap();
            assert!(dot(out, sub(m.face_centroid(f), m.cell_centroid(c))) > 0.0);
        }
        assert!(norm(sum) < 1e-12);
        assert!((m.cell_volume(c) - 1.0).abs() < 1e-12);
        assert_eq!(m.cell_get_edges(c), faces);
    }
}

#[test]
fn face_edges_follow_the_node_cycle() {
    let m = unit_cube(2);
    for f in 0..m.num_entities(EntityKind::Face, Used) {
        let nodes = m.face_get_nodes(f);
        let (edges, dirs) = m.face_get_edges_and_dirs(f);
        assert_eq!(edges.len(), nodes.len());
        for (i, (&e, &d)) in edges.iter().zip(&dirs).enumerate() {
            let [a, b] = m.edge_get_nodes(e);
            let (a, b) = if d > 0 { (a, b) } else { (b, a) };
            assert_eq!(a, nodes[i]);
            assert_eq!(b, nodes[(i + 1) % nodes.len()]);
        }
    }
}

#[test]
fn node_faces_and_cell_faces() {
    let m = unit_cube(2);
    let center = (0..27)
        .find(|&n| util::near(m.node_get_coordinates(n), [0.5; 3]))
        .unwrap();
    assert_eq!(m.node_get_cells(center, Used).len(), 8);
    assert_eq!(m.node_get_faces(center, Used).len(), 12);
    for c in m.node_get_cells(center, Owned) {
        assert_eq!(m.node_get_cell_faces(center, c).len(), 3);
    }
}

#[test]
fn ordered_faces_are_a_permutation() {
    let m = unit_cube(2);
    for c in 0..8 {
        let (native, native_dirs) = m.cell_get_faces_and_dirs(c);
        let (ordered, dirs) = m.cell_get_faces_and_dirs_ordered(c);
        assert_permutation(&ordered, &native);
        for (f, d) in ordered.iter().zip(&dirs) {
            let i = native.iter().position(|x| x == f).unwrap();
            assert_eq!(*d, native_dirs[i]);
        }
        // Four lateral faces in rotation, then the base and its opposite.
        let [base, top] = [ordered[4], ordered[5]];
        assert!(norm(cross(m.face_normal(base), m.face_normal(top))) < 1e-12);
        for i in 0..4 {
            let a = m.face_get_edges_and_dirs(ordered[i]).0;
            let b = m.face_get_edges_and_dirs(ordered[(i + 1) % 4]).0;
            assert!(a.iter().any(|e| b.contains(e)), "lateral faces {i} and {} share no edge", (i + 1) % 4);
        }
    }
}

#[test]
fn global_ids_and_maps() {
    let m = unit_cube(2);
    for kind in [EntityKind::Node, EntityKind::Edge, EntityKind::Face, EntityKind::Cell] {
        let n = m.num_entities(kind, Used);
        let map = m.map(kind, Owned);
        assert_eq!(map.len(), n);
        assert_eq!(map.num_global(), n as u64);
        let mut gids: Vec<_> = (0..n).map(|id| m.global_id(kind, id)).collect();
        for id in 0..n {
            assert_eq!(m.local_id_of(kind, gids[id]), Some(id));
            assert_eq!(m.entity_get_owner(kind, id), 0);
            assert!(!m.entity_get_flip(kind, id));
        }
        gids.sort_unstable();
        assert_eq!(gids, (0..n as u64).collect::<Vec<_>>());
    }
    let ext = m.exterior_face_map();
    assert_eq!(ext.local_ids().len(), 24);
    assert_eq!(ext.map().num_global(), 24);
}

#[test]
fn point_location() {
    let m = unit_cube(2);
    let hits: Vec<_> = (0..8).filter(|&c| m.point_in_cell([0.25, 0.25, 0.75], c)).collect();
    assert_eq!(hits.len(), 1);
    // A shared corner lies in every cell around it.
    assert_eq!((0..8).filter(|&c| m.point_in_cell([0.5; 3], c)).count(), 8);
    assert!(!(0..8).any(|c| m.point_in_cell([1.5, 0.5, 0.5], c)));
}
