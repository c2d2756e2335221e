#![allow(dead_code)]
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use mesh_weave::algs::communicator::LocalComm;
use mesh_weave::prelude::*;

/// Runs `f` on every rank of a fresh `n`-rank universe, one thread per rank,
/// and returns the per-rank results in rank order.
pub fn on_ranks<F, R>(n: usize, f: F) -> Vec<R>
where
    F: Fn(&LocalComm) -> R + Sync,
    R: Send,
{
    let comms = LocalComm::universe(n);
    let f = &f;
    thread::scope(|s| {
        let handles: Vec<_> = comms.iter().map(|c| s.spawn(move || f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

pub fn unit_cube(n: usize) -> Mesh {
    MeshFactory::new(&NoComm, MeshConfig::default())
        .create_box([0.0; 3], [1.0; 3], [n, n, n])
        .unwrap()
}

pub fn model(json: &str) -> Arc<GeometricModel> {
    GeometricModel::from_json_str(json).unwrap()
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mesh-weave-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}

pub fn assert_close(a: Point, b: Point, tol: f64) {
    for i in 0..3 {
        assert!((a[i] - b[i]).abs() <= tol, "{a:?} != {b:?}");
    }
}

pub fn near(a: Point, b: Point) -> bool {
    (0..3).all(|i| (a[i] - b[i]).abs() <= 1e-9)
}

/// Two hexes side by side with material blocks 10 and 20, one element set,
/// one side set on the x = 0 and x = 2 faces and one node set.
pub const TWO_HEX: &str = "EXODUS
DIM 3
NODES 12
1 0 0 0
2 1 0 0
3 1 1 0
4 0 1 0
5 0 0 1
6 1 0 1
7 1 1 1
8 0 1 1
9 2 0 0
10 2 1 0
11 2 0 1
12 2 1 1
ELEMENTS 2
1 10 Hexahedron 8 1 2 3 4 5 6 7 8
2 20 Hexahedron 8 2 9 10 3 6 11 12 7
SETS 3
elemset 5 1 2
sideset 1 2 1:4 2:2
nodeset 7 2 1 9
END
";
