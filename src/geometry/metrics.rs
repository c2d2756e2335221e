//! Geometry metrics for polygonal and polyhedral cells.
//!
//! All routines work on explicit coordinate lists in 3 components; planar
//! meshes carry `z = 0`. Polygons are vertex cycles, polyhedra are lists of
//! face cycles oriented with outward normals. Cells are assumed star-shaped
//! with respect to their vertex average, which holds for every convex cell and
//! for the usual distorted hexes and prisms.

pub type Point = [f64; 3];

const EPS: f64 = 1e-12;

#[inline]
pub fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn add(a: Point, b: Point) -> Point {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn scale(a: Point, s: f64) -> Point {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn dot(a: Point, b: Point) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Point, b: Point) -> Point {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: Point) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub fn dist2(a: Point, b: Point) -> f64 {
    let d = sub(a, b);
    dot(d, d)
}

/// Arithmetic mean of the points.
pub fn vertex_average(pts: &[Point]) -> Point {
    if pts.is_empty() {
        return [0.0; 3];
    }
    let sum = pts.iter().fold([0.0; 3], |acc, &p| add(acc, p));
    scale(sum, 1.0 / pts.len() as f64)
}

/// Area-weighted normal of a polygon cycle (Newell). Its length is the area.
pub fn polygon_area_vector(pts: &[Point]) -> Point {
    let n = pts.len();
    if n < 3 {
        return [0.0; 3];
    }
    let c = vertex_average(pts);
    let mut acc = [0.0; 3];
    for i in 0..n {
        acc = add(acc, cross(sub(pts[i], c), sub(pts[(i + 1) % n], c)));
    }
    scale(acc, 0.5)
}

pub fn polygon_area(pts: &[Point]) -> f64 {
    norm(polygon_area_vector(pts))
}

/// Area-weighted centroid of a polygon; the vertex average when degenerate.
pub fn polygon_centroid(pts: &[Point]) -> Point {
    let n = pts.len();
    let c = vertex_average(pts);
    if n < 3 {
        return c;
    }
    let normal = polygon_area_vector(pts);
    let mut total = 0.0;
    let mut acc = [0.0; 3];
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        let w = dot(cross(sub(a, c), sub(b, c)), normal);
        total += w;
        acc = add(acc, scale(add(add(a, b), c), w / 3.0));
    }
    if total.abs() <= EPS * EPS {
        return c;
    }
    scale(acc, 1.0 / total)
}

/// Volume and centroid of a polyhedron given by outward face cycles.
///
/// Uses a tetrahedral decomposition about the vertex average, which is the
/// divergence theorem for piecewise planar faces.
pub fn polyhedron_volume_centroid(faces: &[Vec<Point>]) -> (f64, Point) {
    let all: Vec<Point> = faces.iter().flatten().copied().collect();
    let apex = vertex_average(&all);
    let mut volume = 0.0;
    let mut acc = [0.0; 3];
    for face in faces {
        let fc = vertex_average(face);
        let n = face.len();
        for i in 0..n {
            let a = face[i];
            let b = face[(i + 1) % n];
            let v = signed_tet_volume(apex, fc, a, b);
            volume += v;
            let tc = scale(add(add(apex, fc), add(a, b)), 0.25);
            acc = add(acc, scale(tc, v));
        }
    }
    if volume.abs() <= EPS * EPS {
        return (volume, apex);
    }
    (volume, scale(acc, 1.0 / volume))
}

/// Signed volume of tetrahedron `(a, b, c, d)`; positive when
/// `(b - a, c - a, d - a)` is a right-handed frame.
pub fn signed_tet_volume(a: Point, b: Point, c: Point, d: Point) -> f64 {
    dot(sub(b, a), cross(sub(c, a), sub(d, a))) / 6.0
}

fn in_tet(p: Point, a: Point, b: Point, c: Point, d: Point, tol: f64) -> bool {
    let total = signed_tet_volume(a, b, c, d);
    if total.abs() <= EPS * EPS {
        return false;
    }
    let parts = [
        signed_tet_volume(p, b, c, d),
        signed_tet_volume(a, p, c, d),
        signed_tet_volume(a, b, p, d),
        signed_tet_volume(a, b, c, p),
    ];
    parts.iter().all(|&v| v / total >= -tol)
}

/// Whether `p` lies in the polyhedron bounded by outward face cycles.
pub fn point_in_polyhedron(p: Point, faces: &[Vec<Point>]) -> bool {
    let all: Vec<Point> = faces.iter().flatten().copied().collect();
    let apex = vertex_average(&all);
    faces.iter().any(|face| {
        let fc = vertex_average(face);
        let n = face.len();
        (0..n).any(|i| in_tet(p, apex, fc, face[i], face[(i + 1) % n], 1e-10))
    })
}

/// Whether `p` lies in the planar polygon `pts` (xy-plane).
pub fn point_in_polygon_2d(p: Point, pts: &[Point]) -> bool {
    let n = pts.len();
    if n < 3 {
        return false;
    }
    let c = vertex_average(pts);
    let cross2 = |o: Point, a: Point, b: Point| (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0]);
    (0..n).any(|i| {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        let total = cross2(c, a, b);
        if total.abs() <= EPS * EPS {
            return false;
        }
        let l = [cross2(p, a, b), cross2(c, p, b), cross2(c, a, p)];
        l.iter().all(|&v| v / total >= -1e-10)
    })
}
