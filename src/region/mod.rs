//! Geometric model: named regions shared by every mesh built from one input.
//!
//! Regions are immutable once loaded. A [`GeometricModel`] is deserialized
//! from JSON and handed to meshes as `Arc<GeometricModel>`; meshes only read it.

pub mod resolve;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::geometry::metrics::{self, Point};
use crate::mesh_error::MeshError;
use crate::topology::entity::EntityKind;

/// Absolute tolerance of the `inside` predicates.
pub const GEOMETRY_TOL: f64 = 1.0e-10;

/// Whether a region's resolved sets may be cached by meshes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Permanent,
    /// Only used as a component of logical regions; never cached.
    Temporary,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    Complement,
    Union,
    Subtract,
    Intersect,
}

/// Piecewise-constant color field tabulated on a regular grid of cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorGrid {
    pub origin: Point,
    pub spacing: Point,
    pub counts: [usize; 3],
    /// Colors, `x` fastest.
    pub colors: Vec<i32>,
}

impl ColorGrid {
    /// Color at `p`, or `None` outside the grid.
    pub fn color_at(&self, p: Point) -> Option<i32> {
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let n = self.counts[axis].max(1);
            if self.spacing[axis] <= 0.0 {
                continue;
            }
            let t = (p[axis] - self.origin[axis]) / self.spacing[axis];
            if t < -GEOMETRY_TOL || t > n as f64 + GEOMETRY_TOL {
                return None;
            }
            idx[axis] = (t.max(0.0).floor() as usize).min(n - 1);
        }
        let [nx, ny, _] = self.counts.map(|c| c.max(1));
        self.colors.get(idx[0] + nx * (idx[1] + ny * idx[2])).copied()
    }
}

/// Shape of a region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionKind {
    Box {
        lo: Point,
        hi: Point,
    },
    Plane {
        point: Point,
        normal: Point,
    },
    Point {
        point: Point,
    },
    /// Planar polygon in 3D; a polyline in planar meshes.
    Polygon {
        points: Vec<Point>,
    },
    ColorFunction {
        grid: ColorGrid,
        value: i32,
    },
    /// Set stored with the mesh file (material block, element, side or node set).
    LabeledSet {
        label: String,
        entity: EntityKind,
    },
    Logical {
        operation: LogicalOp,
        components: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub id: u32,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(flatten)]
    pub kind: RegionKind,
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let ab = metrics::sub(b, a);
    let len2 = metrics::dot(ab, ab);
    if len2 <= GEOMETRY_TOL * GEOMETRY_TOL {
        return metrics::dist2(p, a) <= GEOMETRY_TOL * GEOMETRY_TOL;
    }
    let t = (metrics::dot(metrics::sub(p, a), ab) / len2).clamp(0.0, 1.0);
    let foot = metrics::add(a, metrics::scale(ab, t));
    metrics::dist2(p, foot) <= GEOMETRY_TOL * GEOMETRY_TOL
}

/// Point on a polyline (fewer than three points) or inside a planar polygon in 3D.
pub(crate) fn in_polygon(p: Point, points: &[Point]) -> bool {
    if points.len() < 3 {
        return points.windows(2).any(|w| on_segment(p, w[0], w[1]));
    }
    let n = metrics::polygon_area_vector(points);
    let len = metrics::norm(n);
    if len <= GEOMETRY_TOL {
        return false;
    }
    let unit = metrics::scale(n, 1.0 / len);
    if metrics::dot(metrics::sub(p, points[0]), unit).abs() > GEOMETRY_TOL {
        return false;
    }
    // Drop the dominant normal axis and test in the remaining plane.
    let drop = (0..3)
        .max_by(|&a, &b| unit[a].abs().total_cmp(&unit[b].abs()))
        .unwrap_or(2);
    let keep: Vec<usize> = (0..3).filter(|&a| a != drop).collect();
    let project = |q: Point| [q[keep[0]], q[keep[1]], 0.0];
    let flat: Vec<Point> = points.iter().map(|&q| project(q)).collect();
    metrics::point_in_polygon_2d(project(p), &flat)
}

impl Region {
    pub fn is_temporary(&self) -> bool {
        self.lifecycle == Lifecycle::Temporary
    }

    /// Geometric containment of a point. Labeled and logical regions have no
    /// geometry and contain nothing.
    pub fn inside(&self, p: Point) -> bool {
        match &self.kind {
            RegionKind::Box { lo, hi } => {
                (0..3).all(|i| p[i] >= lo[i] - GEOMETRY_TOL && p[i] <= hi[i] + GEOMETRY_TOL)
            }
            RegionKind::Plane { point, normal } => {
                let len = metrics::norm(*normal);
                len > 0.0 && (metrics::dot(metrics::sub(p, *point), *normal) / len).abs() <= GEOMETRY_TOL
            }
            RegionKind::Point { point } => metrics::dist2(p, *point) <= GEOMETRY_TOL * GEOMETRY_TOL,
            RegionKind::Polygon { points } => in_polygon(p, points),
            RegionKind::ColorFunction { grid, value } => grid.color_at(p) == Some(*value),
            RegionKind::LabeledSet { .. } | RegionKind::Logical { .. } => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            RegionKind::Box { .. } => "box",
            RegionKind::Plane { .. } => "plane",
            RegionKind::Point { .. } => "point",
            RegionKind::Polygon { .. } => "polygon",
            RegionKind::ColorFunction { .. } => "color function",
            RegionKind::LabeledSet { .. } => "labeled set",
            RegionKind::Logical { .. } => "logical",
        }
    }
}

/// Region catalog keyed by name and integer ID.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometricModel {
    regions: Vec<Region>,
}

impl GeometricModel {
    pub fn new(regions: Vec<Region>) -> Result<Self, MeshError> {
        for (i, r) in regions.iter().enumerate() {
            if regions[..i].iter().any(|q| q.name == r.name) {
                return Err(MeshError::Config(format!("region `{}` defined twice", r.name)));
            }
            if let RegionKind::Logical { components, .. } = &r.kind {
                if components.is_empty() {
                    return Err(MeshError::Config(format!("logical region `{}` has no components", r.name)));
                }
            }
        }
        Ok(Self { regions })
    }

    pub fn from_json_str(json: &str) -> Result<Arc<Self>, MeshError> {
        let parsed: GeometricModel = serde_json::from_str(json)?;
        Ok(Arc::new(Self::new(parsed.regions)?))
    }

    pub fn find_region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn find_region_by_id(&self, id: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{
        "regions": [
            {"name": "Left", "id": 1, "type": "box", "lo": [0, 0, 0], "hi": [0.5, 1, 1]},
            {"name": "Bottom", "id": 2, "type": "plane", "point": [0, 0, 0], "normal": [0, 0, 1]},
            {"name": "Block 1", "id": 3, "type": "labeled_set", "label": "1", "entity": "CELL"},
            {"name": "Both", "id": 4, "type": "logical", "operation": "union",
             "components": ["Left", "Bottom"], "lifecycle": "temporary"}
        ]
    }"#;

    #[test]
    fn model_loads_from_json() {
        let gm = GeometricModel::from_json_str(MODEL).unwrap();
        assert_eq!(gm.len(), 4);
        assert!(gm.find_region("Left").unwrap().inside([0.5, 0.2, 1.0]));
        assert!(!gm.find_region("Left").unwrap().inside([0.6, 0.2, 1.0]));
        assert!(gm.find_region_by_id(2).unwrap().inside([3.0, 4.0, 0.0]));
        assert!(gm.find_region("Both").unwrap().is_temporary());
        assert!(gm.find_region("Nope").is_none());
        assert!(matches!(
            gm.find_region("Block 1").unwrap().kind,
            RegionKind::LabeledSet { entity: EntityKind::Cell, .. }
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let r = Region {
            name: "A".into(),
            id: 1,
            lifecycle: Lifecycle::Permanent,
            kind: RegionKind::Point { point: [0.0; 3] },
        };
        assert!(GeometricModel::new(vec![r.clone(), r]).is_err());
    }

    #[test]
    fn polygon_containment_in_3d_and_as_polyline() {
        let square = Region {
            name: "Sq".into(),
            id: 1,
            lifecycle: Lifecycle::Permanent,
            kind: RegionKind::Polygon {
                points: vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
            },
        };
        assert!(square.inside([0.5, 0.5, 1.0]));
        assert!(!square.inside([0.5, 0.5, 0.9]));
        assert!(!square.inside([1.5, 0.5, 1.0]));
        let line = Region {
            kind: RegionKind::Polygon {
                points: vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            },
            ..square
        };
        assert!(line.inside([1.0, 0.0, 0.0]));
        assert!(!line.inside([1.0, 0.1, 0.0]));
    }

    #[test]
    fn color_function_lookup() {
        let grid = ColorGrid {
            origin: [0.0; 3],
            spacing: [1.0, 1.0, 1.0],
            counts: [2, 1, 1],
            colors: vec![7, 9],
        };
        assert_eq!(grid.color_at([0.5, 0.5, 0.5]), Some(7));
        assert_eq!(grid.color_at([1.5, 0.5, 0.5]), Some(9));
        assert_eq!(grid.color_at([2.0, 0.5, 0.5]), Some(9));
        assert_eq!(grid.color_at([3.0, 0.5, 0.5]), None);
    }
}
