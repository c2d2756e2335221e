//! Mesh instances.
//!
//! A [`Mesh`] is the frozen result of one construction: the native kernel,
//! the [`EntityTopologyStore`] mapping local IDs to kernel handles, the
//! partition maps, and the lazily built region sets. Topology never changes
//! after construction; node coordinates may be edited through `&mut Mesh`,
//! which drops the cached geometry and region sets.
//!
//! The query surface lives in [`query`], ordered face lists in [`ordered`],
//! set resolution in [`sets`] and construction in [`factory`].

pub mod factory;
pub mod ordered;
pub mod query;
pub mod sets;

use hashbrown::HashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::config::{MeshConfig, Verbosity};
use crate::geometry::metrics::{self, Point};
use crate::kernel::NativeMesh;
use crate::partition::{EntityMap, ExteriorFaceMap, PartitionMaps, Partitioned};
use crate::region::GeometricModel;
use crate::topology::entity::{EntityId, EntityKind, MType, ParallelType};
use crate::topology::point::PointId;
use crate::topology::store::{EntityTopologyStore, KindTable};

pub use factory::{ExtractOptions, Framework, MeshFactory, Selection};

/// Parent local IDs of an extracted mesh, indexed by [`EntityKind`].
pub(crate) type ParentIds = [Vec<Option<EntityId>>; 4];

/// Derived geometry, computed on first use.
#[derive(Debug, Default)]
struct GeometryCache {
    cell_volumes: Vec<f64>,
    cell_centroids: Vec<Point>,
    face_areas: Vec<f64>,
    face_centroids: Vec<Point>,
    /// Area-weighted normals in the owner's orientation.
    face_normals: Vec<Point>,
}

/// A distributed unstructured mesh on one rank.
pub struct Mesh {
    kernel: NativeMesh,
    store: EntityTopologyStore,
    maps: PartitionMaps,
    cell_dim: usize,
    rank: usize,
    size: usize,
    framework: Framework,
    config: MeshConfig,
    model: Option<Arc<GeometricModel>>,
    parent: Option<Arc<Mesh>>,
    parent_ids: ParentIds,
    sets: RwLock<HashMap<String, Arc<[EntityId]>>>,
    geometry: OnceCell<GeometryCache>,
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("framework", &self.framework)
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("cell_dim", &self.cell_dim)
            .field("space_dim", &self.kernel.space_dim())
            .field("cells", &self.num_entities(EntityKind::Cell, ParallelType::Used))
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Mesh {
    pub(crate) fn assemble(
        partitioned: Partitioned,
        rank: usize,
        size: usize,
        framework: Framework,
        config: MeshConfig,
        model: Option<Arc<GeometricModel>>,
    ) -> Self {
        let Partitioned {
            kernel,
            store,
            maps,
            cell_dim,
        } = partitioned;
        Self {
            kernel,
            store,
            maps,
            cell_dim,
            rank,
            size,
            framework,
            config,
            model,
            parent: None,
            parent_ids: Default::default(),
            sets: RwLock::new(HashMap::new()),
            geometry: OnceCell::new(),
        }
    }

    pub(crate) fn with_parent(mut self, parent: Arc<Mesh>, parent_ids: ParentIds) -> Self {
        self.parent = Some(parent);
        self.parent_ids = parent_ids;
        self
    }

    // ---------------------------------------------------------------------
    // Instance data
    // ---------------------------------------------------------------------

    /// Topological dimension of the cells (2 or 3).
    pub fn manifold_dimension(&self) -> usize {
        self.cell_dim
    }

    /// Dimension of the coordinate space (2 for planar meshes).
    pub fn space_dimension(&self) -> usize {
        self.kernel.space_dim()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn framework(&self) -> Framework {
        self.framework
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn geometric_model(&self) -> Option<&Arc<GeometricModel>> {
        self.model.as_ref()
    }

    /// Mesh this one was extracted from. The child keeps it alive.
    pub fn parent(&self) -> Option<&Arc<Mesh>> {
        self.parent.as_ref()
    }

    /// Native kernel, for writers and diagnostics.
    pub fn kernel(&self) -> &NativeMesh {
        &self.kernel
    }

    pub fn store(&self) -> &EntityTopologyStore {
        &self.store
    }

    /// Global-ID map of `kind` over owned (`Owned`) or owned and ghost entities.
    pub fn map(&self, kind: EntityKind, ptype: ParallelType) -> &EntityMap {
        self.maps.map(kind, ptype)
    }

    /// Owned faces bounding exactly one cell.
    pub fn exterior_face_map(&self) -> &ExteriorFaceMap {
        self.maps.exterior_faces()
    }

    // ---------------------------------------------------------------------
    // Handle helpers
    // ---------------------------------------------------------------------

    #[inline]
    pub(crate) fn mtype(&self, kind: EntityKind) -> MType {
        kind.mtype(self.cell_dim)
    }

    #[inline]
    pub(crate) fn cell_mtype(&self) -> MType {
        self.mtype(EntityKind::Cell)
    }

    #[inline]
    pub(crate) fn table(&self, kind: EntityKind) -> &KindTable {
        self.store.table(self.mtype(kind))
    }

    #[inline]
    pub(crate) fn handle(&self, kind: EntityKind, id: EntityId) -> PointId {
        self.table(kind).handle(id)
    }

    /// Local IDs of kernel handles of `kind`, in the given order.
    pub(crate) fn local_ids(&self, kind: EntityKind, handles: impl IntoIterator<Item = PointId>) -> Vec<EntityId> {
        let table = self.table(kind);
        handles.into_iter().filter_map(|h| table.local_id(h)).collect()
    }

    /// Whether local entity `id` of `kind` passes the `ptype` filter.
    #[inline]
    pub(crate) fn admits(&self, kind: EntityKind, id: EntityId, ptype: ParallelType) -> bool {
        match ptype {
            ParallelType::Owned => self.table(kind).is_owned(id),
            ParallelType::Ghost => !self.table(kind).is_owned(id),
            ParallelType::Used => true,
        }
    }

    /// Logs a tolerant-path warning at the configured verbosity.
    pub(crate) fn tolerant_warning(&self, args: fmt::Arguments<'_>) {
        if self.config.verbosity >= Verbosity::High {
            log::warn!("rank {}: {args}", self.rank);
        } else {
            log::debug!("rank {}: {args}", self.rank);
        }
    }

    pub(crate) fn set_cache(&self) -> &RwLock<HashMap<String, Arc<[EntityId]>>> {
        &self.sets
    }

    // ---------------------------------------------------------------------
    // Geometry
    // ---------------------------------------------------------------------

    fn geometry(&self) -> &GeometryCache {
        self.geometry.get_or_init(|| self.compute_geometry())
    }

    fn compute_geometry(&self) -> GeometryCache {
        let num_cells = self.num_entities(EntityKind::Cell, ParallelType::Used);
        let num_faces = self.num_entities(EntityKind::Face, ParallelType::Used);
        #[cfg(feature = "rayon")]
        let (cells, faces): (Vec<(f64, Point)>, Vec<(f64, Point, Point)>) = {
            use rayon::prelude::*;
            (
                (0..num_cells).into_par_iter().map(|c| self.cell_metrics(c)).collect(),
                (0..num_faces).into_par_iter().map(|f| self.face_metrics(f)).collect(),
            )
        };
        #[cfg(not(feature = "rayon"))]
        let (cells, faces): (Vec<(f64, Point)>, Vec<(f64, Point, Point)>) = (
            (0..num_cells).map(|c| self.cell_metrics(c)).collect(),
            (0..num_faces).map(|f| self.face_metrics(f)).collect(),
        );
        let (cell_volumes, cell_centroids) = cells.into_iter().unzip();
        let mut cache = GeometryCache {
            cell_volumes,
            cell_centroids,
            ..GeometryCache::default()
        };
        for (area, centroid, normal) in faces {
            cache.face_areas.push(area);
            cache.face_centroids.push(centroid);
            cache.face_normals.push(normal);
        }
        cache
    }

    /// Outward face cycles of a 3D cell, as coordinates.
    pub(crate) fn cell_face_cycles(&self, c: EntityId) -> Vec<Vec<Point>> {
        let h = self.handle(EntityKind::Cell, c);
        self.kernel
            .region_faces(h)
            .iter()
            .map(|&(f, outward)| {
                let mut cycle: Vec<Point> = self
                    .kernel
                    .face_vertices(f)
                    .into_iter()
                    .map(|v| self.kernel.coords(v))
                    .collect();
                if !outward {
                    cycle.reverse();
                }
                cycle
            })
            .collect()
    }

    fn cell_metrics(&self, c: EntityId) -> (f64, Point) {
        if self.cell_dim == 3 {
            return metrics::polyhedron_volume_centroid(&self.cell_face_cycles(c));
        }
        let pts = self.cell_get_coordinates(c);
        (metrics::polygon_area(&pts), metrics::polygon_centroid(&pts))
    }

    fn face_metrics(&self, f: EntityId) -> (f64, Point, Point) {
        let pts = self.face_get_coordinates(f);
        if self.cell_dim == 3 {
            let normal = metrics::polygon_area_vector(&pts);
            return (metrics::norm(normal), metrics::polygon_centroid(&pts), normal);
        }
        // A 2D face is an edge; its normal points to the right of the edge,
        // out of a counter-clockwise cell that traverses it positively.
        let [a, b] = [pts[0], pts[1]];
        let t = metrics::sub(b, a);
        let normal = [t[1], -t[0], 0.0];
        (metrics::norm(t), metrics::scale(metrics::add(a, b), 0.5), normal)
    }

    pub fn cell_volume(&self, c: EntityId) -> f64 {
        self.geometry().cell_volumes[c]
    }

    pub fn cell_centroid(&self, c: EntityId) -> Point {
        self.geometry().cell_centroids[c]
    }

    pub fn face_area(&self, f: EntityId) -> f64 {
        self.geometry().face_areas[f]
    }

    pub fn face_centroid(&self, f: EntityId) -> Point {
        self.geometry().face_centroids[f]
    }

    /// Area-weighted normal of face `f`, oriented as on the owning rank.
    pub fn face_normal(&self, f: EntityId) -> Point {
        self.geometry().face_normals[f]
    }

    /// Normal of face `f` pointing out of cell `c`, or `None` when `f` does
    /// not bound `c`.
    pub fn face_normal_outward(&self, f: EntityId, c: EntityId) -> Option<Point> {
        let (faces, dirs) = self.cell_get_faces_and_dirs(c);
        let i = faces.iter().position(|&x| x == f)?;
        Some(metrics::scale(self.face_normal(f), f64::from(dirs[i])))
    }

    /// Moves node `n`. Cached geometry is dropped; ghost copies on other
    /// ranks are not updated.
    pub fn set_node_coordinates(&mut self, n: EntityId, coords: Point) {
        let h = self.handle(EntityKind::Node, n);
        self.kernel.set_coords(h, coords);
        self.geometry = OnceCell::new();
        self.sets.get_mut().clear();
    }

    // ---------------------------------------------------------------------
    // Parent links
    // ---------------------------------------------------------------------

    /// Local ID in the parent mesh of entity `id`, or `None` when the mesh
    /// was not extracted or the entity has no counterpart.
    pub fn entity_get_parent(&self, kind: EntityKind, id: EntityId) -> Option<EntityId> {
        self.parent_ids[kind as usize].get(id).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::entity::ParallelType::{Owned, Used};

    fn unit_square(n: usize) -> Mesh {
        MeshFactory::new(&NoComm, MeshConfig::default())
            .create_rectangle([0.0, 0.0], [1.0, 1.0], [n, n])
            .unwrap()
    }

    #[test]
    fn square_geometry() {
        let m = unit_square(2);
        let total: f64 = (0..m.num_entities(EntityKind::Cell, Used)).map(|c| m.cell_volume(c)).sum();
        assert!((total - 1.0).abs() < 1e-12);
        for f in 0..m.num_entities(EntityKind::Face, Owned) {
            assert!((m.face_area(f) - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn outward_normals_leave_the_cell() {
        let m = unit_square(2);
        for c in 0..m.num_entities(EntityKind::Cell, Used) {
            let cc = m.cell_centroid(c);
            for f in m.cell_get_faces(c) {
                let n = m.face_normal_outward(f, c).unwrap();
                let d = metrics::sub(m.face_centroid(f), cc);
                assert!(metrics::dot(n, d) > 0.0);
            }
        }
    }

    #[test]
    fn moving_a_node_refreshes_geometry() {
        let mut m = unit_square(1);
        let before = m.cell_volume(0);
        let far = (0..4)
            .find(|&n| m.node_get_coordinates(n) == [1.0, 1.0, 0.0])
            .unwrap();
        m.set_node_coordinates(far, [2.0, 2.0, 0.0]);
        assert!(m.cell_volume(0) > before);
    }
}
