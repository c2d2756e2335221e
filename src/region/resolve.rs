//! Geometric Region Resolver.
//!
//! Evaluates a [`Region`] against one mesh and returns the used local IDs of
//! the requested kind, ascending. Geometric regions test entity centroids or
//! vertices with [`Region::inside`]; labeled sets read the sets stored with the
//! mesh file; logical regions combine the sets of their components.
//!
//! A region shape that has no meaning for the requested kind yields an empty
//! set and a tolerant warning. Labeled-set lookups that cannot be answered are
//! hard errors.

use std::sync::Arc;

use crate::geometry::metrics;
use crate::mesh::Mesh;
use crate::mesh_error::MeshError;
use crate::region::{LogicalOp, Region, RegionKind};
use crate::topology::entity::{EntityId, EntityKind, ParallelType};
use crate::topology::labels::{elemset_name, matset_name, nodeset_name, sideset_name};

/// Squared distance below which the nearest-node search stops early.
const NEAREST_NODE_EXACT: f64 = 1.0e-32;

fn mark(set: &[EntityId], marks: &mut [usize]) {
    for &id in set {
        marks[id] += 1;
    }
}

/// Cache key of the set of `kind` entities in region `name`.
pub(crate) fn set_key(kind: EntityKind, name: &str) -> String {
    format!("{kind}_{name}")
}

impl Mesh {
    /// Used entities of `kind` in `region`, ascending. Nothing is cached; see
    /// [`Mesh::get_set_entities`] for the cached lookup by name.
    pub fn resolve_region(&self, region: &Region, kind: EntityKind) -> Result<Vec<EntityId>, MeshError> {
        self.resolve_at(region, kind, &mut Vec::new())
    }

    /// Cached set of `region`; temporary regions are evaluated every time.
    pub(crate) fn region_set(&self, region: &Region, kind: EntityKind) -> Result<Arc<[EntityId]>, MeshError> {
        self.region_set_at(region, kind, &mut Vec::new())
    }

    fn region_set_at(
        &self,
        region: &Region,
        kind: EntityKind,
        stack: &mut Vec<String>,
    ) -> Result<Arc<[EntityId]>, MeshError> {
        let key = set_key(kind, &region.name);
        let cached = self.set_cache().read().get(&key).cloned();
        if let Some(set) = cached {
            return Ok(set);
        }
        let set: Arc<[EntityId]> = self.resolve_at(region, kind, stack)?.into();
        if !region.is_temporary() {
            self.set_cache().write().insert(key, Arc::clone(&set));
        }
        log::debug!(
            "rank {}: region `{}` holds {} {kind} entities",
            self.rank(),
            region.name,
            set.len()
        );
        Ok(set)
    }

    fn resolve_at(&self, region: &Region, kind: EntityKind, stack: &mut Vec<String>) -> Result<Vec<EntityId>, MeshError> {
        match &region.kind {
            RegionKind::LabeledSet { label, entity } => {
                if *entity != kind {
                    return Err(MeshError::LabeledSetKindMismatch {
                        region: region.name.clone(),
                        declared: *entity,
                        requested: kind,
                    });
                }
                self.labeled_set(region, label, kind)
            }
            RegionKind::Logical { operation, components } => {
                if stack.iter().any(|n| n == &region.name) {
                    return Err(MeshError::InvalidParameters(format!(
                        "logical region `{}` contains itself",
                        region.name
                    )));
                }
                stack.push(region.name.clone());
                let result = self.logical_set(region, *operation, components, kind, stack);
                stack.pop();
                result
            }
            _ => Ok(self.geometric_set(region, kind)),
        }
    }

    fn unsupported(&self, region: &Region, kind: EntityKind) -> Vec<EntityId> {
        self.tolerant_warning(format_args!(
            "{} region `{}` cannot select {kind} entities, returning an empty set",
            region.type_name(),
            region.name
        ));
        Vec::new()
    }

    fn all_inside(&self, region: &Region, nodes: &[EntityId]) -> bool {
        !nodes.is_empty() && nodes.iter().all(|&n| region.inside(self.node_get_coordinates(n)))
    }

    fn geometric_set(&self, region: &Region, kind: EntityKind) -> Vec<EntityId> {
        let used = |k| 0..self.num_entities(k, ParallelType::Used);
        match (kind, &region.kind) {
            (EntityKind::Cell, RegionKind::Box { .. } | RegionKind::ColorFunction { .. }) => used(kind)
                .filter(|&c| region.inside(self.cell_centroid(c)))
                .collect(),
            (EntityKind::Cell, RegionKind::Point { point }) => self.cells_at_point(*point),
            (EntityKind::Cell, RegionKind::Plane { .. } | RegionKind::Polygon { .. }) if self.manifold_dimension() == 2 => {
                used(kind)
                    .filter(|&c| self.all_inside(region, &self.cell_get_nodes(c)))
                    .collect()
            }
            (EntityKind::Face, RegionKind::Box { .. }) => used(kind)
                .filter(|&f| region.inside(self.face_centroid(f)))
                .collect(),
            (EntityKind::Face, RegionKind::Plane { .. } | RegionKind::Polygon { .. }) => used(kind)
                .filter(|&f| self.all_inside(region, &self.face_get_nodes(f)))
                .collect(),
            (
                EntityKind::Node,
                RegionKind::Box { .. } | RegionKind::Plane { .. } | RegionKind::Polygon { .. },
            ) => used(kind)
                .filter(|&n| region.inside(self.node_get_coordinates(n)))
                .collect(),
            (EntityKind::Node, RegionKind::Point { .. }) => used(kind)
                .find(|&n| region.inside(self.node_get_coordinates(n)))
                .into_iter()
                .collect(),
            _ => self.unsupported(region, kind),
        }
    }

    /// Cells containing `p`, searched around the nearest node.
    fn cells_at_point(&self, p: metrics::Point) -> Vec<EntityId> {
        let mut nearest = None;
        let mut best = f64::INFINITY;
        for n in 0..self.num_entities(EntityKind::Node, ParallelType::Used) {
            let d2 = metrics::dist2(p, self.node_get_coordinates(n));
            if d2 < best {
                best = d2;
                nearest = Some(n);
                if d2 <= NEAREST_NODE_EXACT {
                    break;
                }
            }
        }
        let Some(n) = nearest else {
            return Vec::new();
        };
        let mut cells: Vec<EntityId> = self
            .node_get_cells(n, ParallelType::Used)
            .into_iter()
            .filter(|&c| self.point_in_cell(p, c))
            .collect();
        cells.sort_unstable();
        cells
    }

    fn labeled_set(&self, region: &Region, label: &str, kind: EntityKind) -> Result<Vec<EntityId>, MeshError> {
        let labels = self.kernel().labels();
        let mtype = self.mtype(kind);
        let name = match kind {
            EntityKind::Cell => {
                let (matset, elemset) = (matset_name(label), elemset_name(label));
                match (labels.contains(&matset), labels.contains(&elemset)) {
                    (true, true) => {
                        return Err(MeshError::AmbiguousLabeledSet {
                            label: label.to_string(),
                        });
                    }
                    (false, true) => elemset,
                    _ => matset,
                }
            }
            EntityKind::Face => sideset_name(label),
            EntityKind::Node => nodeset_name(label),
            EntityKind::Edge => return Ok(self.unsupported(region, kind)),
        };
        let Some(set) = labels.get(&name) else {
            if self.size() == 1 {
                return Err(MeshError::LabeledSetNotFound {
                    region: region.name.clone(),
                    label: label.to_string(),
                });
            }
            // This rank holds no member of the set.
            return Ok(Vec::new());
        };
        if set.mtype != mtype {
            return Ok(self.unsupported(region, kind));
        }
        let mut ids = self.local_ids(kind, set.members().iter().copied());
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn logical_set(
        &self,
        region: &Region,
        operation: LogicalOp,
        components: &[String],
        kind: EntityKind,
        stack: &mut Vec<String>,
    ) -> Result<Vec<EntityId>, MeshError> {
        let model = self.geometric_model();
        let mut sets = Vec::with_capacity(components.len());
        for name in components {
            let component = model
                .and_then(|m| m.find_region(name))
                .ok_or_else(|| MeshError::RegionNotFound(name.clone()))?;
            if let RegionKind::LabeledSet { entity, .. } = &component.kind {
                if *entity != kind {
                    return Err(MeshError::InconsistentSetTypes {
                        region: region.name.clone(),
                    });
                }
            }
            sets.push(self.region_set_at(component, kind, stack)?);
        }

        let total = self.num_entities(kind, ParallelType::Used);
        let mut marks = vec![0usize; total];
        let selected: Vec<EntityId> = match operation {
            LogicalOp::Complement => {
                for set in &sets {
                    mark(set, &mut marks);
                }
                (0..total).filter(|&id| marks[id] == 0).collect()
            }
            LogicalOp::Union => {
                for set in &sets {
                    mark(set, &mut marks);
                }
                (0..total).filter(|&id| marks[id] > 0).collect()
            }
            LogicalOp::Subtract => {
                for set in sets.iter().skip(1) {
                    mark(set, &mut marks);
                }
                let mut first: Vec<EntityId> = sets
                    .first()
                    .map(|s| s.iter().copied().filter(|&id| marks[id] == 0).collect())
                    .unwrap_or_default();
                first.sort_unstable();
                first.dedup();
                first
            }
            LogicalOp::Intersect => {
                for set in &sets {
                    mark(set, &mut marks);
                }
                (0..total).filter(|&id| marks[id] == sets.len()).collect()
            }
        };
        Ok(selected)
    }
}
