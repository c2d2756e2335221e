//! Named entity sets.
//!
//! Sets are resolved from the mesh's geometric model on first request and
//! cached per `(kind, region)`; later requests only filter by parallel type.

use super::Mesh;
use crate::mesh_error::MeshError;
use crate::region::{Region, RegionKind};
use crate::topology::entity::{EntityId, EntityKind, ParallelType};
use crate::topology::labels::{elemset_name, matset_name, nodeset_name, sideset_name};

impl Mesh {
    fn find_region(&self, name: &str) -> Result<&Region, MeshError> {
        self.geometric_model()
            .and_then(|m| m.find_region(name))
            .ok_or_else(|| MeshError::RegionNotFound(name.to_string()))
    }

    fn filter_set(&self, region: &Region, kind: EntityKind, ptype: ParallelType) -> Result<Vec<EntityId>, MeshError> {
        let set = self.region_set(region, kind)?;
        Ok(set.iter().copied().filter(|&id| self.admits(kind, id, ptype)).collect())
    }

    /// Local IDs of the `kind` entities in region `name`, ascending.
    pub fn get_set_entities(
        &self,
        name: &str,
        kind: EntityKind,
        ptype: ParallelType,
    ) -> Result<Vec<EntityId>, MeshError> {
        let region = self.find_region(name)?;
        self.filter_set(region, kind, ptype)
    }

    pub fn get_set_size(&self, name: &str, kind: EntityKind, ptype: ParallelType) -> Result<usize, MeshError> {
        Ok(self.get_set_entities(name, kind, ptype)?.len())
    }

    /// Same as [`Mesh::get_set_entities`] with the region looked up by ID.
    pub fn get_set_entities_by_id(
        &self,
        region_id: u32,
        kind: EntityKind,
        ptype: ParallelType,
    ) -> Result<Vec<EntityId>, MeshError> {
        let region = self
            .geometric_model()
            .and_then(|m| m.find_region_by_id(region_id))
            .ok_or_else(|| MeshError::RegionNotFound(format!("#{region_id}")))?;
        self.filter_set(region, kind, ptype)
    }

    /// Whether `name` can be asked for `kind` entities without a labeled-set
    /// error. Geometric and logical regions are always valid; labeled sets
    /// must declare `kind` and, on a serial mesh, exist in the file.
    pub fn valid_set_name(&self, name: &str, kind: EntityKind) -> bool {
        let Ok(region) = self.find_region(name) else {
            return false;
        };
        let RegionKind::LabeledSet { label, entity } = &region.kind else {
            return true;
        };
        if *entity != kind {
            return false;
        }
        if self.size() > 1 {
            return true;
        }
        let labels = self.kernel().labels();
        match kind {
            EntityKind::Cell => labels.contains(&matset_name(label)) != labels.contains(&elemset_name(label)),
            EntityKind::Face => labels.contains(&sideset_name(label)),
            EntityKind::Node => labels.contains(&nodeset_name(label)),
            EntityKind::Edge => false,
        }
    }
}
