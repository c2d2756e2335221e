//! Partition-aware global-ID maps consumed by distributed vector layouts.

use hashbrown::HashMap;

use crate::algs::collective::all_reduce_sum;
use crate::algs::communicator::{CommTag, Communicator};
use crate::kernel::NativeMesh;
use crate::mesh_error::MeshError;
use crate::topology::entity::{EntityId, EntityKind, GlobalId, ParallelType};
use crate::topology::store::EntityTopologyStore;

const TAG_MAPS: CommTag = CommTag::new(0x2400);

/// Global IDs of a run of local IDs `0..len`, plus the global entity count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityMap {
    global_ids: Vec<GlobalId>,
    local: HashMap<GlobalId, EntityId>,
    num_global: u64,
}

impl EntityMap {
    pub fn new(global_ids: Vec<GlobalId>, num_global: u64) -> Self {
        let local = global_ids.iter().enumerate().map(|(l, &g)| (g, l)).collect();
        Self {
            global_ids,
            local,
            num_global,
        }
    }

    pub fn len(&self) -> usize {
        self.global_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global_ids.is_empty()
    }

    /// Number of distinct entities over all ranks.
    pub fn num_global(&self) -> u64 {
        self.num_global
    }

    pub fn global_ids(&self) -> &[GlobalId] {
        &self.global_ids
    }

    pub fn global_id(&self, id: EntityId) -> GlobalId {
        self.global_ids[id]
    }

    pub fn local_id(&self, gid: GlobalId) -> Option<EntityId> {
        self.local.get(&gid).copied()
    }
}

/// Owned faces bounding exactly one cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExteriorFaceMap {
    local_ids: Vec<EntityId>,
    map: EntityMap,
}

impl ExteriorFaceMap {
    /// Local face IDs of the exterior faces, ascending.
    pub fn local_ids(&self) -> &[EntityId] {
        &self.local_ids
    }

    /// Global IDs, aligned with [`Self::local_ids`], and the global count.
    pub fn map(&self) -> &EntityMap {
        &self.map
    }

    pub fn contains(&self, face: EntityId) -> bool {
        self.local_ids.binary_search(&face).is_ok()
    }
}

/// Owned and used maps for every entity kind, and the exterior faces.
#[derive(Clone, Debug, Default)]
pub struct PartitionMaps {
    owned: [EntityMap; 4],
    used: [EntityMap; 4],
    exterior: ExteriorFaceMap,
}

fn kind_index(kind: EntityKind) -> usize {
    kind as usize
}

impl PartitionMaps {
    /// Builds the maps collectively; every rank must call this.
    pub fn build<C: Communicator>(
        comm: &C,
        mesh: &NativeMesh,
        store: &EntityTopologyStore,
        cell_dim: usize,
    ) -> Result<Self, MeshError> {
        let mut maps = PartitionMaps::default();
        for (i, kind) in EntityKind::ALL.into_iter().enumerate() {
            let table = store.table(kind.mtype(cell_dim));
            let owned = table.count(ParallelType::Owned);
            let num_global = all_reduce_sum(comm, TAG_MAPS.offset(i as u16), owned as u64)?;
            let gids = table.global_ids();
            maps.owned[kind_index(kind)] = EntityMap::new(gids[..owned].to_vec(), num_global);
            maps.used[kind_index(kind)] = EntityMap::new(gids.to_vec(), num_global);
        }

        let side = EntityKind::Face.mtype(cell_dim);
        let cell = EntityKind::Cell.mtype(cell_dim);
        let table = store.table(side);
        let local_ids: Vec<EntityId> = table
            .range(ParallelType::Owned)
            .filter(|&id| mesh.side_cells(table.handle(id), cell).len() == 1)
            .collect();
        let gids = local_ids.iter().map(|&id| table.global_id(id)).collect();
        let num_global = all_reduce_sum(comm, TAG_MAPS.offset(4), local_ids.len() as u64)?;
        maps.exterior = ExteriorFaceMap {
            local_ids,
            map: EntityMap::new(gids, num_global),
        };
        Ok(maps)
    }

    /// Map of `kind` restricted to owned entities or covering all used ones.
    ///
    /// A ghost-only map is not meaningful; `Ghost` yields the used map.
    pub fn map(&self, kind: EntityKind, ptype: ParallelType) -> &EntityMap {
        match ptype {
            ParallelType::Owned => &self.owned[kind_index(kind)],
            _ => &self.used[kind_index(kind)],
        }
    }

    pub fn exterior_faces(&self) -> &ExteriorFaceMap {
        &self.exterior
    }
}
