//! Entity Topology Store: local IDs <-> kernel handles.
//!
//! One [`KindTable`] per kernel dimension, built once when the partition
//! manager freezes the ordering and never mutated afterwards. Owned entities
//! take local IDs `[0, num_owned)`, ghosts `[num_owned, num_used)`, each
//! group in kernel traversal order.

use hashbrown::HashMap;

use crate::topology::entity::{EntityId, GlobalId, MType, PType, ParallelType};
use crate::topology::ownership::ParallelInfo;
use crate::topology::point::PointId;

#[derive(Clone, Debug, Default)]
pub struct KindTable {
    handles: Vec<PointId>,
    local: HashMap<PointId, EntityId>,
    num_owned: usize,
    global_ids: Vec<GlobalId>,
    ptypes: Vec<PType>,
    owners: Vec<usize>,
    flips: Vec<bool>,
}

impl KindTable {
    /// Builds the table from entities in kernel traversal order.
    ///
    /// Entities without a global ID get their local ID (serial numbering).
    pub fn build(entries: impl IntoIterator<Item = (PointId, ParallelInfo)>) -> Self {
        let (owned, ghosts): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|(_, info)| !info.is_ghost());
        let num_owned = owned.len();
        let n = num_owned + ghosts.len();
        let mut table = KindTable {
            handles: Vec::with_capacity(n),
            local: HashMap::with_capacity(n),
            num_owned,
            global_ids: Vec::with_capacity(n),
            ptypes: Vec::with_capacity(n),
            owners: Vec::with_capacity(n),
            flips: vec![false; n],
        };
        for (lid, (handle, info)) in owned.into_iter().chain(ghosts).enumerate() {
            table.handles.push(handle);
            table.local.insert(handle, lid);
            table.global_ids.push(info.global_id.unwrap_or(lid as GlobalId));
            table.ptypes.push(info.ptype);
            table.owners.push(info.owner);
        }
        table
    }

    pub fn count(&self, ptype: ParallelType) -> usize {
        match ptype {
            ParallelType::Owned => self.num_owned,
            ParallelType::Ghost => self.handles.len() - self.num_owned,
            ParallelType::Used => self.handles.len(),
        }
    }

    /// Local ID range admitted by `ptype`.
    pub fn range(&self, ptype: ParallelType) -> std::ops::Range<EntityId> {
        match ptype {
            ParallelType::Owned => 0..self.num_owned,
            ParallelType::Ghost => self.num_owned..self.handles.len(),
            ParallelType::Used => 0..self.handles.len(),
        }
    }

    #[inline]
    pub fn handle(&self, id: EntityId) -> PointId {
        self.handles[id]
    }

    #[inline]
    pub fn local_id(&self, handle: PointId) -> Option<EntityId> {
        self.local.get(&handle).copied()
    }

    #[inline]
    pub fn global_id(&self, id: EntityId) -> GlobalId {
        self.global_ids[id]
    }

    #[inline]
    pub fn ptype(&self, id: EntityId) -> PType {
        self.ptypes[id]
    }

    #[inline]
    pub fn owner(&self, id: EntityId) -> usize {
        self.owners[id]
    }

    #[inline]
    pub fn is_owned(&self, id: EntityId) -> bool {
        id < self.num_owned
    }

    #[inline]
    pub fn flip(&self, id: EntityId) -> bool {
        self.flips[id]
    }

    pub fn global_ids(&self) -> &[GlobalId] {
        &self.global_ids
    }

    pub fn handles(&self) -> &[PointId] {
        &self.handles
    }

    pub(crate) fn set_flip(&mut self, id: EntityId, flip: bool) {
        self.flips[id] = flip;
    }
}

/// Per-dimension tables of one mesh instance.
#[derive(Clone, Debug, Default)]
pub struct EntityTopologyStore {
    tables: [KindTable; 4],
}

impl EntityTopologyStore {
    pub fn new(tables: [KindTable; 4]) -> Self {
        Self { tables }
    }

    #[inline]
    pub fn table(&self, mtype: MType) -> &KindTable {
        &self.tables[mtype.dim()]
    }

    #[inline]
    pub(crate) fn table_mut(&mut self, mtype: MType) -> &mut KindTable {
        &mut self.tables[mtype.dim()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(i: usize) -> PointId {
        PointId::from_index(i)
    }

    #[test]
    fn owned_entities_come_first() {
        let entries = vec![
            (pid(0), ParallelInfo::from_owner(1, 0, Some(10))),
            (pid(1), ParallelInfo::from_owner(0, 0, Some(3))),
            (pid(2), ParallelInfo::from_owner(0, 0, Some(4))),
            (pid(3), ParallelInfo::from_owner(2, 0, Some(11))),
        ];
        let table = KindTable::build(entries);
        assert_eq!(table.count(ParallelType::Owned), 2);
        assert_eq!(table.count(ParallelType::Ghost), 2);
        assert_eq!(table.count(ParallelType::Used), 4);
        assert_eq!(table.handles(), &[pid(1), pid(2), pid(0), pid(3)]);
        assert_eq!(table.global_ids(), &[3, 4, 10, 11]);
        assert_eq!(table.local_id(pid(0)), Some(2));
        assert!(table.is_owned(1));
        assert!(!table.is_owned(2));
        assert_eq!(table.range(ParallelType::Ghost), 2..4);
    }

    #[test]
    fn serial_global_ids_are_local_ids() {
        let table = KindTable::build((0..3).map(|i| (pid(i * 2), ParallelInfo::serial())));
        assert_eq!(table.global_ids(), &[0, 1, 2]);
        assert_eq!(table.count(ParallelType::Ghost), 0);
    }
}
