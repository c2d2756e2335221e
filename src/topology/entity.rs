//! Entity kinds, parallel classifications and model classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Local entity ID: 0-based, owned entities first, then ghosts.
pub type EntityId = usize;

/// Global entity ID: 0-based and unique across all ranks.
pub type GlobalId = u64;

/// Topological kind requested through the query API.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    Node,
    Edge,
    Face,
    Cell,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Node,
        EntityKind::Edge,
        EntityKind::Face,
        EntityKind::Cell,
    ];

    /// Kernel dimension that stores this kind in a mesh of `cell_dim`.
    ///
    /// In a surface mesh cells are kernel faces and faces are kernel edges.
    pub fn mtype(self, cell_dim: usize) -> MType {
        match (self, cell_dim) {
            (EntityKind::Node, _) => MType::Vertex,
            (EntityKind::Edge, _) => MType::Edge,
            (EntityKind::Face, 3) => MType::Face,
            (EntityKind::Face, _) => MType::Edge,
            (EntityKind::Cell, 3) => MType::Region,
            (EntityKind::Cell, _) => MType::Face,
        }
    }

    /// Name used for labeled-set declarations (`"CELL"`, `"FACE"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Node => "NODE",
            EntityKind::Edge => "EDGE",
            EntityKind::Face => "FACE",
            EntityKind::Cell => "CELL",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition filter for counts, sets and up-adjacency.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParallelType {
    Owned,
    Ghost,
    /// Owned and ghost.
    Used,
}

impl ParallelType {
    /// Whether an entity of `ptype` passes this filter.
    #[inline]
    pub fn admits(self, ptype: PType) -> bool {
        match self {
            ParallelType::Owned => ptype != PType::Ghost,
            ParallelType::Ghost => ptype == PType::Ghost,
            ParallelType::Used => true,
        }
    }
}

/// Parallel type tag of a kernel entity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PType {
    /// Owned, not copied anywhere else.
    #[default]
    Interior,
    /// Owned, with ghost copies on other ranks.
    Overlap,
    /// Copy of an entity owned by another rank.
    Ghost,
}

impl PType {
    #[inline]
    pub fn is_owned(self) -> bool {
        self != PType::Ghost
    }
}

/// Kernel entity dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MType {
    Vertex = 0,
    Edge = 1,
    Face = 2,
    Region = 3,
}

impl MType {
    pub const ALL: [MType; 4] = [MType::Vertex, MType::Edge, MType::Face, MType::Region];

    #[inline]
    pub fn dim(self) -> usize {
        self as usize
    }

    pub fn from_dim(dim: usize) -> Option<MType> {
        MType::ALL.get(dim).copied()
    }
}

/// Geometric model entity an entity is classified on.
///
/// A generated box has model vertices 1..8, edges 1..12, faces 1..6 and
/// region 1; `dim` says which of those families `id` indexes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelEntity {
    pub dim: u8,
    pub id: u32,
}

impl ModelEntity {
    pub const fn new(dim: u8, id: u32) -> Self {
        Self { dim, id }
    }

    /// Classification used when nothing better is known: interior of model region 1.
    pub const fn interior(cell_dim: usize) -> Self {
        Self {
            dim: cell_dim as u8,
            id: 1,
        }
    }
}
