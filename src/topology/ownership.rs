//! Ownership metadata for kernel entities.
//!
//! [`ParallelInfo`] records the owning rank, the global ID once one is known,
//! and the parallel type tag of a single entity.

use crate::topology::entity::{GlobalId, PType};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelInfo {
    pub owner: usize,
    /// Unset until distribution or the weave assigns one; serial meshes
    /// never set it and fall back to the local ID.
    pub global_id: Option<GlobalId>,
    pub ptype: PType,
}

impl Default for ParallelInfo {
    fn default() -> Self {
        Self::serial()
    }
}

impl ParallelInfo {
    /// Entity of a serial mesh.
    pub const fn serial() -> Self {
        Self {
            owner: 0,
            global_id: None,
            ptype: PType::Interior,
        }
    }

    /// Entity owned by `owner` as seen from `my_rank`.
    pub fn from_owner(owner: usize, my_rank: usize, global_id: Option<GlobalId>) -> Self {
        Self {
            owner,
            global_id,
            ptype: if owner == my_rank {
                PType::Interior
            } else {
                PType::Ghost
            },
        }
    }

    #[inline]
    pub fn is_ghost(&self) -> bool {
        self.ptype == PType::Ghost
    }

    /// Marks an owned entity as copied elsewhere.
    pub fn mark_overlap(&mut self) {
        if self.ptype == PType::Interior {
            self.ptype = PType::Overlap;
        }
    }
}

/// Smallest rank of `ranks`, the ownership rule for shared entities.
pub fn min_owner(ranks: impl IntoIterator<Item = usize>) -> Option<usize> {
    ranks.into_iter().min()
}
