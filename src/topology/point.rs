//! `PointId`: a strong, zero-cost handle for native kernel entities
//!
//! Every vertex, edge, face and region stored by the native kernel is addressed by
//! an opaque handle. `PointId` wraps a nonzero `u64` so that 0 stays reserved as
//! an invalid value and `Option<PointId>` costs nothing extra.
//!
//! Handles are arena slots: `PointId::from_index(i)` names slot `i` of the kind's
//! arena. They are stable for the life of a kernel but are not the local IDs
//! exposed by the query API; [`crate::topology::store`] maps between the two.

use crate::mesh_error::MeshError;
use std::{fmt, num::NonZeroU64};

/// Opaque handle of a native kernel entity.
///
/// This type is `repr(transparent)` over `NonZeroU64`, so it can travel in
/// byte buffers and across FFI exactly like a `u64`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct PointId(NonZeroU64);

impl PointId {
    /// Creates a handle from a raw nonzero value.
    #[inline]
    pub fn new(raw: u64) -> Result<Self, MeshError> {
        NonZeroU64::new(raw)
            .map(PointId)
            .ok_or_else(|| MeshError::InvalidParameters("entity handle must be non-zero".into()))
    }

    /// Handle of arena slot `idx` (slot 0 is handle 1).
    #[inline]
    pub fn from_index(idx: usize) -> Self {
        PointId(NonZeroU64::MIN.saturating_add(idx as u64))
    }

    /// Arena slot addressed by this handle.
    #[inline]
    pub const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    /// Raw handle value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PointId").field(&self.get()).finish()
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// `PointId` travels over MPI as a `u64`.
#[cfg(feature = "mpi-support")]
unsafe impl mpi::datatype::Equivalence for PointId {
    type Out = <u64 as mpi::datatype::Equivalence>::Out;

    fn equivalent_datatype() -> Self::Out {
        u64::equivalent_datatype()
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    assert_eq_size!(PointId, u64);
    assert_eq_size!(Option<PointId>, u64);
}
