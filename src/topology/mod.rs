//! Entity topology: handles, kinds, ownership, labeled sets and the local-ID store.

pub mod cell_type;
pub mod entity;
pub mod labels;
pub mod ownership;
pub mod point;
pub mod store;

pub use cell_type::CellType;
pub use entity::{EntityId, EntityKind, GlobalId, MType, ModelEntity, PType, ParallelType};
pub use point::PointId;
