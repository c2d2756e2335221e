#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-weave
//!
//! mesh-weave is a distributed unstructured mesh layer for PDE codes. It reads
//! or generates a mesh, partitions it across ranks with one layer of ghost
//! cells, numbers every entity locally and globally, fixes the orientation of
//! ghost faces and edges, and answers topology, geometry and set-membership
//! queries through one backend-agnostic API.
//!
//! ## Features
//! - 2D and 3D meshes of triangles, quads, polygons, tets, prisms, pyramids,
//!   hexes and general polyhedra, including surfaces embedded in 3D
//! - Owned-first local numbering with global ID maps and exterior-face maps
//! - Named regions (box, plane, point, polygon, color function, labeled sets
//!   and logical combinations) resolved into cached entity sets
//! - Sub-mesh extraction with parent links
//! - Pluggable communication backends (serial, threads, MPI)
//!
//! ## Usage
//!
//! ```
//! use mesh_weave::prelude::*;
//!
//! let mesh = MeshFactory::new(&NoComm, MeshConfig::default())
//!     .create_box([0.0; 3], [1.0; 3], [2, 2, 2])
//!     .unwrap();
//! assert_eq!(mesh.num_entities(EntityKind::Cell, ParallelType::Owned), 8);
//! let faces = mesh.cell_get_faces(0);
//! assert_eq!(faces.len(), 6);
//! ```
//!
//! Enable `mpi-support` for [`algs::communicator::MpiComm`] and `rayon` for
//! parallel geometry precomputation.

pub mod algs;
pub mod config;
pub mod geometry;
pub mod io;
pub mod kernel;
pub mod mesh;
pub mod mesh_error;
pub mod partition;
pub mod region;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::config::{MeshConfig, Verbosity};
    pub use crate::geometry::metrics::Point;
    pub use crate::mesh::{ExtractOptions, Framework, Mesh, MeshFactory, Selection};
    pub use crate::mesh_error::MeshError;
    pub use crate::partition::PartitionMethod;
    pub use crate::region::{GeometricModel, Region, RegionKind};
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::entity::{EntityId, EntityKind, GlobalId, ParallelType};
}
