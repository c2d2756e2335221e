//! Parallel Partition Manager.
//!
//! Turns a raw kernel into a frozen, numbered one:
//!
//! 1. degenerate-edge collapse (before any ID exists),
//! 2. rank-0 distribution or per-rank pieces,
//! 3. the weave: owners and global IDs of every kind,
//! 4. the [`EntityTopologyStore`] (owned first, then ghosts),
//! 5. ghost orientation flips,
//! 6. partition maps.
//!
//! Every step that talks to other ranks is collective and ends in an error
//! agreement, so a failure on one rank fails all of them the same way.

pub mod distribute;
pub mod flips;
pub mod ghost_exchange;
pub mod maps;
pub mod weave;

pub use distribute::PartitionMethod;
pub use maps::{EntityMap, ExteriorFaceMap, PartitionMaps};

use crate::algs::collective::{agree, all_reduce_max};
use crate::algs::communicator::{CommTag, Communicator};
use crate::config::MeshConfig;
use crate::kernel::NativeMesh;
use crate::kernel::collapse::collapse_degenerate_edges;
use crate::mesh_error::MeshError;
use crate::topology::entity::{EntityKind, MType, ParallelType};
use crate::topology::ownership::ParallelInfo;
use crate::topology::store::{EntityTopologyStore, KindTable};

const TAG_PREPARE: CommTag = CommTag::new(0x2000);
const TAG_DIM: CommTag = CommTag::new(0x2001);
const TAG_DIM_AGREE: CommTag = CommTag::new(0x2002);
const TAG_COLLAPSE: CommTag = CommTag::new(0x2003);

/// A kernel with its frozen numbering.
#[derive(Debug)]
pub struct Partitioned {
    pub kernel: NativeMesh,
    pub store: EntityTopologyStore,
    pub maps: PartitionMaps,
    pub cell_dim: usize,
}

/// Drives the partition pipeline for one mesh construction.
pub struct PartitionManager<'a, C: Communicator> {
    comm: &'a C,
    config: &'a MeshConfig,
}

impl<'a, C: Communicator> PartitionManager<'a, C> {
    pub fn new(comm: &'a C, config: &'a MeshConfig) -> Self {
        Self { comm, config }
    }

    fn collapse(&self, kernel: &mut NativeMesh) -> Result<(), MeshError> {
        if !self.config.collapse_degenerate_edges {
            return Ok(());
        }
        let report = collapse_degenerate_edges(kernel)?;
        if !report.is_noop() {
            log::debug!(
                "rank {}: collapsed {} degenerate edges, removed {} faces and {} regions",
                self.comm.rank(),
                report.collapsed,
                report.deleted[MType::Face.dim()].len(),
                report.deleted[MType::Region.dim()].len()
            );
        }
        Ok(())
    }

    /// Partitions a global kernel. In parallel only rank 0's `global` is read
    /// and distributed; other ranks pass `None`.
    pub fn from_root(&self, global: Option<NativeMesh>) -> Result<Partitioned, MeshError> {
        if self.comm.is_serial() {
            let mut kernel =
                global.ok_or_else(|| MeshError::InvalidParameters("no mesh to partition".into()))?;
            self.collapse(&mut kernel)?;
            let cell_dim = kernel.cell_dim();
            return self.serial(kernel, cell_dim);
        }
        let prepared = if self.comm.rank() == 0 {
            global
                .ok_or_else(|| MeshError::InvalidParameters("rank 0 has no mesh to distribute".into()))
                .and_then(|mut k| self.collapse(&mut k).map(|_| Some(k)))
        } else {
            Ok(None)
        };
        let prepared = agree(self.comm, TAG_PREPARE, prepared)?;
        let mut kernel = distribute::distribute_from_root(self.comm, prepared, &self.config.partition)?;
        let cell_dim = self.agree_cell_dim(kernel.cell_dim())?;
        kernel.set_class_dim(cell_dim);
        weave::weave(self.comm, &mut kernel, cell_dim, false)?;
        self.finish(kernel, cell_dim)
    }

    /// Partitions per-rank pieces whose vertices and cells already carry
    /// owners and global IDs (pre-partitioned input).
    pub fn from_pieces(&self, mut kernel: NativeMesh) -> Result<Partitioned, MeshError> {
        let collapsed = self.collapse(&mut kernel);
        agree(self.comm, TAG_COLLAPSE, collapsed)?;
        let local = kernel.cell_dim();
        if self.comm.is_serial() {
            return self.serial(kernel, local);
        }
        let max = self.agree_cell_dim(local)?;
        weave::weave(self.comm, &mut kernel, max, false)?;
        self.finish(kernel, max)
    }

    /// Maximum cell dimension over all ranks; every rank must hold cells of it.
    fn agree_cell_dim(&self, local: usize) -> Result<usize, MeshError> {
        let max = all_reduce_max(self.comm, TAG_DIM, local as u64)? as usize;
        let checked = if local == max {
            Ok(max)
        } else {
            Err(MeshError::DimensionMismatch {
                rank: self.comm.rank(),
                local,
                max,
            })
        };
        agree(self.comm, TAG_DIM_AGREE, checked)
    }

    /// Partitions an extracted kernel whose vertices and cells carry their
    /// parents' owners and global IDs.
    pub fn from_extracted(&self, mut kernel: NativeMesh, cell_dim: usize) -> Result<Partitioned, MeshError> {
        if self.comm.is_serial() {
            return self.serial(kernel, cell_dim);
        }
        weave::weave(self.comm, &mut kernel, cell_dim, true)?;
        self.finish(kernel, cell_dim)
    }

    fn serial(&self, mut kernel: NativeMesh, cell_dim: usize) -> Result<Partitioned, MeshError> {
        for mtype in MType::ALL {
            for h in kernel.handles(mtype) {
                if let Some(par) = kernel.par_mut(mtype, h) {
                    *par = ParallelInfo::serial();
                }
            }
        }
        self.finish(kernel, cell_dim)
    }

    fn finish(&self, mut kernel: NativeMesh, cell_dim: usize) -> Result<Partitioned, MeshError> {
        kernel.build_upward();
        let tables = MType::ALL.map(|mtype| {
            KindTable::build(
                kernel
                    .handles(mtype)
                    .into_iter()
                    .map(|h| (h, kernel.par(mtype, h).copied().unwrap_or_default())),
            )
        });
        let mut store = EntityTopologyStore::new(tables);
        if !self.comm.is_serial() {
            flips::compute_flips(self.comm, &kernel, &mut store, cell_dim)?;
        }
        let maps = PartitionMaps::build(self.comm, &kernel, &store, cell_dim)?;
        let cells = store.table(EntityKind::Cell.mtype(cell_dim));
        log::info!(
            "rank {}: mesh of dimension {} with {} cells ({} owned), {} faces, {} nodes",
            self.comm.rank(),
            cell_dim,
            cells.count(ParallelType::Used),
            cells.count(ParallelType::Owned),
            store.table(EntityKind::Face.mtype(cell_dim)).count(ParallelType::Used),
            store.table(MType::Vertex).count(ParallelType::Used),
        );
        Ok(Partitioned {
            kernel,
            store,
            maps,
            cell_dim,
        })
    }
}
