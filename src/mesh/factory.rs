//! Mesh Construction Engine.
//!
//! [`MeshFactory`] walks the configured framework preference list and builds
//! the mesh with the first framework able to do the requested job:
//!
//! | framework | read `.exo` | read `.par` | generate 2D | generate 3D | extract |
//! |-----------|-------------|-------------|-------------|-------------|---------|
//! | `Sieve`   | yes         | yes         | yes         | yes         | yes     |
//! | `Simple`  | no          | no          | no          | serial only | no      |
//!
//! Whole meshes (files, generated grids, caller kernels) are built on rank 0
//! and distributed; `.par` files are read piecewise on every rank. Any rank's
//! failure is agreed on before the next collective step, so all ranks return
//! the same error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::{Mesh, ParentIds};
use crate::algs::collective::agree;
use crate::algs::communicator::{CommTag, Communicator};
use crate::config::MeshConfig;
use crate::io::MeshFormat;
use crate::io::exodus::read_exodus;
use crate::io::partitioned::read_piece;
use crate::kernel::NativeMesh;
use crate::kernel::extract::extract_closure;
use crate::kernel::generate::{GenerateOptions, hex_grid, quad_grid};
use crate::kernel::piece::PieceBuild;
use crate::mesh_error::MeshError;
use crate::partition::{PartitionManager, Partitioned};
use crate::region::GeometricModel;
use crate::topology::entity::{EntityId, EntityKind, MType, ParallelType};
use crate::topology::point::PointId;

const TAG_GLOBAL: CommTag = CommTag::new(0x2500);
const TAG_PIECE: CommTag = CommTag::new(0x2501);
const TAG_SELECTION: CommTag = CommTag::new(0x2502);

/// Mesh framework (backend) able to construct meshes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    /// Full-featured native kernel.
    Sieve,
    /// Serial structured hex generator.
    Simple,
}

impl Framework {
    pub fn reads(self, _format: MeshFormat, _parallel: bool) -> bool {
        self == Framework::Sieve
    }

    pub fn generates(self, dim: usize, parallel: bool) -> bool {
        match self {
            Framework::Sieve => matches!(dim, 2 | 3),
            Framework::Simple => dim == 3 && !parallel,
        }
    }

    pub fn extracts(self, _parallel: bool) -> bool {
        self == Framework::Sieve
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Framework::Sieve => "sieve",
            Framework::Simple => "simple",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entities to extract from a parent mesh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Union of named sets.
    Sets(Vec<String>),
    /// Explicit used local IDs.
    Ids(Vec<EntityId>),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Project an extracted surface onto the xy-plane.
    pub flatten: bool,
    /// Extrude the extracted surface into a volume layer.
    pub extrude: bool,
}

/// Builds meshes on one rank of `comm`. Every rank calls the same methods in
/// the same order.
pub struct MeshFactory<'a, C: Communicator> {
    comm: &'a C,
    config: MeshConfig,
    model: Option<Arc<GeometricModel>>,
}

impl<'a, C: Communicator> MeshFactory<'a, C> {
    pub fn new(comm: &'a C, config: MeshConfig) -> Self {
        Self {
            comm,
            config,
            model: None,
        }
    }

    /// Attaches a region catalog to every mesh this factory builds.
    pub fn with_geometric_model(mut self, model: Arc<GeometricModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    fn select(&self, job: &str, capable: impl Fn(Framework) -> bool) -> Result<Framework, MeshError> {
        self.config
            .frameworks
            .iter()
            .copied()
            .find(|&f| capable(f))
            .ok_or_else(|| {
                let tried: Vec<&str> = self.config.frameworks.iter().map(|f| f.as_str()).collect();
                MeshError::FrameworkUnavailable(format!(
                    "none of [{}] can {job} on {} rank(s)",
                    tried.join(", "),
                    self.comm.size()
                ))
            })
    }

    fn assemble(&self, partitioned: Partitioned, framework: Framework, model: Option<Arc<GeometricModel>>) -> Mesh {
        Mesh::assemble(
            partitioned,
            self.comm.rank(),
            self.comm.size(),
            framework,
            self.config.clone(),
            model,
        )
    }

    /// Builds the global kernel on rank 0 and distributes it.
    fn from_root(
        &self,
        framework: Framework,
        build: impl FnOnce() -> Result<NativeMesh, MeshError>,
    ) -> Result<Mesh, MeshError> {
        let global = if self.comm.rank() == 0 { build().map(Some) } else { Ok(None) };
        let global = agree(self.comm, TAG_GLOBAL, global)?;
        let partitioned = PartitionManager::new(self.comm, &self.config).from_root(global)?;
        Ok(self.assemble(partitioned, framework, self.model.clone()))
    }

    /// Reads a mesh file: `.exo` on rank 0 then distributed, `.par` piecewise.
    pub fn create_from_file(&self, path: impl AsRef<Path>) -> Result<Mesh, MeshError> {
        let path = path.as_ref();
        let rank = self.comm.rank();
        let format = MeshFormat::from_path(path, rank)?;
        let parallel = !self.comm.is_serial();
        let framework = self.select("read this file", |f| f.reads(format, parallel))?;
        let import_failure = |err: MeshError| match err {
            err @ MeshError::ImportFailure { .. } => err,
            err => MeshError::ImportFailure {
                path: path.display().to_string(),
                rank,
                reason: err.to_string(),
            },
        };
        log::debug!("rank {rank}: reading {} with {framework}", path.display());
        let mesh = match format {
            MeshFormat::Exodus => self.from_root(framework, || read_exodus(path).map_err(import_failure))?,
            MeshFormat::Partitioned => {
                let kernel = read_piece(path, rank, self.comm.size())
                    .and_then(|piece| {
                        piece.build(PieceBuild {
                            rank,
                            keep_global_ids: true,
                        })
                    })
                    .map_err(import_failure);
                let kernel = agree(self.comm, TAG_PIECE, kernel)?;
                let partitioned = PartitionManager::new(self.comm, &self.config).from_pieces(kernel)?;
                self.assemble(partitioned, framework, self.model.clone())
            }
        };
        log::info!(
            "rank {rank}: loaded {} ({} cells on this rank)",
            path.display(),
            mesh.num_entities(EntityKind::Cell, ParallelType::Used)
        );
        Ok(mesh)
    }

    /// Hexahedral grid of `counts` cells spanning `[lo, hi]`.
    pub fn create_box(&self, lo: [f64; 3], hi: [f64; 3], counts: [usize; 3]) -> Result<Mesh, MeshError> {
        let framework = self.select("generate a 3D grid", |f| f.generates(3, !self.comm.is_serial()))?;
        let options = GenerateOptions {
            classify: framework == Framework::Sieve,
        };
        self.from_root(framework, || hex_grid(lo, hi, counts, options))
    }

    /// Quadrilateral grid of `counts` cells spanning `[lo, hi]`.
    pub fn create_rectangle(&self, lo: [f64; 2], hi: [f64; 2], counts: [usize; 2]) -> Result<Mesh, MeshError> {
        let framework = self.select("generate a 2D grid", |f| f.generates(2, !self.comm.is_serial()))?;
        self.from_root(framework, || quad_grid(lo, hi, counts, GenerateOptions::default()))
    }

    /// Partitions a kernel assembled by the caller. Only rank 0's kernel is
    /// used; other ranks pass `None`.
    pub fn create_from_kernel(&self, kernel: Option<NativeMesh>) -> Result<Mesh, MeshError> {
        let framework = self.select("adopt a kernel", |f| f.extracts(!self.comm.is_serial()))?;
        self.from_root(framework, || {
            kernel.ok_or_else(|| MeshError::InvalidParameters("rank 0 supplied no kernel".into()))
        })
    }

    /// Builds the mesh induced by the closure of selected `kind` entities of
    /// `parent`. Extracted cells and their closure remember their parents.
    ///
    /// Faces of a volume mesh become a surface mesh (optionally flattened);
    /// cells keep the parent's dimension. Collective over the parent's ranks.
    pub fn create_extracted(
        &self,
        parent: &Arc<Mesh>,
        selection: Selection,
        kind: EntityKind,
        options: ExtractOptions,
    ) -> Result<Mesh, MeshError> {
        let framework = self.select("extract a mesh", |f| f.extracts(!self.comm.is_serial()))?;
        if options.extrude {
            return Err(MeshError::NotImplemented("extrusion of extracted surfaces".into()));
        }
        let parent_dim = parent.manifold_dimension();
        let mtype = kind.mtype(parent_dim);
        let cell_dim = match (kind, parent_dim) {
            (EntityKind::Cell, d) => d,
            (EntityKind::Face, 3) => 2,
            _ => {
                return Err(MeshError::UnsupportedTopology(format!(
                    "extraction of {kind} entities from a {parent_dim}D mesh"
                )));
            }
        };
        // Only polygons can be laid flat; this covers cells of a surface mesh.
        if options.flatten && mtype != MType::Face {
            return Err(MeshError::InvalidParameters(format!("cannot flatten extracted {kind} entities")));
        }

        let selected = agree(self.comm, TAG_SELECTION, self.selected_handles(parent, &selection, kind))
            .and_then(|handles| extract_closure(parent.kernel(), mtype, &handles, options.flatten));
        let extracted = agree(self.comm, TAG_SELECTION.offset(1), selected)?;
        let parents = extracted.parents;
        let partitioned = PartitionManager::new(self.comm, &self.config).from_extracted(extracted.mesh, cell_dim)?;

        let mut parent_ids: ParentIds = Default::default();
        for child_kind in EntityKind::ALL {
            let child_mtype = child_kind.mtype(cell_dim);
            let child_table = partitioned.store.table(child_mtype);
            let parent_table = parent.store().table(child_mtype);
            parent_ids[child_kind as usize] = child_table
                .handles()
                .iter()
                .map(|h: &PointId| {
                    parents[child_mtype.dim()]
                        .get(h)
                        .and_then(|&p| parent_table.local_id(p))
                })
                .collect();
        }
        let model = self.model.clone().or_else(|| parent.geometric_model().cloned());
        let mesh = self
            .assemble(partitioned, framework, model)
            .with_parent(Arc::clone(parent), parent_ids);
        log::info!(
            "rank {}: extracted {} {kind} entities into a {cell_dim}D mesh",
            self.comm.rank(),
            mesh.num_entities(EntityKind::Cell, ParallelType::Used)
        );
        Ok(mesh)
    }

    fn selected_handles(
        &self,
        parent: &Mesh,
        selection: &Selection,
        kind: EntityKind,
    ) -> Result<Vec<PointId>, MeshError> {
        let used = parent.num_entities(kind, ParallelType::Used);
        let ids = match selection {
            Selection::Sets(names) => {
                let mut ids = Vec::new();
                for name in names {
                    ids.extend(parent.get_set_entities(name, kind, ParallelType::Used)?);
                }
                ids.sort_unstable();
                ids.dedup();
                ids
            }
            Selection::Ids(ids) => {
                if let Some(bad) = ids.iter().find(|&&id| id >= used) {
                    return Err(MeshError::InvalidParameters(format!(
                        "{kind} {bad} out of range ({used} used)"
                    )));
                }
                ids.clone()
            }
        };
        Ok(ids.into_iter().map(|id| parent.handle(kind, id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::region::GeometricModel;

    fn factory(frameworks: Vec<Framework>) -> MeshFactory<'static, NoComm> {
        MeshFactory::new(&NoComm, MeshConfig::default().with_frameworks(frameworks))
    }

    #[test]
    fn preference_order_picks_first_capable() {
        let m = factory(vec![Framework::Simple, Framework::Sieve])
            .create_box([0.0; 3], [1.0; 3], [1, 1, 1])
            .unwrap();
        assert_eq!(m.framework(), Framework::Simple);
        let m = factory(vec![Framework::Simple, Framework::Sieve])
            .create_rectangle([0.0; 2], [1.0; 2], [1, 1])
            .unwrap();
        assert_eq!(m.framework(), Framework::Sieve);
        assert!(matches!(
            factory(vec![Framework::Simple]).create_rectangle([0.0; 2], [1.0; 2], [1, 1]),
            Err(MeshError::FrameworkUnavailable(_))
        ));
    }

    #[test]
    fn simple_framework_skips_classification() {
        let m = factory(vec![Framework::Simple])
            .create_box([0.0; 3], [1.0; 3], [1, 1, 1])
            .unwrap();
        for f in 0..6 {
            assert_eq!(m.model_entity(EntityKind::Face, f).dim, 3);
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = factory(vec![Framework::Sieve]).create_from_file("mesh.vtk").unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedFormat { rank: 0, .. }));
        let err = factory(vec![Framework::Sieve])
            .create_from_file("/nonexistent/mesh.exo")
            .unwrap_err();
        assert!(matches!(err, MeshError::ImportFailure { .. }));
    }

    #[test]
    fn extraction_argument_checks() {
        let f = factory(vec![Framework::Sieve]);
        let parent = Arc::new(f.create_box([0.0; 3], [1.0; 3], [1, 1, 1]).unwrap());
        let sel = || Selection::Ids(vec![0]);
        let extrude = ExtractOptions {
            extrude: true,
            ..ExtractOptions::default()
        };
        let flatten = ExtractOptions {
            flatten: true,
            ..ExtractOptions::default()
        };
        assert!(matches!(
            f.create_extracted(&parent, sel(), EntityKind::Face, extrude),
            Err(MeshError::NotImplemented(_))
        ));
        assert!(matches!(
            f.create_extracted(&parent, sel(), EntityKind::Cell, flatten),
            Err(MeshError::InvalidParameters(_))
        ));
        assert!(matches!(
            f.create_extracted(&parent, sel(), EntityKind::Edge, ExtractOptions::default()),
            Err(MeshError::UnsupportedTopology(_))
        ));
        assert!(matches!(
            f.create_extracted(&parent, sel(), EntityKind::Edge, flatten),
            Err(MeshError::UnsupportedTopology(_))
        ));
        assert!(matches!(
            f.create_extracted(&parent, Selection::Ids(vec![6]), EntityKind::Face, ExtractOptions::default()),
            Err(MeshError::InvalidParameters(_))
        ));
        assert!(matches!(
            factory(vec![Framework::Simple]).create_extracted(&parent, sel(), EntityKind::Face, ExtractOptions::default()),
            Err(MeshError::FrameworkUnavailable(_))
        ));
    }

    #[test]
    fn surface_cells_can_be_flattened() {
        let model = GeometricModel::from_json_str(
            r#"{"regions": [{"name": "Top", "id": 1, "type": "plane", "point": [0, 0, 1], "normal": [0, 0, 1]}]}"#,
        )
        .unwrap();
        let f = factory(vec![Framework::Sieve]).with_geometric_model(model);
        let parent = Arc::new(f.create_box([0.0; 3], [1.0; 3], [2, 2, 1]).unwrap());
        let surface = Arc::new(
            f.create_extracted(
                &parent,
                Selection::Sets(vec!["Top".into()]),
                EntityKind::Face,
                ExtractOptions::default(),
            )
            .unwrap(),
        );
        assert_eq!(surface.space_dimension(), 3);
        let flatten = ExtractOptions {
            flatten: true,
            ..ExtractOptions::default()
        };
        let flat = f
            .create_extracted(&surface, Selection::Ids(vec![0, 1, 2, 3]), EntityKind::Cell, flatten)
            .unwrap();
        assert_eq!(flat.manifold_dimension(), 2);
        assert_eq!(flat.space_dimension(), 2);
        assert_eq!(flat.num_entities(EntityKind::Cell, ParallelType::Used), 4);
        for n in 0..flat.num_entities(EntityKind::Node, ParallelType::Used) {
            assert_eq!(flat.node_get_coordinates(n)[2], 0.0);
        }
        // Edges of a surface are its sides, never flattened on their own.
        assert!(matches!(
            f.create_extracted(&surface, Selection::Ids(vec![0]), EntityKind::Face, flatten),
            Err(MeshError::UnsupportedTopology(_))
        ));
    }

    #[test]
    fn extracted_faces_link_to_distinct_parents() {
        let model = GeometricModel::from_json_str(
            r#"{"regions": [{"name": "Top", "id": 1, "type": "plane", "point": [0, 0, 1], "normal": [0, 0, 1]}]}"#,
        )
        .unwrap();
        let f = factory(vec![Framework::Sieve]).with_geometric_model(model);
        let parent = Arc::new(f.create_box([0.0; 3], [1.0; 3], [3, 3, 2]).unwrap());
        let surface = f
            .create_extracted(
                &parent,
                Selection::Sets(vec!["Top".into()]),
                EntityKind::Face,
                ExtractOptions::default(),
            )
            .unwrap();
        assert_eq!(surface.manifold_dimension(), 2);
        assert_eq!(surface.space_dimension(), 3);
        let n = surface.num_entities(EntityKind::Cell, ParallelType::Used);
        assert_eq!(n, 9);
        let mut seen: Vec<EntityId> = (0..n)
            .map(|c| surface.entity_get_parent(EntityKind::Cell, c).unwrap())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), n);
        for c in 0..n {
            let p = surface.entity_get_parent(EntityKind::Cell, c).unwrap();
            assert!((parent.face_centroid(p)[2] - 1.0).abs() < 1e-12);
            assert!((surface.cell_volume(c) - parent.face_area(p)).abs() < 1e-12);
        }
        for node in 0..surface.num_entities(EntityKind::Node, ParallelType::Used) {
            let p = surface.entity_get_parent(EntityKind::Node, node).unwrap();
            assert_eq!(surface.node_get_coordinates(node), parent.node_get_coordinates(p));
        }
        assert!(Arc::ptr_eq(surface.parent().unwrap(), &parent));
    }

    #[test]
    fn flattened_surface_is_planar() {
        let f = factory(vec![Framework::Sieve]);
        let parent = Arc::new(f.create_box([0.0; 3], [1.0; 3], [1, 1, 1]).unwrap());
        let bottom: Vec<EntityId> = (0..6).filter(|&p| parent.face_centroid(p)[2] == 0.0).collect();
        assert_eq!(bottom.len(), 1);
        let surface = f
            .create_extracted(
                &parent,
                Selection::Ids(bottom),
                EntityKind::Face,
                ExtractOptions {
                    flatten: true,
                    extrude: false,
                },
            )
            .unwrap();
        assert_eq!(surface.space_dimension(), 2);
        assert_eq!(surface.num_entities(EntityKind::Cell, ParallelType::Used), 1);
        assert!((surface.cell_volume(0) - 1.0).abs() < 1e-12);
    }
}
