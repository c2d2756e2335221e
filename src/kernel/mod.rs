//! Native mesh kernel.
//!
//! The kernel is the backend that owns entity records. Vertices, edges, faces
//! and regions live in slot arenas addressed by [`PointId`]; a slot is `None`
//! once its entity was removed (degenerate collapse is the only remover).
//!
//! Downward connectivity is stored with orientation:
//! - an edge stores its two vertices,
//! - a face stores a closed cycle of `(edge, dir)`; `dir == true` walks the edge
//!   from its first to its second vertex,
//! - a region stores `(face, dir)`; `dir == true` means the face normal points
//!   out of the region.
//!
//! Upward connectivity is derived once by [`NativeMesh::build_upward`].

pub mod collapse;
pub mod extract;
pub mod generate;
pub mod piece;

use hashbrown::HashMap;

use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use crate::topology::entity::{MType, ModelEntity};
use crate::topology::labels::LabelSet;
use crate::topology::ownership::ParallelInfo;
use crate::topology::point::PointId;

#[derive(Clone, Debug)]
pub struct VertexRec {
    pub coords: [f64; 3],
    pub class: ModelEntity,
    pub par: ParallelInfo,
}

#[derive(Clone, Debug)]
pub struct EdgeRec {
    pub verts: [PointId; 2],
    pub class: ModelEntity,
    pub par: ParallelInfo,
}

#[derive(Clone, Debug)]
pub struct FaceRec {
    pub edges: Vec<(PointId, bool)>,
    pub class: ModelEntity,
    pub par: ParallelInfo,
}

#[derive(Clone, Debug)]
pub struct RegionRec {
    pub faces: Vec<(PointId, bool)>,
    /// Input vertex order for regions built from a standard-shape template.
    pub vertex_order: Option<Vec<PointId>>,
    pub class: ModelEntity,
    pub par: ParallelInfo,
}

#[derive(Clone, Debug, Default)]
struct UpAdjacency {
    vertex_edges: Vec<Vec<PointId>>,
    vertex_faces: Vec<Vec<PointId>>,
    vertex_regions: Vec<Vec<PointId>>,
    edge_faces: Vec<Vec<PointId>>,
    face_regions: Vec<Vec<PointId>>,
}

/// Arena-backed unstructured mesh of dimension 2 or 3.
#[derive(Clone, Debug)]
pub struct NativeMesh {
    space_dim: usize,
    /// Dimension used for the default (interior) classification of new entities.
    class_dim: usize,
    pub(crate) vertices: Vec<Option<VertexRec>>,
    pub(crate) edges: Vec<Option<EdgeRec>>,
    pub(crate) faces: Vec<Option<FaceRec>>,
    pub(crate) regions: Vec<Option<RegionRec>>,
    edge_lookup: HashMap<(PointId, PointId), PointId>,
    face_lookup: HashMap<Vec<PointId>, PointId>,
    pub(crate) labels: LabelSet,
    up: Option<UpAdjacency>,
}

fn sorted_pair(a: PointId, b: PointId) -> (PointId, PointId) {
    if a <= b { (a, b) } else { (b, a) }
}

fn sorted_key(verts: &[PointId]) -> Vec<PointId> {
    let mut key = verts.to_vec();
    key.sort_unstable();
    key
}

/// Whether cycle `b` runs in the same rotational sense as cycle `a`.
///
/// Returns `None` when the two lists are not rotations of one cycle in either sense.
pub(crate) fn same_rotation(a: &[PointId], b: &[PointId]) -> Option<bool> {
    let n = a.len();
    if n != b.len() || n < 3 {
        return None;
    }
    let k = a.iter().position(|&v| v == b[0])?;
    let forward = (0..n).all(|i| a[(k + i) % n] == b[i]);
    if forward {
        return Some(true);
    }
    let backward = (0..n).all(|i| a[(k + n - i) % n] == b[i]);
    backward.then_some(false)
}

fn live<T>(slots: &[Option<T>]) -> impl Iterator<Item = PointId> + '_ {
    slots
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.as_ref().map(|_| PointId::from_index(i)))
}

impl NativeMesh {
    pub fn new(space_dim: usize) -> Self {
        Self {
            space_dim,
            class_dim: space_dim,
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            regions: Vec::new(),
            edge_lookup: HashMap::new(),
            face_lookup: HashMap::new(),
            labels: LabelSet::new(),
            up: None,
        }
    }

    pub fn space_dim(&self) -> usize {
        self.space_dim
    }

    pub(crate) fn set_space_dim(&mut self, dim: usize) {
        self.space_dim = dim;
    }

    /// Sets the topological dimension used to classify new entities as interior.
    pub fn set_class_dim(&mut self, dim: usize) {
        self.class_dim = dim;
    }

    /// 3 when the kernel holds regions, 2 when it holds faces only, 0 when empty.
    pub fn cell_dim(&self) -> usize {
        if self.num_live(MType::Region) > 0 {
            3
        } else if self.num_live(MType::Face) > 0 {
            2
        } else {
            0
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelSet {
        &mut self.labels
    }

    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    pub fn add_vertex(&mut self, coords: [f64; 3], class: ModelEntity) -> PointId {
        self.up = None;
        self.vertices.push(Some(VertexRec {
            coords,
            class,
            par: ParallelInfo::serial(),
        }));
        PointId::from_index(self.vertices.len() - 1)
    }

    /// Edge between `a` and `b`, created when missing. The flag is true when
    /// the edge runs from `a` to `b`.
    pub fn get_or_add_edge(&mut self, a: PointId, b: PointId) -> Result<(PointId, bool), MeshError> {
        if a == b {
            return Err(MeshError::InvalidGeometry(format!(
                "edge with identical endpoints {a}"
            )));
        }
        self.check_vertex(a)?;
        self.check_vertex(b)?;
        let key = sorted_pair(a, b);
        if let Some(&e) = self.edge_lookup.get(&key) {
            let first = self.edge(e).map(|rec| rec.verts[0]);
            return Ok((e, first == Some(a)));
        }
        self.up = None;
        self.edges.push(Some(EdgeRec {
            verts: [a, b],
            class: ModelEntity::interior(self.class_dim),
            par: ParallelInfo::serial(),
        }));
        let e = PointId::from_index(self.edges.len() - 1);
        self.edge_lookup.insert(key, e);
        Ok((e, true))
    }

    /// Face through the vertex cycle `verts`, created when missing. The flag is
    /// true when the stored face runs in the same rotational sense as `verts`.
    pub fn add_face_from_vertices(
        &mut self,
        verts: &[PointId],
    ) -> Result<(PointId, bool), MeshError> {
        if verts.len() < 3 {
            return Err(MeshError::UnsupportedTopology(format!(
                "face with {} vertices",
                verts.len()
            )));
        }
        let key = sorted_key(verts);
        if key.windows(2).any(|w| w[0] == w[1]) {
            return Err(MeshError::InvalidGeometry(format!(
                "face repeats a vertex: {verts:?}"
            )));
        }
        if let Some(&f) = self.face_lookup.get(&key) {
            let existing = self.face_vertices(f);
            let dir = same_rotation(&existing, verts).ok_or_else(|| {
                MeshError::InvalidGeometry(format!(
                    "face {verts:?} shares its vertices with face {f} but not its cycle"
                ))
            })?;
            return Ok((f, dir));
        }
        let n = verts.len();
        let mut edges = Vec::with_capacity(n);
        for i in 0..n {
            edges.push(self.get_or_add_edge(verts[i], verts[(i + 1) % n])?);
        }
        self.up = None;
        self.faces.push(Some(FaceRec {
            edges,
            class: ModelEntity::interior(self.class_dim),
            par: ParallelInfo::serial(),
        }));
        let f = PointId::from_index(self.faces.len() - 1);
        self.face_lookup.insert(key, f);
        Ok((f, true))
    }

    /// 2D cell from a counter-clockwise vertex cycle.
    pub fn add_polygon(&mut self, verts: &[PointId], class: ModelEntity) -> Result<PointId, MeshError> {
        let (f, _) = self.add_face_from_vertices(verts)?;
        if let Some(rec) = self.faces[f.index()].as_mut() {
            rec.class = class;
        }
        Ok(f)
    }

    /// Standard solid from its vertices in Exodus order.
    pub fn add_region_from_vertices(
        &mut self,
        cell_type: CellType,
        verts: &[PointId],
        class: ModelEntity,
    ) -> Result<PointId, MeshError> {
        let sides = cell_type.side_templates().ok_or_else(|| {
            MeshError::UnsupportedTopology(format!("{cell_type:?} has no side template"))
        })?;
        if Some(verts.len()) != cell_type.num_vertices() {
            return Err(MeshError::InvalidParameters(format!(
                "{cell_type:?} needs {:?} vertices, got {}",
                cell_type.num_vertices(),
                verts.len()
            )));
        }
        let mut faces = Vec::with_capacity(sides.len());
        for side in sides {
            let cycle: Vec<PointId> = side.iter().map(|&i| verts[i]).collect();
            faces.push(self.add_face_from_vertices(&cycle)?);
        }
        Ok(self.push_region(faces, Some(verts.to_vec()), class))
    }

    /// General polyhedron from face cycles oriented outward.
    pub fn add_region_from_faces(
        &mut self,
        cycles: &[Vec<PointId>],
        class: ModelEntity,
    ) -> Result<PointId, MeshError> {
        if cycles.len() < 4 {
            return Err(MeshError::UnsupportedTopology(format!(
                "polyhedron with {} faces",
                cycles.len()
            )));
        }
        let mut faces = Vec::with_capacity(cycles.len());
        for cycle in cycles {
            faces.push(self.add_face_from_vertices(cycle)?);
        }
        Ok(self.push_region(faces, None, class))
    }

    fn push_region(
        &mut self,
        faces: Vec<(PointId, bool)>,
        vertex_order: Option<Vec<PointId>>,
        class: ModelEntity,
    ) -> PointId {
        self.up = None;
        self.regions.push(Some(RegionRec {
            faces,
            vertex_order,
            class,
            par: ParallelInfo::serial(),
        }));
        PointId::from_index(self.regions.len() - 1)
    }

    fn check_vertex(&self, v: PointId) -> Result<(), MeshError> {
        self.vertex(v)
            .map(|_| ())
            .ok_or_else(|| MeshError::InvalidParameters(format!("unknown vertex handle {v}")))
    }

    /// Rebuilds the vertex-pair and vertex-set lookups from live records.
    pub(crate) fn rebuild_lookups(&mut self) {
        self.edge_lookup.clear();
        for (i, rec) in self.edges.iter().enumerate() {
            if let Some(rec) = rec {
                self.edge_lookup
                    .insert(sorted_pair(rec.verts[0], rec.verts[1]), PointId::from_index(i));
            }
        }
        self.face_lookup.clear();
        let keys: Vec<(Vec<PointId>, PointId)> = live(&self.faces)
            .map(|f| (sorted_key(&self.face_vertices(f)), f))
            .collect();
        self.face_lookup.extend(keys);
        self.up = None;
    }

    // ---------------------------------------------------------------------
    // Records
    // ---------------------------------------------------------------------

    #[inline]
    pub fn vertex(&self, v: PointId) -> Option<&VertexRec> {
        self.vertices.get(v.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn edge(&self, e: PointId) -> Option<&EdgeRec> {
        self.edges.get(e.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn face(&self, f: PointId) -> Option<&FaceRec> {
        self.faces.get(f.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn region(&self, r: PointId) -> Option<&RegionRec> {
        self.regions.get(r.index()).and_then(Option::as_ref)
    }

    /// Live handles of dimension `mtype` in traversal (slot) order.
    pub fn handles(&self, mtype: MType) -> Vec<PointId> {
        match mtype {
            MType::Vertex => live(&self.vertices).collect(),
            MType::Edge => live(&self.edges).collect(),
            MType::Face => live(&self.faces).collect(),
            MType::Region => live(&self.regions).collect(),
        }
    }

    pub fn num_live(&self, mtype: MType) -> usize {
        match mtype {
            MType::Vertex => self.vertices.iter().flatten().count(),
            MType::Edge => self.edges.iter().flatten().count(),
            MType::Face => self.faces.iter().flatten().count(),
            MType::Region => self.regions.iter().flatten().count(),
        }
    }

    pub fn par(&self, mtype: MType, h: PointId) -> Option<&ParallelInfo> {
        match mtype {
            MType::Vertex => self.vertex(h).map(|r| &r.par),
            MType::Edge => self.edge(h).map(|r| &r.par),
            MType::Face => self.face(h).map(|r| &r.par),
            MType::Region => self.region(h).map(|r| &r.par),
        }
    }

    pub fn par_mut(&mut self, mtype: MType, h: PointId) -> Option<&mut ParallelInfo> {
        let i = h.index();
        match mtype {
            MType::Vertex => self.vertices.get_mut(i)?.as_mut().map(|r| &mut r.par),
            MType::Edge => self.edges.get_mut(i)?.as_mut().map(|r| &mut r.par),
            MType::Face => self.faces.get_mut(i)?.as_mut().map(|r| &mut r.par),
            MType::Region => self.regions.get_mut(i)?.as_mut().map(|r| &mut r.par),
        }
    }

    pub fn class(&self, mtype: MType, h: PointId) -> Option<ModelEntity> {
        match mtype {
            MType::Vertex => self.vertex(h).map(|r| r.class),
            MType::Edge => self.edge(h).map(|r| r.class),
            MType::Face => self.face(h).map(|r| r.class),
            MType::Region => self.region(h).map(|r| r.class),
        }
    }

    pub fn set_class(&mut self, mtype: MType, h: PointId, class: ModelEntity) {
        let i = h.index();
        let slot = match mtype {
            MType::Vertex => self.vertices.get_mut(i).and_then(Option::as_mut).map(|r| &mut r.class),
            MType::Edge => self.edges.get_mut(i).and_then(Option::as_mut).map(|r| &mut r.class),
            MType::Face => self.faces.get_mut(i).and_then(Option::as_mut).map(|r| &mut r.class),
            MType::Region => self.regions.get_mut(i).and_then(Option::as_mut).map(|r| &mut r.class),
        };
        if let Some(slot) = slot {
            *slot = class;
        }
    }

    pub fn coords(&self, v: PointId) -> [f64; 3] {
        self.vertex(v).map_or([0.0; 3], |r| r.coords)
    }

    pub(crate) fn set_coords(&mut self, v: PointId, coords: [f64; 3]) {
        if let Some(rec) = self.vertices.get_mut(v.index()).and_then(Option::as_mut) {
            rec.coords = coords;
        }
    }

    // ---------------------------------------------------------------------
    // Downward adjacency
    // ---------------------------------------------------------------------

    pub fn edge_vertices(&self, e: PointId) -> [PointId; 2] {
        self.edge(e).map_or([e, e], |r| r.verts)
    }

    pub fn face_edges(&self, f: PointId) -> &[(PointId, bool)] {
        self.face(f).map_or(&[], |r| r.edges.as_slice())
    }

    /// Vertex cycle of a face, following its edge cycle.
    pub fn face_vertices(&self, f: PointId) -> Vec<PointId> {
        self.face_edges(f)
            .iter()
            .map(|&(e, dir)| {
                let [a, b] = self.edge_vertices(e);
                if dir { a } else { b }
            })
            .collect()
    }

    pub fn region_faces(&self, r: PointId) -> &[(PointId, bool)] {
        self.region(r).map_or(&[], |rec| rec.faces.as_slice())
    }

    /// Region vertices: the template order when known, otherwise first
    /// appearance while walking the faces.
    pub fn region_vertices(&self, r: PointId) -> Vec<PointId> {
        if let Some(order) = self.region(r).and_then(|rec| rec.vertex_order.as_ref()) {
            return order.clone();
        }
        let mut seen = hashbrown::HashSet::new();
        let mut out = Vec::new();
        for &(f, _) in self.region_faces(r) {
            for v in self.face_vertices(f) {
                if seen.insert(v) {
                    out.push(v);
                }
            }
        }
        out
    }

    /// Unique region edges in face-walk order.
    pub fn region_edges(&self, r: PointId) -> Vec<PointId> {
        let mut seen = hashbrown::HashSet::new();
        let mut out = Vec::new();
        for &(f, _) in self.region_faces(r) {
            for &(e, _) in self.face_edges(f) {
                if seen.insert(e) {
                    out.push(e);
                }
            }
        }
        out
    }

    /// Vertices of any entity, in its natural order.
    pub fn entity_vertices(&self, mtype: MType, h: PointId) -> Vec<PointId> {
        match mtype {
            MType::Vertex => vec![h],
            MType::Edge => self.edge_vertices(h).to_vec(),
            MType::Face => self.face_vertices(h),
            MType::Region => self.region_vertices(h),
        }
    }

    /// Shape of a 2D or 3D cell.
    pub fn cell_type(&self, mtype: MType, h: PointId) -> CellType {
        match mtype {
            MType::Region => {
                let sizes: Vec<usize> = self
                    .region_faces(h)
                    .iter()
                    .map(|&(f, _)| self.face_edges(f).len())
                    .collect();
                CellType::from_face_sizes(&sizes)
            }
            _ => CellType::polygon(self.face_edges(h).len()),
        }
    }

    pub fn find_edge(&self, a: PointId, b: PointId) -> Option<PointId> {
        self.edge_lookup.get(&sorted_pair(a, b)).copied()
    }

    pub fn find_face(&self, verts: &[PointId]) -> Option<PointId> {
        self.face_lookup.get(&sorted_key(verts)).copied()
    }

    /// Entity of dimension `mtype` spanning exactly `verts`.
    pub fn find_by_vertices(&self, mtype: MType, verts: &[PointId]) -> Option<PointId> {
        match (mtype, verts) {
            (MType::Vertex, [v]) => self.vertex(*v).map(|_| *v),
            (MType::Edge, [a, b]) => self.find_edge(*a, *b),
            (MType::Face, _) => self.find_face(verts),
            _ => None,
        }
    }

    // ---------------------------------------------------------------------
    // Upward adjacency
    // ---------------------------------------------------------------------

    /// Derives upward adjacency from the downward records. Lists come out in
    /// ascending handle order.
    pub fn build_upward(&mut self) {
        let mut up = UpAdjacency {
            vertex_edges: vec![Vec::new(); self.vertices.len()],
            vertex_faces: vec![Vec::new(); self.vertices.len()],
            vertex_regions: vec![Vec::new(); self.vertices.len()],
            edge_faces: vec![Vec::new(); self.edges.len()],
            face_regions: vec![Vec::new(); self.faces.len()],
        };
        for e in live(&self.edges) {
            for v in self.edge_vertices(e) {
                up.vertex_edges[v.index()].push(e);
            }
        }
        for f in live(&self.faces) {
            for &(e, _) in self.face_edges(f) {
                up.edge_faces[e.index()].push(f);
            }
            for v in self.face_vertices(f) {
                up.vertex_faces[v.index()].push(f);
            }
        }
        for r in live(&self.regions) {
            for &(f, _) in self.region_faces(r) {
                up.face_regions[f.index()].push(r);
            }
            for v in self.region_vertices(r) {
                up.vertex_regions[v.index()].push(r);
            }
        }
        self.up = Some(up);
    }

    fn up_list<'a>(&'a self, pick: impl Fn(&'a UpAdjacency) -> &'a Vec<Vec<PointId>>, h: PointId) -> &'a [PointId] {
        self.up
            .as_ref()
            .and_then(|up| pick(up).get(h.index()))
            .map_or(&[], Vec::as_slice)
    }

    pub fn vertex_edges(&self, v: PointId) -> &[PointId] {
        self.up_list(|u| &u.vertex_edges, v)
    }

    pub fn vertex_faces(&self, v: PointId) -> &[PointId] {
        self.up_list(|u| &u.vertex_faces, v)
    }

    pub fn vertex_regions(&self, v: PointId) -> &[PointId] {
        self.up_list(|u| &u.vertex_regions, v)
    }

    pub fn edge_faces(&self, e: PointId) -> &[PointId] {
        self.up_list(|u| &u.edge_faces, e)
    }

    pub fn face_regions(&self, f: PointId) -> &[PointId] {
        self.up_list(|u| &u.face_regions, f)
    }

    /// Cells (kernel dimension `cell_mtype`) incident to vertex `v`.
    pub fn vertex_cells(&self, v: PointId, cell_mtype: MType) -> &[PointId] {
        match cell_mtype {
            MType::Region => self.vertex_regions(v),
            _ => self.vertex_faces(v),
        }
    }

    /// Cells bounded by a side (face in 3D, edge in 2D).
    pub fn side_cells(&self, side: PointId, cell_mtype: MType) -> &[PointId] {
        match cell_mtype {
            MType::Region => self.face_regions(side),
            _ => self.edge_faces(side),
        }
    }

    /// Oriented sides of a cell (faces of a region, edges of a 2D cell).
    pub fn cell_sides(&self, cell: PointId, cell_mtype: MType) -> &[(PointId, bool)] {
        match cell_mtype {
            MType::Region => self.region_faces(cell),
            _ => self.face_edges(cell),
        }
    }

    /// Vertices of a cell in its natural order.
    pub fn cell_vertices(&self, cell: PointId, cell_mtype: MType) -> Vec<PointId> {
        match cell_mtype {
            MType::Region => self.region_vertices(cell),
            _ => self.face_vertices(cell),
        }
    }
}
