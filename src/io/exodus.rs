//! Exodus-style ASCII mesh reader/writer.
//!
//! ```text
//! EXODUS
//! DIM 3
//! NODES <n>
//! <node id> x y z
//! ELEMENTS <m>
//! <elem id> <block> <token> <k> <node ids...>
//! <elem id> <block> Polyhedron <faces> <k1> <node ids...> <k2> <node ids...> ...
//! SETS <s>
//! elemset <id> <count> <elem ids...>
//! sideset <id> <count> <elem id>:<side> ...
//! nodeset <id> <count> <node ids...>
//! END
//! ```
//!
//! IDs are 1-based. Sides are 1-based Exodus side numbers; for polyhedra the
//! side is the position in the element's face list. Element blocks become
//! `matset_<block>` labeled sets, the `SETS` section becomes `elemset_<id>`,
//! `sideset_<id>` and `nodeset_<id>`.

use hashbrown::HashMap;
use itertools::Itertools;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::kernel::NativeMesh;
use crate::kernel::piece::{CellShape, MeshPiece, PieceBuild, PieceCell, PieceSet, PieceVertex, cell_shape};
use crate::mesh::Mesh;
use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use crate::topology::entity::{EntityKind, GlobalId, MType, ModelEntity, ParallelType};
use crate::topology::labels::{elemset_name, matset_name, nodeset_name, sideset_name};
use crate::topology::point::PointId;

fn cell_type_to_token(cell_type: CellType) -> String {
    match cell_type {
        CellType::Triangle => "Triangle".to_string(),
        CellType::Quadrilateral => "Quadrilateral".to_string(),
        CellType::Polygon(sides) => format!("Polygon:{sides}"),
        CellType::Tetrahedron => "Tetrahedron".to_string(),
        CellType::Hexahedron => "Hexahedron".to_string(),
        CellType::Prism => "Prism".to_string(),
        CellType::Pyramid => "Pyramid".to_string(),
        CellType::Polyhedron => "Polyhedron".to_string(),
    }
}

fn token_to_cell_type(token: &str) -> Result<CellType, MeshError> {
    match token {
        "Triangle" => Ok(CellType::Triangle),
        "Quadrilateral" => Ok(CellType::Quadrilateral),
        "Tetrahedron" => Ok(CellType::Tetrahedron),
        "Hexahedron" => Ok(CellType::Hexahedron),
        "Prism" => Ok(CellType::Prism),
        "Pyramid" => Ok(CellType::Pyramid),
        "Polyhedron" => Ok(CellType::Polyhedron),
        _ => {
            if let Some(value) = token.strip_prefix("Polygon:") {
                let sides = value
                    .parse::<u8>()
                    .map_err(|_| MeshError::MeshIoParse(format!("invalid polygon token: {token}")))?;
                return Ok(CellType::Polygon(sides));
            }
            Err(MeshError::MeshIoParse(format!("unknown cell type token: {token}")))
        }
    }
}

/// Element connectivity as written in the file (node IDs).
#[derive(Clone, Debug, PartialEq)]
pub enum ElementNodes {
    Standard { cell_type: CellType, nodes: Vec<u64> },
    Polyhedron(Vec<Vec<u64>>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExodusElement {
    pub id: u64,
    pub block: i64,
    pub nodes: ElementNodes,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExodusSet {
    Elem { id: i64, elements: Vec<u64> },
    /// `(element id, 1-based side)` pairs.
    Side { id: i64, sides: Vec<(u64, usize)> },
    Node { id: i64, nodes: Vec<u64> },
}

/// Parsed contents of an exodus-style text file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExodusDocument {
    pub dim: usize,
    pub nodes: Vec<(u64, [f64; 3])>,
    pub elements: Vec<ExodusElement>,
    pub sets: Vec<ExodusSet>,
}

/// Whitespace token stream with line-aware error messages.
struct Tokens<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    current: std::str::SplitWhitespace<'a>,
    line_no: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            current: "".split_whitespace(),
            line_no: 0,
        }
    }

    /// Moves to the next non-empty line.
    fn next_line(&mut self, what: &str) -> Result<(), MeshError> {
        for (no, line) in self.lines.by_ref() {
            if !line.trim().is_empty() {
                self.current = line.split_whitespace();
                self.line_no = no + 1;
                return Ok(());
            }
        }
        Err(MeshError::MeshIoParse(format!("unexpected end of file, expected {what}")))
    }

    fn word(&mut self, what: &str) -> Result<&'a str, MeshError> {
        self.current
            .next()
            .ok_or_else(|| MeshError::MeshIoParse(format!("line {}: missing {what}", self.line_no)))
    }

    fn parse<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, MeshError> {
        let line_no = self.line_no;
        let w = self.word(what)?;
        w.parse()
            .map_err(|_| MeshError::MeshIoParse(format!("line {line_no}: invalid {what} `{w}`")))
    }

    fn keyword(&mut self, expected: &str) -> Result<(), MeshError> {
        self.next_line(expected)?;
        let line_no = self.line_no;
        let w = self.word(expected)?;
        if w != expected {
            return Err(MeshError::MeshIoParse(format!(
                "line {line_no}: expected `{expected}`, found `{w}`"
            )));
        }
        Ok(())
    }
}

fn parse_id(tokens: &mut Tokens<'_>, what: &str) -> Result<u64, MeshError> {
    let id: u64 = tokens.parse(what)?;
    if id == 0 {
        return Err(MeshError::MeshIoParse(format!("line {}: {what} must be positive", tokens.line_no)));
    }
    Ok(id)
}

/// Parses exodus-style text.
pub fn parse_exodus(text: &str) -> Result<ExodusDocument, MeshError> {
    let mut t = Tokens::new(text);
    t.keyword("EXODUS")?;
    t.keyword("DIM")?;
    let dim: usize = t.parse("dimension")?;
    if !(2..=3).contains(&dim) {
        return Err(MeshError::MeshIoParse(format!("unsupported coordinate dimension: {dim}")));
    }

    t.keyword("NODES")?;
    let node_count: usize = t.parse("node count")?;
    let mut doc = ExodusDocument {
        dim,
        ..ExodusDocument::default()
    };
    for _ in 0..node_count {
        t.next_line("node entry")?;
        let id = parse_id(&mut t, "node id")?;
        let mut xyz = [0.0; 3];
        for x in xyz.iter_mut().take(dim) {
            *x = t.parse("coordinate")?;
        }
        doc.nodes.push((id, xyz));
    }

    t.keyword("ELEMENTS")?;
    let element_count: usize = t.parse("element count")?;
    for _ in 0..element_count {
        t.next_line("element entry")?;
        let id = parse_id(&mut t, "element id")?;
        let block: i64 = t.parse("element block")?;
        let cell_type = token_to_cell_type(t.word("cell type")?)?;
        let nodes = if cell_type == CellType::Polyhedron {
            let nf: usize = t.parse("face count")?;
            let mut faces = Vec::with_capacity(nf);
            for _ in 0..nf {
                let k: usize = t.parse("face node count")?;
                let face = (0..k).map(|_| parse_id(&mut t, "face node")).collect::<Result<_, _>>()?;
                faces.push(face);
            }
            ElementNodes::Polyhedron(faces)
        } else {
            let k: usize = t.parse("node count")?;
            if cell_type.num_vertices().is_some_and(|n| n != k) {
                return Err(MeshError::MeshIoParse(format!(
                    "line {}: {cell_type:?} with {k} nodes",
                    t.line_no
                )));
            }
            let nodes = (0..k).map(|_| parse_id(&mut t, "element node")).collect::<Result<_, _>>()?;
            ElementNodes::Standard { cell_type, nodes }
        };
        doc.elements.push(ExodusElement { id, block, nodes });
    }

    t.next_line("SETS or END")?;
    let w = t.word("section keyword")?;
    if w == "SETS" {
        let set_count: usize = t.parse("set count")?;
        for _ in 0..set_count {
            t.next_line("set entry")?;
            let family = t.word("set family")?;
            let id: i64 = t.parse("set id")?;
            let count: usize = t.parse("set size")?;
            let set = match family {
                "elemset" => ExodusSet::Elem {
                    id,
                    elements: (0..count).map(|_| parse_id(&mut t, "element id")).collect::<Result<_, _>>()?,
                },
                "nodeset" => ExodusSet::Node {
                    id,
                    nodes: (0..count).map(|_| parse_id(&mut t, "node id")).collect::<Result<_, _>>()?,
                },
                "sideset" => {
                    let mut sides = Vec::with_capacity(count);
                    for _ in 0..count {
                        let line_no = t.line_no;
                        let pair = t.word("element:side pair")?;
                        let parsed = pair
                            .split_once(':')
                            .and_then(|(e, s)| Some((e.parse::<u64>().ok()?, s.parse::<usize>().ok()?)));
                        match parsed {
                            Some((e, s)) if e > 0 && s > 0 => sides.push((e, s)),
                            _ => {
                                return Err(MeshError::MeshIoParse(format!(
                                    "line {line_no}: invalid element:side pair `{pair}`"
                                )));
                            }
                        }
                    }
                    ExodusSet::Side { id, sides }
                }
                other => {
                    return Err(MeshError::MeshIoParse(format!(
                        "line {}: unknown set family `{other}`",
                        t.line_no
                    )));
                }
            };
            doc.sets.push(set);
        }
        t.keyword("END")?;
    } else if w != "END" {
        return Err(MeshError::MeshIoParse(format!("line {}: expected `SETS` or `END`, found `{w}`", t.line_no)));
    }
    Ok(doc)
}

impl ExodusDocument {
    /// Topological dimension of the elements.
    pub fn cell_dim(&self) -> Result<usize, MeshError> {
        let solid = |e: &ExodusElement| match &e.nodes {
            ElementNodes::Standard { cell_type, .. } => cell_type.dimension() == 3,
            ElementNodes::Polyhedron(_) => true,
        };
        let solids = self.elements.iter().filter(|e| solid(e)).count();
        match solids {
            0 => Ok(2),
            n if n == self.elements.len() => Ok(3),
            _ => Err(MeshError::MeshIoParse("file mixes 2D and 3D elements".into())),
        }
    }

    /// Coordinate dimension; planar when every node of a 2D mesh has the same z.
    pub fn space_dim(&self) -> Result<usize, MeshError> {
        if self.dim == 2 {
            return Ok(2);
        }
        let planar = self.cell_dim()? == 2
            && self
                .nodes
                .first()
                .is_some_and(|(_, p0)| self.nodes.iter().all(|(_, p)| p[2] == p0[2]));
        Ok(if planar { 2 } else { 3 })
    }

    /// Converts to a mesh piece. Global IDs are file IDs minus one; owners come
    /// from `owners` (node owners, element owners, both in file order) or are 0.
    pub fn to_piece(&self, owners: Option<(&[usize], &[usize])>) -> Result<MeshPiece, MeshError> {
        let cell_dim = self.cell_dim()?;
        let space_dim = self.space_dim()?;
        if let Some((nodes, elements)) = owners {
            if nodes.len() != self.nodes.len() || elements.len() != self.elements.len() {
                return Err(MeshError::MeshIoParse(format!(
                    "owner lists cover {} nodes and {} elements, file has {} and {}",
                    nodes.len(),
                    elements.len(),
                    self.nodes.len(),
                    self.elements.len()
                )));
            }
        }
        let node_owner = |i: usize| owners.map_or(0, |(n, _)| n[i]);
        let elem_owner = |i: usize| owners.map_or(0, |(_, e)| e[i]);
        let class = ModelEntity::interior(cell_dim);
        let cell_mtype = if cell_dim == 3 { MType::Region } else { MType::Face };

        let known: hashbrown::HashSet<u64> = self.nodes.iter().map(|(id, _)| *id).collect();
        let check = |id: &u64| -> Result<GlobalId, MeshError> {
            if known.contains(id) {
                Ok(id - 1)
            } else {
                Err(MeshError::MeshIoParse(format!("reference to unknown node {id}")))
            }
        };

        let vertices = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, &(id, coords))| PieceVertex {
                gid: id - 1,
                owner: node_owner(i),
                coords,
                class,
            })
            .collect();

        let mut cells = Vec::with_capacity(self.elements.len());
        let mut by_id: HashMap<u64, &ExodusElement> = HashMap::with_capacity(self.elements.len());
        let mut sets: Vec<PieceSet> = Vec::new();
        let mut set_index: HashMap<String, usize> = HashMap::new();
        let mut add_member = |name: String, mtype: MType, key: Vec<GlobalId>| {
            let i = *set_index.entry(name.clone()).or_insert_with(|| {
                sets.push(PieceSet {
                    name,
                    mtype,
                    members: Vec::new(),
                });
                sets.len() - 1
            });
            sets[i].members.push(key);
        };

        for (i, e) in self.elements.iter().enumerate() {
            if by_id.insert(e.id, e).is_some() {
                return Err(MeshError::MeshIoParse(format!("duplicate element id {}", e.id)));
            }
            let shape = match &e.nodes {
                ElementNodes::Standard { cell_type, nodes } => {
                    let gids: Vec<GlobalId> = nodes.iter().map(check).collect::<Result<_, _>>()?;
                    if cell_type.dimension() == 2 {
                        CellShape::Polygon(gids)
                    } else {
                        CellShape::Solid {
                            cell_type: *cell_type,
                            vertices: gids,
                        }
                    }
                }
                ElementNodes::Polyhedron(faces) => CellShape::Polyhedron(
                    faces
                        .iter()
                        .map(|f| f.iter().map(check).collect::<Result<Vec<_>, _>>())
                        .collect::<Result<_, _>>()?,
                ),
            };
            cells.push(PieceCell {
                gid: e.id - 1,
                owner: elem_owner(i),
                shape,
                class,
            });
            add_member(matset_name(&e.block.to_string()), cell_mtype, vec![e.id - 1]);
        }

        let side_mtype = if cell_dim == 3 { MType::Face } else { MType::Edge };
        for set in &self.sets {
            match set {
                ExodusSet::Elem { id, elements } => {
                    let name = elemset_name(&id.to_string());
                    for e in elements {
                        if !by_id.contains_key(e) {
                            return Err(MeshError::MeshIoParse(format!("{name} references unknown element {e}")));
                        }
                        add_member(name.clone(), cell_mtype, vec![e - 1]);
                    }
                }
                ExodusSet::Node { id, nodes } => {
                    let name = nodeset_name(&id.to_string());
                    for n in nodes {
                        add_member(name.clone(), MType::Vertex, vec![check(n)?]);
                    }
                }
                ExodusSet::Side { id, sides } => {
                    let name = sideset_name(&id.to_string());
                    for &(e, side) in sides {
                        let elem = by_id
                            .get(&e)
                            .ok_or_else(|| MeshError::MeshIoParse(format!("{name} references unknown element {e}")))?;
                        let mut key: Vec<GlobalId> = side_nodes(elem, side)
                            .ok_or_else(|| {
                                MeshError::MeshIoParse(format!("{name}: element {e} has no side {side}"))
                            })?
                            .iter()
                            .map(check)
                            .collect::<Result<_, _>>()?;
                        key.sort_unstable();
                        add_member(name.clone(), side_mtype, key);
                    }
                }
            }
        }

        Ok(MeshPiece {
            space_dim,
            cell_dim,
            vertices,
            cells,
            classes: Vec::new(),
            sets,
        })
    }
}

/// Node IDs of 1-based side `side` of an element.
fn side_nodes(elem: &ExodusElement, side: usize) -> Option<Vec<u64>> {
    let k = side.checked_sub(1)?;
    match &elem.nodes {
        ElementNodes::Standard { cell_type, nodes } => {
            Some(cell_type.side_vertices(k)?.into_iter().map(|i| nodes[i]).collect())
        }
        ElementNodes::Polyhedron(faces) => faces.get(k).cloned(),
    }
}

/// Parses text into a serial kernel.
pub fn parse_kernel(text: &str) -> Result<NativeMesh, MeshError> {
    let piece = parse_exodus(text)?.to_piece(None)?;
    piece.build(PieceBuild {
        rank: 0,
        keep_global_ids: false,
    })
}

/// Reads an `.exo` file into a kernel holding the whole mesh.
pub fn read_exodus(path: impl AsRef<Path>) -> Result<NativeMesh, MeshError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let kernel = parse_kernel(&text)?;
    log::debug!(
        "read {}: {} nodes, {} cells, {} labeled sets",
        path.display(),
        kernel.num_live(MType::Vertex),
        kernel.num_live(if kernel.cell_dim() == 3 { MType::Region } else { MType::Face }),
        kernel.labels().len()
    );
    Ok(kernel)
}

/// 1-based side of `shape` whose sorted vertex key is `key`.
fn find_side(shape: &CellShape, key: &[GlobalId]) -> Option<usize> {
    let sorted = |mut v: Vec<GlobalId>| {
        v.sort_unstable();
        v
    };
    let sides: Vec<Vec<GlobalId>> = match shape {
        CellShape::Polygon(vs) => (0..vs.len()).map(|i| vec![vs[i], vs[(i + 1) % vs.len()]]).collect(),
        CellShape::Solid { cell_type, vertices } => cell_type
            .side_templates()?
            .iter()
            .map(|s| s.iter().map(|&i| vertices[i]).collect())
            .collect(),
        CellShape::Polyhedron(faces) => faces.clone(),
    };
    sides.into_iter().position(|s| sorted(s) == key).map(|i| i + 1)
}

/// Writes the used entities of `mesh` with global IDs as file IDs.
///
/// Material blocks are taken from `matset_*` sets (block 0 when a cell is in
/// none); `elemset_*`, `sideset_*` and `nodeset_*` sets are written back.
pub fn write_exodus<W: Write>(mesh: &Mesh, mut writer: W) -> Result<(), MeshError> {
    let kernel = mesh.kernel();
    let cell_dim = mesh.manifold_dimension();
    let cell_mtype = EntityKind::Cell.mtype(cell_dim);
    let side_mtype = EntityKind::Face.mtype(cell_dim);
    let nodes = mesh.store().table(MType::Vertex);
    let cells = mesh.store().table(cell_mtype);
    let vertex_gid = |v: PointId| nodes.local_id(v).map_or(GlobalId::MAX, |l| nodes.global_id(l));

    let dim = mesh.space_dimension().max(if cell_dim == 3 { 3 } else { 2 });
    writeln!(writer, "EXODUS")?;
    writeln!(writer, "DIM {dim}")?;
    writeln!(writer, "NODES {}", nodes.count(ParallelType::Used))?;
    for n in nodes.range(ParallelType::Used) {
        let p = kernel.coords(nodes.handle(n));
        write!(writer, "{}", nodes.global_id(n) + 1)?;
        for x in p.iter().take(dim) {
            write!(writer, " {x}")?;
        }
        writeln!(writer)?;
    }

    let mut block_of: HashMap<usize, i64> = HashMap::new();
    for (name, set) in kernel.labels().iter() {
        let Some(block) = name.strip_prefix("matset_").and_then(|b| b.parse::<i64>().ok()) else {
            continue;
        };
        if set.mtype != cell_mtype {
            continue;
        }
        for &h in set.members() {
            if let Some(c) = cells.local_id(h) {
                block_of.entry(c).or_insert(block);
            }
        }
    }

    let mut shapes = Vec::with_capacity(cells.count(ParallelType::Used));
    writeln!(writer, "ELEMENTS {}", cells.count(ParallelType::Used))?;
    for c in cells.range(ParallelType::Used) {
        let h = cells.handle(c);
        let shape = cell_shape(kernel, h, cell_mtype, &vertex_gid);
        let block = block_of.get(&c).copied().unwrap_or(0);
        write!(writer, "{} {block} ", cells.global_id(c) + 1)?;
        match &shape {
            CellShape::Polygon(vs) => {
                write!(writer, "{} {}", cell_type_to_token(CellType::polygon(vs.len())), vs.len())?;
                for g in vs {
                    write!(writer, " {}", g + 1)?;
                }
            }
            CellShape::Solid { cell_type, vertices } => {
                write!(writer, "{} {}", cell_type_to_token(*cell_type), vertices.len())?;
                for g in vertices {
                    write!(writer, " {}", g + 1)?;
                }
            }
            CellShape::Polyhedron(faces) => {
                write!(writer, "Polyhedron {}", faces.len())?;
                for f in faces {
                    write!(writer, " {}", f.len())?;
                    for g in f {
                        write!(writer, " {}", g + 1)?;
                    }
                }
            }
        }
        writeln!(writer)?;
        shapes.push(shape);
    }

    let mut lines = Vec::new();
    for (name, set) in kernel.labels().iter() {
        if let Some(id) = name.strip_prefix("elemset_") {
            let ids: Vec<GlobalId> = set
                .members()
                .iter()
                .filter_map(|&h| cells.local_id(h))
                .map(|c| cells.global_id(c) + 1)
                .collect();
            lines.push(format!("elemset {id} {} {}", ids.len(), ids.iter().join(" ")));
        } else if let Some(id) = name.strip_prefix("nodeset_") {
            let ids: Vec<GlobalId> = set
                .members()
                .iter()
                .filter_map(|&h| nodes.local_id(h))
                .map(|n| nodes.global_id(n) + 1)
                .collect();
            lines.push(format!("nodeset {id} {} {}", ids.len(), ids.iter().join(" ")));
        } else if let Some(id) = name.strip_prefix("sideset_") {
            if set.mtype != side_mtype {
                continue;
            }
            let mut pairs = Vec::new();
            for &f in set.members() {
                let mut key: Vec<GlobalId> = kernel.entity_vertices(side_mtype, f).into_iter().map(vertex_gid).collect();
                key.sort_unstable();
                let found = kernel.side_cells(f, cell_mtype).iter().find_map(|&ch| {
                    let c = cells.local_id(ch)?;
                    Some((c, find_side(&shapes[c], &key)?))
                });
                if let Some((c, side)) = found {
                    pairs.push(format!("{}:{side}", cells.global_id(c) + 1));
                }
            }
            lines.push(format!("sideset {id} {} {}", pairs.len(), pairs.join(" ")));
        }
    }
    writeln!(writer, "SETS {}", lines.len())?;
    for line in lines {
        writeln!(writer, "{}", line.trim_end())?;
    }
    writeln!(writer, "END")?;
    Ok(())
}
