//! Topology reader for grid and boundary files.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{DfiseError, Result};
use crate::format::{BlockReader, FileKind, ParseCallbacks};

use super::types::{Edge, EdgeRef, Element, ElementTag, Face, FaceRef, Region, VertexIndex};

/// Reader for the mesh topology of a grid or boundary file.
///
/// Both grammar variants run through the same state machine; the file kind
/// declared in the `Info` block selects whether a `Faces` block is expected
/// and which element tags are legal:
///
/// ```text
/// CoordSystem -> Vertices -> Edges -> [Faces] -> Locations -> Elements
///             -> Region * nb_regions
/// ```
///
/// Elements arrive in the file as signed edge/face references and are
/// resolved into plain vertex index sequences during parsing, so consumers
/// never see the indirection.
#[derive(Debug, Default)]
pub struct MeshReader {
    kind: FileKind,
    dimension: usize,
    vertex_count: usize,
    /// Flat coordinate vector, `vertex_index * dimension + component`
    vertices: Vec<f64>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    elements: Vec<Element>,
    region_names: Vec<String>,
    materials: Vec<String>,
    regions: BTreeMap<String, Region>,
    translate: Vec<f64>,
    transform: Vec<f64>,
}

impl MeshReader {
    /// Read a grid or boundary file from a path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DfiseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
            .map_err(|e| DfiseError::context(format!("file: {}", path.display()), e))
    }

    /// Read a grid or boundary file from any buffered reader.
    pub fn from_reader<R: BufRead>(input: R) -> Result<Self> {
        let mut mesh = MeshReader::default();
        BlockReader::parse(input, &mut mesh)?;

        // edge and face tables are reconstruction scaffolding only
        mesh.edges = Vec::new();
        mesh.faces = Vec::new();

        log::debug!(
            "loaded {} topology: {} vertices, {} elements, {} regions",
            mesh.kind,
            mesh.vertex_count,
            mesh.elements.len(),
            mesh.regions.len()
        );
        Ok(mesh)
    }

    /// The file kind this mesh was read from (grid or boundary).
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Spatial dimension of the mesh.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Flat coordinate vector, indexed by `vertex_index * dimension + component`.
    pub fn vertices(&self) -> &[f64] {
        &self.vertices
    }

    /// All mesh elements with resolved vertex indices.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Regions keyed by name.
    pub fn regions(&self) -> &BTreeMap<String, Region> {
        &self.regions
    }

    /// The 3-component coordinate-system translation.
    pub fn translate(&self) -> &[f64] {
        &self.translate
    }

    /// The 9-component coordinate-system transform matrix.
    pub fn transform(&self) -> &[f64] {
        &self.transform
    }

    // ---- signed reference resolution ----

    /// Vertex `which` (0 or 1) of an edge reference, honoring its direction.
    fn oriented_edge_vertex(&self, edge: EdgeRef, which: usize) -> VertexIndex {
        let vertices = self.edges[edge.index()];
        if edge.is_reversed() {
            vertices[1 - which]
        } else {
            vertices[which]
        }
    }

    /// Vertex `which` of edge slot `slot` of a face reference.
    ///
    /// A reversed face walks its edges in opposite order (slot `k` becomes
    /// slot `2-k`) and flips each edge reference it hands down.
    fn oriented_face_vertex(&self, face: FaceRef, slot: usize, which: usize) -> VertexIndex {
        let edges = self.faces[face.index()];
        let edge = if face.is_reversed() {
            edges[2 - slot].flipped()
        } else {
            edges[slot]
        };
        self.oriented_edge_vertex(edge, which)
    }

    // ---- checked raw reads ----

    fn read_vertex_index<R: BufRead>(&self, r: &mut BlockReader<R>) -> Result<VertexIndex> {
        let index: usize = r.read_value()?;
        let count = r.mandatory_info().nb_vertices;
        if index >= count {
            return Err(DfiseError::out_of_bounds("vertex index", index, count));
        }
        Ok(index)
    }

    fn read_edge_ref<R: BufRead>(&self, r: &mut BlockReader<R>) -> Result<EdgeRef> {
        let edge: EdgeRef = r.read_value()?;
        if edge.index() >= self.edges.len() {
            return Err(DfiseError::out_of_bounds(
                "edge index",
                edge.index(),
                self.edges.len(),
            ));
        }
        Ok(edge)
    }

    fn read_face_ref<R: BufRead>(&self, r: &mut BlockReader<R>) -> Result<FaceRef> {
        let face: FaceRef = r.read_value()?;
        if face.index() >= self.faces.len() {
            return Err(DfiseError::out_of_bounds(
                "face index",
                face.index(),
                self.faces.len(),
            ));
        }
        Ok(face)
    }

    // ---- block parsers ----

    fn parse_coord_system<R: BufRead>(&mut self, r: &mut BlockReader<R>) -> Result<()> {
        // fixed 3 + 9 values regardless of the mesh dimension
        r.read_array_exact("translate", &mut self.translate, 3)?;
        r.read_array_exact("transform", &mut self.transform, 9)
    }

    fn parse_vertices<R: BufRead>(&mut self, r: &mut BlockReader<R>, declared: usize) -> Result<()> {
        let nb_vertices = r.mandatory_info().nb_vertices;
        if declared != nb_vertices {
            return Err(DfiseError::CountMismatch {
                what: "vertices",
                declared: nb_vertices,
                found: declared,
            });
        }

        self.vertex_count = nb_vertices;
        self.vertices.reserve(nb_vertices * self.dimension);
        for _ in 0..nb_vertices * self.dimension {
            let coordinate = r.read_value()?;
            self.vertices.push(coordinate);
        }
        Ok(())
    }

    fn parse_edges<R: BufRead>(&mut self, r: &mut BlockReader<R>, declared: usize) -> Result<()> {
        let nb_edges = r.mandatory_info().nb_edges;
        if declared != nb_edges {
            return Err(DfiseError::CountMismatch {
                what: "edges",
                declared: nb_edges,
                found: declared,
            });
        }

        self.edges.reserve(nb_edges);
        for _ in 0..nb_edges {
            let from = self.read_vertex_index(r)?;
            let to = self.read_vertex_index(r)?;
            self.edges.push([from, to]);
        }
        Ok(())
    }

    fn parse_faces<R: BufRead>(&mut self, r: &mut BlockReader<R>, declared: usize) -> Result<()> {
        let nb_faces = r.mandatory_info().nb_faces;
        if declared != nb_faces {
            return Err(DfiseError::CountMismatch {
                what: "faces",
                declared: nb_faces,
                found: declared,
            });
        }

        self.faces.reserve(nb_faces);
        for _ in 0..nb_faces {
            let edge_count: usize = r.read_value()?;
            if edge_count != 3 {
                return Err(DfiseError::syntax(
                    "only triangular faces (with 3 edges) are supported",
                    "3",
                    edge_count.to_string(),
                ));
            }
            let e0 = self.read_edge_ref(r)?;
            let e1 = self.read_edge_ref(r)?;
            let e2 = self.read_edge_ref(r)?;
            self.faces.push([e0, e1, e2]);
        }
        Ok(())
    }

    fn parse_locations<R: BufRead>(&mut self, r: &mut BlockReader<R>, declared: usize) -> Result<()> {
        let nb_edges = r.mandatory_info().nb_edges;
        if declared != nb_edges {
            return Err(DfiseError::CountMismatch {
                what: "locations",
                declared: nb_edges,
                found: declared,
            });
        }

        // per-edge location tags are kept by the format for tooling; unused here
        for _ in 0..nb_edges {
            let _: String = r.read_value()?;
        }
        Ok(())
    }

    fn parse_elements<R: BufRead>(&mut self, r: &mut BlockReader<R>, declared: usize) -> Result<()> {
        let nb_elements = r.mandatory_info().nb_elements;
        if declared != nb_elements {
            return Err(DfiseError::CountMismatch {
                what: "elements",
                declared: nb_elements,
                found: declared,
            });
        }

        self.elements.reserve(nb_elements);
        for i in 0..nb_elements {
            let code: u32 = r.read_value()?;
            let tag = ElementTag::from_code(code)
                .filter(|tag| self.kind == FileKind::Boundary || tag.in_grid_grammar())
                .ok_or_else(|| DfiseError::conversion(code.to_string(), "ElementTag"))?;

            let vertex_indices = match tag {
                ElementTag::Line => {
                    // line given by two vertices directly
                    let from = self.read_vertex_index(r)?;
                    let to = self.read_vertex_index(r)?;
                    vec![from, to]
                }
                ElementTag::Triangle => {
                    let e0 = self.read_edge_ref(r)?;
                    let e1 = self.read_edge_ref(r)?;
                    // third edge is redundant - the first two cover all 3 vertices
                    let _ = self.read_edge_ref(r)?;
                    vec![
                        self.oriented_edge_vertex(e0, 0),
                        self.oriented_edge_vertex(e0, 1),
                        self.oriented_edge_vertex(e1, 1),
                    ]
                }
                ElementTag::Quadrilateral => {
                    let e0 = self.read_edge_ref(r)?;
                    let _ = self.read_edge_ref(r)?;
                    let e2 = self.read_edge_ref(r)?;
                    let _ = self.read_edge_ref(r)?;
                    vec![
                        self.oriented_edge_vertex(e0, 0),
                        self.oriented_edge_vertex(e0, 1),
                        self.oriented_edge_vertex(e2, 0),
                        self.oriented_edge_vertex(e2, 1),
                    ]
                }
                ElementTag::Polygon => {
                    let edge_count: usize = r.read_value()?;
                    let mut indices = Vec::with_capacity(edge_count);
                    for _ in 0..edge_count {
                        // the first vertex of each edge, walked in order
                        let edge = self.read_edge_ref(r)?;
                        indices.push(self.oriented_edge_vertex(edge, 0));
                    }
                    indices
                }
                ElementTag::Tetrahedron => {
                    let f0 = self.read_face_ref(r)?;
                    let mut indices = vec![
                        self.oriented_face_vertex(f0, 0, 0),
                        self.oriented_face_vertex(f0, 0, 1),
                        self.oriented_face_vertex(f0, 1, 1),
                    ];

                    // the second face contributes the one vertex the first
                    // face does not touch
                    let f1 = self.read_face_ref(r)?;
                    let candidates = [
                        self.oriented_face_vertex(f1, 0, 0),
                        self.oriented_face_vertex(f1, 0, 1),
                        self.oriented_face_vertex(f1, 1, 1),
                    ];
                    let fourth = candidates
                        .iter()
                        .copied()
                        .find(|candidate| !indices.contains(candidate))
                        .ok_or(DfiseError::DegenerateFace { element: i })?;
                    indices.push(fourth);

                    // remaining two faces are redundant
                    let _ = self.read_face_ref(r)?;
                    let _ = self.read_face_ref(r)?;
                    indices
                }
            };

            self.elements.push(Element {
                tag,
                vertex_indices,
            });
        }
        Ok(())
    }

    fn parse_region<R: BufRead>(
        &mut self,
        r: &mut BlockReader<R>,
        index: usize,
        name: String,
    ) -> Result<()> {
        let expected = &self.region_names[index];
        if name != *expected {
            return Err(DfiseError::NameMismatch {
                what: "region",
                expected: expected.clone(),
                found: name,
            });
        }

        self.parse_region_body(r, index)
            .map_err(|e| DfiseError::context(format!("region: {}", name), e))
    }

    fn parse_region_body<R: BufRead>(&mut self, r: &mut BlockReader<R>, index: usize) -> Result<()> {
        let material: String = r.read_attribute("material")?;
        if material != self.materials[index] {
            return Err(DfiseError::NameMismatch {
                what: "material",
                expected: self.materials[index].clone(),
                found: material,
            });
        }

        let nb_elements = r.mandatory_info().nb_elements;
        let mut element_indices = Vec::new();
        r.read_named_block("Elements", |r, count: usize| {
            element_indices.reserve(count);
            for _ in 0..count {
                let element: usize = r.read_value()?;
                if element >= nb_elements {
                    return Err(DfiseError::out_of_bounds(
                        "element index",
                        element,
                        nb_elements,
                    ));
                }
                element_indices.push(element);
            }
            Ok(())
        })?;

        self.regions.insert(
            self.region_names[index].clone(),
            Region {
                material,
                element_indices,
            },
        );
        Ok(())
    }
}

impl ParseCallbacks for MeshReader {
    fn parse_info_extra<R: BufRead>(&mut self, r: &mut BlockReader<R>) -> Result<()> {
        let info = r.mandatory_info();
        match info.kind {
            FileKind::Grid | FileKind::Boundary => {}
            other => {
                return Err(DfiseError::UnsupportedType {
                    found: format!("{} (topology reader parses grid and boundary files only)", other),
                });
            }
        }
        self.kind = info.kind;
        self.dimension = info.dimension;
        let nb_regions = info.nb_regions;

        r.read_array("regions", &mut self.region_names)?;
        r.read_array("materials", &mut self.materials)?;

        if self.region_names.len() != nb_regions {
            return Err(DfiseError::CountMismatch {
                what: "regions",
                declared: nb_regions,
                found: self.region_names.len(),
            });
        }
        if self.materials.len() != nb_regions {
            return Err(DfiseError::CountMismatch {
                what: "materials",
                declared: nb_regions,
                found: self.materials.len(),
            });
        }
        Ok(())
    }

    fn parse_data<R: BufRead>(&mut self, r: &mut BlockReader<R>) -> Result<()> {
        r.read_block("CoordSystem", |r| self.parse_coord_system(r))?;
        r.read_named_block("Vertices", |r, count: usize| self.parse_vertices(r, count))?;
        r.read_named_block("Edges", |r, count: usize| self.parse_edges(r, count))?;
        if self.kind == FileKind::Boundary {
            r.read_named_block("Faces", |r, count: usize| self.parse_faces(r, count))?;
        }
        r.read_named_block("Locations", |r, count: usize| self.parse_locations(r, count))?;
        r.read_named_block("Elements", |r, count: usize| self.parse_elements(r, count))?;

        for index in 0..self.region_names.len() {
            r.read_named_block("Region", |r, name: String| self.parse_region(r, index, name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn grid_file(vertices_block: &str) -> String {
        format!(
            "DF-ISE text\n\
             Info {{\n\
               version = 1.0\n\
               type = grid\n\
               dimension = 2\n\
               nb_vertices = 4\n\
               nb_edges = 4\n\
               nb_faces = 0\n\
               nb_elements = 1\n\
               nb_regions = 1\n\
               regions = [ \"bulk\" ]\n\
               materials = [ \"Silicon\" ]\n\
             }}\n\
             Data {{\n\
               CoordSystem {{\n\
                 translate = [ 0 0 0 ]\n\
                 transform = [ 1 0 0 0 1 0 0 0 1 ]\n\
               }}\n\
               {}\n\
               Edges (4) {{ 0 1  1 2  2 3  3 0 }}\n\
               Locations (4) {{ i i i i }}\n\
               Elements (1) {{ 3 0 1 2 3 }}\n\
               Region (\"bulk\") {{\n\
                 material = Silicon\n\
                 Elements (1) {{ 0 }}\n\
               }}\n\
             }}\n",
            vertices_block
        )
    }

    const UNIT_SQUARE: &str = "Vertices (4) { 0.0 0.0  1.0 0.0  1.0 1.0  0.0 1.0 }";

    #[test]
    fn test_grid_quadrilateral_reconstruction() {
        let mesh = MeshReader::from_reader(Cursor::new(grid_file(UNIT_SQUARE))).unwrap();

        assert_eq!(mesh.kind(), FileKind::Grid);
        assert_eq!(mesh.dimension(), 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_relative_eq!(mesh.vertices()[4], 1.0);
        assert_relative_eq!(mesh.vertices()[5], 1.0);

        assert_eq!(mesh.elements().len(), 1);
        let quad = &mesh.elements()[0];
        assert_eq!(quad.tag, ElementTag::Quadrilateral);
        // first and third edge supply the vertex sequence
        assert_eq!(quad.vertex_indices, vec![0, 1, 2, 3]);

        let bulk = &mesh.regions()["bulk"];
        assert_eq!(bulk.material, "Silicon");
        assert_eq!(bulk.element_indices, vec![0]);

        assert_eq!(mesh.translate().len(), 3);
        assert_eq!(mesh.transform().len(), 9);
    }

    #[test]
    fn test_vertex_count_mismatch_is_fatal() {
        let input = grid_file("Vertices (3) { 0.0 0.0  1.0 0.0  1.0 1.0 }");
        let err = MeshReader::from_reader(Cursor::new(input)).unwrap_err();
        assert!(matches!(
            err,
            DfiseError::CountMismatch {
                what: "vertices",
                declared: 4,
                found: 3,
            }
        ));
    }

    #[test]
    fn test_edge_sign_convention() {
        let mut mesh = MeshReader::default();
        mesh.edges = vec![[0, 1], [1, 2], [2, 0]];

        for (i, edge) in mesh.edges.iter().enumerate() {
            let forward = EdgeRef(i as i64);
            assert_eq!(mesh.oriented_edge_vertex(forward, 0), edge[0]);
            assert_eq!(mesh.oriented_edge_vertex(forward, 1), edge[1]);

            let reversed = EdgeRef(-(i as i64) - 1);
            assert_eq!(mesh.oriented_edge_vertex(reversed, 0), edge[1]);
            assert_eq!(mesh.oriented_edge_vertex(reversed, 1), edge[0]);
        }
    }

    #[test]
    fn test_face_sign_convention_recurses_into_edges() {
        let mut mesh = MeshReader::default();
        mesh.edges = vec![[0, 1], [1, 2], [2, 0]];
        mesh.faces = vec![[EdgeRef(0), EdgeRef(1), EdgeRef(2)]];

        // forward traversal: 0, 1, 2
        assert_eq!(mesh.oriented_face_vertex(FaceRef(0), 0, 0), 0);
        assert_eq!(mesh.oriented_face_vertex(FaceRef(0), 0, 1), 1);
        assert_eq!(mesh.oriented_face_vertex(FaceRef(0), 1, 1), 2);

        // reversed traversal walks the same vertex set with opposite winding
        assert_eq!(mesh.oriented_face_vertex(FaceRef(-1), 0, 0), 0);
        assert_eq!(mesh.oriented_face_vertex(FaceRef(-1), 0, 1), 2);
        assert_eq!(mesh.oriented_face_vertex(FaceRef(-1), 1, 1), 1);
    }

    fn boundary_file(elements_block: &str) -> String {
        format!(
            "DF-ISE text\n\
             Info {{\n\
               version = 1.0\n\
               type = boundary\n\
               dimension = 3\n\
               nb_vertices = 4\n\
               nb_edges = 6\n\
               nb_faces = 4\n\
               nb_elements = 1\n\
               nb_regions = 1\n\
               regions = [ \"body\" ]\n\
               materials = [ \"Oxide\" ]\n\
             }}\n\
             Data {{\n\
               CoordSystem {{\n\
                 translate = [ 0 0 0 ]\n\
                 transform = [ 1 0 0 0 1 0 0 0 1 ]\n\
               }}\n\
               Vertices (4) {{ 0 0 0  1 0 0  0 1 0  0 0 1 }}\n\
               Edges (6) {{ 0 1  1 2  2 0  0 3  1 3  2 3 }}\n\
               Faces (4) {{\n\
                 3 0 1 2\n\
                 3 0 4 -4\n\
                 3 1 5 -5\n\
                 3 2 3 -6\n\
               }}\n\
               Locations (6) {{ i i i i i i }}\n\
               {}\n\
               Region (\"body\") {{\n\
                 material = Oxide\n\
                 Elements (1) {{ 0 }}\n\
               }}\n\
             }}\n",
            elements_block
        )
    }

    #[test]
    fn test_tetrahedron_fourth_vertex_search() {
        // face 0 covers vertices 0,1,2; face 1 covers 0,1,3
        let input = boundary_file("Elements (1) { 5 0 1 2 3 }");
        let mesh = MeshReader::from_reader(Cursor::new(input)).unwrap();

        let tet = &mesh.elements()[0];
        assert_eq!(tet.tag, ElementTag::Tetrahedron);
        assert_eq!(tet.vertex_indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_tetrahedron_with_identical_faces_is_degenerate() {
        let input = boundary_file("Elements (1) { 5 0 0 2 3 }");
        let err = MeshReader::from_reader(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, DfiseError::DegenerateFace { element: 0 }));
    }

    #[test]
    fn test_polygon_walks_first_vertices() {
        let input = boundary_file("Elements (1) { 4 3 0 1 2 }");
        let mesh = MeshReader::from_reader(Cursor::new(input)).unwrap();
        assert_eq!(mesh.elements()[0].tag, ElementTag::Polygon);
        assert_eq!(mesh.elements()[0].vertex_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_volume_tags_rejected_in_grid_grammar() {
        // a grid file may not contain tetrahedra
        let input = grid_file(UNIT_SQUARE).replace("Elements (1) { 3 0 1 2 3 }", "Elements (1) { 5 0 1 2 3 }");
        let err = MeshReader::from_reader(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, DfiseError::Conversion { .. }));
    }

    #[test]
    fn test_region_name_mismatch() {
        let input = grid_file(UNIT_SQUARE).replace("Region (\"bulk\")", "Region (\"other\")");
        let err = MeshReader::from_reader(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, DfiseError::NameMismatch { what: "region", .. }));
    }

    #[test]
    fn test_region_errors_carry_breadcrumb() {
        let input = grid_file(UNIT_SQUARE).replace("material = Silicon", "material = Metal");
        let err = MeshReader::from_reader(Cursor::new(input)).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("while parsing region: bulk - "), "{}", message);
        assert!(message.contains("material"), "{}", message);
    }

    #[test]
    fn test_region_element_index_out_of_bounds() {
        let input = grid_file(UNIT_SQUARE).replace("Elements (1) { 0 }", "Elements (1) { 7 }");
        let err = MeshReader::from_reader(Cursor::new(input)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("element index out of bounds"), "{}", message);
    }

    #[test]
    fn test_dataset_file_rejected_by_topology_reader() {
        let input = grid_file(UNIT_SQUARE).replace("type = grid", "type = dataset");
        let err = MeshReader::from_reader(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, DfiseError::UnsupportedType { .. }));
    }
}
