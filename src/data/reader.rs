//! Dataset file parsing and unification.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{DfiseError, Result};
use crate::format::{BlockReader, FileKind, ParseCallbacks};
use crate::mesh::{MeshReader, VertexIndex};

use super::{CompleteDataset, Datasets, PartialDataset};

/// One dataset as declared by a single file, before unification.
#[derive(Debug)]
struct RawDataset {
    name: String,
    dimension: usize,
    validity: Vec<String>,
    values: Vec<f64>,
    source_stem: String,
}

/// Reader for dataset files bound to one mesh topology.
///
/// Construction snapshots the mesh's region-to-vertex-set mapping once; the
/// mesh itself is not referenced afterwards. Files are read one at a time
/// with [`DataReader::read`]; [`DataReader::into_datasets`] finalizes
/// everything still pending and hands back the results.
pub struct DataReader {
    vertex_count: usize,
    /// Region name to ascending vertex indices, expanded from the region's
    /// elements at construction
    region_vertices: BTreeMap<String, Vec<VertexIndex>>,
    /// Raw datasets waiting for their validity union to cover the mesh
    pending: Vec<RawDataset>,
    complete: BTreeMap<String, CompleteDataset>,
    partial: BTreeMap<String, PartialDataset>,
}

impl DataReader {
    /// Create a dataset reader for the given mesh topology.
    pub fn new(mesh: &MeshReader) -> Self {
        let mut region_vertices = BTreeMap::new();
        for (name, region) in mesh.regions() {
            let mut indices = BTreeSet::new();
            for &element in &region.element_indices {
                indices.extend(mesh.elements()[element].vertex_indices.iter().copied());
            }
            region_vertices.insert(name.clone(), indices.into_iter().collect::<Vec<_>>());
        }

        Self {
            vertex_count: mesh.vertex_count(),
            region_vertices,
            pending: Vec::new(),
            complete: BTreeMap::new(),
            partial: BTreeMap::new(),
        }
    }

    /// Read one dataset file from a path.
    pub fn read(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let file = File::open(path).map_err(|source| DfiseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.read_from(BufReader::new(file), &stem)
            .map_err(|e| DfiseError::context(format!("file: {}", path.display()), e))
    }

    /// Read one dataset file from any buffered reader.
    ///
    /// `source_stem` stands in for the file stem in collision-free naming.
    pub fn read_from<R: BufRead>(&mut self, input: R, source_stem: &str) -> Result<()> {
        let mut session = FileSession {
            region_vertices: &self.region_vertices,
            dataset_names: Vec::new(),
            functions: Vec::new(),
            parsed: Vec::new(),
            source_stem,
        };
        BlockReader::parse(input, &mut session)?;
        self.pending.extend(session.parsed);
        self.unify_complete()
    }

    /// Finalize all datasets that are still pending as partial datasets and
    /// return the complete and partial maps.
    pub fn into_datasets(mut self) -> Result<Datasets> {
        self.unify_complete()?;

        while let Some(name) = self.pending.first().map(|raw| raw.name.clone()) {
            let contributors: Vec<&RawDataset> =
                self.pending.iter().filter(|raw| raw.name == name).collect();
            let (dimension, union, contributor_indices) =
                self.check_contributors(&name, &contributors)?;
            let stem = contributors[0].source_stem.clone();

            let taken = self.take_pending(&name);
            let mut values = vec![0.0; union.len() * dimension];
            for (raw, own) in taken.iter().zip(&contributor_indices) {
                let positions: Vec<usize> = own
                    .iter()
                    .map(|v| union.partition_point(|u| u < v))
                    .collect();
                scatter(&mut values, &raw.values, &positions, dimension);
            }

            let unique = self.unique_name(&name, &stem);
            log::debug!(
                "finalized partial dataset '{}': {} of {} vertices, dimension {}",
                unique,
                union.len(),
                self.vertex_count,
                dimension
            );
            self.partial.insert(
                unique,
                PartialDataset {
                    dimension,
                    vertex_indices: union,
                    values,
                },
            );
        }

        Ok(Datasets {
            complete: self.complete,
            partial: self.partial,
        })
    }

    /// Finalize every pending name whose validity union already covers the
    /// whole mesh; the rest stays pending so later files can still fill the
    /// gaps.
    fn unify_complete(&mut self) -> Result<()> {
        let mut names: Vec<String> = Vec::new();
        for raw in &self.pending {
            if !names.contains(&raw.name) {
                names.push(raw.name.clone());
            }
        }

        for name in names {
            let contributors: Vec<&RawDataset> =
                self.pending.iter().filter(|raw| raw.name == name).collect();
            let (dimension, union, contributor_indices) =
                self.check_contributors(&name, &contributors)?;
            if union.len() != self.vertex_count {
                continue;
            }
            let stem = contributors[0].source_stem.clone();

            let taken = self.take_pending(&name);
            let values = if taken.len() == 1 {
                // fast path: a lone full contributor's values are already in
                // ascending vertex index order, so they move as-is
                taken.into_iter().next().map(|raw| raw.values).unwrap_or_default()
            } else {
                let mut values = vec![0.0; self.vertex_count * dimension];
                for (raw, own) in taken.iter().zip(&contributor_indices) {
                    scatter(&mut values, &raw.values, own, dimension);
                }
                values
            };

            let unique = self.unique_name(&name, &stem);
            log::debug!(
                "finalized complete dataset '{}': {} vertices, dimension {}",
                unique,
                self.vertex_count,
                dimension
            );
            self.complete
                .insert(unique, CompleteDataset { dimension, values });
        }
        Ok(())
    }

    /// Validate all contributors of one name and compute their unions.
    ///
    /// Returns the shared dimension, the overall ascending vertex union, and
    /// each contributor's own ascending union.
    fn check_contributors(
        &self,
        name: &str,
        contributors: &[&RawDataset],
    ) -> Result<(usize, Vec<VertexIndex>, Vec<Vec<VertexIndex>>)> {
        let dimension = contributors[0].dimension;
        let mut union = BTreeSet::new();
        let mut contributor_indices = Vec::with_capacity(contributors.len());

        for raw in contributors {
            if raw.dimension != dimension {
                return Err(DfiseError::SizeMismatch {
                    dataset: name.to_string(),
                    expected: dimension,
                    found: raw.dimension,
                });
            }
            let own = self.validity_union(&raw.validity);
            if raw.values.len() != own.len() * dimension {
                return Err(DfiseError::SizeMismatch {
                    dataset: name.to_string(),
                    expected: own.len() * dimension,
                    found: raw.values.len(),
                });
            }
            union.extend(own.iter().copied());
            contributor_indices.push(own);
        }

        Ok((dimension, union.into_iter().collect(), contributor_indices))
    }

    /// Ascending union of the given validity regions' vertex sets.
    fn validity_union(&self, validity: &[String]) -> Vec<VertexIndex> {
        let mut indices = BTreeSet::new();
        for region in validity {
            indices.extend(
                self.region_vertices
                    .get(region)
                    .into_iter()
                    .flatten()
                    .copied(),
            );
        }
        indices.into_iter().collect()
    }

    /// Remove and return every pending dataset with the given name.
    fn take_pending(&mut self, name: &str) -> Vec<RawDataset> {
        let pending = std::mem::take(&mut self.pending);
        let (taken, rest): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|raw| raw.name == name);
        self.pending = rest;
        taken
    }

    /// First unused name among `base`, `base_<stem>`, `base_<stem>_<k>`.
    fn unique_name(&self, base: &str, stem: &str) -> String {
        let taken =
            |name: &str| self.complete.contains_key(name) || self.partial.contains_key(name);

        if !taken(base) {
            return base.to_string();
        }
        let with_stem = format!("{}_{}", base, stem);
        if !taken(&with_stem) {
            return with_stem;
        }
        let mut k = 2usize;
        loop {
            let candidate = format!("{}_{}", with_stem, k);
            if !taken(&candidate) {
                return candidate;
            }
            k += 1;
        }
    }
}

/// Scatter `source` values into `target` at the given per-entry slots.
fn scatter(target: &mut [f64], source: &[f64], slots: &[usize], dimension: usize) {
    for (position, &slot) in slots.iter().enumerate() {
        for component in 0..dimension {
            target[slot * dimension + component] = source[position * dimension + component];
        }
    }
}

/// Parsing state for one dataset file.
struct FileSession<'a> {
    region_vertices: &'a BTreeMap<String, Vec<VertexIndex>>,
    dataset_names: Vec<String>,
    functions: Vec<String>,
    parsed: Vec<RawDataset>,
    source_stem: &'a str,
}

impl FileSession<'_> {
    fn parse_dataset<R: BufRead>(
        &mut self,
        r: &mut BlockReader<R>,
        index: usize,
        name: String,
    ) -> Result<()> {
        let expected = &self.dataset_names[index];
        if name != *expected {
            return Err(DfiseError::NameMismatch {
                what: "dataset",
                expected: expected.clone(),
                found: name,
            });
        }

        match self.parse_dataset_body(r, index) {
            Ok(raw) => {
                self.parsed.push(raw);
                Ok(())
            }
            Err(e) => Err(DfiseError::context(format!("dataset: {}", name), e)),
        }
    }

    fn parse_dataset_body<R: BufRead>(
        &mut self,
        r: &mut BlockReader<R>,
        index: usize,
    ) -> Result<RawDataset> {
        let function: String = r.read_attribute("function")?;
        if function != self.functions[index] {
            return Err(DfiseError::NameMismatch {
                what: "function",
                expected: self.functions[index].clone(),
                found: function,
            });
        }

        let kind: String = r.read_attribute("type")?;
        let declared_dimension: usize = r.read_attribute("dimension")?;
        let dimension = match kind.as_str() {
            "scalar" => {
                if declared_dimension != 1 {
                    return Err(DfiseError::UnsupportedType {
                        found: format!("scalar dataset with dimension {}", declared_dimension),
                    });
                }
                1
            }
            "vector" => {
                if declared_dimension == 0 {
                    return Err(DfiseError::UnsupportedType {
                        found: "vector dataset with dimension 0".to_string(),
                    });
                }
                declared_dimension
            }
            other => {
                return Err(DfiseError::UnsupportedType {
                    found: format!("{} dataset", other),
                });
            }
        };

        let location: String = r.read_attribute("location")?;
        if location != "vertex" {
            return Err(DfiseError::UnsupportedLocation { found: location });
        }

        let mut validity: Vec<String> = Vec::new();
        r.read_array("validity", &mut validity)?;
        let mut seen = BTreeSet::new();
        for region in &validity {
            if !self.region_vertices.contains_key(region) {
                return Err(DfiseError::UnknownRegion {
                    region: region.clone(),
                });
            }
            if !seen.insert(region.as_str()) {
                return Err(DfiseError::DuplicateValidity {
                    region: region.clone(),
                });
            }
        }

        let mut values = Vec::new();
        r.read_named_block("Values", |r, count: usize| {
            values.reserve(count);
            for _ in 0..count {
                let value = r.read_value()?;
                values.push(value);
            }
            Ok(())
        })?;

        Ok(RawDataset {
            name: self.dataset_names[index].clone(),
            dimension,
            validity,
            values,
            source_stem: self.source_stem.to_string(),
        })
    }
}

impl ParseCallbacks for FileSession<'_> {
    fn parse_info_extra<R: BufRead>(&mut self, r: &mut BlockReader<R>) -> Result<()> {
        let info = r.mandatory_info();
        if info.kind != FileKind::Dataset {
            return Err(DfiseError::UnsupportedType {
                found: format!("{} (dataset reader parses dataset files only)", info.kind),
            });
        }

        r.read_array("datasets", &mut self.dataset_names)?;
        r.read_array("functions", &mut self.functions)?;
        if self.functions.len() != self.dataset_names.len() {
            return Err(DfiseError::CountMismatch {
                what: "functions",
                declared: self.dataset_names.len(),
                found: self.functions.len(),
            });
        }
        Ok(())
    }

    fn parse_data<R: BufRead>(&mut self, r: &mut BlockReader<R>) -> Result<()> {
        for index in 0..self.dataset_names.len() {
            r.read_named_block("Dataset", |r, name: String| {
                self.parse_dataset(r, index, name)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    /// Two line elements in two regions: "left" covers vertices {0,1},
    /// "right" covers {2,3}.
    fn two_region_mesh() -> MeshReader {
        let input = "DF-ISE text\n\
             Info {\n\
               version = 1.0\n\
               type = grid\n\
               dimension = 2\n\
               nb_vertices = 4\n\
               nb_edges = 2\n\
               nb_faces = 0\n\
               nb_elements = 2\n\
               nb_regions = 2\n\
               regions = [ \"left\" \"right\" ]\n\
               materials = [ \"Silicon\" \"Oxide\" ]\n\
             }\n\
             Data {\n\
               CoordSystem {\n\
                 translate = [ 0 0 0 ]\n\
                 transform = [ 1 0 0 0 1 0 0 0 1 ]\n\
               }\n\
               Vertices (4) { 0 0  1 0  2 0  3 0 }\n\
               Edges (2) { 0 1  2 3 }\n\
               Locations (2) { i i }\n\
               Elements (2) { 1 0 1  1 2 3 }\n\
               Region (\"left\") { material = Silicon Elements (1) { 0 } }\n\
               Region (\"right\") { material = Oxide Elements (1) { 1 } }\n\
             }\n";
        MeshReader::from_reader(Cursor::new(input)).unwrap()
    }

    fn dataset_file(name: &str, validity: &str, count: usize, values: &str) -> String {
        format!(
            "DF-ISE text\n\
             Info {{\n\
               version = 1.0\n\
               type = dataset\n\
               dimension = 2\n\
               nb_vertices = 4\n\
               nb_edges = 2\n\
               nb_faces = 0\n\
               nb_elements = 2\n\
               nb_regions = 2\n\
               datasets = [ \"{}\" ]\n\
               functions = [ \"Potential\" ]\n\
             }}\n\
             Data {{\n\
               Dataset (\"{}\") {{\n\
                 function = Potential\n\
                 type = scalar\n\
                 dimension = 1\n\
                 location = vertex\n\
                 validity = [ {} ]\n\
                 Values ({}) {{ {} }}\n\
               }}\n\
             }}\n",
            name, name, validity, count, values
        )
    }

    #[test]
    fn test_full_coverage_yields_complete_dataset() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("D", "\"left\" \"right\"", 4, "1.0 2.0 3.0 4.0");
        reader.read_from(Cursor::new(input), "a").unwrap();

        let datasets = reader.into_datasets().unwrap();
        assert!(datasets.partial.is_empty());
        let d = &datasets.complete["D"];
        assert_eq!(d.dimension, 1);
        assert_eq!(d.values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_disjoint_halves_unify_into_one_complete_dataset() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let left = dataset_file("D", "\"left\"", 2, "1.0 2.0");
        let right = dataset_file("D", "\"right\"", 2, "3.0 4.0");
        reader.read_from(Cursor::new(left), "a").unwrap();
        reader.read_from(Cursor::new(right), "b").unwrap();

        let datasets = reader.into_datasets().unwrap();
        assert!(datasets.partial.is_empty());
        let d = &datasets.complete["D"];
        // each vertex carries the value its region's file contributed
        assert_eq!(d.values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_partial_coverage_yields_partial_dataset() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("D", "\"right\"", 2, "7.0 8.0");
        reader.read_from(Cursor::new(input), "a").unwrap();

        let datasets = reader.into_datasets().unwrap();
        assert!(datasets.complete.is_empty());
        let d = &datasets.partial["D"];
        assert_eq!(d.vertex_indices, vec![2, 3]);
        assert_eq!(d.values, vec![7.0, 8.0]);
    }

    #[test]
    fn test_colliding_names_get_stem_suffixes() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let full = dataset_file("D", "\"left\" \"right\"", 4, "1 2 3 4");
        reader.read_from(Cursor::new(full.clone()), "a").unwrap();
        reader.read_from(Cursor::new(full.clone()), "b").unwrap();
        reader.read_from(Cursor::new(full), "b").unwrap();

        let datasets = reader.into_datasets().unwrap();
        let names: Vec<&str> = datasets.complete.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["D", "D_b", "D_b_2"]);
    }

    #[test]
    fn test_partial_leftover_renamed_after_complete() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let full = dataset_file("D", "\"left\" \"right\"", 4, "1 2 3 4");
        let half = dataset_file("D", "\"right\"", 2, "9 9");
        reader.read_from(Cursor::new(full), "a").unwrap();
        reader.read_from(Cursor::new(half), "b").unwrap();

        let datasets = reader.into_datasets().unwrap();
        assert!(datasets.complete.contains_key("D"));
        assert!(datasets.partial.contains_key("D_b"));
    }

    #[test]
    fn test_duplicate_validity_detected_before_values() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("D", "\"left\" \"left\"", 4, "1 2 3 4");
        let err = reader.read_from(Cursor::new(input), "a").unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("appears twice in dataset validity"),
            "{}",
            message
        );
        assert!(message.starts_with("while parsing dataset: D - "), "{}", message);
    }

    #[test]
    fn test_unknown_validity_region_is_rejected() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("D", "\"nowhere\"", 2, "1 2");
        let err = reader.read_from(Cursor::new(input), "a").unwrap_err();
        assert!(err.to_string().contains("unknown validity region: 'nowhere'"));
    }

    #[test]
    fn test_value_count_must_match_validity_coverage() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("D", "\"left\" \"right\"", 3, "1 2 3");
        let err = reader.read_from(Cursor::new(input), "a").unwrap_err();
        assert!(matches!(
            err,
            DfiseError::SizeMismatch {
                expected: 4,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_location_is_rejected() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("D", "\"left\"", 2, "1 2").replace("location = vertex", "location = edge");
        let err = reader.read_from(Cursor::new(input), "a").unwrap_err();
        assert!(err.to_string().contains("unsupported dataset location: 'edge'"));
    }

    #[test]
    fn test_vector_dataset_carries_its_dimension() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("E", "\"left\" \"right\"", 8, "1 2 3 4 5 6 7 8")
            .replace("type = scalar", "type = vector")
            .replace("dimension = 1", "dimension = 2");
        reader.read_from(Cursor::new(input), "a").unwrap();

        let datasets = reader.into_datasets().unwrap();
        let e = &datasets.complete["E"];
        assert_eq!(e.dimension, 2);
        assert_relative_eq!(e.values[2 * 2], 5.0);
        assert_eq!(e.values.len(), 8);
    }

    #[test]
    fn test_complete_fast_path_assumes_ascending_vertex_order() {
        // A lone full contributor is moved verbatim: the format stores the
        // values in ascending vertex index order and the fast path trusts
        // that without re-sorting. This test pins the assumption down.
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("D", "\"left\" \"right\"", 4, "10 20 30 40");
        reader.read_from(Cursor::new(input), "a").unwrap();

        let datasets = reader.into_datasets().unwrap();
        let d = &datasets.complete["D"];
        for (vertex, expected) in [(0usize, 10.0), (1, 20.0), (2, 30.0), (3, 40.0)] {
            assert_relative_eq!(d.values[vertex], expected);
        }
    }

    #[test]
    fn test_grid_file_rejected_by_dataset_reader() {
        let mesh = two_region_mesh();
        let mut reader = DataReader::new(&mesh);
        let input = dataset_file("D", "\"left\"", 2, "1 2").replace("type = dataset", "type = grid");
        let err = reader.read_from(Cursor::new(input), "a").unwrap_err();
        assert!(matches!(err, DfiseError::UnsupportedType { .. }));
    }
}
