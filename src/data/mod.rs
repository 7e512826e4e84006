//! Dataset files and cross-file dataset unification.
//!
//! Dataset files attach named field values to mesh vertices, scoped to the
//! regions listed in each dataset's *validity*. The [`DataReader`] parses any
//! number of dataset files against one mesh topology and unifies same-named
//! datasets into exactly one result per name:
//!
//! - a [`CompleteDataset`] when the unioned validity covers every mesh
//!   vertex, stored densely with one entry per vertex, or
//! - a [`PartialDataset`] otherwise, stored as an ascending vertex index
//!   list with a parallel value vector.
//!
//! When the same logical name would be finalized twice (for example because
//! two files both fully define it), the later result is renamed using the
//! originating file's stem: `name`, then `name_<stem>`, then
//! `name_<stem>_<k>`.

mod reader;

use std::collections::BTreeMap;

use crate::mesh::VertexIndex;

pub use reader::DataReader;

/// A dataset covering every mesh vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteDataset {
    /// Values per vertex (1 for scalar datasets)
    pub dimension: usize,
    /// Dense values, `vertex_index * dimension + component`
    pub values: Vec<f64>,
}

/// A dataset covering a strict subset of the mesh vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDataset {
    /// Values per vertex (1 for scalar datasets)
    pub dimension: usize,
    /// Ascending, de-duplicated vertex indices the values apply to
    pub vertex_indices: Vec<VertexIndex>,
    /// Values parallel to `vertex_indices`, `position * dimension + component`
    pub values: Vec<f64>,
}

/// The finalized datasets of one unification run, keyed by unique name.
///
/// A name resolves to exactly one of the two maps, never both.
#[derive(Debug, Default)]
pub struct Datasets {
    pub complete: BTreeMap<String, CompleteDataset>,
    pub partial: BTreeMap<String, PartialDataset>,
}
