//! # DF-ISE Core
//!
//! A reader for the DF-ISE family of block-structured, text-based
//! scientific-mesh files: grid and boundary files (vertices, edges, faces,
//! elements, regions) and their companion dataset files (scalar or vector
//! field values attached to mesh vertices, scoped to named regions).
//!
//! This library provides:
//! - A tokenizer and generic block/attribute grammar for the DF-ISE text
//!   envelope (`DF-ISE text`, `Info { ... }`, `Data { ... }`)
//! - Reconstruction of element connectivity from the format's sign-encoded,
//!   indirectly-referenced edge and face indices
//! - Cross-file dataset unification into complete (every vertex) or partial
//!   (sparse) results with collision-free naming
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`format`] - Tokenizer and the generic block reader shared by all file
//!   kinds
//! - [`mesh`] - Topology reconstruction for grid and boundary files
//! - [`data`] - Dataset parsing and unification against a loaded topology
//! - [`error`] - The unified error type
//!
//! ## Usage
//!
//! ```no_run
//! use dfise_core::{DataReader, MeshReader};
//!
//! let mesh = MeshReader::from_file("device.grd")?;
//! let mut datasets = DataReader::new(&mesh);
//! datasets.read("device.dat")?;
//! let results = datasets.into_datasets()?;
//!
//! for (name, dataset) in &results.complete {
//!     println!("{}: {} values", name, dataset.values.len());
//! }
//! # Ok::<(), dfise_core::DfiseError>(())
//! ```
//!
//! ## Parsing Model
//!
//! Parsing is whole-file and block-synchronous: a file either parses
//! completely and validly or the whole operation fails with a single error
//! carrying the full context trail ("while parsing file: F - while parsing
//! region: R - ..."). There is no partial-success mode and no write path.

pub mod data;
pub mod error;
pub mod format;
pub mod mesh;

// Re-export main types for convenience
pub use data::{CompleteDataset, DataReader, Datasets, PartialDataset};
pub use error::{DfiseError, Result};
pub use format::{FileKind, MandatoryInfo};
pub use mesh::{Element, ElementTag, MeshReader, Region};
