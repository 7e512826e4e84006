//! Generic block reader for the DF-ISE file envelope.
//!
//! Every DF-ISE file shares the same skeleton: the two-token header
//! `DF-ISE text`, then `Info { ... }` with a fixed run of mandatory
//! attributes, then `Data { ... }`. The variable parts of `Info` and `Data`
//! belong to the concrete reader (grid, boundary or dataset), which plugs in
//! through the [`ParseCallbacks`] capability interface and drives the typed
//! read primitives exposed here.

use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use crate::error::{DfiseError, Result};
use crate::format::tokenizer::{Token, Tokenizer};

/// The file kinds a DF-ISE header can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileKind {
    /// Grid file (`.grd`): vertices, edges, elements, regions
    #[default]
    Grid,
    /// Boundary file (`.bnd`): a grid file with an additional Faces block
    Boundary,
    /// Dataset file (`.dat`): field values attached to mesh vertices
    Dataset,
}

impl FileKind {
    /// The label used for this kind in the `type` attribute.
    pub fn name(self) -> &'static str {
        match self {
            FileKind::Grid => "grid",
            FileKind::Boundary => "boundary",
            FileKind::Dataset => "dataset",
        }
    }
}

impl FromStr for FileKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "grid" => Ok(FileKind::Grid),
            "boundary" => Ok(FileKind::Boundary),
            "dataset" => Ok(FileKind::Dataset),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The mandatory attributes every `Info` block declares, in fixed order.
///
/// Every subsequent block's element count must equal the corresponding count
/// here; mismatches are fatal for the file.
#[derive(Debug, Clone, Default)]
pub struct MandatoryInfo {
    /// Format version string
    pub version: String,
    /// File kind declared by the `type` attribute
    pub kind: FileKind,
    /// Spatial dimension of the mesh
    pub dimension: usize,
    pub nb_vertices: usize,
    pub nb_edges: usize,
    pub nb_faces: usize,
    pub nb_elements: usize,
    pub nb_regions: usize,
}

/// The variable grammar positions of a DF-ISE file.
///
/// Implemented once per file kind; [`BlockReader::parse`] invokes
/// `parse_info_extra` after the mandatory `Info` attributes and `parse_data`
/// inside the `Data` envelope.
pub trait ParseCallbacks {
    /// Parse the file-kind specific tail of the `Info` block.
    fn parse_info_extra<R: BufRead>(&mut self, reader: &mut BlockReader<R>) -> Result<()>;

    /// Parse the contents of the `Data` block.
    fn parse_data<R: BufRead>(&mut self, reader: &mut BlockReader<R>) -> Result<()>;
}

/// Short type label for conversion error messages.
fn type_label<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

/// Recursive-descent reader over the tokenizer.
pub struct BlockReader<R> {
    tokens: Tokenizer<R>,
    info: MandatoryInfo,
}

impl<R: BufRead> BlockReader<R> {
    /// Parse one complete DF-ISE file: header, `Info` and `Data`.
    ///
    /// Returns the mandatory info record; everything else lands in the
    /// callbacks' own storage.
    pub fn parse<C: ParseCallbacks>(input: R, callbacks: &mut C) -> Result<MandatoryInfo> {
        let mut reader = BlockReader {
            tokens: Tokenizer::new(input),
            info: MandatoryInfo::default(),
        };

        reader.parse_header()?;
        reader.read_block("Info", |r| {
            r.parse_mandatory_info()?;
            callbacks.parse_info_extra(r)
        })?;
        reader.read_block("Data", |r| callbacks.parse_data(r))?;

        Ok(reader.info)
    }

    /// The mandatory `Info` attributes; valid once `parse_info_extra` runs.
    pub fn mandatory_info(&self) -> &MandatoryInfo {
        &self.info
    }

    fn parse_header(&mut self) -> Result<()> {
        for expected in ["DF-ISE", "text"] {
            let token = self.tokens.next_token()?;
            if token.text != expected {
                return Err(DfiseError::BadHeader { found: token.text });
            }
        }
        Ok(())
    }

    fn parse_mandatory_info(&mut self) -> Result<()> {
        self.info.version = self.read_attribute("version")?;
        self.info.kind = self.read_attribute("type")?;
        self.info.dimension = self.read_attribute("dimension")?;
        self.info.nb_vertices = self.read_attribute("nb_vertices")?;
        self.info.nb_edges = self.read_attribute("nb_edges")?;
        self.info.nb_faces = self.read_attribute("nb_faces")?;
        self.info.nb_elements = self.read_attribute("nb_elements")?;
        self.info.nb_regions = self.read_attribute("nb_regions")?;

        log::debug!(
            "accepted {} file: dimension {}, {} vertices, {} elements, {} regions",
            self.info.kind,
            self.info.dimension,
            self.info.nb_vertices,
            self.info.nb_elements,
            self.info.nb_regions
        );
        Ok(())
    }

    fn convert<T: FromStr>(token: Token) -> Result<T> {
        token
            .text
            .parse()
            .map_err(|_| DfiseError::conversion(token.text, type_label::<T>()))
    }

    /// Consume one token and convert it to `T`.
    pub fn read_value<T: FromStr>(&mut self) -> Result<T> {
        let token = self.tokens.next_token()?;
        Self::convert(token)
    }

    /// Consume `name = value` and convert the value to `T`.
    pub fn read_attribute<T: FromStr>(&mut self, name: &str) -> Result<T> {
        self.tokens.expect(name, "attribute has invalid name")?;
        self.tokens.expect("=", "attribute misses =")?;
        self.read_value()
    }

    /// Consume `name = [ value* ]` of unbounded length.
    ///
    /// Does not clear `target`; new values are appended.
    pub fn read_array<T: FromStr>(&mut self, name: &str, target: &mut Vec<T>) -> Result<()> {
        self.tokens.expect(name, "array has invalid name")?;
        self.tokens.expect("=", "attribute misses =")?;
        self.tokens.expect("[", "attribute is not an array")?;

        loop {
            let token = self.tokens.next_token()?;
            if token.is_punctuation(']') {
                return Ok(());
            }
            target.push(Self::convert(token)?);
        }
    }

    /// Consume `name = [ value* ]` with exactly `count` values.
    ///
    /// Does not clear `target`; new values are appended.
    pub fn read_array_exact<T: FromStr>(
        &mut self,
        name: &str,
        target: &mut Vec<T>,
        count: usize,
    ) -> Result<()> {
        self.tokens.expect(name, "array has invalid name")?;
        self.tokens.expect("=", "attribute misses =")?;
        self.tokens.expect("[", "attribute is not an array")?;

        target.reserve(count);
        for _ in 0..count {
            let value = self.read_value()?;
            target.push(value);
        }
        self.tokens.expect("]", "array did not end as expected")
    }

    /// Consume `name { ... }` with `body` invoked between the braces.
    pub fn read_block<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.tokens.expect(name, "block has invalid name")?;
        self.tokens.expect("{", "expected begin of block")?;
        body(self)?;
        self.tokens.expect("}", "expected end of block")
    }

    /// Consume `name ( param ) { ... }` with the converted parameter passed
    /// on to `body`.
    pub fn read_named_block<P, F>(&mut self, name: &str, body: F) -> Result<()>
    where
        P: FromStr,
        F: FnOnce(&mut Self, P) -> Result<()>,
    {
        self.tokens.expect(name, "block has invalid name")?;
        self.tokens.expect("(", "expected parameter parenthesis")?;
        let param = self.read_value()?;
        self.tokens.expect(")", "expected parameter to end")?;
        self.tokens.expect("{", "expected begin of block")?;
        body(self, param)?;
        self.tokens.expect("}", "expected end of block")
    }
}
