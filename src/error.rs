//! Error types for the DF-ISE reader.
//!
//! This module provides a unified error type [`DfiseError`] that covers
//! all error conditions that can occur during tokenization, block parsing,
//! topology reconstruction and dataset unification.

use thiserror::Error;

/// Result type alias using [`DfiseError`].
pub type Result<T> = std::result::Result<T, DfiseError>;

/// Unified error type for all DF-ISE operations.
///
/// Every error is fatal to the current file parse; there is no partial
/// success. Layers that add meaningful context (a region, a dataset, a file)
/// wrap the underlying error in [`DfiseError::Context`], so the message a
/// caller sees carries the full breadcrumb trail.
#[derive(Error, Debug)]
pub enum DfiseError {
    // ============ Tokenizer Errors ============
    /// Input ran out while a token was expected
    #[error("unexpectedly reached end of file")]
    EndOfInput,

    /// A quoted string was still open when the input ended
    #[error("unterminated quoted string")]
    UnterminatedString,

    // ============ Grammar Errors ============
    /// The fixed two-token file header was not `DF-ISE text`
    #[error("invalid/unsupported file header: got '{found}'")]
    BadHeader { found: String },

    /// An unexpected token where the grammar demands a specific one
    #[error("{context}: expected '{expected}', got '{found}'")]
    Syntax {
        context: &'static str,
        expected: String,
        found: String,
    },

    /// A token could not be converted to the requested type
    #[error("could not convert '{token}' to {target}")]
    Conversion { token: String, target: &'static str },

    // ============ Topology Errors ============
    /// A block's declared count disagrees with the Info block
    #[error("{what} count mismatch: Info block declares {declared}, found {found}")]
    CountMismatch {
        what: &'static str,
        declared: usize,
        found: usize,
    },

    /// A name in the Data block does not match its Info declaration
    #[error("unexpected {what} name: '{found}' - expected: '{expected}'")]
    NameMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    /// A vertex/edge/face/element index outside its declared range
    #[error("{what} out of bounds: {index} max: {max}")]
    OutOfBounds {
        what: &'static str,
        index: usize,
        max: usize,
    },

    /// A tetrahedron whose first two faces share all three vertices
    #[error("tetrahedron with element index {element} seems to have two equal faces")]
    DegenerateFace { element: usize },

    // ============ Dataset Errors ============
    /// Dataset values attached to anything but mesh vertices
    #[error("unsupported dataset location: '{found}' (only 'vertex' is supported)")]
    UnsupportedLocation { found: String },

    /// A file kind or dataset type outside the supported set
    #[error("unsupported type: {found}")]
    UnsupportedType { found: String },

    /// A validity region that the grid file never declared
    #[error("unknown validity region: '{region}'")]
    UnknownRegion { region: String },

    /// The same region named twice in one dataset's validity
    #[error("region '{region}' appears twice in dataset validity")]
    DuplicateValidity { region: String },

    /// A dataset's value count disagrees with its validity coverage
    #[error("size mismatch in dataset '{dataset}': expected {expected}, found {found}")]
    SizeMismatch {
        dataset: String,
        expected: usize,
        found: usize,
    },

    // ============ Propagation ============
    /// Breadcrumb wrapper added while unwinding through a named structure
    #[error("while parsing {what} - {source}")]
    Context {
        what: String,
        #[source]
        source: Box<DfiseError>,
    },

    /// Error opening or reading an input file
    #[error("cannot open file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DfiseError {
    /// Create a syntax error for an unexpected token.
    pub fn syntax(
        context: &'static str,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::Syntax {
            context,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a conversion error for a token that failed to parse as `target`.
    pub fn conversion(token: impl Into<String>, target: &'static str) -> Self {
        Self::Conversion {
            token: token.into(),
            target,
        }
    }

    /// Create an out-of-bounds error for an entity index.
    pub fn out_of_bounds(what: &'static str, index: usize, count: usize) -> Self {
        Self::OutOfBounds {
            what,
            index,
            max: count.saturating_sub(1),
        }
    }

    /// Wrap an error with a breadcrumb naming the structure being parsed.
    pub fn context(what: impl Into<String>, source: DfiseError) -> Self {
        Self::Context {
            what: what.into(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display_carries_full_trail() {
        let inner = DfiseError::UnknownRegion {
            region: "bulk".to_string(),
        };
        let wrapped = DfiseError::context(
            "file: doping.dat",
            DfiseError::context("dataset: DopingConcentration", inner),
        );
        assert_eq!(
            wrapped.to_string(),
            "while parsing file: doping.dat - while parsing dataset: DopingConcentration - \
             unknown validity region: 'bulk'"
        );
    }

    #[test]
    fn test_out_of_bounds_max_never_underflows() {
        let err = DfiseError::out_of_bounds("vertex index", 3, 0);
        assert_eq!(err.to_string(), "vertex index out of bounds: 3 max: 0");
    }
}
