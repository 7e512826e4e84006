//! Core types for the reconstructed mesh topology.

use std::fmt;
use std::str::FromStr;

/// Index of a vertex into the flat coordinate vector.
pub type VertexIndex = usize;

/// Index of an element into the element vector.
pub type ElementIndex = usize;

/// An edge as an ordered pair of vertex indices, conceptually directed.
pub type Edge = [VertexIndex; 2];

/// A triangular face given by three signed edge references.
pub type Face = [EdgeRef; 3];

/// A signed edge reference.
///
/// A non-negative reference `i` denotes edge `i` traversed forward; a
/// negative reference `-(i+1)` denotes edge `i` traversed in reverse, i.e.
/// with its endpoints swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef(pub i64);

impl EdgeRef {
    /// The unsigned edge index this reference resolves to.
    pub fn index(self) -> usize {
        if self.0 < 0 {
            (-self.0 - 1) as usize
        } else {
            self.0 as usize
        }
    }

    /// True when the reference traverses the edge in reverse.
    pub fn is_reversed(self) -> bool {
        self.0 < 0
    }

    /// The reference to the same edge with opposite traversal direction.
    ///
    /// `r -> -r-1` is an involution: 0 <-> -1, 1 <-> -2, and so on.
    pub fn flipped(self) -> EdgeRef {
        EdgeRef(-self.0 - 1)
    }
}

impl FromStr for EdgeRef {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<i64>().map(EdgeRef)
    }
}

/// A signed face reference, with the same sign convention as [`EdgeRef`].
///
/// A reversed face traverses its three edges in opposite order and flips the
/// sign fed to each underlying edge lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRef(pub i64);

impl FaceRef {
    /// The unsigned face index this reference resolves to.
    pub fn index(self) -> usize {
        if self.0 < 0 {
            (-self.0 - 1) as usize
        } else {
            self.0 as usize
        }
    }

    /// True when the reference traverses the face in reverse.
    pub fn is_reversed(self) -> bool {
        self.0 < 0
    }
}

impl FromStr for FaceRef {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<i64>().map(FaceRef)
    }
}

/// Element tags supported by the format.
///
/// Grid files carry lines, triangles and quadrilaterals; boundary files add
/// polygons and tetrahedra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTag {
    Line,
    Triangle,
    Quadrilateral,
    Polygon,
    Tetrahedron,
}

impl ElementTag {
    /// Parse an element tag from its numeric code in the Elements block.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Line),
            2 => Some(Self::Triangle),
            3 => Some(Self::Quadrilateral),
            4 => Some(Self::Polygon),
            5 => Some(Self::Tetrahedron),
            _ => None,
        }
    }

    /// The numeric code used for this tag in the Elements block.
    pub fn code(self) -> u32 {
        match self {
            Self::Line => 1,
            Self::Triangle => 2,
            Self::Quadrilateral => 3,
            Self::Polygon => 4,
            Self::Tetrahedron => 5,
        }
    }

    /// The human-readable label for this tag.
    pub fn name(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Triangle => "triangle",
            Self::Quadrilateral => "quadrilateral",
            Self::Polygon => "polygon",
            Self::Tetrahedron => "tetrahedron",
        }
    }

    /// True for the tags the grid-only grammar accepts.
    pub fn in_grid_grammar(self) -> bool {
        matches!(self, Self::Line | Self::Triangle | Self::Quadrilateral)
    }
}

impl fmt::Display for ElementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mesh element with its resolved vertex indices in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// The element's shape tag
    pub tag: ElementTag,
    /// Resolved vertex indices, always in range `[0, vertex_count)`
    pub vertex_indices: Vec<VertexIndex>,
}

/// A named, materially-labeled group of mesh elements.
#[derive(Debug, Clone, Default)]
pub struct Region {
    /// Material name declared for this region
    pub material: String,
    /// Indices into the element vector
    pub element_indices: Vec<ElementIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_ref_sign_resolution() {
        assert_eq!(EdgeRef(0).index(), 0);
        assert!(!EdgeRef(0).is_reversed());
        assert_eq!(EdgeRef(7).index(), 7);
        assert_eq!(EdgeRef(-1).index(), 0);
        assert!(EdgeRef(-1).is_reversed());
        assert_eq!(EdgeRef(-8).index(), 7);
    }

    #[test]
    fn test_edge_ref_flip_is_involution() {
        for raw in [-5i64, -1, 0, 3] {
            let r = EdgeRef(raw);
            assert_eq!(r.flipped().flipped(), r);
            assert_eq!(r.flipped().index(), r.index());
            assert_ne!(r.flipped().is_reversed(), r.is_reversed());
        }
    }

    #[test]
    fn test_element_tag_codes_round_trip() {
        for code in 1..=5 {
            let tag = ElementTag::from_code(code).unwrap();
            assert_eq!(tag.code(), code);
        }
        assert!(ElementTag::from_code(0).is_none());
        assert!(ElementTag::from_code(6).is_none());
    }

    #[test]
    fn test_grid_grammar_excludes_volume_tags() {
        assert!(ElementTag::Quadrilateral.in_grid_grammar());
        assert!(!ElementTag::Polygon.in_grid_grammar());
        assert!(!ElementTag::Tetrahedron.in_grid_grammar());
    }
}
