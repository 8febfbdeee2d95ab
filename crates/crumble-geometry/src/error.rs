use thiserror::Error;

/// Errors raised by geometry operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("contour has {0} points, at least 3 are required")]
    TooFewPoints(usize),

    #[error("triangulation produced no triangles")]
    EmptyTriangulation,

    #[error("triangulator failed: {0}")]
    Triangulator(String),
}
