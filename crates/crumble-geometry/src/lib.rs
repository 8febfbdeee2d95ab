//! Geometry primitives for Crumble terrain
//!
//! This crate provides the leaf-level geometry the terrain engine is built on:
//! - Contours and axis-aligned bounds (Contour, Bounds, Winding)
//! - Edge congruence keys for connectivity tests (PolyEdge)
//! - Nesting analysis of contour soups (build_contour_tree)
//! - Polygon boolean adapter (subtract, union_all)
//! - Triangulation with holes (triangulate, TriMesh)
//! - Lazily recomputed values (Cached, InvalidationToken)

pub mod boolean;
mod bounds;
mod cached;
mod contour;
pub mod contour_tree;
pub mod edge;
mod error;
pub mod triangulate;

pub use boolean::PolygonWithHoles;
pub use bounds::Bounds;
pub use cached::{Cached, InvalidationToken};
pub use contour::{Contour, Winding};
pub use contour_tree::{ContourCluster, build_contour_tree};
pub use edge::{EDGE_QUANTIZATION, PolyEdge};
pub use error::GeometryError;
pub use triangulate::{TriMesh, triangulate};
