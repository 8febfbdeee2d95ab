//! Polygon triangulation with holes

use glam::Vec2;

use crate::{Bounds, Contour, GeometryError};

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    pub vertices: Vec<Vec2>,
    pub indices: Vec<[u32; 3]>,
}

impl TriMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec2; 3]> + '_ {
        self.indices.iter().map(|tri| {
            [
                self.vertices[tri[0] as usize],
                self.vertices[tri[1] as usize],
                self.vertices[tri[2] as usize],
            ]
        })
    }

    /// Sum of unsigned triangle areas.
    pub fn area(&self) -> f32 {
        self.triangles()
            .map(|[a, b, c]| triangle_signed_area(a, b, c).abs())
            .sum()
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.vertices)
    }

    /// Barycentric containment against every triangle.
    pub fn contains_point(&self, p: Vec2) -> bool {
        self.triangles().any(|[a, b, c]| point_in_triangle(p, a, b, c))
    }
}

/// Signed triangle area; positive for counter-clockwise triangles.
pub fn triangle_signed_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a) * 0.5
}

/// Barycentric point-in-triangle test, inclusive of edges. Works for either winding.
pub fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() <= f32::EPSILON * dot00 * dot11 {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;

    u >= 0.0 && v >= 0.0 && u + v <= 1.0
}

/// Triangulate an outer contour with holes using ear clipping.
///
/// # Errors
///
/// Fails when the outer contour has fewer than three points, when the
/// triangulator rejects the input, or when it yields no triangles.
pub fn triangulate(outer: &Contour, holes: &[Contour]) -> Result<TriMesh, GeometryError> {
    if !outer.is_valid() {
        return Err(GeometryError::TooFewPoints(outer.len()));
    }

    let mut vertices: Vec<Vec2> = outer.points().to_vec();
    let mut hole_indices = Vec::with_capacity(holes.len());
    for hole in holes.iter().filter(|h| h.is_valid()) {
        hole_indices.push(vertices.len());
        vertices.extend_from_slice(hole.points());
    }

    let coords: Vec<f64> = vertices
        .iter()
        .flat_map(|p| [p.x as f64, p.y as f64])
        .collect();

    let flat = earcutr::earcut(&coords, &hole_indices, 2)
        .map_err(|e| GeometryError::Triangulator(format!("{:?}", e)))?;

    let indices: Vec<[u32; 3]> = flat
        .chunks_exact(3)
        .map(|t| [t[0] as u32, t[1] as u32, t[2] as u32])
        .collect();

    if indices.is_empty() {
        return Err(GeometryError::EmptyTriangulation);
    }

    Ok(TriMesh { vertices, indices })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangulate_square() {
        let square = Contour::rect(Vec2::ZERO, Vec2::splat(2.0));
        let mesh = triangulate(&square, &[]).expect("square triangulates");
        assert_eq!(mesh.triangle_count(), 2);
        assert!((mesh.area() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_triangulate_with_hole() {
        let outer = Contour::rect(Vec2::ZERO, Vec2::splat(10.0));
        let hole = Contour::rect(Vec2::splat(4.0), Vec2::splat(6.0));
        let mesh = triangulate(&outer, &[hole]).expect("ring triangulates");
        assert!((mesh.area() - 96.0).abs() < 1e-3);
        assert!(!mesh.contains_point(Vec2::splat(5.0)));
        assert!(mesh.contains_point(Vec2::splat(1.0)));
    }

    #[test]
    fn test_triangulate_too_few_points() {
        let line = Contour::new(vec![Vec2::ZERO, Vec2::ONE]);
        assert_eq!(
            triangulate(&line, &[]),
            Err(GeometryError::TooFewPoints(2))
        );
    }

    #[test]
    fn test_point_in_triangle_either_winding() {
        let (a, b, c) = (Vec2::ZERO, Vec2::new(4.0, 0.0), Vec2::new(0.0, 4.0));
        let p = Vec2::new(1.0, 1.0);
        assert!(point_in_triangle(p, a, b, c));
        assert!(point_in_triangle(p, a, c, b));
        assert!(!point_in_triangle(Vec2::new(3.0, 3.0), a, b, c));
    }

    #[test]
    fn test_point_in_tiny_triangle() {
        let a = Vec2::ZERO;
        let b = Vec2::new(0.01, 0.0);
        let c = Vec2::new(0.0, 0.01);
        assert!(point_in_triangle(Vec2::new(0.002, 0.002), a, b, c));
        assert!(!point_in_triangle(Vec2::new(0.01, 0.01), a, b, c));
    }

    #[test]
    fn test_point_in_collinear_triangle() {
        let a = Vec2::ZERO;
        let b = Vec2::new(100.0, 0.0);
        let c = Vec2::new(200.0, 0.0);
        assert!(!point_in_triangle(Vec2::new(50.0, 0.0), a, b, c));
    }
}
