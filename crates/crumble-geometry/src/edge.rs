//! Edge congruence keys
//!
//! Two shapes are connected when they share an edge. Edges are compared
//! after snapping their endpoints to an integer grid, so float noise from
//! transforms does not break adjacency.

use glam::{IVec2, Vec2};

use crate::Contour;

/// Grid cells per world unit used when quantizing edge endpoints.
pub const EDGE_QUANTIZATION: f32 = 100.0;

/// Snap a point to the integer grid used for edge keys.
pub fn quantize(p: Vec2) -> IVec2 {
    IVec2::new(
        (p.x * EDGE_QUANTIZATION).round() as i32,
        (p.y * EDGE_QUANTIZATION).round() as i32,
    )
}

/// A winding-independent edge key.
///
/// Endpoints are stored in lexicographic order, so the same segment
/// captured in either direction yields an equal key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolyEdge {
    a: (i32, i32),
    b: (i32, i32),
}

impl PolyEdge {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        let qa = quantize(a);
        let qb = quantize(b);
        let qa = (qa.x, qa.y);
        let qb = (qb.x, qb.y);
        if qa <= qb {
            Self { a: qa, b: qb }
        } else {
            Self { a: qb, b: qa }
        }
    }

    /// Both endpoints snapped to the same grid cell.
    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }

    pub fn endpoints(&self) -> (IVec2, IVec2) {
        (
            IVec2::new(self.a.0, self.a.1),
            IVec2::new(self.b.0, self.b.1),
        )
    }
}

/// Non-degenerate edge keys of a closed contour.
pub fn contour_edges(contour: &Contour) -> impl Iterator<Item = PolyEdge> + '_ {
    contour
        .edges()
        .map(|(a, b)| PolyEdge::new(a, b))
        .filter(|e| !e.is_degenerate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_edge_is_orientation_independent() {
        let pairs = [
            (Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)),
            (Vec2::new(-3.5, 2.25), Vec2::new(7.0, -1.0)),
            (Vec2::new(5.0, 5.0), Vec2::new(5.0, -5.0)),
            (Vec2::new(0.123, 9.87), Vec2::new(0.123, 9.87)),
        ];
        for (a, b) in pairs {
            assert_eq!(PolyEdge::new(a, b), PolyEdge::new(b, a));
        }
    }

    #[test]
    fn test_float_noise_is_absorbed() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, 4.0);
        let noisy = PolyEdge::new(a + Vec2::splat(1e-5), b - Vec2::splat(1e-5));
        assert_eq!(noisy, PolyEdge::new(b, a));
    }

    #[test]
    fn test_degenerate_edge() {
        let e = PolyEdge::new(Vec2::ONE, Vec2::ONE + Vec2::splat(1e-4));
        assert!(e.is_degenerate());
    }

    #[test]
    fn test_adjacent_squares_share_one_edge() {
        let left = Contour::rect(Vec2::ZERO, Vec2::ONE);
        let right = Contour::rect(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));

        let left_edges: HashSet<PolyEdge> = contour_edges(&left).collect();
        let shared: Vec<PolyEdge> = contour_edges(&right)
            .filter(|e| left_edges.contains(e))
            .collect();
        assert_eq!(shared.len(), 1);
    }
}
