//! Closed 2D contours
//!
//! Coordinates are y-up. A positive shoelace area means counter-clockwise
//! winding. Terrain shapes keep their outer contour clockwise and their
//! holes counter-clockwise.

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use crate::Bounds;

/// Distance below which two consecutive points are considered the same.
const WELD_EPSILON: f32 = 1e-5;

/// Orientation of a closed contour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

/// An ordered sequence of points forming an implicitly closed polygon boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec2>", into = "Vec<Vec2>")]
pub struct Contour {
    points: Vec<Vec2>,
}

impl Contour {
    /// Build a contour, dropping consecutive duplicates and an explicit closing point.
    pub fn new(points: Vec<Vec2>) -> Self {
        let mut welded: Vec<Vec2> = Vec::with_capacity(points.len());
        for p in points {
            if welded
                .last()
                .is_none_or(|last| last.distance_squared(p) > WELD_EPSILON * WELD_EPSILON)
            {
                welded.push(p);
            }
        }
        while welded.len() > 1 {
            let first = welded[0];
            let closes = welded
                .last()
                .is_some_and(|last| last.distance_squared(first) <= WELD_EPSILON * WELD_EPSILON);
            if !closes {
                break;
            }
            welded.pop();
        }
        Self { points: welded }
    }

    /// Axis-aligned rectangle, counter-clockwise.
    pub fn rect(min: Vec2, max: Vec2) -> Self {
        Self::new(vec![
            min,
            Vec2::new(max.x, min.y),
            max,
            Vec2::new(min.x, max.y),
        ])
    }

    /// Regular polygon approximating a circle, counter-clockwise.
    pub fn circle(center: Vec2, radius: f32, segments: usize) -> Self {
        let segments = segments.max(3);
        let step = std::f32::consts::TAU / segments as f32;
        Self::new(
            (0..segments)
                .map(|i| center + Vec2::from_angle(step * i as f32) * radius)
                .collect(),
        )
    }

    /// Hexagonal capsule around the segment `a`-`b` with half-width `radius`.
    ///
    /// Returns an empty contour when the segment has zero length.
    pub fn capsule(a: Vec2, b: Vec2, radius: f32) -> Self {
        let Some(dir) = (b - a).try_normalize() else {
            return Self::default();
        };
        let perp = dir.perp();
        Self::new(vec![
            a + perp * radius,
            a - dir * radius,
            a - perp * radius,
            b - perp * radius,
            b + dir * radius,
            b + perp * radius,
        ])
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when the contour can enclose area.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    /// Closed-loop edge iterator, including the edge from the last point back to the first.
    pub fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Shoelace area; positive for counter-clockwise contours.
    pub fn signed_area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }
        self.edges().map(|(a, b)| a.perp_dot(b)).sum::<f32>() * 0.5
    }

    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    pub fn winding(&self) -> Winding {
        if self.signed_area() < 0.0 {
            Winding::Clockwise
        } else {
            Winding::CounterClockwise
        }
    }

    pub fn set_winding(&mut self, winding: Winding) {
        if self.is_valid() && self.winding() != winding {
            self.points.reverse();
        }
    }

    pub fn with_winding(mut self, winding: Winding) -> Self {
        self.set_winding(winding);
        self
    }

    pub fn perimeter(&self) -> f32 {
        if self.points.len() < 2 {
            return 0.0;
        }
        self.edges().map(|(a, b)| a.distance(b)).sum()
    }

    /// Area centroid. Falls back to the vertex mean for degenerate contours.
    pub fn centroid(&self) -> Vec2 {
        if self.points.is_empty() {
            return Vec2::ZERO;
        }
        let area = self.signed_area();
        if area.abs() <= f32::EPSILON {
            return self.points.iter().copied().sum::<Vec2>() / self.points.len() as f32;
        }
        // Shift to the first vertex to keep the sums well conditioned
        let origin = self.points[0];
        let mut acc = Vec2::ZERO;
        for (a, b) in self.edges() {
            let (a, b) = (a - origin, b - origin);
            acc += (a + b) * a.perp_dot(b);
        }
        origin + acc / (6.0 * area)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.points)
    }

    /// Even-odd point containment.
    pub fn contains_point(&self, p: Vec2) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let t = (p.y - a.y) / (b.y - a.y);
                if p.x < a.x + t * (b.x - a.x) {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// True if any vertex of either contour lies inside the other.
    pub fn intersects(&self, other: &Contour) -> bool {
        other.points.iter().any(|p| self.contains_point(*p))
            || self.points.iter().any(|p| other.contains_point(*p))
    }

    pub fn transformed(&self, transform: &Affine2) -> Contour {
        Contour {
            points: self
                .points
                .iter()
                .map(|p| transform.transform_point2(*p))
                .collect(),
        }
    }

    pub fn translated(&self, offset: Vec2) -> Contour {
        Contour {
            points: self.points.iter().map(|p| *p + offset).collect(),
        }
    }
}

impl From<Vec<Vec2>> for Contour {
    fn from(points: Vec<Vec2>) -> Self {
        Self::new(points)
    }
}

impl From<Contour> for Vec<Vec2> {
    fn from(contour: Contour) -> Self {
        contour.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Contour {
        Contour::rect(Vec2::ZERO, Vec2::ONE)
    }

    #[test]
    fn test_new_drops_closing_point_and_duplicates() {
        let c = Contour::new(vec![
            Vec2::ZERO,
            Vec2::ZERO,
            Vec2::X,
            Vec2::ONE,
            Vec2::Y,
            Vec2::ZERO,
        ]);
        assert_eq!(c.len(), 4);
    }

    #[test]
    fn test_signed_area_and_winding() {
        let square = unit_square();
        assert!((square.signed_area() - 1.0).abs() < 1e-6);
        assert_eq!(square.winding(), Winding::CounterClockwise);

        let cw = square.with_winding(Winding::Clockwise);
        assert!((cw.signed_area() + 1.0).abs() < 1e-6);
        assert_eq!(cw.winding(), Winding::Clockwise);
    }

    #[test]
    fn test_centroid_of_offset_rect() {
        let c = Contour::rect(Vec2::new(10.0, 20.0), Vec2::new(14.0, 22.0));
        let centroid = c.centroid();
        assert!((centroid - Vec2::new(12.0, 21.0)).length() < 1e-4);
    }

    #[test]
    fn test_contains_point() {
        let square = unit_square();
        assert!(square.contains_point(Vec2::splat(0.5)));
        assert!(!square.contains_point(Vec2::new(1.5, 0.5)));
        assert!(!square.contains_point(Vec2::new(-0.1, 0.5)));
    }

    #[test]
    fn test_intersects_either_direction() {
        let big = Contour::rect(Vec2::splat(-10.0), Vec2::splat(10.0));
        let small = unit_square();
        assert!(big.intersects(&small));
        assert!(small.intersects(&big));

        let far = Contour::rect(Vec2::splat(50.0), Vec2::splat(51.0));
        assert!(!far.intersects(&small));
    }

    #[test]
    fn test_capsule_covers_segment() {
        let capsule = Contour::capsule(Vec2::ZERO, Vec2::new(10.0, 0.0), 1.0);
        assert_eq!(capsule.len(), 6);
        assert!(capsule.contains_point(Vec2::new(5.0, 0.0)));
        assert!(capsule.contains_point(Vec2::new(0.0, 0.5)));
        assert!(!capsule.contains_point(Vec2::new(5.0, 1.5)));
    }

    #[test]
    fn test_capsule_zero_length_is_empty() {
        assert!(Contour::capsule(Vec2::ONE, Vec2::ONE, 2.0).is_empty());
    }

    #[test]
    fn test_ron_round_trip_normalizes() {
        let text = "[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]";
        let c: Contour = ron::from_str(text).expect("valid contour");
        assert_eq!(c.len(), 3);
    }
}
